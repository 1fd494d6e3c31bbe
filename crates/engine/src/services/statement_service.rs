use crate::error::EngineError;
use ebicsbank_store::StoreTxn;
use ebicsbank_types::{AccountId, HostId, Statement};

/// Sweeps an account's fresh (not-yet-statemented) transactions into a closed
/// [`Statement`] on each camt.053 tick, chaining `PRCD`/`CLBD` balances.
#[derive(Default)]
pub struct StatementService;

impl StatementService {
    fn next_statement_number(&self, txn: &StoreTxn<'_>, account_id: &AccountId) -> Result<(u64, rust_decimal::Decimal), EngineError> {
        let statements = txn.list_statements(&account_id.0)?;
        let last = statements.iter().max_by_key(|s| s.statement_number);
        match last {
            Some(s) => Ok((s.statement_number + 1, s.closing_balance)),
            None => Ok((1, rust_decimal::Decimal::ZERO)),
        }
    }

    /// Closes out `account_id`'s currently fresh transactions into a new
    /// statement whose opening balance chains from the prior statement's
    /// closing balance, and whose closing balance is the account's current
    /// balance. Returns `None` if there is nothing fresh to sweep.
    pub fn tick(&self, txn: &StoreTxn<'_>, host_id: &HostId, account_id: &AccountId, now: i64) -> Result<Option<Statement>, EngineError> {
        let fresh = txn.list_fresh_transactions(&account_id.0)?;
        if fresh.is_empty() {
            return Ok(None);
        }

        let account_key = ebicsbank_store::storage_key::account_key(&host_id.0, &account_id.0);
        let account = txn.get_account(&account_key)?.ok_or(EngineError::AccountNotFound)?;

        let (statement_number, opening_balance) = self.next_statement_number(txn, account_id)?;
        let statement = Statement {
            account_id: account_id.clone(),
            statement_number,
            opening_balance,
            closing_balance: account.balance,
            transactions: fresh.iter().map(|f| f.transaction.clone()).collect(),
            created_at: now,
        };

        let stmt_key = ebicsbank_store::storage_key::statement_key(&account_id.0, statement_number);
        txn.put_statement(&stmt_key, &statement)?;

        for f in &fresh {
            let key = ebicsbank_store::storage_key::fresh_transaction_key(&account_id.0, &format!("{}-{}", f.transaction.booked_at, f.transaction.pmt_info_id));
            let _ = txn.delete_fresh_transaction(&key);
        }

        tracing::info!(account = %account_id, statement_number, "closed statement, swept fresh transactions");
        Ok(Some(statement))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ebicsbank_store::Store;
    use ebicsbank_types::{AccountId, BankAccount, BankTransaction, Direction, FreshTransaction};
    use rust_decimal::Decimal;
    use tempfile::TempDir;

    #[test]
    fn tick_sweeps_fresh_into_statement_and_clears_them() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let host_id = HostId::new("DEMOBANK1");
        let account_id = AccountId::new("DE11100000000123456789");

        let mut account = BankAccount::new(host_id.clone(), account_id.clone(), "CUST1");
        account.balance = Decimal::new(5000, 2);
        let account_key = ebicsbank_store::storage_key::account_key(&host_id.0, &account_id.0);

        let tx = BankTransaction {
            account_id: account_id.clone(),
            pmt_info_id: "PMT-1".to_string(),
            direction: Direction::Debit,
            amount: Decimal::new(5000, 2),
            currency: "EUR".to_string(),
            counterparty_iban: "DE22100000000987654321".to_string(),
            counterparty_name: "Jane Doe".to_string(),
            remittance_info: String::new(),
            booked_at: 0,
            order_id: Some("A001".to_string()),
        };
        let fresh_key = ebicsbank_store::storage_key::fresh_transaction_key(&account_id.0, "0-PMT-1");

        store
            .with_retry(|txn| {
                txn.put_account(&account_key, &account)?;
                txn.put_fresh_transaction(&fresh_key, &FreshTransaction { account_id: account_id.clone(), transaction: tx.clone() })
            })
            .unwrap();

        let statement_service = StatementService::default();
        let statement = store
            .with_retry(|txn| statement_service.tick(txn, &host_id, &account_id, 100))
            .unwrap()
            .unwrap();

        assert_eq!(statement.statement_number, 1);
        assert_eq!(statement.opening_balance, Decimal::ZERO);
        assert_eq!(statement.closing_balance, Decimal::new(5000, 2));
        assert_eq!(statement.transactions.len(), 1);

        let remaining = store.read(|txn| txn.list_fresh_transactions(&account_id.0)).unwrap();
        assert!(remaining.is_empty());

        let second = store.with_retry(|txn| statement_service.tick(txn, &host_id, &account_id, 200)).unwrap();
        assert!(second.is_none());
    }
}
