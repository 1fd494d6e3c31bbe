use crate::error::EngineError;
use ebicsbank_store::StoreTxn;
use ebicsbank_types::{AccountId, BankAccount, BankTransaction, Direction, FreshTransaction, HostId};
use ebicsbank_xml::{parse_pain001, CreditTransferInstruction};
use rust_decimal::Decimal;

/// Books pain.001 credit transfer initiations and teller withdrawals against
/// account balances, enforcing the per-account debt limit and idempotent
/// replay of already-booked payments.
#[derive(Default)]
pub struct LedgerService;

impl LedgerService {
    fn load_account(&self, txn: &StoreTxn<'_>, host_id: &HostId, account_id: &AccountId) -> Result<BankAccount, EngineError> {
        let key = ebicsbank_store::storage_key::account_key(&host_id.0, &account_id.0);
        txn.get_account(&key)?.ok_or(EngineError::AccountNotFound)
    }

    fn save_account(&self, txn: &StoreTxn<'_>, host_id: &HostId, account: &BankAccount) -> Result<(), EngineError> {
        let key = ebicsbank_store::storage_key::account_key(&host_id.0, &account.account_id.0);
        txn.put_account(&key, account)?;
        Ok(())
    }

    fn try_load_account(&self, txn: &StoreTxn<'_>, host_id: &HostId, account_id: &AccountId) -> Result<Option<BankAccount>, EngineError> {
        let key = ebicsbank_store::storage_key::account_key(&host_id.0, &account_id.0);
        Ok(txn.get_account(&key)?)
    }

    /// Debits `account` by `amount` if the account's debt limit allows it,
    /// otherwise fails without mutating anything.
    fn maybe_debit(&self, account: &mut BankAccount, amount: Decimal) -> Result<(), EngineError> {
        if account.available_for_debit() < amount {
            return Err(EngineError::DebtLimitExceeded {
                balance: account.balance.to_string(),
                debt_limit: account.debt_limit.to_string(),
                requested: amount.to_string(),
            });
        }
        account.balance -= amount;
        Ok(())
    }

    fn append_fresh(&self, txn: &StoreTxn<'_>, seq: &str, transaction: BankTransaction) -> Result<(), EngineError> {
        let key = ebicsbank_store::storage_key::fresh_transaction_key(&transaction.account_id.0, seq);
        let fresh = FreshTransaction { account_id: transaction.account_id.clone(), transaction: transaction.clone() };
        txn.put_fresh_transaction(&key, &fresh)?;
        let tx_key = ebicsbank_store::storage_key::transaction_key(&transaction.account_id.0, &transaction.pmt_info_id);
        txn.put_transaction(&tx_key, &transaction)?;
        Ok(())
    }

    fn book_instruction(
        &self,
        txn: &StoreTxn<'_>,
        host_id: &HostId,
        account_id: &AccountId,
        instruction: &CreditTransferInstruction,
        order_id: &str,
        now: i64,
    ) -> Result<Option<BankTransaction>, EngineError> {
        if txn.transaction_exists(&account_id.0, &instruction.pmt_info_id)? {
            tracing::info!(pmt_info_id = %instruction.pmt_info_id, "pain.001 instruction already booked, skipping replay");
            return Ok(None);
        }

        let mut account = self.load_account(txn, host_id, account_id)?;
        self.maybe_debit(&mut account, instruction.amount)?;

        let bank_tx = BankTransaction {
            account_id: account_id.clone(),
            pmt_info_id: instruction.pmt_info_id.clone(),
            direction: Direction::Debit,
            amount: instruction.amount,
            currency: instruction.currency.clone(),
            counterparty_iban: instruction.creditor_iban.clone(),
            counterparty_name: instruction.creditor_name.clone(),
            remittance_info: instruction.remittance_info.clone(),
            booked_at: now,
            order_id: Some(order_id.to_string()),
        };

        self.save_account(txn, host_id, &account)?;
        self.append_fresh(txn, &format!("{now}-{}", instruction.pmt_info_id), bank_tx.clone())?;

        tracing::info!(
            account = %account_id,
            amount = %instruction.amount,
            creditor = %instruction.creditor_name,
            "booked pain.001 credit transfer"
        );

        Ok(Some(bank_tx))
    }

    /// Books every `CdtTrfTxInf` in a pain.001 document against `account_id`,
    /// returning the transactions actually booked (excludes idempotent skips).
    pub fn book_pain001(
        &self,
        txn: &StoreTxn<'_>,
        host_id: &HostId,
        account_id: &AccountId,
        pain001_xml: &str,
        order_id: &str,
        now: i64,
    ) -> Result<Vec<BankTransaction>, EngineError> {
        let instructions = parse_pain001(pain001_xml)?;
        let mut booked = Vec::new();
        for instruction in &instructions {
            if let Some(tx) = self.book_instruction(txn, host_id, account_id, instruction, order_id, now)? {
                booked.push(tx);
            }
        }
        Ok(booked)
    }

    /// Books a direct access-api transfer (a payto-URI wire debit, not a
    /// pain.001 upload), applying the same idempotency and debt-limit rules.
    #[allow(clippy::too_many_arguments)]
    pub fn book_direct_transfer(
        &self,
        txn: &StoreTxn<'_>,
        host_id: &HostId,
        account_id: &AccountId,
        counterparty_iban: &str,
        amount: Decimal,
        currency: &str,
        pmt_info_id: &str,
        now: i64,
    ) -> Result<BankTransaction, EngineError> {
        if txn.transaction_exists(&account_id.0, pmt_info_id)? {
            return Err(EngineError::DuplicatePayment(pmt_info_id.to_string()));
        }

        let mut account = self.load_account(txn, host_id, account_id)?;
        self.maybe_debit(&mut account, amount)?;

        let bank_tx = BankTransaction {
            account_id: account_id.clone(),
            pmt_info_id: pmt_info_id.to_string(),
            direction: Direction::Debit,
            amount,
            currency: currency.to_string(),
            counterparty_iban: counterparty_iban.to_string(),
            counterparty_name: String::new(),
            remittance_info: String::new(),
            booked_at: now,
            order_id: None,
        };

        self.save_account(txn, host_id, &account)?;
        self.append_fresh(txn, &format!("{now}-{pmt_info_id}"), bank_tx.clone())?;
        Ok(bank_tx)
    }

    /// Credits `account_id` by `amount`, the taler-wire-gateway
    /// `admin/add-incoming` path: money arriving from outside the sandbox,
    /// so no debt-limit check applies.
    #[allow(clippy::too_many_arguments)]
    pub fn book_direct_credit(
        &self,
        txn: &StoreTxn<'_>,
        host_id: &HostId,
        account_id: &AccountId,
        counterparty_iban: &str,
        amount: Decimal,
        currency: &str,
        pmt_info_id: &str,
        now: i64,
    ) -> Result<BankTransaction, EngineError> {
        if txn.transaction_exists(&account_id.0, pmt_info_id)? {
            return Err(EngineError::DuplicatePayment(pmt_info_id.to_string()));
        }

        let mut account = self.load_account(txn, host_id, account_id)?;
        account.balance += amount;

        let bank_tx = BankTransaction {
            account_id: account_id.clone(),
            pmt_info_id: pmt_info_id.to_string(),
            direction: Direction::Credit,
            amount,
            currency: currency.to_string(),
            counterparty_iban: counterparty_iban.to_string(),
            counterparty_name: String::new(),
            remittance_info: String::new(),
            booked_at: now,
            order_id: None,
        };

        self.save_account(txn, host_id, &account)?;
        self.append_fresh(txn, &format!("{now}-{pmt_info_id}"), bank_tx.clone())?;
        Ok(bank_tx)
    }

    /// Executes a confirmed withdrawal's wire transfer: debits `account_id`
    /// and, when `exchange_iban` names an account that exists locally,
    /// credits it too. Both legs carry `subject` as their remittance text,
    /// the same `subject = reserve_pub` wire transfer described by the
    /// withdrawal FSM. Returns the debit leg.
    #[allow(clippy::too_many_arguments)]
    pub fn book_withdrawal_transfer(
        &self,
        txn: &StoreTxn<'_>,
        host_id: &HostId,
        account_id: &AccountId,
        exchange_iban: &str,
        amount: Decimal,
        currency: &str,
        subject: &str,
        wopid: &str,
        now: i64,
    ) -> Result<BankTransaction, EngineError> {
        let debit_pmt_info_id = format!("WDL-{wopid}");
        let mut account = self.load_account(txn, host_id, account_id)?;
        self.maybe_debit(&mut account, amount)?;

        let debit_tx = BankTransaction {
            account_id: account_id.clone(),
            pmt_info_id: debit_pmt_info_id.clone(),
            direction: Direction::Debit,
            amount,
            currency: currency.to_string(),
            counterparty_iban: exchange_iban.to_string(),
            counterparty_name: "CASH WITHDRAWAL".to_string(),
            remittance_info: subject.to_string(),
            booked_at: now,
            order_id: None,
        };

        self.save_account(txn, host_id, &account)?;
        self.append_fresh(txn, &format!("{now}-{debit_pmt_info_id}"), debit_tx.clone())?;

        if !exchange_iban.is_empty() {
            let exchange_account_id = AccountId::new(exchange_iban.to_string());
            if let Some(mut exchange_account) = self.try_load_account(txn, host_id, &exchange_account_id)? {
                let credit_pmt_info_id = format!("WDL-{wopid}-XCHG");
                if !txn.transaction_exists(&exchange_account_id.0, &credit_pmt_info_id)? {
                    exchange_account.balance += amount;
                    let credit_tx = BankTransaction {
                        account_id: exchange_account_id.clone(),
                        pmt_info_id: credit_pmt_info_id.clone(),
                        direction: Direction::Credit,
                        amount,
                        currency: currency.to_string(),
                        counterparty_iban: account_id.0.clone(),
                        counterparty_name: String::new(),
                        remittance_info: subject.to_string(),
                        booked_at: now,
                        order_id: None,
                    };
                    self.save_account(txn, host_id, &exchange_account)?;
                    self.append_fresh(txn, &format!("{now}-{credit_pmt_info_id}"), credit_tx)?;
                }
            }
        }

        Ok(debit_tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ebicsbank_store::Store;
    use ebicsbank_types::HostId;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"<Document>
        <CstmrCdtTrfInitn>
            <PmtInf>
                <PmtInfId>PMT-1</PmtInfId>
                <DbtrAcct><Id><IBAN>DE11100000000123456789</IBAN></Id></DbtrAcct>
                <CdtTrfTxInf>
                    <Amt><InstdAmt Ccy="EUR">50.00</InstdAmt></Amt>
                    <Cdtr><Nm>Jane Doe</Nm></Cdtr>
                    <CdtrAcct><Id><IBAN>DE22100000000987654321</IBAN></Id></CdtrAcct>
                </CdtTrfTxInf>
            </PmtInf>
        </CstmrCdtTrfInitn>
    </Document>"#;

    fn setup() -> (TempDir, Store, HostId, AccountId) {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let host_id = HostId::new("DEMOBANK1");
        let account_id = AccountId::new("DE11100000000123456789");
        let mut account = BankAccount::new(host_id.clone(), account_id.clone(), "CUST1");
        account.balance = Decimal::new(10000, 2);
        store
            .with_retry(|txn| txn.put_account(&ebicsbank_store::storage_key::account_key(&host_id.0, &account_id.0), &account))
            .unwrap();
        (dir, store, host_id, account_id)
    }

    #[test]
    fn books_pain001_and_debits_balance() {
        let (_dir, store, host_id, account_id) = setup();
        let ledger = LedgerService::default();

        let booked = store
            .with_retry(|txn| ledger.book_pain001(txn, &host_id, &account_id, SAMPLE, "A001", 0))
            .unwrap();
        assert_eq!(booked.len(), 1);

        let account = store
            .read(|txn| txn.get_account(&ebicsbank_store::storage_key::account_key(&host_id.0, &account_id.0)))
            .unwrap()
            .unwrap();
        assert_eq!(account.balance, Decimal::new(5000, 2));
    }

    #[test]
    fn replaying_same_pmt_info_id_does_not_double_book() {
        let (_dir, store, host_id, account_id) = setup();
        let ledger = LedgerService::default();

        store.with_retry(|txn| ledger.book_pain001(txn, &host_id, &account_id, SAMPLE, "A001", 0)).unwrap();
        let second = store.with_retry(|txn| ledger.book_pain001(txn, &host_id, &account_id, SAMPLE, "A002", 1)).unwrap();
        assert!(second.is_empty());

        let account = store
            .read(|txn| txn.get_account(&ebicsbank_store::storage_key::account_key(&host_id.0, &account_id.0)))
            .unwrap()
            .unwrap();
        assert_eq!(account.balance, Decimal::new(5000, 2));
    }

    #[test]
    fn debt_limit_blocks_overdraft() {
        let (_dir, store, host_id, account_id) = setup();
        let ledger = LedgerService::default();

        let err = store
            .with_retry(|txn| ledger.book_withdrawal_transfer(txn, &host_id, &account_id, "", Decimal::new(100000, 2), "EUR", "RP1", "W1", 0))
            .unwrap_err();
        assert!(matches!(err, EngineError::DebtLimitExceeded { .. }));
    }
}
