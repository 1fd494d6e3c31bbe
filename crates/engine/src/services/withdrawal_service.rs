use crate::error::EngineError;
use crate::services::LedgerService;
use ebicsbank_store::StoreTxn;
use ebicsbank_types::{AccountId, BankTransaction, HostId, WithdrawalOp};
use rust_decimal::Decimal;
use uuid::Uuid;

/// Drives the teller-facing cash withdrawal state machine
/// (`Created -> Selected -> {Confirmed, Aborted}`), debiting the account
/// only on confirmation.
#[derive(Default)]
pub struct WithdrawalService;

impl WithdrawalService {
    fn load(&self, txn: &StoreTxn<'_>, wopid: Uuid) -> Result<WithdrawalOp, EngineError> {
        let key = ebicsbank_store::storage_key::withdrawal_key(&wopid.to_string());
        txn.get_withdrawal(&key)?.ok_or(EngineError::WithdrawalNotFound)
    }

    fn save(&self, txn: &StoreTxn<'_>, withdrawal: &WithdrawalOp) -> Result<(), EngineError> {
        let key = ebicsbank_store::storage_key::withdrawal_key(&withdrawal.wopid.to_string());
        txn.put_withdrawal(&key, withdrawal)?;
        Ok(())
    }

    /// Creates a new withdrawal in the `Created` state.
    pub fn create(
        &self,
        txn: &StoreTxn<'_>,
        account_id: &AccountId,
        amount: Decimal,
        currency: &str,
        now: i64,
    ) -> Result<WithdrawalOp, EngineError> {
        let mut withdrawal = WithdrawalOp::new(account_id.clone(), amount, currency, now);
        withdrawal.wopid = Uuid::new_v4();
        self.save(txn, &withdrawal)?;
        tracing::info!(wopid = %withdrawal.wopid, account = %account_id, "withdrawal created");
        Ok(withdrawal)
    }

    /// Marks a withdrawal as `Selected` by the teller device, recording the
    /// wallet's reserve public key and exchange choice. A repeat selection
    /// with different values is a conflict.
    pub fn select(
        &self,
        txn: &StoreTxn<'_>,
        wopid: Uuid,
        reserve_pub: String,
        selected_exchange_payto: Option<String>,
    ) -> Result<WithdrawalOp, EngineError> {
        let mut withdrawal = self.load(txn, wopid)?;
        withdrawal.select(reserve_pub, selected_exchange_payto).map_err(EngineError::InvalidWithdrawalTransition)?;
        self.save(txn, &withdrawal)?;
        Ok(withdrawal)
    }

    /// Confirms a `Selected` withdrawal, executing the ledger wire transfer:
    /// debits the customer's account and credits the selected exchange
    /// account (falling back to the demobank's suggested payto when the
    /// wallet never selected one), both legs carrying `subject = reserve_pub`.
    pub fn confirm(
        &self,
        txn: &StoreTxn<'_>,
        ledger: &LedgerService,
        host_id: &HostId,
        wopid: Uuid,
        now: i64,
    ) -> Result<(WithdrawalOp, BankTransaction), EngineError> {
        let mut withdrawal = self.load(txn, wopid)?;
        withdrawal.confirm().map_err(EngineError::InvalidWithdrawalTransition)?;

        let exchange_payto = match withdrawal.selected_exchange_payto.clone() {
            Some(payto) => Some(payto),
            None => {
                let key = ebicsbank_store::storage_key::demobank_key(&host_id.0);
                txn.get_demobank(&key)?.and_then(|demobank| demobank.suggested_exchange_payto)
            }
        };
        withdrawal.selected_exchange_payto = exchange_payto.clone();

        let exchange_iban = exchange_payto.as_deref().and_then(iban_from_payto).unwrap_or_default();
        let subject = withdrawal.reserve_pub.clone().unwrap_or_default();

        let bank_tx = ledger.book_withdrawal_transfer(
            txn,
            host_id,
            &withdrawal.account_id,
            &exchange_iban,
            withdrawal.amount,
            &withdrawal.currency,
            &subject,
            &wopid.to_string(),
            now,
        )?;
        self.save(txn, &withdrawal)?;
        tracing::info!(wopid = %wopid, "withdrawal confirmed and debited");
        Ok((withdrawal, bank_tx))
    }

    /// Aborts a withdrawal that has not yet been confirmed.
    pub fn abort(&self, txn: &StoreTxn<'_>, wopid: Uuid) -> Result<WithdrawalOp, EngineError> {
        let mut withdrawal = self.load(txn, wopid)?;
        withdrawal.abort().map_err(EngineError::InvalidWithdrawalTransition)?;
        self.save(txn, &withdrawal)?;
        Ok(withdrawal)
    }
}

/// Extracts the IBAN from a `payto://iban/<IBAN>?...` URI, mirroring the
/// access-api's own payto parsing for the subset this service needs.
fn iban_from_payto(uri: &str) -> Option<String> {
    let without_scheme = uri.strip_prefix("payto://iban/")?;
    let path = without_scheme.split('?').next().unwrap_or(without_scheme);
    let iban = path.split('/').next()?;
    if iban.is_empty() { None } else { Some(iban.to_string()) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ebicsbank_store::Store;
    use ebicsbank_types::{BankAccount, Demobank, HostId};
    use tempfile::TempDir;

    const EXCHANGE_IBAN: &str = "DE22200000000987654321";

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

    fn open_exchange_account(store: &Store, host_id: &HostId) {
        let exchange_id = AccountId::new(EXCHANGE_IBAN);
        let account = BankAccount::new(host_id.clone(), exchange_id.clone(), "EXCHANGE");
        store
            .with_retry(|txn| txn.put_account(&ebicsbank_store::storage_key::account_key(&host_id.0, &exchange_id.0), &account))
            .unwrap();
    }

    #[test]
    fn full_lifecycle_debits_customer_and_credits_exchange_on_confirm() {
        let (_dir, store, host_id, account_id) = setup();
        open_exchange_account(&store, &host_id);
        let withdrawal_service = WithdrawalService::default();
        let ledger = LedgerService::default();

        let created = store
            .with_retry(|txn| withdrawal_service.create(txn, &account_id, Decimal::new(700, 2), "EUR", 0))
            .unwrap();
        let selected_exchange = format!("payto://iban/{EXCHANGE_IBAN}/exchange");
        store
            .with_retry(|txn| {
                withdrawal_service.select(txn, created.wopid, "RP1".to_string(), Some(selected_exchange.clone()))
            })
            .unwrap();
        let (confirmed, bank_tx) = store
            .with_retry(|txn| withdrawal_service.confirm(txn, &ledger, &host_id, created.wopid, 1))
            .unwrap();

        assert_eq!(confirmed.state, ebicsbank_types::WithdrawalState::Confirmed);
        assert_eq!(confirmed.reserve_pub.as_deref(), Some("RP1"));
        assert_eq!(bank_tx.amount, Decimal::new(700, 2));
        assert_eq!(bank_tx.remittance_info, "RP1");

        let account = store
            .read(|txn| txn.get_account(&ebicsbank_store::storage_key::account_key(&host_id.0, &account_id.0)))
            .unwrap()
            .unwrap();
        assert_eq!(account.balance, Decimal::new(9300, 2));

        let exchange_account = store
            .read(|txn| txn.get_account(&ebicsbank_store::storage_key::account_key(&host_id.0, EXCHANGE_IBAN)))
            .unwrap()
            .unwrap();
        assert_eq!(exchange_account.balance, Decimal::new(700, 2));
    }

    #[test]
    fn confirm_falls_back_to_demobank_suggested_exchange_when_unselected() {
        let (_dir, store, host_id, account_id) = setup();
        open_exchange_account(&store, &host_id);
        let suggested = format!("payto://iban/{EXCHANGE_IBAN}/exchange");
        store
            .with_retry(|txn| {
                let key = ebicsbank_store::storage_key::demobank_key(&host_id.0);
                let mut demobank = Demobank::new(host_id.clone(), "Default Demobank");
                demobank.suggested_exchange_payto = Some(suggested.clone());
                txn.put_demobank(&key, &demobank)
            })
            .unwrap();

        let withdrawal_service = WithdrawalService::default();
        let ledger = LedgerService::default();

        let created = store
            .with_retry(|txn| withdrawal_service.create(txn, &account_id, Decimal::new(700, 2), "EUR", 0))
            .unwrap();
        store.with_retry(|txn| withdrawal_service.select(txn, created.wopid, "RP1".to_string(), None)).unwrap();
        let (confirmed, _) = store
            .with_retry(|txn| withdrawal_service.confirm(txn, &ledger, &host_id, created.wopid, 1))
            .unwrap();

        assert_eq!(confirmed.selected_exchange_payto.as_deref(), Some(suggested.as_str()));

        let exchange_account = store
            .read(|txn| txn.get_account(&ebicsbank_store::storage_key::account_key(&host_id.0, EXCHANGE_IBAN)))
            .unwrap()
            .unwrap();
        assert_eq!(exchange_account.balance, Decimal::new(700, 2));
    }

    #[test]
    fn selecting_twice_with_different_values_is_a_conflict() {
        let (_dir, store, _host_id, account_id) = setup();
        let withdrawal_service = WithdrawalService::default();

        let created = store
            .with_retry(|txn| withdrawal_service.create(txn, &account_id, Decimal::new(700, 2), "EUR", 0))
            .unwrap();
        store.with_retry(|txn| withdrawal_service.select(txn, created.wopid, "RP1".to_string(), None)).unwrap();

        let err = store
            .with_retry(|txn| withdrawal_service.select(txn, created.wopid, "RP2".to_string(), None))
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidWithdrawalTransition(_)));
    }

    #[test]
    fn selecting_twice_with_same_values_is_idempotent() {
        let (_dir, store, _host_id, account_id) = setup();
        let withdrawal_service = WithdrawalService::default();

        let created = store
            .with_retry(|txn| withdrawal_service.create(txn, &account_id, Decimal::new(700, 2), "EUR", 0))
            .unwrap();
        store.with_retry(|txn| withdrawal_service.select(txn, created.wopid, "RP1".to_string(), None)).unwrap();
        let second = store.with_retry(|txn| withdrawal_service.select(txn, created.wopid, "RP1".to_string(), None)).unwrap();
        assert_eq!(second.state, ebicsbank_types::WithdrawalState::Selected);
    }

    #[test]
    fn confirm_without_select_is_rejected() {
        let (_dir, store, _host_id, account_id) = setup();
        let withdrawal_service = WithdrawalService::default();
        let ledger = LedgerService::default();

        let created = store
            .with_retry(|txn| withdrawal_service.create(txn, &account_id, Decimal::new(2000, 2), "EUR", 0))
            .unwrap();
        let err = store
            .with_retry(|txn| withdrawal_service.confirm(txn, &ledger, &HostId::new("DEMOBANK1"), created.wopid, 1))
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidWithdrawalTransition(_)));
    }

    #[test]
    fn abort_after_confirm_is_rejected() {
        let (_dir, store, host_id, account_id) = setup();
        let withdrawal_service = WithdrawalService::default();
        let ledger = LedgerService::default();

        let created = store
            .with_retry(|txn| withdrawal_service.create(txn, &account_id, Decimal::new(700, 2), "EUR", 0))
            .unwrap();
        store.with_retry(|txn| withdrawal_service.select(txn, created.wopid, "RP1".to_string(), None)).unwrap();
        store.with_retry(|txn| withdrawal_service.confirm(txn, &ledger, &host_id, created.wopid, 1)).unwrap();

        let err = store.with_retry(|txn| withdrawal_service.abort(txn, created.wopid)).unwrap_err();
        assert!(matches!(err, EngineError::InvalidWithdrawalTransition(_)));
    }
}
