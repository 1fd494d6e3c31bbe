//! Business logic for the EBICS H004 banking sandbox: key management,
//! pain.001/camt.052/camt.053 order dispatch, ledger booking, and teller
//! withdrawals, composed behind a single [`Engine`] facade that operates
//! against one [`ebicsbank_store::StoreTxn`] per call.

mod constants;
mod error;
mod services;

pub use constants::*;
pub use error::EngineError;
pub use services::{KeyManagementService, LedgerService, StatementService, TransactionService, WithdrawalService};

use ebicsbank_auth::AuthService;
use ebicsbank_store::StoreTxn;
use ebicsbank_types::{AccountId, BankTransaction, HostId, OrderType, Statement, Subscriber, SubscriberId, WithdrawalOp};
use ebicsbank_xml::AuthSignature;
use rsa::{RsaPrivateKey, RsaPublicKey};
use rust_decimal::Decimal;
use uuid::Uuid;

/// Composes the sandbox's domain services behind the operations an EBICS
/// transport handler or access-api route actually needs, each taking the
/// caller's open [`StoreTxn`] explicitly so it participates in the same
/// serializable transaction as the rest of the request.
#[derive(Default)]
pub struct Engine {
    auth: AuthService,
    key_management: KeyManagementService,
    ledger: LedgerService,
    statement: StatementService,
    transaction: TransactionService,
    withdrawal: WithdrawalService,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    // -- Key management (INI/HIA/HPB) ------------------------------------

    pub fn process_ini(&self, txn: &StoreTxn<'_>, host_id: &HostId, user_id: &SubscriberId, order_data_xml: &str) -> Result<(), EngineError> {
        self.key_management.process_ini(txn, &self.auth, host_id, user_id, order_data_xml)
    }

    pub fn process_hia(&self, txn: &StoreTxn<'_>, host_id: &HostId, user_id: &SubscriberId, order_data_xml: &str) -> Result<(), EngineError> {
        self.key_management.process_hia(txn, &self.auth, host_id, user_id, order_data_xml)
    }

    pub fn process_hpb(&self, txn: &StoreTxn<'_>, host_id: &HostId) -> Result<String, EngineError> {
        self.key_management.process_hpb(txn, host_id)
    }

    pub fn host_encryption_private_key(&self, txn: &StoreTxn<'_>, host_id: &HostId) -> Result<RsaPrivateKey, EngineError> {
        let host = self.key_management.ensure_host(txn, host_id)?;
        Ok(ebicsbank_crypto::load_rsa_private_key(&host.encryption_key)?)
    }

    pub fn subscriber(&self, txn: &StoreTxn<'_>, host_id: &HostId, user_id: &SubscriberId) -> Result<Subscriber, EngineError> {
        Ok(self.auth.require_ready(txn, host_id, user_id)?)
    }

    /// Verifies access-api/integration-api HTTP basic-auth credentials.
    pub fn verify_basic_auth(&self, txn: &StoreTxn<'_>, host_id: &HostId, customer_id: &str, password: &str) -> Result<(), EngineError> {
        Ok(self.auth.verify_basic_auth(txn, host_id, customer_id, password)?)
    }

    /// Hashes a plaintext password for a new customer record, for admin provisioning.
    pub fn hash_customer_password(&self, plaintext: &str) -> Result<String, EngineError> {
        Ok(self.auth.hash_customer_password(plaintext)?)
    }

    fn subscriber_encryption_key(&self, txn: &StoreTxn<'_>, host_id: &HostId, user_id: &SubscriberId) -> Result<RsaPublicKey, EngineError> {
        let subscriber = self.auth.require_ready(txn, host_id, user_id)?;
        let der = subscriber
            .keys
            .encryption_key
            .ok_or_else(|| EngineError::Other("subscriber has no registered encryption key".into()))?;
        Ok(ebicsbank_crypto::load_rsa_public_key(&der)?)
    }

    // -- Downloads (HTD/HKD/C52/C53/TSD) ----------------------------------

    /// Renders the order data for a download order type and opens the
    /// corresponding multi-segment, E002-encrypted download transaction.
    pub fn start_download(
        &self,
        txn: &StoreTxn<'_>,
        host_id: &HostId,
        user_id: &SubscriberId,
        account_id: Option<&AccountId>,
        order_type: OrderType,
        now: i64,
    ) -> Result<ebicsbank_types::EbicsDownloadTx, EngineError> {
        let recipient_key = self.subscriber_encryption_key(txn, host_id, user_id)?;
        let order_data_xml = self.build_download_order_data(txn, host_id, account_id, order_type)?;
        let _ = now;
        self.transaction.start_download(txn, host_id, user_id, order_type, &order_data_xml, &recipient_key)
    }

    fn build_download_order_data(&self, txn: &StoreTxn<'_>, host_id: &HostId, account_id: Option<&AccountId>, order_type: OrderType) -> Result<String, EngineError> {
        match order_type {
            OrderType::Hpb => self.key_management.process_hpb(txn, host_id),
            OrderType::Htd => {
                let account_id = account_id.ok_or(EngineError::AccountNotFound)?;
                let accounts = txn.list_accounts(&host_id.0)?;
                let mine: Vec<_> = accounts.into_iter().filter(|a| &a.account_id == account_id).collect();
                Ok(ebicsbank_xml::build_htd(&mine)?)
            }
            OrderType::Hkd => {
                let accounts = txn.list_accounts(&host_id.0)?;
                Ok(ebicsbank_xml::build_hkd(&accounts)?)
            }
            OrderType::C52 => {
                let account_id = account_id.ok_or(EngineError::AccountNotFound)?;
                let account_key = ebicsbank_store::storage_key::account_key(&host_id.0, &account_id.0);
                let account = txn.get_account(&account_key)?.ok_or(EngineError::AccountNotFound)?;
                let fresh = txn.list_fresh_transactions(&account_id.0)?;
                let transactions: Vec<BankTransaction> = fresh.into_iter().map(|f| f.transaction).collect();
                Ok(ebicsbank_xml::build_camt052(&account_id.0, account.balance, &account.currency, &transactions)?)
            }
            OrderType::C53 => {
                let account_id = account_id.ok_or(EngineError::AccountNotFound)?;
                let statements = txn.list_statements(&account_id.0)?;
                let latest = statements
                    .into_iter()
                    .max_by_key(|s| s.statement_number)
                    .ok_or(EngineError::TransactionNotFound)?;
                let account_key = ebicsbank_store::storage_key::account_key(&host_id.0, &account_id.0);
                let account = txn.get_account(&account_key)?.ok_or(EngineError::AccountNotFound)?;
                Ok(ebicsbank_xml::build_camt053(&latest, &account.currency)?)
            }
            OrderType::Tsd => Ok("<TestData>EBICS sandbox test payload</TestData>".to_string()),
            _ => Err(EngineError::UnknownOrderType),
        }
    }

    pub fn transfer_download_segment(&self, txn: &StoreTxn<'_>, host_id: &HostId, transaction_id: &str, segment_number: u32) -> Result<Vec<u8>, EngineError> {
        self.transaction.transfer_download_segment(txn, host_id, transaction_id, segment_number)
    }

    pub fn close_download(&self, txn: &StoreTxn<'_>, host_id: &HostId, transaction_id: &str) -> Result<(), EngineError> {
        self.transaction.close_download(txn, host_id, transaction_id)
    }

    // -- Uploads (PTK/CCT) -------------------------------------------------

    pub fn start_upload(
        &self,
        txn: &StoreTxn<'_>,
        host_id: &HostId,
        user_id: &SubscriberId,
        order_type: OrderType,
        transaction_key: Vec<u8>,
        num_segments: u32,
    ) -> Result<ebicsbank_types::EbicsUploadTx, EngineError> {
        self.transaction.start_upload(txn, host_id, user_id, order_type, transaction_key, num_segments)
    }

    pub fn receive_upload_segment(&self, txn: &StoreTxn<'_>, host_id: &HostId, transaction_id: &str, segment_number: u32, data: Vec<u8>) -> Result<bool, EngineError> {
        self.transaction.receive_upload_segment(txn, host_id, transaction_id, segment_number, data)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn finalize_upload(
        &self,
        txn: &StoreTxn<'_>,
        host_id: &HostId,
        user_id: &SubscriberId,
        account_id: &AccountId,
        transaction_id: &str,
        order_signature: &AuthSignature,
        now: i64,
    ) -> Result<Vec<BankTransaction>, EngineError> {
        let host_encryption_key = self.host_encryption_private_key(txn, host_id)?;
        self.transaction.finalize_upload(
            txn,
            &self.auth,
            &self.ledger,
            host_id,
            user_id,
            account_id,
            transaction_id,
            &host_encryption_key,
            order_signature,
            now,
        )
    }

    // -- Statements ---------------------------------------------------------

    /// Closes out an account's fresh transactions into a new statement, the
    /// operation the `camt053tick` CLI command drives across every account.
    pub fn tick_statement(&self, txn: &StoreTxn<'_>, host_id: &HostId, account_id: &AccountId, now: i64) -> Result<Option<Statement>, EngineError> {
        self.statement.tick(txn, host_id, account_id, now)
    }

    // -- Withdrawals ----------------------------------------------------------

    pub fn create_withdrawal(&self, txn: &StoreTxn<'_>, account_id: &AccountId, amount: Decimal, currency: &str, now: i64) -> Result<WithdrawalOp, EngineError> {
        self.withdrawal.create(txn, account_id, amount, currency, now)
    }

    pub fn select_withdrawal(
        &self,
        txn: &StoreTxn<'_>,
        wopid: Uuid,
        reserve_pub: String,
        selected_exchange_payto: Option<String>,
    ) -> Result<WithdrawalOp, EngineError> {
        self.withdrawal.select(txn, wopid, reserve_pub, selected_exchange_payto)
    }

    pub fn confirm_withdrawal(&self, txn: &StoreTxn<'_>, host_id: &HostId, wopid: Uuid, now: i64) -> Result<(WithdrawalOp, BankTransaction), EngineError> {
        self.withdrawal.confirm(txn, &self.ledger, host_id, wopid, now)
    }

    pub fn abort_withdrawal(&self, txn: &StoreTxn<'_>, wopid: Uuid) -> Result<WithdrawalOp, EngineError> {
        self.withdrawal.abort(txn, wopid)
    }

    // -- Direct ledger access (access-api) -----------------------------------

    pub fn book_pain001(&self, txn: &StoreTxn<'_>, host_id: &HostId, account_id: &AccountId, pain001_xml: &str, order_id: &str, now: i64) -> Result<Vec<BankTransaction>, EngineError> {
        self.ledger.book_pain001(txn, host_id, account_id, pain001_xml, order_id, now)
    }

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
        self.ledger.book_direct_transfer(txn, host_id, account_id, counterparty_iban, amount, currency, pmt_info_id, now)
    }

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
        self.ledger.book_direct_credit(txn, host_id, account_id, counterparty_iban, amount, currency, pmt_info_id, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ebicsbank_store::Store;
    use ebicsbank_types::{BankAccount, OrderType};
    use tempfile::TempDir;

    #[test]
    fn ini_then_hia_initializes_subscriber_and_hpb_serves_host_keys() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let engine = Engine::new();
        let host_id = HostId::new("DEMOBANK1");
        let user_id = SubscriberId::new("USER1");

        let pair = ebicsbank_crypto::generate_rsa_keypair().unwrap();
        let (modulus, exponent) = ebicsbank_crypto::public_key_components(&pair.public);
        let ini_xml = format!(
            "<SignaturePubKeyOrderData><SignaturePubKeyInfo><PubKeyValue><RSAKeyValue><Modulus>{}</Modulus><Exponent>{}</Exponent></RSAKeyValue></PubKeyValue></SignaturePubKeyInfo></SignaturePubKeyOrderData>",
            ebicsbank_xml::base64_encode(&modulus),
            ebicsbank_xml::base64_encode(&exponent),
        );
        let hia_xml = format!(
            "<HIARequestOrderData><AuthenticationPubKeyInfo><PubKeyValue><RSAKeyValue><Modulus>{m}</Modulus><Exponent>{e}</Exponent></RSAKeyValue></PubKeyValue></AuthenticationPubKeyInfo><EncryptionPubKeyInfo><PubKeyValue><RSAKeyValue><Modulus>{m}</Modulus><Exponent>{e}</Exponent></RSAKeyValue></PubKeyValue></EncryptionPubKeyInfo></HIARequestOrderData>",
            m = ebicsbank_xml::base64_encode(&modulus),
            e = ebicsbank_xml::base64_encode(&exponent),
        );

        store.with_retry(|txn| engine.process_ini(txn, &host_id, &user_id, &ini_xml)).unwrap();
        store.with_retry(|txn| engine.process_hia(txn, &host_id, &user_id, &hia_xml)).unwrap();

        let subscriber = store.read(|txn| engine.subscriber(txn, &host_id, &user_id)).unwrap();
        assert!(subscriber.state.is_ready());

        let hpb_xml = store.with_retry(|txn| engine.process_hpb(txn, &host_id)).unwrap();
        assert!(hpb_xml.contains("AuthenticationPubKeyInfo"));
    }

    #[test]
    fn c52_download_order_data_reflects_fresh_transactions() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let engine = Engine::new();
        let host_id = HostId::new("DEMOBANK1");
        let user_id = SubscriberId::new("USER1");
        let account_id = AccountId::new("DE11100000000123456789");

        let subscriber_key_pair = ebicsbank_crypto::generate_rsa_keypair().unwrap();
        store
            .with_retry(|txn| {
                let mut account = BankAccount::new(host_id.clone(), account_id.clone(), "CUST1");
                account.balance = Decimal::new(5000, 2);
                txn.put_account(&ebicsbank_store::storage_key::account_key(&host_id.0, &account_id.0), &account)?;

                let mut subscriber = Subscriber::new(host_id.clone(), "PARTNER1", user_id.clone());
                subscriber.keys.encryption_key = Some(ebicsbank_crypto::public_key_to_der(&subscriber_key_pair.public).unwrap());
                subscriber.state = subscriber.state.apply_ini();
                subscriber.state = subscriber.state.apply_hia();
                txn.put_subscriber(&ebicsbank_store::storage_key::subscriber_key(&host_id.0, &user_id.0), &subscriber)
            })
            .unwrap();

        let download_tx = store
            .with_retry(|txn| engine.start_download(txn, &host_id, &user_id, Some(&account_id), OrderType::C52, 0))
            .unwrap();
        assert_eq!(download_tx.order_type, OrderType::C52);
        assert!(!download_tx.segments.is_empty());
    }
}
