//! RocksDB-backed persistence for the EBICS sandbox.
//!
//! Every mutating HTTP request runs inside a single serializable
//! `OptimisticTransactionDB` transaction: reads establish the transaction's
//! read set, writes are buffered until `commit`, and a conflicting commit is
//! retried by the caller (see [`Store::with_retry`]) rather than surfaced to
//! the client as an error.

pub mod encoding;
pub mod error;
pub mod storage_key;

use ebicsbank_types::{
    BankAccount, BankTransaction, Customer, Demobank, EbicsDownloadTx, EbicsUploadTx, FreshTransaction, Host,
    OrderSignature, Statement, Subscriber, WithdrawalOp,
};
use error::StoreError;
use rocksdb::{ColumnFamilyDescriptor, IteratorMode, OptimisticTransactionDB, Options, Transaction};
use std::path::Path;
use std::sync::Arc;

pub const CF_HOSTS: &str = "hosts";
pub const CF_SUBSCRIBERS: &str = "subscribers";
pub const CF_DEMOBANKS: &str = "demobank_configs";
pub const CF_CUSTOMERS: &str = "demobank_customers";
pub const CF_ACCOUNTS: &str = "bank_accounts";
pub const CF_TRANSACTIONS: &str = "bank_account_transactions";
pub const CF_FRESH_TRANSACTIONS: &str = "bank_account_fresh_transactions";
pub const CF_STATEMENTS: &str = "bank_account_statements";
pub const CF_DOWNLOAD_TX: &str = "ebics_download_transactions";
pub const CF_UPLOAD_TX: &str = "ebics_upload_transactions";
pub const CF_ORDER_SIGNATURES: &str = "ebics_order_signatures";
pub const CF_WITHDRAWALS: &str = "withdrawals";

const ALL_CFS: &[&str] = &[
    CF_HOSTS,
    CF_SUBSCRIBERS,
    CF_DEMOBANKS,
    CF_CUSTOMERS,
    CF_ACCOUNTS,
    CF_TRANSACTIONS,
    CF_FRESH_TRANSACTIONS,
    CF_STATEMENTS,
    CF_DOWNLOAD_TX,
    CF_UPLOAD_TX,
    CF_ORDER_SIGNATURES,
    CF_WITHDRAWALS,
];

/// Maximum number of times a caller's transaction closure is retried after a
/// serialization conflict before giving up.
pub const MAX_TRANSACTION_RETRIES: u32 = 10;

fn tuned_db_options() -> Options {
    let mut opts = Options::default();
    opts.create_if_missing(true);
    opts.create_missing_column_families(true);
    opts.increase_parallelism(num_cpus::get() as i32);
    opts.set_max_background_jobs(4);
    opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

    let mut block_opts = rocksdb::BlockBasedOptions::default();
    block_opts.set_bloom_filter(10.0, false);
    block_opts.set_block_cache(&rocksdb::Cache::new_lru_cache(64 * 1024 * 1024));
    opts.set_block_based_table_factory(&block_opts);

    opts
}

/// A RocksDB-backed store, opened once at startup and shared across the
/// request-handling pool.
pub struct Store {
    db: Arc<OptimisticTransactionDB>,
}

impl Store {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let opts = tuned_db_options();
        let cf_descriptors: Vec<ColumnFamilyDescriptor> = ALL_CFS
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect();
        let db = OptimisticTransactionDB::open_cf_descriptors(&opts, path, cf_descriptors)?;
        Ok(Self { db: Arc::new(db) })
    }

    /// Destroys the on-disk database, the `reset-tables` CLI command's
    /// backing operation. The caller must not hold any other `Store` open on
    /// the same path.
    pub fn reset(path: impl AsRef<Path>) -> Result<(), StoreError> {
        OptimisticTransactionDB::destroy(&Options::default(), path)?;
        Ok(())
    }

    /// Runs `f` inside a fresh serializable transaction, retrying on conflict
    /// up to [`MAX_TRANSACTION_RETRIES`] times.
    pub fn with_retry<F, T>(&self, mut f: F) -> Result<T, StoreError>
    where
        F: FnMut(&StoreTxn<'_>) -> Result<T, StoreError>,
    {
        for attempt in 0..MAX_TRANSACTION_RETRIES {
            let txn = self.db.transaction();
            let store_txn = StoreTxn { db: &self.db, txn: &txn };
            match f(&store_txn) {
                Ok(value) => match txn.commit() {
                    Ok(()) => return Ok(value),
                    Err(e) if is_conflict(&e) => {
                        log::warn!("store transaction conflict, retrying (attempt {attempt})");
                        continue;
                    }
                    Err(e) => return Err(e.into()),
                },
                Err(e) => return Err(e),
            }
        }
        Err(StoreError::ConflictRetriesExhausted(MAX_TRANSACTION_RETRIES))
    }

    /// Runs `f` inside a read-only transaction snapshot, for access-api GET
    /// endpoints that don't need to mutate state.
    pub fn read<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&StoreTxn<'_>) -> Result<T, StoreError>,
    {
        let txn = self.db.transaction();
        let store_txn = StoreTxn { db: &self.db, txn: &txn };
        f(&store_txn)
    }
}

fn is_conflict(err: &rocksdb::Error) -> bool {
    let msg = err.to_string();
    msg.contains("Busy") || msg.contains("TryAgain") || msg.contains("Conflict")
}

/// A single transaction's view of the store, handed to engine services.
pub struct StoreTxn<'a> {
    db: &'a OptimisticTransactionDB,
    txn: &'a Transaction<'a, OptimisticTransactionDB>,
}

macro_rules! typed_cf_accessors {
    ($get:ident, $put:ident, $delete:ident, $cf:expr, $ty:ty) => {
        pub fn $get(&self, key: &[u8]) -> Result<Option<$ty>, StoreError> {
            let cf = self.db.cf_handle($cf).ok_or_else(|| StoreError::Other(format!("missing cf {}", $cf)))?;
            match self.txn.get_cf(&cf, key)? {
                Some(bytes) => Ok(Some(encoding::decode(&bytes)?)),
                None => Ok(None),
            }
        }

        pub fn $put(&self, key: &[u8], value: &$ty) -> Result<(), StoreError> {
            let cf = self.db.cf_handle($cf).ok_or_else(|| StoreError::Other(format!("missing cf {}", $cf)))?;
            self.txn.put_cf(&cf, key, encoding::encode(value)?)?;
            Ok(())
        }

        pub fn $delete(&self, key: &[u8]) -> Result<(), StoreError> {
            let cf = self.db.cf_handle($cf).ok_or_else(|| StoreError::Other(format!("missing cf {}", $cf)))?;
            self.txn.delete_cf(&cf, key)?;
            Ok(())
        }
    };
}

impl<'a> StoreTxn<'a> {
    typed_cf_accessors!(get_host, put_host, delete_host, CF_HOSTS, Host);
    typed_cf_accessors!(get_subscriber, put_subscriber, delete_subscriber, CF_SUBSCRIBERS, Subscriber);
    typed_cf_accessors!(get_demobank, put_demobank, delete_demobank, CF_DEMOBANKS, Demobank);
    typed_cf_accessors!(get_customer, put_customer, delete_customer, CF_CUSTOMERS, Customer);
    typed_cf_accessors!(get_account, put_account, delete_account, CF_ACCOUNTS, BankAccount);
    typed_cf_accessors!(get_transaction, put_transaction, delete_transaction, CF_TRANSACTIONS, BankTransaction);
    typed_cf_accessors!(
        get_fresh_transaction,
        put_fresh_transaction,
        delete_fresh_transaction,
        CF_FRESH_TRANSACTIONS,
        FreshTransaction
    );
    typed_cf_accessors!(get_statement, put_statement, delete_statement, CF_STATEMENTS, Statement);
    typed_cf_accessors!(get_download_tx, put_download_tx, delete_download_tx, CF_DOWNLOAD_TX, EbicsDownloadTx);
    typed_cf_accessors!(get_upload_tx, put_upload_tx, delete_upload_tx, CF_UPLOAD_TX, EbicsUploadTx);
    typed_cf_accessors!(
        get_order_signature,
        put_order_signature,
        delete_order_signature,
        CF_ORDER_SIGNATURES,
        OrderSignature
    );
    typed_cf_accessors!(get_withdrawal, put_withdrawal, delete_withdrawal, CF_WITHDRAWALS, WithdrawalOp);

    /// Checks whether a transaction with the given `(account_id, pmt_info_id)`
    /// key has already been booked, for pain.001 replay idempotency.
    pub fn transaction_exists(&self, account_id: &str, pmt_info_id: &str) -> Result<bool, StoreError> {
        let key = storage_key::transaction_key(account_id, pmt_info_id);
        Ok(self.get_transaction(&key)?.is_some())
    }

    /// Scans every fresh transaction booked for an account, in insertion order.
    pub fn list_fresh_transactions(&self, account_id: &str) -> Result<Vec<FreshTransaction>, StoreError> {
        self.scan_prefix(CF_FRESH_TRANSACTIONS, &storage_key::fresh_transaction_prefix(account_id))
    }

    /// Scans every closed statement for an account, ordered by key (statement number).
    pub fn list_statements(&self, account_id: &str) -> Result<Vec<Statement>, StoreError> {
        self.scan_prefix(CF_STATEMENTS, &storage_key::statement_prefix(account_id))
    }

    /// Scans every booked transaction for an account.
    pub fn list_transactions(&self, account_id: &str) -> Result<Vec<BankTransaction>, StoreError> {
        self.scan_prefix(CF_TRANSACTIONS, &storage_key::transaction_prefix(account_id))
    }

    /// Scans every account registered under a host.
    pub fn list_accounts(&self, host_id: &str) -> Result<Vec<BankAccount>, StoreError> {
        self.scan_prefix(CF_ACCOUNTS, &storage_key::account_prefix(host_id))
    }

    fn scan_prefix<T: serde::de::DeserializeOwned>(&self, cf_name: &str, prefix: &[u8]) -> Result<Vec<T>, StoreError> {
        let cf = self
            .db
            .cf_handle(cf_name)
            .ok_or_else(|| StoreError::Other(format!("missing cf {cf_name}")))?;
        let mut out = Vec::new();
        let iter = self.txn.iterator_cf(&cf, IteratorMode::From(prefix, rocksdb::Direction::Forward));
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            out.push(encoding::decode(&value)?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ebicsbank_types::{AccountId, HostId};
    use tempfile::TempDir;

    fn open_tmp() -> (TempDir, Store) {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn put_and_get_account_roundtrips() {
        let (_dir, store) = open_tmp();
        let host_id = HostId::new("DEMOBANK1");
        let account_id = AccountId::new("DE11100000000123456789");
        let account = BankAccount::new(host_id.clone(), account_id.clone(), "CUST1");

        store
            .with_retry(|txn| txn.put_account(&storage_key::account_key(&host_id.0, &account_id.0), &account))
            .unwrap();

        let fetched = store
            .read(|txn| txn.get_account(&storage_key::account_key(&host_id.0, &account_id.0)))
            .unwrap();
        assert!(fetched.is_some());
        assert_eq!(fetched.unwrap().account_id, account_id);
    }

    #[test]
    fn fresh_transaction_prefix_scan_is_scoped_per_account() {
        let (_dir, store) = open_tmp();
        let account_a = AccountId::new("ACCA");
        let account_b = AccountId::new("ACCB");

        let mk_tx = |account: &AccountId, pmt: &str| BankTransaction {
            account_id: account.clone(),
            pmt_info_id: pmt.to_string(),
            direction: ebicsbank_types::Direction::Credit,
            amount: rust_decimal::Decimal::new(100, 0),
            currency: "EUR".to_string(),
            counterparty_iban: "X".to_string(),
            counterparty_name: "Y".to_string(),
            remittance_info: String::new(),
            booked_at: 0,
            order_id: None,
        };

        store
            .with_retry(|txn| {
                let fresh_a = FreshTransaction { account_id: account_a.clone(), transaction: mk_tx(&account_a, "P1") };
                let fresh_b = FreshTransaction { account_id: account_b.clone(), transaction: mk_tx(&account_b, "P2") };
                txn.put_fresh_transaction(&storage_key::fresh_transaction_key(&account_a.0, "0"), &fresh_a)?;
                txn.put_fresh_transaction(&storage_key::fresh_transaction_key(&account_b.0, "0"), &fresh_b)?;
                Ok(())
            })
            .unwrap();

        let fresh_for_a = store.read(|txn| txn.list_fresh_transactions(&account_a.0)).unwrap();
        assert_eq!(fresh_for_a.len(), 1);
        assert_eq!(fresh_for_a[0].account_id, account_a);
    }
}
