//! Wraps one EBICS HTTP request's work in a single serializable store
//! transaction, retrying on conflict and surfacing the richer
//! [`ExecError`] the request actually failed with rather than the
//! generic conflict sentinel the store layer retries on.

mod error;

pub use error::{ExecError, Result};

use ebicsbank_engine::Engine;
use ebicsbank_store::{Store, StoreTxn};
use std::cell::RefCell;

/// Owns the store and the stateless [`Engine`] facade, and runs request
/// handlers against them with automatic conflict retry.
pub struct Executor {
    store: Store,
    engine: Engine,
}

impl Executor {
    pub fn new(store: Store) -> Self {
        Self { store, engine: Engine::new() }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Runs `f` inside a fresh serializable transaction, retrying on
    /// conflict. `f`'s own errors (auth, engine, xml) are captured and
    /// returned as-is; only a store-layer conflict is retried.
    pub fn run<F, T>(&self, mut f: F) -> Result<T>
    where
        F: FnMut(&StoreTxn<'_>, &Engine) -> Result<T>,
    {
        let captured: RefCell<Option<ExecError>> = RefCell::new(None);
        let outcome = self.store.with_retry(|txn| match f(txn, &self.engine) {
            Ok(value) => Ok(value),
            Err(ExecError::Store(store_err)) => Err(store_err),
            Err(other) => {
                *captured.borrow_mut() = Some(other);
                Err(ebicsbank_store::error::StoreError::Other("request handler failed".to_string()))
            }
        });

        match outcome {
            Ok(value) => Ok(value),
            Err(store_err) => match captured.into_inner() {
                Some(real_err) => Err(real_err),
                None => Err(ExecError::Store(store_err)),
            },
        }
    }

    /// Runs `f` inside a read-only transaction snapshot, for GET-style
    /// access-api and integration-api endpoints.
    pub fn run_read<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&StoreTxn<'_>, &Engine) -> Result<T>,
    {
        let captured: RefCell<Option<ExecError>> = RefCell::new(None);
        let outcome = self.store.read(|txn| match f(txn, &self.engine) {
            Ok(value) => Ok(value),
            Err(ExecError::Store(store_err)) => Err(store_err),
            Err(other) => {
                *captured.borrow_mut() = Some(other);
                Err(ebicsbank_store::error::StoreError::Other("request handler failed".to_string()))
            }
        });

        match outcome {
            Ok(value) => Ok(value),
            Err(store_err) => match captured.into_inner() {
                Some(real_err) => Err(real_err),
                None => Err(ExecError::Store(store_err)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ebicsbank_types::{AccountId, BankAccount, HostId};
    use tempfile::TempDir;

    #[test]
    fn run_commits_on_success_and_surfaces_engine_errors() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let executor = Executor::new(store);
        let host_id = HostId::new("DEMOBANK1");
        let account_id = AccountId::new("DE11100000000123456789");

        executor
            .run(|txn, _engine| {
                let account = BankAccount::new(host_id.clone(), account_id.clone(), "CUST1");
                let key = ebicsbank_store::storage_key::account_key(&host_id.0, &account_id.0);
                txn.put_account(&key, &account).map_err(ExecError::from)
            })
            .unwrap();

        let found = executor
            .run_read(|txn, _engine| {
                let key = ebicsbank_store::storage_key::account_key(&host_id.0, &account_id.0);
                txn.get_account(&key).map_err(ExecError::from)
            })
            .unwrap();
        assert!(found.is_some());

        let err = executor
            .run(|txn, engine| {
                engine
                    .process_ini(txn, &host_id, &ebicsbank_types::SubscriberId::new("BADUSER"), "not valid xml")
                    .map_err(ExecError::from)
            })
            .unwrap_err();
        assert_eq!(err.ebics_return_code(), ebicsbank_engine::EBICS_PROCESSING_ERROR);
    }
}
