use ebicsbank_exec::Executor;
use ebicsbank_types::{Demobank, HostId};
use rust_decimal::Decimal;

/// Ensures the `"default"` demobank configuration exists, the one runtime
/// invariant spec.md requires ("there is always a `default` demobank").
pub fn ensure_default_demobank(executor: &Executor) -> anyhow::Result<()> {
    tracing::info!("📦 Ensuring default demobank exists...");

    let host_id = HostId::new("default");
    executor.run(|txn, _engine| {
        let key = ebicsbank_store::storage_key::demobank_key(&host_id.0);
        if txn.get_demobank(&key)?.is_some() {
            return Ok(());
        }
        let demobank = Demobank::new(host_id.clone(), "Default Demobank");
        txn.put_demobank(&key, &demobank)?;
        Ok(())
    })?;

    tracing::info!("✅ Default demobank ready");
    Ok(())
}

/// Bootstraps the `default` demobank's host key pair so an HPB request
/// succeeds on the very first call rather than lazily on demand.
pub fn ensure_default_host_keys(executor: &Executor) -> anyhow::Result<()> {
    tracing::info!("🔑 Ensuring default host key pair exists...");
    let host_id = HostId::new("default");
    executor.run(|txn, engine| engine.process_hpb(txn, &host_id).map(|_| ()).map_err(ebicsbank_exec::ExecError::from))?;
    tracing::info!("✅ Default host key pair ready");
    Ok(())
}

/// Sets the debt limit every newly-provisioned account in `host_id` starts
/// with, mirroring spec.md's "demobank ... bank-debt-limit" configuration.
#[allow(dead_code)]
pub fn set_default_debt_limit(executor: &Executor, host_id: &HostId, debt_limit: Decimal) -> anyhow::Result<()> {
    let host_id = host_id.clone();
    executor.run(move |txn, _engine| {
        let key = ebicsbank_store::storage_key::demobank_key(&host_id.0);
        let mut demobank = txn
            .get_demobank(&key)?
            .unwrap_or_else(|| Demobank::new(host_id.clone(), host_id.0.clone()));
        demobank.default_debt_limit = debt_limit;
        txn.put_demobank(&key, &demobank)?;
        Ok(())
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ebicsbank_store::Store;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Executor) {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path()).unwrap();
        (dir, Executor::new(store))
    }

    #[test]
    fn ensure_default_demobank_is_idempotent() {
        let (_dir, executor) = setup();
        ensure_default_demobank(&executor).unwrap();
        ensure_default_demobank(&executor).unwrap();

        let found = executor
            .run_read(|txn, _engine| {
                let key = ebicsbank_store::storage_key::demobank_key("default");
                txn.get_demobank(&key).map_err(ebicsbank_exec::ExecError::from)
            })
            .unwrap();
        assert!(found.is_some());
    }

    #[test]
    fn ensure_default_host_keys_generates_a_key_pair() {
        let (_dir, executor) = setup();
        ensure_default_host_keys(&executor).unwrap();

        let host = executor
            .run_read(|txn, _engine| {
                let key = ebicsbank_store::storage_key::host_key("default");
                txn.get_host(&key).map_err(ebicsbank_exec::ExecError::from)
            })
            .unwrap();
        assert!(host.is_some());
    }
}
