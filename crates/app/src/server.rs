use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::init;
use ebicsbank_exec::Executor;
use ebicsbank_rpc::{Metrics, RpcState};
use ebicsbank_store::Store;

/// Initializes the tracing subscriber, honoring `RUST_LOG` when set and
/// falling back to `--log.debug`'s level otherwise.
pub fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_level)).unwrap();

    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn log_startup_info(config: &Config) {
    tracing::info!("🚀 Starting EBICS bank sandbox");
    tracing::info!("  RPC: {}", config.rpc_addr);
    tracing::info!("  DB:  {}", config.db_path);
    tracing::info!("  Metrics: {}", if config.metrics_enabled { "enabled" } else { "disabled" });
    tracing::info!("  Log level: {}", if config.debug { "debug" } else { "info" });
    if config.admin_password.is_none() {
        tracing::warn!("⚠️  EBICSBANK_ADMIN_PASSWORD is not set; admin routes accept any credential");
    }
}

/// Starts the sandbox daemon: opens the store, ensures the default
/// demobank and host keys exist, and serves the HTTP surface until the
/// process is asked to stop.
pub async fn start_server(config: Config) -> anyhow::Result<()> {
    log_startup_info(&config);

    let store = Store::open(&config.db_path).map_err(|e| anyhow::anyhow!("failed to open store at {}: {e}", config.db_path))?;
    let executor = Executor::new(store);

    init::ensure_default_demobank(&executor)?;
    init::ensure_default_host_keys(&executor)?;

    let rpc_state = if config.metrics_enabled {
        RpcState::new_with_metrics(executor, Metrics::new().map_err(|e| anyhow::anyhow!("failed to init metrics: {e}"))?)
    } else {
        RpcState::new(executor)
    };

    tracing::info!("✅ EBICS bank sandbox started");
    tracing::info!("Press Ctrl+C to stop");

    ebicsbank_rpc::start_server(rpc_state, &config.rpc_addr).await.map_err(|e| anyhow::anyhow!("{e}"))
}
