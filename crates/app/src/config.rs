use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "ebicsbank")]
#[command(version, about = "EBICS H004 bank sandbox server", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the sandbox's HTTP server, serving `/ebicsweb` and the
    /// access/integration/taler-wire-gateway/admin surfaces on one listener.
    Serve {
        #[arg(long = "rpc.addr", default_value = "0.0.0.0:5000")]
        rpc_addr: String,

        #[arg(long = "db.path", env = "EBICSBANK_DB_PATH", default_value = "./data/ebicsbank_db")]
        db_path: String,

        #[arg(long = "log.debug")]
        debug: bool,

        /// Disables the Prometheus `/metrics` endpoint.
        #[arg(long = "metrics.disable")]
        metrics_disable: bool,
    },

    /// Print the effective configuration and exit, without opening the store.
    Config {
        #[arg(long = "db.path", env = "EBICSBANK_DB_PATH", default_value = "./data/ebicsbank_db")]
        db_path: String,
    },

    /// Books a direct ledger transaction against an account, bypassing
    /// EBICS/access-api transport — scripting and demo seeding.
    MakeTransaction {
        #[arg(long = "db.path", env = "EBICSBANK_DB_PATH", default_value = "./data/ebicsbank_db")]
        db_path: String,

        #[arg(long)]
        demobank: String,

        /// Account label (customer ID) of the account to debit.
        #[arg(long = "debit-account")]
        debit_account: String,

        #[arg(long = "credit-iban")]
        credit_iban: String,

        #[arg(long)]
        amount: String,

        #[arg(long, default_value = "EUR")]
        currency: String,
    },

    /// Forces a camt.053 statement cut for one account, the same operation
    /// the daily statement scheduler runs automatically.
    Camt053Tick {
        #[arg(long = "db.path", env = "EBICSBANK_DB_PATH", default_value = "./data/ebicsbank_db")]
        db_path: String,

        #[arg(long)]
        demobank: String,

        #[arg(long)]
        account: String,
    },

    /// Sets the demobank's suggested exchange payto URI, shown to wallets
    /// that query the demobank config before selecting an exchange.
    DefaultExchange {
        #[arg(long = "db.path", env = "EBICSBANK_DB_PATH", default_value = "./data/ebicsbank_db")]
        db_path: String,

        #[arg(long)]
        demobank: String,

        #[arg(long)]
        payto: String,
    },

    /// Destroys every column family in the embedded store and starts fresh.
    /// Destructive; requires `--yes`.
    ResetTables {
        #[arg(long = "db.path", env = "EBICSBANK_DB_PATH", default_value = "./data/ebicsbank_db")]
        db_path: String,

        #[arg(long)]
        yes: bool,
    },
}

/// The sandbox's resolved runtime settings, assembled once at `serve`
/// startup from CLI flags and environment variables and never mutated
/// afterward.
pub struct Config {
    pub rpc_addr: String,
    pub db_path: String,
    pub debug: bool,
    pub metrics_enabled: bool,
    pub admin_password: Option<String>,
}

impl Config {
    pub fn from_serve_args(rpc_addr: String, db_path: String, debug: bool, metrics_disable: bool) -> Self {
        Self {
            rpc_addr,
            db_path,
            debug,
            metrics_enabled: !metrics_disable,
            admin_password: std::env::var("EBICSBANK_ADMIN_PASSWORD").ok(),
        }
    }
}
