mod config;
mod init;
mod server;

use clap::Parser;
use config::{Cli, Commands, Config};
use ebicsbank_exec::{ExecError, Executor};
use ebicsbank_store::Store;
use ebicsbank_types::{AccountId, HostId};
use rust_decimal::Decimal;
use std::str::FromStr;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { rpc_addr, db_path, debug, metrics_disable } => {
            server::init_tracing(debug);
            let config = Config::from_serve_args(rpc_addr, db_path, debug, metrics_disable);
            server::start_server(config).await?;
        }

        Commands::Config { db_path } => {
            let config = Config::from_serve_args("0.0.0.0:5000".to_string(), db_path, false, false);
            println!("db.path       = {}", config.db_path);
            println!("rpc.addr      = {}", config.rpc_addr);
            println!("admin.password = {}", if config.admin_password.is_some() { "<set>" } else { "<unset>" });
        }

        Commands::MakeTransaction { db_path, demobank, debit_account, credit_iban, amount, currency } => {
            server::init_tracing(false);
            let executor = open_executor(&db_path)?;
            let host_id = HostId::new(demobank);
            let amount = Decimal::from_str(&amount).map_err(|_| anyhow::anyhow!("invalid amount {amount}"))?;

            let account_id = executor
                .run_read(|txn, _engine| {
                    txn.list_accounts(&host_id.0)?
                        .into_iter()
                        .find(|a| a.customer_id == debit_account)
                        .map(|a| a.account_id)
                        .ok_or(ebicsbank_engine::EngineError::AccountNotFound)
                        .map_err(ExecError::from)
                })
                .map_err(|e| anyhow::anyhow!("{e}"))?;

            let pmt_info_id = format!("CLI-{}", uuid::Uuid::new_v4());
            let tx = executor
                .run(|txn, engine| {
                    engine
                        .book_direct_transfer(txn, &host_id, &account_id, &credit_iban, amount, &currency, &pmt_info_id, 0)
                        .map_err(ExecError::from)
                })
                .map_err(|e| anyhow::anyhow!("{e}"))?;

            println!("booked {} {} from {} to {} (pmtInfId={})", tx.amount, tx.currency, debit_account, credit_iban, tx.pmt_info_id);
        }

        Commands::Camt053Tick { db_path, demobank, account } => {
            server::init_tracing(false);
            let executor = open_executor(&db_path)?;
            let host_id = HostId::new(demobank);
            let account_id = AccountId::new(account);

            let statement = executor
                .run(|txn, engine| engine.tick_statement(txn, &host_id, &account_id, 0).map_err(ExecError::from))
                .map_err(|e| anyhow::anyhow!("{e}"))?;

            match statement {
                Some(_) => println!("statement booked for {}", account_id.0),
                None => println!("no fresh transactions for {}, nothing to book", account_id.0),
            }
        }

        Commands::DefaultExchange { db_path, demobank, payto } => {
            server::init_tracing(false);
            let executor = open_executor(&db_path)?;
            let host_id = HostId::new(demobank);

            executor
                .run(|txn, _engine| {
                    let key = ebicsbank_store::storage_key::demobank_key(&host_id.0);
                    let mut config = txn
                        .get_demobank(&key)?
                        .unwrap_or_else(|| ebicsbank_types::Demobank::new(host_id.clone(), host_id.0.clone()));
                    config.suggested_exchange_payto = Some(payto.clone());
                    txn.put_demobank(&key, &config)?;
                    Ok(())
                })
                .map_err(|e: ExecError| anyhow::anyhow!("{e}"))?;

            println!("suggested exchange payto set to {payto}");
        }

        Commands::ResetTables { db_path, yes } => {
            server::init_tracing(false);
            if !yes {
                anyhow::bail!("reset-tables is destructive; pass --yes to confirm");
            }
            Store::reset(&db_path).map_err(|e| anyhow::anyhow!("failed to reset store at {db_path}: {e}"))?;
            println!("store at {db_path} reset");
        }
    }

    Ok(())
}

fn open_executor(db_path: &str) -> anyhow::Result<Executor> {
    let store = Store::open(db_path).map_err(|e| anyhow::anyhow!("failed to open store at {db_path}: {e}"))?;
    Ok(Executor::new(store))
}
