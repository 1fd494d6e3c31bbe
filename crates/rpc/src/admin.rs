//! `/admin/*`: host/subscriber/customer provisioning and statement forcing,
//! the operator-facing surface a demobank is set up and run through rather
//! than the protocol surfaces a subscriber or wallet talks to.

use crate::error::RpcError;
use crate::RpcState;
use axum::extract::{Path, State};
use axum::Json;
use ebicsbank_exec::ExecError;
use ebicsbank_types::{AccountId, BankAccount, Customer, HostId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Deserialize)]
pub struct CreateCustomerRequest {
    pub customer_id: String,
    pub name: String,
    pub password: String,
    pub iban: String,
    pub debt_limit: Option<String>,
}

#[derive(Serialize)]
pub struct CreateCustomerResponse {
    pub customer_id: String,
    pub account_id: String,
}

/// Provisions a customer, its basic-auth credential, and its one bank
/// account, all in a single admin call for demo convenience.
pub async fn create_customer(
    State(state): State<RpcState>,
    Path(demobankid): Path<String>,
    Json(req): Json<CreateCustomerRequest>,
) -> Result<Json<CreateCustomerResponse>, RpcError> {
    let host = HostId::new(demobankid);
    let debt_limit = match req.debt_limit {
        Some(raw) => Decimal::from_str(&raw).map_err(|_| RpcError::BadRequest(format!("invalid debt_limit {raw}")))?,
        None => Decimal::ZERO,
    };

    let host_c = host.clone();
    let customer_id = req.customer_id.clone();
    let customer_id_resp = customer_id.clone();
    let account_id = AccountId::new(req.iban.clone());
    let account_id_c = account_id.clone();
    let account_id_resp = account_id.0.clone();
    let password_hash = state.executor.run_read(|_txn, engine| engine.hash_customer_password(&req.password).map_err(ExecError::from))?;

    state
        .executor
        .run(move |txn, _engine| {
            let customer = Customer { host_id: host_c.clone(), customer_id: customer_id.clone(), name: req.name.clone(), password_hash: password_hash.clone() };
            txn.put_customer(&ebicsbank_store::storage_key::customer_key(&host_c.0, &customer_id), &customer)?;

            let mut account = BankAccount::new(host_c.clone(), account_id_c.clone(), customer_id.clone());
            account.debt_limit = debt_limit;
            txn.put_account(&ebicsbank_store::storage_key::account_key(&host_c.0, &account_id_c.0), &account)?;
            Ok(())
        })
        .map_err(RpcError::from)?;

    Ok(Json(CreateCustomerResponse { customer_id: customer_id_resp, account_id: account_id_resp }))
}

#[derive(Serialize)]
pub struct TickStatementResponse {
    pub account_id: String,
    pub booked: bool,
}

/// Forces a `camt053tick`-equivalent statement cut for one account, the
/// admin-surface analogue of the `camt053tick` CLI command.
pub async fn tick_statement(
    State(state): State<RpcState>,
    Path((demobankid, account)): Path<(String, String)>,
) -> Result<Json<TickStatementResponse>, RpcError> {
    let host = HostId::new(demobankid);
    let account_id = AccountId::new(account);

    let host_c = host.clone();
    let account_id_c = account_id.clone();
    let statement = state
        .executor
        .run(|txn, engine| engine.tick_statement(txn, &host_c, &account_id_c, 0).map_err(ExecError::from))?;

    Ok(Json(TickStatementResponse { account_id: account_id.0, booked: statement.is_some() }))
}

#[derive(Serialize)]
pub struct HostInfoResponse {
    pub host_id: String,
}

/// Ensures a host identity (and its HPB-serviceable key pair) exists;
/// `process_hpb` creates the host's RSA key pair lazily on first call and is
/// a no-op against an already-provisioned host.
pub async fn ensure_host(State(state): State<RpcState>, Path(demobankid): Path<String>) -> Result<Json<HostInfoResponse>, RpcError> {
    let host = HostId::new(demobankid);
    let host_c = host.clone();
    state.executor.run(|txn, engine| engine.process_hpb(txn, &host_c).map(|_| ()).map_err(ExecError::from))?;
    Ok(Json(HostInfoResponse { host_id: host.0 }))
}
