//! Access-api, integration-api, and taler-wire-gateway routes: the sandbox's
//! direct HTTP surface for customers and wallets, guarded by HTTP Basic Auth
//! (except withdrawal confirm/abort, which rely on the wopid being
//! unguessable instead).

use crate::error::RpcError;
use crate::RpcState;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use ebicsbank_engine::EngineError;
use ebicsbank_exec::ExecError;
use ebicsbank_types::{AccountId, BankTransaction, HostId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

/// Extracts and verifies the `Authorization: Basic ...` header for
/// `host_id`/`customer_id`, returning the authenticated customer ID.
fn basic_auth(headers: &HeaderMap) -> Result<(String, String), RpcError> {
    let raw = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| RpcError::Unauthorized("missing Authorization header".to_string()))?;
    let encoded = raw
        .strip_prefix("Basic ")
        .ok_or_else(|| RpcError::Unauthorized("Authorization header is not HTTP Basic".to_string()))?;
    let decoded = ebicsbank_xml::base64_decode(encoded)
        .map_err(|_| RpcError::Unauthorized("Authorization header is not valid base64".to_string()))?;
    let decoded = String::from_utf8(decoded).map_err(|_| RpcError::Unauthorized("Authorization header is not UTF-8".to_string()))?;
    let (user, pass) = decoded
        .split_once(':')
        .ok_or_else(|| RpcError::Unauthorized("Authorization header is malformed".to_string()))?;
    Ok((user.to_string(), pass.to_string()))
}

fn authenticate(state: &RpcState, host: &HostId, headers: &HeaderMap) -> Result<String, RpcError> {
    let (user, pass) = basic_auth(headers)?;
    let host = host.clone();
    let user_clone = user.clone();
    state
        .executor
        .run_read(|txn, engine| engine.verify_basic_auth(txn, &host, &user_clone, &pass).map_err(ExecError::from))?;
    Ok(user)
}

fn notify_key(host: &str, account: &str) -> (String, String) {
    (host.to_string(), account.to_string())
}

fn account_by_name(state: &RpcState, host: &HostId, name: &str) -> Result<AccountId, RpcError> {
    let host_c = host.clone();
    let name_c = name.to_string();
    let account = state.executor.run_read(|txn, _engine| {
        let accounts = txn.list_accounts(&host_c.0)?;
        Ok(accounts.into_iter().find(|a| a.customer_id == name_c))
    })?;
    account.map(|a| a.account_id).ok_or_else(|| RpcError::NotFound(format!("no account for {name}")))
}

// -- GET /demobanks/{id}/access-api/accounts/{name} -----------------------

#[derive(Serialize)]
pub struct AccountResponse {
    pub account_label: String,
    pub iban: String,
    pub balance: Decimal,
    pub debt_limit: Decimal,
    pub currency: String,
}

pub async fn get_account(
    State(state): State<RpcState>,
    Path((demobankid, name)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<AccountResponse>, RpcError> {
    let host = HostId::new(demobankid);
    authenticate(&state, &host, &headers)?;
    let account_id = account_by_name(&state, &host, &name)?;

    let host_c = host.clone();
    let account_id_c = account_id.clone();
    let account = state
        .executor
        .run_read(|txn, _engine| {
            let key = ebicsbank_store::storage_key::account_key(&host_c.0, &account_id_c.0);
            txn.get_account(&key)?.ok_or(EngineError::AccountNotFound).map_err(ExecError::from)
        })?;

    Ok(Json(AccountResponse {
        account_label: name,
        iban: account.iban,
        balance: account.balance,
        debt_limit: account.debt_limit,
        currency: account.currency,
    }))
}

// -- POST /demobanks/{id}/access-api/accounts/{name}/transactions ---------

#[derive(Deserialize)]
pub struct CreateTransactionRequest {
    pub payto_uri: String,
    pub amount: Option<String>,
    pub pmt_info_id: Option<String>,
}

#[derive(Serialize)]
pub struct CreateTransactionResponse {
    pub transaction_id: String,
}

pub async fn create_transaction(
    State(state): State<RpcState>,
    Path((demobankid, name)): Path<(String, String)>,
    headers: HeaderMap,
    Json(req): Json<CreateTransactionRequest>,
) -> Result<Json<CreateTransactionResponse>, RpcError> {
    let host = HostId::new(demobankid);
    authenticate(&state, &host, &headers)?;
    let account_id = account_by_name(&state, &host, &name)?;

    let (iban, payto_amount) = parse_payto(&req.payto_uri);
    let amount_str = req.amount.or(payto_amount).ok_or_else(|| RpcError::BadRequest("no amount given in body or paytoUri".to_string()))?;
    let amount = Decimal::from_str(&amount_str).map_err(|_| RpcError::BadRequest(format!("invalid amount {amount_str}")))?;
    let pmt_info_id = req.pmt_info_id.unwrap_or_else(|| format!("ACCESS-{}", Uuid::new_v4()));

    let host_c = host.clone();
    let account_id_c = account_id.clone();
    let iban_c = iban.clone();
    let pmt_info_id_c = pmt_info_id.clone();
    let tx = state
        .executor
        .run(|txn, engine| {
            engine
                .book_direct_transfer(txn, &host_c, &account_id_c, &iban_c, amount, "EUR", &pmt_info_id_c, 0)
                .map_err(ExecError::from)
        })?;

    if let Some(m) = state.metrics.as_ref() {
        m.record_ledger_booking("debit", "access-api");
    }
    notify_account(&state, &host.0, &account_id.0);

    Ok(Json(CreateTransactionResponse { transaction_id: tx.pmt_info_id }))
}

/// Parses a minimal `payto://iban/<IBAN>?amount=CUR:VALUE` URI, the only
/// shape the access-api's transaction endpoint needs to understand.
fn parse_payto(uri: &str) -> (String, Option<String>) {
    let without_scheme = uri.trim_start_matches("payto://iban/");
    let (path, query) = without_scheme.split_once('?').unwrap_or((without_scheme, ""));
    let iban = path.split('/').next().unwrap_or(path).to_string();
    let amount = query.split('&').find_map(|kv| {
        let (k, v) = kv.split_once('=')?;
        if k == "amount" {
            v.split_once(':').map(|(_, value)| value.to_string()).or_else(|| Some(v.to_string()))
        } else {
            None
        }
    });
    (iban, amount)
}

fn notify_account(state: &RpcState, host: &str, account: &str) {
    let key = notify_key(host, account);
    if let Some(notify) = state.notify_registry.lock().unwrap().get(&key) {
        notify.notify_waiters();
    }
}

fn notify_for(state: &RpcState, host: &str, account: &str) -> std::sync::Arc<tokio::sync::Notify> {
    state
        .notify_registry
        .lock()
        .unwrap()
        .entry(notify_key(host, account))
        .or_insert_with(|| std::sync::Arc::new(tokio::sync::Notify::new()))
        .clone()
}

// -- GET /demobanks/{id}/access-api/accounts/{name}/transactions ----------

#[derive(Deserialize)]
pub struct ListTransactionsQuery {
    pub page: Option<usize>,
    pub size: Option<usize>,
    pub from_ms: Option<i64>,
    pub until_ms: Option<i64>,
    pub long_poll_ms: Option<u64>,
}

pub async fn list_transactions(
    State(state): State<RpcState>,
    Path((demobankid, name)): Path<(String, String)>,
    headers: HeaderMap,
    Query(q): Query<ListTransactionsQuery>,
) -> Result<Json<Vec<BankTransaction>>, RpcError> {
    let host = HostId::new(demobankid);
    authenticate(&state, &host, &headers)?;
    let account_id = account_by_name(&state, &host, &name)?;

    let fetch = |state: &RpcState| -> Result<Vec<BankTransaction>, RpcError> {
        let account_id_c = account_id.clone();
        let mut txs = state.executor.run_read(|txn, _engine| Ok(txn.list_transactions(&account_id_c.0)?))?;
        txs.retain(|t| {
            q.from_ms.map(|from| t.booked_at >= from).unwrap_or(true)
                && q.until_ms.map(|until| t.booked_at <= until).unwrap_or(true)
        });
        txs.sort_by_key(|t| t.booked_at);
        let size = q.size.unwrap_or(20).max(1);
        let page = q.page.unwrap_or(0);
        Ok(txs.into_iter().skip(page * size).take(size).collect())
    };

    let first = fetch(&state)?;
    if !first.is_empty() || q.long_poll_ms.unwrap_or(0) == 0 {
        return Ok(Json(first));
    }

    // Register interest before re-checking, so a booking landing between
    // the first fetch and the wait can't be missed.
    let notify = notify_for(&state, &host.0, &account_id.0);
    let wait = notify.notified();
    let retried = fetch(&state)?;
    if !retried.is_empty() {
        return Ok(Json(retried));
    }
    let _ = tokio::time::timeout(Duration::from_millis(q.long_poll_ms.unwrap_or(0)), wait).await;
    Ok(Json(fetch(&state)?))
}

// -- Withdrawals -----------------------------------------------------------

#[derive(Deserialize)]
pub struct CreateWithdrawalRequest {
    pub amount: String,
}

#[derive(Serialize)]
pub struct CreateWithdrawalResponse {
    pub withdrawal_id: Uuid,
    pub taler_withdraw_uri: String,
}

pub async fn create_withdrawal(
    State(state): State<RpcState>,
    Path((demobankid, name)): Path<(String, String)>,
    headers: HeaderMap,
    Json(req): Json<CreateWithdrawalRequest>,
) -> Result<Json<CreateWithdrawalResponse>, RpcError> {
    let host = HostId::new(demobankid);
    authenticate(&state, &host, &headers)?;
    let account_id = account_by_name(&state, &host, &name)?;
    let amount = Decimal::from_str(&req.amount).map_err(|_| RpcError::BadRequest(format!("invalid amount {}", req.amount)))?;

    let op = state
        .executor
        .run(|txn, engine| engine.create_withdrawal(txn, &account_id, amount, "EUR", 0).map_err(ExecError::from))?;

    Ok(Json(CreateWithdrawalResponse {
        withdrawal_id: op.wopid,
        taler_withdraw_uri: format!("taler://withdraw/{}/{}", host.0, op.wopid),
    }))
}

#[derive(Serialize)]
pub struct WithdrawalStatusResponse {
    pub withdrawal_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub status: String,
    pub reserve_pub: Option<String>,
    pub selected_exchange: Option<String>,
}

fn withdrawal_status(op: &ebicsbank_types::WithdrawalOp) -> WithdrawalStatusResponse {
    WithdrawalStatusResponse {
        withdrawal_id: op.wopid,
        amount: op.amount,
        currency: op.currency.clone(),
        status: format!("{:?}", op.state),
        reserve_pub: op.reserve_pub.clone(),
        selected_exchange: op.selected_exchange_payto.clone(),
    }
}

pub async fn get_withdrawal(
    State(state): State<RpcState>,
    Path((demobankid, _name, wid)): Path<(String, String, Uuid)>,
    headers: HeaderMap,
) -> Result<Json<WithdrawalStatusResponse>, RpcError> {
    let host = HostId::new(demobankid);
    authenticate(&state, &host, &headers)?;
    let op = state
        .executor
        .run_read(|txn, _engine| {
            let key = ebicsbank_store::storage_key::withdrawal_key(&wid.to_string());
            txn.get_withdrawal(&key)?.ok_or(EngineError::WithdrawalNotFound).map_err(ExecError::from)
        })?;
    Ok(Json(withdrawal_status(&op)))
}

/// Unauthenticated by design: the wopid itself is the bearer credential, as
/// in the EBICS sandbox's withdrawal confirm/abort flow it's modeled on.
pub async fn confirm_withdrawal(
    State(state): State<RpcState>,
    Path((demobankid, _name, wid)): Path<(String, String, Uuid)>,
) -> Result<Json<WithdrawalStatusResponse>, RpcError> {
    let host = HostId::new(demobankid);
    let (op, tx) = state
        .executor
        .run(|txn, engine| engine.confirm_withdrawal(txn, &host, wid, 0).map_err(ExecError::from))?;
    if let Some(m) = state.metrics.as_ref() {
        m.record_ledger_booking("debit", "withdrawal");
    }
    notify_account(&state, &host.0, &tx.account_id.0);
    Ok(Json(withdrawal_status(&op)))
}

pub async fn abort_withdrawal(
    State(state): State<RpcState>,
    Path((_demobankid, _name, wid)): Path<(String, String, Uuid)>,
) -> Result<Json<WithdrawalStatusResponse>, RpcError> {
    let op = state.executor.run(|txn, engine| engine.abort_withdrawal(txn, wid).map_err(ExecError::from))?;
    Ok(Json(withdrawal_status(&op)))
}

// -- Integration-api --------------------------------------------------------

pub async fn get_withdrawal_operation(
    State(state): State<RpcState>,
    Path(wopid): Path<Uuid>,
) -> Result<Json<WithdrawalStatusResponse>, RpcError> {
    let op = state
        .executor
        .run_read(|txn, _engine| {
            let key = ebicsbank_store::storage_key::withdrawal_key(&wopid.to_string());
            txn.get_withdrawal(&key)?.ok_or(EngineError::WithdrawalNotFound).map_err(ExecError::from)
        })?;
    Ok(Json(withdrawal_status(&op)))
}

#[derive(Deserialize)]
pub struct SelectWithdrawalRequest {
    pub reserve_pub: String,
    pub selected_exchange: Option<String>,
}

pub async fn select_withdrawal_operation(
    State(state): State<RpcState>,
    Path(wopid): Path<Uuid>,
    Json(req): Json<SelectWithdrawalRequest>,
) -> Result<Json<WithdrawalStatusResponse>, RpcError> {
    let op = state
        .executor
        .run(|txn, engine| engine.select_withdrawal(txn, wopid, req.reserve_pub.clone(), req.selected_exchange.clone()).map_err(ExecError::from))?;
    Ok(Json(withdrawal_status(&op)))
}

// -- taler-wire-gateway -----------------------------------------------------

#[derive(Deserialize)]
pub struct AddIncomingRequest {
    pub reserve_pub: String,
    pub amount: String,
    pub debit_account: String,
}

#[derive(Serialize)]
pub struct AddIncomingResponse {
    pub transaction_id: String,
}

pub async fn add_incoming(
    State(state): State<RpcState>,
    Path((demobankid, user)): Path<(String, String)>,
    headers: HeaderMap,
    Json(req): Json<AddIncomingRequest>,
) -> Result<Json<AddIncomingResponse>, RpcError> {
    let host = HostId::new(demobankid);
    authenticate(&state, &host, &headers)?;
    let account_id = account_by_name(&state, &host, &user)?;
    let amount = Decimal::from_str(&req.amount).map_err(|_| RpcError::BadRequest(format!("invalid amount {}", req.amount)))?;
    let pmt_info_id = format!("TWG-{}", req.reserve_pub);

    let host_c = host.clone();
    let account_id_c = account_id.clone();
    let debit_account = req.debit_account.clone();
    let pmt_info_id_c = pmt_info_id.clone();
    let tx = state
        .executor
        .run(|txn, engine| {
            engine
                .book_direct_credit(txn, &host_c, &account_id_c, &debit_account, amount, "EUR", &pmt_info_id_c, 0)
                .map_err(ExecError::from)
        })?;

    if let Some(m) = state.metrics.as_ref() {
        m.record_ledger_booking("credit", "taler-wire-gateway");
    }
    notify_account(&state, &host.0, &account_id.0);

    Ok(Json(AddIncomingResponse { transaction_id: tx.pmt_info_id }))
}

pub async fn health() -> impl IntoResponse {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_payto_iban_and_amount() {
        let (iban, amount) = parse_payto("payto://iban/DE11100000000123456789?amount=EUR:12.50&message=hi");
        assert_eq!(iban, "DE11100000000123456789");
        assert_eq!(amount.as_deref(), Some("12.50"));
    }

    #[test]
    fn parses_payto_without_amount() {
        let (iban, amount) = parse_payto("payto://iban/DE11100000000123456789");
        assert_eq!(iban, "DE11100000000123456789");
        assert!(amount.is_none());
    }
}
