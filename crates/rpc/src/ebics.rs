//! `POST /ebicsweb`: the single EBICS H004 transport endpoint. Detects
//! which of the four request envelopes arrived, then drives key
//! management (INI/HIA/HPB) or the Initialisation/Transfer/Receipt phase
//! machine for downloads and uploads.
//!
//! Every path here answers with a constructed EBICS XML body and HTTP 200,
//! even on business failure — the return code inside the body carries the
//! outcome. The sole exception is a request whose host ID can't even be
//! determined, which falls back to a plain HTTP 400.

use crate::RpcState;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use ebicsbank_engine::{EBICS_DOWNLOAD_POSTPROCESS_DONE, EBICS_INVALID_REQUEST, EBICS_OK};
use ebicsbank_exec::ExecError;
use ebicsbank_types::{AccountId, HostId, OrderType, SubscriberId};
use ebicsbank_xml::{
    Body, DataEncryptionInfo, DataTransfer, EbicsHevRequest, EbicsHevResponse, EbicsNoPubKeyDigestsRequest,
    EbicsRequest, EbicsResponse, EbicsUnsecuredRequest, Header, MutableHeader, OrderDetails, ReturnCode,
    StaticHeader, SupportedVersion,
};
use quick_xml::events::Event;
use quick_xml::Reader;

const XML_CONTENT_TYPE: &str = "text/xml; charset=UTF-8";
const PROTOCOL_VERSION: &str = "H004";

pub async fn ebicsweb(State(state): State<RpcState>, body: Bytes) -> Response {
    let text = match std::str::from_utf8(&body) {
        Ok(t) => t,
        Err(_) => return undeterminable_host_response("request body is not valid UTF-8"),
    };

    match root_tag(text).as_deref() {
        Some("ebicsHEVRequest") => handle_hev(text),
        Some("ebicsUnsecuredRequest") => handle_unsecured(&state, text),
        Some("ebicsNoPubKeyDigestsRequest") => handle_no_pubkey_digests(&state, text),
        Some("ebicsRequest") => handle_secured(&state, text),
        _ => undeterminable_host_response("unrecognized EBICS request envelope"),
    }
}

/// Scans for the first start tag's local name, to dispatch without fully
/// deserializing a body whose shape we don't know yet.
fn root_tag(xml: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let local = e.name().local_name().as_ref().to_vec();
                return String::from_utf8(local).ok();
            }
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
        buf.clear();
    }
}

fn undeterminable_host_response(reason: &str) -> Response {
    (StatusCode::BAD_REQUEST, reason.to_string()).into_response()
}

fn xml_response(body: String) -> Response {
    ([(header::CONTENT_TYPE, XML_CONTENT_TYPE)], body).into_response()
}

// -- ebicsHEVRequest ------------------------------------------------------

fn handle_hev(text: &str) -> Response {
    let request: EbicsHevRequest = match quick_xml::de::from_str(text) {
        Ok(r) => r,
        Err(_) => return undeterminable_host_response("malformed ebicsHEVRequest"),
    };
    if request.host_id.trim().is_empty() {
        return undeterminable_host_response("ebicsHEVRequest is missing HostID");
    }

    let response = EbicsHevResponse {
        system_return_code: ReturnCode { report_text: "EBICS_OK".to_string(), value: EBICS_OK.to_string() },
        version_number: vec![SupportedVersion { protocol_version: PROTOCOL_VERSION.to_string(), order_id: Vec::new() }],
    };
    match quick_xml::se::to_string_with_root("ebicsHEVResponse", &response) {
        Ok(xml) => xml_response(xml),
        Err(_) => undeterminable_host_response("failed to render ebicsHEVResponse"),
    }
}

// -- ebicsUnsecuredRequest (INI/HIA) --------------------------------------

fn handle_unsecured(state: &RpcState, text: &str) -> Response {
    let request: EbicsUnsecuredRequest = match quick_xml::de::from_str(text) {
        Ok(r) => r,
        Err(_) => return undeterminable_host_response("malformed ebicsUnsecuredRequest"),
    };
    let Some(host_raw) = request.header.static_header.host_id.clone() else {
        return undeterminable_host_response("ebicsUnsecuredRequest is missing HostID");
    };
    let Some(user_raw) = request.header.static_header.user_id.clone() else {
        return undeterminable_host_response("ebicsUnsecuredRequest is missing UserID");
    };
    let host = HostId::new(host_raw);
    let user = SubscriberId::new(user_raw);
    let order_code = request
        .header
        .static_header
        .order_details
        .as_ref()
        .map(|d| d.order_type.clone())
        .unwrap_or_default();

    let order_data_xml = match decode_order_data(&request.body) {
        Ok(xml) => xml,
        Err(_) => {
            return key_management_response(&host, EBICS_INVALID_REQUEST, "order data could not be decoded");
        }
    };

    let order_type = OrderType::from_wire_code(&order_code);
    let result: Result<(), ExecError> = state.executor.run(|txn, engine| match order_type {
        Some(OrderType::Ini) => engine.process_ini(txn, &host, &user, &order_data_xml).map_err(ExecError::from),
        Some(OrderType::Hia) => engine.process_hia(txn, &host, &user, &order_data_xml).map_err(ExecError::from),
        _ => Err(ExecError::Engine(ebicsbank_engine::EngineError::UnknownOrderType)),
    });

    match result {
        Ok(()) => {
            record_order_metric(state, &order_code, "ok");
            key_management_response(&host, EBICS_OK, "OK")
        }
        Err(err) => {
            record_order_metric(state, &order_code, "error");
            key_management_response(&host, err.ebics_return_code(), &err.to_string())
        }
    }
}

fn decode_order_data(body: &Body) -> Result<String, ()> {
    let order_data_b64 = body.data_transfer.as_ref().map(|dt| dt.order_data.as_str()).ok_or(())?;
    let compressed = ebicsbank_xml::base64_decode(order_data_b64).map_err(|_| ())?;
    let inflated = ebicsbank_xml::inflate(&compressed).map_err(|_| ())?;
    String::from_utf8(inflated).map_err(|_| ())
}

fn key_management_response(host: &HostId, return_code: &str, report_text: &str) -> Response {
    let response = EbicsResponse {
        version: PROTOCOL_VERSION.to_string(),
        header: Header {
            static_header: StaticHeader { host_id: Some(host.0.clone()), ..Default::default() },
            mutable: MutableHeader {
                return_code: Some(return_code.to_string()),
                report_text: Some(report_text.to_string()),
                ..Default::default()
            },
        },
        body: Body { return_code: Some(return_code.to_string()), ..Default::default() },
    };
    render_response(response)
}

fn render_response(response: EbicsResponse) -> Response {
    match quick_xml::se::to_string_with_root("ebicsResponse", &response) {
        Ok(xml) => xml_response(xml),
        Err(_) => undeterminable_host_response("failed to render ebicsResponse"),
    }
}

fn record_order_metric(state: &RpcState, order_type: &str, outcome: &str) {
    if let Some(metrics) = state.metrics.as_ref() {
        metrics.record_ebics_order(order_type, outcome);
    }
}

// -- ebicsNoPubKeyDigestsRequest (HPB) -------------------------------------

fn handle_no_pubkey_digests(state: &RpcState, text: &str) -> Response {
    let request: EbicsNoPubKeyDigestsRequest = match quick_xml::de::from_str(text) {
        Ok(r) => r,
        Err(_) => return undeterminable_host_response("malformed ebicsNoPubKeyDigestsRequest"),
    };
    let Some(host_raw) = request.header.static_header.host_id.clone() else {
        return undeterminable_host_response("ebicsNoPubKeyDigestsRequest is missing HostID");
    };
    let Some(user_raw) = request.header.static_header.user_id.clone() else {
        return undeterminable_host_response("ebicsNoPubKeyDigestsRequest is missing UserID");
    };
    let host = HostId::new(host_raw);
    let user = SubscriberId::new(user_raw);

    let result = state.executor.run(|txn, engine| {
        let download_tx = engine.start_download(txn, &host, &user, None, OrderType::Hpb, 0)?;
        engine.close_download(txn, &host, &download_tx.transaction_id.0)?;
        Ok(download_tx)
    });

    match result {
        Ok(download_tx) => {
            record_order_metric(state, "HPB", "ok");
            let Some(segment) = download_tx.segments.first() else {
                return key_management_response(&host, ebicsbank_engine::EBICS_PROCESSING_ERROR, "empty HPB payload");
            };
            let wrapped_key = wire_transaction_key(&download_tx.transaction_key);
            let response = EbicsResponse {
                version: PROTOCOL_VERSION.to_string(),
                header: Header {
                    static_header: StaticHeader {
                        host_id: Some(host.0.clone()),
                        transaction_id: Some(download_tx.transaction_id.0.clone()),
                        ..Default::default()
                    },
                    mutable: MutableHeader {
                        transaction_phase: Some("Initialisation".to_string()),
                        segment_number: Some(1),
                        return_code: Some(EBICS_OK.to_string()),
                        report_text: Some("OK".to_string()),
                        ..Default::default()
                    },
                },
                body: Body {
                    data_transfer: Some(DataTransfer {
                        data_encryption_info: Some(DataEncryptionInfo {
                            encryption_pub_key_digest: None,
                            transaction_key: ebicsbank_xml::base64_encode(&wrapped_key),
                        }),
                        order_data: ebicsbank_xml::base64_encode(segment),
                    }),
                    return_code: Some(EBICS_OK.to_string()),
                    auth_signature: None,
                },
            };
            render_response(response)
        }
        Err(err) => {
            record_order_metric(state, "HPB", "error");
            key_management_response(&host, err.ebics_return_code(), &err.to_string())
        }
    }
}

/// The stored `transaction_key` is `iv || wrapped_key`; the wire only
/// carries the wrapped AES key since E002 always uses a fixed zero IV.
fn wire_transaction_key(stored: &[u8]) -> Vec<u8> {
    stored.get(16..).map(|s| s.to_vec()).unwrap_or_default()
}

fn stored_transaction_key(wire_wrapped_key: &[u8]) -> Vec<u8> {
    let mut key_material = vec![0u8; 16];
    key_material.extend_from_slice(wire_wrapped_key);
    key_material
}

// -- ebicsRequest (full phase machine) -------------------------------------

fn handle_secured(state: &RpcState, text: &str) -> Response {
    let request: EbicsRequest = match quick_xml::de::from_str(text) {
        Ok(r) => r,
        Err(_) => return undeterminable_host_response("malformed ebicsRequest"),
    };
    let Some(host_raw) = request.header.static_header.host_id.clone() else {
        return undeterminable_host_response("ebicsRequest is missing HostID");
    };
    let host = HostId::new(host_raw);
    let user_id = request.header.static_header.user_id.clone();
    let transaction_id = request.header.static_header.transaction_id.clone();
    let phase = request.header.mutable.transaction_phase.clone().unwrap_or_else(|| "Initialisation".to_string());

    let outcome = match phase.as_str() {
        "Initialisation" => handle_initialisation(state, &host, user_id.as_deref(), &request),
        "Transfer" => handle_transfer(state, &host, transaction_id.as_deref(), &request),
        "Receipt" => handle_receipt(state, &host, transaction_id.as_deref()),
        other => Err(PhaseError::BadRequest(format!("unknown transaction phase {other}"))),
    };

    match outcome {
        Ok(response) => render_response(response),
        Err(PhaseError::Exec(order_type, err)) => {
            record_order_metric(state, order_type.as_deref().unwrap_or("?"), "error");
            phase_error_response(&host, transaction_id.as_deref(), &phase, err.ebics_return_code(), &err.to_string())
        }
        Err(PhaseError::BadRequest(msg)) => {
            phase_error_response(&host, transaction_id.as_deref(), &phase, EBICS_INVALID_REQUEST, &msg)
        }
    }
}

enum PhaseError {
    Exec(Option<String>, ExecError),
    BadRequest(String),
}

fn phase_error_response(host: &HostId, transaction_id: Option<&str>, phase: &str, return_code: &str, report_text: &str) -> EbicsResponse {
    EbicsResponse {
        version: PROTOCOL_VERSION.to_string(),
        header: Header {
            static_header: StaticHeader {
                host_id: Some(host.0.clone()),
                transaction_id: transaction_id.map(|s| s.to_string()),
                ..Default::default()
            },
            mutable: MutableHeader {
                transaction_phase: Some(phase.to_string()),
                return_code: Some(return_code.to_string()),
                report_text: Some(report_text.to_string()),
                ..Default::default()
            },
        },
        body: Body { return_code: Some(return_code.to_string()), ..Default::default() },
    }
}

fn handle_initialisation(
    state: &RpcState,
    host: &HostId,
    user_id: Option<&str>,
    request: &EbicsRequest,
) -> Result<EbicsResponse, PhaseError> {
    let user_id = user_id.ok_or_else(|| PhaseError::BadRequest("ebicsRequest is missing UserID".to_string()))?;
    let user = SubscriberId::new(user_id);
    let order_code = request
        .header
        .static_header
        .order_details
        .as_ref()
        .map(|d| d.order_type.clone())
        .unwrap_or_default();
    let order_type = OrderType::from_wire_code(&order_code)
        .ok_or_else(|| PhaseError::BadRequest(format!("unknown order type {order_code}")))?;

    if order_type.is_upload() {
        let wrapped_key = request
            .body
            .data_transfer
            .as_ref()
            .and_then(|dt| dt.data_encryption_info.as_ref())
            .map(|di| di.transaction_key.as_str())
            .ok_or_else(|| PhaseError::BadRequest("upload is missing DataEncryptionInfo".to_string()))?;
        let wrapped_key = ebicsbank_xml::base64_decode(wrapped_key)
            .map_err(|e| PhaseError::BadRequest(format!("invalid TransactionKey: {e}")))?;
        let key_material = stored_transaction_key(&wrapped_key);

        let host = host.clone();
        let upload_tx = state
            .executor
            .run(|txn, engine| {
                engine.start_upload(txn, &host, &user, order_type, key_material.clone(), 1).map_err(ExecError::from)
            })
            .map_err(|err| PhaseError::Exec(Some(order_code.clone()), err))?;

        record_order_metric(state, &order_code, "ok");
        Ok(EbicsResponse {
            version: PROTOCOL_VERSION.to_string(),
            header: Header {
                static_header: StaticHeader {
                    host_id: Some(host.0.clone()),
                    transaction_id: Some(upload_tx.transaction_id.0.clone()),
                    order_details: Some(OrderDetails {
                        order_type: order_code.clone(),
                        order_id: Some(upload_tx.order_id.0.clone()),
                        order_attribute: None,
                    }),
                    ..Default::default()
                },
                mutable: MutableHeader {
                    transaction_phase: Some("Initialisation".to_string()),
                    return_code: Some(EBICS_OK.to_string()),
                    report_text: Some("OK".to_string()),
                    ..Default::default()
                },
            },
            body: Body { return_code: Some(EBICS_OK.to_string()), ..Default::default() },
        })
    } else {
        let account_id = resolve_account(state, host, &user).map_err(|err| PhaseError::Exec(Some(order_code.clone()), err))?;
        let host = host.clone();
        let download_tx = state
            .executor
            .run(|txn, engine| {
                engine
                    .start_download(txn, &host, &user, account_id.as_ref(), order_type, 0)
                    .map_err(ExecError::from)
            })
            .map_err(|err| PhaseError::Exec(Some(order_code.clone()), err))?;

        record_order_metric(state, &order_code, "ok");
        let first_segment = download_tx.segments.first().cloned().unwrap_or_default();
        let wrapped_key = wire_transaction_key(&download_tx.transaction_key);
        Ok(EbicsResponse {
            version: PROTOCOL_VERSION.to_string(),
            header: Header {
                static_header: StaticHeader {
                    host_id: Some(host.0.clone()),
                    transaction_id: Some(download_tx.transaction_id.0.clone()),
                    order_details: Some(OrderDetails {
                        order_type: order_code.clone(),
                        order_id: Some(download_tx.order_id.0.clone()),
                        order_attribute: None,
                    }),
                    ..Default::default()
                },
                mutable: MutableHeader {
                    transaction_phase: Some("Initialisation".to_string()),
                    segment_number: Some(1),
                    return_code: Some(EBICS_OK.to_string()),
                    report_text: Some("OK".to_string()),
                    ..Default::default()
                },
            },
            body: Body {
                data_transfer: Some(DataTransfer {
                    data_encryption_info: Some(DataEncryptionInfo {
                        encryption_pub_key_digest: None,
                        transaction_key: ebicsbank_xml::base64_encode(&wrapped_key),
                    }),
                    order_data: ebicsbank_xml::base64_encode(&first_segment),
                }),
                return_code: Some(EBICS_OK.to_string()),
                auth_signature: None,
            },
        })
    }
}

/// Resolves the one account this sandbox currently associates with a
/// subscriber, via its partner's customer ID. `Ok(None)` for order types
/// (HKD/TSD) that aren't scoped to a single account.
fn resolve_account(state: &RpcState, host: &HostId, user: &SubscriberId) -> Result<Option<AccountId>, ExecError> {
    let host = host.clone();
    let user = user.clone();
    state.executor.run_read(|txn, engine| {
        let subscriber = engine.subscriber(txn, &host, &user)?;
        let accounts = txn.list_accounts(&host.0)?;
        Ok(accounts.into_iter().find(|a| a.customer_id == subscriber.partner_id).map(|a| a.account_id))
    })
}

fn handle_transfer(
    state: &RpcState,
    host: &HostId,
    transaction_id: Option<&str>,
    request: &EbicsRequest,
) -> Result<EbicsResponse, PhaseError> {
    let transaction_id = transaction_id
        .ok_or_else(|| PhaseError::BadRequest("Transfer phase is missing TransactionID".to_string()))?
        .to_string();
    let segment_number = request.header.mutable.segment_number.unwrap_or(1);

    // An upload transaction exists only while its segments are still being
    // gathered; a download transaction exists for the whole Transfer phase.
    // Try upload first since it is the side this sandbox actually finalizes here.
    let host_clone = host.clone();
    let upload_probe = state.executor.run_read(|txn, _engine| Ok(txn.get_upload_tx(
        &ebicsbank_store::storage_key::upload_tx_key(&host_clone.0, &transaction_id),
    )?));
    let is_upload = matches!(upload_probe, Ok(Some(_)));

    if is_upload {
        handle_upload_transfer(state, host, &transaction_id, segment_number, request)
    } else {
        handle_download_transfer(state, host, &transaction_id, segment_number)
    }
}

fn handle_upload_transfer(
    state: &RpcState,
    host: &HostId,
    transaction_id: &str,
    segment_number: u32,
    request: &EbicsRequest,
) -> Result<EbicsResponse, PhaseError> {
    let ciphertext = request
        .body
        .data_transfer
        .as_ref()
        .map(|dt| dt.order_data.as_str())
        .ok_or_else(|| PhaseError::BadRequest("Transfer upload is missing OrderData".to_string()))?;
    let ciphertext =
        ebicsbank_xml::base64_decode(ciphertext).map_err(|e| PhaseError::BadRequest(format!("invalid OrderData: {e}")))?;

    let host_c = host.clone();
    let tx_id = transaction_id.to_string();
    let is_last = state
        .executor
        .run(|txn, engine| {
            engine.receive_upload_segment(txn, &host_c, &tx_id, segment_number, ciphertext.clone()).map_err(ExecError::from)
        })
        .map_err(|err| PhaseError::Exec(None, err))?;

    if !is_last {
        return Ok(EbicsResponse {
            version: PROTOCOL_VERSION.to_string(),
            header: Header {
                static_header: StaticHeader { host_id: Some(host.0.clone()), transaction_id: Some(transaction_id.to_string()), ..Default::default() },
                mutable: MutableHeader {
                    transaction_phase: Some("Transfer".to_string()),
                    segment_number: Some(segment_number),
                    return_code: Some(EBICS_OK.to_string()),
                    report_text: Some("OK".to_string()),
                    ..Default::default()
                },
            },
            body: Body { return_code: Some(EBICS_OK.to_string()), ..Default::default() },
        });
    }

    let auth_signature = request
        .body
        .auth_signature
        .clone()
        .ok_or_else(|| PhaseError::BadRequest("final upload segment is missing the order signature".to_string()))?;

    let host_c = host.clone();
    let tx_id = transaction_id.to_string();
    let booked = state
        .executor
        .run(|txn, engine| {
            let upload_tx = txn
                .get_upload_tx(&ebicsbank_store::storage_key::upload_tx_key(&host_c.0, &tx_id))?
                .ok_or(ebicsbank_engine::EngineError::TransactionNotFound)
                .map_err(ExecError::from)?;
            let account_id = txn
                .list_accounts(&host_c.0)?
                .into_iter()
                .find(|a| {
                    engine
                        .subscriber(txn, &host_c, &upload_tx.user_id)
                        .map(|s| s.partner_id == a.customer_id)
                        .unwrap_or(false)
                })
                .map(|a| a.account_id)
                .ok_or(ebicsbank_engine::EngineError::AccountNotFound)
                .map_err(ExecError::from)?;
            engine
                .finalize_upload(txn, &host_c, &upload_tx.user_id, &account_id, &tx_id, &auth_signature, 0)
                .map_err(ExecError::from)
        })
        .map_err(|err| PhaseError::Exec(None, err))?;

    if let Some(metrics) = state.metrics.as_ref() {
        for entry in &booked {
            metrics.record_ledger_booking(match entry.direction {
                ebicsbank_types::Direction::Debit => "debit",
                ebicsbank_types::Direction::Credit => "credit",
            }, "cct");
        }
    }

    Ok(EbicsResponse {
        version: PROTOCOL_VERSION.to_string(),
        header: Header {
            static_header: StaticHeader { host_id: Some(host.0.clone()), transaction_id: Some(transaction_id.to_string()), ..Default::default() },
            mutable: MutableHeader {
                transaction_phase: Some("Transfer".to_string()),
                segment_number: Some(segment_number),
                return_code: Some(EBICS_OK.to_string()),
                report_text: Some("OK".to_string()),
                ..Default::default()
            },
        },
        body: Body { return_code: Some(EBICS_OK.to_string()), ..Default::default() },
    })
}

fn handle_download_transfer(state: &RpcState, host: &HostId, transaction_id: &str, segment_number: u32) -> Result<EbicsResponse, PhaseError> {
    let host_c = host.clone();
    let tx_id = transaction_id.to_string();
    let segment = state
        .executor
        .run(|txn, engine| engine.transfer_download_segment(txn, &host_c, &tx_id, segment_number).map_err(ExecError::from))
        .map_err(|err| PhaseError::Exec(None, err))?;

    Ok(EbicsResponse {
        version: PROTOCOL_VERSION.to_string(),
        header: Header {
            static_header: StaticHeader { host_id: Some(host.0.clone()), transaction_id: Some(transaction_id.to_string()), ..Default::default() },
            mutable: MutableHeader {
                transaction_phase: Some("Transfer".to_string()),
                segment_number: Some(segment_number),
                return_code: Some(EBICS_OK.to_string()),
                report_text: Some("OK".to_string()),
                ..Default::default()
            },
        },
        body: Body {
            data_transfer: Some(DataTransfer { data_encryption_info: None, order_data: ebicsbank_xml::base64_encode(&segment) }),
            return_code: Some(EBICS_OK.to_string()),
            auth_signature: None,
        },
    })
}

fn handle_receipt(state: &RpcState, host: &HostId, transaction_id: Option<&str>) -> Result<EbicsResponse, PhaseError> {
    let transaction_id = transaction_id
        .ok_or_else(|| PhaseError::BadRequest("Receipt phase is missing TransactionID".to_string()))?
        .to_string();

    let host_c = host.clone();
    let tx_id = transaction_id.clone();
    state
        .executor
        .run(|txn, engine| engine.close_download(txn, &host_c, &tx_id).map_err(ExecError::from))
        .map_err(|err| PhaseError::Exec(None, err))?;

    Ok(EbicsResponse {
        version: PROTOCOL_VERSION.to_string(),
        header: Header {
            static_header: StaticHeader { host_id: Some(host.0.clone()), transaction_id: Some(transaction_id), ..Default::default() },
            mutable: MutableHeader {
                transaction_phase: Some("Receipt".to_string()),
                return_code: Some(EBICS_DOWNLOAD_POSTPROCESS_DONE.to_string()),
                report_text: Some("download postprocessing done".to_string()),
                ..Default::default()
            },
        },
        body: Body { return_code: Some(EBICS_DOWNLOAD_POSTPROCESS_DONE.to_string()), ..Default::default() },
    })
}
