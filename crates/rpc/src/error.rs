use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Sandbox HTTP error taxonomy for the access-api, integration-api, and
/// admin surfaces. The EBICS transport endpoint never produces one of
/// these: it always answers with a signed (or, for HEV, unsigned) XML body.
#[derive(Error, Debug)]
pub enum RpcError {
    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    UnprocessableEntity(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    InternalServerError(String),
}

impl RpcError {
    fn kind(&self) -> &'static str {
        match self {
            RpcError::Forbidden(_) => "Forbidden",
            RpcError::Unauthorized(_) => "Unauthorized",
            RpcError::NotFound(_) => "NotFound",
            RpcError::Conflict(_) => "Conflict",
            RpcError::UnprocessableEntity(_) => "UnprocessableEntity",
            RpcError::BadRequest(_) => "BadRequest",
            RpcError::InternalServerError(_) => "InternalServerError",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            RpcError::Forbidden(_) => StatusCode::FORBIDDEN,
            RpcError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            RpcError::NotFound(_) => StatusCode::NOT_FOUND,
            RpcError::Conflict(_) => StatusCode::CONFLICT,
            RpcError::UnprocessableEntity(_) => StatusCode::UNPROCESSABLE_ENTITY,
            RpcError::BadRequest(_) => StatusCode::BAD_REQUEST,
            RpcError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    #[serde(rename = "type")]
    kind: &'static str,
    description: String,
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            error: ErrorDetail { kind: self.kind(), description: self.to_string() },
        };
        (status, Json(body)).into_response()
    }
}

/// Maps an executor-layer failure onto the sandbox HTTP error taxonomy for
/// the access/integration/admin surfaces (never used for `/ebicsweb`, which
/// folds these into an EBICS return code instead).
impl From<ebicsbank_exec::ExecError> for RpcError {
    fn from(err: ebicsbank_exec::ExecError) -> Self {
        use ebicsbank_auth::AuthError;
        use ebicsbank_engine::EngineError;
        use ebicsbank_exec::ExecError;

        match err {
            ExecError::Auth(AuthError::InvalidCredentials) => RpcError::Unauthorized(err.to_string()),
            ExecError::Auth(AuthError::Unauthorized { .. }) => RpcError::Unauthorized(err.to_string()),
            ExecError::Auth(AuthError::SubscriberNotReady { .. }) => RpcError::Forbidden(err.to_string()),
            ExecError::Engine(EngineError::AccountNotFound) => RpcError::NotFound(err.to_string()),
            ExecError::Engine(EngineError::WithdrawalNotFound) => RpcError::NotFound(err.to_string()),
            ExecError::Engine(EngineError::TransactionNotFound) => RpcError::NotFound(err.to_string()),
            ExecError::Engine(EngineError::DebtLimitExceeded { .. }) => RpcError::UnprocessableEntity(err.to_string()),
            ExecError::Engine(EngineError::InvalidWithdrawalTransition(_)) => RpcError::Conflict(err.to_string()),
            _ => RpcError::InternalServerError(err.to_string()),
        }
    }
}
