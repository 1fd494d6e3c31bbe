use thiserror::Error;

/// Errors surfaced by the executor wrapping one EBICS request's store
/// transaction, folding together every layer a request can fail at.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error(transparent)]
    Engine(#[from] ebicsbank_engine::EngineError),

    #[error(transparent)]
    Auth(#[from] ebicsbank_auth::AuthError),

    #[error(transparent)]
    Xml(#[from] ebicsbank_xml::XmlError),

    #[error(transparent)]
    Store(#[from] ebicsbank_store::error::StoreError),
}

impl ExecError {
    /// The EBICS technical return code this error maps to on the wire.
    pub fn ebics_return_code(&self) -> &'static str {
        use ebicsbank_auth::AuthError;
        use ebicsbank_engine::EngineError;

        match self {
            ExecError::Auth(AuthError::InvalidSignature(_)) | ExecError::Auth(AuthError::InvalidCredentials) => {
                ebicsbank_engine::EBICS_AUTHENTICATION_FAILED
            }
            ExecError::Auth(AuthError::Unauthorized { .. }) | ExecError::Auth(AuthError::SubscriberNotReady { .. }) => {
                ebicsbank_engine::EBICS_AUTHENTICATION_FAILED
            }
            ExecError::Engine(EngineError::UnknownOrderType) => ebicsbank_engine::EBICS_INVALID_ORDER_TYPE,
            _ => ebicsbank_engine::EBICS_PROCESSING_ERROR,
        }
    }
}

pub type Result<T> = std::result::Result<T, ExecError>;
