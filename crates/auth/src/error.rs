use thiserror::Error;

/// Authentication and authorization errors.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("unauthorized: subscriber {user_id} not recognized for host {host_id}")]
    Unauthorized { host_id: String, user_id: String },

    #[error("subscriber {user_id} is not yet initialized (state requires INI and HIA first)")]
    SubscriberNotReady { user_id: String },

    #[error("host {0} not found")]
    HostNotFound(String),

    #[error("invalid basic-auth credentials")]
    InvalidCredentials,

    #[error(transparent)]
    Crypto(#[from] ebicsbank_crypto::CryptoError),

    #[error(transparent)]
    Xml(#[from] ebicsbank_xml::XmlError),

    #[error(transparent)]
    Store(#[from] ebicsbank_store::error::StoreError),
}

impl AuthError {
    pub fn signature_error(msg: impl Into<String>) -> Self {
        Self::InvalidSignature(msg.into())
    }

    pub fn unauthorized(host_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self::Unauthorized { host_id: host_id.into(), user_id: user_id.into() }
    }
}
