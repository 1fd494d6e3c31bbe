use thiserror::Error;

/// Business-logic errors raised while processing an EBICS transaction.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("host not found")]
    HostNotFound,

    #[error("account not found")]
    AccountNotFound,

    #[error("unknown order type")]
    UnknownOrderType,

    #[error("transaction not found")]
    TransactionNotFound,

    #[error("transaction already in the given phase")]
    InvalidPhase,

    #[error("debt limit exceeded: balance {balance} debt limit {debt_limit} requested debit {requested}")]
    DebtLimitExceeded { balance: String, debt_limit: String, requested: String },

    #[error("pain.001 document already booked for PmtInfId {0}")]
    DuplicatePayment(String),

    #[error("withdrawal not found")]
    WithdrawalNotFound,

    #[error("invalid withdrawal state transition: {0}")]
    InvalidWithdrawalTransition(&'static str),

    #[error(transparent)]
    Auth(#[from] ebicsbank_auth::AuthError),

    #[error(transparent)]
    Xml(#[from] ebicsbank_xml::XmlError),

    #[error(transparent)]
    Crypto(#[from] ebicsbank_crypto::CryptoError),

    #[error(transparent)]
    Store(#[from] ebicsbank_store::error::StoreError),

    #[error("other error: {0}")]
    Other(String),
}
