use thiserror::Error;

/// Failures while parsing or building EBICS/ISO-20022 XML documents.
#[derive(Error, Debug)]
pub enum XmlError {
    #[error("malformed XML: {0}")]
    Parse(String),

    #[error("failed to serialize XML: {0}")]
    Serialize(String),

    #[error("missing required element: {0}")]
    MissingElement(&'static str),

    #[error("deflate error: {0}")]
    Deflate(String),

    #[error("base64 decode error: {0}")]
    Base64(String),

    #[error(transparent)]
    Crypto(#[from] ebicsbank_crypto::CryptoError),
}

impl From<quick_xml::DeError> for XmlError {
    fn from(err: quick_xml::DeError) -> Self {
        XmlError::Parse(err.to_string())
    }
}

impl From<quick_xml::SeError> for XmlError {
    fn from(err: quick_xml::SeError) -> Self {
        XmlError::Serialize(err.to_string())
    }
}
