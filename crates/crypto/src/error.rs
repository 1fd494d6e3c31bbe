use thiserror::Error;

/// Cryptographic operation failures surfaced by the EBICS key-management
/// and order-signing pipeline.
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("failed to generate RSA key pair: {0}")]
    KeyGeneration(String),

    #[error("malformed public key: {0}")]
    InvalidPublicKey(String),

    #[error("malformed private key: {0}")]
    InvalidPrivateKey(String),

    #[error("E002 encryption failed: {0}")]
    Encryption(String),

    #[error("E002 decryption failed: {0}")]
    Decryption(String),

    #[error("A006 signing failed: {0}")]
    Signing(String),

    #[error("A006 signature verification failed")]
    SignatureVerification,

    #[error("password hashing failed: {0}")]
    PasswordHash(String),
}
