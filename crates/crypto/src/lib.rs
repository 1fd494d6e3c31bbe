//! RSA key management, EBICS E002 encryption, A006 order signing, and
//! password hashing for the sandbox's key-management and wire layers.

pub mod a006;
pub mod e002;
pub mod error;
pub mod password;
pub mod rsa_keys;

pub use a006::{digest_ebics_order_a006, sign_ebics_order_a006, verify_ebics_a006};
pub use e002::{decrypt_e002, decrypt_with_transaction_key, encrypt_e002, unwrap_transaction_key, E002Envelope};
pub use error::CryptoError;
pub use password::{hash_password, verify_password};
pub use rsa_keys::{
    generate_rsa_keypair, load_rsa_private_key, load_rsa_public_from_components, load_rsa_public_key,
    private_key_to_der, public_key_components, public_key_to_der, RsaKeyPair,
};
