use crate::error::CryptoError;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPrivateKey, RsaPublicKey};

/// EBICS subscriber/host key bits. 2048 is the sandbox default; production
/// EBICS deployments commonly use 2048 or 3072.
pub const KEY_BITS: usize = 2048;

/// An RSA key pair, stored internally in DER/SPKI form.
pub struct RsaKeyPair {
    pub private: RsaPrivateKey,
    pub public: RsaPublicKey,
}

/// Generates a fresh RSA key pair suitable for INI (signature), HIA
/// (authentication + encryption), or host (HPB) key material.
pub fn generate_rsa_keypair() -> Result<RsaKeyPair, CryptoError> {
    let mut rng = rsa::rand_core::OsRng;
    let private = RsaPrivateKey::new(&mut rng, KEY_BITS)
        .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
    let public = RsaPublicKey::from(&private);
    Ok(RsaKeyPair { private, public })
}

/// Loads an RSA public key from its raw modulus and exponent, as carried in
/// an `ns:PubKeyValue` element's `ns:Modulus`/`ns:Exponent` children.
pub fn load_rsa_public_from_components(
    modulus: &[u8],
    exponent: &[u8],
) -> Result<RsaPublicKey, CryptoError> {
    let n = BigUint::from_bytes_be(modulus);
    let e = BigUint::from_bytes_be(exponent);
    RsaPublicKey::new(n, e).map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))
}

/// Loads an RSA public key from a DER-encoded SubjectPublicKeyInfo blob.
pub fn load_rsa_public_key(der: &[u8]) -> Result<RsaPublicKey, CryptoError> {
    RsaPublicKey::from_public_key_der(der).map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))
}

/// Loads an RSA private key from a DER-encoded PKCS#8 blob.
pub fn load_rsa_private_key(der: &[u8]) -> Result<RsaPrivateKey, CryptoError> {
    RsaPrivateKey::from_pkcs8_der(der).map_err(|e| CryptoError::InvalidPrivateKey(e.to_string()))
}

pub fn public_key_to_der(key: &RsaPublicKey) -> Result<Vec<u8>, CryptoError> {
    key.to_public_key_der()
        .map(|doc| doc.as_bytes().to_vec())
        .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))
}

pub fn private_key_to_der(key: &RsaPrivateKey) -> Result<Vec<u8>, CryptoError> {
    key.to_pkcs8_der()
        .map(|doc| doc.as_bytes().to_vec())
        .map_err(|e| CryptoError::InvalidPrivateKey(e.to_string()))
}

/// Splits a public key into its raw big-endian modulus and exponent, for
/// embedding into `ns:Modulus`/`ns:Exponent` XML elements.
pub fn public_key_components(key: &RsaPublicKey) -> (Vec<u8>, Vec<u8>) {
    (key.n().to_bytes_be(), key.e().to_bytes_be())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_der() {
        let pair = generate_rsa_keypair().unwrap();
        let der = public_key_to_der(&pair.public).unwrap();
        let reloaded = load_rsa_public_key(&der).unwrap();
        assert_eq!(pair.public, reloaded);
    }

    #[test]
    fn roundtrip_components() {
        let pair = generate_rsa_keypair().unwrap();
        let (modulus, exponent) = public_key_components(&pair.public);
        let reloaded = load_rsa_public_from_components(&modulus, &exponent).unwrap();
        assert_eq!(pair.public, reloaded);
    }
}
