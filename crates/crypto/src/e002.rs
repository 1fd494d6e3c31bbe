use crate::error::CryptoError;
use aes::Aes128;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use rand::RngCore;
use rsa::{Oaep, Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;

/// E002 transaction key length in bytes, per the EBICS spec's AES-128 choice.
pub const TRANSACTION_KEY_LEN: usize = 16;

/// Result of an E002 encryption: the AES transaction key wrapped for the
/// recipient's RSA public key, plus the AES-CBC encrypted payload.
pub struct E002Envelope {
    pub wrapped_key: Vec<u8>,
    pub ciphertext: Vec<u8>,
    pub iv: [u8; 16],
}

/// Encrypts `plaintext` (already deflated order data) under a fresh AES-128
/// transaction key, then wraps that key with the recipient's RSA public key
/// using PKCS#1 v1.5, as EBICS E002 specifies.
pub fn encrypt_e002(plaintext: &[u8], recipient_key: &RsaPublicKey) -> Result<E002Envelope, CryptoError> {
    let mut rng = rand::thread_rng();
    let mut key = [0u8; TRANSACTION_KEY_LEN];
    rng.fill_bytes(&mut key);
    let iv = [0u8; 16];

    let ciphertext = Aes128CbcEnc::new(&key.into(), &iv.into())
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let wrapped_key = recipient_key
        .encrypt(&mut rsa::rand_core::OsRng, Pkcs1v15Encrypt, &key)
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;

    Ok(E002Envelope { wrapped_key, ciphertext, iv })
}

/// Unwraps the transaction key with the host/subscriber's RSA private key
/// and decrypts the AES-CBC payload.
pub fn decrypt_e002(
    wrapped_key: &[u8],
    ciphertext: &[u8],
    iv: &[u8; 16],
    private_key: &RsaPrivateKey,
) -> Result<Vec<u8>, CryptoError> {
    let key = private_key
        .decrypt(Pkcs1v15Encrypt, wrapped_key)
        .map_err(|e| CryptoError::Decryption(e.to_string()))?;
    if key.len() != TRANSACTION_KEY_LEN {
        return Err(CryptoError::Decryption("unexpected transaction key length".into()));
    }
    let key_array: [u8; TRANSACTION_KEY_LEN] = key.try_into().unwrap();

    Aes128CbcDec::new(&key_array.into(), iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|e| CryptoError::Decryption(e.to_string()))
}

/// Decrypts a payload given an already-unwrapped transaction key, used when
/// continuing a multi-segment transfer.
pub fn decrypt_with_transaction_key(
    transaction_key: &[u8],
    ciphertext: &[u8],
    iv: &[u8; 16],
) -> Result<Vec<u8>, CryptoError> {
    if transaction_key.len() != TRANSACTION_KEY_LEN {
        return Err(CryptoError::Decryption("unexpected transaction key length".into()));
    }
    let key_array: [u8; TRANSACTION_KEY_LEN] = transaction_key.try_into().unwrap();
    Aes128CbcDec::new(&key_array.into(), iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|e| CryptoError::Decryption(e.to_string()))
}

/// Unwraps just the transaction key, used when the caller wants to retain
/// it across segments rather than re-decrypt with the private key each time.
pub fn unwrap_transaction_key(
    wrapped_key: &[u8],
    private_key: &RsaPrivateKey,
) -> Result<Vec<u8>, CryptoError> {
    private_key
        .decrypt(Pkcs1v15Encrypt, wrapped_key)
        .map_err(|e| CryptoError::Decryption(e.to_string()))
}

/// OAEP-SHA256 encryption, reserved for callers that negotiate the newer
/// E002 variant; unused by the default sandbox wire format but kept
/// alongside PKCS#1 v1.5 for hosts that opt in.
pub fn wrap_key_oaep(key: &[u8], recipient_key: &RsaPublicKey) -> Result<Vec<u8>, CryptoError> {
    recipient_key
        .encrypt(&mut rsa::rand_core::OsRng, Oaep::new::<Sha256>(), key)
        .map_err(|e| CryptoError::Encryption(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rsa_keys::generate_rsa_keypair;

    #[test]
    fn roundtrip() {
        let pair = generate_rsa_keypair().unwrap();
        let plaintext = b"<xml>order data</xml>".to_vec();
        let env = encrypt_e002(&plaintext, &pair.public).unwrap();
        let recovered = decrypt_e002(&env.wrapped_key, &env.ciphertext, &env.iv, &pair.private).unwrap();
        assert_eq!(recovered, plaintext);
    }
}
