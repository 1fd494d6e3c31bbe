use crate::error::CryptoError;
use rsa::pss::{Signature, SigningKey, VerifyingKey};
use rsa::signature::{RandomizedSigner, SignatureEncoding, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};

/// Computes the A006 order digest: SHA-256 over the canonicalized
/// `ds:SignedInfo` element, as required before RSA-PSS signing.
pub fn digest_ebics_order_a006(canonical_signed_info: &[u8]) -> Vec<u8> {
    Sha256::digest(canonical_signed_info).to_vec()
}

/// Signs a precomputed A006 digest with the subscriber's signature private key.
pub fn sign_ebics_order_a006(digest: &[u8], private_key: &RsaPrivateKey) -> Result<Vec<u8>, CryptoError> {
    let signing_key = SigningKey::<Sha256>::new(private_key.clone());
    let signature = signing_key.sign_with_rng(&mut rsa::rand_core::OsRng, digest);
    Ok(signature.to_bytes().to_vec())
}

/// Verifies an A006 (RSA-PSS/SHA-256) signature over a digest.
pub fn verify_ebics_a006(
    digest: &[u8],
    signature: &[u8],
    public_key: &RsaPublicKey,
) -> Result<(), CryptoError> {
    let verifying_key = VerifyingKey::<Sha256>::new(public_key.clone());
    let sig = Signature::try_from(signature).map_err(|_| CryptoError::SignatureVerification)?;
    verifying_key
        .verify(digest, &sig)
        .map_err(|_| CryptoError::SignatureVerification)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rsa_keys::generate_rsa_keypair;

    #[test]
    fn sign_and_verify() {
        let pair = generate_rsa_keypair().unwrap();
        let digest = digest_ebics_order_a006(b"<ds:SignedInfo/>");
        let sig = sign_ebics_order_a006(&digest, &pair.private).unwrap();
        verify_ebics_a006(&digest, &sig, &pair.public).unwrap();
    }

    #[test]
    fn rejects_tampered_digest() {
        let pair = generate_rsa_keypair().unwrap();
        let digest = digest_ebics_order_a006(b"<ds:SignedInfo/>");
        let sig = sign_ebics_order_a006(&digest, &pair.private).unwrap();
        let other_digest = digest_ebics_order_a006(b"<ds:SignedInfo>tampered</ds:SignedInfo>");
        assert!(verify_ebics_a006(&other_digest, &sig, &pair.public).is_err());
    }
}
