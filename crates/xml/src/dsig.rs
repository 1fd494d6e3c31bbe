use crate::error::XmlError;
use ebicsbank_crypto::{digest_ebics_order_a006, sign_ebics_order_a006, verify_ebics_a006};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};

/// Minimal `ds:SignedInfo`: references the digest of the order data body
/// being authenticated, canonicalized by serializing this struct back to XML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SignedInfo {
    #[serde(rename = "DigestValue")]
    pub digest_value: String,
}

/// `ds:Signature`-equivalent: the canonical `SignedInfo` plus its RSA-PSS value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AuthSignature {
    pub signed_info: SignedInfo,
    pub signature_value: String,
}

fn canonical_bytes(signed_info: &SignedInfo) -> Result<Vec<u8>, XmlError> {
    Ok(quick_xml::se::to_string(signed_info)?.into_bytes())
}

/// Signs `order_data_digest` (already SHA-256 of the order payload) with the
/// subscriber's A006 signature key, producing a complete `AuthSignature`.
pub fn sign_order_data(order_data_digest: &[u8], private_key: &RsaPrivateKey) -> Result<AuthSignature, XmlError> {
    let signed_info = SignedInfo {
        digest_value: crate::codec::base64_encode(order_data_digest),
    };
    let canonical = canonical_bytes(&signed_info)?;
    let digest = digest_ebics_order_a006(&canonical);
    let signature = sign_ebics_order_a006(&digest, private_key)?;
    Ok(AuthSignature {
        signed_info,
        signature_value: crate::codec::base64_encode(&signature),
    })
}

/// Verifies an `AuthSignature` against the subscriber's signature public key,
/// checking both that the signature is valid and that it covers the digest
/// of the order data actually received.
pub fn verify_order_data(
    order_data_digest: &[u8],
    auth_signature: &AuthSignature,
    public_key: &RsaPublicKey,
) -> Result<(), XmlError> {
    let expected_digest_value = crate::codec::base64_encode(order_data_digest);
    if auth_signature.signed_info.digest_value != expected_digest_value {
        return Err(XmlError::Crypto(ebicsbank_crypto::CryptoError::SignatureVerification));
    }
    let canonical = canonical_bytes(&auth_signature.signed_info)?;
    let digest = digest_ebics_order_a006(&canonical);
    let signature = crate::codec::base64_decode(&auth_signature.signature_value)?;
    verify_ebics_a006(&digest, &signature, public_key)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ebicsbank_crypto::generate_rsa_keypair;
    use sha2::{Digest, Sha256};

    #[test]
    fn sign_and_verify_order_data() {
        let pair = generate_rsa_keypair().unwrap();
        let payload_digest = Sha256::digest(b"<CstmrCdtTrfInitn/>").to_vec();
        let auth_sig = sign_order_data(&payload_digest, &pair.private).unwrap();
        verify_order_data(&payload_digest, &auth_sig, &pair.public).unwrap();
    }

    #[test]
    fn rejects_digest_mismatch() {
        let pair = generate_rsa_keypair().unwrap();
        let payload_digest = Sha256::digest(b"<CstmrCdtTrfInitn/>").to_vec();
        let auth_sig = sign_order_data(&payload_digest, &pair.private).unwrap();
        let other_digest = Sha256::digest(b"<CstmrCdtTrfInitn>tampered</CstmrCdtTrfInitn>").to_vec();
        assert!(verify_order_data(&other_digest, &auth_sig, &pair.public).is_err());
    }
}
