use crate::codec::base64_decode;
use crate::error::XmlError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
struct PubKeyValue {
    #[serde(rename = "RSAKeyValue")]
    rsa_key_value: RsaKeyValue,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
struct RsaKeyValue {
    modulus: String,
    exponent: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SignaturePubKeyOrderData {
    #[serde(rename = "SignaturePubKeyInfo")]
    signature_pub_key_info: PubKeyInfo,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
struct PubKeyInfo {
    #[serde(rename = "PubKeyValue")]
    pub_key_value: PubKeyValue,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HiaRequestOrderData {
    #[serde(rename = "AuthenticationPubKeyInfo")]
    authentication_pub_key_info: PubKeyInfo,
    #[serde(rename = "EncryptionPubKeyInfo")]
    encryption_pub_key_info: PubKeyInfo,
}

fn decode_components(value: &PubKeyValue) -> Result<(Vec<u8>, Vec<u8>), XmlError> {
    Ok((
        base64_decode(&value.rsa_key_value.modulus)?,
        base64_decode(&value.rsa_key_value.exponent)?,
    ))
}

/// Extracts the subscriber's signature key modulus/exponent from an INI
/// order's `SignaturePubKeyOrderData`.
pub fn parse_ini_order_data(xml: &str) -> Result<(Vec<u8>, Vec<u8>), XmlError> {
    let parsed: SignaturePubKeyOrderData = quick_xml::de::from_str(xml)?;
    decode_components(&parsed.signature_pub_key_info.pub_key_value)
}

/// Extracts the subscriber's authentication and encryption key
/// modulus/exponent pairs from an HIA order's `HIARequestOrderData`.
pub fn parse_hia_order_data(xml: &str) -> Result<((Vec<u8>, Vec<u8>), (Vec<u8>, Vec<u8>)), XmlError> {
    let parsed: HiaRequestOrderData = quick_xml::de::from_str(xml)?;
    Ok((
        decode_components(&parsed.authentication_pub_key_info.pub_key_value)?,
        decode_components(&parsed.encryption_pub_key_info.pub_key_value)?,
    ))
}

/// Builds the `HPBResponseOrderData` document carrying the host's
/// authentication and encryption public keys, base64-encoded components.
pub fn build_hpb_order_data(
    auth_modulus: &[u8],
    auth_exponent: &[u8],
    enc_modulus: &[u8],
    enc_exponent: &[u8],
) -> Result<String, XmlError> {
    #[derive(Serialize)]
    #[serde(rename_all = "PascalCase")]
    struct HpbResponseOrderData {
        #[serde(rename = "AuthenticationPubKeyInfo")]
        authentication_pub_key_info: PubKeyInfo,
        #[serde(rename = "EncryptionPubKeyInfo")]
        encryption_pub_key_info: PubKeyInfo,
    }

    let doc = HpbResponseOrderData {
        authentication_pub_key_info: PubKeyInfo {
            pub_key_value: PubKeyValue {
                rsa_key_value: RsaKeyValue {
                    modulus: crate::codec::base64_encode(auth_modulus),
                    exponent: crate::codec::base64_encode(auth_exponent),
                },
            },
        },
        encryption_pub_key_info: PubKeyInfo {
            pub_key_value: PubKeyValue {
                rsa_key_value: RsaKeyValue {
                    modulus: crate::codec::base64_encode(enc_modulus),
                    exponent: crate::codec::base64_encode(enc_exponent),
                },
            },
        },
    };
    Ok(quick_xml::se::to_string(&doc)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const INI_SAMPLE: &str = r#"<SignaturePubKeyOrderData>
        <SignaturePubKeyInfo>
            <PubKeyValue>
                <RSAKeyValue>
                    <Modulus>AQID</Modulus>
                    <Exponent>AQAB</Exponent>
                </RSAKeyValue>
            </PubKeyValue>
        </SignaturePubKeyInfo>
    </SignaturePubKeyOrderData>"#;

    #[test]
    fn parses_ini_order_data() {
        let (modulus, exponent) = parse_ini_order_data(INI_SAMPLE).unwrap();
        assert_eq!(modulus, vec![1, 2, 3]);
        assert_eq!(exponent, vec![1, 0, 0]);
    }
}
