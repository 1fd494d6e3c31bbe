use crate::dsig::AuthSignature;
use serde::{Deserialize, Serialize};

/// `ebicsRequest`/`ebicsResponse` <static> header block.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StaticHeader {
    #[serde(rename = "HostID")]
    pub host_id: Option<String>,
    pub nonce: Option<String>,
    pub timestamp: Option<String>,
    #[serde(rename = "PartnerID")]
    pub partner_id: Option<String>,
    #[serde(rename = "UserID")]
    pub user_id: Option<String>,
    pub order_details: Option<OrderDetails>,
    #[serde(rename = "TransactionID")]
    pub transaction_id: Option<String>,
    pub security_medium: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OrderDetails {
    pub order_type: String,
    pub order_id: Option<String>,
    pub order_attribute: Option<String>,
}

/// `ebicsRequest`/`ebicsResponse` <mutable> header block.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MutableHeader {
    pub transaction_phase: Option<String>,
    pub segment_number: Option<u32>,
    #[serde(rename = "TransactionKey")]
    pub transaction_key: Option<String>,
    pub return_code: Option<String>,
    pub report_text: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Header {
    #[serde(rename = "static")]
    pub static_header: StaticHeader,
    pub mutable: MutableHeader,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DataEncryptionInfo {
    #[serde(rename = "EncryptionPubKeyDigest")]
    pub encryption_pub_key_digest: Option<String>,
    #[serde(rename = "TransactionKey")]
    pub transaction_key: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DataTransfer {
    pub data_encryption_info: Option<DataEncryptionInfo>,
    /// Base64-encoded, AES-encrypted, deflated order data segment.
    pub order_data: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Body {
    pub data_transfer: Option<DataTransfer>,
    pub return_code: Option<String>,
    /// A006 order signature, carried on upload requests in place of a full
    /// `ds:Signature` block since this sandbox verifies at the order-data
    /// level rather than over the whole SOAP-style envelope.
    pub auth_signature: Option<AuthSignature>,
}

/// A secured (`ebicsRequest`) envelope: INI/HIA/HPB are carried on the
/// separate unsecured envelope since no keys exist yet.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EbicsRequest {
    #[serde(rename = "@Version")]
    pub version: String,
    pub header: Header,
    pub body: Body,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EbicsResponse {
    #[serde(rename = "@Version")]
    pub version: String,
    pub header: Header,
    pub body: Body,
}

/// `ebicsUnsecuredRequest`, used by INI and HIA: the order data travels
/// in the clear, signed only by the subscriber's forthcoming key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EbicsUnsecuredRequest {
    #[serde(rename = "@Version")]
    pub version: String,
    pub header: Header,
    pub body: Body,
}

/// `ebicsNoPubKeyDigestsRequest`, used by HPB: the subscriber has no
/// bank-key digests yet, so it authenticates by partner/user ID alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EbicsNoPubKeyDigestsRequest {
    #[serde(rename = "@Version")]
    pub version: String,
    pub header: Header,
    pub body: Body,
}

/// `ebicsHEVRequest`/`ebicsHEVResponse`: the unauthenticated host-version check.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EbicsHevRequest {
    #[serde(rename = "HostID")]
    pub host_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SupportedVersion {
    #[serde(rename = "@ProtocolVersion")]
    pub protocol_version: String,
    pub order_id: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EbicsHevResponse {
    pub system_return_code: ReturnCode,
    pub version_number: Vec<SupportedVersion>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReturnCode {
    #[serde(rename = "@ReportText")]
    pub report_text: String,
    pub value: String,
}
