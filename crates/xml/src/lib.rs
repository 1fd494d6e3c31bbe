//! EBICS H004 wire envelopes, XML-DSig order signing, and ISO-20022
//! pain.001/camt.052/camt.053 document codecs.

pub mod camt;
pub mod codec;
pub mod dsig;
pub mod ebics_envelope;
pub mod error;
pub mod htd;
pub mod key_mgmt;
pub mod pain001;

pub use camt::{build_camt052, build_camt053};
pub use codec::{base64_decode, base64_encode, deflate, inflate, segment};
pub use dsig::{sign_order_data, verify_order_data, AuthSignature, SignedInfo};
pub use ebics_envelope::{
    Body, DataEncryptionInfo, DataTransfer, EbicsHevRequest, EbicsHevResponse, EbicsNoPubKeyDigestsRequest,
    EbicsRequest, EbicsResponse, EbicsUnsecuredRequest, Header, MutableHeader, OrderDetails, ReturnCode, StaticHeader,
    SupportedVersion,
};
pub use error::XmlError;
pub use htd::{build_hkd, build_htd};
pub use key_mgmt::{build_hpb_order_data, parse_hia_order_data, parse_ini_order_data};
pub use pain001::{parse_pain001, CreditTransferInstruction};
