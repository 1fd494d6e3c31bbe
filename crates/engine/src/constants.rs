/// Maximum bytes per EBICS transfer-phase segment.
pub const SEGMENT_SIZE: usize = 4096;

/// Technical return code for a fully successful EBICS request.
pub const EBICS_OK: &str = "000000";

/// Technical return code for a completed download transaction.
pub const EBICS_DOWNLOAD_POSTPROCESS_DONE: &str = "011000";

/// Technical return code for an unsuccessful authentication.
pub const EBICS_AUTHENTICATION_FAILED: &str = "091002";

/// Technical return code for an order the host doesn't recognize.
pub const EBICS_INVALID_ORDER_TYPE: &str = "091005";

/// Technical return code for a processing error on the bank's side.
pub const EBICS_PROCESSING_ERROR: &str = "091116";

/// Technical return code for a request whose XML the host couldn't parse at all.
pub const EBICS_INVALID_REQUEST: &str = "060102";

/// Technical return code for order data that failed to deserialize as valid XML.
pub const EBICS_INVALID_XML: &str = "091010";
