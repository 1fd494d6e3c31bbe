use crate::ids::{HostId, OrderId, SubscriberId, TransactionId};
use ebicsbank_macros::{standard, standard_enum};

/// The two phases of an EBICS transaction, `Phase` on the wire.
#[standard_enum]
pub enum TransactionPhase {
    Initialisation,
    Transfer,
    Receipt,
}

/// Order types this sandbox understands, `OrderType`/`adminOrderType` on the wire.
#[standard_enum]
pub enum OrderType {
    /// Subscriber sends its signature public key (unsecured, plaintext).
    Ini,
    /// Subscriber sends its authentication + encryption public keys (unsecured, plaintext).
    Hia,
    /// Subscriber downloads the bank's public keys.
    Hpb,
    /// Download: subscriber's own customer/account description.
    Htd,
    /// Download: the full list of customers known to the host.
    Hkd,
    /// Download: camt.052 intraday transaction report.
    C52,
    /// Download: camt.053 end-of-day statement.
    C53,
    /// Download: generic test data.
    Tsd,
    /// Upload: generic test order.
    Ptk,
    /// Upload: pain.001 customer credit transfer initiation.
    Cct,
}

impl OrderType {
    pub fn is_upload(&self) -> bool {
        matches!(self, OrderType::Ptk | OrderType::Cct)
    }

    pub fn is_download(&self) -> bool {
        !self.is_upload() && !matches!(self, OrderType::Ini | OrderType::Hia)
    }

    pub fn wire_code(&self) -> &'static str {
        match self {
            OrderType::Ini => "INI",
            OrderType::Hia => "HIA",
            OrderType::Hpb => "HPB",
            OrderType::Htd => "HTD",
            OrderType::Hkd => "HKD",
            OrderType::C52 => "C52",
            OrderType::C53 => "C53",
            OrderType::Tsd => "TSD",
            OrderType::Ptk => "PTK",
            OrderType::Cct => "CCT",
        }
    }

    pub fn from_wire_code(code: &str) -> Option<Self> {
        Some(match code {
            "INI" => OrderType::Ini,
            "HIA" => OrderType::Hia,
            "HPB" => OrderType::Hpb,
            "HTD" => OrderType::Htd,
            "HKD" => OrderType::Hkd,
            "C52" => OrderType::C52,
            "C53" => OrderType::C53,
            "TSD" => OrderType::Tsd,
            "PTK" => OrderType::Ptk,
            "CCT" => OrderType::Cct,
            _ => return None,
        })
    }
}

/// Server-side state of an in-progress multi-segment download transaction.
#[standard]
pub struct EbicsDownloadTx {
    pub host_id: HostId,
    pub user_id: SubscriberId,
    pub transaction_id: TransactionId,
    pub order_type: OrderType,
    pub order_id: OrderId,
    pub phase: TransactionPhase,
    /// AES-128-CBC transaction key, E002-encrypted to the subscriber when first announced.
    pub transaction_key: Vec<u8>,
    /// Deflated-then-encrypted order data, split into `segment_size`-byte segments.
    pub segments: Vec<Vec<u8>>,
    pub segment_number: u32,
}

/// Server-side state of an in-progress multi-segment upload transaction.
#[standard]
pub struct EbicsUploadTx {
    pub host_id: HostId,
    pub user_id: SubscriberId,
    pub transaction_id: TransactionId,
    pub order_type: OrderType,
    pub order_id: OrderId,
    pub phase: TransactionPhase,
    pub transaction_key: Vec<u8>,
    pub segments_received: Vec<Vec<u8>>,
    pub segment_number: u32,
    pub num_segments: u32,
}

/// Raw A006 signature material accompanying an upload order, retained for audit.
#[standard]
pub struct OrderSignature {
    pub host_id: HostId,
    pub user_id: SubscriberId,
    pub order_id: OrderId,
    pub digest: Vec<u8>,
    pub signature: Vec<u8>,
}
