use crate::ids::{HostId, SubscriberId};
use ebicsbank_macros::{standard, standard_enum};

/// Key-management progress of an EBICS subscriber.
///
/// Transitions: `New -> {PartiallyInitializedIni, PartiallyInitializedHia} ->
/// Initialized`, driven by which of the INI (signature key) and HIA
/// (authentication/encryption keys) orders have been received and the bank
/// has countersigned with HPB.
#[standard_enum]
pub enum SubscriberState {
    New,
    PartiallyInitializedIni,
    PartiallyInitializedHia,
    Initialized,
}

impl SubscriberState {
    pub fn apply_ini(self) -> Self {
        match self {
            SubscriberState::New => SubscriberState::PartiallyInitializedIni,
            SubscriberState::PartiallyInitializedHia => SubscriberState::Initialized,
            other => other,
        }
    }

    pub fn apply_hia(self) -> Self {
        match self {
            SubscriberState::New => SubscriberState::PartiallyInitializedHia,
            SubscriberState::PartiallyInitializedIni => SubscriberState::Initialized,
            other => other,
        }
    }

    pub fn is_ready(self) -> bool {
        matches!(self, SubscriberState::Initialized)
    }
}

/// A subscriber's RSA public key material, stored as raw DER-encoded SPKI bytes.
#[standard]
pub struct SubscriberKeys {
    pub signature_key: Option<Vec<u8>>,
    pub authentication_key: Option<Vec<u8>>,
    pub encryption_key: Option<Vec<u8>>,
}

impl SubscriberKeys {
    pub fn empty() -> Self {
        Self {
            signature_key: None,
            authentication_key: None,
            encryption_key: None,
        }
    }
}

/// An EBICS subscriber enrolled at a host, scoped to a single partner/customer.
#[standard]
pub struct Subscriber {
    pub host_id: HostId,
    pub partner_id: String,
    pub user_id: SubscriberId,
    pub state: SubscriberState,
    pub keys: SubscriberKeys,
}

impl Subscriber {
    pub fn new(host_id: HostId, partner_id: impl Into<String>, user_id: SubscriberId) -> Self {
        Self {
            host_id,
            partner_id: partner_id.into(),
            user_id,
            state: SubscriberState::New,
            keys: SubscriberKeys::empty(),
        }
    }
}
