use ebicsbank_macros::standard;
use std::fmt;

/// EBICS host ID, e.g. "DEMOBANK1". Free-form, bank-assigned.
#[standard]
pub struct HostId(pub String);

impl HostId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }
}

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// EBICS subscriber ID ("UserID"), unique within a host.
#[standard]
pub struct SubscriberId(pub String);

impl SubscriberId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bank account identifier, IBAN-formatted.
#[standard]
pub struct AccountId(pub String);

impl AccountId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 32 lowercase hex character EBICS transaction ID, wire format `transactionID`.
#[standard]
pub struct TransactionId(pub String);

impl TransactionId {
    /// Generates a fresh 32-hex-character transaction ID from random bytes.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        for b in bytes.iter_mut() {
            *b = fastrand::u8(..);
        }
        Self(hex::encode(bytes))
    }

    pub fn is_valid(&self) -> bool {
        self.0.len() == 32 && self.0.chars().all(|c| c.is_ascii_hexdigit())
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 4 character uppercase-alphanumeric EBICS order ID, wire format `OrderID`.
#[standard]
pub struct OrderId(pub String);

impl OrderId {
    const ALPHABET: &'static [u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

    pub fn generate() -> Self {
        let id: String = (0..4)
            .map(|_| Self::ALPHABET[fastrand::usize(..Self::ALPHABET.len())] as char)
            .collect();
        Self(id)
    }

    pub fn is_valid(&self) -> bool {
        self.0.len() == 4 && self.0.chars().all(|c| c.is_ascii_alphanumeric())
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
