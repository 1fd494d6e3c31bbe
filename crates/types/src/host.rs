use crate::ids::{AccountId, HostId};
use ebicsbank_macros::standard;
use rust_decimal::Decimal;

/// An EBICS bank server identity: the host-level RSA key pair subscribers
/// retrieve via HPB, keyed by `HostID`.
#[standard]
pub struct Host {
    pub host_id: HostId,
    pub name: String,
    pub authentication_key: Vec<u8>,
    pub encryption_key: Vec<u8>,
}

/// A demobank: a logical bank instance hosting accounts under one `HostID`,
/// with sandbox-wide configuration such as the default per-account debt limit.
#[standard]
pub struct Demobank {
    pub host_id: HostId,
    pub name: String,
    pub default_debt_limit: Decimal,
    pub currency: String,
    /// The `payto://` URI a withdrawal is wired to when the wallet confirms
    /// without ever selecting an exchange of its own.
    pub suggested_exchange_payto: Option<String>,
}

impl Demobank {
    pub fn new(host_id: HostId, name: impl Into<String>) -> Self {
        Self {
            host_id,
            name: name.into(),
            default_debt_limit: Decimal::ZERO,
            currency: "EUR".to_string(),
            suggested_exchange_payto: None,
        }
    }
}

/// A customer record: the human/legal entity behind one or more subscribers
/// and bank accounts, carrying the access-api basic-auth credential.
#[standard]
pub struct Customer {
    pub host_id: HostId,
    pub customer_id: String,
    pub name: String,
    pub password_hash: String,
}

/// A bank account held at a demobank, addressed by IBAN.
#[standard]
pub struct BankAccount {
    pub host_id: HostId,
    pub account_id: AccountId,
    pub customer_id: String,
    pub iban: String,
    pub bic: String,
    pub balance: Decimal,
    pub debt_limit: Decimal,
    pub currency: String,
}

impl BankAccount {
    pub fn new(host_id: HostId, account_id: AccountId, customer_id: impl Into<String>) -> Self {
        let iban = account_id.0.clone();
        Self {
            host_id,
            account_id,
            customer_id: customer_id.into(),
            iban,
            bic: String::new(),
            balance: Decimal::ZERO,
            debt_limit: Decimal::ZERO,
            currency: "EUR".to_string(),
        }
    }

    /// Returns the available balance after subtracting the debt limit is
    /// taken into account, i.e. how much may still be debited.
    pub fn available_for_debit(&self) -> Decimal {
        self.balance + self.debt_limit
    }
}
