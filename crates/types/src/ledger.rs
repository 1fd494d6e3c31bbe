use crate::ids::AccountId;
use ebicsbank_macros::{standard, standard_enum};
use rust_decimal::Decimal;

/// Booking direction of a [`BankTransaction`], mirroring ISO-20022 credit/debit indicator.
#[standard_enum]
pub enum Direction {
    Debit,
    Credit,
}

/// A single booked ledger entry against a [`BankAccount`](crate::BankAccount).
///
/// Idempotent on `(account_id, pmt_info_id)`: replaying a pain.001 upload
/// with the same `PmtInfId` must not book twice.
#[standard]
pub struct BankTransaction {
    pub account_id: AccountId,
    pub pmt_info_id: String,
    pub direction: Direction,
    pub amount: Decimal,
    pub currency: String,
    pub counterparty_iban: String,
    pub counterparty_name: String,
    pub remittance_info: String,
    pub booked_at: i64,
    pub order_id: Option<String>,
}

/// A booked transaction not yet swept into a closed [`Statement`](crate::Statement),
/// surfaced through camt.052 intraday reports and consumed by the statement tick.
#[standard]
pub struct FreshTransaction {
    pub account_id: AccountId,
    pub transaction: BankTransaction,
}
