use crate::ids::AccountId;
use crate::ledger::BankTransaction;
use ebicsbank_macros::standard;
use rust_decimal::Decimal;

/// A closed daily statement for one account, backing camt.053 reports.
///
/// `opening_balance` carries the prior statement's `closing_balance`
/// (ISO-20022 `CLBD`/`PRCD` chaining); `transactions` is the set of
/// [`BankTransaction`]s booked between the previous tick and this one.
#[standard]
pub struct Statement {
    pub account_id: AccountId,
    pub statement_number: u64,
    pub opening_balance: Decimal,
    pub closing_balance: Decimal,
    pub transactions: Vec<BankTransaction>,
    pub created_at: i64,
}
