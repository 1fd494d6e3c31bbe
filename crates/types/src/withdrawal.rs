use crate::ids::AccountId;
use ebicsbank_macros::{standard, standard_enum};
use rust_decimal::Decimal;
use uuid::Uuid;

/// State machine of a teller-facing cash withdrawal, driven by the access-api.
///
/// Transitions: `Created -> Selected -> {Confirmed, Aborted}`. Only a
/// `Confirmed` withdrawal debits the account.
#[standard_enum]
pub enum WithdrawalState {
    Created,
    Selected,
    Confirmed,
    Aborted,
}

/// A single withdrawal operation against an account.
#[standard]
pub struct WithdrawalOp {
    pub wopid: Uuid,
    pub account_id: AccountId,
    pub amount: Decimal,
    pub currency: String,
    pub state: WithdrawalState,
    pub created_at: i64,
    /// The wallet-chosen reserve public key, used as the wire transfer's
    /// subject once confirmed.
    pub reserve_pub: Option<String>,
    /// The `payto://` URI of the exchange the withdrawn funds are wired to.
    /// Falls back to the demobank's suggested payto if still unset at
    /// confirmation time.
    pub selected_exchange_payto: Option<String>,
}

impl WithdrawalOp {
    pub fn new(account_id: AccountId, amount: Decimal, currency: impl Into<String>, now: i64) -> Self {
        Self {
            wopid: Uuid::nil(),
            account_id,
            amount,
            currency: currency.into(),
            state: WithdrawalState::Created,
            created_at: now,
            reserve_pub: None,
            selected_exchange_payto: None,
        }
    }

    /// Transitions `Created -> Selected`, recording the wallet's choice of
    /// reserve and exchange. A repeat call while already `Selected` succeeds
    /// only if it supplies the same values; differing values are a conflict.
    pub fn select(&mut self, reserve_pub: String, selected_exchange_payto: Option<String>) -> Result<(), &'static str> {
        match self.state {
            WithdrawalState::Created => {
                self.reserve_pub = Some(reserve_pub);
                self.selected_exchange_payto = selected_exchange_payto;
                self.state = WithdrawalState::Selected;
                Ok(())
            }
            WithdrawalState::Selected
                if self.reserve_pub.as_deref() == Some(reserve_pub.as_str())
                    && self.selected_exchange_payto == selected_exchange_payto =>
            {
                Ok(())
            }
            WithdrawalState::Selected => Err("withdrawal already selected with different reserve_pub/selected_exchange"),
            _ => Err("withdrawal must be in Created state to select"),
        }
    }

    pub fn confirm(&mut self) -> Result<(), &'static str> {
        match self.state {
            WithdrawalState::Selected => {
                self.state = WithdrawalState::Confirmed;
                Ok(())
            }
            _ => Err("withdrawal must be in Selected state to confirm"),
        }
    }

    pub fn abort(&mut self) -> Result<(), &'static str> {
        match self.state {
            WithdrawalState::Confirmed | WithdrawalState::Aborted => {
                Err("withdrawal already finalized")
            }
            _ => {
                self.state = WithdrawalState::Aborted;
                Ok(())
            }
        }
    }
}
