use crate::error::XmlError;
use ebicsbank_types::BankAccount;
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct AccountInfo {
    #[serde(rename = "@Currency")]
    currency: String,
    #[serde(rename = "ID")]
    id: AccountIban,
    #[serde(rename = "AccountName")]
    account_name: String,
}

#[derive(Debug, Serialize)]
struct AccountIban {
    #[serde(rename = "IBAN")]
    iban: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct PartnerInfo {
    #[serde(rename = "AccountInfo")]
    account_info: Vec<AccountInfo>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct HtdResponseOrderData {
    #[serde(rename = "PartnerInfo")]
    partner_info: PartnerInfo,
}

fn account_info(account: &BankAccount) -> AccountInfo {
    AccountInfo {
        currency: account.currency.clone(),
        id: AccountIban { iban: account.iban.clone() },
        account_name: account.customer_id.clone(),
    }
}

/// Builds the `HTDResponseOrderData` document describing the requesting
/// subscriber's own accounts.
pub fn build_htd(accounts: &[BankAccount]) -> Result<String, XmlError> {
    let doc = HtdResponseOrderData {
        partner_info: PartnerInfo { account_info: accounts.iter().map(account_info).collect() },
    };
    Ok(quick_xml::se::to_string(&doc)?)
}

/// Builds the `HKDResponseOrderData` document describing every account known
/// to the host, the same envelope shape as HTD at wider scope.
pub fn build_hkd(accounts: &[BankAccount]) -> Result<String, XmlError> {
    build_htd(accounts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ebicsbank_types::{AccountId, HostId};

    #[test]
    fn builds_htd_with_one_account_entry() {
        let account = BankAccount::new(HostId::new("DEMOBANK1"), AccountId::new("DE11100000000123456789"), "CUST1");
        let xml = build_htd(&[account]).unwrap();
        assert!(xml.contains("DE11100000000123456789"));
    }
}
