use crate::error::XmlError;
use ebicsbank_types::{BankTransaction, Direction, Statement};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct Document<T> {
    #[serde(rename = "$value")]
    body: T,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct Bal {
    #[serde(rename = "Amt")]
    amt: AmtWithCcy,
    #[serde(rename = "CdtDbtInd")]
    cdt_dbt_ind: &'static str,
}

#[derive(Debug, Serialize)]
struct AmtWithCcy {
    #[serde(rename = "@Ccy")]
    ccy: String,
    #[serde(rename = "$text")]
    value: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct Ntry {
    #[serde(rename = "Amt")]
    amt: AmtWithCcy,
    #[serde(rename = "CdtDbtInd")]
    cdt_dbt_ind: &'static str,
    #[serde(rename = "BookgDt")]
    bookg_dt: String,
    #[serde(rename = "NtryDtls")]
    ntry_dtls: NtryDtls,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct NtryDtls {
    #[serde(rename = "TxDtls")]
    tx_dtls: TxDtls,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct TxDtls {
    #[serde(rename = "RmtInf")]
    rmt_inf: String,
    #[serde(rename = "RltdPties")]
    rltd_pties: RltdPties,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct RltdPties {
    #[serde(rename = "Nm")]
    nm: String,
    #[serde(rename = "IBAN")]
    iban: String,
}

fn direction_indicator(direction: &Direction) -> &'static str {
    match direction {
        Direction::Debit => "DBIT",
        Direction::Credit => "CRDT",
    }
}

fn ntry_from_transaction(tx: &BankTransaction) -> Ntry {
    Ntry {
        amt: AmtWithCcy {
            ccy: tx.currency.clone(),
            value: tx.amount.to_string(),
        },
        cdt_dbt_ind: direction_indicator(&tx.direction),
        bookg_dt: chrono::DateTime::from_timestamp(tx.booked_at, 0)
            .map(|d| d.to_rfc3339())
            .unwrap_or_default(),
        ntry_dtls: NtryDtls {
            tx_dtls: TxDtls {
                rmt_inf: tx.remittance_info.clone(),
                rltd_pties: RltdPties {
                    nm: tx.counterparty_name.clone(),
                    iban: tx.counterparty_iban.clone(),
                },
            },
        },
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct Camt052Stmt {
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "Bal")]
    bal: Vec<Bal>,
    #[serde(rename = "Ntry")]
    ntry: Vec<Ntry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct BkToCstmrAcctRpt {
    #[serde(rename = "Rpt")]
    rpt: Camt052Stmt,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct BkToCstmrStmt {
    #[serde(rename = "Stmt")]
    stmt: Camt052Stmt,
}

/// Builds a camt.052 intraday account report from the account's not-yet-swept
/// fresh transactions; balance entries use `CLBD` semantics over the running total.
pub fn build_camt052(account_id: &str, running_balance: rust_decimal::Decimal, currency: &str, fresh: &[BankTransaction]) -> Result<String, XmlError> {
    let rpt = Camt052Stmt {
        id: format!("{account_id}-RPT"),
        bal: vec![Bal {
            amt: AmtWithCcy { ccy: currency.to_string(), value: running_balance.to_string() },
            cdt_dbt_ind: if running_balance.is_sign_negative() { "DBIT" } else { "CRDT" },
        }],
        ntry: fresh.iter().map(ntry_from_transaction).collect(),
    };
    let doc = Document { body: BkToCstmrAcctRpt { rpt } };
    Ok(quick_xml::se::to_string(&doc)?)
}

/// Builds a camt.053 end-of-day statement, with `PRCD` (opening) and `CLBD`
/// (closing) balance entries bracketing the statement's booked transactions.
pub fn build_camt053(statement: &Statement, currency: &str) -> Result<String, XmlError> {
    let stmt = Camt052Stmt {
        id: format!("{}-{}", statement.account_id.0, statement.statement_number),
        bal: vec![
            Bal {
                amt: AmtWithCcy { ccy: currency.to_string(), value: statement.opening_balance.to_string() },
                cdt_dbt_ind: "PRCD",
            },
            Bal {
                amt: AmtWithCcy { ccy: currency.to_string(), value: statement.closing_balance.to_string() },
                cdt_dbt_ind: "CLBD",
            },
        ],
        ntry: statement.transactions.iter().map(ntry_from_transaction).collect(),
    };
    let doc = Document { body: BkToCstmrStmt { stmt } };
    Ok(quick_xml::se::to_string(&doc)?)
}
