use crate::error::XmlError;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;

/// A single booking instruction extracted from a pain.001 customer credit
/// transfer initiation document.
#[derive(Debug, Clone)]
pub struct CreditTransferInstruction {
    pub pmt_info_id: String,
    pub debtor_iban: String,
    pub creditor_iban: String,
    pub creditor_name: String,
    pub amount: Decimal,
    pub currency: String,
    pub remittance_info: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Document {
    #[serde(rename = "CstmrCdtTrfInitn")]
    cstmr_cdt_trf_initn: CstmrCdtTrfInitn,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CstmrCdtTrfInitn {
    #[serde(rename = "PmtInf")]
    pmt_inf: Vec<PmtInf>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PmtInf {
    #[serde(rename = "PmtInfId")]
    pmt_inf_id: String,
    #[serde(rename = "DbtrAcct")]
    dbtr_acct: Acct,
    #[serde(rename = "CdtTrfTxInf")]
    cdt_trf_tx_inf: Vec<CdtTrfTxInf>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CdtTrfTxInf {
    #[serde(rename = "Amt")]
    amt: Amt,
    #[serde(rename = "Cdtr")]
    cdtr: PartyName,
    #[serde(rename = "CdtrAcct")]
    cdtr_acct: Acct,
    #[serde(rename = "RmtInf", default)]
    rmt_inf: Option<RmtInf>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RmtInf {
    #[serde(default)]
    ustrd: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PartyName {
    #[serde(rename = "Nm")]
    nm: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Acct {
    #[serde(rename = "Id")]
    id: AcctId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AcctId {
    #[serde(rename = "IBAN")]
    iban: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Amt {
    #[serde(rename = "InstdAmt")]
    instd_amt: InstdAmt,
}

#[derive(Debug, Deserialize)]
struct InstdAmt {
    #[serde(rename = "@Ccy")]
    ccy: String,
    #[serde(rename = "$text")]
    value: String,
}

/// Parses a pain.001 `CstmrCdtTrfInitn` document into flat booking instructions,
/// one per `CdtTrfTxInf`, carrying the enclosing `PmtInf`'s debtor account and
/// `PmtInfId` for idempotent booking.
pub fn parse_pain001(xml: &str) -> Result<Vec<CreditTransferInstruction>, XmlError> {
    let document: Document = quick_xml::de::from_str(xml)?;
    let mut instructions = Vec::new();
    for pmt_inf in document.cstmr_cdt_trf_initn.pmt_inf {
        for tx in pmt_inf.cdt_trf_tx_inf {
            let amount = Decimal::from_str(tx.amt.instd_amt.value.trim())
                .map_err(|e| XmlError::Parse(format!("invalid amount: {e}")))?;
            instructions.push(CreditTransferInstruction {
                pmt_info_id: pmt_inf.pmt_inf_id.clone(),
                debtor_iban: pmt_inf.dbtr_acct.id.iban.clone(),
                creditor_iban: tx.cdtr_acct.id.iban,
                creditor_name: tx.cdtr.nm,
                amount,
                currency: tx.amt.instd_amt.ccy,
                remittance_info: tx.rmt_inf.map(|r| r.ustrd).unwrap_or_default(),
            });
        }
    }
    Ok(instructions)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<Document>
        <CstmrCdtTrfInitn>
            <PmtInf>
                <PmtInfId>PMT-0001</PmtInfId>
                <DbtrAcct><Id><IBAN>DE11100000000123456789</IBAN></Id></DbtrAcct>
                <CdtTrfTxInf>
                    <Amt><InstdAmt Ccy="EUR">125.50</InstdAmt></Amt>
                    <Cdtr><Nm>Jane Doe</Nm></Cdtr>
                    <CdtrAcct><Id><IBAN>DE22100000000987654321</IBAN></Id></CdtrAcct>
                    <RmtInf><Ustrd>invoice 42</Ustrd></RmtInf>
                </CdtTrfTxInf>
            </PmtInf>
        </CstmrCdtTrfInitn>
    </Document>"#;

    #[test]
    fn parses_single_instruction() {
        let instructions = parse_pain001(SAMPLE).unwrap();
        assert_eq!(instructions.len(), 1);
        let tx = &instructions[0];
        assert_eq!(tx.pmt_info_id, "PMT-0001");
        assert_eq!(tx.amount, Decimal::from_str("125.50").unwrap());
        assert_eq!(tx.creditor_name, "Jane Doe");
        assert_eq!(tx.remittance_info, "invoice 42");
    }
}
