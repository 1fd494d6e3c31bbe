//! Composite RocksDB keys for the sandbox's column families.
//!
//! Each key is built from its components joined by a NUL separator, which
//! also makes prefix scans (e.g. "every fresh transaction for an account")
//! a straightforward `iterator_cf` with an `IteratorMode::From` prefix.

const SEP: u8 = 0x00;

fn join(parts: &[&str]) -> Vec<u8> {
    let mut out = Vec::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            out.push(SEP);
        }
        out.extend_from_slice(part.as_bytes());
    }
    out
}

pub fn host_key(host_id: &str) -> Vec<u8> {
    join(&[host_id])
}

pub fn subscriber_key(host_id: &str, user_id: &str) -> Vec<u8> {
    join(&[host_id, user_id])
}

pub fn demobank_key(host_id: &str) -> Vec<u8> {
    join(&[host_id])
}

pub fn customer_key(host_id: &str, customer_id: &str) -> Vec<u8> {
    join(&[host_id, customer_id])
}

pub fn account_key(host_id: &str, account_id: &str) -> Vec<u8> {
    join(&[host_id, account_id])
}

pub fn account_prefix(host_id: &str) -> Vec<u8> {
    let mut p = join(&[host_id]);
    p.push(SEP);
    p
}

pub fn transaction_key(account_id: &str, pmt_info_id: &str) -> Vec<u8> {
    join(&[account_id, pmt_info_id])
}

pub fn transaction_prefix(account_id: &str) -> Vec<u8> {
    let mut p = join(&[account_id]);
    p.push(SEP);
    p
}

pub fn fresh_transaction_key(account_id: &str, seq: &str) -> Vec<u8> {
    join(&[account_id, seq])
}

pub fn fresh_transaction_prefix(account_id: &str) -> Vec<u8> {
    let mut p = join(&[account_id]);
    p.push(SEP);
    p
}

pub fn statement_key(account_id: &str, statement_number: u64) -> Vec<u8> {
    join(&[account_id, &statement_number.to_string()])
}

pub fn statement_prefix(account_id: &str) -> Vec<u8> {
    let mut p = join(&[account_id]);
    p.push(SEP);
    p
}

pub fn download_tx_key(host_id: &str, transaction_id: &str) -> Vec<u8> {
    join(&[host_id, transaction_id])
}

pub fn upload_tx_key(host_id: &str, transaction_id: &str) -> Vec<u8> {
    join(&[host_id, transaction_id])
}

pub fn order_signature_key(host_id: &str, order_id: &str) -> Vec<u8> {
    join(&[host_id, order_id])
}

pub fn withdrawal_key(wopid: &str) -> Vec<u8> {
    join(&[wopid])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_matches_its_own_keys() {
        let prefix = transaction_prefix("ACC1");
        let key = transaction_key("ACC1", "PMT-1");
        assert!(key.starts_with(&prefix));
        let other_prefix = transaction_prefix("ACC2");
        assert!(!key.starts_with(&other_prefix));
    }
}
