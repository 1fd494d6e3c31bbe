use crate::constants::SEGMENT_SIZE;
use crate::error::EngineError;
use crate::services::LedgerService;
use ebicsbank_auth::AuthService;
use ebicsbank_store::StoreTxn;
use ebicsbank_types::{
    AccountId, BankTransaction, EbicsDownloadTx, EbicsUploadTx, HostId, OrderId, OrderSignature, OrderType,
    SubscriberId, TransactionId, TransactionPhase,
};
use ebicsbank_xml::AuthSignature;
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};

/// Drives the EBICS Initialisation/Transfer/Receipt phase machine for both
/// download orders (HTD/HKD/C52/C53/TSD) and upload orders (PTK/CCT),
/// including E002 segment encryption/decryption and A006 signature checks.
#[derive(Default)]
pub struct TransactionService;

impl TransactionService {
    /// Deflates and E002-encrypts `order_data_xml` for `recipient_key`, opens
    /// a new download transaction in the Initialisation phase, and persists
    /// its segmented, encrypted payload for subsequent Transfer requests.
    pub fn start_download(
        &self,
        txn: &StoreTxn<'_>,
        host_id: &HostId,
        user_id: &SubscriberId,
        order_type: OrderType,
        order_data_xml: &str,
        recipient_key: &RsaPublicKey,
    ) -> Result<EbicsDownloadTx, EngineError> {
        let deflated = ebicsbank_xml::deflate(order_data_xml.as_bytes())?;
        let envelope = ebicsbank_crypto::encrypt_e002(&deflated, recipient_key)?;

        let mut key_material = envelope.iv.to_vec();
        key_material.extend_from_slice(&envelope.wrapped_key);

        let download_tx = EbicsDownloadTx {
            host_id: host_id.clone(),
            user_id: user_id.clone(),
            transaction_id: TransactionId::generate(),
            order_type,
            order_id: OrderId::generate(),
            phase: TransactionPhase::Initialisation,
            transaction_key: key_material,
            segments: ebicsbank_xml::segment(&envelope.ciphertext, SEGMENT_SIZE),
            segment_number: 0,
        };

        let key = ebicsbank_store::storage_key::download_tx_key(&host_id.0, &download_tx.transaction_id.0);
        txn.put_download_tx(&key, &download_tx)?;
        tracing::info!(host = %host_id, user = %user_id, order_type = download_tx.order_type.wire_code(), "opened download transaction");
        Ok(download_tx)
    }

    /// Returns the next segment of an in-progress download and advances its
    /// phase/segment counter.
    pub fn transfer_download_segment(
        &self,
        txn: &StoreTxn<'_>,
        host_id: &HostId,
        transaction_id: &str,
        segment_number: u32,
    ) -> Result<Vec<u8>, EngineError> {
        let key = ebicsbank_store::storage_key::download_tx_key(&host_id.0, transaction_id);
        let mut download_tx = txn.get_download_tx(&key)?.ok_or(EngineError::TransactionNotFound)?;

        let index = segment_number.checked_sub(1).ok_or(EngineError::InvalidPhase)? as usize;
        let segment = download_tx.segments.get(index).cloned().ok_or(EngineError::InvalidPhase)?;

        download_tx.segment_number = segment_number;
        download_tx.phase = if segment_number as usize == download_tx.segments.len() {
            TransactionPhase::Receipt
        } else {
            TransactionPhase::Transfer
        };
        txn.put_download_tx(&key, &download_tx)?;
        Ok(segment)
    }

    /// Closes a download transaction once the subscriber has acknowledged receipt.
    pub fn close_download(&self, txn: &StoreTxn<'_>, host_id: &HostId, transaction_id: &str) -> Result<(), EngineError> {
        let key = ebicsbank_store::storage_key::download_tx_key(&host_id.0, transaction_id);
        txn.delete_download_tx(&key)?;
        Ok(())
    }

    /// Opens a new upload transaction (PTK/CCT) in the Initialisation phase.
    pub fn start_upload(
        &self,
        txn: &StoreTxn<'_>,
        host_id: &HostId,
        user_id: &SubscriberId,
        order_type: OrderType,
        transaction_key: Vec<u8>,
        num_segments: u32,
    ) -> Result<EbicsUploadTx, EngineError> {
        let upload_tx = EbicsUploadTx {
            host_id: host_id.clone(),
            user_id: user_id.clone(),
            transaction_id: TransactionId::generate(),
            order_type,
            order_id: OrderId::generate(),
            phase: TransactionPhase::Initialisation,
            transaction_key,
            segments_received: Vec::new(),
            segment_number: 0,
            num_segments,
        };
        let key = ebicsbank_store::storage_key::upload_tx_key(&host_id.0, &upload_tx.transaction_id.0);
        txn.put_upload_tx(&key, &upload_tx)?;
        tracing::info!(host = %host_id, user = %user_id, order_type = upload_tx.order_type.wire_code(), "opened upload transaction");
        Ok(upload_tx)
    }

    /// Appends a Transfer-phase segment to an in-progress upload, returning
    /// whether this was the final expected segment.
    pub fn receive_upload_segment(
        &self,
        txn: &StoreTxn<'_>,
        host_id: &HostId,
        transaction_id: &str,
        segment_number: u32,
        data: Vec<u8>,
    ) -> Result<bool, EngineError> {
        let key = ebicsbank_store::storage_key::upload_tx_key(&host_id.0, transaction_id);
        let mut upload_tx = txn.get_upload_tx(&key)?.ok_or(EngineError::TransactionNotFound)?;

        upload_tx.segments_received.push(data);
        upload_tx.segment_number = segment_number;
        upload_tx.phase = TransactionPhase::Transfer;
        let is_last = segment_number >= upload_tx.num_segments;
        txn.put_upload_tx(&key, &upload_tx)?;
        Ok(is_last)
    }

    /// Decrypts, verifies, and applies a fully-received upload: inflates the
    /// E002-decrypted order data, checks the A006 signature against the
    /// subscriber's registered key, books pain.001 (CCT) against
    /// `account_id`, and retires the transaction.
    #[allow(clippy::too_many_arguments)]
    pub fn finalize_upload(
        &self,
        txn: &StoreTxn<'_>,
        auth: &AuthService,
        ledger: &LedgerService,
        host_id: &HostId,
        user_id: &SubscriberId,
        account_id: &AccountId,
        transaction_id: &str,
        host_encryption_key: &RsaPrivateKey,
        order_signature: &AuthSignature,
        now: i64,
    ) -> Result<Vec<BankTransaction>, EngineError> {
        let key = ebicsbank_store::storage_key::upload_tx_key(&host_id.0, transaction_id);
        let upload_tx = txn.get_upload_tx(&key)?.ok_or(EngineError::TransactionNotFound)?;

        if upload_tx.transaction_key.len() < 16 {
            return Err(EngineError::InvalidPhase);
        }
        let (iv_bytes, wrapped_key) = upload_tx.transaction_key.split_at(16);
        let iv: [u8; 16] = iv_bytes.try_into().map_err(|_| EngineError::InvalidPhase)?;
        let ciphertext: Vec<u8> = upload_tx.segments_received.concat();

        let deflated = ebicsbank_crypto::decrypt_e002(wrapped_key, &ciphertext, &iv, host_encryption_key)?;
        let order_data = ebicsbank_xml::inflate(&deflated)?;
        let order_data_xml = String::from_utf8(order_data).map_err(|e| EngineError::Other(e.to_string()))?;

        let digest = Sha256::digest(order_data_xml.as_bytes()).to_vec();
        auth.verify_order_signature(txn, host_id, user_id, &digest, order_signature)?;

        let signature_record = OrderSignature {
            host_id: host_id.clone(),
            user_id: user_id.clone(),
            order_id: upload_tx.order_id.clone(),
            digest: digest.clone(),
            signature: order_signature.signature_value.as_bytes().to_vec(),
        };
        let sig_key = ebicsbank_store::storage_key::order_signature_key(&host_id.0, &upload_tx.order_id.0);
        txn.put_order_signature(&sig_key, &signature_record)?;

        let booked = match upload_tx.order_type {
            OrderType::Cct => ledger.book_pain001(txn, host_id, account_id, &order_data_xml, &upload_tx.order_id.0, now)?,
            OrderType::Ptk => {
                tracing::info!(order_id = %upload_tx.order_id, "accepted PTK test order, no booking performed");
                Vec::new()
            }
            _ => return Err(EngineError::UnknownOrderType),
        };

        txn.delete_upload_tx(&key)?;
        Ok(booked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ebicsbank_store::Store;
    use ebicsbank_types::{BankAccount, Subscriber};
    use rust_decimal::Decimal;
    use tempfile::TempDir;

    const PAIN001_SAMPLE: &str = r#"<Document>
        <CstmrCdtTrfInitn>
            <PmtInf>
                <PmtInfId>PMT-9</PmtInfId>
                <DbtrAcct><Id><IBAN>DE11100000000123456789</IBAN></Id></DbtrAcct>
                <CdtTrfTxInf>
                    <Amt><InstdAmt Ccy="EUR">20.00</InstdAmt></Amt>
                    <Cdtr><Nm>Acme GmbH</Nm></Cdtr>
                    <CdtrAcct><Id><IBAN>DE22100000000987654321</IBAN></Id></CdtrAcct>
                </CdtTrfTxInf>
            </PmtInf>
        </CstmrCdtTrfInitn>
    </Document>"#;

    #[test]
    fn download_round_trips_segment_through_encryption() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let host_id = HostId::new("DEMOBANK1");
        let user_id = SubscriberId::new("USER1");
        let pair = ebicsbank_crypto::generate_rsa_keypair().unwrap();
        let service = TransactionService::default();

        let download_tx = store
            .with_retry(|txn| service.start_download(txn, &host_id, &user_id, OrderType::Tsd, "<Test>payload</Test>", &pair.public))
            .unwrap();

        let segment = store
            .with_retry(|txn| service.transfer_download_segment(txn, &host_id, &download_tx.transaction_id.0, 1))
            .unwrap();

        let (iv_bytes, wrapped_key) = download_tx.transaction_key.split_at(16);
        let iv: [u8; 16] = iv_bytes.try_into().unwrap();
        let deflated = ebicsbank_crypto::decrypt_e002(wrapped_key, &segment, &iv, &pair.private).unwrap();
        let xml = ebicsbank_xml::inflate(&deflated).unwrap();
        assert_eq!(xml, b"<Test>payload</Test>");
    }

    #[test]
    fn upload_finalize_books_cct_payment() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let host_id = HostId::new("DEMOBANK1");
        let user_id = SubscriberId::new("USER1");
        let account_id = AccountId::new("DE11100000000123456789");
        let subscriber_keys = ebicsbank_crypto::generate_rsa_keypair().unwrap();
        let host_enc_keys = ebicsbank_crypto::generate_rsa_keypair().unwrap();
        let service = TransactionService::default();
        let ledger = LedgerService::default();
        let auth = AuthService::default();

        let deflated = ebicsbank_xml::deflate(PAIN001_SAMPLE.as_bytes()).unwrap();
        let envelope = ebicsbank_crypto::encrypt_e002(&deflated, &host_enc_keys.public).unwrap();
        let mut key_material = envelope.iv.to_vec();
        key_material.extend_from_slice(&envelope.wrapped_key);

        let digest = Sha256::digest(PAIN001_SAMPLE.as_bytes()).to_vec();
        let order_signature = ebicsbank_xml::sign_order_data(&digest, &subscriber_keys.private).unwrap();

        store
            .with_retry(|txn| {
                let mut account = BankAccount::new(host_id.clone(), account_id.clone(), "CUST1");
                account.balance = Decimal::new(10000, 2);
                txn.put_account(&ebicsbank_store::storage_key::account_key(&host_id.0, &account_id.0), &account)?;

                let mut subscriber = Subscriber::new(host_id.clone(), "PARTNER1", user_id.clone());
                subscriber.keys.signature_key = Some(ebicsbank_crypto::public_key_to_der(&subscriber_keys.public).unwrap());
                subscriber.state = subscriber.state.apply_ini();
                subscriber.state = subscriber.state.apply_hia();
                txn.put_subscriber(&ebicsbank_store::storage_key::subscriber_key(&host_id.0, &user_id.0), &subscriber)
            })
            .unwrap();

        let upload_tx = store
            .with_retry(|txn| service.start_upload(txn, &host_id, &user_id, OrderType::Cct, key_material.clone(), 1))
            .unwrap();

        store
            .with_retry(|txn| service.receive_upload_segment(txn, &host_id, &upload_tx.transaction_id.0, 1, envelope.ciphertext.clone()))
            .unwrap();

        let booked = store
            .with_retry(|txn| {
                service.finalize_upload(
                    txn,
                    &auth,
                    &ledger,
                    &host_id,
                    &user_id,
                    &account_id,
                    &upload_tx.transaction_id.0,
                    &host_enc_keys.private,
                    &order_signature,
                    0,
                )
            })
            .unwrap();

        assert_eq!(booked.len(), 1);
        assert_eq!(booked[0].amount, Decimal::new(2000, 2));
    }
}
