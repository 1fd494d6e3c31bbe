//! Subscriber key-management and signature verification for the EBICS
//! sandbox: INI/HIA key registration, HPB key retrieval bookkeeping, A006
//! order-signature verification, and access-api HTTP basic auth.

pub mod error;

pub use error::AuthError;

use ebicsbank_crypto::{hash_password, load_rsa_public_key, verify_password};
use ebicsbank_store::StoreTxn;
use ebicsbank_types::{HostId, Subscriber, SubscriberId, SubscriberState};
use ebicsbank_xml::{verify_order_data, AuthSignature};
use rsa::RsaPublicKey;

/// Subscriber key-management and request authentication, operating against a
/// single store transaction so it composes with the engine's booking logic.
#[derive(Debug, Default)]
pub struct AuthService;

impl AuthService {
    pub fn new() -> Self {
        Self
    }

    fn load_subscriber(
        &self,
        txn: &StoreTxn<'_>,
        host_id: &HostId,
        user_id: &SubscriberId,
    ) -> Result<Subscriber, AuthError> {
        let key = ebicsbank_store::storage_key::subscriber_key(&host_id.0, &user_id.0);
        txn.get_subscriber(&key)?
            .ok_or_else(|| AuthError::unauthorized(host_id.0.clone(), user_id.0.clone()))
    }

    /// Registers an INI order's signature public key, transitioning the
    /// subscriber's state (`New -> PartiallyInitializedIni` or `-> Initialized`).
    pub fn register_ini_key(
        &self,
        txn: &StoreTxn<'_>,
        host_id: &HostId,
        user_id: &SubscriberId,
        signature_key_der: Vec<u8>,
    ) -> Result<(), AuthError> {
        let mut subscriber = self
            .load_subscriber(txn, host_id, user_id)
            .unwrap_or_else(|_| Subscriber::new(host_id.clone(), "", user_id.clone()));
        subscriber.keys.signature_key = Some(signature_key_der);
        subscriber.state = subscriber.state.apply_ini();
        let key = ebicsbank_store::storage_key::subscriber_key(&host_id.0, &user_id.0);
        txn.put_subscriber(&key, &subscriber)?;
        Ok(())
    }

    /// Registers an HIA order's authentication and encryption public keys,
    /// transitioning the subscriber's state (`New -> PartiallyInitializedHia`
    /// or `-> Initialized`).
    pub fn register_hia_keys(
        &self,
        txn: &StoreTxn<'_>,
        host_id: &HostId,
        user_id: &SubscriberId,
        authentication_key_der: Vec<u8>,
        encryption_key_der: Vec<u8>,
    ) -> Result<(), AuthError> {
        let mut subscriber = self
            .load_subscriber(txn, host_id, user_id)
            .unwrap_or_else(|_| Subscriber::new(host_id.clone(), "", user_id.clone()));
        subscriber.keys.authentication_key = Some(authentication_key_der);
        subscriber.keys.encryption_key = Some(encryption_key_der);
        subscriber.state = subscriber.state.apply_hia();
        let key = ebicsbank_store::storage_key::subscriber_key(&host_id.0, &user_id.0);
        txn.put_subscriber(&key, &subscriber)?;
        Ok(())
    }

    /// Returns `Ok(())` only if the subscriber has completed both INI and
    /// HIA and is therefore eligible to transact.
    pub fn require_ready(&self, txn: &StoreTxn<'_>, host_id: &HostId, user_id: &SubscriberId) -> Result<Subscriber, AuthError> {
        let subscriber = self.load_subscriber(txn, host_id, user_id)?;
        if !subscriber.state.is_ready() {
            return Err(AuthError::SubscriberNotReady { user_id: user_id.0.clone() });
        }
        Ok(subscriber)
    }

    /// Verifies an order's A006 signature against the subscriber's
    /// registered signature key, requiring the subscriber be fully initialized.
    pub fn verify_order_signature(
        &self,
        txn: &StoreTxn<'_>,
        host_id: &HostId,
        user_id: &SubscriberId,
        order_data_digest: &[u8],
        auth_signature: &AuthSignature,
    ) -> Result<(), AuthError> {
        let subscriber = self.require_ready(txn, host_id, user_id)?;
        let der = subscriber
            .keys
            .signature_key
            .ok_or_else(|| AuthError::signature_error("subscriber has no registered signature key"))?;
        let public_key: RsaPublicKey = load_rsa_public_key(&der)?;
        verify_order_data(order_data_digest, auth_signature, &public_key)?;
        Ok(())
    }

    /// Verifies HTTP basic-auth credentials for the access-api against a
    /// customer's stored Argon2id password hash.
    pub fn verify_basic_auth(
        &self,
        txn: &StoreTxn<'_>,
        host_id: &HostId,
        customer_id: &str,
        password: &str,
    ) -> Result<(), AuthError> {
        let key = ebicsbank_store::storage_key::customer_key(&host_id.0, customer_id);
        let customer = txn.get_customer(&key)?.ok_or(AuthError::InvalidCredentials)?;
        if verify_password(password, &customer.password_hash) {
            Ok(())
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }

    /// Hashes a plaintext password for a new customer record.
    pub fn hash_customer_password(&self, plaintext: &str) -> Result<String, AuthError> {
        Ok(hash_password(plaintext)?)
    }
}

pub fn subscriber_is_new(state: SubscriberState) -> bool {
    matches!(state, SubscriberState::New)
}
