use crate::error::EngineError;
use ebicsbank_auth::AuthService;
use ebicsbank_crypto::{load_rsa_public_from_components, load_rsa_private_key, public_key_components};
use ebicsbank_store::StoreTxn;
use ebicsbank_types::{Host, HostId, SubscriberId};
use ebicsbank_xml::{build_hpb_order_data, parse_hia_order_data, parse_ini_order_data};

/// Handles the three EBICS key-management order types: INI (signature key),
/// HIA (authentication + encryption keys), and HPB (host key retrieval).
#[derive(Default)]
pub struct KeyManagementService;

impl KeyManagementService {
    /// Processes an INI unsecured request's order data, registering the
    /// subscriber's signature public key.
    pub fn process_ini(
        &self,
        txn: &StoreTxn<'_>,
        auth: &AuthService,
        host_id: &HostId,
        user_id: &SubscriberId,
        order_data_xml: &str,
    ) -> Result<(), EngineError> {
        let (modulus, exponent) = parse_ini_order_data(order_data_xml)?;
        let public_key = load_rsa_public_from_components(&modulus, &exponent)?;
        let der = ebicsbank_crypto::public_key_to_der(&public_key)?;
        auth.register_ini_key(txn, host_id, user_id, der)?;
        tracing::info!(host = %host_id, user = %user_id, "INI: registered subscriber signature key");
        Ok(())
    }

    /// Processes an HIA unsecured request's order data, registering the
    /// subscriber's authentication and encryption public keys.
    pub fn process_hia(
        &self,
        txn: &StoreTxn<'_>,
        auth: &AuthService,
        host_id: &HostId,
        user_id: &SubscriberId,
        order_data_xml: &str,
    ) -> Result<(), EngineError> {
        let ((auth_mod, auth_exp), (enc_mod, enc_exp)) = parse_hia_order_data(order_data_xml)?;
        let auth_key = load_rsa_public_from_components(&auth_mod, &auth_exp)?;
        let enc_key = load_rsa_public_from_components(&enc_mod, &enc_exp)?;
        let auth_der = ebicsbank_crypto::public_key_to_der(&auth_key)?;
        let enc_der = ebicsbank_crypto::public_key_to_der(&enc_key)?;
        auth.register_hia_keys(txn, host_id, user_id, auth_der, enc_der)?;
        tracing::info!(host = %host_id, user = %user_id, "HIA: registered subscriber authentication/encryption keys");
        Ok(())
    }

    /// Ensures a host identity exists, generating a fresh RSA key pair on
    /// first use so HPB has keys to serve.
    pub fn ensure_host(&self, txn: &StoreTxn<'_>, host_id: &HostId) -> Result<Host, EngineError> {
        let key = ebicsbank_store::storage_key::host_key(&host_id.0);
        if let Some(host) = txn.get_host(&key)? {
            return Ok(host);
        }
        let auth_pair = ebicsbank_crypto::generate_rsa_keypair()?;
        let enc_pair = ebicsbank_crypto::generate_rsa_keypair()?;
        let host = Host {
            host_id: host_id.clone(),
            name: host_id.0.clone(),
            authentication_key: ebicsbank_crypto::private_key_to_der(&auth_pair.private)?,
            encryption_key: ebicsbank_crypto::private_key_to_der(&enc_pair.private)?,
        };
        txn.put_host(&key, &host)?;
        tracing::info!(host = %host_id, "generated fresh host key pair for HPB");
        Ok(host)
    }

    /// Builds the `HPBResponseOrderData` document carrying the host's public
    /// keys for a subscriber's HPB download.
    pub fn process_hpb(&self, txn: &StoreTxn<'_>, host_id: &HostId) -> Result<String, EngineError> {
        let host = self.ensure_host(txn, host_id)?;
        let auth_private = load_rsa_private_key(&host.authentication_key)?;
        let enc_private = load_rsa_private_key(&host.encryption_key)?;
        let (auth_mod, auth_exp) = public_key_components(&rsa::RsaPublicKey::from(&auth_private));
        let (enc_mod, enc_exp) = public_key_components(&rsa::RsaPublicKey::from(&enc_private));
        Ok(build_hpb_order_data(&auth_mod, &auth_exp, &enc_mod, &enc_exp)?)
    }
}
