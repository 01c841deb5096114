//! Retry Request Signature Verification
//!
//! A retry request must be authorized by the holder of the claimed Bitcoin
//! address. The request carries the signer's compressed public key (hex) and
//! an ECDSA signature (base64) over a canonical message binding the deposit
//! transaction hash and the claimed address, so a signature cannot be
//! replayed for a different deposit or sender.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use bitcoin::hashes::Hash;
use bitcoin::key::CompressedPublicKey;
use bitcoin::sign_message::signed_msg_hash;
use bitcoin::{Address, Network, PublicKey};
use secp256k1::{ecdsa::Signature, Message, Secp256k1};
use thiserror::Error;
use tracing::debug;

/// Prefix of the canonical signed message
const RETRY_MESSAGE_PREFIX: &str = "atlas-deposit-retry";

/// Signature verification errors
///
/// Deliberately a single opaque variant: a failed verification must not leak
/// whether the deposit exists or why the check failed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("invalid signature")]
    InvalidSignature,
}

/// Validates that a retry request was authorized by the holder of the
/// claimed Bitcoin address
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SignatureVerifier: Send + Sync {
    /// Verify `signature` (base64 ECDSA) by `public_key` (hex, compressed)
    /// over the canonical message for (`btc_txn_hash`, `address`), and that
    /// the key controls `address`.
    async fn verify(
        &self,
        btc_txn_hash: &str,
        address: &str,
        public_key: &str,
        signature: &str,
    ) -> Result<(), SignatureError>;
}

/// Canonical message a retry request signs
pub fn retry_message(btc_txn_hash: &str, address: &str) -> String {
    format!("{}:{}:{}", RETRY_MESSAGE_PREFIX, btc_txn_hash, address)
}

/// Local ECDSA message-signature verifier
pub struct MessageSignatureVerifier {
    network: Network,
}

impl MessageSignatureVerifier {
    /// Create a verifier for the given Bitcoin network
    pub fn new(network: Network) -> Self {
        Self { network }
    }

    fn verify_inner(
        &self,
        btc_txn_hash: &str,
        address: &str,
        public_key: &str,
        signature: &str,
    ) -> Result<(), SignatureError> {
        let pk_bytes = hex::decode(public_key).map_err(|_| SignatureError::InvalidSignature)?;
        let pk = secp256k1::PublicKey::from_slice(&pk_bytes)
            .map_err(|_| SignatureError::InvalidSignature)?;

        let sig_bytes = BASE64
            .decode(signature)
            .map_err(|_| SignatureError::InvalidSignature)?;
        let sig = Signature::from_compact(&sig_bytes)
            .or_else(|_| Signature::from_der(&sig_bytes))
            .map_err(|_| SignatureError::InvalidSignature)?;

        let msg_hash = signed_msg_hash(&retry_message(btc_txn_hash, address));
        let msg = Message::from_digest(msg_hash.to_byte_array());

        let secp = Secp256k1::verification_only();
        secp.verify_ecdsa(&msg, &sig, &pk)
            .map_err(|_| SignatureError::InvalidSignature)?;

        // The signature is valid for the key; the key must also control the
        // claimed address.
        if !self.key_controls_address(&pk, address) {
            debug!(address, "valid signature but key does not control claimed address");
            return Err(SignatureError::InvalidSignature);
        }

        Ok(())
    }

    fn key_controls_address(&self, pk: &secp256k1::PublicKey, claimed: &str) -> bool {
        let parsed = match claimed
            .parse::<Address<bitcoin::address::NetworkUnchecked>>()
            .map(|a| a.require_network(self.network))
        {
            Ok(Ok(address)) => address,
            _ => return false,
        };

        let compressed = CompressedPublicKey(*pk);
        let legacy = PublicKey::new(*pk);

        let candidates = [
            Address::p2wpkh(&compressed, self.network),
            Address::p2shwpkh(&compressed, self.network),
            Address::p2pkh(legacy.pubkey_hash(), self.network),
        ];

        candidates.iter().any(|candidate| *candidate == parsed)
    }
}

#[async_trait]
impl SignatureVerifier for MessageSignatureVerifier {
    async fn verify(
        &self,
        btc_txn_hash: &str,
        address: &str,
        public_key: &str,
        signature: &str,
    ) -> Result<(), SignatureError> {
        self.verify_inner(btc_txn_hash, address, public_key, signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Signer {
        sk: secp256k1::SecretKey,
        pk: secp256k1::PublicKey,
        address: String,
    }

    fn test_signer() -> Signer {
        let secp = Secp256k1::new();
        let (sk, pk) = secp.generate_keypair(&mut secp256k1::rand::thread_rng());
        let address = Address::p2wpkh(&CompressedPublicKey(pk), Network::Testnet).to_string();
        Signer { sk, pk, address }
    }

    fn sign(signer: &Signer, btc_txn_hash: &str, address: &str) -> String {
        let secp = Secp256k1::new();
        let msg_hash = signed_msg_hash(&retry_message(btc_txn_hash, address));
        let msg = Message::from_digest(msg_hash.to_byte_array());
        let sig = secp.sign_ecdsa(&msg, &signer.sk);
        BASE64.encode(sig.serialize_compact())
    }

    #[tokio::test]
    async fn test_valid_signature_accepted() {
        let signer = test_signer();
        let verifier = MessageSignatureVerifier::new(Network::Testnet);

        let signature = sign(&signer, "txhash1", &signer.address);
        let result = verifier
            .verify(
                "txhash1",
                &signer.address,
                &hex::encode(signer.pk.serialize()),
                &signature,
            )
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_signature_bound_to_txn_hash() {
        let signer = test_signer();
        let verifier = MessageSignatureVerifier::new(Network::Testnet);

        // Signed for txhash1, presented for txhash2
        let signature = sign(&signer, "txhash1", &signer.address);
        let result = verifier
            .verify(
                "txhash2",
                &signer.address,
                &hex::encode(signer.pk.serialize()),
                &signature,
            )
            .await;

        assert_eq!(result, Err(SignatureError::InvalidSignature));
    }

    #[tokio::test]
    async fn test_key_must_control_claimed_address() {
        let signer = test_signer();
        let other = test_signer();
        let verifier = MessageSignatureVerifier::new(Network::Testnet);

        // Valid signature by `signer`, but claiming someone else's address
        let signature = sign(&signer, "txhash1", &other.address);
        let result = verifier
            .verify(
                "txhash1",
                &other.address,
                &hex::encode(signer.pk.serialize()),
                &signature,
            )
            .await;

        assert_eq!(result, Err(SignatureError::InvalidSignature));
    }

    #[tokio::test]
    async fn test_garbage_inputs_rejected() {
        let verifier = MessageSignatureVerifier::new(Network::Testnet);

        let result = verifier
            .verify("txhash1", "tb1qnotanaddress", "zz", "!!!")
            .await;
        assert_eq!(result, Err(SignatureError::InvalidSignature));
    }
}
