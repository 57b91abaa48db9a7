//! # Payment Notifications
//!
//! Decoding and signature verification of the gateway's server-to-server
//! callback.
//!
//! ## Signature
//! ```text
//! signature_key = hex(SHA512(order_id + status_code + gross_amount + server_key))
//! ```
//! `gross_amount` is hashed exactly as received (e.g. `"239000.00"`), never
//! re-formatted.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};

use crate::error::{GatewayError, GatewayResult};

/// Fields of the notification the reconciler relies on. Everything else the
/// gateway sends is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub order_id: String,
    #[serde(default)]
    pub status_code: String,
    #[serde(default)]
    pub gross_amount: String,
    #[serde(default)]
    pub signature_key: String,
    #[serde(default)]
    pub transaction_status: String,
    #[serde(default)]
    pub fraud_status: Option<String>,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub payment_type: Option<String>,
}

impl Notification {
    /// Decodes a raw callback body.
    pub fn from_slice(body: &[u8]) -> GatewayResult<Self> {
        let notification: Notification = serde_json::from_slice(body)
            .map_err(|e| GatewayError::MalformedNotification(e.to_string()))?;

        if notification.order_id.trim().is_empty() {
            return Err(GatewayError::MalformedNotification(
                "order_id is missing".to_string(),
            ));
        }

        Ok(notification)
    }

    /// Checks `signature_key` against the shared server key.
    pub fn verify(&self, server_key: &str) -> GatewayResult<()> {
        let expected = signature(
            &self.order_id,
            &self.status_code,
            &self.gross_amount,
            server_key,
        );

        if expected.eq_ignore_ascii_case(self.signature_key.trim()) {
            Ok(())
        } else {
            Err(GatewayError::InvalidSignature(self.order_id.clone()))
        }
    }
}

/// Lowercase hex SHA-512 over the concatenated fields.
pub fn signature(order_id: &str, status_code: &str, gross_amount: &str, server_key: &str) -> String {
    let mut hasher = Sha512::new();
    hasher.update(order_id.as_bytes());
    hasher.update(status_code.as_bytes());
    hasher.update(gross_amount.as_bytes());
    hasher.update(server_key.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SERVER_KEY: &str = "SB-Mid-server-test";

    fn body(signature_key: &str) -> String {
        serde_json::json!({
            "transaction_time": "2025-06-01 10:15:00",
            "transaction_status": "settlement",
            "transaction_id": "b1c2d3",
            "status_message": "midtrans payment notification",
            "status_code": "200",
            "signature_key": signature_key,
            "payment_type": "bank_transfer",
            "order_id": "INV-20250601-0A1B2C3D",
            "merchant_id": "G000",
            "gross_amount": "239000.00",
            "fraud_status": "accept",
            "currency": "IDR"
        })
        .to_string()
    }

    #[test]
    fn test_signature_is_lowercase_sha512_hex() {
        let sig = signature("INV-1", "200", "239000.00", SERVER_KEY);
        assert_eq!(sig.len(), 128);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(sig, signature("INV-1", "200", "239000", SERVER_KEY));
    }

    #[test]
    fn test_decode_and_verify() {
        let sig = signature("INV-20250601-0A1B2C3D", "200", "239000.00", SERVER_KEY);
        let n = Notification::from_slice(body(&sig).as_bytes()).unwrap();

        assert_eq!(n.transaction_status, "settlement");
        assert_eq!(n.fraud_status.as_deref(), Some("accept"));
        assert_eq!(n.payment_type.as_deref(), Some("bank_transfer"));
        assert!(n.verify(SERVER_KEY).is_ok());
    }

    #[test]
    fn test_tampered_signature_rejected() {
        let sig = signature("INV-20250601-0A1B2C3D", "200", "1000.00", SERVER_KEY);
        let n = Notification::from_slice(body(&sig).as_bytes()).unwrap();

        assert!(matches!(
            n.verify(SERVER_KEY),
            Err(GatewayError::InvalidSignature(_))
        ));
        assert!(n.verify("another-key").is_err());
    }

    #[test]
    fn test_malformed_body() {
        assert!(matches!(
            Notification::from_slice(b"not json"),
            Err(GatewayError::MalformedNotification(_))
        ));
        assert!(matches!(
            Notification::from_slice(br#"{"order_id": "  "}"#),
            Err(GatewayError::MalformedNotification(_))
        ));
    }
}
