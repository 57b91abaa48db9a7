//! # Gateway Client
//!
//! [`PaymentGateway`] is the seam between the checkout/reconciliation
//! services and the remote gateway. [`MidtransClient`] is the HTTP
//! implementation; tests substitute a scripted one.
//!
//! ## Calls
//! ```text
//! create_transaction   POST {snap}/snap/v1/transactions     → token, redirect_url
//! check_transaction    GET  {api}/v2/{order_code}/status    → authoritative status
//! ```
//!
//! Both calls authenticate with HTTP Basic: server key as user, empty password.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{GatewayError, GatewayResult};
use crate::snap::{SnapRequest, SnapResponse};

/// Timeout applied when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

// =============================================================================
// Trait
// =============================================================================

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Opens a hosted-payment transaction for an order.
    async fn create_transaction(&self, request: &SnapRequest) -> GatewayResult<SnapResponse>;

    /// Fetches the gateway's current view of a transaction.
    async fn check_transaction(&self, order_code: &str) -> GatewayResult<TransactionCheck>;
}

/// Authoritative transaction state returned by the status API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionCheck {
    #[serde(default)]
    pub order_id: String,
    #[serde(default)]
    pub status_code: String,
    #[serde(default)]
    pub status_message: String,
    #[serde(default)]
    pub transaction_status: String,
    #[serde(default)]
    pub fraud_status: Option<String>,
    #[serde(default)]
    pub gross_amount: String,
}

// =============================================================================
// Configuration
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Sandbox,
    Production,
}

impl Environment {
    pub fn snap_url(&self) -> &'static str {
        match self {
            Environment::Sandbox => "https://app.sandbox.midtrans.com/snap/v1/transactions",
            Environment::Production => "https://app.midtrans.com/snap/v1/transactions",
        }
    }

    pub fn api_base_url(&self) -> &'static str {
        match self {
            Environment::Sandbox => "https://api.sandbox.midtrans.com",
            Environment::Production => "https://api.midtrans.com",
        }
    }

    pub fn status_url(&self, order_code: &str) -> String {
        format!("{}/v2/{}/status", self.api_base_url(), order_code)
    }
}

impl FromStr for Environment {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sandbox" => Ok(Environment::Sandbox),
            "production" => Ok(Environment::Production),
            other => Err(GatewayError::Config(format!(
                "unknown environment '{}', expected sandbox or production",
                other
            ))),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Sandbox => write!(f, "sandbox"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct MidtransConfig {
    pub server_key: String,
    pub client_key: String,
    pub environment: Environment,
    pub timeout: Duration,
}

impl fmt::Debug for MidtransConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MidtransConfig")
            .field("server_key", &"***")
            .field("client_key", &self.client_key)
            .field("environment", &self.environment)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl MidtransConfig {
    pub fn new(server_key: impl Into<String>, client_key: impl Into<String>) -> Self {
        MidtransConfig {
            server_key: server_key.into(),
            client_key: client_key.into(),
            environment: Environment::Sandbox,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

// =============================================================================
// HTTP Client
// =============================================================================

#[derive(Debug, Clone)]
pub struct MidtransClient {
    http: reqwest::Client,
    config: MidtransConfig,
}

impl MidtransClient {
    pub fn new(config: MidtransConfig) -> GatewayResult<Self> {
        if config.server_key.trim().is_empty() {
            return Err(GatewayError::Config("server key is empty".to_string()));
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::Config(e.to_string()))?;

        Ok(MidtransClient { http, config })
    }

    pub fn config(&self) -> &MidtransConfig {
        &self.config
    }
}

#[async_trait]
impl PaymentGateway for MidtransClient {
    async fn create_transaction(&self, request: &SnapRequest) -> GatewayResult<SnapResponse> {
        let order_id = &request.transaction_details.order_id;
        debug!(
            order_id = %order_id,
            gross_amount = request.transaction_details.gross_amount,
            lines = request.item_details.len(),
            "Creating Snap transaction"
        );

        let response = self
            .http
            .post(self.config.environment.snap_url())
            .basic_auth(&self.config.server_key, None::<&str>)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = error_message(&body);
            warn!(order_id = %order_id, status = status.as_u16(), %message, "Snap rejected transaction");
            return Err(GatewayError::from_status(status.as_u16(), message));
        }

        let snap: SnapResponse = serde_json::from_str(&body)?;
        if snap.token.trim().is_empty() {
            return Err(GatewayError::InvalidResponse(format!(
                "no token in Snap response: {}",
                error_message(&body)
            )));
        }

        Ok(snap)
    }

    async fn check_transaction(&self, order_code: &str) -> GatewayResult<TransactionCheck> {
        let response = self
            .http
            .get(self.config.environment.status_url(order_code))
            .basic_auth(&self.config.server_key, None::<&str>)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        interpret_status_response(order_code, status.as_u16(), &body)
    }
}

/// Maps a status-API reply to a check or an error category.
///
/// The API reports unknown transactions either as HTTP 404 or as HTTP 200
/// with `"status_code": "404"` in the body.
pub fn interpret_status_response(
    order_code: &str,
    http_status: u16,
    body: &str,
) -> GatewayResult<TransactionCheck> {
    if http_status == 404 {
        return Err(GatewayError::UnknownOrder(order_code.to_string()));
    }
    if !(200..300).contains(&http_status) {
        return Err(GatewayError::from_status(http_status, error_message(body)));
    }

    let check: TransactionCheck = serde_json::from_str(body)?;
    match check.status_code.as_str() {
        "404" => Err(GatewayError::UnknownOrder(order_code.to_string())),
        code if code.starts_with('5') => Err(GatewayError::Transient(format!(
            "status API reported {}: {}",
            code, check.status_message
        ))),
        _ if check.transaction_status.trim().is_empty() => Err(GatewayError::InvalidResponse(
            format!("no transaction_status for {}", order_code),
        )),
        _ => Ok(check),
    }
}

/// Best-effort human message from an error body.
fn error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        #[serde(default)]
        error_messages: Vec<String>,
        #[serde(default)]
        status_message: Option<String>,
    }

    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) if !parsed.error_messages.is_empty() => parsed.error_messages.join("; "),
        Ok(ErrorBody {
            status_message: Some(message),
            ..
        }) => message,
        _ => body.chars().take(200).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_urls() {
        assert_eq!(
            Environment::Sandbox.snap_url(),
            "https://app.sandbox.midtrans.com/snap/v1/transactions"
        );
        assert_eq!(
            Environment::Production.status_url("INV-1"),
            "https://api.midtrans.com/v2/INV-1/status"
        );
        assert_eq!("Production".parse::<Environment>().unwrap(), Environment::Production);
        assert!("staging".parse::<Environment>().is_err());
    }

    #[test]
    fn test_config_debug_hides_server_key() {
        let config = MidtransConfig::new("SB-Mid-server-secret", "SB-Mid-client");
        let printed = format!("{:?}", config);
        assert!(!printed.contains("secret"));
        assert!(MidtransClient::new(MidtransConfig::new(" ", "c")).is_err());
    }

    #[test]
    fn test_status_response_settlement() {
        let body = r#"{
            "status_code": "200",
            "status_message": "Success, transaction is found",
            "order_id": "INV-1",
            "gross_amount": "239000.00",
            "transaction_status": "settlement",
            "fraud_status": "accept"
        }"#;

        let check = interpret_status_response("INV-1", 200, body).unwrap();
        assert_eq!(check.transaction_status, "settlement");
        assert_eq!(check.gross_amount, "239000.00");
        assert_eq!(check.fraud_status.as_deref(), Some("accept"));
    }

    #[test]
    fn test_status_response_unknown_order() {
        let body = r#"{"status_code": "404", "status_message": "Transaction doesn't exist."}"#;
        assert!(matches!(
            interpret_status_response("INV-9", 200, body),
            Err(GatewayError::UnknownOrder(code)) if code == "INV-9"
        ));
        assert!(matches!(
            interpret_status_response("INV-9", 404, ""),
            Err(GatewayError::UnknownOrder(_))
        ));
    }

    #[test]
    fn test_status_response_failures() {
        assert!(interpret_status_response("INV-1", 503, "busy")
            .unwrap_err()
            .is_retryable());
        assert!(matches!(
            interpret_status_response("INV-1", 401, r#"{"error_messages":["Access denied"]}"#),
            Err(GatewayError::Rejected { status: 401, message }) if message == "Access denied"
        ));
        assert!(matches!(
            interpret_status_response("INV-1", 200, "<html>"),
            Err(GatewayError::InvalidResponse(_))
        ));
    }
}
