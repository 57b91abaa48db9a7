//! Fixtures shared by the service and handler tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use storefront_core::{Address, Money, Percent, Product, ShippingSelection, User, Weight};
use storefront_db::{Database, DbConfig};
use storefront_gateway::notification::signature;
use storefront_gateway::{
    GatewayError, GatewayResult, PaymentGateway, SnapRequest, SnapResponse, TransactionCheck,
};

use crate::config::AppConfig;
use crate::AppState;

pub const TEST_SERVER_KEY: &str = "SB-Mid-server-test";

pub async fn test_db() -> Database {
    Database::new(DbConfig::in_memory()).await.unwrap()
}

/// A WAL database file with a real pool, for tests that need parallel
/// writers. Keep the directory alive for as long as the database is used.
pub async fn file_db(max_connections: u32) -> (tempfile::TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let config = DbConfig::new(dir.path().join("storefront.db")).max_connections(max_connections);
    let db = Database::new(config).await.unwrap();
    (dir, db)
}

/// Inserts a user with one primary address.
pub async fn seed_user(db: &Database, id: &str) -> (User, Address) {
    let now = Utc::now();
    let user = User {
        id: id.to_string(),
        first_name: "Siti".to_string(),
        last_name: format!("Rahma {id}"),
        email: format!("{id}@example.com"),
        phone: "081234567890".to_string(),
        created_at: now,
    };
    let address = Address {
        id: format!("{id}-home"),
        user_id: id.to_string(),
        name: user.full_name(),
        address1: "Jl. Malioboro 12".to_string(),
        address2: String::new(),
        location_id: "501".to_string(),
        location_name: "Yogyakarta".to_string(),
        post_code: "55271".to_string(),
        phone: user.phone.clone(),
        email: user.email.clone(),
        is_primary: true,
        created_at: now,
    };

    let mut uow = db.begin().await.unwrap();
    uow.users().insert(&user).await.unwrap();
    uow.users().insert_address(&address).await.unwrap();
    uow.commit().await.unwrap();

    (user, address)
}

/// Inserts an undiscounted product priced in whole Rupiah.
pub async fn seed_product(db: &Database, id: &str, price_units: i64, stock: i64) -> Product {
    let now = Utc::now();
    let product = Product {
        id: id.to_string(),
        sku: id.to_uppercase(),
        name: format!("Product {id}"),
        price: Money::from_units(price_units),
        stock,
        weight: Weight::from_grams(250),
        discount_percent: Percent::zero(),
        discount_amount: Money::zero(),
        created_at: now,
        updated_at: now,
    };

    let mut uow = db.begin().await.unwrap();
    uow.products().insert(&product).await.unwrap();
    uow.commit().await.unwrap();

    product
}

pub fn shipping(cost_units: i64) -> ShippingSelection {
    ShippingSelection {
        service_code: "jne".to_string(),
        service_name: "REG".to_string(),
        cost: Money::from_units(cost_units),
    }
}

/// A signed notification body as the gateway would post it.
pub fn notification_body(order_code: &str, transaction_status: &str, gross: Money) -> Vec<u8> {
    let gross_amount = format!("{}.{:02}", gross.units(), gross.cents_part());
    let status_code = "200";
    serde_json::json!({
        "transaction_time": "2025-06-01 10:15:00",
        "transaction_status": transaction_status,
        "transaction_id": "9aed5972-5b6a-401e-894b-a32c91ed1a3a",
        "status_message": "midtrans payment notification",
        "status_code": status_code,
        "signature_key": signature(order_code, status_code, &gross_amount, TEST_SERVER_KEY),
        "payment_type": "bank_transfer",
        "order_id": order_code,
        "gross_amount": gross_amount,
        "fraud_status": "accept",
    })
    .to_string()
    .into_bytes()
}

pub fn test_config() -> AppConfig {
    let vars: HashMap<&str, &str> = [
        ("MIDTRANS_SERVER_KEY", TEST_SERVER_KEY),
        ("MIDTRANS_CLIENT_KEY", "SB-Mid-client-test"),
        ("DATABASE_URL", ":memory:"),
    ]
    .into_iter()
    .collect();
    AppConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap()
}

pub async fn test_state() -> (AppState, Arc<ScriptedGateway>) {
    let gateway = Arc::new(ScriptedGateway::new());
    let state = AppState::new(test_db().await, gateway.clone(), test_config());
    (state, gateway)
}

// =============================================================================
// Scripted Gateway
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SnapMode {
    Accept,
    Reject,
    EmptyToken,
}

#[derive(Debug, Clone)]
enum ScriptedStatus {
    Status { transaction: String, fraud: String },
    Transient,
    /// The status check never answers.
    Stalled,
}

#[derive(Debug)]
struct Script {
    snap_mode: SnapMode,
    snap_requests: Vec<SnapRequest>,
    statuses: HashMap<String, ScriptedStatus>,
}

/// In-memory gateway. Records Snap requests and answers status checks from
/// a per-order script; unscripted orders are unknown.
#[derive(Debug)]
pub struct ScriptedGateway {
    script: Mutex<Script>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        ScriptedGateway {
            script: Mutex::new(Script {
                snap_mode: SnapMode::Accept,
                snap_requests: Vec::new(),
                statuses: HashMap::new(),
            }),
        }
    }

    pub fn reject_snap(&self) {
        self.script.lock().unwrap().snap_mode = SnapMode::Reject;
    }

    pub fn return_empty_token(&self) {
        self.script.lock().unwrap().snap_mode = SnapMode::EmptyToken;
    }

    pub fn snap_requests(&self) -> Vec<SnapRequest> {
        self.script.lock().unwrap().snap_requests.clone()
    }

    pub fn set_status(&self, order_code: &str, transaction: &str, fraud: &str) {
        self.script.lock().unwrap().statuses.insert(
            order_code.to_string(),
            ScriptedStatus::Status {
                transaction: transaction.to_string(),
                fraud: fraud.to_string(),
            },
        );
    }

    pub fn set_transient(&self, order_code: &str) {
        self.script
            .lock()
            .unwrap()
            .statuses
            .insert(order_code.to_string(), ScriptedStatus::Transient);
    }

    pub fn set_stalled(&self, order_code: &str) {
        self.script
            .lock()
            .unwrap()
            .statuses
            .insert(order_code.to_string(), ScriptedStatus::Stalled);
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn create_transaction(&self, request: &SnapRequest) -> GatewayResult<SnapResponse> {
        let mut script = self.script.lock().unwrap();
        script.snap_requests.push(request.clone());

        let order_id = &request.transaction_details.order_id;
        match script.snap_mode {
            SnapMode::Accept => Ok(SnapResponse {
                token: format!("token-{order_id}"),
                redirect_url: format!("https://app.sandbox.midtrans.com/snap/v4/redirection/{order_id}"),
            }),
            SnapMode::Reject => Err(GatewayError::Rejected {
                status: 400,
                message: "transaction_details.gross_amount is not equal to the sum of item_details"
                    .to_string(),
            }),
            SnapMode::EmptyToken => Ok(SnapResponse {
                token: String::new(),
                redirect_url: String::new(),
            }),
        }
    }

    async fn check_transaction(&self, order_code: &str) -> GatewayResult<TransactionCheck> {
        let (status, gross_amount) = {
            let script = self.script.lock().unwrap();
            let gross_amount = script
                .snap_requests
                .iter()
                .find(|r| r.transaction_details.order_id == order_code)
                .map(|r| format!("{}.00", r.transaction_details.gross_amount))
                .unwrap_or_default();
            (script.statuses.get(order_code).cloned(), gross_amount)
        };

        match status {
            Some(ScriptedStatus::Status { transaction, fraud }) => Ok(TransactionCheck {
                order_id: order_code.to_string(),
                status_code: "200".to_string(),
                status_message: "Success, transaction is found".to_string(),
                transaction_status: transaction,
                fraud_status: Some(fraud).filter(|f| !f.is_empty()),
                gross_amount,
            }),
            Some(ScriptedStatus::Transient) => {
                Err(GatewayError::Transient("503 Service Unavailable".to_string()))
            }
            Some(ScriptedStatus::Stalled) => std::future::pending().await,
            None => Err(GatewayError::UnknownOrder(order_code.to_string())),
        }
    }
}
