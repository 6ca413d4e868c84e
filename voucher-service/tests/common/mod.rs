//! Shared setup for voucher-service integration tests.
//!
//! Drives the full router over the in-memory store with `oneshot`.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use service_core::config::Config as CoreConfig;
use std::str::FromStr;
use std::sync::Arc;
use tower::util::ServiceExt;
use voucher_service::config::{Environment, MongoConfig, StoreBackend, VoucherConfig};
use voucher_service::services::{InMemoryStore, VoucherStore};
use voucher_service::startup::{build_router, AppState};

pub const TEST_USER_ID: &str = "test_user_123";

pub fn memory_config() -> VoucherConfig {
    VoucherConfig {
        common: CoreConfig {
            log_level: "error".to_string(),
            ..CoreConfig::default()
        },
        environment: Environment::Dev,
        store: StoreBackend::Memory,
        mongodb: MongoConfig {
            uri: "mongodb://localhost:27017".to_string(),
            database: "voucher_test".to_string(),
        },
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<dyn VoucherStore>,
}

impl TestApp {
    pub fn spawn() -> Self {
        Self::with_store(Arc::new(InMemoryStore::new()))
    }

    pub fn with_store(store: Arc<dyn VoucherStore>) -> Self {
        let state = AppState::new(memory_config(), store.clone());
        Self {
            router: build_router(state),
            store,
        }
    }

    /// Send a request and return the status with the JSON body (`Null` when empty).
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("X-User-ID", TEST_USER_ID);

        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PATCH, uri, Some(body)).await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, None).await
    }

    /// Create a receive voucher and return its id.
    pub async fn create_voucher(&self, party: &str, amount: &str) -> String {
        let (status, body) = self
            .post(
                "/vouchers",
                json!({
                    "voucher_type": "receive",
                    "party": party,
                    "amount": amount,
                    "date": "2026-10-01",
                    "payment_mode": "bank_transfer"
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create voucher failed: {}", body);
        body["id"].as_str().unwrap().to_string()
    }

    /// Create a quotation of `kind` and return its id.
    pub async fn create_quotation(&self, kind: &str, client: &str, total: &str) -> String {
        let (status, body) = self
            .post(
                &format!("/quotations/{}", kind),
                json!({ "client_name": client, "total_amount": total }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create quotation failed: {}", body);
        body["quotation_id"].as_str().unwrap().to_string()
    }

    /// Allocate `amount` of a voucher to a quotation, returning status and body.
    pub async fn allocate(
        &self,
        voucher_id: &str,
        kind: &str,
        quotation_id: &str,
        amount: &str,
    ) -> (StatusCode, Value) {
        self.post(
            "/allocations",
            json!({
                "voucher_id": voucher_id,
                "quotation_id": quotation_id,
                "quotation_type": kind,
                "amount": amount
            }),
        )
        .await
    }
}

/// Read a decimal out of a JSON response, whether encoded as string or number.
pub fn dec(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).unwrap(),
        Value::Number(n) => Decimal::from_str(&n.to_string()).unwrap(),
        other => panic!("not a decimal: {}", other),
    }
}

pub fn amount(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}
