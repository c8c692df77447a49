//! Test utilities and fixtures for saletrack integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

pub use saletrack::analytics::{AnalyticsStore, InMemoryAnalytics, LeadEvent};
pub use saletrack::error::{AppError, Result};
pub use saletrack::handlers;
pub use saletrack::payments::{CustomerDirectory, StripeCustomer};
pub use saletrack::sales::{StripeSaleDefaults, spawn_sale_worker};
pub use saletrack::state::AppState;

pub const TEST_WEBHOOK_SECRET: &str = "whsec_test_secret";
pub const TEST_TRACK_KEY: &str = "tk_test_0123456789abcdef";

/// Stripe customers served from a fixed map.
#[derive(Default)]
pub struct FakeCustomers {
    customers: Mutex<HashMap<String, StripeCustomer>>,
    calls: AtomicUsize,
    fail: bool,
}

impl FakeCustomers {
    pub fn new() -> Self {
        Self::default()
    }

    /// A directory whose every lookup fails like an unreachable Stripe API.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn insert(&self, id: &str, metadata: &[(&str, &str)]) {
        let customer = StripeCustomer {
            id: id.to_string(),
            deleted: false,
            metadata: metadata
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        };
        self.customers.lock().unwrap().insert(id.to_string(), customer);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CustomerDirectory for FakeCustomers {
    async fn retrieve_customer(&self, customer_id: &str) -> Result<StripeCustomer> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AppError::Upstream("Stripe API unreachable".into()));
        }
        self.customers
            .lock()
            .unwrap()
            .get(customer_id)
            .cloned()
            .ok_or_else(|| AppError::Upstream(format!("No such customer: {}", customer_id)))
    }
}

/// Everything a test needs to drive the app and inspect side effects.
pub struct TestApp {
    pub state: AppState,
    pub customers: Arc<FakeCustomers>,
    pub analytics: Arc<InMemoryAnalytics>,
}

/// State wired to the given backends, with a live sale worker.
pub fn test_state(
    customers: Arc<dyn CustomerDirectory>,
    analytics: Arc<dyn AnalyticsStore>,
    webhook_secret: Option<&str>,
) -> AppState {
    let (sale_queue, _worker) = spawn_sale_worker(analytics.clone(), 64);
    AppState {
        customers,
        analytics,
        sale_queue,
        stripe_webhook_secret: webhook_secret.map(String::from),
        customer_id_metadata_key: "customerId".to_string(),
        stripe_sale_defaults: StripeSaleDefaults::default(),
        track_api_keys: Arc::new(vec![TEST_TRACK_KEY.to_string()]),
    }
}

/// Send a request through the full router for `state`.
pub async fn send_with(state: &AppState, request: Request<Body>) -> (StatusCode, String) {
    let router = handlers::router(state.clone()).with_state(state.clone());
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

impl TestApp {
    pub fn new() -> Self {
        Self::with(FakeCustomers::new(), Some(TEST_WEBHOOK_SECRET))
    }

    pub fn with(customers: FakeCustomers, webhook_secret: Option<&str>) -> Self {
        let customers = Arc::new(customers);
        let analytics = Arc::new(InMemoryAnalytics::new());
        let state = test_state(customers.clone(), analytics.clone(), webhook_secret);

        Self {
            state,
            customers,
            analytics,
        }
    }

    pub fn router(&self) -> Router {
        handlers::router(self.state.clone()).with_state(self.state.clone())
    }

    /// Send a request and return status plus body text.
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, String) {
        send_with(&self.state, request).await
    }
}

pub fn lead(value: serde_json::Value) -> LeadEvent {
    value.as_object().cloned().expect("lead must be a JSON object")
}

pub fn compute_stripe_signature(payload: &[u8], secret: &str, timestamp: &str) -> String {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    type HmacSha256 = Hmac<Sha256>;

    let signed_payload = format!("{}.{}", timestamp, String::from_utf8_lossy(payload));
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(signed_payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Get current Unix timestamp as a string (for webhook signature tests)
pub fn current_timestamp() -> String {
    chrono::Utc::now().timestamp().to_string()
}

/// Full `Stripe-Signature` header value for `payload`.
pub fn stripe_signature_header(payload: &[u8], secret: &str) -> String {
    let timestamp = current_timestamp();
    let signature = compute_stripe_signature(payload, secret, &timestamp);
    format!("t={},v1={}", timestamp, signature)
}

/// Signed webhook POST.
pub fn stripe_webhook_request(payload: &serde_json::Value) -> Request<Body> {
    let body = serde_json::to_vec(payload).unwrap();
    let signature = stripe_signature_header(&body, TEST_WEBHOOK_SECRET);
    Request::builder()
        .method("POST")
        .uri("/api/webhooks/stripe")
        .header("Stripe-Signature", signature)
        .body(Body::from(body))
        .unwrap()
}

pub fn charge_succeeded_event(customer: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "id": "evt_test_1",
        "type": "charge.succeeded",
        "data": {
            "object": {
                "id": "ch_test_1",
                "object": "charge",
                "amount": 1000,
                "currency": "usd",
                "customer": customer,
                "paid": true
            }
        }
    })
}

/// Authenticated tracking POST with a JSON body.
pub fn track_sale_request(body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/track/sale")
        .header("Authorization", format!("Bearer {}", TEST_TRACK_KEY))
        .header("Content-Type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

/// Poll `condition` until it holds or two seconds pass.
pub async fn eventually<F: Fn() -> bool>(condition: F) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
