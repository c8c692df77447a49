use std::collections::HashMap;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::{Client, Url};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::{AppError, Result, msg};

use super::CustomerDirectory;

type HmacSha256 = Hmac<Sha256>;

/// Maximum age of a webhook timestamp before it's rejected (in seconds).
pub const WEBHOOK_TIMESTAMP_TOLERANCE_SECS: i64 = 300;

/// Clock skew allowed for timestamps from the future (in seconds).
const WEBHOOK_FUTURE_SKEW_SECS: i64 = 60;

#[derive(Debug, Clone)]
pub struct StripeClient {
    client: Client,
    api_base: String,
    secret_key: Option<String>,
}

impl StripeClient {
    pub fn new(client: Client, api_base: impl Into<String>, secret_key: Option<String>) -> Self {
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            secret_key,
        }
    }

    /// `{api_base}/v1/customers/{id}` with the id as a single encoded segment.
    fn customer_url(&self, customer_id: &str) -> Result<Url> {
        if customer_id.is_empty() || customer_id == "." || customer_id == ".." {
            return Err(AppError::BadRequest(format!(
                "Invalid Stripe customer id: {:?}",
                customer_id
            )));
        }

        let mut url = Url::parse(&self.api_base)
            .map_err(|e| AppError::Internal(format!("Invalid Stripe API base: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| AppError::Internal("Stripe API base cannot be a base URL".into()))?
            .pop_if_empty()
            .extend(["v1", "customers", customer_id]);
        Ok(url)
    }
}

#[async_trait]
impl CustomerDirectory for StripeClient {
    /// Retrieve a customer by ID (`GET /v1/customers/{id}`).
    async fn retrieve_customer(&self, customer_id: &str) -> Result<StripeCustomer> {
        let secret_key = self
            .secret_key
            .as_deref()
            .ok_or_else(|| AppError::Internal(msg::STRIPE_NOT_CONFIGURED.into()))?;

        let response = self
            .client
            .get(self.customer_url(customer_id)?)
            .basic_auth(secret_key, None::<&str>)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Stripe API error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "Stripe API error ({}): {}",
                status, error_text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Failed to parse Stripe customer: {}", e)))
    }
}

/// Verify a `Stripe-Signature` header against the raw payload.
///
/// Header format: `t=timestamp,v1=signature[,v1=signature...]`. Any matching
/// `v1` entry passes. Returns `Ok(false)` for a well-formed header that does
/// not verify, `Err` for a malformed one.
pub fn verify_webhook_signature(secret: &str, payload: &[u8], signature: &str) -> Result<bool> {
    let mut timestamp = None;
    let mut candidates = Vec::new();

    for part in signature.split(',') {
        if let Some(t) = part.trim().strip_prefix("t=") {
            timestamp = Some(t);
        } else if let Some(s) = part.trim().strip_prefix("v1=") {
            candidates.push(s);
        }
    }

    let timestamp_str =
        timestamp.ok_or_else(|| AppError::BadRequest(msg::INVALID_SIGNATURE_FORMAT.into()))?;
    if candidates.is_empty() {
        return Err(AppError::BadRequest(msg::INVALID_SIGNATURE_FORMAT.into()));
    }

    let timestamp: i64 = timestamp_str
        .parse()
        .map_err(|_| AppError::BadRequest(msg::INVALID_TIMESTAMP_IN_SIGNATURE.into()))?;

    let age = chrono::Utc::now()
        .timestamp()
        .checked_sub(timestamp)
        .ok_or_else(|| AppError::BadRequest(msg::INVALID_TIMESTAMP_IN_SIGNATURE.into()))?;

    if age > WEBHOOK_TIMESTAMP_TOLERANCE_SECS {
        tracing::warn!(
            "Stripe webhook rejected: timestamp too old (age={}s, max={}s)",
            age,
            WEBHOOK_TIMESTAMP_TOLERANCE_SECS
        );
        return Ok(false);
    }

    if age < -WEBHOOK_FUTURE_SKEW_SECS {
        tracing::warn!(
            "Stripe webhook rejected: timestamp in the future (age={}s)",
            age
        );
        return Ok(false);
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| AppError::Internal(msg::INVALID_WEBHOOK_SECRET.into()))?;
    mac.update(timestamp_str.as_bytes());
    mac.update(b".");
    mac.update(payload);
    let expected = hex::encode(mac.finalize().into_bytes());
    let expected_bytes = expected.as_bytes();

    // Length is not secret: always 64 hex chars for SHA-256
    Ok(candidates.iter().any(|candidate| {
        let provided = candidate.as_bytes();
        provided.len() == expected_bytes.len() && bool::from(expected_bytes.ct_eq(provided))
    }))
}

/// Verify the signature and parse the event.
pub fn construct_event(payload: &[u8], signature: &str, secret: &str) -> Result<StripeWebhookEvent> {
    if !verify_webhook_signature(secret, payload, signature)? {
        return Err(AppError::BadRequest(msg::SIGNATURE_MISMATCH.into()));
    }
    Ok(serde_json::from_slice(payload)?)
}

/// Generic Stripe webhook event - object is parsed based on event_type
#[derive(Debug, Deserialize)]
pub struct StripeWebhookEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

// ============ charge.succeeded ============

#[derive(Debug, Deserialize)]
pub struct StripeCharge {
    pub id: String,
    /// Amount in the currency's smallest unit.
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub customer: Option<Expandable>,
}

/// A Stripe reference that is either a bare ID or an expanded object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Expandable {
    Id(String),
    Object { id: String },
}

impl Expandable {
    pub fn id(&self) -> &str {
        match self {
            Expandable::Id(id) => id,
            Expandable::Object { id } => id,
        }
    }
}

// ============ customers.retrieve ============

#[derive(Debug, Clone, Deserialize)]
pub struct StripeCustomer {
    pub id: String,
    /// Set (and metadata absent) when the customer was deleted.
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl StripeCustomer {
    /// Non-empty metadata value for `key`.
    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(payload: &[u8], secret: &str, timestamp: i64) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{}.", timestamp).as_bytes());
        mac.update(payload);
        format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn test_multiple_v1_entries_any_match() {
        let payload = b"{}";
        let now = chrono::Utc::now().timestamp();
        let good = sign(payload, "whsec_a", now);
        let good_sig = good.split("v1=").nth(1).unwrap();
        let header = format!("t={},v1={},v1={}", now, "0".repeat(64), good_sig);
        assert!(verify_webhook_signature("whsec_a", payload, &header).unwrap());
    }

    #[test]
    fn test_future_timestamp_rejected() {
        let payload = b"{}";
        let header = sign(payload, "whsec_a", chrono::Utc::now().timestamp() + 600);
        assert!(!verify_webhook_signature("whsec_a", payload, &header).unwrap());
    }

    #[test]
    fn test_construct_event_rejects_mismatch() {
        let payload = br#"{"type":"charge.succeeded","data":{"object":{}}}"#;
        let header = sign(payload, "whsec_other", chrono::Utc::now().timestamp());
        assert!(construct_event(payload, &header, "whsec_a").is_err());
    }

    #[test]
    fn test_min_timestamp_is_malformed_not_overflow() {
        let result = verify_webhook_signature("whsec_a", b"{}", "t=-9223372036854775808,v1=00");
        assert!(matches!(
            result,
            Err(AppError::BadRequest(ref m)) if m == msg::INVALID_TIMESTAMP_IN_SIGNATURE
        ));
    }

    #[test]
    fn test_customer_url_encodes_id_as_one_segment() {
        let client = StripeClient::new(Client::new(), "https://api.stripe.com/", None);

        let url = client.customer_url("cus_123").unwrap();
        assert_eq!(url.as_str(), "https://api.stripe.com/v1/customers/cus_123");

        let url = client.customer_url("cus_1/../../v1/charges?limit=100").unwrap();
        assert_eq!(
            url.path(),
            "/v1/customers/cus_1%2F..%2F..%2Fv1%2Fcharges%3Flimit=100"
        );
        assert_eq!(url.query(), None);
    }

    #[test]
    fn test_customer_url_keeps_base_path() {
        let client = StripeClient::new(Client::new(), "http://localhost:12111/stripe", None);
        let url = client.customer_url("cus_1").unwrap();
        assert_eq!(url.as_str(), "http://localhost:12111/stripe/v1/customers/cus_1");
    }

    #[test]
    fn test_customer_url_rejects_dot_segments() {
        let client = StripeClient::new(Client::new(), "https://api.stripe.com", None);
        assert!(client.customer_url("..").is_err());
        assert!(client.customer_url("").is_err());
    }

    #[test]
    fn test_charge_customer_expandable() {
        let bare: StripeCharge = serde_json::from_value(serde_json::json!({
            "id": "ch_1", "amount": 1000, "currency": "usd", "customer": "cus_1"
        }))
        .unwrap();
        assert_eq!(bare.customer.unwrap().id(), "cus_1");

        let expanded: StripeCharge = serde_json::from_value(serde_json::json!({
            "id": "ch_1", "amount": 1000, "currency": "usd",
            "customer": {"id": "cus_2", "object": "customer"}
        }))
        .unwrap();
        assert_eq!(expanded.customer.unwrap().id(), "cus_2");

        let none: StripeCharge = serde_json::from_value(serde_json::json!({
            "id": "ch_1", "amount": 1000, "currency": "usd", "customer": null
        }))
        .unwrap();
        assert!(none.customer.is_none());
    }

    #[test]
    fn test_deleted_customer_has_no_metadata() {
        let customer: StripeCustomer = serde_json::from_value(serde_json::json!({
            "id": "cus_1", "object": "customer", "deleted": true
        }))
        .unwrap();
        assert!(customer.deleted);
        assert_eq!(customer.metadata_value("customerId"), None);
    }
}
