use axum::{Extension, extract::State};
use serde::{Deserialize, Serialize};

use crate::analytics::SaleAttributes;
use crate::error::{AppError, Result, msg};
use crate::extractors::Json;
use crate::middleware::TrackSession;
use crate::sales::SaleJob;
use crate::state::AppState;

const RECURRING_INTERVALS: &[&str] = &["day", "week", "month", "year"];

fn default_currency() -> String {
    "usd".to_string()
}

/// Body of `POST /api/track/sale`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackSaleRequest {
    pub customer_id: String,
    #[serde(default)]
    pub payment_processor: String,
    #[serde(default)]
    pub product_id: String,
    /// Amount in the currency's smallest unit
    #[serde(default)]
    pub amount: i64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub recurring: bool,
    #[serde(default)]
    pub recurring_interval: Option<String>,
    #[serde(default)]
    pub recurring_interval_count: Option<u32>,
    #[serde(default)]
    pub refunded: bool,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl TrackSaleRequest {
    /// Range and enum checks serde can't express.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        if self.customer_id.trim().is_empty() {
            problems.push(msg::CUSTOMER_ID_REQUIRED.to_string());
        }
        if self.amount < 0 {
            problems.push("amount must not be negative".to_string());
        }
        if self.currency.trim().is_empty() {
            problems.push("currency must not be empty".to_string());
        }
        if let Some(interval) = self.recurring_interval.as_deref() {
            if !RECURRING_INTERVALS.contains(&interval) {
                problems.push(format!(
                    "recurringInterval must be one of {}",
                    RECURRING_INTERVALS.join(", ")
                ));
            }
        }
        if self.recurring_interval_count == Some(0) {
            problems.push("recurringIntervalCount must be at least 1".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(problems.join("; ")))
        }
    }

    pub fn into_job(self) -> SaleJob {
        SaleJob {
            customer_id: self.customer_id,
            attributes: SaleAttributes {
                payment_processor: self.payment_processor,
                product_id: self.product_id,
                amount: self.amount,
                currency: self.currency,
                recurring: self.recurring,
                recurring_interval: self.recurring_interval,
                recurring_interval_count: self.recurring_interval_count,
                refunded: self.refunded,
                metadata: self.metadata,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TrackSaleResponse {
    pub success: bool,
}

/// Track a sale conversion. Validates, queues the lead lookup and write, and
/// acknowledges without waiting for either.
pub async fn track_sale(
    State(state): State<AppState>,
    Extension(session): Extension<TrackSession>,
    Json(request): Json<TrackSaleRequest>,
) -> Result<Json<TrackSaleResponse>> {
    request.validate()?;

    tracing::debug!(
        "Sale tracked for customer {} by key {}",
        request.customer_id,
        session.key_prefix
    );

    state.sale_queue.submit(request.into_job());

    Ok(Json(TrackSaleResponse { success: true }))
}
