use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{AppError, Result};

use super::{AnalyticsStore, LeadEvent, SaleEvent};

/// Pipe returning lead events for a `customerId`.
pub const LEAD_EVENT_PIPE: &str = "get_lead_event";

/// Datasource receiving sale events.
pub const SALE_EVENTS_DATASOURCE: &str = "dub_sale_events";

#[derive(Debug, Deserialize)]
struct PipeResponse {
    #[serde(default)]
    data: Vec<LeadEvent>,
}

#[derive(Debug, Deserialize)]
struct IngestResponse {
    #[serde(default)]
    successful_rows: u64,
    #[serde(default)]
    quarantined_rows: u64,
}

#[derive(Debug, Clone)]
pub struct TinybirdClient {
    client: Client,
    api_url: String,
    token: String,
}

impl TinybirdClient {
    pub fn new(client: Client, api_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }
}

/// Tinybird columns are flat; `metadata` is stored as a JSON string.
fn ingest_line(sale: &SaleEvent) -> Result<String> {
    let mut record = sale.to_record()?;
    if let Some(metadata) = record.get_mut("metadata") {
        if !metadata.is_string() {
            let encoded = if metadata.is_null() {
                String::new()
            } else {
                serde_json::to_string(metadata)?
            };
            *metadata = Value::String(encoded);
        }
    }
    let mut line = serde_json::to_string(&record)?;
    line.push('\n');
    Ok(line)
}

#[async_trait]
impl AnalyticsStore for TinybirdClient {
    async fn get_lead_event(&self, customer_id: &str) -> Result<Vec<LeadEvent>> {
        let response = self
            .client
            .get(format!("{}/v0/pipes/{}.json", self.api_url, LEAD_EVENT_PIPE))
            .bearer_auth(&self.token)
            .query(&[("customerId", customer_id)])
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Tinybird API error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "Tinybird pipe {} failed ({}): {}",
                LEAD_EVENT_PIPE, status, error_text
            )));
        }

        let body: PipeResponse = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Failed to parse Tinybird response: {}", e)))?;

        Ok(body.data)
    }

    async fn record_sale(&self, sale: &SaleEvent) -> Result<()> {
        let body = ingest_line(sale)?;

        let response = self
            .client
            .post(format!("{}/v0/events", self.api_url))
            .bearer_auth(&self.token)
            .query(&[("name", SALE_EVENTS_DATASOURCE), ("wait", "true")])
            .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
            .body(body)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Tinybird API error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "Tinybird ingest into {} failed ({}): {}",
                SALE_EVENTS_DATASOURCE, status, error_text
            )));
        }

        let result: IngestResponse = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Failed to parse Tinybird response: {}", e)))?;

        if result.quarantined_rows > 0 {
            return Err(AppError::Upstream(format!(
                "Tinybird quarantined sale event {} ({} rows)",
                sale.event_id(),
                result.quarantined_rows
            )));
        }

        tracing::debug!(
            "Tinybird accepted sale event {} ({} rows)",
            sale.event_id(),
            result.successful_rows
        );
        Ok(())
    }
}
