//! Analytics store access: lead lookup and sale ingestion.
//!
//! Two backends: `TinybirdClient` (production) and `InMemoryAnalytics`
//! (tests and dev mode without a Tinybird token).

mod memory;
mod tinybird;

pub use memory::InMemoryAnalytics;
pub use tinybird::{LEAD_EVENT_PIPE, SALE_EVENTS_DATASOURCE, TinybirdClient};

use async_trait::async_trait;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::id::gen_event_id;

/// A previously recorded lead. Fields are opaque here; the record is copied
/// forward into the sale.
pub type LeadEvent = Map<String, Value>;

/// Transaction attributes written on top of the lead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleAttributes {
    pub payment_processor: String,
    pub product_id: String,
    /// Amount in the currency's smallest unit.
    pub amount: i64,
    pub currency: String,
    pub recurring: bool,
    pub recurring_interval: Option<String>,
    pub recurring_interval_count: Option<u32>,
    pub refunded: bool,
    pub metadata: Value,
}

/// A sale ready to be written: lead fields, then sale attributes, then the
/// event ID. Later fields win on key collision.
#[derive(Debug, Clone, PartialEq)]
pub struct SaleEvent {
    event_id: String,
    lead: LeadEvent,
    attributes: SaleAttributes,
}

impl SaleEvent {
    /// Builds a sale with a freshly generated event ID.
    pub fn new(lead: LeadEvent, attributes: SaleAttributes) -> Self {
        Self {
            event_id: gen_event_id(),
            lead,
            attributes,
        }
    }

    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    pub fn lead(&self) -> &LeadEvent {
        &self.lead
    }

    pub fn attributes(&self) -> &SaleAttributes {
        &self.attributes
    }

    /// The flat record as stored in analytics.
    pub fn to_record(&self) -> Result<Map<String, Value>> {
        let mut record = self.lead.clone();
        if let Value::Object(attributes) = serde_json::to_value(&self.attributes)? {
            record.extend(attributes);
        }
        record.insert("event_id".to_string(), Value::String(self.event_id.clone()));
        Ok(record)
    }
}

impl Serialize for SaleEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_record()
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

#[async_trait]
pub trait AnalyticsStore: Send + Sync {
    /// Lead events recorded for a customer, most relevant first.
    async fn get_lead_event(&self, customer_id: &str) -> Result<Vec<LeadEvent>>;

    /// Persist a sale event.
    async fn record_sale(&self, sale: &SaleEvent) -> Result<()>;
}
