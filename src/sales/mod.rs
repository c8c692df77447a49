//! Sale recording: correlate a customer with their lead and write the sale.

mod queue;

pub use queue::{SaleJob, SaleQueue, spawn_sale_worker};

use crate::analytics::{AnalyticsStore, SaleAttributes, SaleEvent};
use crate::error::Result;

/// Values stamped on sales recorded from Stripe charges.
///
/// A charge carries no product or billing-cycle information, so these are
/// configuration rather than derived from the payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StripeSaleDefaults {
    pub product_id: String,
    pub recurring: bool,
    pub recurring_interval: String,
    pub recurring_interval_count: u32,
}

impl Default for StripeSaleDefaults {
    fn default() -> Self {
        Self {
            product_id: String::new(),
            recurring: true,
            recurring_interval: "month".to_string(),
            recurring_interval_count: 1,
        }
    }
}

/// Look up the customer's lead and, if there is one, write a sale built from
/// it.
///
/// Returns the written event, or `None` when no lead exists (not an error).
pub async fn record_sale(
    store: &dyn AnalyticsStore,
    customer_id: &str,
    attributes: SaleAttributes,
) -> Result<Option<SaleEvent>> {
    let lead = match store.get_lead_event(customer_id).await?.into_iter().next() {
        Some(lead) => lead,
        None => {
            tracing::debug!("No lead event for customer {}, skipping sale", customer_id);
            return Ok(None);
        }
    };

    let sale = SaleEvent::new(lead, attributes);
    store.record_sale(&sale).await?;

    tracing::info!(
        "Recorded sale {} for customer {} ({} {} via {})",
        sale.event_id(),
        customer_id,
        sale.attributes().amount,
        sale.attributes().currency,
        sale.attributes().payment_processor
    );

    Ok(Some(sale))
}
