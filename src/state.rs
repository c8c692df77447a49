use std::sync::Arc;

use crate::analytics::AnalyticsStore;
use crate::payments::CustomerDirectory;
use crate::sales::{SaleQueue, StripeSaleDefaults};

/// Application state shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Stripe customer lookup
    pub customers: Arc<dyn CustomerDirectory>,
    /// Lead lookup and sale ingestion
    pub analytics: Arc<dyn AnalyticsStore>,
    /// Deferred sale recordings from the tracking endpoint
    pub sale_queue: SaleQueue,
    pub stripe_webhook_secret: Option<String>,
    /// Key in Stripe customer metadata holding our customer identifier
    pub customer_id_metadata_key: String,
    pub stripe_sale_defaults: StripeSaleDefaults,
    /// Bearer keys accepted by the tracking endpoint
    pub track_api_keys: Arc<Vec<String>>,
}
