mod stripe;

pub use stripe::*;

use async_trait::async_trait;

use crate::error::Result;

/// Processor name stamped on sales recorded from Stripe webhooks.
pub const STRIPE_PROCESSOR_NAME: &str = "stripe";

/// Lookup of payment-processor customer records.
///
/// `StripeClient` is the production implementation; tests substitute a fixed map.
#[async_trait]
pub trait CustomerDirectory: Send + Sync {
    async fn retrieve_customer(&self, customer_id: &str) -> Result<StripeCustomer>;
}
