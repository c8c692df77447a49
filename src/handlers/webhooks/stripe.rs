use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};

use crate::analytics::SaleAttributes;
use crate::error::Result;
use crate::payments::{STRIPE_PROCESSOR_NAME, StripeCharge, StripeWebhookEvent, construct_event};
use crate::sales::{StripeSaleDefaults, record_sale};
use crate::state::AppState;

/// Stripe event types this endpoint acts on. Everything else is acknowledged
/// and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupportedStripeEvent {
    ChargeSucceeded,
}

impl SupportedStripeEvent {
    pub fn from_event_type(event_type: &str) -> Option<Self> {
        match event_type {
            "charge.succeeded" => Some(Self::ChargeSucceeded),
            _ => None,
        }
    }
}

/// Axum handler for Stripe webhooks.
///
/// 400 "Invalid request" without a signature header or configured secret,
/// 400 "Error" for any failure after that, 200 "OK" otherwise. The response
/// waits for the sale to be written.
pub async fn handle_stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok());

    let (Some(signature), Some(secret)) = (signature, state.stripe_webhook_secret.as_deref())
    else {
        return (StatusCode::BAD_REQUEST, "Invalid request");
    };

    match process_stripe_webhook(&state, &body, signature, secret).await {
        Ok(()) => (StatusCode::OK, "OK"),
        Err(e) => {
            tracing::error!("Stripe webhook error: {}", e);
            (StatusCode::BAD_REQUEST, "Error")
        }
    }
}

async fn process_stripe_webhook(
    state: &AppState,
    body: &[u8],
    signature: &str,
    secret: &str,
) -> Result<()> {
    let event = construct_event(body, signature, secret)?;

    let Some(kind) = SupportedStripeEvent::from_event_type(&event.event_type) else {
        tracing::debug!("Ignoring Stripe event type {}", event.event_type);
        return Ok(());
    };

    match kind {
        SupportedStripeEvent::ChargeSucceeded => handle_charge_succeeded(state, &event).await,
    }
}

async fn handle_charge_succeeded(state: &AppState, event: &StripeWebhookEvent) -> Result<()> {
    let charge: StripeCharge = serde_json::from_value(event.data.object.clone())?;

    tracing::debug!(
        "Stripe charge {} succeeded (event {})",
        charge.id,
        event.id.as_deref().unwrap_or("-")
    );

    let Some(customer_ref) = charge.customer.as_ref() else {
        tracing::debug!("Charge {} has no customer, skipping", charge.id);
        return Ok(());
    };

    let customer = state.customers.retrieve_customer(customer_ref.id()).await?;

    let Some(customer_id) = customer.metadata_value(&state.customer_id_metadata_key) else {
        tracing::debug!(
            "Stripe customer {} has no {} metadata, skipping",
            customer.id,
            state.customer_id_metadata_key
        );
        return Ok(());
    };

    let attributes = charge_sale_attributes(
        &state.stripe_sale_defaults,
        &charge,
        event.data.object.clone(),
    );

    if let Some(sale) = record_sale(state.analytics.as_ref(), customer_id, attributes).await? {
        // Duplicate deliveries produce a new sale each time; log the link so
        // they can be traced back to the charge.
        tracing::info!(
            "Stripe charge {} recorded as sale {} (event {})",
            charge.id,
            sale.event_id(),
            event.id.as_deref().unwrap_or("-")
        );
    }

    Ok(())
}

/// Sale attributes for a succeeded charge. `raw_charge` is kept verbatim in
/// the metadata.
pub fn charge_sale_attributes(
    defaults: &StripeSaleDefaults,
    charge: &StripeCharge,
    raw_charge: serde_json::Value,
) -> SaleAttributes {
    SaleAttributes {
        payment_processor: STRIPE_PROCESSOR_NAME.to_string(),
        product_id: defaults.product_id.clone(),
        amount: charge.amount,
        currency: charge.currency.clone(),
        recurring: defaults.recurring,
        recurring_interval: Some(defaults.recurring_interval.clone()),
        recurring_interval_count: Some(defaults.recurring_interval_count),
        refunded: false,
        metadata: serde_json::json!({ "charge": raw_charge }),
    }
}
