//! Saletrack - sale attribution for tracked leads
//!
//! Receives payment signals (Stripe webhooks and first-party tracking calls),
//! matches them to a previously recorded lead and writes a sale event to the
//! analytics store.

pub mod analytics;
pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod id;
pub mod middleware;
pub mod payments;
pub mod sales;
pub mod state;
pub mod util;
