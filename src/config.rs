use std::env;

use crate::sales::StripeSaleDefaults;

pub const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com";
pub const DEFAULT_TINYBIRD_API_URL: &str = "https://api.tinybird.co";
pub const DEFAULT_CUSTOMER_ID_METADATA_KEY: &str = "customerId";
pub const DEFAULT_SALE_QUEUE_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub dev_mode: bool,
    /// Stripe webhook signing secret (whsec_...). The webhook rejects every
    /// request while this is unset.
    pub stripe_webhook_secret: Option<String>,
    /// Stripe secret API key used for customer retrieval.
    pub stripe_secret_key: Option<String>,
    pub stripe_api_base: String,
    /// Key in Stripe customer metadata holding our customer identifier.
    pub customer_id_metadata_key: String,
    pub stripe_sale_defaults: StripeSaleDefaults,
    pub tinybird_api_url: String,
    pub tinybird_api_key: Option<String>,
    /// Bearer keys accepted by the tracking endpoint.
    pub track_api_keys: Vec<String>,
    pub sale_queue_capacity: usize,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("SALETRACK_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let defaults = StripeSaleDefaults::default();
        let stripe_sale_defaults = StripeSaleDefaults {
            product_id: env::var("STRIPE_SALE_PRODUCT_ID").unwrap_or(defaults.product_id),
            recurring: env_parse("STRIPE_SALE_RECURRING").unwrap_or(defaults.recurring),
            recurring_interval: env::var("STRIPE_SALE_RECURRING_INTERVAL")
                .unwrap_or(defaults.recurring_interval),
            recurring_interval_count: env_parse("STRIPE_SALE_RECURRING_INTERVAL_COUNT")
                .unwrap_or(defaults.recurring_interval_count),
        };

        Self {
            host,
            port,
            dev_mode,
            stripe_webhook_secret: env_non_empty("STRIPE_WEBHOOK_SECRET"),
            stripe_secret_key: env_non_empty("STRIPE_SECRET_KEY"),
            stripe_api_base: env::var("STRIPE_API_BASE")
                .unwrap_or_else(|_| DEFAULT_STRIPE_API_BASE.to_string()),
            customer_id_metadata_key: env::var("STRIPE_CUSTOMER_ID_METADATA_KEY")
                .unwrap_or_else(|_| DEFAULT_CUSTOMER_ID_METADATA_KEY.to_string()),
            stripe_sale_defaults,
            tinybird_api_url: env::var("TINYBIRD_API_URL")
                .unwrap_or_else(|_| DEFAULT_TINYBIRD_API_URL.to_string()),
            tinybird_api_key: env_non_empty("TINYBIRD_API_KEY"),
            track_api_keys: env::var("TRACK_API_KEYS")
                .map(|v| parse_key_list(&v))
                .unwrap_or_default(),
            sale_queue_capacity: env_parse("SALE_QUEUE_CAPACITY")
                .filter(|&n: &usize| n > 0)
                .unwrap_or(DEFAULT_SALE_QUEUE_CAPACITY),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Human-readable summary with secrets reduced to set/unset.
    pub fn redacted_summary(&self) -> String {
        fn set(v: &Option<String>) -> &'static str {
            if v.is_some() { "set" } else { "unset" }
        }

        format!(
            "addr={} dev_mode={} stripe_webhook_secret={} stripe_secret_key={} \
             stripe_api_base={} customer_id_metadata_key={} stripe_sale_defaults={:?} \
             tinybird_api_url={} tinybird_api_key={} track_api_keys={} sale_queue_capacity={}",
            self.addr(),
            self.dev_mode,
            set(&self.stripe_webhook_secret),
            set(&self.stripe_secret_key),
            self.stripe_api_base,
            self.customer_id_metadata_key,
            self.stripe_sale_defaults,
            self.tinybird_api_url,
            set(&self.tinybird_api_key),
            self.track_api_keys.len(),
            self.sale_queue_capacity,
        )
    }
}

fn env_non_empty(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

/// Splits a comma-separated key list, dropping blanks.
pub fn parse_key_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
