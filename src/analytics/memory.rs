use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::{AppError, Result};

use super::{AnalyticsStore, LeadEvent, SaleEvent};

/// Most recent lead lookups kept for inspection.
pub const LOOKUP_LOG_LIMIT: usize = 10_000;

/// Process-local analytics store.
///
/// Keeps written sales and the last [`LOOKUP_LOG_LIMIT`] lead lookups so
/// callers can inspect what reached the backend. Leads and sales are never
/// evicted, so a long-running dev server grows with every recorded sale.
#[derive(Debug, Default)]
pub struct InMemoryAnalytics {
    leads: Mutex<HashMap<String, Vec<LeadEvent>>>,
    sales: Mutex<Vec<SaleEvent>>,
    lead_lookups: Mutex<VecDeque<String>>,
    fail_writes: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl InMemoryAnalytics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a lead for `customer_id`.
    pub fn insert_lead(&self, customer_id: impl Into<String>, lead: LeadEvent) {
        lock(&self.leads).entry(customer_id.into()).or_default().push(lead);
    }

    /// Loads a `{customerId: [lead, ...]}` JSON document. Returns the number of
    /// leads added.
    pub fn load_leads_json(&self, raw: &str) -> Result<usize> {
        let leads: HashMap<String, Vec<LeadEvent>> = serde_json::from_str(raw)?;

        let mut count = 0;
        for (customer_id, events) in leads {
            for lead in events {
                self.insert_lead(customer_id.clone(), lead);
                count += 1;
            }
        }
        Ok(count)
    }

    /// Makes every subsequent `record_sale` fail.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn sales(&self) -> Vec<SaleEvent> {
        lock(&self.sales).clone()
    }

    pub fn lead_lookups(&self) -> Vec<String> {
        lock(&self.lead_lookups).iter().cloned().collect()
    }

    /// Total backend calls (lookups plus writes).
    pub fn call_count(&self) -> usize {
        lock(&self.lead_lookups).len() + lock(&self.sales).len()
    }
}

#[async_trait]
impl AnalyticsStore for InMemoryAnalytics {
    async fn get_lead_event(&self, customer_id: &str) -> Result<Vec<LeadEvent>> {
        {
            let mut lookups = lock(&self.lead_lookups);
            if lookups.len() == LOOKUP_LOG_LIMIT {
                lookups.pop_front();
            }
            lookups.push_back(customer_id.to_string());
        }
        Ok(lock(&self.leads).get(customer_id).cloned().unwrap_or_default())
    }

    async fn record_sale(&self, sale: &SaleEvent) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Upstream("analytics write rejected".into()));
        }
        lock(&self.sales).push(sale.clone());
        Ok(())
    }
}
