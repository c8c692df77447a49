//! Deferred sale recording.
//!
//! Request handlers hand jobs to a bounded channel and return immediately. A
//! single worker task drains the channel. Submitters never learn the outcome;
//! failures and panics are logged and dropped. The worker exits once every
//! `SaleQueue` handle is dropped and the channel is empty.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use crate::analytics::{AnalyticsStore, SaleAttributes};

use super::record_sale;

#[derive(Debug, Clone)]
pub struct SaleJob {
    pub customer_id: String,
    pub attributes: SaleAttributes,
}

/// Handle for submitting sale jobs to the worker.
#[derive(Debug, Clone)]
pub struct SaleQueue {
    tx: mpsc::Sender<SaleJob>,
}

impl SaleQueue {
    /// Enqueue without waiting. Returns `false` if the job was dropped because
    /// the queue is full or the worker has stopped.
    pub fn submit(&self, job: SaleJob) -> bool {
        match self.tx.try_send(job) {
            Ok(()) => true,
            Err(TrySendError::Full(job)) => {
                tracing::warn!(
                    "Sale queue full, dropping sale for customer {}",
                    job.customer_id
                );
                false
            }
            Err(TrySendError::Closed(job)) => {
                tracing::warn!(
                    "Sale worker stopped, dropping sale for customer {}",
                    job.customer_id
                );
                false
            }
        }
    }
}

/// Spawns the sale worker and returns its queue handle and join handle.
pub fn spawn_sale_worker(
    analytics: Arc<dyn AnalyticsStore>,
    capacity: usize,
) -> (SaleQueue, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<SaleJob>(capacity.max(1));

    let handle = tokio::spawn(async move {
        while let Some(job) = rx.recv().await {
            run_job(analytics.as_ref(), job).await;
        }
        tracing::info!("Sale worker stopped");
    });

    (SaleQueue { tx }, handle)
}

async fn run_job(analytics: &dyn AnalyticsStore, job: SaleJob) {
    let customer_id = job.customer_id;
    let result = AssertUnwindSafe(record_sale(analytics, &customer_id, job.attributes))
        .catch_unwind()
        .await;

    match result {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => {
            tracing::warn!("Deferred sale for customer {} failed: {}", customer_id, e);
        }
        Err(panic) => {
            let panic_msg = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::error!(
                "Deferred sale for customer {} panicked: {}",
                customer_id,
                panic_msg
            );
        }
    }
}
