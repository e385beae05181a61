//! Asynchronous retry of failed record writes.
//!
//! A failed write must never block or alter the verdict already computed:
//! the pipeline hands the record to `RecordWriter`, which attempts the
//! write once and queues it for the background `RetryWriter` on failure.
//! Retries use jittered exponential backoff off the request path.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::{broadcast, mpsc};
use tokio::time::sleep;

use crate::anomaly::AnomalyDetection;
use crate::observability::metrics;
use crate::persist::{ActivityStore, SessionRecord};
use crate::pipeline::incident::SecurityIncident;
use crate::signature::IntrusionAttempt;
use crate::store::StoreError;

/// A record waiting to be written.
#[derive(Debug, Clone)]
pub enum PendingWrite {
    Intrusion(IntrusionAttempt),
    Anomaly(AnomalyDetection),
    Incident(SecurityIncident),
    Session(SessionRecord),
}

impl PendingWrite {
    fn kind(&self) -> &'static str {
        match self {
            PendingWrite::Intrusion(_) => "intrusion",
            PendingWrite::Anomaly(_) => "anomaly",
            PendingWrite::Incident(_) => "incident",
            PendingWrite::Session(_) => "session",
        }
    }
}

fn apply(store: &dyn ActivityStore, record: &PendingWrite) -> Result<(), StoreError> {
    match record {
        PendingWrite::Intrusion(r) => store.record_intrusion(r.clone()),
        PendingWrite::Anomaly(r) => store.record_anomaly(r.clone()),
        PendingWrite::Incident(r) => store.record_incident(r.clone()),
        PendingWrite::Session(r) => store.record_session(r.clone()),
    }
}

/// Request-path handle: one write attempt, then queue.
#[derive(Clone)]
pub struct RecordWriter {
    store: Arc<dyn ActivityStore>,
    tx: mpsc::UnboundedSender<PendingWrite>,
}

impl RecordWriter {
    pub fn new(store: Arc<dyn ActivityStore>) -> (Self, mpsc::UnboundedReceiver<PendingWrite>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { store, tx }, rx)
    }

    pub fn write(&self, record: PendingWrite) {
        if let Err(e) = apply(&*self.store, &record) {
            tracing::warn!(
                kind = record.kind(),
                error = %e,
                "Record write failed, queued for retry"
            );
            metrics::record_store_error("record_write");
            let _ = self.tx.send(record);
        }
    }
}

/// Background task draining the retry queue.
pub struct RetryWriter {
    store: Arc<dyn ActivityStore>,
    rx: mpsc::UnboundedReceiver<PendingWrite>,
    max_attempts: u32,
    base_delay_ms: u64,
    max_delay_ms: u64,
}

impl RetryWriter {
    pub fn new(store: Arc<dyn ActivityStore>, rx: mpsc::UnboundedReceiver<PendingWrite>) -> Self {
        Self {
            store,
            rx,
            max_attempts: 5,
            base_delay_ms: 200,
            max_delay_ms: 10_000,
        }
    }

    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        loop {
            tokio::select! {
                record = self.rx.recv() => {
                    match record {
                        Some(record) => self.retry(record).await,
                        None => break,
                    }
                }
                _ = shutdown.recv() => {
                    tracing::debug!("Retry writer stopping");
                    break;
                }
            }
        }
    }

    async fn retry(&self, record: PendingWrite) {
        for attempt in 1..=self.max_attempts {
            sleep(backoff(attempt, self.base_delay_ms, self.max_delay_ms)).await;
            match apply(&*self.store, &record) {
                Ok(()) => {
                    tracing::debug!(kind = record.kind(), attempt, "Queued record written");
                    return;
                }
                Err(e) => {
                    tracing::warn!(kind = record.kind(), attempt, error = %e, "Retry write failed");
                }
            }
        }
        tracing::error!(
            kind = record.kind(),
            attempts = self.max_attempts,
            "Dropping record after exhausting retries"
        );
        metrics::record_store_error("record_dropped");
    }
}

/// Exponential backoff with up to 10% jitter.
fn backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    let exponential = 2u64.saturating_pow(attempt.saturating_sub(1));
    let capped = base_ms.saturating_mul(exponential).min(max_ms);
    let jitter_range = capped / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };
    Duration::from_millis(capped + jitter)
}
