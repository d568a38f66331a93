use crate::database::error::DatabaseError;
use crate::database::store::PaymentRecordStore;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ExpirySweepConfig {
    /// How often the sweep wakes up.
    pub sweep_interval: Duration,
    /// Pending attempts older than this are transitioned to expired.
    pub attempt_ttl: Duration,
    /// Maximum attempts expired per cycle; the rest are picked up next time.
    pub batch_size: i64,
}

impl Default for ExpirySweepConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(60),
            attempt_ttl: Duration::from_secs(15 * 60),
            batch_size: 200,
        }
    }
}

impl ExpirySweepConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.sweep_interval = Duration::from_secs(
            std::env::var("EXPIRY_SWEEP_INTERVAL_SECONDS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(cfg.sweep_interval.as_secs()),
        );
        cfg.attempt_ttl = Duration::from_secs(
            std::env::var("EXPIRY_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(|minutes| minutes * 60)
                .unwrap_or(cfg.attempt_ttl.as_secs()),
        );
        cfg.batch_size = std::env::var("EXPIRY_SWEEP_BATCH_SIZE")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(cfg.batch_size);
        cfg
    }
}

/// The moment before which a pending attempt counts as expired.
pub fn expiry_cutoff(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    now - ChronoDuration::from_std(ttl).unwrap_or_else(|_| ChronoDuration::seconds(15 * 60))
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

/// Periodic sweep turning stale pending attempts into expired ones.
///
/// Runs off the callback path entirely. Each expiry is a conditional update
/// on `status = 'pending'`, so a success callback that lands mid-sweep wins
/// or loses the row race cleanly and terminal attempts are never touched.
pub struct ExpirySweepWorker {
    store: Arc<dyn PaymentRecordStore>,
    config: ExpirySweepConfig,
}

impl ExpirySweepWorker {
    pub fn new(store: Arc<dyn PaymentRecordStore>, config: ExpirySweepConfig) -> Self {
        Self { store, config }
    }

    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(
            sweep_interval_secs = self.config.sweep_interval.as_secs(),
            attempt_ttl_secs = self.config.attempt_ttl.as_secs(),
            batch_size = self.config.batch_size,
            "payment expiry sweep worker started"
        );

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("payment expiry sweep worker stopping");
                        break;
                    }
                }
                _ = tokio::time::sleep(self.config.sweep_interval) => {
                    match sweep_once(
                        self.store.as_ref(),
                        &self.config,
                        Some(&shutdown_rx),
                    )
                    .await
                    {
                        Ok(expired) if expired > 0 => {
                            info!(expired, "expiry sweep cycle finished");
                        }
                        Ok(_) => {}
                        Err(e) => {
                            warn!(error = %e, "expiry sweep cycle failed");
                        }
                    }
                }
            }
        }

        info!("payment expiry sweep worker stopped");
    }
}

/// One sweep cycle. Interruptible between records: a shutdown signal stops
/// the batch after the in-flight update completes, never mid-record.
pub async fn sweep_once(
    store: &dyn PaymentRecordStore,
    config: &ExpirySweepConfig,
    shutdown_rx: Option<&watch::Receiver<bool>>,
) -> Result<usize, DatabaseError> {
    let cutoff = expiry_cutoff(Utc::now(), config.attempt_ttl);
    let stale = store.find_expired_pending(cutoff, config.batch_size).await?;

    let mut expired = 0;
    for attempt in stale {
        if shutdown_rx.map(|rx| *rx.borrow()).unwrap_or(false) {
            info!(expired, "expiry sweep interrupted by shutdown");
            break;
        }

        // The update is conditional on pending, so an attempt settled by a
        // late callback since the scan is simply skipped.
        if store.expire_attempt(attempt.id).await? {
            info!(
                order_id = attempt.order_id,
                attempt_id = %attempt.id,
                created_at = %attempt.created_at,
                "pending payment attempt expired"
            );
            expired += 1;
        }
    }

    Ok(expired)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
