//! Background expiry reaper.
//!
//! Deletes records past their inactivity window, independent of the request
//! path. Each run queries the expiry index for the partitions that could
//! plausibly have passed (today and yesterday), re-verifies every candidate
//! against a fresh read of its primary chunk, and deletes best-effort:
//! failures are logged and corrected on a later run, never propagated.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use seshat_types::now_epoch_ms;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::record::partition_for_ms;
use crate::store::SessionRecordStore;

/// Whether a session is past its inactivity window.
///
/// A window of zero or below means the session never expires. Otherwise the
/// session is expired iff its last activity is strictly older than
/// `now - window`.
pub fn is_expired(last_activity_ms: i64, max_inactive_secs: i64, now_ms: i64) -> bool {
    if max_inactive_secs <= 0 {
        return false;
    }
    last_activity_ms < now_ms - max_inactive_secs * 1000
}

/// Scheduling configuration for the reaper.
#[derive(Debug, Clone)]
pub struct ReaperConfig {
    /// Fixed interval between runs.
    pub interval: Duration,

    /// Upper bound on the random delay before the first run. The jitter
    /// keeps multiple instances sharing one table from scanning in lockstep.
    pub max_start_jitter: Duration,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(12 * 60 * 60),
            max_start_jitter: Duration::from_secs(5 * 60 * 60),
        }
    }
}

impl ReaperConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the interval between runs.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the upper bound on start jitter.
    pub fn with_max_start_jitter(mut self, jitter: Duration) -> Self {
        self.max_start_jitter = jitter;
        self
    }
}

/// Counters from one reaper run.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ReapSummary {
    /// Candidates the expiry index surfaced.
    pub candidates: usize,

    /// Records deleted.
    pub deleted: usize,

    /// Candidates skipped after re-verification (already gone, refreshed,
    /// or no longer expirable).
    pub skipped: usize,

    /// Trailing chunks removed alongside deleted records.
    pub orphans_removed: usize,

    /// Candidates whose re-read or delete failed; retried next run.
    pub failures: usize,
}

/// Scans the expiry index and deletes expired session records.
pub struct ExpiryReaper {
    store: Arc<SessionRecordStore>,
}

impl ExpiryReaper {
    /// Create a reaper over the given store.
    pub fn new(store: Arc<SessionRecordStore>) -> Self {
        Self { store }
    }

    /// Run one full reap pass.
    ///
    /// Never returns an error: a failed partition scan aborts only that
    /// partition and the schedule continues unaffected.
    pub async fn run_once(&self) -> ReapSummary {
        let now_ms = now_epoch_ms();
        let mut summary = ReapSummary::default();

        let today = partition_for_ms(now_ms);
        let yesterday = partition_for_ms(now_ms - 24 * 60 * 60 * 1000);

        for partition in [today, yesterday] {
            if let Err(e) = self.reap_partition(&partition, now_ms, &mut summary).await {
                warn!(
                    partition = %partition,
                    error = %e,
                    "Expiry scan failed, continuing with next run"
                );
            }
        }

        info!(
            candidates = summary.candidates,
            deleted = summary.deleted,
            skipped = summary.skipped,
            orphans_removed = summary.orphans_removed,
            failures = summary.failures,
            "Expiry reap completed"
        );
        summary
    }

    async fn reap_partition(
        &self,
        partition: &str,
        now_ms: i64,
        summary: &mut ReapSummary,
    ) -> crate::error::Result<()> {
        let candidates = self.store.expired_candidates(partition).await?;
        summary.candidates += candidates.len();

        for candidate in candidates {
            // The index entry may predate a concurrent save; only a fresh
            // read of the primary chunk decides.
            let head = match self.store.head(&candidate.id).await {
                Ok(head) => head,
                Err(e) => {
                    warn!(session_id = %candidate.id, error = %e, "Could not re-read candidate");
                    summary.failures += 1;
                    continue;
                }
            };

            let expired = match head {
                None => {
                    // Already deleted by someone else.
                    summary.skipped += 1;
                    continue;
                }
                Some(head) => match (head.last_updated_at, head.expiry_timestamp) {
                    (Some(last_updated), Some(expiry)) => {
                        let window_secs = (expiry - last_updated) / 1000;
                        is_expired(last_updated, window_secs, now_ms)
                    }
                    // No expiry metadata: the record became immortal.
                    _ => false,
                },
            };

            if !expired {
                summary.skipped += 1;
                continue;
            }

            match self.store.delete_all_chunks(&candidate.id).await {
                Ok(chunks) => {
                    debug!(session_id = %candidate.id, chunks, "Reaped expired session");
                    summary.deleted += 1;
                    summary.orphans_removed += chunks.saturating_sub(1);
                }
                Err(e) => {
                    warn!(
                        session_id = %candidate.id,
                        error = %e,
                        "Failed to delete expired session, will retry next run"
                    );
                    summary.failures += 1;
                }
            }
        }

        Ok(())
    }
}

/// Handle to the scheduled reaper task.
///
/// Dropping the handle does not stop the task; call [`shutdown`] or
/// [`stop`]. Shutdown is cooperative: no new run starts, and a scan already
/// in flight drains rather than being interrupted.
///
/// [`shutdown`]: ReaperHandle::shutdown
/// [`stop`]: ReaperHandle::stop
pub struct ReaperHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ReaperHandle {
    /// Spawn the reaper on the current tokio runtime.
    ///
    /// The first run happens after a random jitter bounded by
    /// `config.max_start_jitter`, then repeats every `config.interval`.
    pub fn spawn(reaper: ExpiryReaper, config: ReaperConfig) -> Self {
        let (shutdown, mut rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let jitter = initial_jitter(&config);
            info!(
                jitter_ms = jitter.as_millis() as u64,
                interval_secs = config.interval.as_secs(),
                "Expiry reaper scheduled"
            );

            tokio::select! {
                _ = tokio::time::sleep(jitter) => {}
                _ = rx.changed() => {
                    debug!("Expiry reaper shut down before first run");
                    return;
                }
            }

            loop {
                reaper.run_once().await;

                tokio::select! {
                    _ = tokio::time::sleep(config.interval) => {}
                    _ = rx.changed() => {
                        debug!("Expiry reaper shutting down");
                        return;
                    }
                }
            }
        });

        Self { shutdown, task }
    }

    /// Stop scheduling new runs. Returns immediately; an in-flight scan
    /// finishes on its own.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Shut down and wait for the task to finish.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }

    /// Whether the background task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

fn initial_jitter(config: &ReaperConfig) -> Duration {
    let max_ms = config.max_start_jitter.as_millis().max(1) as u64;
    Duration::from_millis(rand::rng().random_range(1..=max_ms))
}
