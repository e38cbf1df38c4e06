//! Completion polling for stopped recordings
//!
//! After a stop, the egress worker still has to finalize and upload the file.
//! Each processing recording gets one task that checks object storage at a
//! fixed interval until the file shows up non-empty or attempts run out.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::AbortHandle;
use tracing::{debug, error, info, warn};

use crate::{
    config::RecordingConfig,
    metrics::{ACTIVE_POLLS, POLL_TICKS, RECORDINGS_FINISHED},
    models::{Recording, RecordingId, RecordingStatus, RecordingTransition},
    repository::RecordingStore,
    storage::ObjectStorage,
    Result,
};

pub const FILE_NOT_FOUND_MESSAGE: &str = "Recording file not found in storage after processing";

/// Result of one object-storage check
#[derive(Debug, Clone)]
pub enum TickOutcome {
    /// Recording is gone or no longer processing; nothing left to do
    Settled,
    Missing,
    /// Object exists with zero bytes, upload not finished
    Empty,
    Completed(Recording),
    /// Storage check failed, retried on the next tick
    Unavailable,
}

impl TickOutcome {
    const fn label(&self) -> &'static str {
        match self {
            Self::Settled => "settled",
            Self::Missing => "missing",
            Self::Empty => "empty",
            Self::Completed(_) => "completed",
            Self::Unavailable => "unavailable",
        }
    }

    const fn is_final(&self) -> bool {
        matches!(self, Self::Settled | Self::Completed(_))
    }
}

struct PollTask {
    generation: u64,
    handle: AbortHandle,
}

/// One cancellable poll task per recording
#[derive(Clone)]
pub struct RecordingPoller {
    recordings: Arc<dyn RecordingStore>,
    storage: Arc<dyn ObjectStorage>,
    interval: Duration,
    max_attempts: u32,
    download_path_prefix: String,
    tasks: Arc<DashMap<RecordingId, PollTask>>,
    generation: Arc<AtomicU64>,
}

impl std::fmt::Debug for RecordingPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingPoller")
            .field("interval", &self.interval)
            .field("max_attempts", &self.max_attempts)
            .field("scheduled", &self.tasks.len())
            .finish_non_exhaustive()
    }
}

impl RecordingPoller {
    pub fn new(
        recordings: Arc<dyn RecordingStore>,
        storage: Arc<dyn ObjectStorage>,
        config: &RecordingConfig,
    ) -> Self {
        Self {
            recordings,
            storage,
            interval: config.poll_interval(),
            max_attempts: config.max_poll_attempts,
            download_path_prefix: config.download_path_prefix.clone(),
            tasks: Arc::new(DashMap::new()),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Internal download reference handed out instead of the storage key
    pub fn download_reference(&self, id: &RecordingId) -> String {
        format!("{}{}", self.download_path_prefix, id)
    }

    /// Start polling for `id`, replacing any task already scheduled for it
    pub fn schedule(&self, id: RecordingId) {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let poller = self.clone();
        let task_id = id.clone();
        let handle = tokio::spawn(async move {
            poller.run(&task_id).await;
            poller.forget(&task_id, generation);
        })
        .abort_handle();

        if let Some(previous) = self.tasks.insert(id.clone(), PollTask { generation, handle: handle.clone() }) {
            previous.handle.abort();
        }
        if handle.is_finished() {
            self.forget(&id, generation);
        }
        self.update_gauge();

        debug!(recording_id = %id, "Scheduled completion poll");
    }

    /// Abort the poll task for `id`; `false` when none was scheduled
    pub fn cancel(&self, id: &RecordingId) -> bool {
        let cancelled = self.tasks.remove(id).map(|(_, task)| task.handle.abort()).is_some();
        if cancelled {
            self.update_gauge();
            debug!(recording_id = %id, "Cancelled completion poll");
        }
        cancelled
    }

    pub fn is_scheduled(&self, id: &RecordingId) -> bool {
        self.tasks.contains_key(id)
    }

    pub fn scheduled_count(&self) -> usize {
        self.tasks.len()
    }

    /// Check storage once and complete the recording if its file is ready.
    ///
    /// Only a recording still `processing` is touched, and the completion is
    /// conditional on that status, so a concurrent webhook or status query
    /// that got there first turns this into [`TickOutcome::Settled`].
    pub async fn tick(&self, id: &RecordingId, source: &'static str) -> Result<TickOutcome> {
        let outcome = self.check(id, source).await?;
        POLL_TICKS.with_label_values(&[outcome.label()]).inc();
        Ok(outcome)
    }

    async fn check(&self, id: &RecordingId, source: &'static str) -> Result<TickOutcome> {
        let Some(recording) = self.recordings.get(id).await? else {
            return Ok(TickOutcome::Settled);
        };
        if !recording.status.is_processing() {
            return Ok(TickOutcome::Settled);
        }

        let size = match self.storage.stat(&recording.file_path).await {
            Ok(stat) => stat.size,
            Err(e) if e.kind() == opendal::ErrorKind::NotFound => return Ok(TickOutcome::Missing),
            Err(e) => {
                warn!(recording_id = %id, error = %e, "Failed to check recording file");
                return Ok(TickOutcome::Unavailable);
            }
        };
        if size == 0 {
            return Ok(TickOutcome::Empty);
        }

        let transition = RecordingTransition::completed(
            Some(i64::try_from(size).unwrap_or(i64::MAX)),
            self.download_reference(id),
            None,
        );
        match self
            .recordings
            .transition(id, &[RecordingStatus::Processing], &transition)
            .await?
        {
            Some(completed) => {
                RECORDINGS_FINISHED.with_label_values(&["completed", source]).inc();
                info!(recording_id = %id, file_size = size, source, "Recording completed");
                Ok(TickOutcome::Completed(completed))
            }
            None => Ok(TickOutcome::Settled),
        }
    }

    async fn run(&self, id: &RecordingId) {
        for attempt in 1..=self.max_attempts {
            tokio::time::sleep(self.interval).await;

            match self.tick(id, "poll").await {
                Ok(outcome) if outcome.is_final() => return,
                Ok(outcome) => {
                    debug!(recording_id = %id, attempt, outcome = outcome.label(), "Recording file not ready");
                }
                Err(e) => {
                    warn!(recording_id = %id, attempt, error = %e, "Poll tick failed");
                }
            }
        }

        match self
            .recordings
            .transition(
                id,
                &[RecordingStatus::Processing],
                &RecordingTransition::failed(FILE_NOT_FOUND_MESSAGE),
            )
            .await
        {
            Ok(Some(_)) => {
                RECORDINGS_FINISHED.with_label_values(&["failed", "poll"]).inc();
                warn!(recording_id = %id, attempts = self.max_attempts, "Recording file never appeared");
            }
            Ok(None) => {}
            Err(e) => {
                error!(recording_id = %id, error = %e, "Failed to mark recording as failed");
            }
        }
    }

    fn forget(&self, id: &RecordingId, generation: u64) {
        if self.tasks.remove_if(id, |_, task| task.generation == generation).is_some() {
            self.update_gauge();
        }
    }

    fn update_gauge(&self) {
        ACTIVE_POLLS.set(i64::try_from(self.tasks.len()).unwrap_or(i64::MAX));
    }
}
