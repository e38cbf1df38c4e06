//! Recording lifecycle service
//!
//! Start and stop go through the conferencing service's egress API; the file
//! then appears in object storage some time after the stop. Three writers can
//! finish a recording: the poll loop, a status query and the egress webhook.
//! All of them use conditional transitions, so whichever lands first wins and
//! the others see a settled record.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{
    config::RecordingConfig,
    egress::{EgressControl, EgressOptions},
    metrics::{RECORDINGS_FINISHED, RECORDINGS_STARTED},
    models::{
        Meeting, MeetingId, Recording, RecordingId, RecordingListQuery, RecordingStatus,
        RecordingStatusView, RecordingTransition, UserId,
    },
    repository::{MeetingStore, RecordingStore},
    service::poller::{RecordingPoller, TickOutcome},
    storage::ObjectStorage,
    Error, Result,
};

pub const NO_MEDIA_MESSAGE: &str = "No active video/audio tracks to record. Make sure participants are in the room with cameras/microphones enabled.";
pub const EGRESS_FAILED_MESSAGE: &str = "Egress reported failure";

const STARTED: [RecordingStatus; 2] = RecordingStatus::STARTED;

/// How a stop request identifies its recording
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopTarget {
    Recording(RecordingId),
    Egress(String),
}

#[derive(Debug, Clone)]
pub enum StopOutcome {
    /// Egress stopped, file expected in storage shortly
    Stopped(Recording),
    /// Egress had already ended without capturing anything
    NoMedia(Recording),
}

impl StopOutcome {
    pub const fn recording(&self) -> &Recording {
        match self {
            Self::Stopped(recording) | Self::NoMedia(recording) => recording,
        }
    }

    pub fn into_recording(self) -> Recording {
        match self {
            Self::Stopped(recording) | Self::NoMedia(recording) => recording,
        }
    }
}

/// Final egress state reported by a webhook
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalEgressStatus {
    Complete,
    Failed,
}

impl ExternalEgressStatus {
    /// Map a conferencing-service egress status; non-final states are `None`
    pub fn from_egress_status(status: &str) -> Option<Self> {
        match status {
            "EGRESS_COMPLETE" => Some(Self::Complete),
            "EGRESS_FAILED" | "EGRESS_ABORTED" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Webhook notification about one egress session
#[derive(Debug, Clone)]
pub struct ExternalEvent {
    pub egress_id: String,
    pub status: ExternalEgressStatus,
    /// Seconds
    pub duration: Option<i64>,
    pub error: Option<String>,
}

/// Recording lifecycle service
#[derive(Clone)]
pub struct RecordingService {
    recordings: Arc<dyn RecordingStore>,
    meetings: Arc<dyn MeetingStore>,
    egress: Arc<dyn EgressControl>,
    storage: Arc<dyn ObjectStorage>,
    egress_options: EgressOptions,
    config: RecordingConfig,
    poller: RecordingPoller,
}

impl std::fmt::Debug for RecordingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingService")
            .field("poller", &self.poller)
            .finish_non_exhaustive()
    }
}

impl RecordingService {
    pub fn new(
        recordings: Arc<dyn RecordingStore>,
        meetings: Arc<dyn MeetingStore>,
        egress: Arc<dyn EgressControl>,
        storage: Arc<dyn ObjectStorage>,
        egress_options: EgressOptions,
        config: RecordingConfig,
    ) -> Self {
        let poller = RecordingPoller::new(recordings.clone(), storage.clone(), &config);
        Self {
            recordings,
            meetings,
            egress,
            storage,
            egress_options,
            config,
            poller,
        }
    }

    pub const fn poller(&self) -> &RecordingPoller {
        &self.poller
    }

    /// Start recording a meeting's room.
    ///
    /// Only the host may start, and only while the meeting is not already
    /// recording. The recording flag is claimed before egress is asked to
    /// start; a rejected start marks the recording failed and releases it.
    pub async fn start(
        &self,
        meeting_id: &MeetingId,
        room_name: &str,
        actor: &UserId,
    ) -> Result<Recording> {
        if meeting_id.as_str().is_empty() || room_name.trim().is_empty() {
            return Err(Error::InvalidInput(
                "Meeting ID and room name are required".to_string(),
            ));
        }

        let meeting = self.meeting(meeting_id).await?;
        if !meeting.is_host(actor) {
            return Err(Error::Authorization(
                "Only the meeting host can start recording".to_string(),
            ));
        }

        if !self.meetings.try_begin_recording(meeting_id).await? {
            return Err(Error::Conflict("Meeting is already being recorded".to_string()));
        }

        let recording = Recording::new(
            meeting.id.clone(),
            meeting.title.clone(),
            room_name.to_string(),
            actor.clone(),
        );
        let mut recording = match self.recordings.create(&recording).await {
            Ok(recording) => recording,
            Err(e) => {
                self.release_meeting(meeting_id).await;
                return Err(e);
            }
        };

        match self
            .egress
            .start_room_composite(room_name, &recording.file_path, &self.egress_options)
            .await
        {
            Ok(session) => {
                let assigned = match self
                    .recordings
                    .set_egress_id(&recording.id, &session.egress_id)
                    .await
                {
                    Ok(true) => Ok(()),
                    Ok(false) => Err(Error::Internal(format!(
                        "Recording {} already has an egress session",
                        recording.id
                    ))),
                    Err(e) => Err(e),
                };
                if let Err(e) = assigned {
                    self.abandon_start(&recording, &session.egress_id, &e).await;
                    return Err(e);
                }
                recording.egress_id = Some(session.egress_id);
                RECORDINGS_STARTED.with_label_values(&["accepted"]).inc();
                info!(
                    recording_id = %recording.id,
                    meeting_id = %meeting_id,
                    egress_id = recording.egress_id.as_deref().unwrap_or_default(),
                    "Recording started"
                );
                Ok(recording)
            }
            Err(err) => {
                RECORDINGS_STARTED.with_label_values(&["rejected"]).inc();
                warn!(recording_id = %recording.id, meeting_id = %meeting_id, error = %err, "Egress rejected recording start");

                if let Err(e) = self
                    .recordings
                    .transition(&recording.id, &STARTED, &RecordingTransition::failed(err.to_string()))
                    .await
                {
                    warn!(recording_id = %recording.id, error = %e, "Failed to mark rejected recording");
                } else {
                    RECORDINGS_FINISHED.with_label_values(&["failed", "start"]).inc();
                }
                self.release_meeting(meeting_id).await;
                Err(err.into())
            }
        }
    }

    /// Stop a recording and hand it to the poll loop.
    ///
    /// An egress that already ended on its own means nothing was captured;
    /// the recording fails right away and no poll is scheduled.
    pub async fn stop(&self, target: &StopTarget, actor: &UserId) -> Result<StopOutcome> {
        let recording = match target {
            StopTarget::Recording(id) => self.recordings.get(id).await?,
            StopTarget::Egress(egress_id) => self.recordings.get_by_egress_id(egress_id).await?,
        }
        .ok_or_else(|| Error::NotFound("Recording not found".to_string()))?;

        let meeting = self.meeting(&recording.meeting_id).await?;
        if !meeting.is_host(actor) {
            return Err(Error::Authorization(
                "Only the meeting host can stop recording".to_string(),
            ));
        }

        if recording.status.is_terminal() {
            return Err(Error::Conflict(format!("Recording is already {}", recording.status)));
        }
        if recording.status.is_processing() {
            return Ok(StopOutcome::Stopped(recording));
        }

        if let Some(egress_id) = recording.egress_id.as_deref() {
            match self.egress.stop(egress_id).await {
                Ok(()) => {}
                Err(err) if err.is_terminal_state() => {
                    info!(recording_id = %recording.id, egress_id, error = %err, "Egress already ended, nothing captured");
                    let failed = self
                        .recordings
                        .transition(&recording.id, &STARTED, &RecordingTransition::failed(NO_MEDIA_MESSAGE))
                        .await?;
                    self.release_meeting(&meeting.id).await;

                    return match failed {
                        Some(failed) => {
                            RECORDINGS_FINISHED.with_label_values(&["failed", "stop"]).inc();
                            Ok(StopOutcome::NoMedia(failed))
                        }
                        None => self.current(&recording.id).await.map(StopOutcome::Stopped),
                    };
                }
                Err(err) => {
                    warn!(recording_id = %recording.id, egress_id, error = %err, "Egress stop failed, waiting for the file anyway");
                }
            }
        }

        let processing = self
            .recordings
            .transition(&recording.id, &STARTED, &RecordingTransition::processing())
            .await?;
        self.release_meeting(&meeting.id).await;

        match processing {
            Some(processing) => {
                self.poller.schedule(processing.id.clone());
                info!(recording_id = %processing.id, "Recording stopped, waiting for file");
                Ok(StopOutcome::Stopped(processing))
            }
            // A webhook settled it while the stop call was in flight
            None => self.current(&recording.id).await.map(StopOutcome::Stopped),
        }
    }

    /// Status for the recording's creator.
    ///
    /// A processing recording gets one immediate storage check, so callers
    /// polling this see completion without waiting for the next tick.
    pub async fn status(&self, id: &RecordingId, actor: &UserId) -> Result<RecordingStatusView> {
        let recording = self.current(id).await?;
        if !recording.is_owned_by(actor) {
            return Err(Error::Authorization("Access denied".to_string()));
        }
        if !recording.status.is_processing() {
            return Ok(recording.status_view());
        }

        match self.poller.tick(id, "status").await? {
            TickOutcome::Completed(completed) => {
                self.poller.cancel(id);
                Ok(completed.status_view())
            }
            TickOutcome::Settled => Ok(self.current(id).await?.status_view()),
            TickOutcome::Missing | TickOutcome::Empty | TickOutcome::Unavailable => {
                Ok(recording.status_view())
            }
        }
    }

    /// Apply a webhook-reported egress result.
    ///
    /// Returns the updated recording, or `None` when the egress id is unknown
    /// or the recording had already settled.
    pub async fn on_external_event(&self, event: &ExternalEvent) -> Result<Option<Recording>> {
        let Some(recording) = self.recordings.get_by_egress_id(&event.egress_id).await? else {
            debug!(egress_id = %event.egress_id, "Webhook for unknown egress");
            return Ok(None);
        };
        if recording.status.is_terminal() {
            debug!(recording_id = %recording.id, "Webhook for settled recording ignored");
            return Ok(None);
        }

        let transition = match event.status {
            ExternalEgressStatus::Complete => {
                let file_size = match self.storage.stat(&recording.file_path).await {
                    Ok(stat) if stat.size > 0 => i64::try_from(stat.size).ok(),
                    Ok(_) => None,
                    Err(e) => {
                        debug!(recording_id = %recording.id, error = %e, "File size unavailable for webhook completion");
                        None
                    }
                };
                RecordingTransition::completed(
                    file_size,
                    self.poller.download_reference(&recording.id),
                    event.duration,
                )
            }
            ExternalEgressStatus::Failed => RecordingTransition::failed(
                event
                    .error
                    .clone()
                    .filter(|e| !e.is_empty())
                    .unwrap_or_else(|| EGRESS_FAILED_MESSAGE.to_string()),
            ),
        };

        let applied = self
            .recordings
            .transition(&recording.id, &RecordingStatus::ACTIVE, &transition)
            .await?;

        if let Some(updated) = &applied {
            RECORDINGS_FINISHED
                .with_label_values(&[updated.status.as_str(), "webhook"])
                .inc();
            info!(recording_id = %updated.id, status = %updated.status, "Recording settled by webhook");

            if STARTED.contains(&recording.status) {
                self.release_meeting(&recording.meeting_id).await;
            }
            self.poller.cancel(&recording.id);
        }

        Ok(applied)
    }

    /// Delete a recording and its file. Only the creator may delete.
    pub async fn delete(&self, id: &RecordingId, actor: &UserId) -> Result<()> {
        let recording = self.current(id).await?;
        if !recording.is_owned_by(actor) {
            return Err(Error::Authorization(
                "Only the creator can delete this recording".to_string(),
            ));
        }
        if STARTED.contains(&recording.status) {
            return Err(Error::Conflict(
                "Stop the recording before deleting it".to_string(),
            ));
        }

        self.poller.cancel(id);
        if let Err(e) = self.storage.delete(&recording.file_path).await {
            warn!(recording_id = %id, error = %e, "Failed to delete recording file");
        }

        if !self.recordings.delete(id).await? {
            return Err(Error::NotFound("Recording not found".to_string()));
        }
        info!(recording_id = %id, "Recording deleted");
        Ok(())
    }

    /// A single recording, visible to its creator and the meeting's members
    pub async fn get(&self, id: &RecordingId, actor: &UserId) -> Result<Recording> {
        let recording = self.current(id).await?;
        self.ensure_can_view(&recording, actor).await?;
        Ok(recording)
    }

    pub async fn list_for_user(
        &self,
        actor: &UserId,
        query: RecordingListQuery,
    ) -> Result<(Vec<Recording>, i64)> {
        self.recordings
            .list_by_creator(actor, &query.normalized())
            .await
    }

    pub async fn list_for_meeting(
        &self,
        meeting_id: &MeetingId,
        actor: &UserId,
    ) -> Result<Vec<Recording>> {
        let meeting = self.meeting(meeting_id).await?;
        if !meeting.is_host(actor) && !self.meetings.is_participant(meeting_id, actor).await? {
            return Err(Error::Authorization("Access denied".to_string()));
        }
        self.recordings.list_by_meeting(meeting_id).await
    }

    /// Presigned download URL
    pub async fn download_url(&self, id: &RecordingId, actor: &UserId) -> Result<String> {
        self.presigned(id, actor, self.config.download_url_ttl()).await
    }

    /// Presigned URL for in-browser playback, valid longer than a download
    pub async fn watch_url(&self, id: &RecordingId, actor: &UserId) -> Result<String> {
        self.presigned(id, actor, self.config.watch_url_ttl()).await
    }

    /// Schedule polls for recordings left processing by a previous process
    pub async fn resume_pending_polls(&self) -> Result<usize> {
        let pending = self
            .recordings
            .list_by_status(RecordingStatus::Processing)
            .await?;
        for recording in &pending {
            self.poller.schedule(recording.id.clone());
        }
        if !pending.is_empty() {
            info!(count = pending.len(), "Resumed completion polls");
        }
        Ok(pending.len())
    }

    async fn presigned(
        &self,
        id: &RecordingId,
        actor: &UserId,
        ttl: std::time::Duration,
    ) -> Result<String> {
        let recording = self.get(id, actor).await?;
        if !self.storage.exists(&recording.file_path).await? {
            return Err(Error::NotFound("Recording file not found".to_string()));
        }
        Ok(self.storage.presigned_url(&recording.file_path, ttl).await?)
    }

    async fn ensure_can_view(&self, recording: &Recording, actor: &UserId) -> Result<()> {
        if recording.is_owned_by(actor) {
            return Ok(());
        }
        let allowed = match self.meetings.get(&recording.meeting_id).await? {
            Some(meeting) if meeting.is_host(actor) => true,
            Some(_) => self.meetings.is_participant(&recording.meeting_id, actor).await?,
            None => false,
        };
        if allowed {
            Ok(())
        } else {
            Err(Error::Authorization("Access denied".to_string()))
        }
    }

    async fn meeting(&self, id: &MeetingId) -> Result<Meeting> {
        self.meetings
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound("Meeting not found".to_string()))
    }

    async fn current(&self, id: &RecordingId) -> Result<Recording> {
        self.recordings
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound("Recording not found".to_string()))
    }

    /// Undo a start whose egress was accepted but could not be recorded:
    /// stop the session, fail the record and free the meeting.
    async fn abandon_start(&self, recording: &Recording, egress_id: &str, cause: &Error) {
        warn!(recording_id = %recording.id, egress_id, error = %cause, "Failed to record egress session, abandoning start");
        RECORDINGS_STARTED.with_label_values(&["abandoned"]).inc();

        if let Err(e) = self.egress.stop(egress_id).await {
            warn!(recording_id = %recording.id, egress_id, error = %e, "Failed to stop abandoned egress");
        }
        match self
            .recordings
            .transition(&recording.id, &STARTED, &RecordingTransition::failed(cause.to_string()))
            .await
        {
            Ok(Some(_)) => RECORDINGS_FINISHED.with_label_values(&["failed", "start"]).inc(),
            Ok(None) => {}
            Err(e) => warn!(recording_id = %recording.id, error = %e, "Failed to mark abandoned recording"),
        }
        self.release_meeting(&recording.meeting_id).await;
    }

    async fn release_meeting(&self, meeting_id: &MeetingId) {
        if let Err(e) = self.meetings.end_recording(meeting_id).await {
            warn!(meeting_id = %meeting_id, error = %e, "Failed to clear meeting recording flag");
        }
    }
}

#[cfg(test)]
#[path = "recording_tests.rs"]
mod tests;
