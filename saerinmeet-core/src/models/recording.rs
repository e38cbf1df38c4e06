use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

use super::id::{MeetingId, RecordingId, UserId};
use crate::Error;

/// Recording lifecycle status
///
/// `pending|recording -> processing -> completed|failed`, plus direct
/// `pending|recording -> completed|failed` for failed starts, aborted egress
/// and webhook reconciliation. Terminal states never change again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum RecordingStatus {
    #[default]
    Pending,
    Recording,
    Processing,
    Completed,
    Failed,
}

impl RecordingStatus {
    /// States a recording can still leave
    pub const ACTIVE: [Self; 3] = [Self::Pending, Self::Recording, Self::Processing];

    /// States an egress session is, or may still be, writing from
    pub const STARTED: [Self; 2] = [Self::Pending, Self::Recording];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Recording => "recording",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub const fn is_processing(&self) -> bool {
        matches!(self, Self::Processing)
    }

    /// Whether the state machine allows moving from `self` to `next`
    pub const fn can_transition_to(&self, next: Self) -> bool {
        match (self, next) {
            (Self::Pending, Self::Recording) => true,
            (Self::Pending | Self::Recording, Self::Processing) => true,
            (Self::Pending | Self::Recording | Self::Processing, Self::Completed | Self::Failed) => true,
            _ => false,
        }
    }

    pub(crate) const fn to_i16(self) -> i16 {
        match self {
            Self::Pending => 0,
            Self::Recording => 1,
            Self::Processing => 2,
            Self::Completed => 3,
            Self::Failed => 4,
        }
    }

    pub(crate) fn from_i16(value: i16) -> crate::Result<Self> {
        match value {
            0 => Ok(Self::Pending),
            1 => Ok(Self::Recording),
            2 => Ok(Self::Processing),
            3 => Ok(Self::Completed),
            4 => Ok(Self::Failed),
            other => Err(Error::Internal(format!("Unknown recording status: {other}"))),
        }
    }
}

impl Display for RecordingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordingStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "recording" => Ok(Self::Recording),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(Error::InvalidInput(format!("Unknown recording status: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recording {
    pub id: RecordingId,
    pub meeting_id: MeetingId,
    pub title: String,
    pub room_name: String,
    pub egress_id: Option<String>,
    /// Object key in storage. Never leaves the service layer.
    #[serde(skip_serializing)]
    pub file_path: String,
    #[serde(rename = "fileUrl")]
    pub download_url: Option<String>,
    pub file_size: i64,
    pub duration: i64,
    pub status: RecordingStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_by: UserId,
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Recording {
    /// New recording in `recording` state with its storage key fixed
    pub fn new(meeting_id: MeetingId, title: String, room_name: String, created_by: UserId) -> Self {
        let now = Utc::now();
        let file_path = Self::storage_key(&room_name, now);
        Self {
            id: RecordingId::new(),
            meeting_id,
            title,
            room_name,
            egress_id: None,
            file_path,
            download_url: None,
            file_size: 0,
            duration: 0,
            status: RecordingStatus::Recording,
            started_at: now,
            completed_at: None,
            created_by,
            error: None,
            updated_at: now,
        }
    }

    /// `{room}-{unix millis}.mp4`
    #[must_use]
    pub fn storage_key(room_name: &str, started_at: DateTime<Utc>) -> String {
        format!("{}-{}.mp4", room_name, started_at.timestamp_millis())
    }

    pub fn is_owned_by(&self, user_id: &UserId) -> bool {
        &self.created_by == user_id
    }

    /// Apply a transition in memory, mirroring the conditional update of the store
    pub(crate) fn apply(&mut self, transition: &RecordingTransition) {
        self.status = transition.status;
        if let Some(size) = transition.file_size {
            self.file_size = size;
        }
        if let Some(duration) = transition.duration {
            self.duration = duration;
        }
        if transition.download_url.is_some() {
            self.download_url.clone_from(&transition.download_url);
        }
        if transition.error.is_some() {
            self.error.clone_from(&transition.error);
        }
        if transition.completed_at.is_some() {
            self.completed_at = transition.completed_at;
        }
        self.updated_at = Utc::now();
    }

    pub fn status_view(&self) -> RecordingStatusView {
        RecordingStatusView {
            status: self.status,
            file_size: self.file_size,
            download_url: self.download_url.clone(),
            completed_at: self.completed_at,
        }
    }
}

/// A state change applied only if the stored status is still one of the allowed ones
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingTransition {
    pub status: RecordingStatus,
    pub file_size: Option<i64>,
    pub duration: Option<i64>,
    pub download_url: Option<String>,
    pub error: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl RecordingTransition {
    /// Stop accepted; completion timestamp stays unset until the file shows up
    pub const fn processing() -> Self {
        Self {
            status: RecordingStatus::Processing,
            file_size: None,
            duration: None,
            download_url: None,
            error: None,
            completed_at: None,
        }
    }

    pub fn completed(file_size: Option<i64>, download_url: String, duration: Option<i64>) -> Self {
        Self {
            status: RecordingStatus::Completed,
            file_size,
            duration,
            download_url: Some(download_url),
            error: None,
            completed_at: Some(Utc::now()),
        }
    }

    /// Reject a transition that some `allowed` source state could not legally take.
    ///
    /// Stores call this before writing, so a caller passing the wrong guard
    /// list fails loudly instead of moving a recording backwards.
    pub fn check_sources(&self, allowed: &[RecordingStatus]) -> crate::Result<()> {
        match allowed.iter().find(|from| !from.can_transition_to(self.status)) {
            Some(from) => Err(Error::Internal(format!(
                "Illegal recording transition {from} -> {}",
                self.status
            ))),
            None => Ok(()),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: RecordingStatus::Failed,
            file_size: None,
            duration: None,
            download_url: None,
            error: Some(error.into()),
            completed_at: Some(Utc::now()),
        }
    }
}

/// What the status endpoint reports
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingStatusView {
    pub status: RecordingStatus,
    pub file_size: i64,
    #[serde(rename = "fileUrl")]
    pub download_url: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingListQuery {
    pub page: i64,
    pub limit: i64,
    pub status: Option<RecordingStatus>,
}

impl Default for RecordingListQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 10,
            status: None,
        }
    }
}

impl RecordingListQuery {
    /// Clamp paging to sane bounds
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.limit = self.limit.clamp(1, MAX_PAGE_SIZE);
        self.page = self.page.clamp(1, i64::MAX / MAX_PAGE_SIZE);
        self
    }

    /// Row offset; saturates for pages that were never normalized
    pub const fn offset(&self) -> i64 {
        self.page.saturating_sub(1).saturating_mul(self.limit)
    }
}
