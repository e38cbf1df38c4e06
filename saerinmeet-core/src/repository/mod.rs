pub mod meeting;
pub mod memory;
pub mod recording;

use async_trait::async_trait;

use crate::{
    models::{
        Meeting, MeetingId, Recording, RecordingId, RecordingListQuery, RecordingStatus,
        RecordingTransition, UserId,
    },
    Result,
};

pub use meeting::MeetingRepository;
pub use memory::{MemoryMeetingStore, MemoryRecordingStore};
pub use recording::RecordingRepository;

/// Persistent recording records
///
/// Every status change goes through [`RecordingStore::transition`], which
/// only writes when the stored status is still one of `allowed` and reports
/// whether it did. Callers that get `None` lost the race to another writer.
#[async_trait]
pub trait RecordingStore: Send + Sync {
    async fn create(&self, recording: &Recording) -> Result<Recording>;

    async fn get(&self, id: &RecordingId) -> Result<Option<Recording>>;

    async fn get_by_egress_id(&self, egress_id: &str) -> Result<Option<Recording>>;

    /// Record the egress session id. Only the first assignment sticks.
    async fn set_egress_id(&self, id: &RecordingId, egress_id: &str) -> Result<bool>;

    /// Conditional update; `Some(updated)` when applied
    async fn transition(
        &self,
        id: &RecordingId,
        allowed: &[RecordingStatus],
        transition: &RecordingTransition,
    ) -> Result<Option<Recording>>;

    /// Page of a user's recordings, newest first, plus the total count
    async fn list_by_creator(
        &self,
        user_id: &UserId,
        query: &RecordingListQuery,
    ) -> Result<(Vec<Recording>, i64)>;

    async fn list_by_meeting(&self, meeting_id: &MeetingId) -> Result<Vec<Recording>>;

    async fn list_by_status(&self, status: RecordingStatus) -> Result<Vec<Recording>>;

    async fn delete(&self, id: &RecordingId) -> Result<bool>;
}

/// Meeting lookups and the per-meeting recording flag
#[async_trait]
pub trait MeetingStore: Send + Sync {
    async fn get(&self, id: &MeetingId) -> Result<Option<Meeting>>;

    async fn is_participant(&self, id: &MeetingId, user_id: &UserId) -> Result<bool>;

    /// Set the recording flag if it is clear; `false` means someone else holds it
    async fn try_begin_recording(&self, id: &MeetingId) -> Result<bool>;

    async fn end_recording(&self, id: &MeetingId) -> Result<()>;
}
