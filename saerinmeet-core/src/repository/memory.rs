//! In-memory stores
//!
//! Same contract as the PostgreSQL repositories, including the conditional
//! transition: the status check and the write happen under one lock.
//! Used by tests and local tooling; data is lost on restart.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

use super::{MeetingStore, RecordingStore};
use crate::{
    models::{
        Meeting, MeetingId, Recording, RecordingId, RecordingListQuery, RecordingStatus,
        RecordingTransition, UserId,
    },
    Error, Result,
};

#[derive(Default)]
pub struct MemoryRecordingStore {
    recordings: Mutex<HashMap<RecordingId, Recording>>,
}

impl MemoryRecordingStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.recordings.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.recordings.lock().is_empty()
    }
}

#[async_trait]
impl RecordingStore for MemoryRecordingStore {
    async fn create(&self, recording: &Recording) -> Result<Recording> {
        let mut recordings = self.recordings.lock();
        if recordings.contains_key(&recording.id) {
            return Err(Error::Conflict("Resource already exists".to_string()));
        }
        recordings.insert(recording.id.clone(), recording.clone());
        Ok(recording.clone())
    }

    async fn get(&self, id: &RecordingId) -> Result<Option<Recording>> {
        Ok(self.recordings.lock().get(id).cloned())
    }

    async fn get_by_egress_id(&self, egress_id: &str) -> Result<Option<Recording>> {
        Ok(self
            .recordings
            .lock()
            .values()
            .find(|r| r.egress_id.as_deref() == Some(egress_id))
            .cloned())
    }

    async fn set_egress_id(&self, id: &RecordingId, egress_id: &str) -> Result<bool> {
        let mut recordings = self.recordings.lock();
        match recordings.get_mut(id) {
            Some(recording) if recording.egress_id.is_none() => {
                recording.egress_id = Some(egress_id.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn transition(
        &self,
        id: &RecordingId,
        allowed: &[RecordingStatus],
        transition: &RecordingTransition,
    ) -> Result<Option<Recording>> {
        transition.check_sources(allowed)?;
        let mut recordings = self.recordings.lock();
        match recordings.get_mut(id) {
            Some(recording) if allowed.contains(&recording.status) => {
                recording.apply(transition);
                Ok(Some(recording.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn list_by_creator(
        &self,
        user_id: &UserId,
        query: &RecordingListQuery,
    ) -> Result<(Vec<Recording>, i64)> {
        let mut matching: Vec<Recording> = self
            .recordings
            .lock()
            .values()
            .filter(|r| &r.created_by == user_id)
            .filter(|r| query.status.is_none_or(|s| r.status == s))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.started_at.cmp(&a.started_at));

        let total = i64::try_from(matching.len()).unwrap_or(i64::MAX);
        let offset = usize::try_from(query.offset()).unwrap_or(0);
        let limit = usize::try_from(query.limit).unwrap_or(0);
        let page = matching.into_iter().skip(offset).take(limit).collect();

        Ok((page, total))
    }

    async fn list_by_meeting(&self, meeting_id: &MeetingId) -> Result<Vec<Recording>> {
        let mut matching: Vec<Recording> = self
            .recordings
            .lock()
            .values()
            .filter(|r| &r.meeting_id == meeting_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(matching)
    }

    async fn list_by_status(&self, status: RecordingStatus) -> Result<Vec<Recording>> {
        let mut matching: Vec<Recording> = self
            .recordings
            .lock()
            .values()
            .filter(|r| r.status == status)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        Ok(matching)
    }

    async fn delete(&self, id: &RecordingId) -> Result<bool> {
        Ok(self.recordings.lock().remove(id).is_some())
    }
}

#[derive(Default)]
pub struct MemoryMeetingStore {
    meetings: Mutex<HashMap<MeetingId, Meeting>>,
    participants: Mutex<HashSet<(MeetingId, UserId)>>,
}

impl MemoryMeetingStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, meeting: Meeting) {
        self.meetings.lock().insert(meeting.id.clone(), meeting);
    }

    pub fn add_participant(&self, meeting_id: &MeetingId, user_id: &UserId) {
        self.participants
            .lock()
            .insert((meeting_id.clone(), user_id.clone()));
    }

    pub fn is_recording(&self, meeting_id: &MeetingId) -> bool {
        self.meetings
            .lock()
            .get(meeting_id)
            .is_some_and(|m| m.is_recording)
    }
}

#[async_trait]
impl MeetingStore for MemoryMeetingStore {
    async fn get(&self, id: &MeetingId) -> Result<Option<Meeting>> {
        Ok(self.meetings.lock().get(id).cloned())
    }

    async fn is_participant(&self, id: &MeetingId, user_id: &UserId) -> Result<bool> {
        Ok(self
            .participants
            .lock()
            .contains(&(id.clone(), user_id.clone())))
    }

    async fn try_begin_recording(&self, id: &MeetingId) -> Result<bool> {
        let mut meetings = self.meetings.lock();
        match meetings.get_mut(id) {
            Some(meeting) if !meeting.is_recording => {
                meeting.is_recording = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn end_recording(&self, id: &MeetingId) -> Result<()> {
        if let Some(meeting) = self.meetings.lock().get_mut(id) {
            meeting.is_recording = false;
        }
        Ok(())
    }
}
