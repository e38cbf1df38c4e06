//! Test helpers and fixtures for saerinmeet-core tests
//!
//! Scripted stand-ins for the conferencing service and object storage, so
//! lifecycle tests can decide what each call returns.

use async_trait::async_trait;
use opendal::ErrorKind;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use crate::egress::{EgressControl, EgressError, EgressOptions, EgressSession};
use crate::models::{Meeting, UserId};
use crate::storage::{ObjectStat, ObjectStorage};

/// Create a test user ID
pub fn test_user_id(id: &str) -> UserId {
    UserId::from_string(id.to_string())
}

/// Test fixture builder for Meeting
pub struct MeetingFixture {
    title: String,
    room_name: String,
    host_id: UserId,
}

impl MeetingFixture {
    pub fn new() -> Self {
        Self {
            title: "Weekly sync".to_string(),
            room_name: format!("room-{}", nanoid::nanoid!(8)),
            host_id: UserId::new(),
        }
    }

    pub fn with_room_name(mut self, room_name: &str) -> Self {
        self.room_name = room_name.to_string();
        self
    }

    pub fn with_host(mut self, host_id: UserId) -> Self {
        self.host_id = host_id;
        self
    }

    pub fn build(self) -> Meeting {
        Meeting::new(self.title, self.room_name, self.host_id)
    }
}

impl Default for MeetingFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Object storage whose `stat` answers follow a per-key script.
///
/// `None` in a script is a missing object. Each stat consumes one entry; the
/// last entry repeats forever. Unscripted keys are missing.
#[derive(Default)]
pub struct ScriptedStorage {
    scripts: Mutex<HashMap<String, VecDeque<Option<u64>>>>,
    stat_calls: AtomicUsize,
    fail_stats: AtomicBool,
    fail_deletes: AtomicBool,
    deleted: Mutex<Vec<String>>,
}

impl ScriptedStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, key: &str, sizes: impl IntoIterator<Item = Option<u64>>) {
        self.scripts
            .lock()
            .insert(key.to_string(), sizes.into_iter().collect());
    }

    pub fn fail_stats(&self, fail: bool) {
        self.fail_stats.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn stat_calls(&self) -> usize {
        self.stat_calls.load(Ordering::SeqCst)
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().clone()
    }

    fn not_found(key: &str) -> opendal::Error {
        opendal::Error::new(ErrorKind::NotFound, format!("{key} not found"))
    }
}

#[async_trait]
impl ObjectStorage for ScriptedStorage {
    async fn exists(&self, key: &str) -> opendal::Result<bool> {
        Ok(self
            .scripts
            .lock()
            .get(key)
            .and_then(|script| script.front().copied().flatten())
            .is_some())
    }

    async fn stat(&self, key: &str) -> opendal::Result<ObjectStat> {
        self.stat_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_stats.load(Ordering::SeqCst) {
            return Err(opendal::Error::new(ErrorKind::Unexpected, "storage unavailable"));
        }

        let mut scripts = self.scripts.lock();
        let size = match scripts.get_mut(key) {
            Some(script) if script.len() > 1 => script.pop_front().flatten(),
            Some(script) => script.front().copied().flatten(),
            None => None,
        };
        size.map(|size| ObjectStat { size }).ok_or_else(|| Self::not_found(key))
    }

    async fn presigned_url(&self, key: &str, expires_in: Duration) -> opendal::Result<String> {
        Ok(format!(
            "https://storage.test/recordings/{key}?expires={}",
            expires_in.as_secs()
        ))
    }

    async fn delete(&self, key: &str) -> opendal::Result<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(opendal::Error::new(ErrorKind::PermissionDenied, "delete denied"));
        }
        self.scripts.lock().remove(key);
        self.deleted.lock().push(key.to_string());
        Ok(())
    }
}

/// Conferencing service stand-in with fixed answers
pub struct FakeEgress {
    start: std::result::Result<String, EgressError>,
    stop: std::result::Result<(), EgressError>,
    started: Mutex<Vec<(String, String)>>,
    stopped: Mutex<Vec<String>>,
}

impl FakeEgress {
    /// Accepts every start with `egress_id` and every stop
    pub fn accepting(egress_id: &str) -> Self {
        Self {
            start: Ok(egress_id.to_string()),
            stop: Ok(()),
            started: Mutex::new(Vec::new()),
            stopped: Mutex::new(Vec::new()),
        }
    }

    pub fn rejecting(error: EgressError) -> Self {
        Self {
            start: Err(error),
            ..Self::accepting("")
        }
    }

    #[must_use]
    pub fn with_stop_error(mut self, error: EgressError) -> Self {
        self.stop = Err(error);
        self
    }

    /// `(room_name, filepath)` of every start call
    pub fn started(&self) -> Vec<(String, String)> {
        self.started.lock().clone()
    }

    pub fn stopped(&self) -> Vec<String> {
        self.stopped.lock().clone()
    }
}

#[async_trait]
impl EgressControl for FakeEgress {
    async fn start_room_composite(
        &self,
        room_name: &str,
        filepath: &str,
        _options: &EgressOptions,
    ) -> std::result::Result<EgressSession, EgressError> {
        self.started
            .lock()
            .push((room_name.to_string(), filepath.to_string()));
        self.start.clone().map(|egress_id| EgressSession { egress_id })
    }

    async fn stop(&self, egress_id: &str) -> std::result::Result<(), EgressError> {
        self.stopped.lock().push(egress_id.to_string());
        self.stop.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meeting_fixture() {
        let host = test_user_id("host1");
        let meeting = MeetingFixture::new()
            .with_room_name("standup")
            .with_host(host.clone())
            .build();

        assert_eq!(meeting.room_name, "standup");
        assert!(meeting.is_host(&host));
        assert!(!meeting.is_recording);
    }

    #[tokio::test]
    async fn test_scripted_storage_repeats_last_answer() {
        let storage = ScriptedStorage::new();
        storage.script("a.mp4", [None, Some(0), Some(10)]);

        assert!(storage.stat("a.mp4").await.is_err());
        assert_eq!(storage.stat("a.mp4").await.unwrap().size, 0);
        assert_eq!(storage.stat("a.mp4").await.unwrap().size, 10);
        assert_eq!(storage.stat("a.mp4").await.unwrap().size, 10);
        assert_eq!(storage.stat_calls(), 4);
        assert!(storage.exists("a.mp4").await.unwrap());
        assert!(!storage.exists("b.mp4").await.unwrap());
    }
}
