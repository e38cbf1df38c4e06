use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{MeetingId, UserId};

/// The slice of a meeting the recording lifecycle reads and flags
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meeting {
    pub id: MeetingId,
    pub title: String,
    pub room_name: String,
    pub host_id: UserId,
    pub is_recording: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Meeting {
    pub fn new(title: String, room_name: String, host_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            id: MeetingId::new(),
            title,
            room_name,
            host_id,
            is_recording: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_host(&self, user_id: &UserId) -> bool {
        &self.host_id == user_id
    }
}
