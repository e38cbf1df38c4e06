use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Row};

use super::MeetingStore;
use crate::{
    models::{Meeting, MeetingId, UserId},
    Result,
};

/// Meeting repository backed by PostgreSQL
///
/// Meetings are owned by the meeting API; this side only reads them and
/// flips the recording flag.
#[derive(Clone)]
pub struct MeetingRepository {
    pool: PgPool,
}

impl MeetingRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_meeting(row: &PgRow) -> Result<Meeting> {
        Ok(Meeting {
            id: MeetingId::from_string(row.try_get("id")?),
            title: row.try_get("title")?,
            room_name: row.try_get("room_name")?,
            host_id: UserId::from_string(row.try_get("host_id")?),
            is_recording: row.try_get("is_recording")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl MeetingStore for MeetingRepository {
    async fn get(&self, id: &MeetingId) -> Result<Option<Meeting>> {
        let row = sqlx::query(
            "SELECT id, title, room_name, host_id, is_recording, created_at, updated_at
             FROM meetings
             WHERE id = $1",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_meeting).transpose()
    }

    async fn is_participant(&self, id: &MeetingId, user_id: &UserId) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(
                 SELECT 1 FROM meeting_participants
                 WHERE meeting_id = $1 AND user_id = $2
             )",
        )
        .bind(id.as_str())
        .bind(user_id.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn try_begin_recording(&self, id: &MeetingId) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE meetings
             SET is_recording = TRUE, updated_at = NOW()
             WHERE id = $1 AND is_recording = FALSE",
        )
        .bind(id.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn end_recording(&self, id: &MeetingId) -> Result<()> {
        sqlx::query(
            "UPDATE meetings
             SET is_recording = FALSE, updated_at = NOW()
             WHERE id = $1",
        )
        .bind(id.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
