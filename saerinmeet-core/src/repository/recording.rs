use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Row};

use super::RecordingStore;
use crate::{
    models::{
        MeetingId, Recording, RecordingId, RecordingListQuery, RecordingStatus,
        RecordingTransition, UserId,
    },
    Result,
};

const RECORDING_COLUMNS: &str = "id, meeting_id, title, room_name, egress_id, file_path, download_url, \
     file_size, duration, status, started_at, completed_at, created_by, error, updated_at";

/// Recording repository backed by PostgreSQL
#[derive(Clone)]
pub struct RecordingRepository {
    pool: PgPool,
}

impl RecordingRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_recording(row: &PgRow) -> Result<Recording> {
        let status: i16 = row.try_get("status")?;

        Ok(Recording {
            id: RecordingId::from_string(row.try_get("id")?),
            meeting_id: MeetingId::from_string(row.try_get("meeting_id")?),
            title: row.try_get("title")?,
            room_name: row.try_get("room_name")?,
            egress_id: row.try_get("egress_id")?,
            file_path: row.try_get("file_path")?,
            download_url: row.try_get("download_url")?,
            file_size: row.try_get("file_size")?,
            duration: row.try_get("duration")?,
            status: RecordingStatus::from_i16(status)?,
            started_at: row.try_get("started_at")?,
            completed_at: row.try_get("completed_at")?,
            created_by: UserId::from_string(row.try_get("created_by")?),
            error: row.try_get("error")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn rows_to_recordings(rows: &[PgRow]) -> Result<Vec<Recording>> {
        rows.iter().map(Self::row_to_recording).collect()
    }
}

#[async_trait]
impl RecordingStore for RecordingRepository {
    async fn create(&self, recording: &Recording) -> Result<Recording> {
        let sql = format!(
            "INSERT INTO recordings (id, meeting_id, title, room_name, egress_id, file_path, download_url,
                                     file_size, duration, status, started_at, completed_at, created_by, error, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
             RETURNING {RECORDING_COLUMNS}"
        );

        let row = sqlx::query(&sql)
            .bind(recording.id.as_str())
            .bind(recording.meeting_id.as_str())
            .bind(&recording.title)
            .bind(&recording.room_name)
            .bind(&recording.egress_id)
            .bind(&recording.file_path)
            .bind(&recording.download_url)
            .bind(recording.file_size)
            .bind(recording.duration)
            .bind(recording.status.to_i16())
            .bind(recording.started_at)
            .bind(recording.completed_at)
            .bind(recording.created_by.as_str())
            .bind(&recording.error)
            .bind(recording.updated_at)
            .fetch_one(&self.pool)
            .await?;

        Self::row_to_recording(&row)
    }

    async fn get(&self, id: &RecordingId) -> Result<Option<Recording>> {
        let sql = format!("SELECT {RECORDING_COLUMNS} FROM recordings WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_recording).transpose()
    }

    async fn get_by_egress_id(&self, egress_id: &str) -> Result<Option<Recording>> {
        let sql = format!("SELECT {RECORDING_COLUMNS} FROM recordings WHERE egress_id = $1");
        let row = sqlx::query(&sql)
            .bind(egress_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_recording).transpose()
    }

    async fn set_egress_id(&self, id: &RecordingId, egress_id: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE recordings
             SET egress_id = $2, updated_at = NOW()
             WHERE id = $1 AND egress_id IS NULL",
        )
        .bind(id.as_str())
        .bind(egress_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn transition(
        &self,
        id: &RecordingId,
        allowed: &[RecordingStatus],
        transition: &RecordingTransition,
    ) -> Result<Option<Recording>> {
        transition.check_sources(allowed)?;
        let allowed: Vec<i16> = allowed.iter().map(|s| s.to_i16()).collect();

        // Single statement: the status guard and the write cannot interleave with another writer
        let sql = format!(
            "UPDATE recordings
             SET status = $2,
                 file_size = COALESCE($3, file_size),
                 duration = COALESCE($4, duration),
                 download_url = COALESCE($5, download_url),
                 error = COALESCE($6, error),
                 completed_at = COALESCE($7, completed_at),
                 updated_at = NOW()
             WHERE id = $1 AND status = ANY($8)
             RETURNING {RECORDING_COLUMNS}"
        );

        let row = sqlx::query(&sql)
            .bind(id.as_str())
            .bind(transition.status.to_i16())
            .bind(transition.file_size)
            .bind(transition.duration)
            .bind(&transition.download_url)
            .bind(&transition.error)
            .bind(transition.completed_at)
            .bind(allowed)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_recording).transpose()
    }

    async fn list_by_creator(
        &self,
        user_id: &UserId,
        query: &RecordingListQuery,
    ) -> Result<(Vec<Recording>, i64)> {
        let status = query.status.map(RecordingStatus::to_i16);

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM recordings
             WHERE created_by = $1 AND ($2::SMALLINT IS NULL OR status = $2)",
        )
        .bind(user_id.as_str())
        .bind(status)
        .fetch_one(&self.pool)
        .await?;

        let sql = format!(
            "SELECT {RECORDING_COLUMNS} FROM recordings
             WHERE created_by = $1 AND ($2::SMALLINT IS NULL OR status = $2)
             ORDER BY started_at DESC
             LIMIT $3 OFFSET $4"
        );
        let rows = sqlx::query(&sql)
            .bind(user_id.as_str())
            .bind(status)
            .bind(query.limit)
            .bind(query.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok((Self::rows_to_recordings(&rows)?, total))
    }

    async fn list_by_meeting(&self, meeting_id: &MeetingId) -> Result<Vec<Recording>> {
        let sql = format!(
            "SELECT {RECORDING_COLUMNS} FROM recordings
             WHERE meeting_id = $1
             ORDER BY started_at DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(meeting_id.as_str())
            .fetch_all(&self.pool)
            .await?;

        Self::rows_to_recordings(&rows)
    }

    async fn list_by_status(&self, status: RecordingStatus) -> Result<Vec<Recording>> {
        let sql = format!(
            "SELECT {RECORDING_COLUMNS} FROM recordings
             WHERE status = $1
             ORDER BY started_at ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(status.to_i16())
            .fetch_all(&self.pool)
            .await?;

        Self::rows_to_recordings(&rows)
    }

    async fn delete(&self, id: &RecordingId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM recordings WHERE id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
