// Recording HTTP handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use saerinmeet_core::{
    models::{MeetingId, Recording, RecordingId, RecordingListQuery, RecordingStatus, RecordingStatusView},
    service::{StopOutcome, StopTarget},
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::{middleware::AuthUser, AppError, AppResult, AppState};

/// Start recording request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRecordingRequest {
    #[serde(default)]
    pub meeting_id: String,
    #[serde(default)]
    pub room_name: String,
}

/// Stop recording request, either id works
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopRecordingRequest {
    pub recording_id: Option<String>,
    pub egress_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListRecordingsQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<String>,
}

/// Short recording view returned by start and stop
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingSummary {
    pub id: RecordingId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub egress_id: Option<String>,
    pub status: RecordingStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Recording> for RecordingSummary {
    fn from(recording: Recording) -> Self {
        Self {
            id: recording.id,
            egress_id: recording.egress_id,
            status: recording.status,
            error: recording.error,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RecordingActionResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub recording: RecordingSummary,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingListResponse {
    pub recordings: Vec<Recording>,
    pub total_pages: i64,
    pub current_page: i64,
    pub total: i64,
}

#[derive(Debug, Serialize)]
pub struct RecordingResponse {
    pub recording: Recording,
}

#[derive(Debug, Serialize)]
pub struct MeetingRecordingsResponse {
    pub recordings: Vec<Recording>,
}

#[derive(Debug, Serialize)]
pub struct WatchUrlResponse {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Start recording a meeting
pub async fn start_recording(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(req): Json<StartRecordingRequest>,
) -> AppResult<Json<RecordingActionResponse>> {
    let recording = state
        .recording_service
        .start(
            &MeetingId::from_string(req.meeting_id),
            &req.room_name,
            &auth.user_id,
        )
        .await?;

    Ok(Json(RecordingActionResponse {
        message: "Recording started".to_string(),
        error: None,
        recording: recording.into(),
    }))
}

/// Stop a recording
///
/// Answers 400 when the egress had already ended without capturing anything.
pub async fn stop_recording(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(req): Json<StopRecordingRequest>,
) -> AppResult<Response> {
    let target = match (req.recording_id, req.egress_id) {
        (Some(id), _) if !id.is_empty() => StopTarget::Recording(RecordingId::from_string(id)),
        (_, Some(egress_id)) if !egress_id.is_empty() => StopTarget::Egress(egress_id),
        _ => return Err(AppError::bad_request("Recording ID or Egress ID is required")),
    };

    let response = match state.recording_service.stop(&target, &auth.user_id).await? {
        StopOutcome::Stopped(recording) => Json(RecordingActionResponse {
            message: "Recording stopped and processing".to_string(),
            error: None,
            recording: recording.into(),
        })
        .into_response(),
        StopOutcome::NoMedia(recording) => (
            StatusCode::BAD_REQUEST,
            Json(RecordingActionResponse {
                message: "Recording failed - no active tracks".to_string(),
                error: recording.error.clone(),
                recording: recording.into(),
            }),
        )
            .into_response(),
    };

    Ok(response)
}

/// List the caller's recordings
pub async fn list_recordings(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ListRecordingsQuery>,
) -> AppResult<Json<RecordingListResponse>> {
    let status = query
        .status
        .filter(|s| !s.is_empty())
        .map(|s| RecordingStatus::from_str(&s))
        .transpose()?;

    let defaults = RecordingListQuery::default();
    let list_query = RecordingListQuery {
        page: query.page.unwrap_or(defaults.page),
        limit: query.limit.unwrap_or(defaults.limit),
        status,
    }
    .normalized();

    let (recordings, total) = state
        .recording_service
        .list_for_user(&auth.user_id, list_query.clone())
        .await?;

    Ok(Json(RecordingListResponse {
        recordings,
        total_pages: (total + list_query.limit - 1) / list_query.limit,
        current_page: list_query.page,
        total,
    }))
}

/// Get a single recording
pub async fn get_recording(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<RecordingResponse>> {
    let recording = state
        .recording_service
        .get(&RecordingId::from_string(id), &auth.user_id)
        .await?;

    Ok(Json(RecordingResponse { recording }))
}

/// Current status, completing the recording if its file just appeared
pub async fn recording_status(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<RecordingStatusView>> {
    let view = state
        .recording_service
        .status(&RecordingId::from_string(id), &auth.user_id)
        .await?;

    Ok(Json(view))
}

pub async fn meeting_recordings(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(meeting_id): Path<String>,
) -> AppResult<Json<MeetingRecordingsResponse>> {
    let recordings = state
        .recording_service
        .list_for_meeting(&MeetingId::from_string(meeting_id), &auth.user_id)
        .await?;

    Ok(Json(MeetingRecordingsResponse { recordings }))
}

/// Redirect to a short-lived download URL
pub async fn download_recording(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Redirect> {
    let url = state
        .recording_service
        .download_url(&RecordingId::from_string(id), &auth.user_id)
        .await?;

    Ok(Redirect::temporary(&url))
}

pub async fn watch_recording(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<WatchUrlResponse>> {
    let url = state
        .recording_service
        .watch_url(&RecordingId::from_string(id), &auth.user_id)
        .await?;

    Ok(Json(WatchUrlResponse { url }))
}

pub async fn delete_recording(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    state
        .recording_service
        .delete(&RecordingId::from_string(id), &auth.user_id)
        .await?;

    Ok(Json(MessageResponse {
        message: "Recording deleted successfully".to_string(),
    }))
}
