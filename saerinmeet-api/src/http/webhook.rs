// Egress webhook receiver

use axum::{
    body::Bytes,
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap},
    Json,
};
use saerinmeet_core::service::{ExternalEgressStatus, ExternalEvent};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info};

use super::{AppError, AppResult, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    #[serde(default)]
    pub event: String,
    pub egress_info: Option<EgressInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EgressInfo {
    #[serde(default, alias = "egress_id")]
    pub egress_id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, deserialize_with = "int_or_string")]
    pub duration: Option<i64>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub received: bool,
}

/// 64-bit integers may arrive quoted
fn int_or_string<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Str(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Int(v)) => Ok(Some(v)),
        Some(Raw::Str(s)) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

impl WebhookPayload {
    /// Final egress notifications only; everything else is acknowledged and ignored
    fn into_event(self) -> Option<ExternalEvent> {
        if self.event != "egress_updated" && self.event != "egress_ended" {
            return None;
        }
        let info = self.egress_info?;
        if info.egress_id.is_empty() {
            return None;
        }
        let status = ExternalEgressStatus::from_egress_status(&info.status)?;

        Some(ExternalEvent {
            egress_id: info.egress_id,
            status,
            duration: info.duration,
            error: info.error.filter(|e| !e.is_empty()),
        })
    }
}

/// Receive an egress notification
///
/// The signature is checked against the raw body when verification is
/// configured.
pub async fn receive_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<WebhookResponse>> {
    if let Some(verifier) = &state.webhook_verifier {
        let authorization = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::unauthorized("Missing webhook signature"))?;
        verifier.verify(authorization, &body)?;
    }

    let payload: WebhookPayload = serde_json::from_slice(&body)?;
    let event_name = payload.event.clone();

    match payload.into_event() {
        Some(event) => {
            let updated = state.recording_service.on_external_event(&event).await?;
            info!(
                egress_id = %event.egress_id,
                event = %event_name,
                applied = updated.is_some(),
                "Processed egress webhook"
            );
        }
        None => debug!(event = %event_name, "Ignored webhook event"),
    }

    Ok(Json(WebhookResponse { received: true }))
}
