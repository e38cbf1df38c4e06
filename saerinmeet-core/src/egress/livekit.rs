//! LiveKit egress client over Twirp (JSON over HTTP POST)

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::{EgressControl, EgressError, EgressOptions, EgressSession, EgressTokenSigner};
use crate::{config::EgressConfig, Error, Result};

const START_ROOM_COMPOSITE: &str = "/twirp/livekit.Egress/StartRoomCompositeEgress";
const STOP_EGRESS: &str = "/twirp/livekit.Egress/StopEgress";

#[derive(Serialize)]
struct StartRoomCompositeRequest<'a> {
    room_name: &'a str,
    layout: &'a str,
    audio_only: bool,
    video_only: bool,
    preset: &'a str,
    file_outputs: [EncodedFileOutput<'a>; 1],
}

#[derive(Serialize)]
struct EncodedFileOutput<'a> {
    file_type: &'static str,
    filepath: &'a str,
}

#[derive(Serialize)]
struct StopEgressRequest<'a> {
    egress_id: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EgressInfo {
    #[serde(default, alias = "egress_id")]
    egress_id: String,
}

#[derive(Deserialize, Default)]
struct TwirpError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    msg: String,
}

/// Egress API client for a LiveKit server
#[derive(Clone, Debug)]
pub struct LiveKitEgressClient {
    http_client: Client,
    base_url: String,
    signer: EgressTokenSigner,
}

impl LiveKitEgressClient {
    pub fn new(config: &EgressConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build egress HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            base_url: http_base_url(&config.url),
            signer: EgressTokenSigner::new(&config.api_key, &config.api_secret),
        })
    }

    async fn call<T: Serialize + Sync>(&self, method: &str, body: &T) -> std::result::Result<Response, EgressError> {
        let token = self
            .signer
            .record_token()
            .map_err(|e| EgressError::Transport(e.to_string()))?;

        self.http_client
            .post(format!("{}{}", self.base_url, method))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(|e| EgressError::Transport(e.to_string()))
    }
}

/// `ws://` and `wss://` server URLs are served over `http://` / `https://`
fn http_base_url(url: &str) -> String {
    let url = url.trim_end_matches('/');
    if let Some(rest) = url.strip_prefix("wss://") {
        format!("https://{rest}")
    } else if let Some(rest) = url.strip_prefix("ws://") {
        format!("http://{rest}")
    } else {
        url.to_string()
    }
}

async fn read_twirp_error(response: Response) -> TwirpError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    serde_json::from_str::<TwirpError>(&body).unwrap_or_else(|_| TwirpError {
        code: status.as_u16().to_string(),
        msg: body,
    })
}

#[async_trait]
impl EgressControl for LiveKitEgressClient {
    async fn start_room_composite(
        &self,
        room_name: &str,
        filepath: &str,
        options: &EgressOptions,
    ) -> std::result::Result<EgressSession, EgressError> {
        let request = StartRoomCompositeRequest {
            room_name,
            layout: &options.layout,
            audio_only: options.audio_only,
            video_only: options.video_only,
            preset: &options.preset,
            file_outputs: [EncodedFileOutput {
                file_type: "MP4",
                filepath,
            }],
        };

        let response = self.call(START_ROOM_COMPOSITE, &request).await?;
        if !response.status().is_success() {
            let error = read_twirp_error(response).await;
            warn!(room = %room_name, code = %error.code, "Egress start rejected: {}", error.msg);
            return Err(EgressError::Rejected {
                code: error.code,
                message: error.msg,
            });
        }

        let info: EgressInfo = response
            .json()
            .await
            .map_err(|e| EgressError::Transport(format!("Invalid egress response: {e}")))?;
        if info.egress_id.is_empty() {
            return Err(EgressError::Rejected {
                code: "unknown".to_string(),
                message: "Egress response carried no egress id".to_string(),
            });
        }

        debug!(room = %room_name, egress_id = %info.egress_id, "Room composite egress started");
        Ok(EgressSession {
            egress_id: info.egress_id,
        })
    }

    async fn stop(&self, egress_id: &str) -> std::result::Result<(), EgressError> {
        let response = self.call(STOP_EGRESS, &StopEgressRequest { egress_id }).await?;
        if response.status().is_success() {
            debug!(egress_id = %egress_id, "Egress stopped");
            return Ok(());
        }

        let error = read_twirp_error(response).await;
        Err(EgressError::from_stop_failure(&error.code, &error.msg))
    }
}
