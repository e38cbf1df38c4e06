//! Egress control
//!
//! The conferencing service composes the room and writes the file to object
//! storage itself. This module only asks it to start and stop.

pub mod livekit;
pub mod token;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::EgressConfig;

pub use livekit::LiveKitEgressClient;
pub use token::{EgressTokenSigner, WebhookVerifier};

/// Room composite encoding options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EgressOptions {
    pub preset: String,
    pub layout: String,
    pub audio_only: bool,
    pub video_only: bool,
}

impl From<&EgressConfig> for EgressOptions {
    fn from(config: &EgressConfig) -> Self {
        Self {
            preset: config.preset.clone(),
            layout: config.layout.clone(),
            audio_only: config.audio_only,
            video_only: config.video_only,
        }
    }
}

/// Egress session accepted by the conferencing service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EgressSession {
    pub egress_id: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EgressError {
    /// The session already ended or was aborted, so nothing can be stopped
    #[error("Egress already in a terminal state: {0}")]
    TerminalState(String),

    #[error("Egress request rejected ({code}): {message}")]
    Rejected { code: String, message: String },

    #[error("Egress transport error: {0}")]
    Transport(String),
}

impl EgressError {
    pub const fn is_terminal_state(&self) -> bool {
        matches!(self, Self::TerminalState(_))
    }

    /// Classify a failed stop call.
    ///
    /// `invalid_argument` / `failed_precondition` (gRPC 3 / 9) and the
    /// aborted-egress messages mean the session is already over.
    pub fn from_stop_failure(code: &str, message: &str) -> Self {
        const TERMINAL_CODES: [&str; 4] = ["invalid_argument", "failed_precondition", "3", "9"];
        const TERMINAL_MESSAGES: [&str; 3] = ["EGRESS_ABORTED", "cannot be stopped", "already stopped"];

        let code_lower = code.to_ascii_lowercase();
        if TERMINAL_CODES.contains(&code_lower.as_str())
            || TERMINAL_MESSAGES.iter().any(|m| message.contains(m))
        {
            Self::TerminalState(message.to_string())
        } else {
            Self::Rejected {
                code: code.to_string(),
                message: message.to_string(),
            }
        }
    }
}

/// Recording control API of the conferencing service
#[async_trait]
pub trait EgressControl: Send + Sync {
    /// Start a room composite recording written to `filepath` in the bucket
    async fn start_room_composite(
        &self,
        room_name: &str,
        filepath: &str,
        options: &EgressOptions,
    ) -> Result<EgressSession, EgressError>;

    async fn stop(&self, egress_id: &str) -> Result<(), EgressError>;
}
