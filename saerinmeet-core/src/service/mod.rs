pub mod auth;
pub mod poller;
pub mod recording;

pub use auth::{Claims, JwtService};
pub use poller::{RecordingPoller, TickOutcome};
pub use recording::{
    ExternalEgressStatus, ExternalEvent, RecordingService, StopOutcome, StopTarget,
};
