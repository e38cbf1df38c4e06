// SaerinMeet API Library
//
// HTTP surface of the recording lifecycle service

pub mod http;
pub mod observability;

// Re-export commonly used types
pub use http::{create_router, AppState};
