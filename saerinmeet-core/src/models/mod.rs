pub mod id;
pub mod meeting;
pub mod recording;

pub use id::{generate_id, MeetingId, RecordingId, UserId};
pub use meeting::Meeting;
pub use recording::{
    Recording, RecordingListQuery, RecordingStatus, RecordingStatusView, RecordingTransition,
};
