//! Integration tests for saerinmeet-core services
//!
//! The recording lifecycle wired to the real egress HTTP client (against a
//! mock conferencing server) and the opendal memory backend.
//!
//! Run with: cargo test --test integration_tests

use std::sync::Arc;
use std::time::Duration;

use saerinmeet_core::{
    config::{EgressConfig, RecordingConfig},
    egress::{EgressOptions, LiveKitEgressClient},
    models::{Meeting, RecordingStatus, UserId},
    repository::{MemoryMeetingStore, MemoryRecordingStore, RecordingStore},
    service::{ExternalEgressStatus, ExternalEvent, RecordingService, StopOutcome, StopTarget},
    storage::OpendalStorage,
};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Stack {
    service: RecordingService,
    recordings: Arc<MemoryRecordingStore>,
    meetings: Arc<MemoryMeetingStore>,
    storage: OpendalStorage,
    meeting: Meeting,
    host: UserId,
}

async fn mock_egress(stop_response: ResponseTemplate) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/twirp/livekit.Egress/StartRoomCompositeEgress"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "egressId": "EG_int" })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/twirp/livekit.Egress/StopEgress"))
        .respond_with(stop_response)
        .mount(&server)
        .await;
    server
}

fn stack(server: &MockServer, recording: RecordingConfig) -> Stack {
    let egress_config = EgressConfig {
        url: server.uri(),
        api_key: "int-key".to_string(),
        api_secret: "int-secret-long-enough".to_string(),
        ..EgressConfig::default()
    };

    let recordings = Arc::new(MemoryRecordingStore::new());
    let meetings = Arc::new(MemoryMeetingStore::new());
    let storage = OpendalStorage::memory().unwrap();

    let host = UserId::new();
    let meeting = Meeting::new("Planning".to_string(), "planning-room".to_string(), host.clone());
    meetings.insert(meeting.clone());

    let service = RecordingService::new(
        recordings.clone(),
        meetings.clone(),
        Arc::new(LiveKitEgressClient::new(&egress_config).unwrap()),
        Arc::new(storage.clone()),
        EgressOptions::from(&egress_config),
        recording,
    );

    Stack {
        service,
        recordings,
        meetings,
        storage,
        meeting,
        host,
    }
}

#[tokio::test]
async fn test_recording_lifecycle_through_status_query() {
    let server = mock_egress(ResponseTemplate::new(200).set_body_json(json!({}))).await;
    let s = stack(&server, RecordingConfig::default());

    let recording = s
        .service
        .start(&s.meeting.id, &s.meeting.room_name, &s.host)
        .await
        .unwrap();
    assert_eq!(recording.egress_id.as_deref(), Some("EG_int"));
    assert!(s.meetings.is_recording(&s.meeting.id));

    let outcome = s
        .service
        .stop(&StopTarget::Recording(recording.id.clone()), &s.host)
        .await
        .unwrap();
    assert!(matches!(outcome, StopOutcome::Stopped(_)));
    assert!(!s.meetings.is_recording(&s.meeting.id));

    // Egress has not uploaded anything yet
    let view = s.service.status(&recording.id, &s.host).await.unwrap();
    assert_eq!(view.status, RecordingStatus::Processing);

    s.storage
        .operator()
        .write(&recording.file_path, vec![7u8; 4096])
        .await
        .unwrap();

    let view = s.service.status(&recording.id, &s.host).await.unwrap();
    assert_eq!(view.status, RecordingStatus::Completed);
    assert_eq!(view.file_size, 4096);

    s.service.delete(&recording.id, &s.host).await.unwrap();
    assert!(s.recordings.is_empty());
    assert!(s.storage.operator().stat(&recording.file_path).await.is_err());
}

#[tokio::test]
async fn test_poll_loop_completes_in_background() {
    let server = mock_egress(ResponseTemplate::new(200).set_body_json(json!({}))).await;
    let config = RecordingConfig {
        poll_interval_seconds: 1,
        max_poll_attempts: 5,
        ..RecordingConfig::default()
    };
    let s = stack(&server, config);

    let recording = s
        .service
        .start(&s.meeting.id, &s.meeting.room_name, &s.host)
        .await
        .unwrap();
    s.service
        .stop(&StopTarget::Egress("EG_int".to_string()), &s.host)
        .await
        .unwrap();
    s.storage
        .operator()
        .write(&recording.file_path, vec![1u8; 2048])
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(2500)).await;

    let stored = s.recordings.get(&recording.id).await.unwrap().unwrap();
    assert_eq!(stored.status, RecordingStatus::Completed);
    assert_eq!(stored.file_size, 2048);
    assert!(!s.service.poller().is_scheduled(&recording.id));
}

#[tokio::test]
async fn test_aborted_egress_fails_recording() {
    let server = mock_egress(ResponseTemplate::new(412).set_body_json(json!({
        "code": "failed_precondition",
        "msg": "egress with status EGRESS_ABORTED cannot be stopped",
    })))
    .await;
    let s = stack(&server, RecordingConfig::default());

    let recording = s
        .service
        .start(&s.meeting.id, &s.meeting.room_name, &s.host)
        .await
        .unwrap();
    let outcome = s
        .service
        .stop(&StopTarget::Recording(recording.id.clone()), &s.host)
        .await
        .unwrap();

    let StopOutcome::NoMedia(failed) = outcome else {
        panic!("expected no-media outcome");
    };
    assert_eq!(failed.status, RecordingStatus::Failed);
    assert!(failed.error.unwrap().starts_with("No active video/audio tracks"));
    assert!(!s.service.poller().is_scheduled(&recording.id));
    assert!(!s.meetings.is_recording(&s.meeting.id));
}

#[tokio::test]
async fn test_webhook_completion_reads_file_size() {
    let server = mock_egress(ResponseTemplate::new(200).set_body_json(json!({}))).await;
    let s = stack(&server, RecordingConfig::default());

    let recording = s
        .service
        .start(&s.meeting.id, &s.meeting.room_name, &s.host)
        .await
        .unwrap();
    s.storage
        .operator()
        .write(&recording.file_path, vec![0u8; 1024])
        .await
        .unwrap();

    let event = ExternalEvent {
        egress_id: "EG_int".to_string(),
        status: ExternalEgressStatus::Complete,
        duration: Some(30),
        error: None,
    };
    let completed = s.service.on_external_event(&event).await.unwrap().unwrap();
    assert_eq!(completed.status, RecordingStatus::Completed);
    assert_eq!(completed.file_size, 1024);
    assert_eq!(completed.duration, 30);
    assert!(!s.meetings.is_recording(&s.meeting.id));

    // Redelivery is a no-op
    assert!(s.service.on_external_event(&event).await.unwrap().is_none());
}
