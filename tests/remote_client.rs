//! Remote client integration tests, driven through a mock transport.
//!
//! No network access: the transport seam is replaced with a scripted mock so
//! the submit/query flows and their side effects on the task store can be
//! asserted end to end.

use std::{
    fs,
    sync::{Arc, Mutex},
};

use reelkit::{
    ReelError,
    remote::{
        api::{
            GenerationInput, GenerationParameters, GenerationRequest, MediaRefs, SubmitOutcome,
            TaskStatus,
        },
        client::{ApiConfig, Transport, TransportReply, VideoClient},
        store::TaskStore,
    },
};
use serde_json::{Value, json};

#[derive(Debug, Clone)]
struct Call {
    method: &'static str,
    url: String,
    body: Option<Value>,
}

#[derive(Clone)]
struct ScriptedTransport {
    replies: Arc<Mutex<Vec<TransportReply>>>,
    calls: Arc<Mutex<Vec<Call>>>,
}

impl ScriptedTransport {
    fn new(replies: Vec<TransportReply>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies)),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("calls lock").clone()
    }
}

impl Transport for ScriptedTransport {
    fn post_json(
        &self,
        url: &str,
        _headers: &[(&'static str, String)],
        body: &Value,
    ) -> Result<TransportReply, ReelError> {
        self.calls.lock().expect("calls lock").push(Call {
            method: "POST",
            url: url.to_string(),
            body: Some(body.clone()),
        });
        Ok(self.replies.lock().expect("replies lock").remove(0))
    }

    fn get(
        &self,
        url: &str,
        _headers: &[(&'static str, String)],
    ) -> Result<TransportReply, ReelError> {
        self.calls.lock().expect("calls lock").push(Call {
            method: "GET",
            url: url.to_string(),
            body: None,
        });
        Ok(self.replies.lock().expect("replies lock").remove(0))
    }
}

fn reply(status: u16, body: Value) -> TransportReply {
    TransportReply { status, body }
}

fn text_request(prompt: &str) -> GenerationRequest {
    GenerationRequest {
        model: "wan2.6-t2v".to_string(),
        input: GenerationInput {
            prompt: Some(prompt.to_string()),
            media: MediaRefs::default(),
        },
        parameters: GenerationParameters::default(),
    }
}

fn client(dir: &tempfile::TempDir, replies: Vec<TransportReply>) -> (VideoClient, ScriptedTransport) {
    let store = TaskStore::open(dir.path()).expect("store");
    let transport = ScriptedTransport::new(replies);
    let client = VideoClient::with_transport(
        ApiConfig::new("sk-test"),
        store,
        Box::new(transport.clone()),
    );
    (client, transport)
}

#[test]
fn accepted_submission_persists_a_record_with_the_task_id() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (client, _) = client(&dir, vec![reply(200, json!({"output": {"task_id": "T1"}}))]);

    let outcome = client.submit(text_request("a red fox")).expect("submit");
    assert_eq!(
        outcome,
        SubmitOutcome::Submitted {
            task_id: "T1".to_string()
        }
    );

    // Exactly one record file, and its JSON names the task id.
    let entries: Vec<_> = fs::read_dir(dir.path())
        .expect("read_dir")
        .map(|entry| entry.expect("entry").path())
        .collect();
    assert_eq!(entries.len(), 1);
    let contents = fs::read_to_string(&entries[0]).expect("read record");
    assert!(contents.contains("\"task_id\": \"T1\""));
}

#[test]
fn inline_completion_persists_a_sync_record() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (client, _) = client(
        &dir,
        vec![reply(200, json!({"output": {"video_url": "https://x/y.mp4"}}))],
    );

    let outcome = client.submit(text_request("a red fox")).expect("submit");
    assert_eq!(
        outcome,
        SubmitOutcome::Completed {
            video_url: "https://x/y.mp4".to_string()
        }
    );

    let summaries = client.store().list_recent(10).expect("list");
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].status, TaskStatus::Succeeded);
    assert!(summaries[0].task_id.is_none());
}

#[test]
fn remote_rejection_is_an_outcome_not_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (client, _) = client(
        &dir,
        vec![reply(
            400,
            json!({"code": "InvalidParameter", "message": "unsupported resolution"}),
        )],
    );

    let outcome = client.submit(text_request("a red fox")).expect("submit");
    match outcome {
        SubmitOutcome::Failed { code, message } => {
            assert_eq!(code.as_deref(), Some("InvalidParameter"));
            assert!(message.contains("resolution"));
        }
        other => panic!("expected Failed, got {other:?}"),
    }

    // Rejections leave no record behind.
    assert!(client.store().list_recent(10).expect("list").is_empty());
}

#[test]
fn oversized_media_is_rejected_before_any_network_call() {
    let dir = tempfile::tempdir().expect("tempdir");
    let media_dir = tempfile::tempdir().expect("tempdir");
    let (client, transport) = client(&dir, vec![]);

    let image = media_dir.path().join("huge.jpg");
    let file = fs::File::create(&image).expect("create");
    file.set_len(10 * 1024 * 1024 + 1).expect("set_len");

    let mut request = text_request("a red fox");
    request.input.media.img_url = Some(image.to_string_lossy().into_owned());

    let error = client.submit(request).expect_err("should reject");
    assert!(matches!(error, ReelError::MediaTooLarge { .. }));
    assert!(
        transport.calls().is_empty(),
        "size ceiling must be enforced before the transport is touched"
    );
}

#[test]
fn local_image_is_embedded_as_data_uri() {
    let dir = tempfile::tempdir().expect("tempdir");
    let media_dir = tempfile::tempdir().expect("tempdir");
    let (client, transport) = client(&dir, vec![reply(200, json!({"output": {"task_id": "T2"}}))]);

    let image = media_dir.path().join("frame.jpg");
    fs::write(&image, [0xffu8, 0xd8, 0xff, 0xe0]).expect("write");

    let mut request = text_request("animate this");
    request.input.media.img_url = Some(image.to_string_lossy().into_owned());
    client.submit(request).expect("submit");

    let calls = transport.calls();
    assert_eq!(calls.len(), 1);
    let body = calls[0].body.as_ref().expect("body");
    let embedded = body["input"]["img_url"].as_str().expect("img_url");
    assert!(embedded.starts_with("data:image/jpeg;base64,"));
}

#[test]
fn successful_query_is_idempotent_in_the_store() {
    let dir = tempfile::tempdir().expect("tempdir");
    let success = json!({"output": {
        "task_status": "SUCCEEDED",
        "video_url": "https://x/y.mp4"
    }});
    let (client, _) = client(
        &dir,
        vec![
            reply(200, json!({"output": {"task_id": "T3"}})),
            reply(200, success.clone()),
            reply(200, success),
        ],
    );

    client.submit(text_request("a red fox")).expect("submit");

    let first = client.query("T3").expect("query");
    assert_eq!(first.status, TaskStatus::Succeeded);
    assert!(first.guidance.contains("https://x/y.mp4"));
    assert!(first.guidance.contains("24 hours"));

    let files_after_first: Vec<_> = fs::read_dir(dir.path())
        .expect("read_dir")
        .map(|entry| entry.expect("entry").path())
        .collect();

    let second = client.query("T3").expect("query again");
    assert_eq!(second.status, TaskStatus::Succeeded);

    let files_after_second: Vec<_> = fs::read_dir(dir.path())
        .expect("read_dir")
        .map(|entry| entry.expect("entry").path())
        .collect();
    assert_eq!(
        files_after_first.len(),
        files_after_second.len(),
        "repeating a successful query must not create new record files"
    );

    let record = client.store().find("T3").expect("find").expect("record");
    assert_eq!(record.status, TaskStatus::Succeeded);
    assert_eq!(record.video_url.as_deref(), Some("https://x/y.mp4"));
}

#[test]
fn failed_task_reports_troubleshooting_guidance() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (client, _) = client(
        &dir,
        vec![reply(
            200,
            json!({"output": {
                "task_status": "FAILED",
                "code": "DataInspectionFailed",
                "message": "prompt rejected"
            }}),
        )],
    );

    let report = client.query("T4").expect("query");
    assert_eq!(report.status, TaskStatus::Failed);
    assert!(report.guidance.contains("DataInspectionFailed"));
    assert!(report.guidance.contains("prompt rejected"));
}

#[test]
fn recently_submitted_task_404_reads_as_initializing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (client, _) = client(
        &dir,
        vec![
            reply(200, json!({"output": {"task_id": "T5"}})),
            reply(404, json!({"message": "task not exist"})),
        ],
    );

    client.submit(text_request("a red fox")).expect("submit");
    let report = client.query("T5").expect("query");

    assert_eq!(report.status, TaskStatus::Unknown);
    assert!(report.guidance.contains("initializing"));
}

#[test]
fn unrecorded_task_404_reads_as_not_found() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (client, _) = client(&dir, vec![reply(404, json!({"message": "task not exist"}))]);

    let report = client.query("never-submitted").expect("query");
    assert_eq!(report.status, TaskStatus::Unknown);
    assert!(report.guidance.contains("not found"));
}

#[test]
fn credential_rejection_on_query_is_not_mistaken_for_a_missing_task() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (client, _) = client(
        &dir,
        vec![reply(
            401,
            json!({"code": "InvalidApiKey", "message": "invalid key"}),
        )],
    );

    let error = client.query("T7").expect_err("should surface the auth failure");
    match error {
        ReelError::Remote { code, .. } => {
            assert_eq!(code.as_deref(), Some("InvalidApiKey"));
        }
        other => panic!("expected Remote, got {other:?}"),
    }
}

#[test]
fn unrecognized_status_maps_to_unknown() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (client, _) = client(
        &dir,
        vec![reply(200, json!({"output": {"task_status": "THROTTLED"}}))],
    );

    let report = client.query("T6").expect("query");
    assert_eq!(report.status, TaskStatus::Unknown);
}

#[test]
fn empty_api_key_never_reaches_transport() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = TaskStore::open(dir.path()).expect("store");
    let transport = ScriptedTransport::new(vec![]);
    let client = VideoClient::with_transport(
        ApiConfig::new(""),
        store,
        Box::new(transport.clone()),
    );

    let error = client.submit(text_request("a red fox")).expect_err("reject");
    assert!(matches!(error, ReelError::MissingCredential(_)));
    assert!(transport.calls().is_empty());
}
