//! Blocking client for the video-generation API.
//!
//! [`VideoClient`] owns three things: the credential/endpoint configuration,
//! a [`Transport`] (swappable for tests), and a [`TaskStore`] that every
//! submission and terminal query result is persisted into.

use std::time::Duration;

use chrono::Local;
use serde_json::Value;

use crate::{
    error::ReelError,
    remote::{
        api::{GenerationRequest, SubmitOutcome, TaskStatus, TaskStatusReport},
        payload::{self, MediaKind},
        store::{TaskRecord, TaskStore},
    },
};

/// Default API endpoint root.
pub const DEFAULT_BASE_URL: &str = "https://dashscope.aliyuncs.com/api/v1";

/// Environment variable consulted by [`ApiConfig::from_env`].
pub const API_KEY_ENV: &str = "DASHSCOPE_API_KEY";

/// How long the result URL of a finished task stays downloadable, in hours.
pub const URL_VALIDITY_HOURS: u64 = 24;

/// A task submitted within this many seconds may legitimately 404 on its
/// first status poll while the remote registers it.
pub const RECENT_TASK_WINDOW_SECONDS: i64 = 120;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Credential and endpoint configuration.
///
/// The key is an explicit value, resolved once at construction — never read
/// from the environment at call time.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Bearer token for the API.
    pub api_key: String,
    /// Endpoint root, without a trailing slash.
    pub base_url: String,
}

impl ApiConfig {
    /// Configuration with an explicit key and the default endpoint.
    pub fn new<S: Into<String>>(api_key: S) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Resolve the key from the `DASHSCOPE_API_KEY` environment variable.
    ///
    /// # Errors
    ///
    /// [`ReelError::MissingCredential`] when the variable is unset or empty.
    pub fn from_env() -> Result<Self, ReelError> {
        match std::env::var(API_KEY_ENV) {
            Ok(key) if !key.trim().is_empty() => Ok(Self::new(key)),
            _ => Err(ReelError::MissingCredential(API_KEY_ENV)),
        }
    }

    /// Override the endpoint root (for proxies or regional endpoints).
    #[must_use]
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// One HTTP exchange as seen by the client: status code plus parsed body.
#[derive(Debug, Clone)]
pub struct TransportReply {
    /// HTTP status code.
    pub status: u16,
    /// Parsed JSON body; `Value::Null` when the body was empty or not JSON.
    pub body: Value,
}

/// The HTTP seam. Production uses [`HttpTransport`]; tests substitute a mock
/// to exercise the client without a network.
pub trait Transport {
    /// POST a JSON body.
    fn post_json(
        &self,
        url: &str,
        headers: &[(&'static str, String)],
        body: &Value,
    ) -> Result<TransportReply, ReelError>;

    /// GET a resource.
    fn get(&self, url: &str, headers: &[(&'static str, String)])
    -> Result<TransportReply, ReelError>;
}

/// Blocking reqwest-backed transport.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    /// Build a transport with the standard request timeout.
    pub fn new() -> Result<Self, ReelError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }

    fn apply_headers(
        mut request: reqwest::blocking::RequestBuilder,
        headers: &[(&'static str, String)],
    ) -> reqwest::blocking::RequestBuilder {
        for (name, value) in headers {
            request = request.header(*name, value);
        }
        request
    }

    fn reply(response: reqwest::blocking::Response) -> TransportReply {
        let status = response.status().as_u16();
        let body = response.json().unwrap_or(Value::Null);
        TransportReply { status, body }
    }
}

impl Transport for HttpTransport {
    fn post_json(
        &self,
        url: &str,
        headers: &[(&'static str, String)],
        body: &Value,
    ) -> Result<TransportReply, ReelError> {
        let request = Self::apply_headers(self.client.post(url), headers).json(body);
        Ok(Self::reply(request.send()?))
    }

    fn get(
        &self,
        url: &str,
        headers: &[(&'static str, String)],
    ) -> Result<TransportReply, ReelError> {
        let request = Self::apply_headers(self.client.get(url), headers);
        Ok(Self::reply(request.send()?))
    }
}

/// Status of a task as reported to the caller, with human guidance attached.
#[derive(Debug, Clone)]
pub struct QueryReport {
    /// The task id that was polled.
    pub task_id: String,
    /// Canonical status.
    pub status: TaskStatus,
    /// Result URL, present on success.
    pub video_url: Option<String>,
    /// One-paragraph guidance for the caller (what to do next).
    pub guidance: String,
}

/// Blocking client for submitting and polling video-generation tasks.
pub struct VideoClient {
    config: ApiConfig,
    transport: Box<dyn Transport>,
    store: TaskStore,
}

impl VideoClient {
    /// Client over the real HTTP transport.
    pub fn new(config: ApiConfig, store: TaskStore) -> Result<Self, ReelError> {
        Ok(Self {
            config,
            transport: Box::new(HttpTransport::new()?),
            store,
        })
    }

    /// Client over a caller-supplied transport.
    pub fn with_transport(config: ApiConfig, store: TaskStore, transport: Box<dyn Transport>) -> Self {
        Self {
            config,
            transport,
            store,
        }
    }

    /// The task store this client records into.
    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    /// Submit a generation request.
    ///
    /// Local media paths in the request are validated (existence, size
    /// ceiling, audio duration) and embedded as `data:` URIs before any
    /// network traffic. The response shape is decided once into
    /// [`SubmitOutcome`]; accepted and inline-completed submissions each
    /// leave a record in the store.
    ///
    /// # Errors
    ///
    /// [`ReelError::MissingCredential`] for an empty key,
    /// [`ReelError::EmptyField`] for a blank model or an input with neither
    /// prompt nor media, payload errors from [`payload::encode_media`], and
    /// transport failures. A remote *rejection* is not an `Err` — it comes
    /// back as [`SubmitOutcome::Failed`].
    pub fn submit(&self, mut request: GenerationRequest) -> Result<SubmitOutcome, ReelError> {
        if self.config.api_key.trim().is_empty() {
            return Err(ReelError::MissingCredential(API_KEY_ENV));
        }
        if request.model.trim().is_empty() {
            return Err(ReelError::EmptyField("model"));
        }
        let has_media = request.input.media.img_url.is_some()
            || request.input.media.audio_url.is_some()
            || request.input.media.video_url.is_some()
            || request.input.media.first_frame_url.is_some()
            || request.input.media.last_frame_url.is_some();
        if request.input.prompt.as_deref().is_none_or(str::is_empty) && !has_media {
            return Err(ReelError::EmptyField("prompt"));
        }

        self.embed_media(&mut request)?;

        let url = format!(
            "{}/services/aigc/video-generation/video-synthesis",
            self.config.base_url
        );
        let body = serde_json::to_value(&request)?;

        log::info!("Submitting generation request to model {}", request.model);
        let reply = self.transport.post_json(&url, &self.headers(true), &body)?;
        log::debug!("Submission response status {}", reply.status);

        let outcome = SubmitOutcome::from_response(&reply.body);
        match &outcome {
            SubmitOutcome::Submitted { task_id } => {
                self.store.save(&self.record_for(&request, Some(task_id), TaskStatus::Pending, None))?;
                log::info!("Task {task_id} accepted");
            }
            SubmitOutcome::Completed { video_url } => {
                self.store.save(&self.record_for(
                    &request,
                    None,
                    TaskStatus::Succeeded,
                    Some(video_url),
                ))?;
                log::info!("Task completed inline");
            }
            SubmitOutcome::Failed { code, message } => {
                log::warn!(
                    "Submission rejected (code={}): {message}",
                    code.as_deref().unwrap_or("-")
                );
            }
        }

        Ok(outcome)
    }

    /// Poll the status of a task.
    ///
    /// A 404 (or a body without a status) is disambiguated against the local
    /// store: a task submitted within the last couple of minutes is reported
    /// as still initializing rather than missing. Terminal success and
    /// failure results are persisted idempotently.
    ///
    /// # Errors
    ///
    /// Transport failures, store I/O errors, and [`ReelError::Remote`] when
    /// the endpoint answers with an error payload that is not a missing-task
    /// 404 (bad credential, throttling, server fault). An unfinished,
    /// failed, or unknown task is a normal `Ok` report, not an error.
    pub fn query(&self, task_id: &str) -> Result<QueryReport, ReelError> {
        if task_id.trim().is_empty() {
            return Err(ReelError::EmptyField("task_id"));
        }

        let url = format!("{}/tasks/{task_id}", self.config.base_url);
        let reply = self.transport.get(&url, &self.headers(false))?;
        log::debug!("Status response for {task_id}: HTTP {}", reply.status);

        let Some(report) = TaskStatusReport::from_response(&reply.body) else {
            // Only a 404 means "no such task"; anything else without a
            // status payload is an API-level failure (auth, throttle, 5xx).
            if reply.status == 404 {
                return Ok(self.missing_task_report(task_id));
            }
            let code = reply
                .body
                .get("code")
                .and_then(Value::as_str)
                .map(str::to_string);
            let message = reply
                .body
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string);
            if code.is_some() || message.is_some() {
                return Err(ReelError::Remote {
                    code,
                    message: message
                        .unwrap_or_else(|| format!("HTTP {} with no task status", reply.status)),
                });
            }
            return Err(ReelError::Transport(format!(
                "unexpected HTTP {} response with no task status",
                reply.status
            )));
        };

        let guidance = match report.status {
            TaskStatus::Succeeded => {
                let video_url = report.video_url.clone().unwrap_or_default();
                self.persist_terminal(task_id, &report)?;
                format!(
                    "Video ready: {video_url}\nThe URL stays valid for {URL_VALIDITY_HOURS} \
                     hours; download the file promptly."
                )
            }
            TaskStatus::Failed => {
                self.persist_terminal(task_id, &report)?;
                format!(
                    "Generation failed [{}]: {}. Check that the prompt passes content review, \
                     the media inputs are reachable, and the model supports the requested \
                     resolution and duration.",
                    report.code.as_deref().unwrap_or("unknown"),
                    report.message.as_deref().unwrap_or("no message provided"),
                )
            }
            TaskStatus::Canceled => "The task was canceled before completion.".to_string(),
            TaskStatus::Pending => "The task is queued; poll again shortly.".to_string(),
            TaskStatus::Running => "The task is processing; poll again shortly.".to_string(),
            TaskStatus::Unknown => {
                "The remote reported an unrecognized status; poll again shortly.".to_string()
            }
        };

        Ok(QueryReport {
            task_id: task_id.to_string(),
            status: report.status,
            video_url: report.video_url,
            guidance,
        })
    }

    fn embed_media(&self, request: &mut GenerationRequest) -> Result<(), ReelError> {
        let media = &mut request.input.media;
        let fields: [(&mut Option<String>, MediaKind); 5] = [
            (&mut media.img_url, MediaKind::Image),
            (&mut media.first_frame_url, MediaKind::Image),
            (&mut media.last_frame_url, MediaKind::Image),
            (&mut media.audio_url, MediaKind::Audio),
            (&mut media.video_url, MediaKind::Video),
        ];
        for (field, kind) in fields {
            if let Some(reference) = field.as_deref() {
                *field = Some(payload::encode_media(reference, kind)?);
            }
        }
        Ok(())
    }

    fn headers(&self, asynchronous: bool) -> Vec<(&'static str, String)> {
        let mut headers = vec![(
            "Authorization",
            format!("Bearer {}", self.config.api_key),
        )];
        if asynchronous {
            headers.push(("X-DashScope-Async", "enable".to_string()));
        }
        headers
    }

    fn record_for(
        &self,
        request: &GenerationRequest,
        task_id: Option<&str>,
        status: TaskStatus,
        video_url: Option<&str>,
    ) -> TaskRecord {
        TaskRecord {
            task_id: task_id.map(str::to_string),
            status,
            video_url: video_url.map(str::to_string),
            prompt: request.input.prompt.clone(),
            model: request.model.clone(),
            resolution: request.parameters.resolution.clone(),
            duration: request.parameters.duration,
            code: None,
            message: None,
            submit_time: Local::now(),
        }
    }

    fn persist_terminal(&self, task_id: &str, report: &TaskStatusReport) -> Result<(), ReelError> {
        let mut record = match self.store.find(task_id)? {
            Some(existing) => existing,
            None => TaskRecord {
                task_id: Some(task_id.to_string()),
                status: report.status,
                video_url: None,
                prompt: report.orig_prompt.clone(),
                model: "unknown".to_string(),
                resolution: None,
                duration: None,
                code: None,
                message: None,
                submit_time: Local::now(),
            },
        };
        record.status = report.status;
        record.video_url = report.video_url.clone();
        record.code = report.code.clone();
        record.message = report.message.clone();
        self.store.save_result(&record)?;
        Ok(())
    }

    fn missing_task_report(&self, task_id: &str) -> QueryReport {
        let recently_submitted = self
            .store
            .find(task_id)
            .ok()
            .flatten()
            .is_some_and(|record| {
                (Local::now() - record.submit_time).num_seconds() < RECENT_TASK_WINDOW_SECONDS
            });

        let guidance = if recently_submitted {
            "The task is not visible yet; it was submitted moments ago and is likely still \
             initializing. Retry in a few seconds."
                .to_string()
        } else {
            "Task not found. The id may be mistyped, or the task may have expired on the \
             server."
                .to_string()
        };

        QueryReport {
            task_id: task_id.to_string(),
            status: TaskStatus::Unknown,
            video_url: None,
            guidance,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use serde_json::json;

    use super::*;
    use crate::remote::api::{GenerationInput, GenerationParameters, MediaRefs};

    #[derive(Debug, Clone)]
    struct RecordedCall {
        method: &'static str,
        url: String,
        headers: Vec<(&'static str, String)>,
        body: Option<Value>,
    }

    #[derive(Clone)]
    struct MockTransport {
        replies: Rc<RefCell<Vec<TransportReply>>>,
        calls: Rc<RefCell<Vec<RecordedCall>>>,
    }

    impl MockTransport {
        fn new(replies: Vec<TransportReply>) -> Self {
            Self {
                replies: Rc::new(RefCell::new(replies)),
                calls: Rc::new(RefCell::new(Vec::new())),
            }
        }
    }

    impl Transport for MockTransport {
        fn post_json(
            &self,
            url: &str,
            headers: &[(&'static str, String)],
            body: &Value,
        ) -> Result<TransportReply, ReelError> {
            self.calls.borrow_mut().push(RecordedCall {
                method: "POST",
                url: url.to_string(),
                headers: headers.to_vec(),
                body: Some(body.clone()),
            });
            Ok(self.replies.borrow_mut().remove(0))
        }

        fn get(
            &self,
            url: &str,
            headers: &[(&'static str, String)],
        ) -> Result<TransportReply, ReelError> {
            self.calls.borrow_mut().push(RecordedCall {
                method: "GET",
                url: url.to_string(),
                headers: headers.to_vec(),
                body: None,
            });
            Ok(self.replies.borrow_mut().remove(0))
        }
    }

    fn request(prompt: &str) -> GenerationRequest {
        GenerationRequest {
            model: "wan2.6-t2v".to_string(),
            input: GenerationInput {
                prompt: Some(prompt.to_string()),
                media: MediaRefs::default(),
            },
            parameters: GenerationParameters::default(),
        }
    }

    fn client_with(
        dir: &tempfile::TempDir,
        replies: Vec<TransportReply>,
    ) -> (VideoClient, MockTransport) {
        let store = TaskStore::open(dir.path()).unwrap();
        let transport = MockTransport::new(replies);
        let client = VideoClient::with_transport(
            ApiConfig::new("sk-test"),
            store,
            Box::new(transport.clone()),
        );
        (client, transport)
    }

    #[test]
    fn submit_sends_async_header_and_records_task() {
        let dir = tempfile::tempdir().unwrap();
        let (client, transport) = client_with(
            &dir,
            vec![TransportReply {
                status: 200,
                body: json!({"output": {"task_id": "T1"}}),
            }],
        );

        let outcome = client.submit(request("a red fox")).unwrap();
        assert_eq!(
            outcome,
            SubmitOutcome::Submitted {
                task_id: "T1".to_string()
            }
        );

        let calls = transport.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].method, "POST");
        assert!(calls[0].url.ends_with("/video-synthesis"));
        assert!(calls[0]
            .headers
            .iter()
            .any(|(name, value)| *name == "X-DashScope-Async" && value == "enable"));
        assert!(calls[0]
            .headers
            .iter()
            .any(|(name, value)| *name == "Authorization" && value == "Bearer sk-test"));

        let record = client.store().find("T1").unwrap().unwrap();
        assert_eq!(record.status, TaskStatus::Pending);
    }

    #[test]
    fn submit_with_empty_model_never_reaches_transport() {
        let dir = tempfile::tempdir().unwrap();
        let (client, transport) = client_with(&dir, vec![]);

        let mut req = request("a red fox");
        req.model = String::new();
        let error = client.submit(req).unwrap_err();
        assert!(matches!(error, ReelError::EmptyField("model")));
        assert!(transport.calls.borrow().is_empty());
    }

    #[test]
    fn submit_with_missing_media_file_never_reaches_transport() {
        let dir = tempfile::tempdir().unwrap();
        let (client, transport) = client_with(&dir, vec![]);

        let mut req = request("a red fox");
        req.input.media.img_url = Some("/nonexistent/frame.jpg".to_string());
        let error = client.submit(req).unwrap_err();
        assert!(matches!(error, ReelError::InputNotFound { .. }));
        assert!(transport.calls.borrow().is_empty());
    }

    #[test]
    fn query_success_reports_url_and_validity() {
        let dir = tempfile::tempdir().unwrap();
        let (client, _) = client_with(
            &dir,
            vec![TransportReply {
                status: 200,
                body: json!({"output": {
                    "task_status": "SUCCEEDED",
                    "video_url": "https://x/y.mp4"
                }}),
            }],
        );

        let report = client.query("T1").unwrap();
        assert_eq!(report.status, TaskStatus::Succeeded);
        assert_eq!(report.video_url.as_deref(), Some("https://x/y.mp4"));
        assert!(report.guidance.contains("https://x/y.mp4"));
        assert!(report.guidance.contains("24 hours"));
    }

    #[test]
    fn fresh_404_reports_initializing() {
        let dir = tempfile::tempdir().unwrap();
        let (client, _) = client_with(
            &dir,
            vec![
                TransportReply {
                    status: 200,
                    body: json!({"output": {"task_id": "T9"}}),
                },
                TransportReply {
                    status: 404,
                    body: json!({"message": "task not exist"}),
                },
            ],
        );

        client.submit(request("a red fox")).unwrap();
        let report = client.query("T9").unwrap();
        assert_eq!(report.status, TaskStatus::Unknown);
        assert!(report.guidance.contains("initializing"));
    }

    #[test]
    fn auth_failure_on_query_is_a_remote_error() {
        let dir = tempfile::tempdir().unwrap();
        let (client, _) = client_with(
            &dir,
            vec![TransportReply {
                status: 401,
                body: json!({"code": "InvalidApiKey", "message": "invalid key"}),
            }],
        );

        let error = client.query("T1").unwrap_err();
        match error {
            ReelError::Remote { code, message } => {
                assert_eq!(code.as_deref(), Some("InvalidApiKey"));
                assert_eq!(message, "invalid key");
            }
            other => panic!("expected Remote, got {other:?}"),
        }
    }

    #[test]
    fn opaque_server_fault_on_query_is_a_transport_error() {
        let dir = tempfile::tempdir().unwrap();
        let (client, _) = client_with(
            &dir,
            vec![TransportReply {
                status: 503,
                body: Value::Null,
            }],
        );

        let error = client.query("T1").unwrap_err();
        assert!(matches!(error, ReelError::Transport(_)));
    }

    #[test]
    fn unknown_404_reports_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let (client, _) = client_with(
            &dir,
            vec![TransportReply {
                status: 404,
                body: json!({"message": "task not exist"}),
            }],
        );

        let report = client.query("never-submitted").unwrap();
        assert_eq!(report.status, TaskStatus::Unknown);
        assert!(report.guidance.contains("not found"));
    }
}
