//! Wire contract for the cloud video-generation API.
//!
//! The remote endpoint answers a submission with either a deferred task id
//! or an inline result URL. That shape is decided **once** here, at the API
//! boundary, into [`SubmitOutcome`] — callers never re-inspect raw response
//! objects.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Canonical lifecycle status of a remote task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Queued, not yet started.
    Pending,
    /// Being processed.
    Running,
    /// Finished with a result URL.
    Succeeded,
    /// Finished with an error.
    Failed,
    /// Canceled before completion.
    Canceled,
    /// The remote reported a status this client does not recognize, or the
    /// task id is invalid or expired.
    #[default]
    Unknown,
}

impl TaskStatus {
    /// Map a remote status string to the canonical enum.
    ///
    /// Unrecognized strings map to [`TaskStatus::Unknown`].
    pub fn from_remote(value: &str) -> Self {
        match value {
            "PENDING" => TaskStatus::Pending,
            "RUNNING" => TaskStatus::Running,
            "SUCCEEDED" => TaskStatus::Succeeded,
            "FAILED" => TaskStatus::Failed,
            "CANCELED" => TaskStatus::Canceled,
            _ => TaskStatus::Unknown,
        }
    }

    /// Whether no further state transition can occur.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Succeeded | TaskStatus::Failed | TaskStatus::Canceled
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::Running => "RUNNING",
            TaskStatus::Succeeded => "SUCCEEDED",
            TaskStatus::Failed => "FAILED",
            TaskStatus::Canceled => "CANCELED",
            TaskStatus::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

/// Generation parameters carried in the request body and persisted in the
/// local task record.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GenerationParameters {
    /// Output resolution label (e.g. `1080P`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    /// Clip duration in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    /// Whether to generate an audio track.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<bool>,
    /// Camera shot type hint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shot_type: Option<String>,
    /// Let the provider expand the prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_extend: Option<bool>,
    /// Watermark the output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watermark: Option<bool>,
}

/// Media payload references in the request input block, each either a
/// remote URL or an embedded `data:` URI.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MediaRefs {
    /// Driving image.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub img_url: Option<String>,
    /// Driving audio.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    /// Driving video.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    /// First keyframe for keyframe-to-video models.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_frame_url: Option<String>,
    /// Last keyframe for keyframe-to-video models.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_frame_url: Option<String>,
}

/// Input block of the request body.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GenerationInput {
    /// Text prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Media payload references.
    #[serde(flatten)]
    pub media: MediaRefs,
}

/// Full request body for a submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Model identifier (e.g. `wan2.6-i2v`).
    pub model: String,
    /// Prompt and media references.
    pub input: GenerationInput,
    /// Generation parameters.
    pub parameters: GenerationParameters,
}

/// Outcome of a submission, decided once from the raw response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The remote accepted the job and returned a task id to poll.
    Submitted {
        /// Remote-assigned opaque task identifier.
        task_id: String,
    },
    /// The remote completed the job inline and returned the result URL.
    Completed {
        /// Result video URL, valid for 24 hours.
        video_url: String,
    },
    /// The remote rejected the request.
    Failed {
        /// Remote error code, when supplied.
        code: Option<String>,
        /// Remote error message.
        message: String,
    },
}

impl SubmitOutcome {
    /// Decide the outcome from a raw submission response body.
    ///
    /// A `task_id` in the output block wins over a `video_url`; a body with
    /// neither is a failure carrying whatever code/message the remote sent.
    pub fn from_response(body: &Value) -> Self {
        let output = body.get("output");

        if let Some(task_id) = output
            .and_then(|o| o.get("task_id"))
            .and_then(Value::as_str)
        {
            return SubmitOutcome::Submitted {
                task_id: task_id.to_string(),
            };
        }

        if let Some(video_url) = output
            .and_then(|o| o.get("video_url"))
            .and_then(Value::as_str)
        {
            return SubmitOutcome::Completed {
                video_url: video_url.to_string(),
            };
        }

        SubmitOutcome::Failed {
            code: extract_str(body, "code"),
            message: extract_str(body, "message")
                .unwrap_or_else(|| "response carried neither task_id nor video_url".to_string()),
        }
    }
}

/// Parsed task-status response.
#[derive(Debug, Clone)]
pub struct TaskStatusReport {
    /// Canonical status.
    pub status: TaskStatus,
    /// Result URL, present on success.
    pub video_url: Option<String>,
    /// Remote submit timestamp, as reported.
    pub submit_time: Option<String>,
    /// Remote completion timestamp, as reported.
    pub end_time: Option<String>,
    /// Prompt echoed back by the remote.
    pub orig_prompt: Option<String>,
    /// Error code, present on failure.
    pub code: Option<String>,
    /// Error message, present on failure.
    pub message: Option<String>,
}

impl TaskStatusReport {
    /// Parse a raw status response body.
    ///
    /// Returns `None` when the body carries no `output.task_status` — the
    /// caller resolves that ambiguity (fresh task vs. expired id).
    pub fn from_response(body: &Value) -> Option<Self> {
        let output = body.get("output")?;
        let status = TaskStatus::from_remote(output.get("task_status")?.as_str()?);

        Some(Self {
            status,
            video_url: extract_str(output, "video_url"),
            submit_time: extract_str(output, "submit_time"),
            end_time: extract_str(output, "end_time"),
            orig_prompt: extract_str(output, "orig_prompt"),
            // Error details may sit at the top level or inside the output block.
            code: extract_str(output, "code").or_else(|| extract_str(body, "code")),
            message: extract_str(output, "message").or_else(|| extract_str(body, "message")),
        })
    }
}

fn extract_str(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}
