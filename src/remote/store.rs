//! Local task records.
//!
//! Every submission leaves an append-only JSON record in the store
//! directory, so task ids survive process restarts and can be polled later.
//! Records are plain files named `task_{id}_{unix_ts}.json` (or
//! `task_sync_{unix_ts}.json` for inline synchronous results); a terminal
//! query result is written under the deterministic name
//! `task_{id}_result.json`, which makes repeated result saves idempotent.

use std::{
    fs,
    path::{Path, PathBuf},
    time::SystemTime,
};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::{error::ReelError, remote::api::TaskStatus};

/// Default number of records returned by [`TaskStore::list_recent`].
pub const DEFAULT_RECENT_LIMIT: usize = 10;

/// One persisted task record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Remote task id; absent for inline synchronous results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    /// Last known status.
    pub status: TaskStatus,
    /// Result URL, once known. Remote URLs expire after 24 hours.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    /// Prompt the task was submitted with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Model the task was submitted to.
    pub model: String,
    /// Requested resolution label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    /// Requested clip duration in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    /// Remote error code, recorded when the task failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Remote error message, recorded when the task failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Local submission time.
    pub submit_time: DateTime<Local>,
}

/// Condensed record view for listings.
#[derive(Debug, Clone, Serialize)]
pub struct TaskSummary {
    /// Remote task id, when the record has one.
    pub task_id: Option<String>,
    /// Last known status.
    pub status: TaskStatus,
    /// Local submission time.
    pub submit_time: DateTime<Local>,
    /// Model the task was submitted to.
    pub model: String,
}

/// Append-only JSON task store rooted at a directory.
#[derive(Debug, Clone)]
pub struct TaskStore {
    directory: PathBuf,
}

impl TaskStore {
    /// Open (and create if needed) a store at `directory`.
    ///
    /// # Errors
    ///
    /// I/O errors creating the directory.
    pub fn open<P: AsRef<Path>>(directory: P) -> Result<Self, ReelError> {
        let directory = directory.as_ref().to_path_buf();
        fs::create_dir_all(&directory)?;
        Ok(Self { directory })
    }

    /// The directory records are kept in.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Persist a fresh record. Never overwrites an earlier one: a name
    /// collision (two saves within the same second) gets a numeric suffix.
    ///
    /// Returns the path of the written file.
    pub fn save(&self, record: &TaskRecord) -> Result<PathBuf, ReelError> {
        let unix_ts = record.submit_time.timestamp();
        let base = match &record.task_id {
            Some(task_id) => format!("task_{task_id}_{unix_ts}"),
            None => format!("task_sync_{unix_ts}"),
        };
        let mut path = self.directory.join(format!("{base}.json"));
        let mut attempt = 1_u32;
        while path.exists() {
            path = self.directory.join(format!("{base}_{attempt}.json"));
            attempt += 1;
        }
        self.write_record(&path, record)?;
        log::info!("Saved task record {}", path.display());
        Ok(path)
    }

    /// Persist the terminal result for a task under a deterministic name.
    ///
    /// Saving the same result twice rewrites an identical file, so polling a
    /// finished task repeatedly is harmless.
    pub fn save_result(&self, record: &TaskRecord) -> Result<PathBuf, ReelError> {
        let name = match &record.task_id {
            Some(task_id) => format!("task_{task_id}_result.json"),
            None => format!("task_sync_{}.json", record.submit_time.timestamp()),
        };
        let path = self.directory.join(name);
        self.write_record(&path, record)?;
        log::debug!("Saved task result {}", path.display());
        Ok(path)
    }

    /// Look up the newest record for a task id, preferring the result file.
    ///
    /// Returns `Ok(None)` when no record mentions the id.
    pub fn find(&self, task_id: &str) -> Result<Option<TaskRecord>, ReelError> {
        let result_path = self.directory.join(format!("task_{task_id}_result.json"));
        if result_path.is_file() {
            if let Some(record) = read_record(&result_path) {
                return Ok(Some(record));
            }
        }

        let mut newest: Option<(SystemTime, TaskRecord)> = None;
        for (path, modified) in self.record_files()? {
            let Some(record) = read_record(&path) else {
                continue;
            };
            if record.task_id.as_deref() != Some(task_id) {
                continue;
            }
            let newer = newest
                .as_ref()
                .is_none_or(|(best, _)| modified > *best);
            if newer {
                newest = Some((modified, record));
            }
        }
        Ok(newest.map(|(_, record)| record))
    }

    /// The most recently written records, newest first.
    ///
    /// Ordered by file modification time. Malformed record files are skipped,
    /// not errors — a corrupt record must not hide the healthy ones.
    pub fn list_recent(&self, limit: usize) -> Result<Vec<TaskSummary>, ReelError> {
        let mut entries = self.record_files()?;
        entries.sort_by(|a, b| b.1.cmp(&a.1));

        let mut summaries = Vec::new();
        for (path, _) in entries {
            if summaries.len() >= limit {
                break;
            }
            let Some(record) = read_record(&path) else {
                log::warn!("Skipping malformed task record {}", path.display());
                continue;
            };
            summaries.push(TaskSummary {
                task_id: record.task_id,
                status: record.status,
                submit_time: record.submit_time,
                model: record.model,
            });
        }
        Ok(summaries)
    }

    fn record_files(&self) -> Result<Vec<(PathBuf, SystemTime)>, ReelError> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.directory)? {
            let entry = entry?;
            let path = entry.path();
            let is_record = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("task_") && n.ends_with(".json"));
            if !is_record || !path.is_file() {
                continue;
            }
            let modified = entry
                .metadata()?
                .modified()
                .unwrap_or(SystemTime::UNIX_EPOCH);
            files.push((path, modified));
        }
        Ok(files)
    }

    fn write_record(&self, path: &Path, record: &TaskRecord) -> Result<(), ReelError> {
        let json = serde_json::to_string_pretty(record)?;
        fs::write(path, json)?;
        Ok(())
    }
}

fn read_record(path: &Path) -> Option<TaskRecord> {
    let contents = fs::read_to_string(path).ok()?;
    serde_json::from_str(&contents).ok()
}
