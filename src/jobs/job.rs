use serde::Serialize;
use std::fmt;

/// Progress added per ramp tick while the encoder runs.
pub const PROGRESS_STEP: f32 = 0.03;
/// The ramp never reaches 1.0 on its own.
pub const PROGRESS_CAP: f32 = 0.95;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `Queued` is never stored; it only describes ids the table does not know.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,
    /// 0.0..=1.0
    pub progress: f32,
    /// Location of the rendered file, only when completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Diagnostic detail, only when failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Job {
    pub fn running(id: JobId) -> Self {
        Self {
            id,
            status: JobStatus::Running,
            progress: 0.0,
            url: None,
            error: None,
        }
    }

    /// Placeholder returned for ids that are not in the table.
    pub fn queued(id: JobId) -> Self {
        Self {
            status: JobStatus::Queued,
            ..Self::running(id)
        }
    }

    /// One ramp tick. Returns false once the job left `Running`.
    pub fn advance(&mut self) -> bool {
        if self.status != JobStatus::Running {
            return false;
        }
        self.progress = (self.progress + PROGRESS_STEP).min(PROGRESS_CAP);
        true
    }

    /// Returns false if the job already reached a terminal state.
    pub fn complete(&mut self, url: String) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = JobStatus::Completed;
        self.progress = 1.0;
        self.url = Some(url);
        true
    }

    /// Returns false if the job already reached a terminal state.
    pub fn fail(&mut self, error: String) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = JobStatus::Failed;
        self.progress = 1.0;
        self.error = Some(error);
        true
    }
}
