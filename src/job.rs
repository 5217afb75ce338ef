use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use log::info;
use serde::Serialize;
use uuid::Uuid;

use crate::workflow::WorkflowKind;

pub type JobId = Uuid;

/// Lifecycle of one workflow trigger. `Idle` is simply "no job yet".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Uploading,
    Invoking,
    Succeeded,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub id: JobId,
    pub kind: WorkflowKind,
    pub state: JobState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub message: Option<String>,
    /// Output file, set only once the job has succeeded.
    #[serde(skip)]
    pub artifact: Option<PathBuf>,
}

/// In-memory table of every job started since the process came up.
#[derive(Default)]
pub struct JobRegistry {
    jobs: Mutex<HashMap<JobId, JobRecord>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, kind: WorkflowKind) -> JobId {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let record = JobRecord {
            id,
            kind,
            state: JobState::Uploading,
            created_at: now,
            updated_at: now,
            message: None,
            artifact: None,
        };

        self.jobs.lock().unwrap().insert(id, record);
        info!("job {} ({}) created", id, kind.activity());
        id
    }

    pub fn get(&self, id: JobId) -> Option<JobRecord> {
        self.jobs.lock().unwrap().get(&id).cloned()
    }

    /// Move a job to `state`. Terminal jobs are never moved again.
    pub fn advance(&self, id: JobId, state: JobState) {
        self.update(id, |record| record.state = state);
    }

    pub fn succeed(&self, id: JobId, artifact: PathBuf, message: &str) {
        self.update(id, |record| {
            record.state = JobState::Succeeded;
            record.artifact = Some(artifact);
            record.message = Some(message.to_string());
        });
    }

    pub fn fail(&self, id: JobId, message: String) {
        self.update(id, |record| {
            record.state = JobState::Failed;
            record.message = Some(message);
        });
    }

    fn update(&self, id: JobId, apply: impl FnOnce(&mut JobRecord)) {
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(record) = jobs.get_mut(&id) {
            if record.state.is_terminal() {
                return;
            }
            apply(record);
            record.updated_at = Utc::now();
            info!("job {} -> {:?}", id, record.state);
        }
    }
}
