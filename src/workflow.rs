//! The upload → invoke → serve pattern shared by both workflows.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use serde::Serialize;

use crate::error::WorkflowError;
use crate::invoker::{self, ExternalCommand};
use crate::job::{JobId, JobRegistry, JobState};
use crate::upload::UploadedFile;

/// MIME type of the generated `.xlsx` workbooks.
pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowKind {
    /// Split an MMSTA export into its separated workbook.
    Separate,
    /// Merge a separated MMSTA workbook with a circuit list.
    Integrate,
}

impl WorkflowKind {
    pub fn activity(self) -> &'static str {
        match self {
            WorkflowKind::Separate => "separation",
            WorkflowKind::Integrate => "integration",
        }
    }

    /// Multipart field names, in the order their paths are passed to the process.
    pub fn input_fields(self) -> &'static [&'static str] {
        match self {
            WorkflowKind::Separate => &["mmsta"],
            WorkflowKind::Integrate => &["mmsta_separe", "circuit"],
        }
    }

    /// File the external process is expected to write into its working directory.
    pub fn output_file(self) -> &'static str {
        match self {
            WorkflowKind::Separate => "MMSTA_separe.xlsx",
            WorkflowKind::Integrate => "liste_circuit_integre.xlsx",
        }
    }

    pub fn missing_input_message(self) -> &'static str {
        match self {
            WorkflowKind::Separate => "Please upload the MMSTA file.",
            WorkflowKind::Integrate => {
                "Please upload both the separated MMSTA file and the Circuit List."
            }
        }
    }

    pub fn generation_error_message(self) -> &'static str {
        match self {
            WorkflowKind::Separate => "Error generating the Excel file.",
            WorkflowKind::Integrate => "Error generating the integrated Excel file.",
        }
    }

    pub fn success_message(self) -> &'static str {
        match self {
            WorkflowKind::Separate => "Separation completed successfully!",
            WorkflowKind::Integrate => "Integration completed successfully!",
        }
    }

    pub fn download_label(self) -> &'static str {
        match self {
            WorkflowKind::Separate => "Download the separated Excel file",
            WorkflowKind::Integrate => "Download the integrated Excel file",
        }
    }
}

/// A workflow run that produced its output file.
#[derive(Debug, Clone)]
pub struct Completed {
    pub job: JobId,
    pub kind: WorkflowKind,
    pub artifact: PathBuf,
}

/// A workflow run that ended without output. `job` is `None` when the
/// trigger was rejected before a job was created.
#[derive(Debug)]
pub struct Failed {
    pub job: Option<JobId>,
    pub error: WorkflowError,
}

/// Runs workflows, scoping every job's files under its own id:
/// inputs in `<uploads>/<id>/`, process working directory `<jobs>/<id>/`.
pub struct WorkflowRunner {
    uploads_dir: PathBuf,
    jobs_dir: PathBuf,
    timeout: Option<Duration>,
    registry: Arc<JobRegistry>,
}

impl WorkflowRunner {
    pub fn new(
        uploads_dir: impl Into<PathBuf>,
        jobs_dir: impl Into<PathBuf>,
        timeout: Option<Duration>,
        registry: Arc<JobRegistry>,
    ) -> Self {
        Self {
            uploads_dir: uploads_dir.into(),
            jobs_dir: jobs_dir.into(),
            timeout,
            registry,
        }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Run one trigger of `kind`. `inputs` holds one slot per
    /// [`WorkflowKind::input_fields`] entry; an empty slot means the user
    /// supplied no file and nothing is launched.
    pub async fn run(
        &self,
        kind: WorkflowKind,
        command: &ExternalCommand,
        inputs: Vec<Option<UploadedFile>>,
    ) -> Result<Completed, Failed> {
        let files = match inputs.into_iter().collect::<Option<Vec<_>>>() {
            Some(files) if files.len() == kind.input_fields().len() => files,
            _ => {
                return Err(Failed {
                    job: None,
                    error: WorkflowError::MissingInput(kind),
                });
            }
        };

        let job = self.registry.create(kind);
        match self.execute(job, kind, command, &files).await {
            Ok(artifact) => {
                info!("job {} produced {}", job, artifact.display());
                self.registry
                    .succeed(job, artifact.clone(), kind.success_message());
                Ok(Completed {
                    job,
                    kind,
                    artifact,
                })
            }
            Err(error) => {
                warn!("job {} failed: {}", job, error);
                self.registry.fail(job, error.to_string());
                Err(Failed {
                    job: Some(job),
                    error,
                })
            }
        }
    }

    async fn execute(
        &self,
        job: JobId,
        kind: WorkflowKind,
        command: &ExternalCommand,
        files: &[UploadedFile],
    ) -> Result<PathBuf, WorkflowError> {
        let upload_dir = self.uploads_dir.join(job.to_string());
        let mut paths = Vec::with_capacity(files.len());
        for file in files {
            paths.push(file.persist(&upload_dir).await?);
        }

        let work_dir = self.jobs_dir.join(job.to_string());
        tokio::fs::create_dir_all(&work_dir)
            .await
            .map_err(|e| WorkflowError::storage(&work_dir, e))?;

        self.registry.advance(job, JobState::Invoking);
        let result = invoker::invoke(command, &paths, &work_dir, self.timeout)
            .await
            .map_err(|source| WorkflowError::Invoke { kind, source })?;

        if !result.success() {
            return Err(WorkflowError::ProcessFailed {
                kind,
                exit_code: result.exit_code,
                stderr: result.stderr,
            });
        }

        let artifact = work_dir.join(kind.output_file());
        if is_file(&artifact).await {
            Ok(artifact)
        } else {
            Err(WorkflowError::MissingArtifact(kind))
        }
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}
