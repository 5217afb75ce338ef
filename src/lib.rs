/*!
# YMM-LASA for Automated Integration

A small browser-based service that runs two external spreadsheet
processing scripts on uploaded files and offers their output for download.

## Overview

The page exposes two workflows built on the same upload → invoke → serve
pattern:

- **Separation**: one MMSTA export (CSV or XLSX) is handed to the
  separation script, which writes `MMSTA_separe.xlsx`.
- **Integration**: a separated MMSTA workbook and a circuit list are handed
  to the integration script, which writes `liste_circuit_integre.xlsx`.

The scripts themselves are external programs. The service only stores the
uploads, launches the process, inspects its exit status and serves the file
it was expected to write.

Each trigger is a job with its own id. Uploads land in
`<uploads>/<job-id>/` and the script runs with `<jobs>/<job-id>/` as its
working directory, so concurrent users never see each other's files.

## Expiration

The whole application is gated on a fixed expiration instant. The current
time is asked from a remote time service on every page render and every API
call; if the service is unreachable the local clock is used and the page
shows a warning.

## Modules

- **config**: command-line / environment settings
- **clock**: remote time source and test doubles
- **gate**: expiration decision
- **upload**: uploaded file persistence
- **invoker**: external process execution with optional timeout
- **job**: in-memory job registry and lifecycle
- **workflow**: the two workflows and their shared runner
- **downloader**: artifact download responses (`web` feature)
- **app**: routing, page rendering and middleware (`web` feature)

## REST API Endpoints

- `GET /` - Page with both workflows, or the expired notice
- `POST /api/separate` - Multipart field `mmsta`
- `POST /api/integrate` - Multipart fields `mmsta_separe` and `circuit`
- `GET /api/jobs/{id}` - Job status
- `GET /api/jobs/{id}/download` - Generated workbook
*/

pub mod clock;
pub mod config;
pub mod error;
pub mod gate;
pub mod invoker;
pub mod job;
pub mod upload;
pub mod workflow;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod downloader;

pub use config::Config;
pub use error::{InvokeError, TimeError, WorkflowError};
pub use gate::{Access, Gate, GateCheck};
pub use invoker::{ExternalCommand, ProcessResult};
pub use job::{JobId, JobRecord, JobRegistry, JobState};
pub use upload::UploadedFile;
pub use workflow::{Completed, Failed, WorkflowKind, WorkflowRunner, XLSX_MIME};
