use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Request, State, multipart::MultipartError},
    http::StatusCode,
    middleware::{self, Next},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use log::{error, info};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;

use crate::clock::WorldTimeApi;
use crate::config::Config;
use crate::downloader;
use crate::error::{InvokeError, TimeError, WorkflowError};
use crate::gate::{EXPIRED_MESSAGE, Gate, GateCheck};
use crate::invoker::ExternalCommand;
use crate::job::{JobId, JobRegistry, JobState};
use crate::upload::UploadedFile;
use crate::workflow::{Completed, WorkflowKind, WorkflowRunner, XLSX_MIME};

const INDEX_TEMPLATE: &str = include_str!("./static/index.html");
const EXPIRED_TEMPLATE: &str = include_str!("./static/expired.html");

pub struct AppState {
    pub gate: Gate,
    pub runner: WorkflowRunner,
    pub separation: ExternalCommand,
    pub integration: ExternalCommand,
    pub static_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn from_config(config: &Config) -> Result<Self, TimeError> {
        let clock = WorldTimeApi::new(config.time_url.clone(), config.time_timeout())?;
        let runner = WorkflowRunner::new(
            config.uploads_dir.clone(),
            config.jobs_dir.clone(),
            config.process_timeout(),
            Arc::new(JobRegistry::new()),
        );

        Ok(AppState {
            gate: Gate::new(config.expires_at, Arc::new(clock)),
            runner,
            separation: config.separation_cmd.clone(),
            integration: config.integration_cmd.clone(),
            static_dir: config.static_dir.clone(),
            max_upload_bytes: config.max_upload_bytes(),
        })
    }

    fn command(&self, kind: WorkflowKind) -> &ExternalCommand {
        match kind {
            WorkflowKind::Separate => &self.separation,
            WorkflowKind::Integrate => &self.integration,
        }
    }
}

#[derive(Serialize)]
struct DownloadOffer {
    url: String,
    file_name: &'static str,
    mime: &'static str,
    label: &'static str,
}

#[derive(Serialize)]
struct WorkflowResponse {
    status: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    job_id: Option<JobId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    download: Option<DownloadOffer>,
}

impl WorkflowResponse {
    fn error(message: impl Into<String>, job_id: Option<JobId>) -> Self {
        WorkflowResponse {
            status: "error".to_string(),
            message: message.into(),
            job_id,
            download: None,
        }
    }

    fn completed(completed: &Completed) -> Self {
        let kind = completed.kind;
        WorkflowResponse {
            status: "ok".to_string(),
            message: kind.success_message().to_string(),
            job_id: Some(completed.job),
            download: Some(DownloadOffer {
                url: format!("/api/jobs/{}/download", completed.job),
                file_name: kind.output_file(),
                mime: XLSX_MIME,
                label: kind.download_label(),
            }),
        }
    }
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(WorkflowResponse::error(message, None))).into_response()
}

/// Build the router. Workflow endpoints sit behind the expiration gate.
pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/api/separate", post(separate))
        .route("/api/integrate", post(integrate))
        .route("/api/jobs/:id", get(job_status))
        .route("/api/jobs/:id/download", get(download_artifact))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_open_gate,
        ));

    Router::new()
        .route("/", get(serve_index))
        .merge(api)
        .nest_service("/static", ServeDir::new(&state.static_dir))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(state.max_upload_bytes))
        .with_state(state)
}

pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let state = Arc::new(AppState::from_config(&config)?);
    info!(
        "service expires at {}, separation `{}`, integration `{}`",
        state.gate.expires_at(),
        state.separation,
        state.integration
    );

    let app = router(state);

    // Start server
    let listener = TcpListener::bind(config.bind).await?;
    info!("Listening on http://{}", config.bind);
    axum::serve(listener, app).await?;

    Ok(())
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn render_page(check: &GateCheck) -> String {
    let template = if check.is_open() {
        INDEX_TEMPLATE
    } else {
        EXPIRED_TEMPLATE
    };
    let warning = check
        .warning
        .as_deref()
        .map(|w| format!("<div class=\"alert warning\">{}</div>", escape_html(w)))
        .unwrap_or_default();

    template
        .replace("{{WARNING}}", &warning)
        .replace("{{MESSAGE}}", check.message())
}

async fn serve_index(State(state): State<Arc<AppState>>) -> Html<String> {
    let check = state.gate.check().await;
    Html(render_page(&check))
}

async fn require_open_gate(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    if state.gate.check().await.is_open() {
        return next.run(request).await;
    }
    error_response(StatusCode::FORBIDDEN, EXPIRED_MESSAGE)
}

/// Collect file fields by form name. Parts without a file name are what
/// browsers send for an empty file input, so they count as not supplied.
async fn collect_uploads(
    mut multipart: Multipart,
) -> Result<HashMap<String, UploadedFile>, MultipartError> {
    let mut uploads = HashMap::new();

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        let file_name = field.file_name().unwrap_or_default().to_string();
        let content = field.bytes().await?;

        if !file_name.is_empty() {
            uploads.insert(name, UploadedFile::new(file_name, content.to_vec()));
        }
    }

    Ok(uploads)
}

fn status_for(error: &WorkflowError) -> StatusCode {
    match error {
        WorkflowError::MissingInput(_) | WorkflowError::InvalidFileName(_) => {
            StatusCode::BAD_REQUEST
        }
        WorkflowError::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        WorkflowError::Invoke {
            source: InvokeError::TimedOut(_),
            ..
        } => StatusCode::GATEWAY_TIMEOUT,
        WorkflowError::Invoke { .. }
        | WorkflowError::ProcessFailed { .. }
        | WorkflowError::MissingArtifact(_) => StatusCode::BAD_GATEWAY,
    }
}

async fn trigger(state: &AppState, kind: WorkflowKind, multipart: Multipart) -> Response {
    let mut uploads = match collect_uploads(multipart).await {
        Ok(uploads) => uploads,
        Err(e) => {
            return error_response(StatusCode::BAD_REQUEST, format!("Invalid upload: {}", e));
        }
    };

    let inputs = kind
        .input_fields()
        .iter()
        .map(|field| uploads.remove(*field))
        .collect();

    match state.runner.run(kind, state.command(kind), inputs).await {
        Ok(completed) => Json(WorkflowResponse::completed(&completed)).into_response(),
        Err(failed) => (
            status_for(&failed.error),
            Json(WorkflowResponse::error(failed.error.to_string(), failed.job)),
        )
            .into_response(),
    }
}

async fn separate(State(state): State<Arc<AppState>>, multipart: Multipart) -> Response {
    trigger(&state, WorkflowKind::Separate, multipart).await
}

async fn integrate(State(state): State<Arc<AppState>>, multipart: Multipart) -> Response {
    trigger(&state, WorkflowKind::Integrate, multipart).await
}

async fn job_status(Path(id): Path<JobId>, State(state): State<Arc<AppState>>) -> Response {
    match state.runner.registry().get(id) {
        Some(record) => Json(record).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "Unknown job"),
    }
}

async fn download_artifact(
    Path(id): Path<JobId>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let Some(record) = state.runner.registry().get(id) else {
        return error_response(StatusCode::NOT_FOUND, "Unknown job");
    };
    let (JobState::Succeeded, Some(path)) = (record.state, record.artifact) else {
        return error_response(StatusCode::CONFLICT, "No file is available for this job");
    };

    match downloader::read_artifact(&path).await {
        Ok(Some(bytes)) => downloader::attachment(record.kind.output_file(), bytes),
        Ok(None) => error_response(StatusCode::NOT_FOUND, record.kind.generation_error_message()),
        Err(e) => {
            error!("failed to read {}: {}", path.display(), e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to read the generated file")
        }
    }
}
