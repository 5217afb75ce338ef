#![cfg(feature = "web")]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use chrono::{Duration, Utc};
use lasa::app::{AppState, router};
use lasa::clock::TimeSource;
use lasa::clock::mock::{FixedTime, UnreachableTime};
use lasa::{ExternalCommand, Gate, JobRegistry, WorkflowRunner, XLSX_MIME};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "lasa-test-boundary";

fn sh(script: &str) -> ExternalCommand {
    ExternalCommand::new("sh").arg("-c").arg(script).arg("stub")
}

struct TestApp {
    router: Router,
    _dir: TempDir,
}

impl TestApp {
    fn with(source: Arc<dyn TimeSource>, expires_in: Duration, separation: ExternalCommand) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState {
            gate: Gate::new(Utc::now() + expires_in, source),
            runner: WorkflowRunner::new(
                dir.path().join("uploads"),
                dir.path().join("jobs"),
                None,
                Arc::new(JobRegistry::new()),
            ),
            separation,
            integration: sh("cat \"$1\" \"$2\" > liste_circuit_integre.xlsx"),
            static_dir: PathBuf::from("static"),
            max_upload_bytes: 1024 * 1024,
        };
        TestApp {
            router: router(Arc::new(state)),
            _dir: dir,
        }
    }

    /// Gate open, remote clock answering "now".
    fn open(separation: ExternalCommand) -> Self {
        Self::with(Arc::new(FixedTime(Utc::now())), Duration::days(1), separation)
    }

    fn expired() -> Self {
        Self::with(
            Arc::new(FixedTime(Utc::now())),
            -Duration::days(1),
            sh("exit 0"),
        )
    }

    async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    async fn get(&self, uri: &str) -> Response {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    async fn post_files(&self, uri: &str, parts: &[(&str, &str, &str)]) -> Response {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(multipart_body(parts)))
            .unwrap();
        self.send(request).await
    }
}

fn touch_marker(marker: &Path) -> ExternalCommand {
    sh(&format!("touch '{}'", marker.display()))
}

/// `(field, file name, content)`; an empty file name mimics an untouched file input.
fn multipart_body(parts: &[(&str, &str, &str)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (field, file_name, content) in parts {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                BOUNDARY, field, file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(content.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

async fn body_bytes(response: Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

async fn body_text(response: Response) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

#[tokio::test]
async fn open_gate_renders_welcome_and_forms() {
    let app = TestApp::open(sh("exit 0"));

    let response = app.get("/").await;
    assert_eq!(response.status(), StatusCode::OK);

    let page = body_text(response).await;
    assert!(page.contains("Welcome to the application!"));
    assert!(page.contains("id=\"separate-form\""));
    assert!(page.contains("id=\"integrate-form\""));
    assert!(!page.contains("Error fetching time"));
}

#[tokio::test]
async fn expired_gate_hides_every_control() {
    let app = TestApp::expired();

    let page = body_text(app.get("/").await).await;
    assert!(page.contains("Thank you for your visit."));
    assert!(!page.contains("<form"));

    let response = app
        .post_files("/api/separate", &[("mmsta", "MMSTA.csv", "a")])
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["message"], "Thank you for your visit.");
}

#[tokio::test]
async fn clock_failure_falls_back_with_warning() {
    let app = TestApp::with(Arc::new(UnreachableTime), Duration::days(1), sh("exit 0"));

    let page = body_text(app.get("/").await).await;
    assert!(page.contains("Error fetching time:"));
    assert!(page.contains("Using local system time."));
    assert!(page.contains("Welcome to the application!"));
}

#[tokio::test]
async fn clock_failure_still_enforces_expiry() {
    let app = TestApp::with(Arc::new(UnreachableTime), -Duration::days(1), sh("exit 0"));

    let page = body_text(app.get("/").await).await;
    assert!(page.contains("Thank you for your visit."));
    assert!(!page.contains("<form"));
}

#[tokio::test]
async fn separate_without_file_is_rejected_before_launch() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("launched");
    let app = TestApp::open(touch_marker(&marker));

    let response = app.post_files("/api/separate", &[("mmsta", "", "")]).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["status"], "error");
    assert_eq!(json["message"], "Please upload the MMSTA file.");
    assert!(json.get("download").is_none());
    assert!(!marker.exists());
}

#[tokio::test]
async fn separate_success_offers_download() {
    let app = TestApp::open(sh("printf 'xlsx bytes' > MMSTA_separe.xlsx"));

    let response = app
        .post_files("/api/separate", &[("mmsta", "MMSTA.xlsx", "PK\x03\x04")])
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["message"], "Separation completed successfully!");
    assert_eq!(json["download"]["file_name"], "MMSTA_separe.xlsx");
    assert_eq!(json["download"]["mime"], XLSX_MIME);
    assert_eq!(json["download"]["label"], "Download the separated Excel file");

    let url = json["download"]["url"].as_str().unwrap().to_string();
    let download = app.get(&url).await;
    assert_eq!(download.status(), StatusCode::OK);
    assert_eq!(download.headers()[header::CONTENT_TYPE], XLSX_MIME);
    assert_eq!(
        download.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"MMSTA_separe.xlsx\""
    );
    assert_eq!(body_bytes(download).await, b"xlsx bytes");

    let job_id = json["job_id"].as_str().unwrap();
    let status = body_json(app.get(&format!("/api/jobs/{}", job_id)).await).await;
    assert_eq!(status["state"], "succeeded");
    assert_eq!(status["kind"], "separate");
}

#[tokio::test]
async fn separate_failure_surfaces_stderr() {
    let app = TestApp::open(sh("echo 'bad format' >&2; exit 1"));

    let response = app
        .post_files("/api/separate", &[("mmsta", "MMSTA.csv", "garbage")])
        .await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let json = body_json(response).await;
    assert_eq!(json["status"], "error");
    assert!(json["message"].as_str().unwrap().contains("bad format"));
    assert!(json.get("download").is_none());

    let job_id = json["job_id"].as_str().unwrap();
    let download = app.get(&format!("/api/jobs/{}/download", job_id)).await;
    assert_eq!(download.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn separate_without_output_reports_generation_error() {
    let app = TestApp::open(sh("exit 0"));

    let response = app
        .post_files("/api/separate", &[("mmsta", "MMSTA.csv", "a;b")])
        .await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(
        body_json(response).await["message"],
        "Error generating the Excel file."
    );
}

#[tokio::test]
async fn integrate_with_one_file_is_rejected() {
    let app = TestApp::open(sh("exit 0"));

    let response = app
        .post_files(
            "/api/integrate",
            &[("mmsta_separe", "MMSTA_separe.xlsx", "PK"), ("circuit", "", "")],
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await["message"],
        "Please upload both the separated MMSTA file and the Circuit List."
    );
}

#[tokio::test]
async fn integrate_success_offers_integrated_workbook() {
    let app = TestApp::open(sh("exit 0"));

    let response = app
        .post_files(
            "/api/integrate",
            &[
                ("mmsta_separe", "MMSTA_separe.xlsx", "left|"),
                ("circuit", "circuits.csv", "right"),
            ],
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["message"], "Integration completed successfully!");
    assert_eq!(json["download"]["file_name"], "liste_circuit_integre.xlsx");

    let url = json["download"]["url"].as_str().unwrap().to_string();
    assert_eq!(body_bytes(app.get(&url).await).await, b"left|right");
}

#[tokio::test]
async fn unknown_jobs_are_not_found() {
    let app = TestApp::open(sh("exit 0"));
    let id = uuid::Uuid::new_v4();

    let status = app.get(&format!("/api/jobs/{}", id)).await;
    assert_eq!(status.status(), StatusCode::NOT_FOUND);

    let download = app.get(&format!("/api/jobs/{}/download", id)).await;
    assert_eq!(download.status(), StatusCode::NOT_FOUND);
}
