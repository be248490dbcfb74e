use crate::api::responses::{
    ErrorCode, ErrorResponse, ReportRunningResponse, TriggerSuccessResponse, WelcomeResponse,
};
use crate::model::JobStatus;
use crate::report::{PollOutcome, ReportService};
use axum::Json;
use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use jiff::Timestamp;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info};

const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

pub async fn get_root() -> Json<WelcomeResponse> {
    Json(WelcomeResponse {
        message: "Welcome to the store uptime report API".to_string(),
    })
}

pub enum TriggerResponse {
    Success(TriggerSuccessResponse),
    Error {
        status: StatusCode,
        body: ErrorResponse,
    },
}

impl IntoResponse for TriggerResponse {
    fn into_response(self) -> Response {
        match self {
            TriggerResponse::Success(body) => (StatusCode::OK, Json(body)).into_response(),
            TriggerResponse::Error { status, body } => (status, Json(body)).into_response(),
        }
    }
}

pub async fn trigger_report(State(service): State<Arc<ReportService>>) -> impl IntoResponse {
    build_trigger_response(&service, Timestamp::now())
}

fn build_trigger_response(service: &ReportService, now: Timestamp) -> TriggerResponse {
    match service.trigger() {
        Ok(report_id) => TriggerResponse::Success(TriggerSuccessResponse { report_id }),
        Err(err) => {
            error!(error = %err, "Failed to trigger report generation");
            TriggerResponse::Error {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                body: error_body(ErrorCode::InternalError, INTERNAL_ERROR_MESSAGE, now),
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub report_id: String,
}

pub enum ReportResponse {
    Running(ReportRunningResponse),
    Artifact {
        report_id: String,
        body: Vec<u8>,
    },
    Error {
        status: StatusCode,
        body: ErrorResponse,
    },
}

impl IntoResponse for ReportResponse {
    fn into_response(self) -> Response {
        match self {
            ReportResponse::Running(body) => (StatusCode::OK, Json(body)).into_response(),
            ReportResponse::Artifact { report_id, body } => {
                let disposition = format!("attachment; filename=\"report_{report_id}.csv\"");
                (
                    StatusCode::OK,
                    [
                        (header::CONTENT_TYPE, "text/csv".to_string()),
                        (header::CONTENT_DISPOSITION, disposition),
                    ],
                    body,
                )
                    .into_response()
            }
            ReportResponse::Error { status, body } => (status, Json(body)).into_response(),
        }
    }
}

pub async fn get_report(
    State(service): State<Arc<ReportService>>,
    Query(query): Query<ReportQuery>,
) -> impl IntoResponse {
    build_report_response(&service, &query.report_id, Timestamp::now()).await
}

async fn build_report_response(
    service: &ReportService,
    report_id: &str,
    now: Timestamp,
) -> ReportResponse {
    match service.poll(report_id) {
        PollOutcome::Running => ReportResponse::Running(ReportRunningResponse {
            status: JobStatus::Running,
        }),
        PollOutcome::Ready(path) => match tokio::fs::read(&path).await {
            Ok(body) => {
                info!(report_id, "Serving completed report");
                ReportResponse::Artifact {
                    report_id: report_id.to_string(),
                    body,
                }
            }
            Err(err) => {
                error!(report_id, path = %path.display(), error = %err, "Failed to read report file");
                artifact_missing(now)
            }
        },
        PollOutcome::ArtifactMissing(_) => artifact_missing(now),
        PollOutcome::Failed => ReportResponse::Error {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: error_body(
                ErrorCode::ReportFailed,
                "An error occurred during report generation",
                now,
            ),
        },
        PollOutcome::NotFound => ReportResponse::Error {
            status: StatusCode::NOT_FOUND,
            body: error_body(
                ErrorCode::ReportNotFound,
                &format!("Report with ID {report_id} not found"),
                now,
            ),
        },
    }
}

fn artifact_missing(now: Timestamp) -> ReportResponse {
    ReportResponse::Error {
        status: StatusCode::NOT_FOUND,
        body: error_body(ErrorCode::ArtifactMissing, "Report file not found", now),
    }
}

fn error_body(error_code: ErrorCode, message: &str, now: Timestamp) -> ErrorResponse {
    ErrorResponse {
        error_code,
        error_message: message.to_string(),
        timestamp: now.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{ReportQueue, ReportTask};
    use crate::store::{JobRegistry, MemoryJobRegistry};
    use std::fs;
    use std::path::Path;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn now() -> Timestamp {
        "1970-01-01T00:00:01Z".parse().expect("valid timestamp")
    }

    fn service(
        output_dir: &Path,
    ) -> (
        ReportService,
        Arc<MemoryJobRegistry>,
        UnboundedReceiver<ReportTask>,
    ) {
        let registry = Arc::new(MemoryJobRegistry::new());
        let (queue, rx) = ReportQueue::channel();
        let service = ReportService::new(registry.clone(), queue, output_dir.to_path_buf());
        (service, registry, rx)
    }

    fn expect_error(response: ReportResponse) -> (StatusCode, ErrorResponse) {
        match response {
            ReportResponse::Error { status, body } => (status, body),
            ReportResponse::Running(_) => panic!("expected error response, got running"),
            ReportResponse::Artifact { .. } => panic!("expected error response, got artifact"),
        }
    }

    #[test]
    fn trigger_returns_report_id() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let (service, registry, _rx) = service(dir.path());

        match build_trigger_response(&service, now()) {
            TriggerResponse::Success(body) => {
                let job = registry
                    .get_job(&body.report_id)
                    .expect("read registry")
                    .expect("job exists");
                assert_eq!(job.status, JobStatus::Running);
            }
            TriggerResponse::Error { status, .. } => {
                panic!("expected success response, got error: {status}");
            }
        }
    }

    #[test]
    fn trigger_returns_internal_error_when_queue_closed() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let (service, _registry, rx) = service(dir.path());
        drop(rx);

        match build_trigger_response(&service, now()) {
            TriggerResponse::Error { status, body } => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(body.error_code, ErrorCode::InternalError);
                assert_eq!(body.error_message, "Internal server error");
                assert_eq!(body.timestamp, "1970-01-01T00:00:01Z");
            }
            TriggerResponse::Success(_) => panic!("expected internal error response"),
        }
    }

    #[tokio::test]
    async fn report_handler_returns_running() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let (service, registry, _rx) = service(dir.path());
        registry.create_job("r1").expect("create job");

        match build_report_response(&service, "r1", now()).await {
            ReportResponse::Running(body) => assert_eq!(body.status, JobStatus::Running),
            _ => panic!("expected running response"),
        }
    }

    #[tokio::test]
    async fn report_handler_returns_not_found_for_unknown_id() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let (service, _registry, _rx) = service(dir.path());

        let (status, body) = expect_error(build_report_response(&service, "nope", now()).await);

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.error_code, ErrorCode::ReportNotFound);
        assert_eq!(body.error_message, "Report with ID nope not found");
    }

    #[tokio::test]
    async fn report_handler_returns_failed_for_error_job() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let (service, registry, _rx) = service(dir.path());
        registry.create_job("r1").expect("create job");
        registry.set_job_error("r1").expect("mark error");

        let (status, body) = expect_error(build_report_response(&service, "r1", now()).await);

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error_code, ErrorCode::ReportFailed);
    }

    #[tokio::test]
    async fn report_handler_distinguishes_missing_artifact() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let (service, registry, _rx) = service(dir.path());
        registry.create_job("r1").expect("create job");
        registry.set_job_complete("r1").expect("mark complete");

        let (status, body) = expect_error(build_report_response(&service, "r1", now()).await);

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.error_code, ErrorCode::ArtifactMissing);
    }

    #[tokio::test]
    async fn report_handler_serves_artifact_bytes() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let (service, registry, _rx) = service(dir.path());
        registry.create_job("r1").expect("create job");
        fs::write(dir.path().join("r1.csv"), "store_id\ns1\n").expect("write artifact");
        registry.set_job_complete("r1").expect("mark complete");

        let response = build_report_response(&service, "r1", now()).await;
        match &response {
            ReportResponse::Artifact { report_id, body } => {
                assert_eq!(report_id, "r1");
                assert_eq!(body.as_slice(), b"store_id\ns1\n");
            }
            _ => panic!("expected artifact response"),
        }

        let http = response.into_response();
        assert_eq!(http.status(), StatusCode::OK);
        assert_eq!(
            http.headers().get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()),
            Some("text/csv")
        );
        assert_eq!(
            http.headers()
                .get(header::CONTENT_DISPOSITION)
                .and_then(|v| v.to_str().ok()),
            Some("attachment; filename=\"report_r1.csv\"")
        );
    }
}
