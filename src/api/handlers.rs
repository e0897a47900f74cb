use crate::api::ApiContext;
use crate::api::responses::{
    ErrorCode, ErrorResponse, HealthStatus, HealthSuccessResponse, ReportPendingResponse,
    ReportState, TriggerSuccessResponse,
};
use crate::output::OutputError;
use crate::pipeline::spawn_report_run;
use crate::state::RunStatus;
use crate::uptime::observation::StoreId;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::SystemTime;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::error;

const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";
const TRIGGER_MESSAGE: &str = "Task submitted in the background";
const REPORT_FILENAME: &str = "data.csv";

#[derive(Debug)]
enum TimestampError {
    Format(time::error::Format),
}

impl fmt::Display for TimestampError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimestampError::Format(err) => write!(f, "timestamp format error: {err}"),
        }
    }
}

pub enum TriggerResponse {
    Accepted(TriggerSuccessResponse),
    Error {
        status: StatusCode,
        body: ErrorResponse,
    },
}

impl IntoResponse for TriggerResponse {
    fn into_response(self) -> Response {
        match self {
            TriggerResponse::Accepted(body) => (StatusCode::ACCEPTED, Json(body)).into_response(),
            TriggerResponse::Error { status, body } => (status, Json(body)).into_response(),
        }
    }
}

pub async fn trigger_report(State(context): State<ApiContext>) -> impl IntoResponse {
    build_trigger_response(&context, SystemTime::now())
}

pub enum ReportResponse {
    Csv(Vec<u8>),
    Pending {
        status: StatusCode,
        body: ReportPendingResponse,
    },
    Error {
        status: StatusCode,
        body: ErrorResponse,
    },
}

impl IntoResponse for ReportResponse {
    fn into_response(self) -> Response {
        match self {
            ReportResponse::Csv(bytes) => (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "text/csv".to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename={REPORT_FILENAME}"),
                    ),
                ],
                bytes,
            )
                .into_response(),
            ReportResponse::Pending { status, body } => (status, Json(body)).into_response(),
            ReportResponse::Error { status, body } => (status, Json(body)).into_response(),
        }
    }
}

pub async fn get_report(State(context): State<ApiContext>) -> impl IntoResponse {
    build_report_response(&context, None, SystemTime::now()).await
}

pub async fn get_store_report(
    State(context): State<ApiContext>,
    Path(store_id): Path<StoreId>,
) -> impl IntoResponse {
    build_report_response(&context, Some(store_id), SystemTime::now()).await
}

pub async fn get_health() -> impl IntoResponse {
    match format_timestamp(SystemTime::now()) {
        Ok(timestamp) => (
            StatusCode::OK,
            Json(HealthSuccessResponse {
                status: HealthStatus::Ok,
                timestamp,
            }),
        )
            .into_response(),
        Err(err) => {
            error!(error = %err, "Failed to format health timestamp");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(internal_error_body())).into_response()
        }
    }
}

fn build_trigger_response(context: &ApiContext, now: SystemTime) -> TriggerResponse {
    let run_id = match spawn_report_run(
        Arc::clone(&context.state),
        Arc::clone(&context.source),
        Arc::clone(&context.settings),
    ) {
        Ok(run_id) => run_id,
        Err(err) => {
            error!(error = %err, "Failed to start report run");
            return trigger_internal_error();
        }
    };

    match format_timestamp(now) {
        Ok(timestamp) => TriggerResponse::Accepted(TriggerSuccessResponse {
            message: TRIGGER_MESSAGE.to_string(),
            run_id,
            timestamp,
        }),
        Err(_) => trigger_internal_error(),
    }
}

fn trigger_internal_error() -> TriggerResponse {
    TriggerResponse::Error {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: internal_error_body(),
    }
}

/// Run status and artifact presence, read together under the state lock.
fn report_snapshot(context: &ApiContext) -> Result<(bool, RunStatus), ReportResponse> {
    // Artifact removal and publication happen under the write lock.
    let guard = context.state.read().map_err(|_| {
        report_internal_error("state lock poisoned while reading run status")
    })?;
    Ok((context.settings.output.exists(), guard.status().clone()))
}

async fn build_report_response(
    context: &ApiContext,
    store_id: Option<StoreId>,
    now: SystemTime,
) -> ReportResponse {
    let (present, mut status) = match report_snapshot(context) {
        Ok(snapshot) => snapshot,
        Err(response) => return response,
    };

    if present {
        let output = context.settings.output.clone();
        match tokio::task::spawn_blocking(move || output.extract(store_id)).await {
            Ok(Ok(bytes)) => return ReportResponse::Csv(bytes),
            Ok(Err(OutputError::Io(err))) if err.kind() == io::ErrorKind::NotFound => {
                // Removed by a newer trigger since the snapshot.
                status = match report_snapshot(context) {
                    Ok((_, status)) => status,
                    Err(response) => return response,
                };
            }
            Ok(Err(err)) => {
                error!(
                    error = %err,
                    path = %context.settings.output.path().display(),
                    "Failed to read report"
                );
                return report_internal_error("report artifact unreadable");
            }
            Err(err) => {
                error!(error = %err, "Report extract task failed");
                return report_internal_error("report extract task failed");
            }
        }
    }

    pending_response(status, now)
}

fn pending_response(status: RunStatus, now: SystemTime) -> ReportResponse {
    let (code, state, run_id, error_message) = match status {
        RunStatus::Idle => (StatusCode::NOT_FOUND, ReportState::NotTriggered, None, None),
        RunStatus::Running { run_id, .. } => {
            (StatusCode::ACCEPTED, ReportState::Running, Some(run_id), None)
        }
        RunStatus::Failed { run_id, reason, .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ReportState::Failed,
            Some(run_id),
            Some(reason),
        ),
        RunStatus::Completed { .. } => {
            return report_internal_error("run completed but report artifact is missing");
        }
    };

    match format_timestamp(now) {
        Ok(timestamp) => ReportResponse::Pending {
            status: code,
            body: ReportPendingResponse {
                status: state,
                run_id,
                error_message,
                timestamp,
            },
        },
        Err(_) => report_internal_error("timestamp formatting failure"),
    }
}

fn report_internal_error(message: &str) -> ReportResponse {
    error!(
        message = message,
        "Internal error while handling /get_report"
    );
    ReportResponse::Error {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: internal_error_body(),
    }
}

fn internal_error_body() -> ErrorResponse {
    let formatted = format_timestamp(SystemTime::now()).unwrap_or_else(|err| {
        error!(error = %err, "Failed to format internal error timestamp");
        OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
    });
    ErrorResponse {
        error_code: ErrorCode::InternalError,
        error_message: INTERNAL_ERROR_MESSAGE.to_string(),
        timestamp: formatted,
    }
}

fn format_timestamp(timestamp: SystemTime) -> Result<String, TimestampError> {
    let datetime = OffsetDateTime::from(timestamp);
    datetime.format(&Rfc3339).map_err(TimestampError::Format)
}
