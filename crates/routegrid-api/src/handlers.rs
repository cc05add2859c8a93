//! REST API handlers.
//!
//! Each handler resolves the tenant from the `x-tenant-id` header, calls
//! into the engines, and maps engine errors onto HTTP statuses:
//! validation 400, not-found 404, conflict 409, illegal transition 403,
//! store failure 500.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;

use route_core::*;
use routegrid_confirm::{ConfirmError, ConfirmRequest};
use routegrid_reassign::{ApplyRequest, ImpactRequest, OptionsRequest, ReassignError};
use routegrid_state::StateError;
use routegrid_stops::{StopError, TransitionRequest};
use routegrid_validate::ValidationReport;
use routegrid_workflow::RegistryError;

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> axum::response::Response {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
        .into_response()
}

/// Resolve the tenant from `x-tenant-id`. Every route requires it.
fn tenant(headers: &HeaderMap) -> Result<String, axum::response::Response> {
    headers
        .get("x-tenant-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| error_response("missing x-tenant-id header", StatusCode::BAD_REQUEST))
}

fn state_status(err: &StateError) -> StatusCode {
    match err {
        StateError::NotFound(_) => StatusCode::NOT_FOUND,
        StateError::Conflict(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn confirm_error(err: ConfirmError) -> axum::response::Response {
    use ConfirmError::*;
    let status = match &err {
        JobNotFound(_) | ConfigurationNotFound(_) => StatusCode::NOT_FOUND,
        AlreadyConfirmed(_) | UnresolvedWarnings(_) => StatusCode::CONFLICT,
        JobNotCompleted(_) | OptimizationInProgress | EmptyRoutes | NothingToConfirm
        | ValidationFailed(_) => StatusCode::BAD_REQUEST,
        MissingResult(_) => StatusCode::INTERNAL_SERVER_ERROR,
        State(e) => state_status(e),
    };
    let message = err.to_string();
    // Validation outcomes carry the full report so the caller can act.
    let report: Option<ValidationReport> = match err {
        ValidationFailed(report) | UnresolvedWarnings(report) => Some(report),
        _ => None,
    };
    (
        status,
        Json(ApiResponse {
            success: false,
            data: report,
            error: Some(message),
        }),
    )
        .into_response()
}

fn registry_error(err: RegistryError) -> axum::response::Response {
    let status = match &err {
        RegistryError::Workflow(_) => StatusCode::BAD_REQUEST,
        RegistryError::StateNotFound(_) => StatusCode::NOT_FOUND,
        RegistryError::State(e) => state_status(e),
    };
    error_response(&err.to_string(), status)
}

fn stop_error(err: StopError) -> axum::response::Response {
    let status = match &err {
        StopError::StopNotFound(_) | StopError::UnknownWorkflowState(_) => StatusCode::NOT_FOUND,
        StopError::IllegalTransition { .. } => StatusCode::FORBIDDEN,
        StopError::WorkflowStateMismatch { .. } | StopError::MissingRequirement(_) => {
            StatusCode::BAD_REQUEST
        }
        StopError::Registry(RegistryError::State(e)) => state_status(e),
        StopError::Registry(_) => StatusCode::BAD_REQUEST,
        StopError::State(e) => state_status(e),
    };
    error_response(&err.to_string(), status)
}

fn reassign_error(err: ReassignError) -> axum::response::Response {
    let status = match &err {
        ReassignError::JobNotFound(_)
        | ReassignError::NoCompletedJob
        | ReassignError::DriverNotFound(_)
        | ReassignError::VehicleNotFound(_) => StatusCode::NOT_FOUND,
        ReassignError::OrderNotInPlan(_)
        | ReassignError::MissingTargetDriver
        | ReassignError::NothingToApply => StatusCode::BAD_REQUEST,
        ReassignError::MissingResult(_) => StatusCode::INTERNAL_SERVER_ERROR,
        ReassignError::State(e) => state_status(e),
    };
    error_response(&err.to_string(), status)
}

// ── Jobs ───────────────────────────────────────────────────────

/// GET /api/v1/jobs/{job_id}/validate
pub async fn validate_job(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(job_id): Path<String>,
) -> impl IntoResponse {
    let tenant = match tenant(&headers) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    let job = match state.store.get_job(&tenant, &job_id) {
        Ok(Some(job)) => job,
        Ok(None) => return error_response("job not found", StatusCode::NOT_FOUND),
        Err(e) => return error_response(&e.to_string(), state_status(&e)),
    };
    let Some(result) = &job.result else {
        return error_response("job has no result to validate", StatusCode::BAD_REQUEST);
    };
    match state.validator.validate(&tenant, result) {
        Ok(report) => ApiResponse::ok(report).into_response(),
        Err(e) => error_response(&e.to_string(), state_status(&e)),
    }
}

/// Confirm request body.
#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmBody {
    #[serde(default)]
    pub override_warnings: bool,
    #[serde(default)]
    pub confirmation_note: Option<String>,
    #[serde(default)]
    pub plan_name: Option<String>,
    pub confirmed_by: String,
}

/// POST /api/v1/jobs/{job_id}/confirm
pub async fn confirm_job(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(job_id): Path<String>,
    Json(body): Json<ConfirmBody>,
) -> impl IntoResponse {
    let tenant = match tenant(&headers) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    let req = ConfirmRequest {
        job_id,
        override_warnings: body.override_warnings,
        confirmation_note: body.confirmation_note,
        plan_name: body.plan_name,
        confirmed_by: body.confirmed_by,
    };
    match state.confirm.confirm(&tenant, &req) {
        Ok(outcome) => ApiResponse::ok(outcome).into_response(),
        Err(e) => confirm_error(e),
    }
}

/// GET /api/v1/jobs/{job_id}/metrics
pub async fn job_metrics(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(job_id): Path<String>,
) -> impl IntoResponse {
    let tenant = match tenant(&headers) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    match state.store.get_plan_metrics(&tenant, &job_id) {
        Ok(Some(metrics)) => ApiResponse::ok(metrics).into_response(),
        Ok(None) => error_response("no metrics for this job", StatusCode::NOT_FOUND),
        Err(e) => error_response(&e.to_string(), state_status(&e)),
    }
}

// ── Reassignments ──────────────────────────────────────────────

/// POST /api/v1/reassignments/options
pub async fn reassignment_options(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(req): Json<OptionsRequest>,
) -> impl IntoResponse {
    let tenant = match tenant(&headers) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    match state.reassign.options(&tenant, &req) {
        Ok(outcome) => ApiResponse::ok(outcome).into_response(),
        Err(e) => reassign_error(e),
    }
}

/// POST /api/v1/reassignments/impact
pub async fn reassignment_impact(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(req): Json<ImpactRequest>,
) -> impl IntoResponse {
    let tenant = match tenant(&headers) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    match state.reassign.impact(&tenant, &req) {
        Ok(estimate) => ApiResponse::ok(estimate).into_response(),
        Err(e) => reassign_error(e),
    }
}

/// POST /api/v1/reassignments/apply
pub async fn reassignment_apply(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(req): Json<ApplyRequest>,
) -> impl IntoResponse {
    let tenant = match tenant(&headers) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    match state.reassign.apply(&tenant, &req) {
        Ok(outcome) => ApiResponse::ok(outcome).into_response(),
        Err(e) => reassign_error(e),
    }
}

// ── Route stops ────────────────────────────────────────────────

/// Stop transition request body.
#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionBody {
    pub new_status: StopStatus,
    #[serde(default)]
    pub workflow_state_id: Option<String>,
    pub actor: String,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub evidence_urls: Vec<String>,
    #[serde(default)]
    pub actual_arrival: Option<i64>,
}

/// POST /api/v1/stops/{stop_id}/transition
pub async fn transition_stop(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(stop_id): Path<String>,
    Json(body): Json<TransitionBody>,
) -> impl IntoResponse {
    let tenant = match tenant(&headers) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    let req = TransitionRequest {
        new_status: body.new_status,
        workflow_state_id: body.workflow_state_id,
        actor: body.actor,
        reason: body.reason,
        notes: body.notes,
        evidence_urls: body.evidence_urls,
        actual_arrival: body.actual_arrival,
    };
    match state.stops.transition(&tenant, &stop_id, &req) {
        Ok(outcome) => ApiResponse::ok(serde_json::json!({
            "stop": outcome.stop,
            "historySeq": outcome.history_seq,
            "orderStarted": outcome.order_started,
            "orderCompleted": outcome.order_completed,
        }))
        .into_response(),
        Err(e) => stop_error(e),
    }
}

/// GET /api/v1/stops/{stop_id}/history
pub async fn stop_history(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(stop_id): Path<String>,
) -> impl IntoResponse {
    let tenant = match tenant(&headers) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    match state.stops.history(&tenant, &stop_id) {
        Ok(history) => ApiResponse::ok(history).into_response(),
        Err(e) => stop_error(e),
    }
}

// ── Workflow definitions ───────────────────────────────────────

/// GET /api/v1/workflow/states
pub async fn list_workflow_states(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let tenant = match tenant(&headers) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    match state.workflows.list_states(&tenant) {
        Ok(states) => ApiResponse::ok(states).into_response(),
        Err(e) => registry_error(e),
    }
}

/// POST /api/v1/workflow/states
pub async fn put_workflow_state(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(mut body): Json<WorkflowState>,
) -> impl IntoResponse {
    let tenant = match tenant(&headers) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    body.tenant_id = tenant;
    match state.workflows.put_state(body.clone()) {
        Ok(()) => (StatusCode::CREATED, ApiResponse::ok(body)).into_response(),
        Err(e) => registry_error(e),
    }
}

/// DELETE /api/v1/workflow/states/{state_id}
pub async fn delete_workflow_state(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(state_id): Path<String>,
) -> impl IntoResponse {
    let tenant = match tenant(&headers) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    match state.workflows.remove_state(&tenant, &state_id) {
        Ok(()) => ApiResponse::ok("deleted").into_response(),
        Err(e) => registry_error(e),
    }
}

/// POST /api/v1/workflow/transitions
pub async fn set_workflow_transition(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(mut body): Json<WorkflowTransition>,
) -> impl IntoResponse {
    let tenant = match tenant(&headers) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    body.tenant_id = tenant;
    match state.workflows.set_transition(body.clone()) {
        Ok(()) => ApiResponse::ok(body).into_response(),
        Err(e) => registry_error(e),
    }
}

// ── Plans ──────────────────────────────────────────────────────

/// DELETE /api/v1/plans/{config_id}
pub async fn delete_plan(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(config_id): Path<String>,
) -> impl IntoResponse {
    let tenant = match tenant(&headers) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    match state.store.commit_plan_deletion(&tenant, &config_id) {
        Ok(deletion) => ApiResponse::ok(serde_json::json!({
            "configId": config_id,
            "jobsDeleted": deletion.jobs_deleted,
            "stopsDeleted": deletion.stops_deleted,
            "ordersReverted": deletion.orders_reverted,
        }))
        .into_response(),
        Err(e) => error_response(&e.to_string(), state_status(&e)),
    }
}
