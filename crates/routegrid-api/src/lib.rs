//! routegrid-api — REST API for the plan lifecycle engine.
//!
//! Every route is tenant-scoped via the `x-tenant-id` header.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/api/v1/jobs/{job_id}/validate` | Validate a job's plan |
//! | POST | `/api/v1/jobs/{job_id}/confirm` | Confirm a plan |
//! | GET | `/api/v1/jobs/{job_id}/metrics` | Confirmed plan metrics |
//! | POST | `/api/v1/reassignments/options` | Rank replacement drivers |
//! | POST | `/api/v1/reassignments/impact` | Estimate a reassignment |
//! | POST | `/api/v1/reassignments/apply` | Apply a reassignment |
//! | POST | `/api/v1/stops/{stop_id}/transition` | Transition a route stop |
//! | GET | `/api/v1/stops/{stop_id}/history` | Stop transition history |
//! | GET | `/api/v1/workflow/states` | List workflow states |
//! | POST | `/api/v1/workflow/states` | Create/update a workflow state |
//! | DELETE | `/api/v1/workflow/states/{state_id}` | Remove a workflow state |
//! | POST | `/api/v1/workflow/transitions` | Toggle a workflow transition |
//! | DELETE | `/api/v1/plans/{config_id}` | Cascading plan deletion |

pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post};

use routegrid_confirm::{ConfirmationEngine, TenantLocks};
use routegrid_reassign::ReassignmentEngine;
use routegrid_state::StateStore;
use routegrid_stops::StopEngine;
use routegrid_validate::PlanValidator;
use routegrid_workflow::WorkflowRegistry;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub store: StateStore,
    pub validator: PlanValidator,
    pub confirm: ConfirmationEngine,
    pub stops: StopEngine,
    pub reassign: ReassignmentEngine,
    pub workflows: WorkflowRegistry,
    pub locks: Arc<TenantLocks>,
}

impl ApiState {
    pub fn new(store: StateStore) -> Self {
        let locks = Arc::new(TenantLocks::new());
        Self {
            validator: PlanValidator::new(store.clone()),
            confirm: ConfirmationEngine::new(store.clone(), locks.clone()),
            stops: StopEngine::new(store.clone()),
            reassign: ReassignmentEngine::new(store.clone()),
            workflows: WorkflowRegistry::new(store.clone()),
            locks,
            store,
        }
    }
}

/// Build the complete API router.
pub fn build_router(store: StateStore) -> Router {
    let state = ApiState::new(store);

    let api_routes = Router::new()
        .route("/jobs/{job_id}/validate", get(handlers::validate_job))
        .route("/jobs/{job_id}/confirm", post(handlers::confirm_job))
        .route("/jobs/{job_id}/metrics", get(handlers::job_metrics))
        .route("/reassignments/options", post(handlers::reassignment_options))
        .route("/reassignments/impact", post(handlers::reassignment_impact))
        .route("/reassignments/apply", post(handlers::reassignment_apply))
        .route("/stops/{stop_id}/transition", post(handlers::transition_stop))
        .route("/stops/{stop_id}/history", get(handlers::stop_history))
        .route(
            "/workflow/states",
            get(handlers::list_workflow_states).post(handlers::put_workflow_state),
        )
        .route(
            "/workflow/states/{state_id}",
            delete(handlers::delete_workflow_state),
        )
        .route("/workflow/transitions", post(handlers::set_workflow_transition))
        .route("/plans/{config_id}", delete(handlers::delete_plan))
        .with_state(state);

    Router::new().nest("/api/v1", api_routes)
}
