use axum::{Router, routing::{post, get, put, delete}, middleware};
use crate::state::AppState;
use crate::handlers::shipment::*;
use crate::middleware::auth::require_auth;

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/shipments/{scope}/manifest", put(import_manifest))
        .route("/shipments/{scope}/lines", get(list_lines))
        .route("/shipments/{scope}/report", get(get_report))
        .route("/shipments/{scope}/reset", post(reset_scope))
        .route("/shipments/{scope}/lines/{material}/{key}", delete(delete_line))
        .route("/shipments/{scope}/lines/{material}/{key}/history", get(get_line_history))
        .route("/shipments/{scope}/lines/{material}/{key}/lock", post(lock_line))
        .route("/shipments/{scope}/lines/{material}/{key}/unlock", post(unlock_line))
        .route("/shipments/{scope}/lines/{material}/{key}/acknowledge", post(acknowledge_line))
        .layer(middleware::from_fn_with_state(state, require_auth))
}
