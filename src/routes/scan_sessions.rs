use axum::{Router, routing::{post, get}, middleware};
use crate::state::AppState;
use crate::handlers::scan_session::*;
use crate::middleware::auth::require_auth;

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/scan-sessions", post(open_session))
        .route("/scan-sessions/{id}", get(get_session))
        .route("/scan-sessions/{id}/input", post(submit_input))
        .route("/scan-sessions/{id}/next-pallet", post(next_pallet))
        .route("/scan-sessions/{id}/complete", post(complete_session))
        .route("/scan-sessions/{id}/cancel", post(cancel_session))
        .layer(middleware::from_fn_with_state(state, require_auth))
}
