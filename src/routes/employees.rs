use axum::{Router, routing::put, middleware};
use crate::state::AppState;
use crate::handlers::employee::{upsert_employee, get_employee};
use crate::middleware::auth::require_auth;

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/employees/{code}", put(upsert_employee).get(get_employee))
        .layer(middleware::from_fn_with_state(state, require_auth))
}
