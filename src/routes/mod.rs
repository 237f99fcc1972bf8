pub mod users;
pub mod employees;
pub mod scan_sessions;
pub mod shipments;

use axum::Router;
use crate::state::AppState;

pub fn create_router(state: AppState) -> Router<AppState> {
    Router::new()
        .merge(users::routes(state.clone()))
        .merge(employees::routes(state.clone()))
        .merge(scan_sessions::routes(state.clone()))
        .merge(shipments::routes(state))
}
