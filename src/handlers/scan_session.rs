use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;

use crate::{
    dtos::scan::{OpenSessionRequest, ScanInputRequest},
    error::AppError,
    middleware::auth::AuthContext,
    scan::service::{InputOutcome, SessionView},
    scan::session::SessionReport,
    state::AppState,
};

// ==================== Open Session ====================

pub async fn open_session(
    State(AppState { scans, .. }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<OpenSessionRequest>,
) -> Result<(StatusCode, Json<SessionView>), AppError> {
    let view = scans
        .open_session(req.flow, req.mode, req.scope.as_deref())
        .await?;
    tracing::debug!(session = %view.id, user = %auth.username, "Session opened by user");
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn get_session(
    State(AppState { scans, .. }): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(scans.session_view(id).await?))
}

// ==================== Scan Input ====================

/// Rejected scans still answer 200: the body carries `accepted: false` and
/// the message to show before the next scan.
pub async fn submit_input(
    State(AppState { scans, .. }): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ScanInputRequest>,
) -> Result<Json<InputOutcome>, AppError> {
    Ok(Json(scans.submit(id, &req.raw).await?))
}

pub async fn next_pallet(
    State(AppState { scans, .. }): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(scans.next_pallet(id).await?))
}

// ==================== Finish ====================

pub async fn complete_session(
    State(AppState { scans, .. }): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionReport>, AppError> {
    Ok(Json(scans.complete(id).await?))
}

pub async fn cancel_session(
    State(AppState { scans, .. }): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(scans.cancel(id).await?))
}
