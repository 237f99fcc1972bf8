use axum::{
    extract::{Path, State},
    Extension, Json,
};

use crate::{
    dtos::scan::*,
    error::AppError,
    middleware::auth::AuthContext,
    models::check_line::{CheckLine, LineKey},
    models::manifest::ExpectedLine,
    scan::identity,
    scan::report::ReconciliationReport,
    scan::service::LineView,
    state::AppState,
};

fn line_key(scope: &str, material: &str, key: &str) -> Result<LineKey, AppError> {
    let scope = identity::normalize_shipment_code(scope)?;
    Ok(identity::resolve_line_key(&scope, material, key)?)
}

// ==================== Manifest ====================

pub async fn import_manifest(
    State(AppState { scans, .. }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(scope): Path<String>,
    Json(req): Json<ImportManifestRequest>,
) -> Result<Json<ImportManifestResponse>, AppError> {
    auth.require_manager("import manifests")?;

    let lines: Vec<ExpectedLine> = req
        .lines
        .into_iter()
        .map(|l| ExpectedLine {
            shipment_code: scope.clone(),
            material_code: l.material_code,
            po_or_pallet_key: l.po_or_pallet_key,
            expected_quantity: l.expected_quantity,
            expected_cartons: l.expected_cartons,
        })
        .collect();
    let lines_imported = lines.len();

    let (lines_created, persistence) = scans.import_manifest(&scope, lines).await?;
    Ok(Json(ImportManifestResponse {
        scope: identity::normalize_shipment_code(&scope)?,
        lines_imported,
        lines_created,
        persistence,
    }))
}

// ==================== Lines & Report ====================

pub async fn list_lines(
    State(AppState { scans, .. }): State<AppState>,
    Path(scope): Path<String>,
) -> Result<Json<Vec<LineView>>, AppError> {
    Ok(Json(scans.lines(&scope).await?))
}

pub async fn get_report(
    State(AppState { scans, .. }): State<AppState>,
    Path(scope): Path<String>,
) -> Result<Json<ReconciliationReport>, AppError> {
    Ok(Json(scans.report(&scope).await?))
}

pub async fn reset_scope(
    State(AppState { scans, .. }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(scope): Path<String>,
) -> Result<Json<ResetResponse>, AppError> {
    auth.require_manager("reset check scopes")?;
    let persistence = scans.reset(&scope).await?;
    Ok(Json(ResetResponse {
        scope: identity::normalize_shipment_code(&scope)?,
        persistence,
    }))
}

pub async fn get_line_history(
    State(AppState { scans, .. }): State<AppState>,
    Path((scope, material, key)): Path<(String, String, String)>,
) -> Result<Json<LineHistoryResponse>, AppError> {
    let key = line_key(&scope, &material, &key)?;
    let entries = scans.history(&key).await?;
    let replay = scans.replay_check(&key).await.ok();
    Ok(Json(LineHistoryResponse {
        line_key: key.to_string(),
        entries,
        replay,
    }))
}

// ==================== Line Administration ====================

pub async fn lock_line(
    State(AppState { scans, .. }): State<AppState>,
    Path((scope, material, key)): Path<(String, String, String)>,
) -> Result<Json<LineMutationResponse>, AppError> {
    let key = line_key(&scope, &material, &key)?;
    let (line, persistence) = scans.lock(&key).await?;
    Ok(Json(LineMutationResponse { line, persistence }))
}

pub async fn unlock_line(
    State(AppState { scans, .. }): State<AppState>,
    Path((scope, material, key)): Path<(String, String, String)>,
    Json(req): Json<BadgeRequest>,
) -> Result<Json<LineMutationResponse>, AppError> {
    let key = line_key(&scope, &material, &key)?;
    let (line, persistence) = scans.unlock(&key, &req.badge).await?;
    Ok(Json(LineMutationResponse { line, persistence }))
}

pub async fn acknowledge_line(
    State(AppState { scans, .. }): State<AppState>,
    Path((scope, material, key)): Path<(String, String, String)>,
) -> Result<Json<LineMutationResponse>, AppError> {
    let key = line_key(&scope, &material, &key)?;
    let (line, persistence) = scans.acknowledge(&key).await?;
    Ok(Json(LineMutationResponse { line, persistence }))
}

pub async fn delete_line(
    State(AppState { scans, .. }): State<AppState>,
    Path((scope, material, key)): Path<(String, String, String)>,
    Json(req): Json<DeleteLineRequest>,
) -> Result<Json<CheckLine>, AppError> {
    let key = line_key(&scope, &material, &key)?;
    let (line, persistence) = scans.delete_line(&key, req.badge.as_ref()).await?;
    if let Some(warning) = persistence.warning() {
        tracing::warn!(line = %key, error = %warning, "Deleted line not persisted");
    }
    Ok(Json(line))
}
