use axum::{
    extract::{Path, State},
    Extension, Json,
};

use crate::{
    dtos::employee::{EmployeeResponse, UpsertEmployeeRequest},
    error::AppError,
    middleware::auth::AuthContext,
    state::AppState,
};

pub async fn upsert_employee(
    State(AppState { scans, .. }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(code): Path<String>,
    Json(req): Json<UpsertEmployeeRequest>,
) -> Result<Json<EmployeeResponse>, AppError> {
    auth.require_manager("edit the employee directory")?;
    let code = scans.register_employee(&code, &req.display_name).await?;
    Ok(Json(EmployeeResponse {
        code: code.to_string(),
        display_name: req.display_name.trim().to_string(),
    }))
}

/// Unknown codes resolve to themselves.
pub async fn get_employee(
    State(AppState { scans, .. }): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<EmployeeResponse>, AppError> {
    let (code, display_name) = scans.employee_name(&code).await?;
    Ok(Json(EmployeeResponse {
        code: code.to_string(),
        display_name,
    }))
}
