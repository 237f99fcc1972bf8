use bcrypt::{hash, verify, DEFAULT_COST};
use crate::dtos::user::{RegisterUserRequest, UserResponse, LoginRequest, LoginResponse};
use crate::auth::jwt::{sign_token, TOKEN_TTL_HOURS};
use crate::error::AppError;
use crate::models::user::{is_valid_role, User};
use axum::{extract::State, Json};
use crate::state::AppState;
use crate::middleware::auth::AuthContext;
use axum::extract::Extension;

pub async fn register_user(
    State(AppState { db_pool, .. }): State<AppState>,
    Json(payload): Json<RegisterUserRequest>
) -> Result<(axum::http::StatusCode, Json<UserResponse>), AppError> {
    if !is_valid_role(&payload.role) {
        return Err(AppError::validation("Invalid role"));
    }
    if payload.username.trim().is_empty() {
        return Err(AppError::validation("Username required"));
    }
    if payload.password.len() < 6 {
        return Err(AppError::validation("Password too short"));
    }

    let password_hash = hash(&payload.password, DEFAULT_COST)
        .map_err(|e| AppError::internal(format!("Hash error: {e}")))?;

    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (username, password_hash, role)
        VALUES ($1, $2, $3)
        RETURNING id, username, password_hash, role, is_active, created_at
        "#,
    )
    .bind(payload.username.trim())
    .bind(&password_hash)
    .bind(&payload.role)
    .fetch_one(&db_pool)
    .await
    .map_err(|e| {
        if let Some(db_err) = e.as_database_error() {
            if db_err.code().as_deref() == Some("23505") {
                return AppError::conflict("Username already exists");
            }
        }
        AppError::db(e)
    })?;

    tracing::info!(user = %user.username, role = %user.role, "User registered");
    Ok((axum::http::StatusCode::CREATED, Json(user.into())))
}

pub async fn login_user(
    State(AppState { db_pool, jwt_secret, .. }): State<AppState>,
    Json(payload): Json<LoginRequest>
) -> Result<Json<LoginResponse>, AppError> {
    if payload.username.trim().is_empty() {
        return Err(AppError::validation("Username required"));
    }
    if payload.password.is_empty() {
        return Err(AppError::validation("Password required"));
    }

    let user = sqlx::query_as::<_, User>(
        r#"SELECT id, username, password_hash, role, is_active, created_at FROM users WHERE username = $1"#,
    )
    .bind(payload.username.trim())
    .fetch_optional(&db_pool)
    .await?
    .ok_or_else(|| AppError::not_found("Invalid credentials"))?;

    if !user.is_active {
        return Err(AppError::conflict("User inactive"));
    }

    let ok = verify(&payload.password, &user.password_hash)
        .map_err(|e| AppError::internal(format!("Password verify error: {e}")))?;

    if !ok {
        return Err(AppError::validation("Invalid credentials"));
    }

    let token = sign_token(user.id, &user.role, &user.username, &jwt_secret)?;

    Ok(Json(LoginResponse {
        access_token: token,
        token_type: "Bearer",
        expires_in_seconds: TOKEN_TTL_HOURS * 60 * 60,
    }))
}

pub async fn get_me(
    State(AppState { db_pool, .. }): State<AppState>,
    Extension(auth): Extension<AuthContext>
) -> Result<Json<UserResponse>, AppError> {
    let user = sqlx::query_as::<_, User>(
        r#"SELECT id, username, password_hash, role, is_active, created_at FROM users WHERE id = $1"#,
    )
    .bind(auth.user_id)
    .fetch_optional(&db_pool)
    .await?
    .ok_or_else(|| AppError::not_found("User not found"))?;

    Ok(Json(user.into()))
}
