use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::auth::jwt::verify_token;
use crate::error::AppError;
use crate::models::user::ROLE_MANAGER;
use crate::state::AppState;

#[derive(Clone, Debug)]
pub struct AuthContext {
    pub user_id: i64,
    pub role: String,
    pub username: String,
}

impl AuthContext {
    pub fn is_manager(&self) -> bool {
        self.role == ROLE_MANAGER
    }

    pub fn require_manager(&self, action: &str) -> Result<(), AppError> {
        if self.is_manager() {
            Ok(())
        } else {
            Err(AppError::forbidden(format!("Only managers can {action}")))
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
}

pub async fn require_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let auth_header = match req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
    {
        Some(h) => h,
        None => return unauthorized("Missing Authorization header"),
    };

    // Expect "Bearer <token>"
    let token = match auth_header.strip_prefix("Bearer ") {
        Some(t) => t,
        None => return unauthorized("Invalid Authorization format"),
    };

    let claims = match verify_token(token, &state.jwt_secret) {
        Ok(c) => c,
        Err(e) => return unauthorized(&e.to_string()),
    };

    req.extensions_mut().insert(AuthContext {
        user_id: claims.sub,
        role: claims.role,
        username: claims.username,
    });

    next.run(req).await
}

fn unauthorized(msg: &str) -> Response {
    let body = axum::Json(ErrorBody {
        error: msg.to_string(),
        code: "unauthorized",
    });
    (StatusCode::UNAUTHORIZED, body).into_response()
}
