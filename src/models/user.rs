use serde::Serialize;
use chrono::{DateTime, Utc};

pub const ROLE_MANAGER: &str = "manager";
pub const ROLE_OPERATOR: &str = "operator";

#[derive(sqlx::FromRow, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

pub fn is_valid_role(role: &str) -> bool {
    role == ROLE_MANAGER || role == ROLE_OPERATOR
}
