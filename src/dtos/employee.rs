use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
pub struct UpsertEmployeeRequest {
    pub display_name: String,
}

#[derive(Serialize)]
pub struct EmployeeResponse {
    pub code: String,
    pub display_name: String,
}
