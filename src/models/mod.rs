pub mod check_line;
pub mod history;
pub mod manifest;
pub mod snapshot;
pub mod user;
