//! Scan reconciliation engine: identity resolution, scan sessions,
//! accumulation against check lines and reconciliation reports.

pub mod engine;
pub mod error;
pub mod identity;
pub mod manager_override;
pub mod report;
pub mod service;
pub mod session;
