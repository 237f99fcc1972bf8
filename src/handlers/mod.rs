pub mod user;
pub mod employee;
pub mod scan_session;
pub mod shipment;
