pub mod user;
pub mod employee;
pub mod scan;
