pub mod admin;
pub mod employee;
pub mod health;
pub mod holiday;
pub mod leave_request;
