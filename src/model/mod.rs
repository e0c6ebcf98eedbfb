pub mod employee;
pub mod holiday;
pub mod leave_record;
pub mod role;
pub mod user;
