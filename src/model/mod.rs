pub mod attendance;
pub mod course;
pub mod leave;
pub mod payroll;
pub mod profile;
pub mod review;
pub mod role;
pub mod user;
