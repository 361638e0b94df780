pub mod batch;
pub mod dashboard;
pub mod import;
pub mod user;
