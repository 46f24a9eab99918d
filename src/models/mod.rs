pub mod dashboard;
pub mod file;
