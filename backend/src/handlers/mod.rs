//! HTTP request handlers

pub mod files;
pub mod health;
pub mod reports;

pub use files::{index, serve_file};
pub use health::health_check;
pub use reports::{generate_report, list_reports};
