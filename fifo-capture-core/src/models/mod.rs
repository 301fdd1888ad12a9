pub mod capture_report;
pub mod config;
pub mod error;
pub mod outcome;
pub mod state;
