pub mod check;
pub mod client;
pub mod config;
pub mod metrics;
pub mod runner;
pub mod scenarios;
pub mod summary;
pub mod thresholds;
