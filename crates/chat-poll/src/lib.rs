pub mod config;
pub mod election;
pub mod error;
pub mod telemetry;
