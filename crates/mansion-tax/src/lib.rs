pub mod allocation;
pub mod config;
pub mod error;
pub mod sources;
pub mod telemetry;
