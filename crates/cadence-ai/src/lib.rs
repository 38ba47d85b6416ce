pub mod clock;
pub mod config;
pub mod error;
pub mod generator;
pub mod storage;
pub mod telemetry;
pub mod workers;
pub mod workflows;
