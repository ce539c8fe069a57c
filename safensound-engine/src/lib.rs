pub mod airport;
pub mod config;
pub mod engine;
pub mod error;
pub mod location;
pub mod logging;
pub mod telemetry;
pub mod weather;
