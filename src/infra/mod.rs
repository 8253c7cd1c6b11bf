//! Infrastructure adapters and runtime bootstrap.

pub mod error;
pub mod events;
pub mod http;
pub mod store;
pub mod telemetry;
