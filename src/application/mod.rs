//! Application services: annotation, session state, sync, and the render pipeline.

pub mod annotate;
pub mod debugger;
pub mod error;
pub mod pipeline;
pub mod preferences;
pub mod remote;
pub mod session;
pub mod sync;
pub mod template_config;
