//! chatlens: a live debugger for chat prompt templates.
//!
//! The client renders a template on a remote service against a test case,
//! classifies the output into markers, special tokens, whitespace, and text,
//! and keeps the view current as the service pushes change notifications.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
