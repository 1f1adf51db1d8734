//! pastebin - HTTP front end for content-addressed paste storage
//!
//! This library provides:
//! - `serve`: storage bootstrap, sweeper and server lifecycle
//! - `settings`: config strings parsed into runtime settings
//! - `telemetry`: tracing subscriber and optional OTLP export
//! - `web`: axum routes

pub mod serve;
pub mod settings;
pub mod telemetry;
pub mod web;
