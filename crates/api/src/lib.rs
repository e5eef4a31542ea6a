//! HTTP API: configuration, data sources, the gate middleware and handlers.

pub mod app;
pub mod config;
pub mod context;
pub mod directory;
pub mod middleware;
pub mod seed;
