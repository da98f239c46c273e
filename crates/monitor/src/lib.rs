//! GPU monitor exporter: HTTP surface and configuration

pub mod api;
pub mod config;
