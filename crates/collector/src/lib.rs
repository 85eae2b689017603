// Module structure for the sidecar log collector.

// Core infrastructure
pub mod client;
pub mod config;
pub mod model;

// Domain modules
pub mod docker;
pub mod health;
pub mod printer;
pub mod runtime;
pub mod source;
