//! HTTP API: server wiring, sessions, tenant resolution and routes.

pub mod app;
pub mod authz;
pub mod config;
pub mod context;
pub mod housekeeping;
pub mod middleware;

pub use config::Config;
