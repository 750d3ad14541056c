//! HTTP API handlers for freshet

pub mod health;
pub mod releases;

pub use health::health_routes;
pub use releases::release_routes;
