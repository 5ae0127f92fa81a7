//! Module for the process dashboard API.
//!
//! This module defines the rendered table views and the HTTP endpoints that
//! serve and stream them.

pub mod handlers;
pub mod routes;
pub mod view;

pub use routes::dashboard_router;
