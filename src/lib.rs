// Library exports for the binary and for embedding the gateway pipeline
// (custom filters, token stores written by a login service).

pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod gateway;
pub mod middleware;
pub mod services;
pub mod state;
