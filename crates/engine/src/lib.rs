//! Engine bindings for gantry routes.
//!
//! - [`HyperEngine`]: hyper HTTP/1 connections routed with `matchit`, every capability supported
//! - [`AxumEngine`]: an `axum` router, default middleware and request logging only
//!
//! Both turn each request into a [`gantry_core::Context`] before the first handler runs and write
//! the terminal [`gantry_core::Response`] back as JSON with its status untouched.

mod axum_engine;
mod dispatch;
mod frontend;
mod hyper_engine;
mod routes;

pub mod telemetry;

pub use axum_engine::AxumEngine;
pub use hyper_engine::HyperEngine;
