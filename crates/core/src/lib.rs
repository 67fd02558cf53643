//! Declare REST endpoints once; dispatch them on any engine and document them as OpenAPI.
//!
//! A [`Route`] carries both the handler chain an engine dispatches to and the [`Fragment`] the
//! [`SpecBuilder`] turns into a [`Document`]. An [`EngineAdapter`] binds routes to a concrete
//! HTTP engine, and [`App`] composes options, one engine and its routes into a runnable server.

mod app;
mod context;
mod engine;
mod handler;
mod options;
mod route;
mod router;
mod schema;

pub mod error;
pub mod logging;
pub mod normalize;
pub mod path;
pub mod spec;

pub use app::App;
pub use context::{Context, RequestScope, Response};
pub use engine::{Capability, EngineAdapter, EngineSettings, StaticBundle};
pub use error::{AppError, ConfigError, EngineError, ExtractError, SpecError};
pub use handler::{FnHandler, Handler, HandlerChain, handler_fn};
pub use options::{AppConfig, AppOptions};
pub use route::{Fragment, HttpMethod, ParamLocation, Parameter, Route};
pub use router::Router;
pub use schema::{Definitions, Describe, Field, ObjectSchema, Schema};
pub use spec::{ApiInfo, Document, SecurityScheme, SpecBuilder};
