//! Error types shared by the routing core and every engine binding.
//!
//! The split follows where a failure is detected:
//! - [`EngineError`]: raised by an [`EngineAdapter`](crate::EngineAdapter) while wiring routes,
//!   toggling capabilities or binding its listener
//! - [`SpecError`]: raised while assembling the specification document
//! - [`AppError`]: what the application façade surfaces to its caller
//! - [`ConfigError`]: raised while loading [`AppOptions`](crate::AppOptions) from the environment or a file
//! - [`ExtractError`]: raised by the typed accessors on [`Context`](crate::Context)

use crate::engine::Capability;
use http::Method;
use std::error::Error;
use std::io;
use std::panic::Location;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{engine}: configuration error: {reason}")]
    Configuration { engine: &'static str, reason: String },

    #[error("{engine}: capability '{capability}' is not supported")]
    Unsupported { engine: &'static str, capability: Capability },

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("{engine}: serve error: {source}")]
    Serve {
        engine: &'static str,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

impl EngineError {
    pub fn configuration<S: ToString>(engine: &'static str, reason: S) -> Self {
        Self::Configuration { engine, reason: reason.to_string() }
    }

    pub fn unsupported(engine: &'static str, capability: Capability) -> Self {
        Self::Unsupported { engine, capability }
    }

    pub fn bind<A: ToString>(addr: A, source: io::Error) -> Self {
        Self::Bind { addr: addr.to_string(), source }
    }

    pub fn serve<E: Into<Box<dyn Error + Send + Sync>>>(engine: &'static str, source: E) -> Self {
        Self::Serve { engine, source: source.into() }
    }
}

#[derive(Debug, Error)]
pub enum SpecError {
    #[error("duplicate operation {method} {path}: declared at {first} and again at {second}")]
    DuplicateOperation { method: Method, path: String, first: &'static Location<'static>, second: &'static Location<'static> },
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Spec(#[from] SpecError),

    #[error("option '{option}' could not be applied: {source}")]
    Option {
        option: &'static str,
        #[source]
        source: EngineError,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {var}: {reason}")]
    Env { var: String, reason: String },

    #[error("invalid options file: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("invalid {part}: {reason}")]
    Invalid { part: &'static str, reason: String },
}

impl ExtractError {
    pub(crate) fn invalid<S: ToString>(part: &'static str, reason: S) -> Self {
        Self::Invalid { part, reason: reason.to_string() }
    }
}
