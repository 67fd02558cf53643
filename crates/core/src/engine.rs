//! The contract between the routing core and a concrete HTTP engine.

use crate::error::EngineError;
use crate::handler::HandlerChain;
use async_trait::async_trait;
use bytes::Bytes;
use http::Method;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::Span;

/// Optional features an engine may or may not provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    DefaultMiddleware,
    RequestLogging,
    Metrics,
    Tracing,
    StaticFrontend,
}

impl Capability {
    pub const ALL: [Capability; 5] = [
        Capability::DefaultMiddleware,
        Capability::RequestLogging,
        Capability::Metrics,
        Capability::Tracing,
        Capability::StaticFrontend,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Capability::DefaultMiddleware => "default_middleware",
            Capability::RequestLogging => "request_logging",
            Capability::Metrics => "metrics",
            Capability::Tracing => "tracing",
            Capability::StaticFrontend => "static_frontend",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Embedded frontend assets, keyed by request path (`/index.html`, `/assets/app.js`).
#[derive(Debug, Clone, Default)]
pub struct StaticBundle {
    files: Arc<HashMap<String, Bytes>>,
}

impl StaticBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file; a path without a leading `/` gets one.
    pub fn insert(mut self, path: impl Into<String>, contents: impl Into<Bytes>) -> Self {
        let mut path = path.into();
        if !path.starts_with('/') {
            path.insert(0, '/');
        }
        Arc::make_mut(&mut self.files).insert(path, contents.into());
        self
    }

    /// Looks up `path`, mapping `/` and directory paths to their `index.html`.
    pub fn get(&self, path: &str) -> Option<(&str, &Bytes)> {
        let key = match path {
            "" => "/index.html".to_string(),
            dir if dir.ends_with('/') => format!("{dir}index.html"),
            file => file.to_string(),
        };
        self.files.get_key_value(&key).map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Per-application settings handed to an engine before any route is registered.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub app_id: String,
    /// Parent span for everything the engine logs on behalf of the application.
    pub span: Span,
}

impl EngineSettings {
    pub fn new(app_id: impl Into<String>) -> Self {
        Self { app_id: app_id.into(), span: Span::none() }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}

/// Binds the routing core to one concrete HTTP engine.
///
/// Every capability toggle defaults to [`EngineError::Unsupported`]; a variant overrides the ones it
/// provides and reports them through [`supports`](EngineAdapter::supports).
///
/// Implementations convert each inbound request into a [`Context`](crate::Context) before the
/// first handler runs and turn the terminal [`Response`](crate::Response) into the native reply,
/// keeping its status and serializing the payload once.
#[async_trait]
pub trait EngineAdapter: Send {
    fn name(&self) -> &'static str;

    fn supports(&self, capability: Capability) -> bool;

    fn supports_method(&self, method: &Method) -> bool {
        matches!(*method, Method::GET | Method::POST | Method::PUT | Method::PATCH | Method::DELETE)
    }

    fn configure(&mut self, settings: &EngineSettings) -> Result<(), EngineError> {
        let _ = settings;
        Ok(())
    }

    fn register_route(&mut self, method: Method, path: &str, chain: HandlerChain) -> Result<(), EngineError>;

    fn enable_default_middleware(&mut self) -> Result<(), EngineError> {
        Err(EngineError::unsupported(self.name(), Capability::DefaultMiddleware))
    }

    fn enable_request_logging(&mut self) -> Result<(), EngineError> {
        Err(EngineError::unsupported(self.name(), Capability::RequestLogging))
    }

    fn enable_metrics(&mut self) -> Result<(), EngineError> {
        Err(EngineError::unsupported(self.name(), Capability::Metrics))
    }

    /// `collector` is the span collector endpoint; `None` selects the engine's default.
    fn enable_tracing(&mut self, collector: Option<String>) -> Result<(), EngineError> {
        let _ = collector;
        Err(EngineError::unsupported(self.name(), Capability::Tracing))
    }

    fn mount_static_frontend(&mut self, bundle: StaticBundle) -> Result<(), EngineError> {
        let _ = bundle;
        Err(EngineError::unsupported(self.name(), Capability::StaticFrontend))
    }

    /// Serves until the listener terminates. A bind failure is returned as [`EngineError::Bind`].
    async fn run(&mut self, host: &str, port: u16) -> Result<(), EngineError>;
}

#[async_trait]
impl<E: EngineAdapter + ?Sized> EngineAdapter for Box<E> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn supports(&self, capability: Capability) -> bool {
        (**self).supports(capability)
    }

    fn supports_method(&self, method: &Method) -> bool {
        (**self).supports_method(method)
    }

    fn configure(&mut self, settings: &EngineSettings) -> Result<(), EngineError> {
        (**self).configure(settings)
    }

    fn register_route(&mut self, method: Method, path: &str, chain: HandlerChain) -> Result<(), EngineError> {
        (**self).register_route(method, path, chain)
    }

    fn enable_default_middleware(&mut self) -> Result<(), EngineError> {
        (**self).enable_default_middleware()
    }

    fn enable_request_logging(&mut self) -> Result<(), EngineError> {
        (**self).enable_request_logging()
    }

    fn enable_metrics(&mut self) -> Result<(), EngineError> {
        (**self).enable_metrics()
    }

    fn enable_tracing(&mut self, collector: Option<String>) -> Result<(), EngineError> {
        (**self).enable_tracing(collector)
    }

    fn mount_static_frontend(&mut self, bundle: StaticBundle) -> Result<(), EngineError> {
        (**self).mount_static_frontend(bundle)
    }

    async fn run(&mut self, host: &str, port: u16) -> Result<(), EngineError> {
        (**self).run(host, port).await
    }
}
