//! An engine backed by an `axum` router.
//!
//! Supports default middleware and request logging. Metrics, tracing and static frontends are
//! reported as unsupported.

use crate::dispatch::{self, invoke};
use crate::routes::RouteTable;
use async_trait::async_trait;
use axum::body::Body;
use axum::extract::{ConnectInfo, Path, Request};
use axum::middleware::{self, Next};
use axum::routing::{MethodFilter, MethodRouter};
use bytes::Bytes;
use gantry_core::{Capability, EngineAdapter, EngineError, EngineSettings, HandlerChain};
use http::Method;
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{Span, info};

const NAME: &str = "axum";

pub struct AxumEngine {
    settings: EngineSettings,
    routes: RouteTable,
    default_middleware: bool,
    request_logging: bool,
    shutdown: CancellationToken,
}

impl AxumEngine {
    pub fn new() -> Self {
        Self {
            settings: EngineSettings::new(NAME),
            routes: RouteTable::default(),
            default_middleware: false,
            request_logging: false,
            shutdown: CancellationToken::new(),
        }
    }

    /// Shuts the server down gracefully once `token` is cancelled.
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    fn build_router(&mut self) -> Result<axum::Router, EngineError> {
        let routes = std::mem::take(&mut self.routes);
        let recover = self.default_middleware;
        let mut router = axum::Router::new();

        for entry in routes.entries() {
            let allow: Vec<Method> = entry.methods.iter().map(|(method, _)| method.clone()).collect();
            let mut method_router = MethodRouter::new().fallback(move || {
                let response = dispatch::method_not_allowed(&allow);
                async move { into_axum(response) }
            });

            for (method, chain) in &entry.methods {
                let filter = MethodFilter::try_from(method.clone()).map_err(|e| EngineError::configuration(NAME, e))?;
                let chain = chain.clone();
                method_router = if entry.has_params {
                    method_router.on(filter, move |Path(params): Path<HashMap<String, String>>, req: Request| {
                        let chain = chain.clone();
                        async move { handle(chain, params.into_iter().collect(), req, recover).await }
                    })
                } else {
                    method_router.on(filter, move |req: Request| {
                        let chain = chain.clone();
                        async move { handle(chain, Vec::new(), req, recover).await }
                    })
                };
            }

            router = router.route(&entry.template, method_router);
        }

        router = router.fallback(|| async { into_axum(dispatch::not_found()) });

        if self.default_middleware {
            router = router.layer(middleware::from_fn(default_middleware));
        }
        if self.request_logging {
            let span = self.settings.span.clone();
            router = router.layer(middleware::from_fn(
                move |ConnectInfo(peer): ConnectInfo<SocketAddr>, req: Request, next: Next| {
                    let span = span.clone();
                    async move { log_request(&span, peer, req, next).await }
                },
            ));
        }

        Ok(router)
    }
}

impl Default for AxumEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AxumEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AxumEngine")
            .field("app", &self.settings.app_id)
            .field("routes", &self.routes.len())
            .field("default_middleware", &self.default_middleware)
            .field("request_logging", &self.request_logging)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl EngineAdapter for AxumEngine {
    fn name(&self) -> &'static str {
        NAME
    }

    fn supports(&self, capability: Capability) -> bool {
        matches!(capability, Capability::DefaultMiddleware | Capability::RequestLogging)
    }

    fn configure(&mut self, settings: &EngineSettings) -> Result<(), EngineError> {
        self.settings = settings.clone();
        Ok(())
    }

    fn register_route(&mut self, method: Method, path: &str, chain: HandlerChain) -> Result<(), EngineError> {
        if !self.supports_method(&method) {
            return Err(EngineError::configuration(NAME, format!("method {method} is not supported")));
        }
        self.routes.insert(NAME, method, path, chain)
    }

    fn enable_default_middleware(&mut self) -> Result<(), EngineError> {
        self.default_middleware = true;
        Ok(())
    }

    fn enable_request_logging(&mut self) -> Result<(), EngineError> {
        self.request_logging = true;
        Ok(())
    }

    async fn run(&mut self, host: &str, port: u16) -> Result<(), EngineError> {
        let listener = TcpListener::bind((host, port)).await.map_err(|e| EngineError::bind(format!("{host}:{port}"), e))?;
        let router = self.build_router()?;
        info!(parent: &self.settings.span, host, port, "start listening");

        let shutdown = self.shutdown.clone();
        axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .map_err(|e| EngineError::serve(NAME, e))
    }
}

async fn handle(chain: HandlerChain, params: Vec<(String, String)>, req: Request, recover: bool) -> axum::response::Response {
    let (parts, body) = req.into_parts();
    let body = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(body) => body,
        Err(e) => return into_axum(dispatch::bad_request(format!("failed to read request body: {e}"))),
    };
    into_axum(invoke(&chain, &parts, params, body, recover).await)
}

async fn default_middleware(req: Request, next: Next) -> axum::response::Response {
    let request_id = dispatch::request_id(req.headers());
    let mut response = if dispatch::is_preflight(req.method(), req.headers()) {
        into_axum(dispatch::preflight_response(req.headers()))
    } else {
        next.run(req).await
    };
    dispatch::decorate(response.headers_mut(), request_id);
    response
}

async fn log_request(span: &Span, peer: SocketAddr, req: Request, next: Next) -> axum::response::Response {
    let (method, uri) = (req.method().clone(), req.uri().clone());
    let response = next.run(req).await;
    info!(parent: span, method = %method, status = response.status().as_u16(), uri = %uri, peer = %peer, "request");
    response
}

fn into_axum(response: http::Response<Bytes>) -> axum::response::Response {
    response.map(Body::from)
}
