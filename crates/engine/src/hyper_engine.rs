//! An engine built directly on hyper's HTTP/1 connection driver.
//!
//! Routing is done with `matchit`; every capability is supported.

use crate::dispatch::{self, invoke};
use crate::frontend;
use crate::routes::{Lookup, RouteTable};
use crate::telemetry::{self, DEFAULT_COLLECTOR};
use async_trait::async_trait;
use bytes::Bytes;
use gantry_core::{Capability, EngineAdapter, EngineError, EngineSettings, HandlerChain, StaticBundle};
use http::header::{self, HeaderValue};
use http::{Method, Request, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use metrics_exporter_prometheus::PrometheusHandle;
use std::convert::Infallible;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::field::Empty;
use tracing::{Instrument, Span, debug, error, info, info_span, warn};

const NAME: &str = "hyper";

/// Pause after a failed `accept`, doubling per consecutive failure up to one second.
fn accept_backoff(consecutive_failures: u32) -> Duration {
    Duration::from_millis(5u64.saturating_mul(1 << consecutive_failures.min(8)).min(1_000))
}

pub struct HyperEngine {
    settings: EngineSettings,
    routes: RouteTable,
    default_middleware: bool,
    request_logging: bool,
    metrics: Option<PrometheusHandle>,
    collector: Option<String>,
    frontend: Option<StaticBundle>,
    shutdown: CancellationToken,
}

impl HyperEngine {
    pub fn new() -> Self {
        Self {
            settings: EngineSettings::new(NAME),
            routes: RouteTable::default(),
            default_middleware: false,
            request_logging: false,
            metrics: None,
            collector: None,
            frontend: None,
            shutdown: CancellationToken::new(),
        }
    }

    /// Stops accepting connections once `token` is cancelled.
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// The collector spans are announced for, when tracing is on.
    pub fn collector(&self) -> Option<&str> {
        self.collector.as_deref()
    }
}

impl Default for HyperEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HyperEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HyperEngine")
            .field("app", &self.settings.app_id)
            .field("routes", &self.routes.len())
            .field("default_middleware", &self.default_middleware)
            .field("request_logging", &self.request_logging)
            .field("metrics", &self.metrics.is_some())
            .field("collector", &self.collector)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl EngineAdapter for HyperEngine {
    fn name(&self) -> &'static str {
        NAME
    }

    fn supports(&self, _capability: Capability) -> bool {
        true
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

    fn enable_metrics(&mut self) -> Result<(), EngineError> {
        let handle = telemetry::prometheus_handle().map_err(|e| EngineError::configuration(NAME, e))?;
        self.metrics = Some(handle);
        Ok(())
    }

    fn enable_tracing(&mut self, collector: Option<String>) -> Result<(), EngineError> {
        let collector = collector.unwrap_or_else(|| DEFAULT_COLLECTOR.to_string());
        info!(parent: &self.settings.span, collector = %collector, "request tracing enabled");
        self.collector = Some(collector);
        Ok(())
    }

    fn mount_static_frontend(&mut self, bundle: StaticBundle) -> Result<(), EngineError> {
        self.frontend = Some(bundle);
        Ok(())
    }

    async fn run(&mut self, host: &str, port: u16) -> Result<(), EngineError> {
        let listener = TcpListener::bind((host, port)).await.map_err(|e| EngineError::bind(format!("{host}:{port}"), e))?;
        info!(parent: &self.settings.span, host, port, "start listening");

        let service = Arc::new(Service {
            app: self.settings.app_id.clone(),
            span: self.settings.span.clone(),
            routes: std::mem::take(&mut self.routes),
            default_middleware: self.default_middleware,
            request_logging: self.request_logging,
            metrics: self.metrics.clone(),
            tracing: self.collector.is_some(),
            frontend: self.frontend.clone(),
        });

        let mut failures = 0;
        loop {
            let (stream, peer) = tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok(stream_and_peer) => {
                        failures = 0;
                        stream_and_peer
                    }
                    Err(e) => {
                        let pause = accept_backoff(failures);
                        failures = failures.saturating_add(1);
                        warn!(parent: &service.span, cause = %e, pause_ms = pause.as_millis(), "failed to accept");
                        tokio::time::sleep(pause).await;
                        continue;
                    }
                },
                () = self.shutdown.cancelled() => {
                    info!(parent: &service.span, "shutdown requested, stop accepting");
                    break;
                }
            };

            let service = Arc::clone(&service);
            let span = service.span.clone();
            tokio::spawn(
                async move {
                    let svc = service_fn(move |req| {
                        let service = Arc::clone(&service);
                        async move { Ok::<_, Infallible>(service.handle(req, peer).await) }
                    });
                    if let Err(e) = http1::Builder::new().serve_connection(TokioIo::new(stream), svc).await {
                        debug!(cause = %e, %peer, "connection closed with error");
                    }
                }
                .instrument(span),
            );
        }

        Ok(())
    }
}

/// Immutable per-run state shared by every connection.
struct Service {
    app: String,
    span: Span,
    routes: RouteTable,
    default_middleware: bool,
    request_logging: bool,
    metrics: Option<PrometheusHandle>,
    tracing: bool,
    frontend: Option<StaticBundle>,
}

impl Service {
    async fn handle(&self, req: Request<Incoming>, peer: SocketAddr) -> http::Response<Full<Bytes>> {
        let started = Instant::now();
        let (method, uri) = (req.method().clone(), req.uri().clone());
        let request_id = self.default_middleware.then(|| dispatch::request_id(req.headers()));

        let mut response = if self.tracing {
            let span = info_span!(
                "request",
                otel.kind = "server",
                http.method = %method,
                http.route = uri.path(),
                http.status_code = Empty,
                trace_id = Empty,
            );
            if let Some(trace_id) = dispatch::trace_id(req.headers()) {
                span.record("trace_id", trace_id.as_str());
            }
            let response = self.route(req).instrument(span.clone()).await;
            span.record("http.status_code", response.status().as_u16());
            response
        } else {
            self.route(req).await
        };

        if let Some(request_id) = request_id {
            dispatch::decorate(response.headers_mut(), request_id);
        }
        if self.metrics.is_some() {
            telemetry::record_request(&self.app, &method, response.status(), started.elapsed());
        }
        if self.request_logging {
            info!(method = %method, status = response.status().as_u16(), uri = %uri, peer = %peer, "request");
        }

        response.map(Full::new)
    }

    async fn route(&self, req: Request<Incoming>) -> http::Response<Bytes> {
        if self.default_middleware && dispatch::is_preflight(req.method(), req.headers()) {
            return dispatch::preflight_response(req.headers());
        }

        if let Some(handle) = &self.metrics
            && req.method() == Method::GET
            && req.uri().path() == "/metrics"
        {
            let mut response = http::Response::new(Bytes::from(handle.render()));
            response.headers_mut().insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain; version=0.0.4"));
            return response;
        }

        let (parts, body) = req.into_parts();
        match self.routes.lookup(&parts.method, parts.uri.path()) {
            Lookup::Found { chain, params } => {
                let body = match body.collect().await {
                    Ok(collected) => collected.to_bytes(),
                    Err(e) => {
                        error!(cause = %e, "failed to read request body");
                        return dispatch::bad_request(format!("failed to read request body: {e}"));
                    }
                };
                invoke(chain, &parts, params, body, self.default_middleware).await
            }
            Lookup::MethodNotAllowed { allow } => dispatch::method_not_allowed(&allow),
            Lookup::NotFound => self
                .frontend
                .as_ref()
                .filter(|_| parts.method == Method::GET || parts.method == Method::HEAD)
                .and_then(|bundle| frontend::serve(bundle, parts.uri.path()))
                .unwrap_or_else(dispatch::not_found),
        }
    }
}
