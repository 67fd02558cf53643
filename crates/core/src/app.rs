//! The application façade: options, one engine, routes and the document they produce.
//!
//! ```no_run
//! # async fn demo<E: gantry_core::EngineAdapter>(engine: E) -> Result<(), gantry_core::AppError> {
//! use gantry_core::{handler_fn, App, AppOptions, Context, Response, Route};
//! use std::sync::Arc;
//!
//! async fn hello(ctx: Arc<Context>) -> Response {
//!     ctx.json("hello")
//! }
//!
//! let mut app = App::create(engine, [AppOptions::new().id("hello").port(8080)])?;
//! app.register_routes([Route::get::<String>("/hello", handler_fn(hello))])?;
//! app.run().await
//! # }
//! ```

use crate::context::Context;
use crate::engine::{Capability, EngineAdapter, EngineSettings, StaticBundle};
use crate::error::{AppError, EngineError, SpecError};
use crate::handler::{HandlerChain, handler_fn};
use crate::options::{AppConfig, AppOptions};
use crate::route::Route;
use crate::router::Router;
use crate::spec::{ApiInfo, Document, SecurityScheme, SpecBuilder};
use http::Method;
use std::fmt;
use std::sync::Arc;
use tracing::{Instrument, Span, debug, info, info_span, warn};

pub struct App<E> {
    engine: E,
    options: AppOptions,
    config: AppConfig,
    spec: SpecBuilder,
    span: Span,
}

impl<E: EngineAdapter> fmt::Debug for App<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("engine", &self.engine.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<E: EngineAdapter> App<E> {
    /// Merges `option_sets` left to right, configures `engine` and applies the capability toggles
    /// the options ask for.
    pub fn create(mut engine: E, option_sets: impl IntoIterator<Item = AppOptions>) -> Result<Self, AppError> {
        let options = AppOptions::merge_all(option_sets);
        let config = options.resolve();
        let span = info_span!("app", id = %config.id, engine = engine.name());

        engine.configure(&EngineSettings::new(config.id.clone()).with_span(span.clone()))?;

        let spec = SpecBuilder::new(ApiInfo::new(config.id.clone(), config.version.clone()));
        let mut app = Self { engine, options, config, spec, span };

        if app.config.default_middleware {
            app.apply("default_middleware", Capability::DefaultMiddleware, EngineAdapter::enable_default_middleware)?;
        }
        if app.config.request_logging {
            app.apply("request_logging", Capability::RequestLogging, EngineAdapter::enable_request_logging)?;
        }
        if app.config.metrics {
            app.apply("metrics", Capability::Metrics, EngineAdapter::enable_metrics)?;
        }
        if app.config.tracing {
            let collector = app.config.tracing_collector.clone();
            app.apply("tracing_collector", Capability::Tracing, |engine| engine.enable_tracing(collector))?;
        }
        if let Some(bundle) = app.options.static_frontend.clone() {
            app.apply("static_frontend", Capability::StaticFrontend, |engine| engine.mount_static_frontend(bundle))?;
        }

        Ok(app)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn options(&self) -> &AppOptions {
        &self.options
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn supports(&self, capability: Capability) -> bool {
        self.engine.supports(capability)
    }

    pub fn enable_default_middleware(&mut self) -> Result<&mut Self, AppError> {
        self.apply("default_middleware", Capability::DefaultMiddleware, EngineAdapter::enable_default_middleware)?;
        Ok(self)
    }

    pub fn enable_request_logging(&mut self) -> Result<&mut Self, AppError> {
        self.apply("request_logging", Capability::RequestLogging, EngineAdapter::enable_request_logging)?;
        Ok(self)
    }

    pub fn enable_metrics(&mut self) -> Result<&mut Self, AppError> {
        self.apply("metrics", Capability::Metrics, EngineAdapter::enable_metrics)?;
        Ok(self)
    }

    pub fn enable_tracing(&mut self, collector: Option<String>) -> Result<&mut Self, AppError> {
        self.apply("tracing_collector", Capability::Tracing, |engine| engine.enable_tracing(collector))?;
        Ok(self)
    }

    pub fn mount_static_frontend(&mut self, bundle: StaticBundle) -> Result<&mut Self, AppError> {
        self.apply("static_frontend", Capability::StaticFrontend, |engine| engine.mount_static_frontend(bundle))?;
        Ok(self)
    }

    /// Replaces the document metadata; the title and version default to the app id and version.
    pub fn with_api_info(&mut self, info: ApiInfo) -> &mut Self {
        self.spec.set_info(info);
        self
    }

    pub fn with_security(&mut self, name: impl Into<String>, scheme: SecurityScheme) -> &mut Self {
        self.spec.with_security_scheme(name, scheme);
        self
    }

    /// Documents an OAuth2 implicit flow against an OpenID Connect authorization endpoint.
    pub fn with_oidc(&mut self, authorization_url: impl Into<String>) -> &mut Self {
        self.spec.with_oidc(authorization_url);
        self
    }

    /// Registers routes without prefix or group tag.
    pub fn register_routes(&mut self, routes: impl IntoIterator<Item = Route>) -> Result<&mut Self, AppError> {
        self.spec.begin_group();
        for route in routes {
            self.register_route(route)?;
        }
        Ok(self)
    }

    /// Registers the routes of `router` under its prefix and group tag.
    pub fn register_router(&mut self, router: Router) -> Result<&mut Self, AppError> {
        let (prefix, group, routes) = router.into_parts();
        self.spec.begin_group();
        if let Some(prefix) = prefix {
            self.spec.with_prefix(prefix);
        }
        if let Some(group) = group {
            self.spec.with_group_tag(group);
        }
        for route in routes {
            self.register_route(route)?;
        }
        Ok(self)
    }

    /// Runs `register` against this app, for grouping registrations in one place.
    pub fn register<F>(&mut self, register: F) -> Result<&mut Self, AppError>
    where
        F: FnOnce(&mut Self) -> Result<(), AppError>,
    {
        register(self)?;
        Ok(self)
    }

    /// Builds the document for everything registered so far.
    pub fn document(&self) -> Result<Document, AppError> {
        Ok(self.spec.build(&self.config.server_addresses, self.config.port)?)
    }

    /// Builds the document, serves it at the docs path and runs the engine until it stops.
    pub async fn run(mut self) -> Result<(), AppError> {
        let document = self.document()?;
        let openapi = Arc::new(document.to_openapi());

        let docs = handler_fn(move |ctx: Arc<Context>| {
            let openapi = Arc::clone(&openapi);
            async move { ctx.json(&*openapi) }
        });
        self.engine.register_route(Method::GET, &self.config.docs_path, HandlerChain::new(docs))?;

        self.span.in_scope(|| {
            if self.config.banner {
                for url in document.servers() {
                    info!(url = %url, openapi = %format!("{url}{}", self.config.docs_path), "listening");
                }
                info!("{} started with {}", self.config.id, self.engine.name());
            }
            debug!(operations = document.operations().len(), "document built");
        });

        let span = self.span.clone();
        let (host, port) = (self.config.host.clone(), self.config.port);
        self.engine.run(&host, port).instrument(span).await?;
        Ok(())
    }

    fn register_route(&mut self, route: Route) -> Result<(), AppError> {
        let (chain, fragment) = route.into_parts();
        let method = fragment.method();
        let resolved = self.spec.resolve_path(fragment.path());

        if let Some(first) = self.spec.conflict(method, &resolved) {
            return Err(SpecError::DuplicateOperation {
                method: method.as_method(),
                path: resolved,
                first,
                second: fragment.location(),
            }
            .into());
        }

        let native = method.as_method();
        if !self.engine.supports_method(&native) {
            return Err(EngineError::configuration(self.engine.name(), format!("method {native} is not supported")).into());
        }

        self.engine.register_route(native, &resolved, chain)?;
        debug!(parent: &self.span, method = %method, path = %resolved, "route registered");
        self.spec.register_fragment(fragment);
        Ok(())
    }

    // fail fast unless the app runs best effort, in which case the failure is only logged
    fn apply<F>(&mut self, option: &'static str, capability: Capability, enable: F) -> Result<(), AppError>
    where
        F: FnOnce(&mut E) -> Result<(), EngineError>,
    {
        let result = if self.engine.supports(capability) {
            enable(&mut self.engine)
        } else {
            Err(EngineError::unsupported(self.engine.name(), capability))
        };

        match result {
            Ok(()) => {
                debug!(parent: &self.span, option, "option applied");
                Ok(())
            }
            Err(source) if self.config.best_effort => {
                warn!(parent: &self.span, option, cause = %source, "option could not be applied");
                Ok(())
            }
            Err(source) => Err(AppError::Option { option, source }),
        }
    }
}
