//! Application options and their merge rule.
//!
//! Every field is optional so that "not set" stays distinguishable from "set to the default".
//! Option sets are merged left to right: a field set later overrides, a field left unset keeps
//! whatever an earlier set resolved. Defaults only come in when reading the resolved
//! [`AppConfig`].

use crate::engine::StaticBundle;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub const DEFAULT_ID: &str = "gantry";
pub const DEFAULT_VERSION: &str = "0.0.0";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_DOCS_PATH: &str = "/docs";

/// Prefix of the environment variables read by [`AppOptions::from_env`].
pub const ENV_PREFIX: &str = "GANTRY_";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppOptions {
    pub id: Option<String>,
    pub version: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub banner: Option<bool>,
    pub request_logging: Option<bool>,
    pub default_middleware: Option<bool>,
    pub metrics: Option<bool>,
    pub tracing: Option<bool>,
    /// Span collector endpoint; setting it turns tracing on.
    pub tracing_collector: Option<String>,
    pub docs_path: Option<String>,
    /// Addresses the service is reachable on, used for the banner and the document's server list.
    pub server_addresses: Option<Vec<String>>,
    /// Log failed option applications instead of aborting.
    pub best_effort: Option<bool>,
    #[serde(skip)]
    pub static_frontend: Option<StaticBundle>,
}

impl AppOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overlays `other` onto `self`; fields `other` leaves unset keep their current value.
    ///
    /// ```
    /// use gantry_core::AppOptions;
    ///
    /// let merged = AppOptions::new().id("svc").port(7000).merge(AppOptions::new().port(7001));
    /// assert_eq!(merged.id.as_deref(), Some("svc"));
    /// assert_eq!(merged.port, Some(7001));
    /// ```
    #[must_use]
    pub fn merge(self, other: AppOptions) -> AppOptions {
        AppOptions {
            id: other.id.or(self.id),
            version: other.version.or(self.version),
            host: other.host.or(self.host),
            port: other.port.or(self.port),
            banner: other.banner.or(self.banner),
            request_logging: other.request_logging.or(self.request_logging),
            default_middleware: other.default_middleware.or(self.default_middleware),
            metrics: other.metrics.or(self.metrics),
            tracing: other.tracing.or(self.tracing),
            tracing_collector: other.tracing_collector.or(self.tracing_collector),
            docs_path: other.docs_path.or(self.docs_path),
            server_addresses: other.server_addresses.or(self.server_addresses),
            best_effort: other.best_effort.or(self.best_effort),
            static_frontend: other.static_frontend.or(self.static_frontend),
        }
    }

    /// Merges `sets` left to right.
    pub fn merge_all(sets: impl IntoIterator<Item = AppOptions>) -> AppOptions {
        sets.into_iter().fold(AppOptions::default(), AppOptions::merge)
    }

    /// Reads `GANTRY_*` variables, e.g. `GANTRY_PORT=9000` or `GANTRY_SERVER_ADDRESSES=10.0.0.1,10.0.0.2`.
    pub fn from_env() -> Result<AppOptions, ConfigError> {
        Self::from_vars(std::env::vars())
    }

    /// Same as [`from_env`](Self::from_env), over an explicit set of variables.
    pub fn from_vars<I, K, V>(vars: I) -> Result<AppOptions, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut options = AppOptions::default();
        for (key, value) in vars {
            let Some(name) = key.as_ref().strip_prefix(ENV_PREFIX) else { continue };
            let var = key.as_ref();
            let value: String = value.into();
            match name {
                "ID" => options.id = Some(value),
                "VERSION" => options.version = Some(value),
                "HOST" => options.host = Some(value),
                "PORT" => options.port = Some(parse(var, &value)?),
                "BANNER" => options.banner = Some(parse_bool(var, &value)?),
                "REQUEST_LOGGING" => options.request_logging = Some(parse_bool(var, &value)?),
                "DEFAULT_MIDDLEWARE" => options.default_middleware = Some(parse_bool(var, &value)?),
                "METRICS" => options.metrics = Some(parse_bool(var, &value)?),
                "TRACING" => options.tracing = Some(parse_bool(var, &value)?),
                "TRACING_COLLECTOR" => options.tracing_collector = Some(value),
                "DOCS_PATH" => options.docs_path = Some(value),
                "SERVER_ADDRESSES" => {
                    options.server_addresses =
                        Some(value.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect());
                }
                "BEST_EFFORT" => options.best_effort = Some(parse_bool(var, &value)?),
                _ => tracing::debug!(var, "ignoring unknown option variable"),
            }
        }
        Ok(options)
    }

    /// Parses a TOML document whose top-level keys are the option field names.
    pub fn from_toml_str(source: &str) -> Result<AppOptions, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    /// Application id, used in logs and as the document title.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Version reported in the OpenAPI `info` block.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Interface to bind.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Port to bind; `0` picks a free one.
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Logs the listening urls and docs location before the engine starts.
    pub fn banner(mut self, enabled: bool) -> Self {
        self.banner = Some(enabled);
        self
    }

    /// Emits one log event per request.
    pub fn request_logging(mut self, enabled: bool) -> Self {
        self.request_logging = Some(enabled);
        self
    }

    /// Installs request id and CORS decoration.
    pub fn default_middleware(mut self, enabled: bool) -> Self {
        self.default_middleware = Some(enabled);
        self
    }

    /// Exposes Prometheus metrics at `/metrics`.
    pub fn metrics(mut self, enabled: bool) -> Self {
        self.metrics = Some(enabled);
        self
    }

    /// Propagates trace ids from `traceparent`.
    pub fn tracing(mut self, enabled: bool) -> Self {
        self.tracing = Some(enabled);
        self
    }

    /// Collector endpoint for exported spans.
    pub fn tracing_collector(mut self, url: impl Into<String>) -> Self {
        self.tracing_collector = Some(url.into());
        self
    }

    /// Path the OpenAPI document is served from.
    pub fn docs_path(mut self, path: impl Into<String>) -> Self {
        self.docs_path = Some(path.into());
        self
    }

    /// Replaces the server list in the document.
    pub fn server_addresses<S: Into<String>>(mut self, addresses: impl IntoIterator<Item = S>) -> Self {
        self.server_addresses = Some(addresses.into_iter().map(Into::into).collect());
        self
    }

    /// Downgrades unsupported capabilities to warnings.
    pub fn best_effort(mut self, enabled: bool) -> Self {
        self.best_effort = Some(enabled);
        self
    }

    /// Serves a bundle of static assets for unmatched `GET` requests.
    pub fn static_frontend(mut self, bundle: StaticBundle) -> Self {
        self.static_frontend = Some(bundle);
        self
    }

    /// Fills unset fields with their defaults.
    pub fn resolve(&self) -> AppConfig {
        let host = self.host.clone().unwrap_or_else(|| DEFAULT_HOST.to_string());
        let server_addresses = self.server_addresses.clone().unwrap_or_else(|| {
            let reachable = if host == "0.0.0.0" { "127.0.0.1".to_string() } else { host.clone() };
            vec![reachable]
        });

        AppConfig {
            id: self.id.clone().unwrap_or_else(|| DEFAULT_ID.to_string()),
            version: self.version.clone().unwrap_or_else(|| DEFAULT_VERSION.to_string()),
            host,
            port: self.port.unwrap_or(DEFAULT_PORT),
            banner: self.banner.unwrap_or(true),
            request_logging: self.request_logging.unwrap_or(false),
            default_middleware: self.default_middleware.unwrap_or(false),
            metrics: self.metrics.unwrap_or(false),
            tracing: self.tracing.unwrap_or(false) || self.tracing_collector.is_some(),
            tracing_collector: self.tracing_collector.clone(),
            docs_path: self.docs_path.clone().unwrap_or_else(|| DEFAULT_DOCS_PATH.to_string()),
            server_addresses,
            best_effort: self.best_effort.unwrap_or(false),
        }
    }
}

/// Options with every default filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub id: String,
    pub version: String,
    pub host: String,
    pub port: u16,
    pub banner: bool,
    pub request_logging: bool,
    pub default_middleware: bool,
    pub metrics: bool,
    pub tracing: bool,
    pub tracing_collector: Option<String>,
    pub docs_path: String,
    pub server_addresses: Vec<String>,
    pub best_effort: bool,
}

fn parse<T>(var: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: ToString,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Env { var: var.to_string(), reason: e.to_string() })
}

fn parse_bool(var: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Env { var: var.to_string(), reason: format!("expected a boolean, got '{other}'") }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn later_sets_override_and_unset_fields_survive() {
        let merged = AppOptions::merge_all([
            AppOptions::new().id("first").port(1000).banner(false),
            AppOptions::new().port(2000),
            AppOptions::new().host("127.0.0.1"),
        ]);

        assert_eq!(merged.id.as_deref(), Some("first"));
        assert_eq!(merged.port, Some(2000));
        assert_eq!(merged.banner, Some(false));
        assert_eq!(merged.host.as_deref(), Some("127.0.0.1"));
    }

    #[test]
    fn collections_are_replaced_not_appended() {
        let merged = AppOptions::new()
            .server_addresses(["10.0.0.1", "10.0.0.2"])
            .merge(AppOptions::new().server_addresses(["192.168.0.1"]));
        assert_eq!(merged.server_addresses, Some(vec!["192.168.0.1".to_string()]));

        let kept = AppOptions::new().server_addresses(["10.0.0.1"]).merge(AppOptions::new());
        assert_eq!(kept.server_addresses, Some(vec!["10.0.0.1".to_string()]));
    }

    #[test]
    fn merge_with_empty_set_is_identity() {
        let options = AppOptions::new().id("svc").metrics(true).tracing_collector("http://collector");
        let merged = options.clone().merge(AppOptions::new());
        assert_eq!(merged.resolve(), options.resolve());
    }

    #[test]
    fn resolve_fills_defaults() {
        let config = AppOptions::new().resolve();
        assert_eq!(config.id, DEFAULT_ID);
        assert_eq!(config.version, DEFAULT_VERSION);
        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.docs_path, DEFAULT_DOCS_PATH);
        assert_eq!(config.server_addresses, ["127.0.0.1"]);
        assert!(config.banner);
        assert!(!config.metrics && !config.tracing && !config.best_effort);

        assert!(AppOptions::new().tracing_collector("http://c").resolve().tracing);
        assert_eq!(AppOptions::new().host("10.1.1.1").resolve().server_addresses, ["10.1.1.1"]);
    }

    #[test]
    fn reads_prefixed_variables() {
        let options = AppOptions::from_vars([
            ("GANTRY_ID", "env"),
            ("GANTRY_PORT", "9100"),
            ("GANTRY_METRICS", "yes"),
            ("GANTRY_SERVER_ADDRESSES", "10.0.0.1, 10.0.0.2"),
            ("HOME", "/root"),
        ])
        .unwrap();

        assert_eq!(options.id.as_deref(), Some("env"));
        assert_eq!(options.port, Some(9100));
        assert_eq!(options.metrics, Some(true));
        assert_eq!(options.server_addresses, Some(vec!["10.0.0.1".to_string(), "10.0.0.2".to_string()]));
        assert!(options.host.is_none());
    }

    #[test]
    fn rejects_malformed_variables() {
        let err = AppOptions::from_vars([("GANTRY_PORT", "eighty")]).unwrap_err();
        assert!(err.to_string().starts_with("environment variable GANTRY_PORT"));
        assert!(AppOptions::from_vars([("GANTRY_BANNER", "maybe")]).is_err());
    }

    #[test]
    fn parses_toml() {
        let options = AppOptions::from_toml_str(indoc! {r#"
            id = "toml"
            port = 7777
            request_logging = true
            server_addresses = ["127.0.0.1"]
        "#})
        .unwrap();

        assert_eq!(options.id.as_deref(), Some("toml"));
        assert_eq!(options.port, Some(7777));
        assert_eq!(options.request_logging, Some(true));
        assert!(options.metrics.is_none());

        assert!(AppOptions::from_toml_str("prot = 1").is_err());
    }
}
