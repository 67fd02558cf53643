//! Specification synthesis: route fragments in, one API document out.
//!
//! [`SpecBuilder`] accumulates [`Fragment`]s in groups. Each group carries an optional path prefix
//! and a default tag; both are applied when the document is built, to every fragment of the group
//! no matter whether it was registered before or after the prefix/tag was set.
//!
//! [`SpecBuilder::build`] resolves paths, applies group tags, rejects duplicate operations, lists
//! the reachable servers and registers security schemes, producing an immutable [`Document`].

mod openapi;

pub use openapi::OpenApi;

use crate::error::SpecError;
use crate::path;
use crate::route::{Fragment, HttpMethod};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::panic::Location;

pub const DEFAULT_OPENAPI_VERSION: &str = "3.1.0";

/// Name under which the OAuth2 implicit flow derived from [`ApiInfo::auth_url`] is registered.
pub const OIDC_SCHEME_NAME: &str = "bearer";

/// Top-level metadata of the document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiInfo {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub version: String,
    #[serde(default)]
    pub openapi_version: Option<String>,
    /// Authorization endpoint of an OpenID Connect provider; registers an implicit OAuth2 flow.
    #[serde(default)]
    pub auth_url: Option<String>,
}

impl ApiInfo {
    pub fn new(title: impl Into<String>, version: impl Into<String>) -> Self {
        Self { title: title.into(), version: version.into(), ..Self::default() }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn openapi_version(mut self, version: impl Into<String>) -> Self {
        self.openapi_version = Some(version.into());
        self
    }

    pub fn auth_url(mut self, url: impl Into<String>) -> Self {
        self.auth_url = Some(url.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityScheme {
    /// HTTP bearer authentication, e.g. with `format = Some("JWT")`.
    Bearer { format: Option<String> },
    /// OAuth2 implicit flow.
    OAuth2Implicit { authorization_url: String, scopes: IndexMap<String, String> },
}

impl SecurityScheme {
    pub fn bearer() -> Self {
        Self::Bearer { format: None }
    }

    pub fn oauth2_implicit(authorization_url: impl Into<String>) -> Self {
        Self::OAuth2Implicit { authorization_url: authorization_url.into(), scopes: IndexMap::new() }
    }
}

#[derive(Debug, Clone, Default)]
struct Group {
    prefix: Option<String>,
    tag: Option<String>,
    fragments: Vec<Fragment>,
}

impl Group {
    fn resolve(&self, fragment: &Fragment) -> Fragment {
        let resolved = fragment.clone().with_path(path::join(self.prefix.as_deref(), fragment.path()));
        match &self.tag {
            Some(tag) if fragment.tags().is_empty() => resolved.with_tags(vec![tag.clone()]),
            _ => resolved,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SpecBuilder {
    info: ApiInfo,
    groups: Vec<Group>,
    security_schemes: IndexMap<String, SecurityScheme>,
}

impl SpecBuilder {
    pub fn new(info: ApiInfo) -> Self {
        Self { info, groups: vec![Group::default()], security_schemes: IndexMap::new() }
    }

    pub fn info(&self) -> &ApiInfo {
        &self.info
    }

    pub fn set_info(&mut self, info: ApiInfo) -> &mut Self {
        self.info = info;
        self
    }

    /// Adds one fragment to the current group.
    pub fn register_fragment(&mut self, fragment: Fragment) -> &mut Self {
        self.current().fragments.push(fragment);
        self
    }

    /// Sets the path prefix of the current group.
    pub fn with_prefix(&mut self, prefix: impl Into<String>) -> &mut Self {
        self.current().prefix = Some(prefix.into());
        self
    }

    /// Sets the tag applied to fragments of the current group that declare none.
    pub fn with_group_tag(&mut self, tag: impl Into<String>) -> &mut Self {
        self.current().tag = Some(tag.into());
        self
    }

    /// Starts a new group; later prefixes and tags no longer touch earlier fragments.
    pub fn begin_group(&mut self) -> &mut Self {
        let current = self.current();
        if current.prefix.is_some() || current.tag.is_some() || !current.fragments.is_empty() {
            self.groups.push(Group::default());
        }
        self
    }

    pub fn with_security_scheme(&mut self, name: impl Into<String>, scheme: SecurityScheme) -> &mut Self {
        self.security_schemes.insert(name.into(), scheme);
        self
    }

    /// Registers an OAuth2 implicit flow against an OpenID Connect authorization endpoint.
    pub fn with_oidc(&mut self, authorization_url: impl Into<String>) -> &mut Self {
        self.with_security_scheme(OIDC_SCHEME_NAME, SecurityScheme::oauth2_implicit(authorization_url))
    }

    /// The path a fragment registered now would resolve to.
    pub fn resolve_path(&self, path: &str) -> String {
        let prefix = self.groups.last().and_then(|g| g.prefix.as_deref());
        path::join(prefix, path)
    }

    /// Declaring location of an already registered operation resolving to `(method, path)`.
    ///
    /// Paths are compared by shape, so `/items/:id` conflicts with `/items/{name}`.
    pub fn conflict(&self, method: HttpMethod, resolved_path: &str) -> Option<&'static Location<'static>> {
        let shape = path::shape(resolved_path);
        self.groups.iter().flat_map(|group| group.fragments.iter().map(move |f| (group, f))).find_map(|(group, f)| {
            (f.method() == method && path::shape(&path::join(group.prefix.as_deref(), f.path())) == shape)
                .then(|| f.location())
        })
    }

    pub fn len(&self) -> usize {
        self.groups.iter().map(|g| g.fragments.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Builds the document.
    ///
    /// `addresses` are the hosts the service is reachable on; each distinct one becomes a server entry
    /// bound to `port`.
    pub fn build(&self, addresses: &[String], port: u16) -> Result<Document, SpecError> {
        let mut seen: HashMap<(HttpMethod, String), &'static Location<'static>> = HashMap::new();
        let mut operations = Vec::with_capacity(self.len());

        for group in &self.groups {
            for fragment in &group.fragments {
                let resolved = group.resolve(fragment);
                let key = (resolved.method(), path::shape(resolved.path()));
                if let Some(first) = seen.get(&key) {
                    return Err(SpecError::DuplicateOperation {
                        method: resolved.method().as_method(),
                        path: resolved.path().to_string(),
                        first: *first,
                        second: resolved.location(),
                    });
                }
                seen.insert(key, resolved.location());
                operations.push(resolved);
            }
        }

        let mut servers: Vec<String> = Vec::with_capacity(addresses.len());
        for host in addresses {
            let url = format!("http://{host}:{port}");
            if !servers.contains(&url) {
                servers.push(url);
            }
        }

        let mut security_schemes = self.security_schemes.clone();
        if let Some(url) = self.info.auth_url.as_deref().filter(|url| !url.is_empty()) {
            security_schemes
                .entry(OIDC_SCHEME_NAME.to_string())
                .or_insert_with(|| SecurityScheme::oauth2_implicit(url));
        }

        Ok(Document {
            title: self.info.title.clone(),
            description: self.info.description.clone(),
            version: self.info.version.clone(),
            openapi_version: self.info.openapi_version.clone().unwrap_or_else(|| DEFAULT_OPENAPI_VERSION.to_string()),
            servers,
            security_schemes,
            operations,
        })
    }

    fn current(&mut self) -> &mut Group {
        if self.groups.is_empty() {
            self.groups.push(Group::default());
        }
        let last = self.groups.len() - 1;
        &mut self.groups[last]
    }
}

/// The assembled, read-only description of every registered operation.
#[derive(Debug, Clone)]
pub struct Document {
    title: String,
    description: Option<String>,
    version: String,
    openapi_version: String,
    servers: Vec<String>,
    security_schemes: IndexMap<String, SecurityScheme>,
    operations: Vec<Fragment>,
}

impl Document {
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn openapi_version(&self) -> &str {
        &self.openapi_version
    }

    pub fn servers(&self) -> &[String] {
        &self.servers
    }

    pub fn security_schemes(&self) -> &IndexMap<String, SecurityScheme> {
        &self.security_schemes
    }

    /// Operations in registration order, with prefixes and group tags applied.
    pub fn operations(&self) -> &[Fragment] {
        &self.operations
    }

    /// Looks an operation up by method and path, in either parameter spelling.
    pub fn operation(&self, method: HttpMethod, path: &str) -> Option<&Fragment> {
        let shape = path::shape(path);
        self.operations.iter().find(|op| op.method() == method && path::shape(op.path()) == shape)
    }

    pub fn to_openapi(&self) -> OpenApi {
        openapi::render(self)
    }

    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self.to_openapi())
    }
}
