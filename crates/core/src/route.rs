//! Route descriptors and the typed builders that declare them.
//!
//! A [`Route`] pairs the runtime dispatch entry (method, path template, [`HandlerChain`]) with the
//! [`Fragment`] that documents it. One builder exists per method; each is generic over the
//! response shape and, for body-carrying methods, the request-body shape:
//!
//! ```
//! use gantry_core::{describe, handler_fn, Context, Route};
//! use serde::Serialize;
//! use std::sync::Arc;
//!
//! describe! {
//!     #[derive(Serialize)]
//!     pub struct Item {
//!         pub id: String,
//!     }
//! }
//!
//! async fn get_item(ctx: Arc<Context>) -> gantry_core::Response {
//!     let id = ctx.param("id").unwrap_or_default().to_string();
//!     ctx.json(&Item { id })
//! }
//!
//! let route = Route::get::<Item>("/items/:id", handler_fn(get_item)).summary("Fetch one item").tag("Items");
//! assert_eq!(route.fragment().operation_id(), "getItemsById");
//! ```

use crate::handler::{Handler, HandlerChain};
use crate::path::{self, Segment};
use crate::schema::{Definitions, Describe, Schema};
use http::{Method, StatusCode};
use indexmap::IndexMap;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Methods a route can be declared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_method(self) -> Method {
        match self {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Delete => Method::DELETE,
        }
    }

    /// Lower-case name, as used for OpenAPI path item keys.
    pub fn as_lower_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "get",
            HttpMethod::Post => "post",
            HttpMethod::Put => "put",
            HttpMethod::Patch => "patch",
            HttpMethod::Delete => "delete",
        }
    }

    /// Whether requests of this method carry a meaningful body.
    pub fn carries_body(self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }
}

impl From<HttpMethod> for Method {
    fn from(method: HttpMethod) -> Self {
        method.as_method()
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_method().as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamLocation {
    Query,
    Header,
    Path,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    name: String,
    location: ParamLocation,
    required: bool,
}

impl Parameter {
    pub fn new(name: impl Into<String>, location: ParamLocation, required: bool) -> Self {
        Self { name: name.into(), location, required }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location(&self) -> ParamLocation {
        self.location
    }

    pub fn required(&self) -> bool {
        self.required
    }
}

/// Documentation of a single operation, before prefix and group tag are applied.
#[derive(Debug, Clone)]
pub struct Fragment {
    method: HttpMethod,
    path: String,
    operation_id: Option<String>,
    summary: Option<String>,
    description: Option<String>,
    tags: Vec<String>,
    parameters: IndexMap<String, Parameter>,
    request_body: Option<Schema>,
    responses: IndexMap<u16, Schema>,
    definitions: Definitions,
    location: &'static Location<'static>,
}

impl Fragment {
    pub fn new(method: HttpMethod, path: impl Into<String>, location: &'static Location<'static>) -> Self {
        let path = path.into();
        let parameters = path::param_names(&path)
            .into_iter()
            .map(|name| (name.to_string(), Parameter::new(name, ParamLocation::Path, true)))
            .collect();

        Self {
            method,
            path,
            operation_id: None,
            summary: None,
            description: None,
            tags: Vec::new(),
            parameters,
            request_body: None,
            responses: IndexMap::new(),
            definitions: Definitions::new(),
            location,
        }
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    /// Path template as declared, before any group prefix.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The explicit operation id, or one derived from method and path (`GET /items/:id` → `getItemsById`).
    pub fn operation_id(&self) -> String {
        self.operation_id.clone().unwrap_or_else(|| derive_operation_id(self.method, &self.path))
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn parameters(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.values()
    }

    pub fn request_body(&self) -> Option<&Schema> {
        self.request_body.as_ref()
    }

    pub fn responses(&self) -> &IndexMap<u16, Schema> {
        &self.responses
    }

    /// Named objects referenced by the body and response schemas.
    pub fn definitions(&self) -> &Definitions {
        &self.definitions
    }

    /// Where the route was declared.
    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }

    /// Declares a parameter; a later declaration with the same name replaces the earlier one.
    pub fn add_parameter(&mut self, parameter: Parameter) {
        self.parameters.insert(parameter.name.clone(), parameter);
    }

    /// Sets the schema for `status`, replacing any previous one.
    pub fn set_response(&mut self, status: StatusCode, schema: Schema) {
        self.responses.insert(status.as_u16(), schema);
    }

    /// Records the named objects of `T` so references to them resolve.
    pub fn add_definitions<T: Describe + ?Sized>(&mut self) {
        T::definitions(&mut self.definitions);
    }

    /// Sets the request body schema; the empty schema means no body.
    pub fn set_request_body(&mut self, schema: Schema) {
        if !schema.is_empty() {
            self.request_body = Some(schema);
        }
    }

    pub(crate) fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub(crate) fn with_path(mut self, path: String) -> Self {
        self.path = path;
        self
    }
}

fn derive_operation_id(method: HttpMethod, path: &str) -> String {
    let mut id = method.as_lower_str().to_string();
    let mut any = false;
    for segment in path::segments(path) {
        any = true;
        match segment {
            Segment::Static(s) => push_camel(&mut id, s),
            Segment::Param(name) | Segment::CatchAll(name) => {
                id.push_str("By");
                push_camel(&mut id, name);
            }
        }
    }
    if !any {
        id.push_str("Root");
    }
    id
}

// "order-items" and "order_items" both become "OrderItems"
fn push_camel(out: &mut String, word: &str) {
    for part in word.split(|c: char| !c.is_ascii_alphanumeric()).filter(|p| !p.is_empty()) {
        let mut chars = part.chars();
        if let Some(first) = chars.next() {
            out.push(first.to_ascii_uppercase());
            out.extend(chars);
        }
    }
}

/// A declared endpoint: method, path template, handler chain and its documentation fragment.
#[derive(Debug, Clone)]
pub struct Route {
    chain: HandlerChain,
    fragment: Fragment,
}

impl Route {
    /// Declares a `GET` route answering with `T`.
    #[track_caller]
    pub fn get<T: Describe>(path: impl Into<String>, handler: impl Handler) -> Self {
        Self::declare(HttpMethod::Get, path.into(), T::schema(), None, Arc::new(handler)).with_definitions::<T>()
    }

    /// Declares a `DELETE` route answering with `T`; use `()` for an empty reply.
    #[track_caller]
    pub fn delete<T: Describe>(path: impl Into<String>, handler: impl Handler) -> Self {
        Self::declare(HttpMethod::Delete, path.into(), T::schema(), None, Arc::new(handler)).with_definitions::<T>()
    }

    /// Declares a `POST` route answering with `T` and accepting a `B` body.
    #[track_caller]
    pub fn post<T: Describe, B: Describe>(path: impl Into<String>, handler: impl Handler) -> Self {
        Self::declare(HttpMethod::Post, path.into(), T::schema(), Some(B::schema()), Arc::new(handler))
            .with_definitions::<T>()
            .with_definitions::<B>()
    }

    /// Declares a `PUT` route answering with `T` and accepting a `B` body.
    #[track_caller]
    pub fn put<T: Describe, B: Describe>(path: impl Into<String>, handler: impl Handler) -> Self {
        Self::declare(HttpMethod::Put, path.into(), T::schema(), Some(B::schema()), Arc::new(handler))
            .with_definitions::<T>()
            .with_definitions::<B>()
    }

    /// Declares a `PATCH` route answering with `T` and accepting a `B` body.
    #[track_caller]
    pub fn patch<T: Describe, B: Describe>(path: impl Into<String>, handler: impl Handler) -> Self {
        Self::declare(HttpMethod::Patch, path.into(), T::schema(), Some(B::schema()), Arc::new(handler))
            .with_definitions::<T>()
            .with_definitions::<B>()
    }

    #[track_caller]
    fn declare(method: HttpMethod, path: String, response: Schema, body: Option<Schema>, handler: Arc<dyn Handler>) -> Self {
        let path = if path.is_empty() { "/".to_string() } else { path };
        let mut fragment = Fragment::new(method, path, Location::caller());
        fragment.set_response(StatusCode::OK, response);
        if let Some(body) = body.filter(|_| method.carries_body()) {
            fragment.set_request_body(body);
        }

        Self { chain: HandlerChain::from_parts(handler, Vec::new()), fragment }
    }

    fn with_definitions<T: Describe>(mut self) -> Self {
        self.fragment.add_definitions::<T>();
        self
    }

    /// Appends a handler to the chain; the last appended handler produces the response.
    pub fn then(mut self, handler: impl Handler) -> Self {
        self.chain = self.chain.then(handler);
        self
    }

    /// One-line summary shown in the document.
    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.fragment.summary = Some(summary.into());
        self
    }

    /// Longer free-form description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.fragment.description = Some(description.into());
        self
    }

    /// Adds a tag; repeated tags are ignored.
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        if !self.fragment.tags.contains(&tag) {
            self.fragment.tags.push(tag);
        }
        self
    }

    /// Overrides the derived operation id.
    pub fn operation_id(mut self, id: impl Into<String>) -> Self {
        self.fragment.operation_id = Some(id.into());
        self
    }

    /// Documents an optional query parameter.
    pub fn query(mut self, name: impl Into<String>) -> Self {
        self.fragment.add_parameter(Parameter::new(name, ParamLocation::Query, false));
        self
    }

    /// Documents a mandatory query parameter.
    pub fn required_query(mut self, name: impl Into<String>) -> Self {
        self.fragment.add_parameter(Parameter::new(name, ParamLocation::Query, true));
        self
    }

    /// Documents an optional request header.
    pub fn header(mut self, name: impl Into<String>) -> Self {
        self.fragment.add_parameter(Parameter::new(name, ParamLocation::Header, false));
        self
    }

    /// Documents an additional response shape for `status`.
    pub fn response<T: Describe>(mut self, status: StatusCode) -> Self {
        self.fragment.set_response(status, T::schema());
        self.fragment.add_definitions::<T>();
        self
    }

    pub fn method(&self) -> HttpMethod {
        self.fragment.method
    }

    /// Path template as declared, before any group prefix.
    pub fn path(&self) -> &str {
        &self.fragment.path
    }

    pub fn chain(&self) -> &HandlerChain {
        &self.chain
    }

    pub fn fragment(&self) -> &Fragment {
        &self.fragment
    }

    /// Splits the route into what the engine runs and what the document describes.
    pub fn into_parts(self) -> (HandlerChain, Fragment) {
        (self.chain, self.fragment)
    }
}
