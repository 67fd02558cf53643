//! The normalized per-request view handed to handlers, and the reply they produce.
//!
//! - [`Context`]: path parameters, query parameters, headers, body bytes and a [`RequestScope`]
//! - [`Response`]: a JSON payload plus a status code
//!
//! Engines build one `Context` per inbound request, wrap it in an [`Arc`] and share it
//! read-only with every handler of the chain.

use crate::error::ExtractError;
use bytes::Bytes;
use http::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::error;

/// A normalized, read-only view of one inbound request.
///
/// All mapping-typed fields are always present, even when empty.
#[derive(Debug, Clone, Default)]
pub struct Context {
    params: HashMap<String, String>,
    query: HashMap<String, String>,
    headers: HashMap<String, String>,
    body: Bytes,
    scope: RequestScope,
}

impl Context {
    /// Empty context with a fresh request scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Path parameters captured by the router.
    pub fn with_params(mut self, params: HashMap<String, String>) -> Self {
        self.params = params;
        self
    }

    /// Query parameters, first value per key.
    pub fn with_query(mut self, query: HashMap<String, String>) -> Self {
        self.query = query;
        self
    }

    /// Header map with canonical names.
    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    /// Raw request body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Replaces the default scope, e.g. with one that carries a deadline.
    pub fn with_request_scope(mut self, scope: RequestScope) -> Self {
        self.scope = scope;
        self
    }

    /// Path parameters.
    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    /// A single path parameter.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Query parameters.
    pub fn query(&self) -> &HashMap<String, String> {
        &self.query
    }

    /// A single query parameter.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    /// Headers, keyed by canonical name.
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Looks a header up ignoring ASCII case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().find(|(key, _)| key.eq_ignore_ascii_case(name)).map(|(_, value)| value.as_str())
    }

    /// Raw body bytes; empty when the request had none.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Cancellation and deadline of this request.
    pub fn scope(&self) -> &RequestScope {
        &self.scope
    }

    /// Deserializes the path parameters into `P`.
    pub fn params_as<P: DeserializeOwned>(&self) -> Result<P, ExtractError> {
        from_string_map(&self.params, "path parameters")
    }

    /// Deserializes the query parameters into `Q`.
    pub fn query_as<Q: DeserializeOwned>(&self) -> Result<Q, ExtractError> {
        from_string_map(&self.query, "query")
    }

    /// Deserializes the headers into `H`; field names are matched against lower-cased header names.
    pub fn headers_as<H: DeserializeOwned>(&self) -> Result<H, ExtractError> {
        let lowered = self.headers.iter().map(|(k, v)| (k.to_ascii_lowercase(), v.clone())).collect();
        from_string_map(&lowered, "headers")
    }

    /// Deserializes the body as JSON into `B`.
    pub fn body_json<B: DeserializeOwned>(&self) -> Result<B, ExtractError> {
        serde_json::from_slice(&self.body).map_err(|e| ExtractError::invalid("body", e))
    }

    /// Builds a 200 response carrying `data`, linked back to this context.
    pub fn json<T: Serialize + ?Sized>(self: &Arc<Self>, data: &T) -> Response {
        let mut response = Response::json(data);
        response.context = Arc::downgrade(self);
        response
    }
}

// string maps go through the urlencoded format so numeric and boolean fields parse from text
fn from_string_map<T: DeserializeOwned>(map: &HashMap<String, String>, part: &'static str) -> Result<T, ExtractError> {
    let encoded = serde_urlencoded::to_string(map).map_err(|e| ExtractError::invalid(part, e))?;
    serde_urlencoded::from_str(&encoded).map_err(|e| ExtractError::invalid(part, e))
}

/// Cancellation and deadline of a single request.
///
/// Engines cancel the scope when the request future is dropped, e.g. because the client went away.
/// Long running handlers should race their work against [`RequestScope::cancelled`].
#[derive(Debug, Clone, Default)]
pub struct RequestScope {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestScope {
    /// A scope with no deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the instant after which the scope counts as cancelled.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cancels the scope and every clone of it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// True once cancelled or past the deadline.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled() || self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Resolves once the request is cancelled or its deadline has passed.
    pub async fn cancelled(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    () = self.token.cancelled() => {}
                    () = tokio::time::sleep_until(deadline.into()) => {}
                }
            }
            None => self.token.cancelled().await,
        }
    }

    /// Returns a guard that cancels this scope when dropped.
    pub fn cancel_on_drop(&self) -> DropGuard {
        self.token.clone().drop_guard()
    }
}

/// The reply produced by the terminal handler of a chain.
#[derive(Debug, Clone)]
pub struct Response {
    payload: serde_json::Value,
    status: StatusCode,
    context: Weak<Context>,
}

impl Response {
    /// Builds a 200 response from any serializable value.
    ///
    /// A value that cannot be represented as JSON turns into a 500 response describing the failure.
    pub fn json<T: Serialize + ?Sized>(data: &T) -> Self {
        match serde_json::to_value(data) {
            Ok(payload) => Self { payload, status: StatusCode::OK, context: Weak::new() },
            Err(e) => {
                error!(cause = %e, "response payload is not representable as json");
                Self {
                    payload: serde_json::json!({ "error": e.to_string() }),
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    context: Weak::new(),
                }
            }
        }
    }

    /// A 200 response with a `null` payload.
    pub fn empty() -> Self {
        Self { payload: serde_json::Value::Null, status: StatusCode::OK, context: Weak::new() }
    }

    /// A `{"error": message}` payload with the given status.
    pub fn error(status: StatusCode, message: impl Into<String>) -> Self {
        Self { payload: serde_json::json!({ "error": message.into() }), status, context: Weak::new() }
    }

    /// Overrides the status, keeping the payload.
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }

    /// The context this response was produced for, if it is still alive.
    pub fn context(&self) -> Option<Arc<Context>> {
        self.context.upgrade()
    }

    /// Serializes the payload into a JSON `http::Response`, keeping the status.
    pub fn into_http(self) -> http::Response<Bytes> {
        let body = match serde_json::to_vec(&self.payload) {
            Ok(body) => body,
            Err(e) => {
                error!(cause = %e, "failed to serialize response payload");
                let mut response = http::Response::new(Bytes::from_static(br#"{"error":"serialization failed"}"#));
                *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                response.headers_mut().insert(http::header::CONTENT_TYPE, json_content_type());
                return response;
            }
        };

        let mut response = http::Response::new(Bytes::from(body));
        *response.status_mut() = self.status;
        response.headers_mut().insert(http::header::CONTENT_TYPE, json_content_type());
        response
    }
}

fn json_content_type() -> http::HeaderValue {
    http::HeaderValue::from_static("application/json")
}
