//! Pieces of request handling shared by every engine.

use bytes::Bytes;
use futures::FutureExt;
use gantry_core::normalize::context_from_parts;
use gantry_core::{HandlerChain, RequestScope, Response};
use http::header::{self, HeaderName, HeaderValue};
use http::request::Parts;
use http::{HeaderMap, Method, StatusCode};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::error;

pub(crate) const REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Normalizes the request, runs the chain and converts its response.
///
/// The request scope is cancelled once this future completes or is dropped.
pub(crate) async fn invoke(
    chain: &HandlerChain,
    parts: &Parts,
    params: Vec<(String, String)>,
    body: Bytes,
    recover: bool,
) -> http::Response<Bytes> {
    let scope = RequestScope::new();
    let _cancel = scope.cancel_on_drop();
    let ctx = Arc::new(context_from_parts(parts, params, body, scope));

    if !recover {
        return chain.dispatch(ctx).await.into_http();
    }

    match AssertUnwindSafe(chain.dispatch(ctx)).catch_unwind().await {
        Ok(response) => response.into_http(),
        Err(panic) => {
            let cause = panic
                .downcast_ref::<&str>()
                .map(ToString::to_string)
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!(method = %parts.method, uri = %parts.uri, cause = %cause, "handler panicked");
            Response::error(StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_http()
        }
    }
}

pub(crate) fn not_found() -> http::Response<Bytes> {
    Response::error(StatusCode::NOT_FOUND, "not found").into_http()
}

pub(crate) fn method_not_allowed(allow: &[Method]) -> http::Response<Bytes> {
    let mut response = Response::error(StatusCode::METHOD_NOT_ALLOWED, "method not allowed").into_http();
    let allow = allow.iter().map(Method::as_str).collect::<Vec<_>>().join(", ");
    if let Ok(value) = HeaderValue::from_str(&allow) {
        response.headers_mut().insert(header::ALLOW, value);
    }
    response
}

pub(crate) fn bad_request(reason: impl Into<String>) -> http::Response<Bytes> {
    Response::error(StatusCode::BAD_REQUEST, reason).into_http()
}

/// The incoming `x-request-id`, or a fresh v4 uuid.
pub(crate) fn request_id(headers: &HeaderMap) -> HeaderValue {
    headers
        .get(&REQUEST_ID)
        .filter(|value| !value.is_empty())
        .cloned()
        .unwrap_or_else(|| {
            HeaderValue::from_str(&uuid::Uuid::new_v4().to_string())
                .unwrap_or_else(|_| HeaderValue::from_static("invalid"))
        })
}

/// Whether the request is a CORS preflight.
pub(crate) fn is_preflight(method: &Method, headers: &HeaderMap) -> bool {
    method == Method::OPTIONS && headers.contains_key(header::ACCESS_CONTROL_REQUEST_METHOD)
}

pub(crate) fn preflight_response(headers: &HeaderMap) -> http::Response<Bytes> {
    let mut response = http::Response::new(Bytes::new());
    *response.status_mut() = StatusCode::NO_CONTENT;
    let out = response.headers_mut();
    out.insert(header::ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static("GET, POST, PUT, PATCH, DELETE, OPTIONS"));
    let requested = headers.get(header::ACCESS_CONTROL_REQUEST_HEADERS).cloned();
    out.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, requested.unwrap_or_else(|| HeaderValue::from_static("*")));
    out.insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("86400"));
    response
}

/// Adds the headers default middleware puts on every response.
pub(crate) fn decorate(headers: &mut HeaderMap, request_id: HeaderValue) {
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(REQUEST_ID, request_id);
}

/// Extracts the trace id from a W3C `traceparent` header (`00-<trace id>-<span id>-<flags>`).
pub(crate) fn trace_id(headers: &HeaderMap) -> Option<String> {
    let value = headers.get("traceparent")?.to_str().ok()?;
    let mut fields = value.split('-');
    let (_version, trace_id, span_id) = (fields.next()?, fields.next()?, fields.next()?);
    let valid = trace_id.len() == 32
        && span_id.len() == 16
        && trace_id.bytes().all(|b| b.is_ascii_hexdigit())
        && trace_id.bytes().any(|b| b != b'0');
    valid.then(|| trace_id.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gantry_core::{Context, handler_fn};

    async fn boom(_ctx: Arc<Context>) -> Response {
        panic!("boom")
    }

    async fn echo(ctx: Arc<Context>) -> Response {
        ctx.json(&ctx.param("id"))
    }

    fn parts() -> Parts {
        http::Request::builder().uri("/items/1").body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn invoke_passes_params_and_status() {
        let chain = HandlerChain::new(handler_fn(echo));
        let response = invoke(&chain, &parts(), vec![("id".into(), "1".into())], Bytes::new(), false).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body().as_ref(), br#""1""#);
    }

    #[tokio::test]
    async fn recovery_turns_panics_into_500() {
        let chain = HandlerChain::new(handler_fn(boom));
        let response = invoke(&chain, &parts(), Vec::new(), Bytes::new(), true).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn request_id_is_kept_or_generated() {
        let mut headers = HeaderMap::new();
        assert_eq!(request_id(&headers).len(), 36);
        headers.insert(REQUEST_ID, HeaderValue::from_static("abc"));
        assert_eq!(request_id(&headers), "abc");
    }

    #[test]
    fn parses_traceparent() {
        let mut headers = HeaderMap::new();
        headers.insert("traceparent", HeaderValue::from_static("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01"));
        assert_eq!(trace_id(&headers).as_deref(), Some("4bf92f3577b34da6a3ce929d0e0e4736"));

        headers.insert("traceparent", HeaderValue::from_static("00-00000000000000000000000000000000-00f067aa0ba902b7-01"));
        assert!(trace_id(&headers).is_none());
    }

    #[test]
    fn method_not_allowed_lists_allowed_methods() {
        let response = method_not_allowed(&[Method::GET, Method::DELETE]);
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[header::ALLOW], "GET, DELETE");
    }
}
