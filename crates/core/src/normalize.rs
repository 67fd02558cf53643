//! Conversion from `http` request parts into a [`Context`].
//!
//! Every engine binding calls [`context_from_parts`] before any handler runs, so handlers observe
//! the same shape no matter which engine accepted the request.

use crate::context::{Context, RequestScope};
use bytes::Bytes;
use http::HeaderMap;
use http::request::Parts;
use std::collections::HashMap;
use tracing::trace;

/// Builds the context for one request.
///
/// `params` are the path parameters the engine matched for the route.
pub fn context_from_parts<I, K, V>(parts: &Parts, params: I, body: Bytes, scope: RequestScope) -> Context
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    Context::new()
        .with_headers(headers_map(&parts.headers))
        .with_params(params.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
        .with_query(query_map(parts.uri.query()))
        .with_body(body)
        .with_request_scope(scope)
}

/// Flattens headers into a map keyed by canonical header names, keeping the first value of each.
pub fn headers_map(headers: &HeaderMap) -> HashMap<String, String> {
    let mut map = HashMap::with_capacity(headers.keys_len());
    for name in headers.keys() {
        let Some(value) = headers.get(name) else { continue };
        match value.to_str() {
            Ok(value) => {
                map.insert(canonical_header_name(name.as_str()), value.to_string());
            }
            Err(_) => trace!(header = %name, "skipping non visible-ascii header value"),
        }
    }
    map
}

/// Parses a raw query string, keeping the first value of repeated keys.
pub fn query_map(query: Option<&str>) -> HashMap<String, String> {
    let Some(query) = query.filter(|q| !q.is_empty()) else {
        return HashMap::new();
    };

    match serde_urlencoded::from_str::<Vec<(String, String)>>(query) {
        Ok(pairs) => {
            let mut map = HashMap::with_capacity(pairs.len());
            for (key, value) in pairs {
                map.entry(key).or_insert(value);
            }
            map
        }
        Err(e) => {
            trace!(cause = %e, query, "ignoring malformed query string");
            HashMap::new()
        }
    }
}

/// `x-request-id` → `X-Request-Id`
pub fn canonical_header_name(name: &str) -> String {
    let mut canonical = String::with_capacity(name.len());
    let mut upper = true;
    for c in name.chars() {
        if upper {
            canonical.push(c.to_ascii_uppercase());
        } else {
            canonical.push(c.to_ascii_lowercase());
        }
        upper = c == '-';
    }
    canonical
}
