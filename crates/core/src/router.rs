use crate::route::Route;

/// A group of routes sharing a path prefix and a default tag.
///
/// ```
/// use gantry_core::{handler_fn, Context, Response, Route, Router};
/// use std::sync::Arc;
///
/// async fn list(ctx: Arc<Context>) -> Response {
///     ctx.json(&Vec::<String>::new())
/// }
///
/// let router = Router::new().prefix("/api").group("Items").routes([Route::get::<Vec<String>>("/items", handler_fn(list))]);
/// assert_eq!(router.len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Router {
    prefix: Option<String>,
    group: Option<String>,
    routes: Vec<Route>,
}

impl Router {
    /// An empty group with no prefix.
    pub fn new() -> Self {
        Self::default()
    }

    /// Path prefix prepended to every route, e.g. `/api`.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Tags every route that declares no tag of its own.
    pub fn group(mut self, name: impl Into<String>) -> Self {
        self.group = Some(name.into());
        self
    }

    /// Adds one route.
    pub fn route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    /// Adds routes in iteration order.
    pub fn routes(mut self, routes: impl IntoIterator<Item = Route>) -> Self {
        self.routes.extend(routes);
        self
    }

    pub fn prefix_str(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub fn group_str(&self) -> Option<&str> {
        self.group.as_deref()
    }

    /// Number of routes in the group.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Prefix, group tag and routes, in that order.
    pub fn into_parts(self) -> (Option<String>, Option<String>, Vec<Route>) {
        (self.prefix, self.group, self.routes)
    }
}
