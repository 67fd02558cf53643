use crate::context::{Context, Response};
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// A request handler: reads the shared [`Context`] and produces a [`Response`].
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn call(&self, ctx: Arc<Context>) -> Response;
}

/// a [`Handler`] backed by an async function or closure
pub struct FnHandler<F> {
    f: F,
}

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").finish_non_exhaustive()
    }
}

pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(Arc<Context>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    FnHandler { f }
}

#[async_trait]
impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(Arc<Context>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    async fn call(&self, ctx: Arc<Context>) -> Response {
        (self.f)(ctx).await
    }
}

#[async_trait]
impl<H: Handler + ?Sized> Handler for Arc<H> {
    async fn call(&self, ctx: Arc<Context>) -> Response {
        (**self).call(ctx).await
    }
}

/// The ordered handlers of one route.
///
/// Handlers run left to right over the same context. Only the last one terminates the chain:
/// responses produced by earlier handlers are discarded, so they act as middleware-like steps.
#[derive(Clone)]
pub struct HandlerChain {
    handlers: Arc<[Arc<dyn Handler>]>,
}

impl HandlerChain {
    /// A chain always starts from its first handler, so it can never be empty.
    pub fn new(first: impl Handler) -> Self {
        Self { handlers: Arc::from(vec![Arc::new(first) as Arc<dyn Handler>]) }
    }

    pub(crate) fn from_parts(first: Arc<dyn Handler>, rest: Vec<Arc<dyn Handler>>) -> Self {
        let mut handlers = Vec::with_capacity(rest.len() + 1);
        handlers.push(first);
        handlers.extend(rest);
        Self { handlers: Arc::from(handlers) }
    }

    /// Appends a handler; it becomes the new terminal handler.
    pub fn then(self, next: impl Handler) -> Self {
        let mut handlers = self.handlers.to_vec();
        handlers.push(Arc::new(next));
        Self { handlers: Arc::from(handlers) }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Runs every handler in order and returns the terminal handler's response.
    pub async fn dispatch(&self, ctx: Arc<Context>) -> Response {
        let Some((terminal, steps)) = self.handlers.split_last() else {
            return Response::error(http::StatusCode::INTERNAL_SERVER_ERROR, "empty handler chain");
        };
        for step in steps {
            let _discarded = step.call(Arc::clone(&ctx)).await;
        }
        terminal.call(ctx).await
    }
}

impl fmt::Debug for HandlerChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerChain").field("len", &self.handlers.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn assert_is_handler<T: Handler>(_handler: &T) {
        // no op
    }

    #[test]
    fn async_fn_is_handler() {
        async fn get(ctx: Arc<Context>) -> Response {
            ctx.json(&"ok")
        }

        let handler = handler_fn(get);
        assert_is_handler(&handler);
    }

    #[tokio::test]
    async fn chain_runs_left_to_right_and_keeps_terminal_response() {
        let order = Arc::new(AtomicUsize::new(0));

        let first = {
            let order = Arc::clone(&order);
            handler_fn(move |ctx: Arc<Context>| {
                let order = Arc::clone(&order);
                async move {
                    assert_eq!(order.fetch_add(1, Ordering::SeqCst), 0);
                    ctx.json(&"discarded").with_status(StatusCode::IM_A_TEAPOT)
                }
            })
        };
        let last = {
            let order = Arc::clone(&order);
            handler_fn(move |ctx: Arc<Context>| {
                let order = Arc::clone(&order);
                async move {
                    assert_eq!(order.fetch_add(1, Ordering::SeqCst), 1);
                    ctx.json(&"kept")
                }
            })
        };

        let chain = HandlerChain::new(first).then(last);
        assert_eq!(chain.len(), 2);

        let response = chain.dispatch(Arc::new(Context::new())).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.payload(), &serde_json::json!("kept"));
        assert_eq!(order.load(Ordering::SeqCst), 2);
    }
}
