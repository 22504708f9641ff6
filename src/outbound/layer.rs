//! Tower layer routing client requests through the [`HttpStrategy::Tower`]
//! hooks. Wraps any `Service<Request<B>>`, e.g. a `hyper_util` legacy client.

use std::task::{Context, Poll};

use axum::http::Request;
use tower::{Layer, Service};

use crate::outbound::hooks::{HttpStrategy, OutboundHooks};

#[derive(Debug, Clone)]
pub struct PropagationLayer {
    hooks: OutboundHooks,
}

impl Default for PropagationLayer {
    fn default() -> Self {
        Self::new(OutboundHooks::global().clone())
    }
}

impl PropagationLayer {
    pub fn new(hooks: OutboundHooks) -> Self {
        Self { hooks }
    }
}

impl<S> Layer<S> for PropagationLayer {
    type Service = PropagationService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        PropagationService {
            inner,
            hooks: self.hooks.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PropagationService<S> {
    inner: S,
    hooks: OutboundHooks,
}

impl<S, B> Service<Request<B>> for PropagationService<S>
where
    S: Service<Request<B>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        let method = req.method().clone();
        let url = req.uri().to_string();
        self.hooks
            .apply(HttpStrategy::Tower, &method, &url, req.headers_mut());
        self.inner.call(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::context::CorrelationContext;
    use crate::outbound::hooks::CorrelationHook;
    use axum::http::HeaderMap;
    use std::convert::Infallible;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_headers_injected_before_inner_call() {
        let hooks = OutboundHooks::new();
        hooks.install(HttpStrategy::Tower, CorrelationHook::shared());

        let client = PropagationLayer::new(hooks).layer(tower::service_fn(
            |req: Request<()>| async move { Ok::<HeaderMap, Infallible>(req.headers().clone()) },
        ));

        let ctx = CorrelationContext {
            request_id: "req-1".into(),
            correlation_id: "correl-3".into(),
            causation_id: "caus-2".into(),
        };
        let seen = ctx
            .scope(client.oneshot(Request::get("http://test.com/").body(()).unwrap()))
            .await
            .unwrap();

        assert_eq!(seen["x-request-id"], "req-1");
        assert_eq!(seen["x-causation-id"], "req-1");
        assert_eq!(seen["x-correlation-id"], "correl-3");
    }
}
