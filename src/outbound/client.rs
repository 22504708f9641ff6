//! `reqwest` client routed through the [`HttpStrategy::Reqwest`] hooks.

use axum::http::{HeaderMap, Method};
use reqwest::{Client, Request, RequestBuilder, Response};

use crate::outbound::hooks::{HttpStrategy, OutboundHooks};

/// Wraps a `reqwest::Client`; every request it builds passes through
/// [`OutboundHooks::apply`] first.
#[derive(Debug, Clone)]
pub struct TracedClient {
    inner: Client,
    hooks: OutboundHooks,
}

impl Default for TracedClient {
    fn default() -> Self {
        Self::new(Client::new())
    }
}

impl TracedClient {
    /// Decorate `inner` with the process-wide hooks.
    pub fn new(inner: Client) -> Self {
        Self::with_hooks(inner, OutboundHooks::global().clone())
    }

    pub fn with_hooks(inner: Client, hooks: OutboundHooks) -> Self {
        Self { inner, hooks }
    }

    pub fn inner(&self) -> &Client {
        &self.inner
    }

    pub fn into_inner(self) -> Client {
        self.inner
    }

    pub fn hooks(&self) -> &OutboundHooks {
        &self.hooks
    }

    /// Start a request. Hook headers are computed now, while the caller is
    /// still inside the request scope.
    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let mut headers = HeaderMap::new();
        self.hooks
            .apply(HttpStrategy::Reqwest, &method, url, &mut headers);
        self.inner.request(method, url).headers(headers)
    }

    pub fn get(&self, url: &str) -> RequestBuilder {
        self.request(Method::GET, url)
    }

    pub fn post(&self, url: &str) -> RequestBuilder {
        self.request(Method::POST, url)
    }

    pub fn put(&self, url: &str) -> RequestBuilder {
        self.request(Method::PUT, url)
    }

    pub fn patch(&self, url: &str) -> RequestBuilder {
        self.request(Method::PATCH, url)
    }

    pub fn delete(&self, url: &str) -> RequestBuilder {
        self.request(Method::DELETE, url)
    }

    pub fn head(&self, url: &str) -> RequestBuilder {
        self.request(Method::HEAD, url)
    }

    /// Send a prebuilt request through the hooks.
    pub async fn execute(&self, mut request: Request) -> reqwest::Result<Response> {
        let method = request.method().clone();
        let url = request.url().to_string();
        self.hooks
            .apply(HttpStrategy::Reqwest, &method, &url, request.headers_mut());
        self.inner.execute(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::context::CorrelationContext;
    use crate::outbound::hooks::CorrelationHook;

    fn traced() -> TracedClient {
        let hooks = OutboundHooks::new();
        hooks.install(HttpStrategy::Reqwest, CorrelationHook::shared());
        TracedClient::with_hooks(Client::new(), hooks)
    }

    #[test]
    fn test_builder_carries_correlation_headers() {
        let client = traced();
        let request = CorrelationContext::new("req-1")
            .sync_scope(|| client.get("http://test.com/orders"))
            .build()
            .unwrap();

        assert_eq!(request.headers()["x-request-id"], "req-1");
        assert_eq!(request.headers()["x-causation-id"], "req-1");
        assert_eq!(request.headers()["x-correlation-id"], "req-1");
    }

    #[test]
    fn test_caller_headers_win_after_hooks() {
        let client = traced();
        let request = CorrelationContext::new("req-1")
            .sync_scope(|| {
                let mut explicit = HeaderMap::new();
                explicit.insert("x-correlation-id", "explicit".parse().unwrap());
                client.post("http://test.com/orders").headers(explicit)
            })
            .build()
            .unwrap();

        assert_eq!(request.headers()["x-correlation-id"], "explicit");
        assert_eq!(request.headers()["x-request-id"], "req-1");
    }

    #[test]
    fn test_uninstalled_hooks_leave_request_alone() {
        let client = TracedClient::with_hooks(Client::new(), OutboundHooks::new());
        let request = CorrelationContext::new("req-1")
            .sync_scope(|| client.get("http://test.com/"))
            .build()
            .unwrap();
        assert!(!request.headers().contains_key("x-request-id"));
    }
}
