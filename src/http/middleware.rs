//! Correlation middleware.
//!
//! # Responsibilities
//! - Derive the request's correlation ids, generating missing ones
//! - Write generated ids back onto the request without overwriting supplied ones
//! - Tag the request (`request`, `x-request-id`, `x-correlation-id`, `x-causation-id`)
//! - Activate outbound interception for the configured strategies
//! - Echo `x-request-id` on the response
//!
//! # Data Flow
//! ```text
//! Request
//!     → CorrelationContext::from_headers (+ prefix, id factory)
//!     → fill_inbound (request headers)
//!     → tags: fork of the base registry (or the base itself) + tag sink mirror
//!     → OutboundHooks::install(CorrelationHook) per strategy
//!     → inner service, inside the task-local tag + context scope
//!     → Response (+ x-request-id)
//! ```
//!
//! # Design Decisions
//! - Strategy resolution and sink detection happen once, at construction
//! - Construction restores the original hooks so repeated layers never stack
//! - Inner service errors pass through untouched

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::extract::MatchedPath;
use axum::http::{HeaderValue, Request, Response};
use tower::{Layer, Service};

use crate::config::{MiddlewareConfig, ValidationError};
use crate::http::context::{insert, CorrelationContext, IdFactory, IdGenerator};
use crate::http::headers::{CAUSATION_ID, CORRELATION_ID, REQUEST_ID, X_REQUEST_ID};
use crate::outbound::{CorrelationHook, HttpStrategy, OutboundHooks, OutboundStrategy};
use crate::tags::{Tag, TagRegistry, TagScope, TagSink, TracingTagSink};

struct Shared {
    ids: IdGenerator,
    strategies: Vec<HttpStrategy>,
    trust_inbound_request_id: bool,
    tag_scope: TagScope,
    tags: TagRegistry,
    hooks: OutboundHooks,
    tag_sink: Option<Arc<dyn TagSink>>,
}

impl Shared {
    fn registry_for_request(&self) -> TagRegistry {
        match self.tag_scope {
            TagScope::Request => self.tags.fork(),
            TagScope::Process => self.tags.clone(),
        }
    }

    fn set_tag(&self, registry: &TagRegistry, key: &str, value: Tag) {
        if let Some(sink) = &self.tag_sink {
            sink.set_tag(key, &value);
        }
        registry.set_tag(key, value);
    }

    fn record_tags<B>(&self, registry: &TagRegistry, req: &Request<B>, ctx: &CorrelationContext) {
        let route = req
            .extensions()
            .get::<MatchedPath>()
            .map(|p| p.as_str().to_owned())
            .unwrap_or_default();

        self.set_tag(
            registry,
            "request",
            Tag::map([
                ("method", req.method().as_str().to_owned()),
                ("path", req.uri().path().to_owned()),
                ("route", route),
            ]),
        );
        self.set_tag(registry, REQUEST_ID, Tag::from(&ctx.request_id));
        self.set_tag(registry, CORRELATION_ID, Tag::from(&ctx.correlation_id));
        self.set_tag(registry, CAUSATION_ID, Tag::from(&ctx.causation_id));
    }

    fn activate_outbound(&self) {
        for strategy in &self.strategies {
            self.hooks.install(*strategy, CorrelationHook::shared());
        }
    }
}

/// Builder for [`CorrelationLayer`].
pub struct CorrelationLayerBuilder {
    ids: IdGenerator,
    outbound: OutboundStrategy,
    trust_inbound_request_id: bool,
    tag_scope: TagScope,
    tags: Option<TagRegistry>,
    hooks: Option<OutboundHooks>,
    tag_sink: Option<Arc<dyn TagSink>>,
}

impl Default for CorrelationLayerBuilder {
    fn default() -> Self {
        Self {
            ids: IdGenerator::default(),
            outbound: OutboundStrategy::Auto,
            trust_inbound_request_id: true,
            tag_scope: TagScope::Request,
            tags: None,
            hooks: None,
            tag_sink: None,
        }
    }
}

impl CorrelationLayerBuilder {
    /// Replace the UUID v4 factory.
    pub fn id_factory(mut self, factory: IdFactory) -> Self {
        let prefix = self.ids.prefix().to_owned();
        self.ids = IdGenerator::new(factory, prefix);
        self
    }

    pub fn id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.ids = self.ids.with_prefix(prefix);
        self
    }

    pub fn outbound(mut self, strategy: OutboundStrategy) -> Self {
        self.outbound = strategy;
        self
    }

    pub fn trust_inbound_request_id(mut self, trust: bool) -> Self {
        self.trust_inbound_request_id = trust;
        self
    }

    pub fn tag_scope(mut self, scope: TagScope) -> Self {
        self.tag_scope = scope;
        self
    }

    /// Base registry. Defaults to [`TagRegistry::global`].
    pub fn tags(mut self, registry: TagRegistry) -> Self {
        self.tags = Some(registry);
        self
    }

    /// Hook registry. Defaults to [`OutboundHooks::global`].
    pub fn hooks(mut self, hooks: OutboundHooks) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// External tracer that mirrors every tag the middleware sets.
    pub fn tag_sink(mut self, sink: Arc<dyn TagSink>) -> Self {
        self.tag_sink = Some(sink);
        self
    }

    /// Build the layer. Fails when the id prefix is not valid header text.
    pub fn build(self) -> Result<CorrelationLayer, ValidationError> {
        let prefix = self.ids.prefix();
        if HeaderValue::from_str(prefix).is_err() {
            return Err(ValidationError::InvalidIdPrefix(prefix.to_owned()));
        }

        let hooks = self.hooks.unwrap_or_else(|| OutboundHooks::global().clone());
        hooks.restore_originals();

        let strategies = self.outbound.resolve();
        tracing::debug!(
            outbound = ?self.outbound,
            strategies = ?strategies,
            tag_sink = self.tag_sink.is_some(),
            tag_scope = ?self.tag_scope,
            id_prefix = %self.ids.prefix(),
            "Correlation middleware configured"
        );

        Ok(CorrelationLayer {
            shared: Arc::new(Shared {
                ids: self.ids,
                strategies,
                trust_inbound_request_id: self.trust_inbound_request_id,
                tag_scope: self.tag_scope,
                tags: self.tags.unwrap_or_else(|| TagRegistry::global().clone()),
                hooks,
                tag_sink: self.tag_sink,
            }),
        })
    }
}

/// Tower layer applying [`CorrelationService`].
#[derive(Clone)]
pub struct CorrelationLayer {
    shared: Arc<Shared>,
}

impl fmt::Debug for CorrelationLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CorrelationLayer")
            .field("ids", &self.shared.ids)
            .field("strategies", &self.shared.strategies)
            .field("tag_scope", &self.shared.tag_scope)
            .finish_non_exhaustive()
    }
}

impl CorrelationLayer {
    pub fn builder() -> CorrelationLayerBuilder {
        CorrelationLayerBuilder::default()
    }

    /// Builder preloaded from the `[middleware]` config section.
    pub fn from_config(config: &MiddlewareConfig) -> CorrelationLayerBuilder {
        let builder = Self::builder()
            .id_prefix(config.id_prefix.clone())
            .outbound(config.outbound)
            .trust_inbound_request_id(config.trust_inbound_request_id)
            .tag_scope(config.tag_scope);
        if config.trace_tags {
            builder.tag_sink(Arc::new(TracingTagSink))
        } else {
            builder
        }
    }

    /// Strategies intercepted while a request is handled.
    pub fn strategies(&self) -> &[HttpStrategy] {
        &self.shared.strategies
    }
}

impl<S> Layer<S> for CorrelationLayer {
    type Service = CorrelationService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CorrelationService {
            inner,
            shared: self.shared.clone(),
        }
    }
}

#[derive(Clone)]
pub struct CorrelationService<S> {
    inner: S,
    shared: Arc<Shared>,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for CorrelationService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let shared = self.shared.clone();

        let ctx = CorrelationContext::from_headers(
            req.headers(),
            &shared.ids,
            shared.trust_inbound_request_id,
        );
        ctx.fill_inbound(req.headers_mut());

        let tags = shared.registry_for_request();
        shared.record_tags(&tags, &req, &ctx);
        shared.activate_outbound();

        tracing::debug!(
            request_id = %ctx.request_id,
            correlation_id = %ctx.correlation_id,
            causation_id = %ctx.causation_id,
            "Correlation ids assigned"
        );

        let request_id = ctx.request_id.clone();
        let inner = &mut self.inner;
        let future = tags
            .clone()
            .sync_scope(|| ctx.clone().sync_scope(|| inner.call(req)));

        Box::pin(tags.scope(ctx.scope(async move {
            let mut response = future.await?;
            insert(response.headers_mut(), &X_REQUEST_ID, &request_id);
            Ok(response)
        })))
    }
}
