//! Carry the request scope onto spawned work.
//!
//! The correlation context and the request's tags live in task-locals, which
//! `tokio::spawn` and `spawn_blocking` do not inherit. Work scheduled from a
//! handler must be bound to the scope explicitly:
//!
//! ```ignore
//! request_trace::http::spawn(async move {
//!     client.get(&url).send().await
//! });
//!
//! tokio::spawn(audit(order).in_current_request());
//! ```

use std::future::Future;
use std::pin::Pin;

use tokio::task::JoinHandle;

use crate::http::context::CorrelationContext;
use crate::tags::TagRegistry;

/// Boxed future running inside a captured [`RequestScope`].
pub type ScopedFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Snapshot of the request scope of the calling task.
#[derive(Debug, Clone)]
pub struct RequestScope {
    context: Option<CorrelationContext>,
    tags: TagRegistry,
}

impl RequestScope {
    /// Capture the current context and tag registry. Outside a request the
    /// context is absent and the tags are the process-wide registry.
    pub fn capture() -> Self {
        Self {
            context: CorrelationContext::current(),
            tags: TagRegistry::current(),
        }
    }

    pub fn context(&self) -> Option<&CorrelationContext> {
        self.context.as_ref()
    }

    pub fn tags(&self) -> &TagRegistry {
        &self.tags
    }

    /// Wrap `fut` so it runs inside this scope wherever it is polled.
    pub fn bind<F>(self, fut: F) -> ScopedFuture<F::Output>
    where
        F: Future + Send + 'static,
    {
        let Self { context, tags } = self;
        match context {
            Some(ctx) => Box::pin(tags.scope(ctx.scope(fut))),
            None => Box::pin(tags.scope(fut)),
        }
    }

    /// Run `f` inside this scope on the current thread.
    pub fn run<R>(self, f: impl FnOnce() -> R) -> R {
        let Self { context, tags } = self;
        match context {
            Some(ctx) => tags.sync_scope(|| ctx.sync_scope(f)),
            None => tags.sync_scope(f),
        }
    }
}

/// Binds a future to the request scope of the task that creates it.
pub trait InCurrentRequest: Future + Sized + Send + 'static {
    fn in_current_request(self) -> ScopedFuture<Self::Output> {
        RequestScope::capture().bind(self)
    }
}

impl<F> InCurrentRequest for F where F: Future + Send + 'static {}

/// `tokio::spawn` that keeps the caller's correlation ids and tags.
pub fn spawn<F>(fut: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::spawn(fut.in_current_request())
}

/// `tokio::task::spawn_blocking` that keeps the caller's correlation ids and
/// tags.
pub fn spawn_blocking<F, R>(f: F) -> JoinHandle<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let scope = RequestScope::capture();
    tokio::task::spawn_blocking(move || scope.run(f))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::Tag;

    fn request_scope() -> (CorrelationContext, TagRegistry) {
        let tags = TagRegistry::new();
        tags.set_tag("x-request-id", "req-1");
        (CorrelationContext::new("req-1"), tags)
    }

    #[tokio::test]
    async fn test_plain_spawn_loses_scope() {
        let (ctx, tags) = request_scope();
        let seen = tags
            .scope(ctx.scope(async {
                tokio::spawn(async { CorrelationContext::current() }).await
            }))
            .await
            .unwrap();
        assert!(seen.is_none());
    }

    #[tokio::test]
    async fn test_spawn_keeps_context_and_tags() {
        let (ctx, tags) = request_scope();
        let (seen, tag) = tags
            .scope(ctx.scope(async {
                spawn(async {
                    (
                        CorrelationContext::current(),
                        TagRegistry::current().get("x-request-id"),
                    )
                })
                .await
            }))
            .await
            .unwrap();

        assert_eq!(seen, Some(CorrelationContext::new("req-1")));
        assert_eq!(tag, Some(Tag::from("req-1")));
    }

    #[tokio::test]
    async fn test_tags_written_by_spawned_work_reach_the_request() {
        let (ctx, tags) = request_scope();
        tags.clone()
            .scope(ctx.scope(async {
                let job = async { TagRegistry::current().set_tag("job", "export") };
                tokio::spawn(job.in_current_request()).await
            }))
            .await
            .unwrap();

        assert_eq!(tags.get("job"), Some(Tag::from("export")));
    }

    #[tokio::test]
    async fn test_spawn_blocking_keeps_context() {
        let (ctx, tags) = request_scope();
        let seen = tags
            .scope(ctx.scope(async {
                spawn_blocking(|| CorrelationContext::current().map(|c| c.request_id)).await
            }))
            .await
            .unwrap();
        assert_eq!(seen.as_deref(), Some("req-1"));
    }

    #[tokio::test]
    async fn test_capture_outside_request() {
        let scope = RequestScope::capture();
        assert!(scope.context().is_none());
        assert!(scope.tags().same_as(TagRegistry::global()));
    }
}
