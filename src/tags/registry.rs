//! Tag values and the registry that holds them.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

tokio::task_local! {
    /// Registry of the request currently being handled on this task.
    static SCOPED: TagRegistry;
}

static GLOBAL: OnceLock<TagRegistry> = OnceLock::new();

/// A tag value: text, a list of text, or a nested mapping of tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Tag {
    Text(String),
    List(Vec<String>),
    Map(BTreeMap<String, Tag>),
}

impl Tag {
    /// Build a mapping tag from key/value pairs.
    pub fn map<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<Tag>,
        I: IntoIterator<Item = (K, V)>,
    {
        Tag::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Text content, if this is a text tag.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Tag::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for Tag {
    fn from(value: &str) -> Self {
        Tag::Text(value.to_string())
    }
}

impl From<String> for Tag {
    fn from(value: String) -> Self {
        Tag::Text(value)
    }
}

impl From<&String> for Tag {
    fn from(value: &String) -> Self {
        Tag::Text(value.clone())
    }
}

impl From<Vec<String>> for Tag {
    fn from(value: Vec<String>) -> Self {
        Tag::List(value)
    }
}

impl From<BTreeMap<String, Tag>> for Tag {
    fn from(value: BTreeMap<String, Tag>) -> Self {
        Tag::Map(value)
    }
}

impl From<&Tag> for Value {
    fn from(tag: &Tag) -> Self {
        match tag {
            Tag::Text(s) => Value::String(s.clone()),
            Tag::List(items) => Value::Array(items.iter().cloned().map(Value::String).collect()),
            Tag::Map(map) => Value::Object(map.iter().map(|(k, v)| (k.clone(), v.into())).collect()),
        }
    }
}

/// Where the correlation middleware writes its tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagScope {
    /// Each request gets its own fork of the base registry.
    #[default]
    Request,
    /// Tags are written straight into the base registry and stay visible
    /// process-wide until overwritten. Only sound with one request in flight.
    Process,
}

/// Key/value store of ambient tags.
///
/// Cloning is cheap and yields a handle to the same underlying store.
#[derive(Debug, Clone, Default)]
pub struct TagRegistry {
    inner: Arc<DashMap<String, Tag>>,
}

impl TagRegistry {
    /// Create a new, empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn global() -> &'static TagRegistry {
        GLOBAL.get_or_init(TagRegistry::new)
    }

    /// The registry of the request being handled on this task, or the
    /// process-wide registry outside of any request.
    pub fn current() -> TagRegistry {
        SCOPED
            .try_with(|registry| registry.clone())
            .unwrap_or_else(|_| Self::global().clone())
    }

    /// Set a tag. Last write wins.
    pub fn set_tag(&self, key: impl Into<String>, value: impl Into<Tag>) {
        self.inner.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<Tag> {
        self.inner.get(key).map(|r| r.value().clone())
    }

    /// Snapshot of every tag, ordered by key.
    pub fn current_tags(&self) -> BTreeMap<String, Tag> {
        self.inner
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect()
    }

    /// An independent registry seeded with this registry's current tags.
    pub fn fork(&self) -> TagRegistry {
        let forked = TagRegistry::new();
        for r in self.inner.iter() {
            forked.inner.insert(r.key().clone(), r.value().clone());
        }
        forked
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Whether both handles point at the same store.
    pub fn same_as(&self, other: &TagRegistry) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Run `fut` with this registry as the task's current registry.
    pub async fn scope<F: Future>(self, fut: F) -> F::Output {
        SCOPED.scope(self, fut).await
    }

    /// Run `f` with this registry as the current registry.
    pub fn sync_scope<R>(self, f: impl FnOnce() -> R) -> R {
        SCOPED.sync_scope(self, f)
    }
}

/// Set a tag on the current registry.
pub fn set_tag(key: impl Into<String>, value: impl Into<Tag>) {
    TagRegistry::current().set_tag(key, value);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_write_wins() {
        let registry = TagRegistry::new();
        registry.set_tag("x-request-id", "a");
        registry.set_tag("x-request-id", "b");

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("x-request-id"), Some(Tag::from("b")));
    }

    #[test]
    fn test_clones_share_state() {
        let registry = TagRegistry::new();
        let handle = registry.clone();
        handle.set_tag("service", "billing");

        assert_eq!(registry.get("service").and_then(|t| t.as_text().map(String::from)), Some("billing".into()));
        assert!(registry.same_as(&handle));
    }

    #[test]
    fn test_fork_is_independent() {
        let base = TagRegistry::new();
        base.set_tag("service", "billing");

        let forked = base.fork();
        forked.set_tag("x-request-id", "req-1");

        assert!(base.get("x-request-id").is_none());
        assert_eq!(forked.get("service"), Some(Tag::from("billing")));
        assert!(!base.same_as(&forked));
    }

    #[test]
    fn test_nested_tag_to_json() {
        let tag = Tag::map([
            ("method", Tag::from("GET")),
            ("aliases", Tag::from(vec!["a".to_string(), "b".to_string()])),
            ("inner", Tag::map([("route", "/items/{id}")])),
        ]);

        let value = Value::from(&tag);
        assert_eq!(value["method"], "GET");
        assert_eq!(value["aliases"][1], "b");
        assert_eq!(value["inner"]["route"], "/items/{id}");
        assert_eq!(serde_json::to_value(&tag).unwrap(), value);
    }

    #[test]
    fn test_sync_scope_overrides_current() {
        let scoped = TagRegistry::new();
        let seen = scoped.clone().sync_scope(|| {
            set_tag("x-request-id", "scoped-1");
            TagRegistry::current()
        });

        assert!(seen.same_as(&scoped));
        assert_eq!(scoped.get("x-request-id"), Some(Tag::from("scoped-1")));
        assert!(!TagRegistry::current().same_as(&scoped));
    }

    #[tokio::test]
    async fn test_async_scope_isolates_tasks() {
        let a = TagRegistry::new();
        let b = TagRegistry::new();

        let (ra, rb) = tokio::join!(
            a.clone().scope(async {
                set_tag("x-request-id", "a");
                tokio::task::yield_now().await;
                TagRegistry::current().get("x-request-id")
            }),
            b.clone().scope(async {
                set_tag("x-request-id", "b");
                tokio::task::yield_now().await;
                TagRegistry::current().get("x-request-id")
            }),
        );

        assert_eq!(ra, Some(Tag::from("a")));
        assert_eq!(rb, Some(Tag::from("b")));
    }
}
