//! External tag sinks mirroring the middleware's tags.

use serde_json::Value;

use crate::tags::{Tag, TagRegistry};

/// Receives every tag the correlation middleware sets.
pub trait TagSink: Send + Sync {
    fn set_tag(&self, key: &str, value: &Tag);
}

impl TagSink for TagRegistry {
    fn set_tag(&self, key: &str, value: &Tag) {
        TagRegistry::set_tag(self, key, value.clone());
    }
}

/// Reports tags to the `tracing` subscriber, inside the current span.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTagSink;

impl TagSink for TracingTagSink {
    fn set_tag(&self, key: &str, value: &Tag) {
        let value = Value::from(value);
        tracing::debug!(tag = %key, value = %value, "Tag set");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_registry_as_sink() {
        let mirror = TagRegistry::new();
        let sink: Arc<dyn TagSink> = Arc::new(mirror.clone());

        sink.set_tag("x-request-id", &Tag::from("req-1"));
        sink.set_tag("request", &Tag::map([("method", "GET")]));

        assert_eq!(mirror.get("x-request-id"), Some(Tag::from("req-1")));
        assert_eq!(mirror.len(), 2);
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_tracing_sink_reports_nested_tags() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            TracingTagSink.set_tag("request", &Tag::map([("path", "/")]));
        });

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("Tag set"));
        assert!(output.contains("tag=request"));
        assert!(output.contains(r#"value={"path":"/"}"#));
    }
}
