//! Template interpolation over a nested key/value tree.
//!
//! # Responsibilities
//! - Replace `{dotted.path}` placeholders with values from a JSON tree
//! - Render missing or untraversable paths as the empty string
//! - Honour `{{` / `}}` as literal braces
//!
//! # Design Decisions
//! - Lookup is a single left-to-right pass over path segments
//! - Only mappings are traversed; a scalar or sequence intermediate ends the
//!   lookup with no value
//! - Interpolation never fails

use serde_json::Value;

/// Interpolate `template` against `context`.
///
/// ```
/// use serde_json::json;
/// use request_trace::format::template::interpolate;
///
/// let ctx = json!({"tags": {"x-request-id": "req-1"}, "level": "INFO"});
/// assert_eq!(interpolate("[{level}] {tags.x-request-id} {tags.missing}", &ctx), "[INFO] req-1 ");
/// ```
pub fn interpolate(template: &str, context: &Value) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find(['{', '}']) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if tail.starts_with("{{") {
            out.push('{');
            rest = &tail[2..];
        } else if tail.starts_with("}}") {
            out.push('}');
            rest = &tail[2..];
        } else if tail.starts_with('}') {
            out.push('}');
            rest = &tail[1..];
        } else {
            match tail.find('}') {
                Some(close) => {
                    out.push_str(&resolve_field(context, &tail[1..close]));
                    rest = &tail[close + 1..];
                }
                None => {
                    // Unterminated placeholder.
                    out.push_str(tail);
                    rest = "";
                }
            }
        }
    }

    out.push_str(rest);
    out
}

/// Resolve a single placeholder body (without braces) to its rendered text.
pub fn resolve_field(context: &Value, field: &str) -> String {
    let path = match field.find([':', '!']) {
        Some(end) => &field[..end],
        None => field,
    };

    lookup(context, path.trim()).map(render_value).unwrap_or_default()
}

/// Look up a dotted path in `context`.
///
/// Segments are separated by `.`; `name[key]` is accepted as `name.key`.
pub fn lookup<'a>(context: &'a Value, path: &str) -> Option<&'a Value> {
    segments(path)
        .into_iter()
        .try_fold(context, |node, segment| match node {
            Value::Object(map) => map.get(segment),
            _ => None,
        })
}

fn segments(path: &str) -> Vec<&str> {
    let mut out = Vec::new();
    for part in path.split('.') {
        let Some(open) = part.find('[') else {
            out.push(part);
            continue;
        };

        out.push(&part[..open]);
        let mut rest = &part[open..];
        while let Some(inner) = rest.strip_prefix('[') {
            match inner.find(']') {
                Some(close) => {
                    out.push(&inner[..close]);
                    rest = &inner[close + 1..];
                }
                None => {
                    out.push(inner);
                    rest = "";
                }
            }
        }
        if !rest.is_empty() {
            out.push(rest);
        }
    }
    out
}

/// String form of a resolved value: text verbatim, everything else as
/// compact JSON.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Byte offset of the first unbalanced brace in `template`, if any.
pub fn find_unbalanced(template: &str) -> Option<usize> {
    let bytes = template.as_bytes();
    let mut open: Option<usize> = None;
    let mut i = 0;

    while i < bytes.len() {
        match (bytes[i], open) {
            (b'{', None) if bytes.get(i + 1) == Some(&b'{') => i += 1,
            (b'}', None) if bytes.get(i + 1) == Some(&b'}') => i += 1,
            (b'{', None) => open = Some(i),
            (b'{', Some(_)) => return Some(i),
            (b'}', None) => return Some(i),
            (b'}', Some(_)) => open = None,
            _ => {}
        }
        i += 1;
    }

    open
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context() -> Value {
        json!({
            "tags": {
                "tag_a": "a",
                "tag_b": "b",
                "multi_tag": {
                    "tag_a_a": "a_a",
                    "tag_b_b": "b_b",
                },
            },
            "value_a": "1",
            "count": 3,
            "ok": true,
            "items": ["x", "y"],
        })
    }

    #[test]
    fn test_resolves_top_level_and_nested_fields() {
        let ctx = context();
        assert_eq!(interpolate("{tags.tag_a}", &ctx), "a");
        assert_eq!(interpolate("{value_a}", &ctx), "1");
        assert_eq!(interpolate("{tags.multi_tag.tag_b_b}!", &ctx), "b_b!");
        assert_eq!(interpolate("{count} {ok}", &ctx), "3 true");
    }

    #[test]
    fn test_missing_fields_render_empty() {
        let ctx = context();
        assert_eq!(interpolate("[{nope}]", &ctx), "[]");
        assert_eq!(interpolate("[{tags.nope.deeper}]", &ctx), "[]");
        // Scalar intermediate is not traversable.
        assert_eq!(interpolate("[{value_a.len}]", &ctx), "[]");
        // Neither is a sequence.
        assert_eq!(interpolate("[{items.0}]", &ctx), "[]");
        assert_eq!(interpolate("[{}]", &ctx), "[]");
    }

    #[test]
    fn test_mappings_render_as_json() {
        let ctx = json!({"item": {"test": "ok"}});
        assert_eq!(interpolate("Test log {item}", &ctx), r#"Test log {"test":"ok"}"#);
    }

    #[test]
    fn test_brace_escapes_and_unterminated() {
        let ctx = context();
        assert_eq!(interpolate("{{literal}} {value_a}", &ctx), "{literal} 1");
        assert_eq!(interpolate("open {value_a", &ctx), "open {value_a");
        assert_eq!(interpolate("stray } brace", &ctx), "stray } brace");
    }

    #[test]
    fn test_bracket_segments_and_format_suffix() {
        let ctx = context();
        assert_eq!(interpolate("{tags[multi_tag][tag_a_a]}", &ctx), "a_a");
        assert_eq!(interpolate("{tags.multi_tag[tag_a_a]}", &ctx), "a_a");
        assert_eq!(interpolate("{value_a:>10}", &ctx), "1");
        assert_eq!(interpolate("{value_a!r}", &ctx), "1");
    }

    #[test]
    fn test_non_object_context() {
        assert_eq!(interpolate("a {b} c", &Value::Null), "a  c");
        assert_eq!(interpolate("no placeholders", &json!("x")), "no placeholders");
    }

    #[test]
    fn test_find_unbalanced() {
        assert_eq!(find_unbalanced("[{level}] {timestamp} {msg}"), None);
        assert_eq!(find_unbalanced("{{escaped}}"), None);
        assert_eq!(find_unbalanced("{open"), Some(0));
        assert_eq!(find_unbalanced("close}"), Some(5));
        assert_eq!(find_unbalanced("{a{b}"), Some(2));
    }
}
