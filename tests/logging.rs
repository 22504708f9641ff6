//! Structured logger behaviour as seen from outside the crate.

use serde_json::{json, Value};

use request_trace::logging::{get_logger_with, Logger, LoggerOptions, MemorySink, Severity};
use request_trace::tags::TagRegistry;
use request_trace::{log_debug, log_error, log_event, log_info, set_tag};

fn split(line: &str) -> (&str, Value) {
    let (prefix, json) = line.split_once('\t').unwrap();
    (prefix, serde_json::from_str(json).unwrap())
}

#[test]
fn test_tags_attached_to_every_record() {
    let sink = MemorySink::new();
    let logger = Logger::new(
        "scenario-tags",
        LoggerOptions::default()
            .sink(sink.clone())
            .message_format("{tags[x-request-id]}|{tags.x-causation-id}|{msg}"),
    );

    TagRegistry::new().sync_scope(|| {
        set_tag("x-request-id", "req-1");
        set_tag("x-causation-id", "caus-2");
        set_tag("x-correlation-id", "correl-3");

        for _ in 0..3 {
            log_info!(logger, "{hello} with tags", hello = "hello 1");
        }
    });

    let lines = sink.lines();
    assert_eq!(lines.len(), 3);
    for line in &lines {
        let (prefix, payload) = split(line);
        assert_eq!(prefix, "req-1|caus-2|hello 1 with tags");
        assert_eq!(payload["x-request-id"], "req-1");
        assert_eq!(payload["x-causation-id"], "caus-2");
        assert_eq!(payload["x-correlation-id"], "correl-3");
        assert_eq!(payload["log_message"], "{hello} with tags");
        assert_eq!(payload["args"], json!({"hello": "hello 1"}));
        assert!(payload["tags"]["source_path"]
            .as_str()
            .unwrap()
            .starts_with("logging.test_tags_attached_to_every_record:"));
    }
}

#[test]
fn test_mapping_message_by_severity() {
    let sink = MemorySink::new();
    let logger = Logger::new("scenario-mapping", LoggerOptions::default().sink(sink.clone()));

    log_debug!(logger, json!({"test": "ok"}));
    log_info!(logger, json!({"test": "ok"}));

    let lines = sink.lines();
    let (_, debug) = split(&lines[0]);
    let (_, info) = split(&lines[1]);

    assert_eq!(debug["log_message"], json!({"test": "ok"}));
    assert_eq!(debug["level"], "DEBUG");
    assert_eq!(info["log_message"], r#"{"test":"ok"}"#);
    assert_eq!(info["level"], "INFO");
}

#[test]
fn test_every_severity_produces_valid_json() {
    let sink = MemorySink::new();
    let logger = Logger::new("severities", LoggerOptions::default().sink(sink.clone()));

    for severity in Severity::ALL {
        log_event!(logger, severity, "näive {n}", n = 1);
    }

    let lines = sink.lines();
    assert_eq!(lines.len(), Severity::ALL.len());
    for (line, severity) in lines.iter().zip(Severity::ALL) {
        assert!(line.split_once('\t').unwrap().1.is_ascii());
        let (prefix, payload) = split(line);
        assert!(prefix.starts_with(&format!("[{}]", severity)));
        assert_eq!(payload["level"], severity.as_str());
        assert_eq!(payload["log_message"], "näive {n}");
        assert!(payload["timestamp"].as_str().unwrap().ends_with('Z'));
    }
}

#[test]
fn test_level_filters_records() {
    let sink = MemorySink::new();
    let logger = Logger::new(
        "filtered",
        LoggerOptions::default().sink(sink.clone()).level(Severity::Error),
    );

    log_info!(logger, "dropped");
    log_error!(logger, "kept", exc_info = std::io::Error::other("disk full"));

    let lines = sink.lines();
    assert_eq!(lines.len(), 1);
    let (_, payload) = split(&lines[0]);
    assert_eq!(payload["exc_info"], "disk full");
}

#[test]
fn test_named_logger_is_shared() {
    let sink = MemorySink::new();
    let first = get_logger_with("integration-shared", LoggerOptions::default().sink(sink.clone()));
    let second = get_logger_with(
        "integration-shared",
        LoggerOptions::default().level(Severity::Critical),
    );

    assert!(std::sync::Arc::ptr_eq(&first, &second));
    assert_eq!(second.level(), Severity::Debug);

    log_info!(second, "one line");
    assert_eq!(sink.len(), 1);
}
