//! Lossless-where-possible conversion of log values into JSON.
//!
//! Every function here is infallible. A value that cannot be represented as
//! JSON degrades to its text form instead of failing the log call.

use std::backtrace::Backtrace;
use std::error::Error;
use std::fmt::{Debug, Display};
use std::io;

use serde::Serialize;
use serde_json::ser::Formatter;
use serde_json::Value;

/// Encode a serializable value, falling back to its `Debug` text.
///
/// Record-like structs become mappings and `chrono` timestamps become
/// ISO-8601 strings through their `Serialize` impls.
pub fn encode<T>(value: &T) -> Value
where
    T: Serialize + Debug + ?Sized,
{
    serde_json::to_value(value).unwrap_or_else(|_| Value::String(format!("{value:?}")))
}

/// Encode a value by its `Display` text.
pub fn encode_display<T: Display + ?Sized>(value: &T) -> Value {
    Value::String(value.to_string())
}

/// Encode a value by its `Debug` text.
pub fn encode_debug<T: Debug + ?Sized>(value: &T) -> Value {
    Value::String(format!("{value:?}"))
}

/// An error and its chain of sources, `outer: inner: root`.
pub fn error_chain<E: Error + ?Sized>(err: &E) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

/// A captured stack trace as plain text.
pub fn backtrace_text(trace: &Backtrace) -> String {
    trace.to_string().trim().to_string()
}

/// Serialize `value` as single-line JSON with every non-ASCII character
/// escaped as `\uXXXX`.
pub fn to_ascii_json(value: &Value) -> String {
    let mut buf = Vec::with_capacity(256);
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, AsciiFormatter);
    if value.serialize(&mut ser).is_err() {
        return value.to_string();
    }
    // Only ASCII is ever written.
    String::from_utf8(buf).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

/// Compact formatter that escapes non-ASCII text.
struct AsciiFormatter;

impl Formatter for AsciiFormatter {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let mut start = 0;
        for (i, ch) in fragment.char_indices() {
            if ch.is_ascii() {
                continue;
            }
            writer.write_all(fragment[start..i].as_bytes())?;
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                write!(writer, "\\u{:04x}", unit)?;
            }
            start = i + ch.len_utf8();
        }
        writer.write_all(fragment[start..].as_bytes())
    }
}
