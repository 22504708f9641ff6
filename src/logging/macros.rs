//! Logging macros.
//!
//! ```
//! use request_trace::logging::{Logger, LoggerOptions, MemorySink};
//! use request_trace::log_info;
//!
//! let sink = MemorySink::new();
//! let logger = Logger::new("orders", LoggerOptions::default().sink(sink.clone()));
//! log_info!(logger, "created order {id}", id = 42, sku = "A-1");
//! assert!(sink.lines()[0].contains(r#""args":{"id":42,"sku":"A-1"}"#));
//! ```
//!
//! Fields are `key = value` (encoded through `Serialize`, falling back to
//! `Debug`), `key = %value` (`Display`) or `key = ?value` (`Debug`). Keys may
//! be identifiers or string literals. `exc_info`, `stack_info`,
//! `stack_level` and `extra` are not arguments: they configure the record.

/// Call site of the macro invocation.
#[macro_export]
macro_rules! call_site {
    () => {
        $crate::logging::CallSite::new(module_path!(), $crate::__function_name!(), line!())
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __function_name {
    () => {{
        fn f() {}
        fn type_name_of<T>(_: T) -> &'static str {
            ::std::any::type_name::<T>()
        }
        let name = type_name_of(f);
        let name = name.strip_suffix("::f").unwrap_or(name);
        let name = name.trim_end_matches("::{{closure}}");
        match name.rfind("::") {
            Some(pos) => &name[pos + 2..],
            None => name,
        }
    }};
}

#[doc(hidden)]
#[macro_export]
macro_rules! __log_fields {
    ($record:expr $(,)?) => { $record };

    ($record:expr, exc_info = $value:expr $(, $($rest:tt)*)?) => {
        $crate::__log_fields!($record.exc_info(&$value) $(, $($rest)*)?)
    };
    ($record:expr, stack_info = $value:expr $(, $($rest:tt)*)?) => {
        $crate::__log_fields!($record.stack_info($value) $(, $($rest)*)?)
    };
    ($record:expr, stack_level = $value:expr $(, $($rest:tt)*)?) => {
        $crate::__log_fields!($record.stack_level($value) $(, $($rest)*)?)
    };
    ($record:expr, extra = $value:expr $(, $($rest:tt)*)?) => {
        $crate::__log_fields!($record.extra($value) $(, $($rest)*)?)
    };

    ($record:expr, $key:ident = %$value:expr $(, $($rest:tt)*)?) => {
        $crate::__log_fields!(
            $record.arg(stringify!($key), $crate::format::encoder::encode_display(&$value))
            $(, $($rest)*)?
        )
    };
    ($record:expr, $key:ident = ?$value:expr $(, $($rest:tt)*)?) => {
        $crate::__log_fields!(
            $record.arg(stringify!($key), $crate::format::encoder::encode_debug(&$value))
            $(, $($rest)*)?
        )
    };
    ($record:expr, $key:ident = $value:expr $(, $($rest:tt)*)?) => {
        $crate::__log_fields!(
            $record.arg(stringify!($key), $crate::format::encoder::encode(&$value))
            $(, $($rest)*)?
        )
    };

    ($record:expr, $key:literal = %$value:expr $(, $($rest:tt)*)?) => {
        $crate::__log_fields!(
            $record.arg($key, $crate::format::encoder::encode_display(&$value))
            $(, $($rest)*)?
        )
    };
    ($record:expr, $key:literal = ?$value:expr $(, $($rest:tt)*)?) => {
        $crate::__log_fields!(
            $record.arg($key, $crate::format::encoder::encode_debug(&$value))
            $(, $($rest)*)?
        )
    };
    ($record:expr, $key:literal = $value:expr $(, $($rest:tt)*)?) => {
        $crate::__log_fields!(
            $record.arg($key, $crate::format::encoder::encode(&$value))
            $(, $($rest)*)?
        )
    };
}

/// Log at an explicit severity.
#[macro_export]
macro_rules! log_event {
    ($logger:expr, $severity:expr, $message:expr $(, $($fields:tt)*)?) => {{
        let logger = &$logger;
        let severity: $crate::logging::Severity = $severity;
        if logger.enabled(severity) {
            $crate::__log_fields!(
                logger.record(severity, $message, $crate::call_site!())
                $(, $($fields)*)?
            )
            .emit();
        }
    }};
}

#[macro_export]
macro_rules! log_debug {
    ($logger:expr, $($rest:tt)+) => {
        $crate::log_event!($logger, $crate::logging::Severity::Debug, $($rest)+)
    };
}

#[macro_export]
macro_rules! log_info {
    ($logger:expr, $($rest:tt)+) => {
        $crate::log_event!($logger, $crate::logging::Severity::Info, $($rest)+)
    };
}

#[macro_export]
macro_rules! log_warn {
    ($logger:expr, $($rest:tt)+) => {
        $crate::log_event!($logger, $crate::logging::Severity::Warning, $($rest)+)
    };
}

#[macro_export]
macro_rules! log_error {
    ($logger:expr, $($rest:tt)+) => {
        $crate::log_event!($logger, $crate::logging::Severity::Error, $($rest)+)
    };
}

#[macro_export]
macro_rules! log_critical {
    ($logger:expr, $($rest:tt)+) => {
        $crate::log_event!($logger, $crate::logging::Severity::Critical, $($rest)+)
    };
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_function_name() {
        let name = crate::__function_name!();
        assert_eq!(name, "test_function_name");
    }

    #[test]
    fn test_function_name_in_closure() {
        let name = (|| crate::__function_name!())();
        assert_eq!(name, "test_function_name_in_closure");
    }

    #[test]
    fn test_call_site() {
        let site = crate::call_site!();
        assert_eq!(site.module, module_path!());
        assert_eq!(site.function, "test_call_site");
        assert!(site.line > 0);
    }
}
