use std::{fmt, io};

/// A `fmt::Write` adapter that discards its input and counts the bytes it would have written.
struct CountingFormatter {
    len: usize,
}

impl fmt::Write for CountingFormatter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.len += s.len();
        Ok(())
    }
}

/// An `io::Write` adapter that discards its input and counts the bytes it would have written.
struct CountingWriter {
    len: usize,
}

impl io::Write for CountingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.len += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Measures the exact byte length of the rendered form of the given format arguments.
///
/// The returned length includes one extra byte reserved for a trailing NUL, so a buffer of the
/// returned size always holds the rendered text with room for C string-style termination. No
/// intermediate string is allocated: the arguments are rendered against a counting adapter.
///
/// Use the `measured_len!` macro to measure a format string directly.
///
/// # Panics
///
/// Panics if rendering the arguments reports a formatting error. `fmt::Arguments` are validated
/// at compile time, so an error here can only come from a `Display` implementation failing its
/// own dry run, which is a bug in the caller's types rather than a runtime condition.
pub fn measured_len(args: fmt::Arguments<'_>) -> usize {
    let mut counter = CountingFormatter { len: 0 };
    if fmt::write(&mut counter, args).is_err() {
        panic!("formatting arguments reported an error during dry-run measurement");
    }

    counter.len + 1
}

/// Measures the exact byte length of the serialized form of the given JSON document.
///
/// The returned length includes one extra byte reserved for a trailing NUL, matching the
/// accounting of [`measured_len`]. The document is serialized against a counting adapter, so no
/// intermediate string is allocated.
///
/// Unlike formatted measurement, a serialization error here is recoverable and is returned to the
/// caller: a document that cannot be serialized simply cannot be sent.
pub fn measured_json_len(value: &serde_json::Value) -> Result<usize, serde_json::Error> {
    let mut counter = CountingWriter { len: 0 };
    serde_json::to_writer(&mut counter, value)?;

    Ok(counter.len + 1)
}

/// Measures the exact byte length of the rendered form of the given format string and arguments.
///
/// Forwards to [`measured_len`] via `format_args!`. The returned length includes one extra byte
/// reserved for a trailing NUL.
#[macro_export]
macro_rules! measured_len {
    ($($arg:tt)*) => { $crate::measured_len(::std::format_args!($($arg)*)) };
}
