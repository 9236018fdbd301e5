//! Helpers for request/response topic correlation.
//!
//! Server responses arrive on topics carrying the identifier of the request they answer, as a
//! numeric suffix after the base topic (`v1/devices/me/rpc/response/$request_id`). These helpers
//! extract and sanity-check those identifiers.

/// Parses the numeric request identifier suffix from a received topic.
///
/// `base_topic` is the parameterless portion of the topic, without a trailing `/`
/// (`v1/devices/me/rpc/response`); `received_topic` is the full topic as received. Returns 0 when
/// the received topic does not extend the base topic or the suffix is not a valid identifier.
pub fn parse_request_id(base_topic: &str, received_topic: &str) -> u64 {
    received_topic
        .strip_prefix(base_topic)
        .and_then(|suffix| suffix.strip_prefix('/'))
        .and_then(|id| id.parse().ok())
        .unwrap_or(0)
}

/// Returns the number of occurrences of `needle` in `haystack`.
pub fn occurrences(haystack: &str, needle: char) -> usize {
    haystack.matches(needle).count()
}

/// Returns `true` if the given string is absent or empty.
pub fn is_null_or_empty(value: Option<&str>) -> bool {
    value.is_none_or(str::is_empty)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_request_id_suffix() {
        assert_eq!(parse_request_id("v1/devices/me/rpc/response", "v1/devices/me/rpc/response/42"), 42);
        assert_eq!(parse_request_id("v1/devices/me/attributes/response", "v1/devices/me/attributes/response/7"), 7);
    }

    #[test]
    fn unparsable_request_id_is_zero() {
        assert_eq!(parse_request_id("v1/devices/me/rpc/response", "v1/devices/me/rpc/response/abc"), 0);
        assert_eq!(parse_request_id("v1/devices/me/rpc/response", "v1/devices/me/rpc/response/"), 0);
        assert_eq!(parse_request_id("v1/devices/me/rpc/response", "v1/devices/me/rpc/response"), 0);
        assert_eq!(parse_request_id("v1/devices/me/rpc/response", "some/other/topic/42"), 0);
    }

    #[test]
    fn counts_occurrences() {
        assert_eq!(occurrences("v1/devices/me/telemetry", '/'), 3);
        assert_eq!(occurrences("no-slashes-here", '/'), 0);
        assert_eq!(occurrences("", '/'), 0);
    }

    #[test]
    fn null_or_empty() {
        assert!(is_null_or_empty(None));
        assert!(is_null_or_empty(Some("")));
        assert!(!is_null_or_empty(Some("token")));
    }
}
