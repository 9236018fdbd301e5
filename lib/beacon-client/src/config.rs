use beacon_buffer::DEFAULT_MAX_STACK_BYTES;
use beacon_telemetry::{FieldLimit, DEFAULT_FIELD_LIMIT};
use serde::Deserialize;
use snafu::{ensure, Snafu};

/// A client configuration error.
#[derive(Debug, Snafu, Eq, PartialEq)]
#[snafu(context(suffix(false)))]
pub enum ConfigError {
    /// No host was configured.
    #[snafu(display("host must not be empty"))]
    MissingHost,

    /// No access token was configured.
    #[snafu(display("access token must not be empty"))]
    MissingAccessToken,
}

const fn default_port() -> u16 {
    80
}

const fn default_keep_alive() -> bool {
    true
}

const fn default_max_stack_bytes() -> usize {
    DEFAULT_MAX_STACK_BYTES
}

const fn default_max_fields() -> Option<usize> {
    Some(DEFAULT_FIELD_LIMIT)
}

/// Configuration for a [`DeviceClient`](crate::DeviceClient).
///
/// Deserializable so the embedding application can load it from whatever configuration source it
/// carries; `host` and `access_token` are the only required fields.
#[derive(Clone, Debug, Deserialize)]
pub struct ClientConfig {
    /// Host of the platform server (example: `demo.example.io`).
    pub host: String,

    /// Port to connect over. Defaults to 80.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Access token identifying the device to the server.
    pub access_token: String,

    /// Whether the transport should try to keep its connection alive between requests.
    /// Defaults to `true`.
    #[serde(default = "default_keep_alive")]
    pub keep_alive: bool,

    /// Maximum number of payload bytes to place on the call stack before falling back to the
    /// heap. Defaults to 1 KiB.
    #[serde(default = "default_max_stack_bytes")]
    pub max_stack_bytes: usize,

    /// Maximum number of fields per aggregated payload. Defaults to 8; explicit `null` removes
    /// the bound entirely.
    #[serde(default = "default_max_fields")]
    pub max_fields: Option<usize>,
}

impl ClientConfig {
    /// Creates a new `ClientConfig` with the given host and access token, defaults elsewhere.
    pub fn new(host: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_port(),
            access_token: access_token.into(),
            keep_alive: default_keep_alive(),
            max_stack_bytes: default_max_stack_bytes(),
            max_fields: default_max_fields(),
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Fails if the host or the access token is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure!(!self.host.is_empty(), MissingHost);
        ensure!(!self.access_token.is_empty(), MissingAccessToken);
        Ok(())
    }

    /// Returns the field budget implied by this configuration.
    pub fn field_limit(&self) -> FieldLimit {
        match self.max_fields {
            Some(limit) => FieldLimit::Bounded(limit),
            None => FieldLimit::Unbounded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ClientConfig::new("demo.example.io", "token123");
        assert_eq!(config.port, 80);
        assert!(config.keep_alive);
        assert_eq!(config.max_stack_bytes, DEFAULT_MAX_STACK_BYTES);
        assert_eq!(config.field_limit(), FieldLimit::Bounded(DEFAULT_FIELD_LIMIT));
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn missing_host_and_token_rejected() {
        assert_eq!(ClientConfig::new("", "token123").validate(), Err(ConfigError::MissingHost));
        assert_eq!(
            ClientConfig::new("demo.example.io", "").validate(),
            Err(ConfigError::MissingAccessToken)
        );
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: ClientConfig =
            serde_json::from_str(r#"{ "host": "demo.example.io", "access_token": "token123" }"#).unwrap();
        assert_eq!(config.port, 80);
        assert_eq!(config.max_fields, Some(DEFAULT_FIELD_LIMIT));
    }

    #[test]
    fn explicit_null_max_fields_is_unbounded() {
        let config: ClientConfig = serde_json::from_str(
            r#"{ "host": "demo.example.io", "access_token": "token123", "max_fields": null }"#,
        )
        .unwrap();
        assert_eq!(config.field_limit(), FieldLimit::Unbounded);
    }
}
