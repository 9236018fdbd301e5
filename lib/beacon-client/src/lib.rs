//! Device-side client for the platform's HTTP device API.
//!
//! [`DeviceClient`] wraps a caller-supplied [`Transport`] and exposes the typed send surface a
//! device uses to report data: single key/value sends, aggregated multi-record sends, and raw
//! JSON passthrough, over both the telemetry and attribute endpoints. Payloads are aggregated and
//! sized through `beacon-telemetry` and `beacon-buffer`, so every send honors the configured
//! field budget and stack-usage ceiling.
//!
//! Calls are synchronous and one-shot: one request per call, the connection closed afterwards,
//! and no retries at any layer. A failed send does not transmit and reports the failing stage
//! through [`SendError`] and a log line.
#![deny(warnings)]
#![deny(missing_docs)]

mod client;
pub use self::client::{DeviceClient, SendError};

mod config;
pub use self::config::{ClientConfig, ConfigError};

pub mod topic;

mod transport;
pub use self::transport::{Response, Transport, TransportError};
