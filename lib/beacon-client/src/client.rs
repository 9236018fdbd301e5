use beacon_buffer::{ProvisionError, ProvisionPolicy};
use beacon_telemetry::{render_payload, AggregateError, DataPoint, FieldAggregator};
use http::StatusCode;
use serde_json::Value as JsonValue;
use snafu::{ResultExt as _, Snafu};
use tracing::error;

use crate::config::{ClientConfig, ConfigError};
use crate::transport::{Transport, TransportError};

const CONTENT_TYPE_JSON: &str = "application/json";

/// A send error.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum SendError {
    /// The payload could not be built or serialized.
    #[snafu(display("failed to build the payload: {}", source))]
    Payload {
        /// Underlying aggregation or rendering failure.
        source: AggregateError,
    },

    /// The request path buffer could not be provisioned.
    #[snafu(display("failed to provision the request path buffer: {}", source))]
    Path {
        /// Underlying provisioning failure.
        source: ProvisionError,
    },

    /// The request could not be delivered.
    #[snafu(display("failed to deliver the request: {}", source))]
    Delivery {
        /// Underlying transport failure.
        source: TransportError,
    },

    /// The server rejected the request.
    #[snafu(display("{} request was rejected with status {}", method, status))]
    Rejected {
        /// HTTP method of the rejected request.
        method: &'static str,

        /// Status code the server answered with.
        status: StatusCode,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Endpoint {
    Telemetry,
    Attributes,
}

/// A device client for the platform's HTTP device API.
///
/// Wraps a caller-supplied [`Transport`] and exposes the typed send surface a device uses to
/// report telemetry and attribute data. Every aggregated send honors the configured field budget,
/// and every payload and request path is written through an exactly-sized buffer placed according
/// to the configured stack ceiling.
///
/// All calls are synchronous and one-shot. The transport connection is closed after every
/// request, regardless of outcome. Nothing is retried; a failed send reports its failing stage
/// through [`SendError`] and one log line, and otherwise has no effect.
pub struct DeviceClient<T> {
    transport: T,
    token: String,
    policy: ProvisionPolicy,
    aggregator: FieldAggregator,
}

impl<T: Transport> DeviceClient<T> {
    /// Creates a new `DeviceClient` from the given configuration and transport.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid.
    pub fn from_config(config: &ClientConfig, transport: T) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            transport,
            token: config.access_token.clone(),
            policy: ProvisionPolicy::new(config.max_stack_bytes),
            aggregator: FieldAggregator::new(config.field_limit()),
        })
    }

    /// Returns the maximum number of payload bytes placed on the call stack.
    pub fn max_stack_bytes(&self) -> usize {
        self.policy.max_stack_bytes()
    }

    /// Updates the maximum number of payload bytes placed on the call stack.
    ///
    /// Takes effect for all subsequent sends.
    pub fn set_max_stack_bytes(&mut self, max_stack_bytes: usize) {
        self.policy.set_max_stack_bytes(max_stack_bytes);
    }

    /// Returns a reference to the underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    //----------------------------------------------------------------------------
    // Telemetry API

    /// Sends a single boolean telemetry value.
    ///
    /// # Errors
    ///
    /// Fails if the record is empty, the payload cannot be built, or the request fails.
    pub fn send_telemetry_bool(&mut self, key: &str, value: bool) -> Result<(), SendError> {
        self.send_records(Endpoint::Telemetry, &[DataPoint::bool(key, value)])
    }

    /// Sends a single integer telemetry value.
    ///
    /// # Errors
    ///
    /// Fails if the record is empty, the payload cannot be built, or the request fails.
    pub fn send_telemetry_integer(&mut self, key: &str, value: i64) -> Result<(), SendError> {
        self.send_records(Endpoint::Telemetry, &[DataPoint::integer(key, value)])
    }

    /// Sends a single floating point telemetry value.
    ///
    /// # Errors
    ///
    /// Fails if the record is empty, the payload cannot be built, or the request fails.
    pub fn send_telemetry_float(&mut self, key: &str, value: f64) -> Result<(), SendError> {
        self.send_records(Endpoint::Telemetry, &[DataPoint::float(key, value)])
    }

    /// Sends a single text telemetry value.
    ///
    /// # Errors
    ///
    /// Fails if the record is empty, the payload cannot be built, or the request fails.
    pub fn send_telemetry_text(&mut self, key: &str, value: &str) -> Result<(), SendError> {
        self.send_records(Endpoint::Telemetry, &[DataPoint::text(key, value)])
    }

    /// Sends the given records as one aggregated telemetry payload.
    ///
    /// # Errors
    ///
    /// Fails if the records exceed the configured field budget, no record is non-empty, the
    /// payload cannot be built, or the request fails.
    pub fn send_telemetry(&mut self, records: &[DataPoint<'_>]) -> Result<(), SendError> {
        self.send_records(Endpoint::Telemetry, records)
    }

    /// Sends a raw JSON string as a telemetry payload.
    ///
    /// The string is posted as-is; no field budget or size accounting applies.
    ///
    /// # Errors
    ///
    /// Fails if the string is empty or the request fails.
    pub fn send_telemetry_json(&mut self, json: &str) -> Result<(), SendError> {
        self.send_json(Endpoint::Telemetry, json)
    }

    /// Sends a prebuilt JSON document as a telemetry payload.
    ///
    /// # Errors
    ///
    /// Fails if the document cannot be serialized or the request fails.
    pub fn send_telemetry_document(&mut self, document: &JsonValue) -> Result<(), SendError> {
        self.send_document(Endpoint::Telemetry, document)
    }

    //----------------------------------------------------------------------------
    // Attribute API

    /// Sends a single boolean attribute value.
    ///
    /// # Errors
    ///
    /// Fails if the record is empty, the payload cannot be built, or the request fails.
    pub fn send_attribute_bool(&mut self, key: &str, value: bool) -> Result<(), SendError> {
        self.send_records(Endpoint::Attributes, &[DataPoint::bool(key, value)])
    }

    /// Sends a single integer attribute value.
    ///
    /// # Errors
    ///
    /// Fails if the record is empty, the payload cannot be built, or the request fails.
    pub fn send_attribute_integer(&mut self, key: &str, value: i64) -> Result<(), SendError> {
        self.send_records(Endpoint::Attributes, &[DataPoint::integer(key, value)])
    }

    /// Sends a single floating point attribute value.
    ///
    /// # Errors
    ///
    /// Fails if the record is empty, the payload cannot be built, or the request fails.
    pub fn send_attribute_float(&mut self, key: &str, value: f64) -> Result<(), SendError> {
        self.send_records(Endpoint::Attributes, &[DataPoint::float(key, value)])
    }

    /// Sends a single text attribute value.
    ///
    /// # Errors
    ///
    /// Fails if the record is empty, the payload cannot be built, or the request fails.
    pub fn send_attribute_text(&mut self, key: &str, value: &str) -> Result<(), SendError> {
        self.send_records(Endpoint::Attributes, &[DataPoint::text(key, value)])
    }

    /// Sends the given records as one aggregated attribute payload.
    ///
    /// # Errors
    ///
    /// Fails if the records exceed the configured field budget, no record is non-empty, the
    /// payload cannot be built, or the request fails.
    pub fn send_attributes(&mut self, records: &[DataPoint<'_>]) -> Result<(), SendError> {
        self.send_records(Endpoint::Attributes, records)
    }

    /// Sends a raw JSON string as an attribute payload.
    ///
    /// The string is posted as-is; no field budget or size accounting applies.
    ///
    /// # Errors
    ///
    /// Fails if the string is empty or the request fails.
    pub fn send_attribute_json(&mut self, json: &str) -> Result<(), SendError> {
        self.send_json(Endpoint::Attributes, json)
    }

    /// Sends a prebuilt JSON document as an attribute payload.
    ///
    /// # Errors
    ///
    /// Fails if the document cannot be serialized or the request fails.
    pub fn send_attribute_document(&mut self, document: &JsonValue) -> Result<(), SendError> {
        self.send_document(Endpoint::Attributes, document)
    }

    //----------------------------------------------------------------------------
    // Raw request API

    /// Issues a POST request with the given JSON body against an arbitrary API path.
    ///
    /// # Errors
    ///
    /// Fails if the request cannot be delivered or the server answers with anything other than
    /// HTTP 200.
    pub fn send_post_request(&mut self, path: &str, json: &str) -> Result<(), SendError> {
        post_message(&mut self.transport, path, json)
    }

    /// Issues a GET request against an arbitrary API path, returning the response body.
    ///
    /// # Errors
    ///
    /// Fails if the request cannot be delivered or the server answers with anything other than
    /// HTTP 200.
    pub fn send_get_request(&mut self, path: &str) -> Result<String, SendError> {
        get_message(&mut self.transport, path)
    }

    fn send_records(&mut self, endpoint: Endpoint, records: &[DataPoint<'_>]) -> Result<(), SendError> {
        let document = self.aggregator.aggregate(records).context(Payload)?;
        self.send_document(endpoint, &document)
    }

    fn send_document(&mut self, endpoint: Endpoint, document: &JsonValue) -> Result<(), SendError> {
        let Self {
            transport,
            token,
            policy,
            ..
        } = self;
        let policy = *policy;
        let token = token.as_str();

        render_payload(&policy, document, |payload| {
            send_to_endpoint(transport, &policy, token, endpoint, payload)
        })
        .context(Payload)?
    }

    fn send_json(&mut self, endpoint: Endpoint, json: &str) -> Result<(), SendError> {
        if json.is_empty() {
            return Err(SendError::Payload {
                source: AggregateError::NothingToSend,
            });
        }

        send_to_endpoint(&mut self.transport, &self.policy, &self.token, endpoint, json)
    }
}

/// Renders the endpoint path for the given token into a scoped buffer and posts `body` to it.
fn send_to_endpoint<T: Transport>(
    transport: &mut T, policy: &ProvisionPolicy, token: &str, endpoint: Endpoint, body: &str,
) -> Result<(), SendError> {
    let required = match endpoint {
        Endpoint::Telemetry => beacon_buffer::measured_len!("/api/v1/{}/telemetry", token),
        Endpoint::Attributes => beacon_buffer::measured_len!("/api/v1/{}/attributes", token),
    };

    policy
        .with_buffer(required, |buffer| {
            let path = match endpoint {
                Endpoint::Telemetry => buffer.write_formatted(format_args!("/api/v1/{}/telemetry", token)),
                Endpoint::Attributes => buffer.write_formatted(format_args!("/api/v1/{}/attributes", token)),
            };
            post_message(transport, path, body)
        })
        .context(Path)?
}

fn post_message<T: Transport>(transport: &mut T, path: &str, body: &str) -> Result<(), SendError> {
    let result = transport.post(path, CONTENT_TYPE_JSON, body).context(Delivery);
    transport.close();

    let response = result.inspect_err(|_| error!(path, "POST request could not be delivered."))?;
    if response.status() != StatusCode::OK {
        error!(path, status = %response.status(), "POST request failed.");
        return Rejected {
            method: "POST",
            status: response.status(),
        }
        .fail();
    }

    Ok(())
}

fn get_message<T: Transport>(transport: &mut T, path: &str) -> Result<String, SendError> {
    let result = transport.get(path).context(Delivery);
    transport.close();

    let response = result.inspect_err(|_| error!(path, "GET request could not be delivered."))?;
    if response.status() != StatusCode::OK {
        error!(path, status = %response.status(), "GET request failed.");
        return Rejected {
            method: "GET",
            status: response.status(),
        }
        .fail();
    }

    Ok(response.into_body())
}
