use http::StatusCode;
use snafu::Snafu;

/// A transport error.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum TransportError {
    /// The connection to the server could not be established.
    #[snafu(display("failed to connect to {}:{}", host, port))]
    Connect {
        /// Host the connection was attempted against.
        host: String,

        /// Port the connection was attempted over.
        port: u16,
    },

    /// The request could not be written or the response could not be read.
    #[snafu(display("request I/O failed: {}", source))]
    Io {
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// The response could not be parsed.
    #[snafu(display("malformed response: {}", reason))]
    MalformedResponse {
        /// Why the response could not be parsed.
        reason: &'static str,
    },
}

/// A response to a transport request.
#[derive(Clone, Debug)]
pub struct Response {
    status: StatusCode,
    body: String,
}

impl Response {
    /// Creates a new `Response` from the given status code and body.
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Returns the HTTP status code of the response.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the response body.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Consumes the response, returning the body.
    pub fn into_body(self) -> String {
        self.body
    }
}

/// A synchronous, one-shot HTTP transport.
///
/// Implementations wrap whatever networking stack the embedding application has: a raw TCP
/// socket, a platform HTTP client, a test double. The client issues exactly one request per call,
/// runs it to completion on the calling thread, and calls [`close`](Self::close) after every
/// exchange; keeping a connection alive between calls is an implementation choice. Timeouts and
/// retries, if any, belong to the implementation, never to the client.
pub trait Transport {
    /// Issues a POST request with the given body.
    ///
    /// # Errors
    ///
    /// Fails if the request could not be delivered or a response could not be read. A delivered
    /// request with a non-success status code is not a transport error; it is reported through
    /// the returned [`Response`].
    fn post(&mut self, path: &str, content_type: &str, body: &str) -> Result<Response, TransportError>;

    /// Issues a GET request.
    ///
    /// # Errors
    ///
    /// Fails if the request could not be delivered or a response could not be read.
    fn get(&mut self, path: &str) -> Result<Response, TransportError>;

    /// Releases any connection state held from the previous request.
    fn close(&mut self);
}
