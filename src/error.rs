//! Error types for mockwire.

use thiserror::Error;

/// Opaque error type carried out of user resolvers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for all mockwire operations.
#[derive(Debug, Error)]
pub enum MockwireError {
    /// I/O error while reading a request body from the transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A path pattern could not be parsed at handler construction.
    #[error("invalid path pattern `{pattern}`: {reason}")]
    InvalidPattern {
        /// The offending pattern string.
        pattern: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Invalid header name or value while building a request or response.
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// Request URL could not be parsed.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// No registered handler accepted the request.
    ///
    /// Recoverable: the transport decides whether to perform the request
    /// unmodified or raise an unhandled-request condition.
    #[error("no handler matched {method} {url}")]
    NoMatchingHandler {
        /// Request method.
        method: http::Method,
        /// Full request URL.
        url: url::Url,
    },

    /// The resolver completed without producing an instruction.
    #[error("resolver did not return a valid instruction")]
    InvalidResolverReturn,

    /// The resolver returned an error; the original fault is preserved
    /// as the source for diagnostics.
    #[error("resolver error: {0}")]
    Resolver(#[source] BoxError),

    /// The resolver panicked during execution.
    #[error("resolver panicked: {0}")]
    ResolverPanic(String),

    /// A request body was not a well-formed GraphQL payload.
    ///
    /// During matching this degrades to a non-match; it only surfaces
    /// if context extraction itself is asked to parse a bad payload.
    #[error("malformed GraphQL payload: {0}")]
    MalformedGraphql(String),

    /// The request was aborted by the caller before resolution finished.
    #[error("request aborted")]
    Aborted,

    /// The transport reported a failure while streaming body chunks.
    #[error("body stream error: {0}")]
    BodyStream(String),
}

/// Result type alias using MockwireError.
pub type Result<T> = std::result::Result<T, MockwireError>;
