//! Synthesized mock responses.
//!
//! A [`MockResponse`] is a fully-materialized response (status, headers,
//! body bytes) that the transport delivers to the caller in place of a real
//! network round trip. Resolvers hand one back through
//! [`respond_with`](crate::instruction::respond_with).
//!
//! # Example
//!
//! ```
//! use mockwire::response::MockResponse;
//!
//! let response = MockResponse::json(&serde_json::json!({"id": "abc-123"}))
//!     .unwrap()
//!     .header("x-mocked", "true")
//!     .unwrap();
//! assert_eq!(response.status().as_u16(), 200);
//! ```

use bytes::Bytes;
use http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};

use crate::error::{MockwireError, Result};

/// A synthesized response delivered to the caller instead of performing
/// the original request.
#[derive(Debug, Clone)]
pub struct MockResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl MockResponse {
    /// Create an empty response with the given status.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// `200 OK` with an empty body.
    pub fn ok() -> Self {
        Self::new(StatusCode::OK)
    }

    /// `204 No Content`.
    pub fn no_content() -> Self {
        Self::new(StatusCode::NO_CONTENT)
    }

    /// `200 OK` with a JSON body and `content-type: application/json`.
    pub fn json<T: serde::Serialize>(value: &T) -> Result<Self> {
        let body = serde_json::to_vec(value)?;
        let mut response = Self::ok().body(body);
        response.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        Ok(response)
    }

    /// `200 OK` with a plain-text body.
    pub fn text(body: impl Into<String>) -> Self {
        let mut response = Self::ok().body(body.into().into_bytes());
        response.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        response
    }

    /// Replace the status code.
    pub fn status_code(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Add a header. Appends, so repeated names keep every value.
    pub fn header(mut self, name: &str, value: &str) -> Result<Self> {
        let name: HeaderName = name
            .parse()
            .map_err(|_| MockwireError::InvalidHeader(name.to_string()))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| MockwireError::InvalidHeader(value.to_string()))?;
        self.headers.append(name, value);
        Ok(self)
    }

    /// Replace the body bytes.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Response status.
    #[inline]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Response headers.
    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Response body bytes.
    #[inline]
    pub fn body_bytes(&self) -> &Bytes {
        &self.body
    }
}
