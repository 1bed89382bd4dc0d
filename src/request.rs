//! Intercepted request descriptor and lazy body access.
//!
//! An [`InterceptedRequest`] is handed to the engine by the transport
//! collaborator once per interception. The core only reads it; the request
//! is never modified and never re-sent by this crate.
//!
//! The body follows a single-drain-then-cache contract: the first full read
//! drains whatever the transport feeds in and buffers it, and every later
//! read observes the same bytes. This is what lets the engine parse a
//! GraphQL payload during matching while a resolver still gets to call
//! [`InterceptedRequest::body_json`] afterwards.
//!
//! # Example
//!
//! ```ignore
//! use mockwire::request::InterceptedRequest;
//!
//! let request = InterceptedRequest::builder(http::Method::GET, "https://api.test/user/42")
//!     .header("cookie", "session=abc")
//!     .build()?;
//! ```

use bytes::{Bytes, BytesMut};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::{MockwireError, Result};

/// Channel capacity for streamed body chunks.
const BODY_CHANNEL_CAPACITY: usize = 16;

/// Immutable descriptor of an intercepted outgoing request.
///
/// Owned by the engine for the duration of one interception; resolvers see
/// it through the request context. Cookies are derived from the `Cookie`
/// header at context-extraction time, not stored here.
#[derive(Debug)]
pub struct InterceptedRequest {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Body,
    abort: CancellationToken,
}

impl InterceptedRequest {
    /// Start building a request descriptor.
    pub fn builder(method: Method, url: impl Into<String>) -> RequestBuilder {
        RequestBuilder {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            abort: None,
        }
    }

    /// Request method.
    #[inline]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Full request URL, including path and query.
    #[inline]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// URL path with the query string already stripped.
    #[inline]
    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// Request headers.
    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// A single header value as UTF-8, if present and valid.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Token observed by in-flight resolution when the caller aborts
    /// the underlying request. Cloning shares the same signal.
    #[inline]
    pub fn abort_token(&self) -> &CancellationToken {
        &self.abort
    }

    /// Read the full body, draining the transport stream on first use.
    ///
    /// Subsequent calls return the cached bytes. Fails with
    /// [`MockwireError::Aborted`] if the request is aborted mid-read.
    pub async fn body_bytes(&self) -> Result<Bytes> {
        self.body.fill(&self.abort).await
    }

    /// Read the full body as UTF-8 text.
    pub async fn body_text(&self) -> Result<String> {
        let bytes = self.body_bytes().await?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| MockwireError::BodyStream(format!("body is not valid UTF-8: {}", e)))
    }

    /// Read and deserialize the full body as JSON.
    pub async fn body_json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        let bytes = self.body_bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Builder for [`InterceptedRequest`].
///
/// Header names/values and the URL are validated in [`build`](Self::build)
/// so transports can assemble requests from untrusted wire data without
/// panicking.
pub struct RequestBuilder {
    method: Method,
    url: String,
    headers: Vec<(String, String)>,
    body: Option<Body>,
    abort: Option<CancellationToken>,
}

impl RequestBuilder {
    /// Add a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the request body.
    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Use an externally-created abort token instead of a fresh one.
    ///
    /// Transports bridge their own cancellation signal (e.g. a dropped
    /// caller connection) through this token.
    pub fn abort_token(mut self, token: CancellationToken) -> Self {
        self.abort = Some(token);
        self
    }

    /// Validate and build the request descriptor.
    pub fn build(self) -> Result<InterceptedRequest> {
        let url = Url::parse(&self.url)?;

        let mut headers = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in &self.headers {
            let name: HeaderName = name
                .parse()
                .map_err(|_| MockwireError::InvalidHeader(name.clone()))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| MockwireError::InvalidHeader(value.clone()))?;
            headers.append(name, value);
        }

        Ok(InterceptedRequest {
            method: self.method,
            url,
            headers,
            body: self.body.unwrap_or_else(Body::empty),
            abort: self.abort.unwrap_or_default(),
        })
    }
}

/// Lazily-readable request body.
///
/// Either fully buffered up front or fed chunk-by-chunk from the transport
/// through a [`BodySender`]. The first full read drains and caches; the
/// body is re-readable from then on.
#[derive(Debug)]
pub struct Body {
    state: Mutex<BodyState>,
}

#[derive(Debug)]
enum BodyState {
    /// Fully buffered; reads clone the bytes (cheap).
    Buffered(Bytes),
    /// Chunks still arriving from the transport.
    Streaming(mpsc::Receiver<Result<Bytes>>),
    /// The transport reported an error; reads keep failing with it.
    Failed(String),
}

impl Body {
    /// An empty body.
    pub fn empty() -> Self {
        Self::buffered(Bytes::new())
    }

    /// A fully-buffered body.
    pub fn buffered(bytes: impl Into<Bytes>) -> Self {
        Self {
            state: Mutex::new(BodyState::Buffered(bytes.into())),
        }
    }

    /// A body fed by the transport chunk-by-chunk.
    ///
    /// Dropping the sender ends the stream; [`BodySender::fail`] poisons
    /// the body so every read reports the transport error.
    pub fn channel() -> (BodySender, Self) {
        let (tx, rx) = mpsc::channel(BODY_CHANNEL_CAPACITY);
        let body = Self {
            state: Mutex::new(BodyState::Streaming(rx)),
        };
        (BodySender { tx }, body)
    }

    /// Drain the stream if needed and return the cached bytes.
    async fn fill(&self, abort: &CancellationToken) -> Result<Bytes> {
        if abort.is_cancelled() {
            return Err(MockwireError::Aborted);
        }

        let mut state = self.state.lock().await;
        match &*state {
            BodyState::Buffered(bytes) => return Ok(bytes.clone()),
            BodyState::Failed(msg) => return Err(MockwireError::BodyStream(msg.clone())),
            BodyState::Streaming(_) => {}
        }

        // Take the receiver out so the drain below can replace the state.
        let BodyState::Streaming(mut rx) =
            std::mem::replace(&mut *state, BodyState::Buffered(Bytes::new()))
        else {
            // Unreachable: checked above while holding the lock.
            return Ok(Bytes::new());
        };

        let mut buf = BytesMut::new();
        loop {
            tokio::select! {
                // An aborted request is terminal: the entry check above
                // fails every later read, so the receiver can go.
                _ = abort.cancelled() => return Err(MockwireError::Aborted),
                chunk = rx.recv() => match chunk {
                    Some(Ok(bytes)) => buf.extend_from_slice(&bytes),
                    Some(Err(e)) => {
                        *state = BodyState::Failed(e.to_string());
                        return Err(e);
                    }
                    None => break,
                }
            }
        }

        let bytes = buf.freeze();
        *state = BodyState::Buffered(bytes.clone());
        Ok(bytes)
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Self::buffered(bytes)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Self::buffered(bytes)
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Self::buffered(text.into_bytes())
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Self::buffered(text.as_bytes().to_vec())
    }
}

/// Transport-side handle feeding chunks into a [`Body::channel`] body.
#[derive(Clone)]
pub struct BodySender {
    tx: mpsc::Sender<Result<Bytes>>,
}

impl BodySender {
    /// Send one chunk. Returns `false` if the body was dropped.
    pub async fn send(&self, chunk: impl Into<Bytes>) -> bool {
        self.tx.send(Ok(chunk.into())).await.is_ok()
    }

    /// Terminate the stream with a transport error.
    pub async fn fail(self, error: MockwireError) {
        let _ = self.tx.send(Err(error)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get(url: &str) -> InterceptedRequest {
        InterceptedRequest::builder(Method::GET, url).build().unwrap()
    }

    #[test]
    fn test_builder_basic() {
        let req = InterceptedRequest::builder(Method::GET, "https://api.test/user/42?full=1")
            .header("x-client", "test")
            .build()
            .unwrap();

        assert_eq!(req.method(), &Method::GET);
        assert_eq!(req.path(), "/user/42");
        assert_eq!(req.url().query(), Some("full=1"));
        assert_eq!(req.header("x-client"), Some("test"));
    }

    #[test]
    fn test_builder_invalid_url() {
        let result = InterceptedRequest::builder(Method::GET, "not a url").build();
        assert!(matches!(result, Err(MockwireError::InvalidUrl(_))));
    }

    #[test]
    fn test_builder_invalid_header() {
        let result = InterceptedRequest::builder(Method::GET, "https://api.test/")
            .header("bad header name", "x")
            .build();
        assert!(matches!(result, Err(MockwireError::InvalidHeader(_))));
    }

    #[tokio::test]
    async fn test_empty_body() {
        let req = get("https://api.test/");
        assert!(req.body_bytes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_buffered_body_rereadable() {
        let req = InterceptedRequest::builder(Method::POST, "https://api.test/items")
            .body(r#"{"id":1}"#)
            .build()
            .unwrap();

        let first = req.body_bytes().await.unwrap();
        let second = req.body_bytes().await.unwrap();
        assert_eq!(first, second);

        let value: serde_json::Value = req.body_json().await.unwrap();
        assert_eq!(value["id"], 1);
    }

    #[tokio::test]
    async fn test_streamed_body_drains_and_caches() {
        let (tx, body) = Body::channel();
        let req = InterceptedRequest::builder(Method::POST, "https://api.test/upload")
            .body(body)
            .build()
            .unwrap();

        tokio::spawn(async move {
            tx.send("hello ").await;
            tx.send("world").await;
        });

        assert_eq!(req.body_text().await.unwrap(), "hello world");
        // Second read hits the cache, the channel is gone by now.
        assert_eq!(req.body_text().await.unwrap(), "hello world");
    }

    #[tokio::test]
    async fn test_streamed_body_failure_sticks() {
        let (tx, body) = Body::channel();
        let req = InterceptedRequest::builder(Method::POST, "https://api.test/upload")
            .body(body)
            .build()
            .unwrap();

        tx.fail(MockwireError::BodyStream("connection reset".into()))
            .await;

        assert!(matches!(
            req.body_bytes().await,
            Err(MockwireError::BodyStream(_))
        ));
        // The failure is cached as well.
        assert!(matches!(
            req.body_bytes().await,
            Err(MockwireError::BodyStream(_))
        ));
    }

    #[tokio::test]
    async fn test_abort_fails_pending_read() {
        let (_tx, body) = Body::channel();
        let req = InterceptedRequest::builder(Method::POST, "https://api.test/upload")
            .body(body)
            .build()
            .unwrap();

        let abort = req.abort_token().clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            abort.cancel();
        });

        assert!(matches!(
            req.body_bytes().await,
            Err(MockwireError::Aborted)
        ));
    }

    #[tokio::test]
    async fn test_abort_before_read() {
        let req = get("https://api.test/");
        req.abort_token().cancel();
        assert!(matches!(
            req.body_bytes().await,
            Err(MockwireError::Aborted)
        ));
    }

    #[tokio::test]
    async fn test_body_text_invalid_utf8() {
        let req = InterceptedRequest::builder(Method::POST, "https://api.test/raw")
            .body(vec![0xff, 0xfe])
            .build()
            .unwrap();
        assert!(matches!(
            req.body_text().await,
            Err(MockwireError::BodyStream(_))
        ));
    }
}
