//! # mockwire
//!
//! Request-interception and mock-resolution engine for REST and GraphQL.
//!
//! mockwire sits behind an interception transport (service worker bridge,
//! patched socket layer, OS proxy - not provided here): the transport
//! captures an outgoing request, hands it to the engine, and acts on the
//! resulting disposition. The engine matches the request against an
//! ordered set of handlers, invokes the first match's resolver, and
//! normalizes what the resolver returns into exactly one of three
//! outcomes: a synthesized response, passthrough of the original request,
//! or an error.
//!
//! ## Architecture
//!
//! - **Matching** ([`handler::HandlerRegistry`]): first-match-wins over
//!   registration order, copy-on-write snapshots under mutation
//! - **Extraction** ([`handler::RequestContext`]): path params, cookies,
//!   GraphQL query/variables/operationName
//! - **Invocation** ([`invoke`]): async resolver call, abort racing,
//!   panic isolation, return normalization
//! - **Interpretation** ([`instruction::Instruction::apply`]): collapse
//!   into the terminal [`instruction::Disposition`]
//!
//! ## Example
//!
//! ```ignore
//! use mockwire::{Handler, Interceptor, MockResponse};
//! use mockwire::instruction::{passthrough, respond_with};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let interceptor = Interceptor::new(vec![
//!         Handler::get("/user/:id", |ctx| async move {
//!             if ctx.param("id") == Some("abc-123") {
//!                 Ok(respond_with(MockResponse::json(&serde_json::json!({
//!                     "id": "abc-123",
//!                     "name": "John",
//!                 }))?))
//!             } else {
//!                 Ok(passthrough())
//!             }
//!         })?,
//!     ]);
//!
//!     // Transport hands over a captured request...
//!     # let request = mockwire::request::InterceptedRequest::builder(
//!     #     http::Method::GET, "https://api.test/user/abc-123").build()?;
//!     let disposition = interceptor.intercept(request).await;
//!     assert!(disposition.is_mocked());
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod handler;
pub mod instruction;
pub mod matcher;
pub mod request;
pub mod response;

mod interceptor;

pub use error::MockwireError;
pub use handler::{Handler, RequestContext};
pub use interceptor::{invoke, Interceptor, UnhandledPolicy};
pub use request::InterceptedRequest;
pub use response::MockResponse;
