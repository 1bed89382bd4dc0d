//! Handlers: matching predicates bound to resolver functions.
//!
//! A [`Handler`] pairs a [`Predicate`] (method + path pattern for REST,
//! operation kind + name for GraphQL) with a user-supplied [`Resolver`].
//! Handlers are created at registration time and immutable afterwards;
//! they live for the duration of the registry's scope.
//!
//! Provides:
//! - [`HandlerRegistry`] - ordered handler sequence with first-match-wins
//! - [`RequestContext`] - per-interception view handed to resolvers
//!
//! # Example
//!
//! ```ignore
//! use mockwire::handler::Handler;
//! use mockwire::instruction::{passthrough, respond_with};
//! use mockwire::response::MockResponse;
//!
//! let handler = Handler::get("/user/:id", |ctx| async move {
//!     if ctx.param("id") == Some("abc-123") {
//!         Ok(respond_with(MockResponse::json(&serde_json::json!({
//!             "id": "abc-123",
//!             "name": "John",
//!         }))?))
//!     } else {
//!         Ok(passthrough())
//!     }
//! })?;
//! ```

mod context;
mod registry;

pub use context::RequestContext;
pub use registry::HandlerRegistry;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use http::Method;

use crate::error::{BoxError, Result};
use crate::instruction::Reply;
use crate::matcher::{GraphqlPayload, OperationKind, PathPattern};
use crate::request::InterceptedRequest;

/// Boxed future for resolver results.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What a resolver invocation produces before normalization.
///
/// `Ok(Some(reply))` carries an instruction, `Ok(None)` means the resolver
/// produced nothing (surfaced as a programming error), `Err` is a runtime
/// fault.
pub type ResolverOutput = std::result::Result<Option<Reply>, BoxError>;

/// User-supplied function deciding the disposition of one intercepted
/// request.
///
/// Implemented for any `Fn(RequestContext) -> Future` closure; resolvers
/// may suspend for arbitrary async work (delays, body reads).
pub trait Resolver: Send + Sync + 'static {
    /// Resolve one intercepted request.
    fn resolve(&self, ctx: RequestContext) -> BoxFuture<'static, ResolverOutput>;
}

impl<F, Fut> Resolver for F
where
    F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ResolverOutput> + Send + 'static,
{
    fn resolve(&self, ctx: RequestContext) -> BoxFuture<'static, ResolverOutput> {
        Box::pin((self)(ctx))
    }
}

/// Method requirement of a REST predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodMatcher {
    /// Method must match exactly (case-insensitive).
    Exact(Method),
    /// Any method.
    Any,
}

impl MethodMatcher {
    fn matches(&self, method: &Method) -> bool {
        match self {
            MethodMatcher::Exact(expected) => {
                expected.as_str().eq_ignore_ascii_case(method.as_str())
            }
            MethodMatcher::Any => true,
        }
    }
}

impl From<Method> for MethodMatcher {
    fn from(method: Method) -> Self {
        MethodMatcher::Exact(method)
    }
}

/// Operation-name requirement of a GraphQL predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationMatcher {
    /// Operation name must match exactly.
    Exact(String),
    /// Any operation of the registered kind, anonymous included.
    Any,
}

impl OperationMatcher {
    fn matches(&self, name: Option<&str>) -> bool {
        match self {
            OperationMatcher::Exact(expected) => name == Some(expected.as_str()),
            OperationMatcher::Any => true,
        }
    }
}

/// Matching predicate of a handler.
#[derive(Debug, Clone)]
pub enum Predicate {
    /// Method + path pattern against the request line.
    Rest {
        /// Method requirement.
        method: MethodMatcher,
        /// Path pattern with `:name` and `*` segments.
        pattern: PathPattern,
    },
    /// Operation kind + name against a GraphQL payload.
    Graphql {
        /// `query` or `mutation`.
        kind: OperationKind,
        /// Operation-name requirement.
        operation: OperationMatcher,
    },
}

/// A registered (predicate, resolver) pair.
pub struct Handler {
    predicate: Predicate,
    resolver: Arc<dyn Resolver>,
}

impl Handler {
    /// Create a handler from an explicit predicate.
    pub fn new(predicate: Predicate, resolver: impl Resolver) -> Self {
        Self {
            predicate,
            resolver: Arc::new(resolver),
        }
    }

    /// REST handler for an arbitrary method requirement.
    pub fn rest(
        method: impl Into<MethodMatcher>,
        pattern: &str,
        resolver: impl Resolver,
    ) -> Result<Self> {
        Ok(Self::new(
            Predicate::Rest {
                method: method.into(),
                pattern: PathPattern::parse(pattern)?,
            },
            resolver,
        ))
    }

    /// `GET` handler.
    pub fn get(pattern: &str, resolver: impl Resolver) -> Result<Self> {
        Self::rest(Method::GET, pattern, resolver)
    }

    /// `POST` handler.
    pub fn post(pattern: &str, resolver: impl Resolver) -> Result<Self> {
        Self::rest(Method::POST, pattern, resolver)
    }

    /// `PUT` handler.
    pub fn put(pattern: &str, resolver: impl Resolver) -> Result<Self> {
        Self::rest(Method::PUT, pattern, resolver)
    }

    /// `PATCH` handler.
    pub fn patch(pattern: &str, resolver: impl Resolver) -> Result<Self> {
        Self::rest(Method::PATCH, pattern, resolver)
    }

    /// `DELETE` handler.
    pub fn delete(pattern: &str, resolver: impl Resolver) -> Result<Self> {
        Self::rest(Method::DELETE, pattern, resolver)
    }

    /// Handler matching every method on a path.
    pub fn all(pattern: &str, resolver: impl Resolver) -> Result<Self> {
        Self::rest(MethodMatcher::Any, pattern, resolver)
    }

    /// GraphQL handler for an explicit kind and name requirement.
    pub fn graphql(
        kind: OperationKind,
        operation: OperationMatcher,
        resolver: impl Resolver,
    ) -> Self {
        Self::new(Predicate::Graphql { kind, operation }, resolver)
    }

    /// GraphQL handler for a named `query` operation.
    pub fn graphql_query(name: &str, resolver: impl Resolver) -> Self {
        Self::graphql(
            OperationKind::Query,
            OperationMatcher::Exact(name.to_string()),
            resolver,
        )
    }

    /// GraphQL handler for a named `mutation` operation.
    pub fn graphql_mutation(name: &str, resolver: impl Resolver) -> Self {
        Self::graphql(
            OperationKind::Mutation,
            OperationMatcher::Exact(name.to_string()),
            resolver,
        )
    }

    /// The handler's matching predicate.
    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    pub(crate) fn resolver(&self) -> Arc<dyn Resolver> {
        self.resolver.clone()
    }

    /// Evaluate this handler's predicate against a request.
    ///
    /// GraphQL predicates read (and cache) the request body; a payload
    /// that is not well-formed GraphQL is a non-match, never a failure.
    pub async fn matches(&self, request: &InterceptedRequest) -> bool {
        match &self.predicate {
            Predicate::Rest { method, pattern } => {
                method.matches(request.method()) && pattern.matches(request.path())
            }
            Predicate::Graphql { kind, operation } => {
                let payload = match GraphqlPayload::from_request(request).await {
                    Ok(payload) => payload,
                    Err(e) => {
                        tracing::debug!("GraphQL predicate skipped: {}", e);
                        return false;
                    }
                };
                match payload.operation() {
                    Ok(op) => op.kind == *kind && operation.matches(op.name.as_deref()),
                    Err(e) => {
                        tracing::debug!("GraphQL predicate skipped: {}", e);
                        false
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handler")
            .field("predicate", &self.predicate)
            .finish_non_exhaustive()
    }
}
