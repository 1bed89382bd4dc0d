//! Request context for resolvers.
//!
//! A [`RequestContext`] is constructed fresh for every interception and
//! handed to the matched handler's resolver as its sole argument. It
//! carries:
//! - the request itself (shared, read-only)
//! - a process-unique `request_id`
//! - `params` captured from the path pattern
//! - `cookies` parsed from the `Cookie` header
//! - the GraphQL payload, for GraphQL-matched handlers
//!
//! Extraction re-derives params with the same capture algorithm the
//! matcher uses, so it is deterministic and side-effect-free; the GraphQL
//! payload parse goes through the request body's cache, so a resolver's
//! own later body read still succeeds.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use http::header::COOKIE;
use http::HeaderMap;
use serde_json::{Map, Value};

use super::{Handler, Predicate};
use crate::error::Result;
use crate::matcher::{GraphqlPayload, PathParams};
use crate::request::InterceptedRequest;

/// Next interception identifier. 0 is never handed out.
static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

fn next_request_id() -> u64 {
    NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed)
}

/// Per-interception view handed to a resolver.
///
/// Cheap to clone; every invocation gets its own instance, so concurrent
/// requests never observe each other's params or identifiers.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request: Arc<InterceptedRequest>,
    request_id: u64,
    params: PathParams,
    cookies: HashMap<String, String>,
    graphql: Option<GraphqlPayload>,
}

impl RequestContext {
    /// Build the context for a request and the handler that matched it.
    ///
    /// Only fails if a GraphQL payload read is interrupted by the
    /// transport (abort, stream error); the matcher has already proven
    /// the payload itself parses.
    pub async fn extract(
        request: Arc<InterceptedRequest>,
        handler: &Handler,
    ) -> Result<RequestContext> {
        let params = match handler.predicate() {
            Predicate::Rest { pattern, .. } => {
                pattern.captures(request.path()).unwrap_or_default()
            }
            Predicate::Graphql { .. } => PathParams::default(),
        };

        let graphql = match handler.predicate() {
            Predicate::Graphql { .. } => Some(GraphqlPayload::from_request(&request).await?),
            Predicate::Rest { .. } => None,
        };

        Ok(RequestContext {
            cookies: parse_cookies(request.headers()),
            params,
            graphql,
            request_id: next_request_id(),
            request,
        })
    }

    /// The intercepted request.
    #[inline]
    pub fn request(&self) -> &InterceptedRequest {
        &self.request
    }

    /// Process-unique identifier of this interception.
    #[inline]
    pub fn request_id(&self) -> u64 {
        self.request_id
    }

    /// All captured path params.
    #[inline]
    pub fn params(&self) -> &PathParams {
        &self.params
    }

    /// A single-segment path param.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.param(name)
    }

    /// An ordered-sequence path param (wildcards, repeated names).
    pub fn param_list(&self, name: &str) -> Option<&[String]> {
        self.params.param_list(name)
    }

    /// All request cookies, last-value-wins on duplicate names.
    #[inline]
    pub fn cookies(&self) -> &HashMap<String, String> {
        &self.cookies
    }

    /// A single cookie value.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// The GraphQL payload; `None` for REST-matched handlers.
    #[inline]
    pub fn graphql(&self) -> Option<&GraphqlPayload> {
        self.graphql.as_ref()
    }

    /// Raw GraphQL query document, if this is a GraphQL interception.
    pub fn query(&self) -> Option<&str> {
        self.graphql.as_ref().map(|p| p.query.as_str())
    }

    /// GraphQL variables; empty map for GraphQL requests without any.
    pub fn variables(&self) -> Option<&Map<String, Value>> {
        self.graphql.as_ref().map(|p| &p.variables)
    }

    /// Explicit GraphQL `operationName`, if the request carried one.
    pub fn operation_name(&self) -> Option<&str> {
        self.graphql
            .as_ref()
            .and_then(|p| p.operation_name.as_deref())
    }
}

/// Parse every `Cookie` header into a name/value map.
///
/// Splits on `;`, trims whitespace, skips nameless fragments. Duplicate
/// names resolve to the last value seen, across headers as well.
fn parse_cookies(headers: &HeaderMap) -> HashMap<String, String> {
    let mut cookies = HashMap::new();
    for header in headers.get_all(COOKIE) {
        let Ok(raw) = header.to_str() else {
            continue;
        };
        for pair in raw.split(';') {
            let Some((name, value)) = pair.split_once('=') else {
                continue;
            };
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            cookies.insert(name.to_string(), value.trim().to_string());
        }
    }
    cookies
}
