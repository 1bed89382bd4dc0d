//! GraphQL payload extraction and operation scanning.
//!
//! A GraphQL request arrives either as a POST with a JSON document body
//! (`{"query": "...", "variables": {...}, "operationName": "..."}`) or as a
//! GET with the same three fields in the query string. Anything that does
//! not fit that shape is reported as [`MockwireError::MalformedGraphql`];
//! the matcher treats that as a non-match rather than a hard failure.
//!
//! Operation scanning reads just enough of the document to find top-level
//! operation definitions (kind + optional name). It is not a full GraphQL
//! parser: selection sets, arguments, and fragments are skipped over by
//! bracket counting, with comments and string literals ignored.

use serde_json::{Map, Value};

use crate::error::{MockwireError, Result};
use crate::request::InterceptedRequest;

/// Operation type a handler can register for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// `query` operations (including anonymous shorthand documents).
    Query,
    /// `mutation` operations.
    Mutation,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationKind::Query => write!(f, "query"),
            OperationKind::Mutation => write!(f, "mutation"),
        }
    }
}

/// An operation definition found in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedOperation {
    /// Operation type.
    pub kind: OperationKind,
    /// Operation name; `None` for anonymous operations.
    pub name: Option<String>,
}

/// The three fields of a GraphQL request, parsed once per interception
/// and cached in the request context.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphqlPayload {
    /// Raw query document.
    pub query: String,
    /// Variable map; empty when the request carried none.
    pub variables: Map<String, Value>,
    /// Explicit `operationName`, if any.
    pub operation_name: Option<String>,
}

impl GraphqlPayload {
    /// Extract a payload from an intercepted request.
    ///
    /// POST reads the (cached) body as JSON; GET reads the query string,
    /// with `variables` itself JSON-encoded. Abort and transport errors
    /// propagate as-is; every shape problem becomes `MalformedGraphql`.
    pub async fn from_request(request: &InterceptedRequest) -> Result<Self> {
        match request.method().as_str() {
            "POST" => {
                let bytes = request.body_bytes().await?;
                let value: Value = serde_json::from_slice(&bytes).map_err(|e| {
                    MockwireError::MalformedGraphql(format!("body is not JSON: {}", e))
                })?;
                Self::from_json(value)
            }
            "GET" => Self::from_query_pairs(request),
            other => Err(MockwireError::MalformedGraphql(format!(
                "unsupported method {}",
                other
            ))),
        }
    }

    fn from_json(value: Value) -> Result<Self> {
        let malformed = |msg: &str| MockwireError::MalformedGraphql(msg.to_string());

        let Value::Object(mut fields) = value else {
            return Err(malformed("body is not a JSON object"));
        };

        let query = match fields.remove("query") {
            Some(Value::String(q)) => q,
            Some(_) => return Err(malformed("`query` is not a string")),
            None => return Err(malformed("missing `query` field")),
        };

        let variables = match fields.remove("variables") {
            Some(Value::Object(map)) => map,
            Some(Value::Null) | None => Map::new(),
            Some(_) => return Err(malformed("`variables` is not an object")),
        };

        let operation_name = match fields.remove("operationName") {
            Some(Value::String(name)) => Some(name),
            Some(Value::Null) | None => None,
            Some(_) => return Err(malformed("`operationName` is not a string")),
        };

        Ok(Self {
            query,
            variables,
            operation_name,
        })
    }

    fn from_query_pairs(request: &InterceptedRequest) -> Result<Self> {
        let mut query = None;
        let mut variables = Map::new();
        let mut operation_name = None;

        for (key, value) in request.url().query_pairs() {
            match key.as_ref() {
                "query" => query = Some(value.into_owned()),
                "variables" => {
                    let parsed: Value = serde_json::from_str(&value).map_err(|e| {
                        MockwireError::MalformedGraphql(format!(
                            "`variables` is not JSON: {}",
                            e
                        ))
                    })?;
                    variables = match parsed {
                        Value::Object(map) => map,
                        Value::Null => Map::new(),
                        _ => {
                            return Err(MockwireError::MalformedGraphql(
                                "`variables` is not an object".to_string(),
                            ))
                        }
                    };
                }
                "operationName" => operation_name = Some(value.into_owned()),
                _ => {}
            }
        }

        let query = query.ok_or_else(|| {
            MockwireError::MalformedGraphql("missing `query` parameter".to_string())
        })?;

        Ok(Self {
            query,
            variables,
            operation_name,
        })
    }

    /// The operation this request executes.
    ///
    /// An explicit `operationName` selects among the document's
    /// definitions; otherwise the document must contain exactly one
    /// operation.
    pub fn operation(&self) -> Result<ParsedOperation> {
        let operations = scan_operations(&self.query);
        if operations.is_empty() {
            return Err(MockwireError::MalformedGraphql(
                "no operation definition found".to_string(),
            ));
        }

        match &self.operation_name {
            Some(name) => operations
                .into_iter()
                .find(|op| op.name.as_deref() == Some(name.as_str()))
                .ok_or_else(|| {
                    MockwireError::MalformedGraphql(format!(
                        "operation `{}` not found in document",
                        name
                    ))
                }),
            None if operations.len() == 1 => Ok(operations.into_iter().next().unwrap_or(
                // Unreachable: len() == 1.
                ParsedOperation {
                    kind: OperationKind::Query,
                    name: None,
                },
            )),
            None => Err(MockwireError::MalformedGraphql(
                "operationName required for multi-operation documents".to_string(),
            )),
        }
    }
}

/// Scan a document for top-level operation definitions.
///
/// Tracks brace depth so selection-set contents never look like
/// operations, and paren depth so object literals in variable defaults
/// don't confuse the brace tracking. Subscriptions and fragments are
/// consumed but not reported.
fn scan_operations(document: &str) -> Vec<ParsedOperation> {
    let bytes = document.as_bytes();
    let mut operations = Vec::new();
    let mut i = 0;
    let mut brace_depth = 0usize;
    let mut paren_depth = 0usize;
    // True between an operation/fragment keyword and its opening brace.
    let mut header_open = false;

    while i < bytes.len() {
        match bytes[i] {
            b'#' => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'"' => i = skip_string(bytes, i),
            b'(' => {
                paren_depth += 1;
                i += 1;
            }
            b')' => {
                paren_depth = paren_depth.saturating_sub(1);
                i += 1;
            }
            b'{' if paren_depth == 0 => {
                if brace_depth == 0 && !header_open {
                    // Shorthand document: anonymous query.
                    operations.push(ParsedOperation {
                        kind: OperationKind::Query,
                        name: None,
                    });
                }
                header_open = false;
                brace_depth += 1;
                i += 1;
            }
            b'}' if paren_depth == 0 => {
                brace_depth = brace_depth.saturating_sub(1);
                i += 1;
            }
            c if is_ident_start(c) => {
                let start = i;
                while i < bytes.len() && is_ident_char(bytes[i]) {
                    i += 1;
                }
                if brace_depth == 0 && paren_depth == 0 {
                    let keyword = &document[start..i];
                    let kind = match keyword {
                        "query" => Some(OperationKind::Query),
                        "mutation" => Some(OperationKind::Mutation),
                        "subscription" | "fragment" => {
                            header_open = true;
                            None
                        }
                        _ => None,
                    };
                    if let Some(kind) = kind {
                        header_open = true;
                        let name = peek_ident(bytes, document, i);
                        operations.push(ParsedOperation { kind, name });
                    }
                }
            }
            _ => i += 1,
        }
    }

    operations
}

/// Skip a string literal (regular or `"""` block), returning the index
/// just past its closing quote.
fn skip_string(bytes: &[u8], start: usize) -> usize {
    if bytes[start..].starts_with(b"\"\"\"") {
        let mut i = start + 3;
        while i + 2 < bytes.len() {
            if &bytes[i..i + 3] == b"\"\"\"" {
                return i + 3;
            }
            i += 1;
        }
        return bytes.len();
    }

    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

/// Read the identifier following position `i`, skipping whitespace and
/// commas. Returns `None` if the next token is not an identifier (e.g.
/// the `(` of variable definitions or the `{` of an anonymous operation).
fn peek_ident(bytes: &[u8], document: &str, mut i: usize) -> Option<String> {
    while i < bytes.len() && (bytes[i].is_ascii_whitespace() || bytes[i] == b',') {
        i += 1;
    }
    if i >= bytes.len() || !is_ident_start(bytes[i]) {
        return None;
    }
    let start = i;
    while i < bytes.len() && is_ident_char(bytes[i]) {
        i += 1;
    }
    Some(document[start..i].to_string())
}

fn is_ident_start(c: u8) -> bool {
    c == b'_' || c.is_ascii_alphabetic()
}

fn is_ident_char(c: u8) -> bool {
    c == b'_' || c.is_ascii_alphanumeric()
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;
    use serde_json::json;

    use crate::request::InterceptedRequest;

    fn post(body: serde_json::Value) -> InterceptedRequest {
        InterceptedRequest::builder(Method::POST, "https://api.test/graphql")
            .body(body.to_string())
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_post_payload() {
        let request = post(json!({
            "query": "query GetUser { user { id } }",
            "variables": {"userId": "u1"},
            "operationName": "GetUser",
        }));

        let payload = GraphqlPayload::from_request(&request).await.unwrap();
        assert_eq!(payload.query, "query GetUser { user { id } }");
        assert_eq!(payload.variables["userId"], "u1");
        assert_eq!(payload.operation_name.as_deref(), Some("GetUser"));
    }

    #[tokio::test]
    async fn test_post_defaults() {
        let request = post(json!({"query": "{ viewer { id } }"}));
        let payload = GraphqlPayload::from_request(&request).await.unwrap();
        assert!(payload.variables.is_empty());
        assert!(payload.operation_name.is_none());
    }

    #[tokio::test]
    async fn test_post_null_fields() {
        let request = post(json!({
            "query": "{ viewer { id } }",
            "variables": null,
            "operationName": null,
        }));
        let payload = GraphqlPayload::from_request(&request).await.unwrap();
        assert!(payload.variables.is_empty());
        assert!(payload.operation_name.is_none());
    }

    #[tokio::test]
    async fn test_post_malformed_shapes() {
        for body in [
            json!([1, 2]),
            json!({"variables": {}}),
            json!({"query": 42}),
            json!({"query": "{ x }", "variables": "nope"}),
            json!({"query": "{ x }", "operationName": 1}),
        ] {
            let request = post(body);
            assert!(matches!(
                GraphqlPayload::from_request(&request).await,
                Err(MockwireError::MalformedGraphql(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_post_non_json_body() {
        let request = InterceptedRequest::builder(Method::POST, "https://api.test/graphql")
            .body("definitely not json")
            .build()
            .unwrap();
        assert!(matches!(
            GraphqlPayload::from_request(&request).await,
            Err(MockwireError::MalformedGraphql(_))
        ));
    }

    #[tokio::test]
    async fn test_get_payload() {
        let request = InterceptedRequest::builder(
            Method::GET,
            "https://api.test/graphql?query=query%20GetUser%20%7B%20user%20%7B%20id%20%7D%20%7D\
             &variables=%7B%22userId%22%3A%22u1%22%7D&operationName=GetUser",
        )
        .build()
        .unwrap();

        let payload = GraphqlPayload::from_request(&request).await.unwrap();
        assert_eq!(payload.operation_name.as_deref(), Some("GetUser"));
        assert_eq!(payload.variables["userId"], "u1");
    }

    #[tokio::test]
    async fn test_get_missing_query() {
        let request =
            InterceptedRequest::builder(Method::GET, "https://api.test/graphql?operationName=X")
                .build()
                .unwrap();
        assert!(matches!(
            GraphqlPayload::from_request(&request).await,
            Err(MockwireError::MalformedGraphql(_))
        ));
    }

    #[tokio::test]
    async fn test_unsupported_method() {
        let request = InterceptedRequest::builder(Method::DELETE, "https://api.test/graphql")
            .build()
            .unwrap();
        assert!(matches!(
            GraphqlPayload::from_request(&request).await,
            Err(MockwireError::MalformedGraphql(_))
        ));
    }

    fn payload(query: &str, operation_name: Option<&str>) -> GraphqlPayload {
        GraphqlPayload {
            query: query.to_string(),
            variables: Map::new(),
            operation_name: operation_name.map(|s| s.to_string()),
        }
    }

    #[test]
    fn test_scan_named_query() {
        let ops = scan_operations("query GetUser { user { id } }");
        assert_eq!(
            ops,
            vec![ParsedOperation {
                kind: OperationKind::Query,
                name: Some("GetUser".to_string()),
            }]
        );
    }

    #[test]
    fn test_scan_mutation() {
        let ops = scan_operations("mutation CreatePost($title: String!) { createPost { id } }");
        assert_eq!(ops[0].kind, OperationKind::Mutation);
        assert_eq!(ops[0].name.as_deref(), Some("CreatePost"));
    }

    #[test]
    fn test_scan_anonymous_shorthand() {
        let ops = scan_operations("{ viewer { id } }");
        assert_eq!(
            ops,
            vec![ParsedOperation {
                kind: OperationKind::Query,
                name: None,
            }]
        );
    }

    #[test]
    fn test_scan_anonymous_keyword() {
        let ops = scan_operations("query { viewer { id } }");
        assert_eq!(ops[0].name, None);
        assert_eq!(ops.len(), 1);
    }

    #[test]
    fn test_scan_multiple_operations() {
        let ops = scan_operations(
            "query A { a }\nmutation B { b }\nfragment F on T { f }",
        );
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].name.as_deref(), Some("A"));
        assert_eq!(ops[1].kind, OperationKind::Mutation);
    }

    #[test]
    fn test_scan_ignores_selection_contents() {
        // Field names matching keywords inside selection sets are not
        // operations.
        let ops = scan_operations("query Q { mutation query { id } }");
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].name.as_deref(), Some("Q"));
    }

    #[test]
    fn test_scan_ignores_comments_and_strings() {
        let ops = scan_operations(
            "# mutation NotReal { x }\nquery Q { field(arg: \"mutation M { y }\") }",
        );
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].name.as_deref(), Some("Q"));
    }

    #[test]
    fn test_scan_object_default_in_variable_defs() {
        let ops = scan_operations("query Q($f: Filter = {limit: 10}) { items }");
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].name.as_deref(), Some("Q"));
    }

    #[test]
    fn test_operation_selects_by_name() {
        let doc = "query A { a } query B { b }";
        let op = payload(doc, Some("B")).operation().unwrap();
        assert_eq!(op.name.as_deref(), Some("B"));

        assert!(matches!(
            payload(doc, Some("C")).operation(),
            Err(MockwireError::MalformedGraphql(_))
        ));
        // Ambiguous without a name.
        assert!(matches!(
            payload(doc, None).operation(),
            Err(MockwireError::MalformedGraphql(_))
        ));
    }

    #[test]
    fn test_operation_single_without_name() {
        let op = payload("mutation M { m }", None).operation().unwrap();
        assert_eq!(op.kind, OperationKind::Mutation);
    }

    #[test]
    fn test_operation_empty_document() {
        assert!(matches!(
            payload("   ", None).operation(),
            Err(MockwireError::MalformedGraphql(_))
        ));
    }
}
