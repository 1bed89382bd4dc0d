//! Interceptor: the top-level resolution engine.
//!
//! One interception runs the full pipeline:
//! 1. Match the request against the registry (first match wins)
//! 2. Extract the request context for the matched handler
//! 3. Invoke the resolver and normalize its return into an instruction
//! 4. Apply the instruction into the terminal disposition
//!
//! The transport collaborator calls [`Interceptor::intercept`] once per
//! captured request and acts on the returned [`Disposition`]. Transports
//! that need their own unhandled-request policy can call
//! [`Interceptor::match_request`] directly instead.

use std::sync::Arc;

use crate::error::MockwireError;
use crate::handler::{Handler, HandlerRegistry, RequestContext, ResolverOutput};
use crate::instruction::{Disposition, Instruction, Reply};
use crate::request::InterceptedRequest;

/// What to do with a request no handler matched.
///
/// Functionality-wise the default mirrors a warn-and-perform policy: the
/// real request goes through, but the miss is visible in the logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnhandledPolicy {
    /// Silently perform the original request.
    Bypass,
    /// Perform the original request and log a warning.
    #[default]
    Warn,
    /// Fail the request with [`MockwireError::NoMatchingHandler`].
    Error,
}

/// Request-interception and mock-resolution engine.
///
/// Holds the handler registry and drives match → extract → invoke →
/// apply for each intercepted request. Cheap to share: wrap in an `Arc`
/// or hand out clones of the registry.
#[derive(Debug)]
pub struct Interceptor {
    registry: Arc<HandlerRegistry>,
    unhandled: UnhandledPolicy,
}

impl Interceptor {
    /// Create an interceptor over a baseline handler set.
    pub fn new(handlers: Vec<Handler>) -> Self {
        Self {
            registry: Arc::new(HandlerRegistry::new(handlers)),
            unhandled: UnhandledPolicy::default(),
        }
    }

    /// Replace the unhandled-request policy.
    pub fn unhandled_policy(mut self, policy: UnhandledPolicy) -> Self {
        self.unhandled = policy;
        self
    }

    /// The shared handler registry.
    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    /// Append handlers after the baseline set.
    pub fn use_handlers(&self, handlers: Vec<Handler>) {
        self.registry.use_handlers(handlers);
    }

    /// Prepend override handlers ahead of everything registered so far.
    pub fn prepend(&self, handlers: Vec<Handler>) {
        self.registry.prepend(handlers);
    }

    /// Restore the baseline handler set.
    pub fn reset(&self) {
        self.registry.reset();
    }

    /// Find the handler that would resolve this request, if any.
    pub async fn match_request(&self, request: &InterceptedRequest) -> Option<Arc<Handler>> {
        self.registry.match_request(request).await
    }

    /// Resolve one intercepted request into its terminal disposition.
    pub async fn intercept(&self, request: InterceptedRequest) -> Disposition {
        let request = Arc::new(request);

        let Some(handler) = self.registry.match_request(&request).await else {
            return self.unhandled(&request);
        };

        let ctx = match RequestContext::extract(request.clone(), &handler).await {
            Ok(ctx) => ctx,
            Err(e) => return Instruction::Error(e).apply(),
        };

        tracing::debug!(
            request_id = ctx.request_id(),
            "{} {} matched {:?}",
            request.method(),
            request.url(),
            handler.predicate()
        );

        invoke(&handler, ctx).await.apply()
    }

    fn unhandled(&self, request: &InterceptedRequest) -> Disposition {
        match self.unhandled {
            UnhandledPolicy::Bypass => Disposition::PassedThrough,
            UnhandledPolicy::Warn => {
                tracing::warn!(
                    "no handler matched {} {}, passing through",
                    request.method(),
                    request.url()
                );
                Disposition::PassedThrough
            }
            UnhandledPolicy::Error => {
                tracing::error!(
                    "no handler matched {} {}, failing request",
                    request.method(),
                    request.url()
                );
                Disposition::Failed(MockwireError::NoMatchingHandler {
                    method: request.method().clone(),
                    url: request.url().clone(),
                })
            }
        }
    }
}

/// Invoke a handler's resolver and normalize the outcome.
///
/// The resolver future runs isolated on its own task so a panic inside
/// user code becomes an [`Instruction::Error`] instead of tearing down
/// the caller. The invocation races the request's abort token: a caller
/// abort cancels the resolver and resolves to `Aborted`.
pub async fn invoke(handler: &Handler, ctx: RequestContext) -> Instruction {
    let abort = ctx.request().abort_token().clone();
    let resolver = handler.resolver();
    let mut task = tokio::spawn(resolver.resolve(ctx));

    tokio::select! {
        _ = abort.cancelled() => {
            task.abort();
            Instruction::Error(MockwireError::Aborted)
        }
        joined = &mut task => normalize(joined),
    }
}

/// Map the joined resolver output onto exactly one instruction.
fn normalize(joined: Result<ResolverOutput, tokio::task::JoinError>) -> Instruction {
    match joined {
        Ok(Ok(Some(Reply::Mock(response)))) => Instruction::Mock(response),
        Ok(Ok(Some(Reply::Passthrough))) => Instruction::Passthrough,
        Ok(Ok(None)) => Instruction::Error(MockwireError::InvalidResolverReturn),
        Ok(Err(cause)) => {
            tracing::error!("resolver failed: {}", cause);
            Instruction::Error(MockwireError::Resolver(cause))
        }
        Err(join_error) if join_error.is_panic() => {
            let message = panic_message(join_error);
            tracing::error!("resolver panicked: {}", message);
            Instruction::Error(MockwireError::ResolverPanic(message))
        }
        Err(_) => Instruction::Error(MockwireError::Aborted),
    }
}

fn panic_message(join_error: tokio::task::JoinError) -> String {
    let payload = join_error.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{Method, StatusCode};
    use serde_json::json;

    use crate::instruction::{passthrough, respond_with};
    use crate::response::MockResponse;

    fn get(url: &str) -> InterceptedRequest {
        InterceptedRequest::builder(Method::GET, url).build().unwrap()
    }

    fn user_handler() -> Handler {
        Handler::get("/user/:id", |ctx: RequestContext| async move {
            if ctx.param("id") == Some("abc-123") {
                Ok(respond_with(MockResponse::json(&json!({
                    "id": "abc-123",
                    "name": "John",
                }))?))
            } else {
                Ok(passthrough())
            }
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_scenario_mock_and_passthrough() {
        let interceptor = Interceptor::new(vec![user_handler()]);

        let disposition = interceptor
            .intercept(get("https://api.test/user/abc-123"))
            .await;
        let response = disposition.mocked().expect("should be mocked");
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_slice(response.body_bytes()).unwrap();
        assert_eq!(body["id"], "abc-123");
        assert_eq!(body["name"], "John");

        let disposition = interceptor.intercept(get("https://api.test/user/xyz")).await;
        assert!(disposition.is_passthrough());
    }

    #[tokio::test]
    async fn test_invoke_no_return_is_invalid() {
        let handler = Handler::get("/x", |_ctx: RequestContext| async { Ok(None) }).unwrap();
        let interceptor = Interceptor::new(vec![handler]);

        let disposition = interceptor.intercept(get("https://api.test/x")).await;
        assert!(matches!(
            disposition,
            Disposition::Failed(MockwireError::InvalidResolverReturn)
        ));
    }

    #[tokio::test]
    async fn test_invoke_resolver_fault_preserved() {
        let handler = Handler::get("/x", |_ctx: RequestContext| async {
            Err("backend exploded".into())
        })
        .unwrap();
        let interceptor = Interceptor::new(vec![handler]);

        let disposition = interceptor.intercept(get("https://api.test/x")).await;
        match disposition {
            Disposition::Failed(MockwireError::Resolver(cause)) => {
                assert_eq!(cause.to_string(), "backend exploded");
            }
            other => panic!("unexpected disposition: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invoke_panic_isolated() {
        let handler = Handler::get("/x", |_ctx: RequestContext| async {
            panic!("resolver bug")
        })
        .unwrap();
        let interceptor = Interceptor::new(vec![handler]);

        let disposition = interceptor.intercept(get("https://api.test/x")).await;
        match disposition {
            Disposition::Failed(MockwireError::ResolverPanic(message)) => {
                assert!(message.contains("resolver bug"));
            }
            other => panic!("unexpected disposition: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_abort_cancels_resolver() {
        let handler = Handler::get("/slow", |_ctx: RequestContext| async {
            tokio::time::sleep(std::time::Duration::from_secs(30)).await;
            Ok(passthrough())
        })
        .unwrap();
        let interceptor = Interceptor::new(vec![handler]);

        let request = get("https://api.test/slow");
        let abort = request.abort_token().clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            abort.cancel();
        });

        let start = std::time::Instant::now();
        let disposition = interceptor.intercept(request).await;
        assert!(matches!(
            disposition,
            Disposition::Failed(MockwireError::Aborted)
        ));
        assert!(start.elapsed() < std::time::Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_unhandled_bypass() {
        let interceptor =
            Interceptor::new(Vec::new()).unhandled_policy(UnhandledPolicy::Bypass);
        let disposition = interceptor.intercept(get("https://api.test/anything")).await;
        assert!(disposition.is_passthrough());
    }

    #[tokio::test]
    async fn test_unhandled_warn_passes_through() {
        let interceptor = Interceptor::new(Vec::new());
        let disposition = interceptor.intercept(get("https://api.test/anything")).await;
        assert!(disposition.is_passthrough());
    }

    #[tokio::test]
    async fn test_unhandled_error_fails() {
        let interceptor =
            Interceptor::new(Vec::new()).unhandled_policy(UnhandledPolicy::Error);
        let disposition = interceptor.intercept(get("https://api.test/missing")).await;
        assert!(matches!(
            disposition,
            Disposition::Failed(MockwireError::NoMatchingHandler { .. })
        ));
    }

    #[tokio::test]
    async fn test_lifecycle_override_and_reset() {
        let interceptor = Interceptor::new(vec![user_handler()]);

        interceptor.prepend(vec![Handler::get("/user/:id", |_ctx: RequestContext| async {
            Ok(respond_with(MockResponse::new(StatusCode::IM_A_TEAPOT)))
        })
        .unwrap()]);

        let disposition = interceptor
            .intercept(get("https://api.test/user/abc-123"))
            .await;
        assert_eq!(
            disposition.mocked().unwrap().status(),
            StatusCode::IM_A_TEAPOT
        );

        interceptor.reset();
        let disposition = interceptor
            .intercept(get("https://api.test/user/abc-123"))
            .await;
        assert_eq!(disposition.mocked().unwrap().status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_resolver_delay_does_not_block_others() {
        let interceptor = Arc::new(Interceptor::new(vec![
            Handler::get("/slow", |_ctx: RequestContext| async {
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                Ok(respond_with(MockResponse::text("slow")))
            })
            .unwrap(),
            Handler::get("/fast", |_ctx: RequestContext| async {
                Ok(respond_with(MockResponse::text("fast")))
            })
            .unwrap(),
        ]));

        let slow = {
            let interceptor = interceptor.clone();
            tokio::spawn(async move { interceptor.intercept(get("https://api.test/slow")).await })
        };
        let start = std::time::Instant::now();
        let fast = interceptor.intercept(get("https://api.test/fast")).await;
        assert!(fast.is_mocked());
        assert!(start.elapsed() < std::time::Duration::from_millis(100));

        assert!(slow.await.unwrap().is_mocked());
    }
}
