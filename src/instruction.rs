//! Resolver reply primitives, normalized instructions, and dispositions.
//!
//! Resolvers never build an [`Instruction`] directly. They return a
//! [`Reply`] through the two dedicated primitives:
//!
//! - [`respond_with`] — deliver a synthesized response
//! - [`passthrough`] — perform the original request unmodified
//!
//! The invocation engine normalizes the resolver's return value into
//! exactly one `Instruction`, and the interpreter collapses it into the
//! terminal [`Disposition`] consumed by the transport. There is no
//! structural sniffing of return values: the variants are the contract.

use crate::error::MockwireError;
use crate::response::MockResponse;

/// What a resolver hands back to the engine.
#[derive(Debug)]
pub enum Reply {
    /// Deliver a synthesized response, short-circuiting the network.
    Mock(MockResponse),
    /// Perform the original request unmodified.
    Passthrough,
}

/// Instruct the engine to deliver a synthesized response.
///
/// Typical resolver tail: `Ok(respond_with(MockResponse::json(&body)?))`.
pub fn respond_with(response: MockResponse) -> Option<Reply> {
    Some(Reply::Mock(response))
}

/// Instruct the engine to let the original request through unmodified.
pub fn passthrough() -> Option<Reply> {
    Some(Reply::Passthrough)
}

/// Normalized outcome of one resolver invocation.
///
/// Produced exactly once per interception, never mutated afterwards.
#[derive(Debug)]
pub enum Instruction {
    /// Deliver this synthesized response to the caller.
    Mock(MockResponse),
    /// Signal the transport to perform the original request.
    Passthrough,
    /// Propagate a resolver failure as a network-error-shaped outcome.
    Error(MockwireError),
}

impl Instruction {
    /// Drive the final disposition for the transport collaborator.
    ///
    /// Terminal in all three cases; no retries happen at this layer.
    pub fn apply(self) -> Disposition {
        match self {
            Instruction::Mock(response) => Disposition::Mocked(response),
            Instruction::Passthrough => Disposition::PassedThrough,
            Instruction::Error(error) => {
                tracing::debug!("resolution failed: {}", error);
                Disposition::Failed(error)
            }
        }
    }
}

/// Terminal outcome of one interception, consumed by the transport.
#[derive(Debug)]
pub enum Disposition {
    /// Deliver the materialized response; the original request is never
    /// performed.
    Mocked(MockResponse),
    /// Perform the original request unmodified and hand its real
    /// response (or error) to the caller.
    PassedThrough,
    /// Fail the request at the caller's call site without performing it.
    Failed(MockwireError),
}

impl Disposition {
    /// True if the request was answered with a synthesized response.
    pub fn is_mocked(&self) -> bool {
        matches!(self, Disposition::Mocked(_))
    }

    /// True if the original request should be performed unmodified.
    pub fn is_passthrough(&self) -> bool {
        matches!(self, Disposition::PassedThrough)
    }

    /// True if the request fails without being performed.
    pub fn is_failed(&self) -> bool {
        matches!(self, Disposition::Failed(_))
    }

    /// The mocked response, if any.
    pub fn mocked(&self) -> Option<&MockResponse> {
        match self {
            Disposition::Mocked(response) => Some(response),
            _ => None,
        }
    }
}
