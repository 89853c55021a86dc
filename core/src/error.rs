//! Error types for the resource client.
//!
//! # Design
//! `InvalidArgumentCount` and `UnknownAction` are raised synchronously by the
//! call that caused them; they never reach the asynchronous path. Everything
//! else describes how a dispatched request settled and is delivered through
//! the error callback and the settlement handle, so the enum is `Clone`: one
//! failure may be observed by several holders of the same instance.
//! `NotDispatched` is what awaiting a detached instance yields.

/// Errors produced by resource calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// A call received more positional arguments than its shape table allows.
    #[error("expected 0-{max} arguments [params, data, success, error], got {received}")]
    InvalidArgumentCount { received: usize, max: usize },

    /// The resource type declares no action with this name.
    #[error("unknown action `{0}`")]
    UnknownAction(String),

    /// The transport could not complete the round-trip.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The server returned 404.
    #[error("resource not found")]
    NotFound,

    /// The server returned a non-2xx status other than 404.
    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    /// The response body could not be decoded as JSON.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// No tokio runtime was available to drive the request.
    #[error("no async runtime available: {0}")]
    Runtime(String),

    /// The instance has no call of its own to wait for.
    #[error("no call in flight for this instance")]
    NotDispatched,
}
