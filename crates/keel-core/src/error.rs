//! Error types for cache operations.
//!
//! This module provides [`XdsError`], the error type shared by every keel
//! crate. Variants map onto gRPC status codes via [`tonic::Status`] so the
//! embedding discovery server can surface them directly.

/// Error type for snapshot cache operations.
///
/// Two variants deserve a note:
///
/// - [`XdsError::SkipFetch`] is a sentinel, not a fault: a fetch found the
///   client already at the current version. Callers poll again later.
/// - [`XdsError::SinkSendFailed`] indicates the embedder broke the sink
///   contract (a response channel with spare capacity for every outstanding
///   response).
#[derive(Debug, thiserror::Error)]
pub enum XdsError {
    /// No snapshot has been set for the requested node.
    #[error("no snapshot found for node {node}")]
    MissingSnapshot {
        /// The node key that was requested.
        node: String,
    },

    /// Fetch found the request version identical to the snapshot version.
    #[error("skip fetch: version up to date")]
    SkipFetch,

    /// The embedder's cancellation signal fired before a response was sent.
    #[error("response cancelled")]
    Cancelled,

    /// A response channel could not accept a response.
    #[error("failed to send response: {reason}")]
    SinkSendFailed {
        /// Why the send failed (channel full or closed).
        reason: String,
    },

    /// Encoding a resource payload failed while building the version map.
    #[error("encoding error for {type_url}: {message}")]
    EncodingError {
        /// The type URL being encoded.
        type_url: String,
        /// Error message.
        message: String,
    },
}

/// Convert to [`tonic::Status`] for gRPC responses.
impl From<XdsError> for tonic::Status {
    fn from(err: XdsError) -> Self {
        match &err {
            XdsError::MissingSnapshot { .. } => tonic::Status::not_found(err.to_string()),
            // A skipped fetch is "no update", not a failure.
            XdsError::SkipFetch => tonic::Status::ok(err.to_string()),
            XdsError::Cancelled => tonic::Status::cancelled(err.to_string()),
            XdsError::SinkSendFailed { .. } => tonic::Status::internal(err.to_string()),
            XdsError::EncodingError { .. } => tonic::Status::invalid_argument(err.to_string()),
        }
    }
}
