//! Unified error type for playcast-relay.
//!
//! Every crate funnels its failures into [`Error`]. The variants double as the
//! failure classification the collector acts on: only [`Error::TransientFetch`]
//! is worth retrying, only [`Error::FatalBootstrap`] stops the process, and
//! HTTP handlers derive a status code via [`Error::http_status`].

use std::fmt;

/// Unified error type covering all failure modes of the relay.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The feed could not be bootstrapped; nothing can be collected or served.
    #[error("Bootstrap failed: {0}")]
    FatalBootstrap(String),

    /// The request never produced a response (connection error, timeout,
    /// truncated body).
    #[error("Fetch of {url} failed: {message}")]
    TransientFetch {
        /// The upstream URL that was requested.
        url: String,
        /// Human-readable transport error.
        message: String,
    },

    /// The upstream answered, but not with a usable payload.
    #[error("Upstream rejected {url} with status {status}: {message}")]
    UpstreamRejection {
        /// The upstream URL that was requested.
        url: String,
        /// HTTP status returned by the upstream.
        status: u16,
        /// Short description of the rejection.
        message: String,
    },

    /// The fragment store could not be read or written.
    #[error("Store unavailable ({context}): {source}")]
    StoreUnavailable {
        /// The store operation that failed.
        context: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The requested entity does not exist (yet).
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g. "fragment", "sync").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// Input failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to an appropriate HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::FatalBootstrap(_) => 503,
            Error::TransientFetch { .. } => 504,
            Error::UpstreamRejection { .. } => 502,
            Error::StoreUnavailable { .. } => 503,
            Error::NotFound { .. } => 404,
            Error::Validation(_) => 400,
            Error::Internal(_) => 500,
        }
    }

    /// Stable machine-readable code for logs and JSON error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::FatalBootstrap(_) => "fatal_bootstrap",
            Error::TransientFetch { .. } => "transient_fetch",
            Error::UpstreamRejection { .. } => "upstream_rejection",
            Error::StoreUnavailable { .. } => "store_unavailable",
            Error::NotFound { .. } => "not_found",
            Error::Validation(_) => "validation_error",
            Error::Internal(_) => "internal_error",
        }
    }

    /// Whether repeating the same request may succeed.
    ///
    /// A rejection is a well-formed answer from the upstream, so repeating
    /// it is pointless; only transport-level failures qualify.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::TransientFetch { .. })
    }

    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Convenience constructor for [`Error::StoreUnavailable`].
    pub fn store(context: impl Into<String>, source: std::io::Error) -> Self {
        Error::StoreUnavailable {
            context: context.into(),
            source,
        }
    }

    /// Convenience constructor for [`Error::TransientFetch`].
    pub fn transient(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Error::TransientFetch {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Convenience constructor for [`Error::UpstreamRejection`].
    pub fn rejected(url: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Error::UpstreamRejection {
            url: url.into(),
            status,
            message: message.into(),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
