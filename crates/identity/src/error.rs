//! Identity and backend error types

use thiserror::Error;

/// Reasons a candidate node does not become a [`crate::DeviceIdentity`]
///
/// None of these abort a discovery pass; the candidate is discarded and the
/// walk moves on.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// Node path is not absolute
    #[error("Invalid node path: {path:?}")]
    InvalidNodePath { path: String },

    /// Property-query session could not be opened on the node
    #[error("Cannot open device node {path}: {source}")]
    NodeUnavailable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A required integer property was not found with exactly one value
    #[error("Required property \"{property}\" missing on {path}")]
    MissingProperty { property: &'static str, path: String },

    /// Node path has no `@` to take the device address from
    #[error("No unit address in device node path {path}")]
    NoUnitAddress { path: String },

    /// Value does not fit the identity field it feeds
    #[error("{field} value {value} out of range {min}..={max}")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },
}

/// Backend operation errors
///
/// Mirrors the status codes a backend hands back for handle, descriptor and
/// transfer operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BackendError {
    /// Device is not present (or the backend cannot reach it)
    #[error("No such device")]
    NoDevice,
    /// Operation not supported by this backend
    #[error("Operation not supported")]
    NotSupported,
    /// Invalid parameter
    #[error("Invalid parameter")]
    InvalidParam,
    /// Access denied (permissions)
    #[error("Access denied")]
    Access,
    /// Out of memory / resource exhaustion
    #[error("Insufficient memory")]
    NoMem,
    /// I/O error
    #[error("Input/output error")]
    Io,
}
