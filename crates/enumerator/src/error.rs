//! Discovery error types

use identity::BackendError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a whole discovery pass
///
/// Everything that only affects one group, instance or node is logged and
/// skipped instead; see the walker and resolver.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The namespace root could not be opened
    #[error("Cannot open {}: {source}", path.display())]
    RootUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The group name pattern failed to compile
    #[error("Invalid group pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Enumeration failed inside a backend library
    #[error("USB backend error: {0}")]
    Backend(String),
}

impl DiscoveryError {
    /// Status code reported to callers of the backend interface
    pub fn backend_code(&self) -> BackendError {
        match self {
            DiscoveryError::RootUnreadable { .. } => BackendError::Access,
            DiscoveryError::Pattern { .. } => BackendError::NoMem,
            DiscoveryError::Backend(_) => BackendError::Io,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_unreadable_display() {
        let err = DiscoveryError::RootUnreadable {
            path: PathBuf::from("/dev/usb"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert!(err.to_string().starts_with("Cannot open /dev/usb"));
        assert_eq!(err.backend_code(), BackendError::Access);
    }

    #[test]
    fn test_pattern_maps_to_no_mem() {
        let source = regex::Regex::new("(").unwrap_err();
        let err = DiscoveryError::Pattern {
            pattern: "(".to_string(),
            source,
        };
        assert_eq!(err.backend_code(), BackendError::NoMem);
    }
}
