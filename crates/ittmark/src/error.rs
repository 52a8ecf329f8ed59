//! Region markup error types

use core::fmt;

/// Errors raised by region markup and by backends
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegionError {
    /// A transform was applied to something that cannot be called
    #[error("Callable object is expected as a first argument.")]
    NotCallable,

    /// No region name could be derived from the given source
    #[error("Cannot get the name for the code region.")]
    UnnamedRegion,

    /// An anonymous region was applied to a second callable
    #[error(
        "A custom name for a code region must be specified before \
         _NamedRegion.__call__() can be called more than once."
    )]
    AnonymousRewrap,

    /// A backend primitive failed
    #[error("Backend primitive `{primitive}` failed: {reason}")]
    Backend {
        /// Name of the failing primitive
        primitive: &'static str,
        /// Backend supplied reason
        reason: String,
    },

    /// Invalid configuration
    #[error("Invalid instrumentation configuration: {0}")]
    InvalidConfiguration(String),

    /// The requested backend is not available on this platform
    #[error("Backend not supported on this platform: {0}")]
    PlatformNotSupported(&'static str),

    /// The global instrumentation was already installed
    #[error("Global instrumentation is already installed")]
    AlreadyInstalled,
}

/// Result alias used throughout the crate
pub type RegionResult<T> = Result<T, RegionError>;

impl RegionError {
    /// Check if this error signals caller misuse of the region contract
    pub fn is_misuse(&self) -> bool {
        matches!(
            self,
            RegionError::NotCallable | RegionError::UnnamedRegion | RegionError::AnonymousRewrap
        )
    }

    /// Check if this error originated in a backend primitive
    pub fn is_backend(&self) -> bool {
        matches!(self, RegionError::Backend { .. })
    }

    /// Create a backend error with context
    pub fn backend(primitive: &'static str, reason: impl fmt::Display) -> Self {
        RegionError::Backend {
            primitive,
            reason: reason.to_string(),
        }
    }

    /// Create a configuration error with context
    pub fn invalid_configuration(context: impl fmt::Display) -> Self {
        RegionError::InvalidConfiguration(context.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_is_misuse() {
        assert!(RegionError::NotCallable.is_misuse());
        assert!(RegionError::UnnamedRegion.is_misuse());
        assert!(RegionError::AnonymousRewrap.is_misuse());
        assert!(!RegionError::backend("task_end", "closed").is_misuse());
        assert!(!RegionError::AlreadyInstalled.is_misuse());
    }

    #[test]
    fn test_error_constructors() {
        let e = RegionError::backend("pause", "collector gone");
        assert!(e.is_backend());
        assert!(matches!(
            e,
            RegionError::Backend {
                primitive: "pause",
                ..
            }
        ));

        let e = RegionError::invalid_configuration("empty domain");
        assert!(matches!(e, RegionError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_anonymous_rewrap_message() {
        assert_eq!(
            RegionError::AnonymousRewrap.to_string(),
            "A custom name for a code region must be specified before \
             _NamedRegion.__call__() can be called more than once."
        );
    }

    #[test]
    fn test_error_display() {
        let s = RegionError::backend("event_begin", "bad handle").to_string();
        assert!(s.contains("event_begin"));
        assert!(s.contains("bad handle"));
    }
}
