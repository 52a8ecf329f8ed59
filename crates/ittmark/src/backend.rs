//! Backend trait definition

use std::sync::Arc;

use crate::config::{BackendKind, MarkupConfig};
use crate::error::RegionResult;
use crate::handles::{Domain, EventHandle, Id, PtRegionHandle, StringHandle};

/// The primitive surface a profiling backend exposes
///
/// Every region in this crate is expressed in terms of these primitives.
/// Failures are returned as [`RegionError::Backend`](crate::RegionError::Backend) and are
/// passed through the markup layer untouched.
///
/// # Nesting
///
/// [`task_end`](Backend::task_end) closes the innermost open nested task of
/// the calling thread on the given domain. Overlapped tasks are closed by
/// id and may end in any order.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; regions call into the backend
/// from whichever thread runs them.
pub trait Backend: Send + Sync {
    /// Prepare the backend for use
    ///
    /// Called once by [`Instrumentation::initialize`](crate::Instrumentation::initialize).
    /// May perform I/O.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be initialized.
    fn initialize(&self) -> RegionResult<()> {
        Ok(())
    }

    /// Check if the backend records anything
    fn is_enabled(&self) -> bool {
        true
    }

    /// Flush and release backend resources
    fn shutdown(&self) {}

    /// Create or look up a domain; `None` asks for the default domain
    fn create_domain(&self, name: Option<&str>) -> RegionResult<Domain>;

    /// Mint a fresh task id in `domain`
    fn create_id(&self, domain: &Domain) -> RegionResult<Id>;

    /// Intern a region name
    fn create_string_handle(&self, text: &str) -> RegionResult<StringHandle>;

    /// Open a nested task
    fn task_begin(
        &self,
        domain: &Domain,
        name: &StringHandle,
        id: &Id,
        parent: Option<&Id>,
    ) -> RegionResult<()>;

    /// Close the innermost nested task on `domain`
    fn task_end(&self, domain: &Domain) -> RegionResult<()>;

    /// Open an overlapped task
    fn task_begin_overlapped(
        &self,
        domain: &Domain,
        name: &StringHandle,
        id: &Id,
        parent: Option<&Id>,
    ) -> RegionResult<()>;

    /// Close the overlapped task `id`
    fn task_end_overlapped(&self, domain: &Domain, id: &Id) -> RegionResult<()>;

    /// Create an event handle
    fn create_event(&self, name: &str) -> RegionResult<EventHandle>;

    /// Begin an event occurrence
    fn event_begin(&self, event: &EventHandle) -> RegionResult<()>;

    /// End an event occurrence
    fn event_end(&self, event: &EventHandle) -> RegionResult<()>;

    /// Pause data collection
    fn pause(&self) -> RegionResult<()>;

    /// Resume data collection
    fn resume(&self) -> RegionResult<()>;

    /// Detach the collector
    fn detach(&self) -> RegionResult<()>;

    /// Name the calling thread
    fn thread_set_name(&self, name: &str) -> RegionResult<()>;

    /// Create a processor-trace region handle
    fn create_pt_region(&self, name: &str) -> RegionResult<PtRegionHandle>;

    /// Begin a processor-trace region
    fn pt_region_begin(&self, region: &PtRegionHandle) -> RegionResult<()>;

    /// End a processor-trace region
    fn pt_region_end(&self, region: &PtRegionHandle) -> RegionResult<()>;
}

/// Create the backend selected by `config`
///
/// A disabled configuration always yields a [`NullBackend`](crate::platform::NullBackend).
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the selected
/// backend does not exist on this platform.
pub fn create_backend(config: &MarkupConfig) -> RegionResult<Arc<dyn Backend>> {
    config.validate()?;

    if !config.enabled {
        return Ok(Arc::new(crate::platform::NullBackend::new(
            &config.default_domain,
        )));
    }

    match config.backend {
        BackendKind::Platform => create_platform_backend(config),
        BackendKind::Log => Ok(Arc::new(crate::platform::LogBackend::new(
            &config.default_domain,
        ))),
        BackendKind::TraceMarker => trace_marker_backend(config),
        BackendKind::Memory => Ok(Arc::new(crate::platform::MemoryBackend::with_default_domain(
            &config.default_domain,
        ))),
        BackendKind::Null => Ok(Arc::new(crate::platform::NullBackend::new(
            &config.default_domain,
        ))),
    }
}

/// Create the native backend for the current platform
///
/// Returns the appropriate backend for the current platform:
/// - Linux: `TraceMarkerBackend`
/// - Other: `LogBackend`
///
/// # Errors
///
/// Returns an error if the platform backend cannot be created.
pub fn create_platform_backend(config: &MarkupConfig) -> RegionResult<Arc<dyn Backend>> {
    #[cfg(target_os = "linux")]
    {
        trace_marker_backend(config)
    }

    #[cfg(not(target_os = "linux"))]
    {
        Ok(Arc::new(crate::platform::LogBackend::new(
            &config.default_domain,
        )))
    }
}

#[cfg(target_os = "linux")]
fn trace_marker_backend(config: &MarkupConfig) -> RegionResult<Arc<dyn Backend>> {
    Ok(Arc::new(crate::platform::TraceMarkerBackend::new(
        &config.trace_marker_path,
        &config.default_domain,
    )))
}

#[cfg(not(target_os = "linux"))]
fn trace_marker_backend(_config: &MarkupConfig) -> RegionResult<Arc<dyn Backend>> {
    Err(crate::error::RegionError::PlatformNotSupported(
        "trace_marker",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RegionError;

    #[test]
    fn test_create_platform_backend() {
        let result = create_platform_backend(&MarkupConfig::default());
        assert!(matches!(result, Ok(_)));
    }

    #[test]
    fn test_disabled_config_yields_null_backend() -> RegionResult<()> {
        let config = MarkupConfig::builder()
            .enabled(false)
            .backend(BackendKind::Memory)
            .build()?;
        let backend = create_backend(&config)?;
        assert!(!backend.is_enabled());
        Ok(())
    }

    #[test]
    fn test_memory_backend_uses_configured_domain() -> RegionResult<()> {
        let config = MarkupConfig::builder()
            .backend(BackendKind::Memory)
            .default_domain("render")
            .build()?;
        let backend = create_backend(&config)?;
        assert_eq!(backend.create_domain(None)?.name(), "render");
        Ok(())
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = MarkupConfig {
            default_domain: String::new(),
            ..MarkupConfig::default()
        };
        assert!(matches!(
            create_backend(&config),
            Err(RegionError::InvalidConfiguration(_))
        ));
    }
}
