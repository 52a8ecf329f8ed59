//! Structured logging backend

use super::registry::HandleRegistry;
use crate::backend::Backend;
use crate::error::RegionResult;
use crate::handles::{Domain, EventHandle, Id, PtRegionHandle, StringHandle};

/// Backend that turns every primitive into a `tracing` event
///
/// Region boundaries are logged at `TRACE` under the `ittmark` target,
/// collection control at `DEBUG`. Install any `tracing` subscriber to see
/// them. Used on platforms without a native backend.
pub struct LogBackend {
    registry: HandleRegistry,
}

impl Default for LogBackend {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_DOMAIN)
    }
}

impl LogBackend {
    /// Create a new logging backend
    pub fn new(default_domain: &str) -> Self {
        Self {
            registry: HandleRegistry::new(default_domain),
        }
    }
}

impl Backend for LogBackend {
    fn initialize(&self) -> RegionResult<()> {
        tracing::info!("Using log markup backend (structured logging only)");
        Ok(())
    }

    fn create_domain(&self, name: Option<&str>) -> RegionResult<Domain> {
        Ok(self.registry.domain(name))
    }

    fn create_id(&self, _domain: &Domain) -> RegionResult<Id> {
        Ok(self.registry.id())
    }

    fn create_string_handle(&self, text: &str) -> RegionResult<StringHandle> {
        Ok(self.registry.string(text))
    }

    fn task_begin(
        &self,
        domain: &Domain,
        name: &StringHandle,
        id: &Id,
        parent: Option<&Id>,
    ) -> RegionResult<()> {
        tracing::trace!(
            target: "ittmark",
            domain = %domain,
            name = %name,
            id = %id,
            parent = ?parent.map(ToString::to_string),
            "task begin"
        );
        Ok(())
    }

    fn task_end(&self, domain: &Domain) -> RegionResult<()> {
        tracing::trace!(target: "ittmark", domain = %domain, "task end");
        Ok(())
    }

    fn task_begin_overlapped(
        &self,
        domain: &Domain,
        name: &StringHandle,
        id: &Id,
        parent: Option<&Id>,
    ) -> RegionResult<()> {
        tracing::trace!(
            target: "ittmark",
            domain = %domain,
            name = %name,
            id = %id,
            parent = ?parent.map(ToString::to_string),
            "overlapped task begin"
        );
        Ok(())
    }

    fn task_end_overlapped(&self, domain: &Domain, id: &Id) -> RegionResult<()> {
        tracing::trace!(target: "ittmark", domain = %domain, id = %id, "overlapped task end");
        Ok(())
    }

    fn create_event(&self, name: &str) -> RegionResult<EventHandle> {
        Ok(self.registry.event(name))
    }

    fn event_begin(&self, event: &EventHandle) -> RegionResult<()> {
        tracing::trace!(target: "ittmark", event = event.name(), "event begin");
        Ok(())
    }

    fn event_end(&self, event: &EventHandle) -> RegionResult<()> {
        tracing::trace!(target: "ittmark", event = event.name(), "event end");
        Ok(())
    }

    fn pause(&self) -> RegionResult<()> {
        tracing::debug!(target: "ittmark", "collection paused");
        Ok(())
    }

    fn resume(&self) -> RegionResult<()> {
        tracing::debug!(target: "ittmark", "collection resumed");
        Ok(())
    }

    fn detach(&self) -> RegionResult<()> {
        tracing::debug!(target: "ittmark", "collector detached");
        Ok(())
    }

    fn thread_set_name(&self, name: &str) -> RegionResult<()> {
        tracing::debug!(target: "ittmark", thread = name, "thread named");
        Ok(())
    }

    fn create_pt_region(&self, name: &str) -> RegionResult<PtRegionHandle> {
        Ok(self.registry.pt_region(name))
    }

    fn pt_region_begin(&self, region: &PtRegionHandle) -> RegionResult<()> {
        tracing::trace!(target: "ittmark", region = region.name(), "pt region begin");
        Ok(())
    }

    fn pt_region_end(&self, region: &PtRegionHandle) -> RegionResult<()> {
        tracing::trace!(target: "ittmark", region = region.name(), "pt region end");
        Ok(())
    }

    fn shutdown(&self) {
        tracing::info!("Log markup backend shutdown");
    }
}

impl core::fmt::Debug for LogBackend {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LogBackend")
            .field("default_domain", &self.registry.default_domain())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_backend_initialization() -> RegionResult<()> {
        let backend = LogBackend::default();
        backend.initialize()?;
        assert!(backend.is_enabled());
        Ok(())
    }

    #[test]
    fn test_log_backend_task_roundtrip() -> RegionResult<()> {
        let _guard = tracing::subscriber::set_default(
            tracing_subscriber::fmt()
                .with_max_level(tracing::Level::TRACE)
                .with_test_writer()
                .finish(),
        );

        let backend = LogBackend::new("render");
        let domain = backend.create_domain(None)?;
        assert_eq!(domain.name(), "render");

        let name = backend.create_string_handle("frame")?;
        let id = backend.create_id(&domain)?;
        backend.task_begin(&domain, &name, &id, None)?;
        backend.task_end(&domain)?;

        let event = backend.create_event("vsync")?;
        backend.event_begin(&event)?;
        backend.event_end(&event)?;

        backend.pause()?;
        backend.resume()?;
        Ok(())
    }
}
