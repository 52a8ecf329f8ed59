//! Backend that discards every primitive

use super::registry::HandleRegistry;
use crate::backend::Backend;
use crate::error::RegionResult;
use crate::handles::{Domain, EventHandle, Id, PtRegionHandle, StringHandle};

/// Backend used when instrumentation is disabled
///
/// Handles are still minted so region construction behaves the same;
/// begin and end primitives do nothing.
#[derive(Debug)]
pub struct NullBackend {
    registry: HandleRegistry,
}

impl NullBackend {
    /// Create a null backend
    pub fn new(default_domain: &str) -> Self {
        Self {
            registry: HandleRegistry::new(default_domain),
        }
    }
}

impl Default for NullBackend {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_DOMAIN)
    }
}

impl Backend for NullBackend {
    fn is_enabled(&self) -> bool {
        false
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
        _domain: &Domain,
        _name: &StringHandle,
        _id: &Id,
        _parent: Option<&Id>,
    ) -> RegionResult<()> {
        Ok(())
    }

    fn task_end(&self, _domain: &Domain) -> RegionResult<()> {
        Ok(())
    }

    fn task_begin_overlapped(
        &self,
        _domain: &Domain,
        _name: &StringHandle,
        _id: &Id,
        _parent: Option<&Id>,
    ) -> RegionResult<()> {
        Ok(())
    }

    fn task_end_overlapped(&self, _domain: &Domain, _id: &Id) -> RegionResult<()> {
        Ok(())
    }

    fn create_event(&self, name: &str) -> RegionResult<EventHandle> {
        Ok(self.registry.event(name))
    }

    fn event_begin(&self, _event: &EventHandle) -> RegionResult<()> {
        Ok(())
    }

    fn event_end(&self, _event: &EventHandle) -> RegionResult<()> {
        Ok(())
    }

    fn pause(&self) -> RegionResult<()> {
        Ok(())
    }

    fn resume(&self) -> RegionResult<()> {
        Ok(())
    }

    fn detach(&self) -> RegionResult<()> {
        Ok(())
    }

    fn thread_set_name(&self, _name: &str) -> RegionResult<()> {
        Ok(())
    }

    fn create_pt_region(&self, name: &str) -> RegionResult<PtRegionHandle> {
        Ok(self.registry.pt_region(name))
    }

    fn pt_region_begin(&self, _region: &PtRegionHandle) -> RegionResult<()> {
        Ok(())
    }

    fn pt_region_end(&self, _region: &PtRegionHandle) -> RegionResult<()> {
        Ok(())
    }
}
