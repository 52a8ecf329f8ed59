//! Processor-trace regions

use core::fmt;
use std::sync::{Arc, OnceLock};

use crate::error::{RegionError, RegionResult};
use crate::handles::{PtRegionHandle, StringHandle};
use crate::manager::Instrumentation;
use crate::naming::{DisplayName, Identity, NameKind, Naming};
use crate::options::RegionOptions;
use crate::region::Region;

struct PtCore {
    instr: Instrumentation,
    naming: Naming,
    handle: OnceLock<PtRegionHandle>,
}

impl PtCore {
    fn create_handle(&self, name: &StringHandle) -> RegionResult<()> {
        if self.handle.get().is_none() {
            let handle = self.instr.create_pt_region(name.as_str())?;
            if self.handle.set(handle).is_err() {
                tracing::debug!(name = %name, "pt region handle already created");
            }
        }
        Ok(())
    }

    fn handle(&self) -> RegionResult<&PtRegionHandle> {
        self.handle.get().ok_or(RegionError::UnnamedRegion)
    }
}

/// Named region marking code for processor-trace collection
#[derive(Clone)]
pub struct PtRegion {
    core: Arc<PtCore>,
}

impl PtRegion {
    /// Create a processor-trace region
    ///
    /// # Errors
    ///
    /// Returns naming errors, or the backend error of `create_pt_region`
    /// when the name is already final.
    pub fn new(instr: &Instrumentation, mut options: RegionOptions) -> RegionResult<Self> {
        let core = Arc::new(PtCore {
            instr: instr.clone(),
            naming: Naming::new(instr, options.take_source())?,
            handle: OnceLock::new(),
        });
        core.naming
            .finalize_if_determined(|name| core.create_handle(name))?;
        Ok(Self { core })
    }

    /// Current region name
    pub fn name(&self) -> Option<StringHandle> {
        self.core.naming.name()
    }

    /// Where the current name came from
    pub fn name_kind(&self) -> NameKind {
        self.core.naming.kind()
    }

    /// Backend region handle, once the name is final
    pub fn handle(&self) -> Option<&PtRegionHandle> {
        self.core.handle.get()
    }
}

impl Region for PtRegion {
    fn begin(&self) -> RegionResult<()> {
        let core = &self.core;
        core.naming.begin_with(
            |name| core.create_handle(name),
            |_| core.instr.pt_region_begin(core.handle()?),
        )
    }

    fn end(&self) -> RegionResult<()> {
        self.core.instr.pt_region_end(self.core.handle()?)
    }

    fn on_wrap(&self, identity: &Identity) -> RegionResult<()> {
        let core = &self.core;
        core.naming
            .on_wrap(&core.instr, identity, |name| core.create_handle(name))
    }
}

impl fmt::Display for PtRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{ region name: '{}' }}", DisplayName(self.name()))
    }
}

impl fmt::Debug for PtRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PtRegion")
            .field(&self.name().map(|n| n.as_str().to_owned()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{BackendCall, MemoryBackend};

    #[test]
    fn test_pt_region_forwards_to_backend() -> RegionResult<()> {
        let backend = Arc::new(MemoryBackend::new());
        let instr = Instrumentation::with_backend(backend.clone());

        let region = PtRegion::new(&instr, RegionOptions::from("hot_loop"))?;
        assert_eq!(region.to_string(), "{ region name: 'hot_loop' }");
        region.scope(|| ())?;

        let calls: Vec<_> = backend
            .calls()
            .into_iter()
            .filter(|call| !matches!(call, BackendCall::CreateStringHandle { .. }))
            .collect();
        assert_eq!(
            calls,
            vec![
                BackendCall::CreatePtRegion {
                    name: "hot_loop".into()
                },
                BackendCall::PtRegionBegin {
                    name: "hot_loop".into()
                },
                BackendCall::PtRegionEnd {
                    name: "hot_loop".into()
                },
            ]
        );
        Ok(())
    }

    #[test]
    fn test_wrapped_function_names_region() -> RegionResult<()> {
        fn kernel() -> u32 {
            3
        }

        let instr = Instrumentation::with_backend(Arc::new(MemoryBackend::new()));
        let region = PtRegion::new(&instr, RegionOptions::new())?;
        let traced = region.wrap(kernel)?;
        assert_eq!(traced.call(())?, 3);
        assert_eq!(region.name_kind(), NameKind::Callable);
        assert!(region.to_string().contains("kernel"));
        Ok(())
    }
}
