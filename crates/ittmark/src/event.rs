//! Event regions

use core::fmt;
use std::sync::{Arc, OnceLock};

use crate::error::{RegionError, RegionResult};
use crate::handles::{EventHandle, StringHandle};
use crate::manager::Instrumentation;
use crate::naming::{DisplayName, Identity, NameKind, Naming};
use crate::options::RegionOptions;
use crate::region::Region;

struct EventCore {
    instr: Instrumentation,
    naming: Naming,
    handle: OnceLock<EventHandle>,
}

impl EventCore {
    fn create_handle(&self, name: &StringHandle) -> RegionResult<()> {
        if self.handle.get().is_none() {
            let handle = self.instr.create_event(name.as_str())?;
            // finalization runs under the naming lock, so only one caller gets here
            if self.handle.set(handle).is_err() {
                tracing::debug!(name = %name, "event handle already created");
            }
        }
        Ok(())
    }

    fn handle(&self) -> RegionResult<&EventHandle> {
        self.handle.get().ok_or(RegionError::UnnamedRegion)
    }
}

/// Named region backed by a backend event
///
/// The backend event is created once, from the final name. Clones share
/// the event.
///
/// ```rust
/// use std::sync::Arc;
/// use ittmark::{Instrumentation, Region, platform::MemoryBackend};
///
/// let instr = Instrumentation::with_backend(Arc::new(MemoryBackend::new()));
/// let event = instr.event("upload")?;
/// let bytes = event.scope(|| 512)?;
/// assert_eq!(bytes, 512);
/// # Ok::<(), ittmark::RegionError>(())
/// ```
#[derive(Clone)]
pub struct Event {
    core: Arc<EventCore>,
}

impl Event {
    /// Create an event region
    ///
    /// # Errors
    ///
    /// Returns naming errors, or the backend error of `create_event` when
    /// the name is already final.
    pub fn new(instr: &Instrumentation, mut options: RegionOptions) -> RegionResult<Self> {
        let core = Arc::new(EventCore {
            instr: instr.clone(),
            naming: Naming::new(instr, options.take_source())?,
            handle: OnceLock::new(),
        });
        core.naming
            .finalize_if_determined(|name| core.create_handle(name))?;
        Ok(Self { core })
    }

    /// Current region name, `None` while unresolved
    pub fn name(&self) -> Option<StringHandle> {
        self.core.naming.name()
    }

    /// Where the current name came from
    pub fn name_kind(&self) -> NameKind {
        self.core.naming.kind()
    }

    /// Backend event, once the name is final
    pub fn handle(&self) -> Option<&EventHandle> {
        self.core.handle.get()
    }
}

impl Region for Event {
    fn begin(&self) -> RegionResult<()> {
        let core = &self.core;
        core.naming.begin_with(
            |name| core.create_handle(name),
            |_| core.instr.event_begin(core.handle()?),
        )
    }

    fn end(&self) -> RegionResult<()> {
        self.core.instr.event_end(self.core.handle()?)
    }

    fn on_wrap(&self, identity: &Identity) -> RegionResult<()> {
        let core = &self.core;
        core.naming
            .on_wrap(&core.instr, identity, |name| core.create_handle(name))
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{ event name: '{}' }}", DisplayName(self.name()))
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("name", &self.name().map(|n| n.as_str().to_owned()))
            .field("created", &self.core.handle.get().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callsite::CallSite;
    use crate::platform::{BackendCall, MemoryBackend};

    fn setup() -> (Arc<MemoryBackend>, Instrumentation) {
        let backend = Arc::new(MemoryBackend::new());
        let instr = Instrumentation::with_backend(backend.clone());
        (backend, instr)
    }

    fn created_events(backend: &MemoryBackend) -> Vec<String> {
        backend
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                BackendCall::CreateEvent { name } => Some(name),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_custom_name_creates_event_immediately() -> RegionResult<()> {
        let (backend, instr) = setup();
        let event = Event::new(&instr, RegionOptions::from("upload"))?;
        assert!(event.handle().is_some());
        assert_eq!(created_events(&backend), vec!["upload"]);
        Ok(())
    }

    #[test]
    fn test_call_site_event_is_created_on_first_begin() -> RegionResult<()> {
        let (backend, instr) = setup();
        let event = Event::new(&instr, RegionOptions::from(CallSite::new("app.rs", 7)))?;
        assert!(event.handle().is_none());

        event.scope(|| ())?;
        event.scope(|| ())?;
        assert_eq!(created_events(&backend), vec!["app.rs:7"]);
        assert_eq!(
            backend.boundaries(),
            vec![
                BackendCall::EventBegin { name: "app.rs:7".into() },
                BackendCall::EventEnd { name: "app.rs:7".into() },
                BackendCall::EventBegin { name: "app.rs:7".into() },
                BackendCall::EventEnd { name: "app.rs:7".into() },
            ]
        );
        Ok(())
    }

    #[test]
    fn test_failed_creation_is_retried_on_next_begin() -> RegionResult<()> {
        let (backend, instr) = setup();
        let event = Event::new(&instr, RegionOptions::from(CallSite::new("app.rs", 7)))?;

        backend.fail_on("create_event");
        assert!(matches!(event.begin(), Err(_)));
        assert!(event.handle().is_none());

        backend.heal();
        event.scope(|| ())?;
        assert_eq!(created_events(&backend), vec!["app.rs:7"]);
        Ok(())
    }

    #[test]
    fn test_display() -> RegionResult<()> {
        let (_backend, instr) = setup();
        let event = Event::new(&instr, RegionOptions::from("upload"))?;
        assert_eq!(event.to_string(), "{ event name: 'upload' }");
        Ok(())
    }
}
