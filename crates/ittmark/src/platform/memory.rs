//! In-process recording backend

use std::collections::{HashMap, HashSet};
use std::thread::ThreadId;

use parking_lot::Mutex;

use super::registry::HandleRegistry;
use crate::backend::Backend;
use crate::config::DEFAULT_DOMAIN;
use crate::error::{RegionError, RegionResult};
use crate::handles::{Domain, EventHandle, Id, PtRegionHandle, StringHandle};

/// One primitive call observed by [`MemoryBackend`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    /// `create_domain`
    CreateDomain {
        /// Name passed by the caller
        requested: Option<String>,
        /// Name of the resulting domain
        name: String,
    },
    /// `create_id`
    CreateId {
        /// Domain name
        domain: String,
        /// Minted id
        id: Id,
    },
    /// `create_string_handle`
    CreateStringHandle {
        /// Interned text
        text: String,
    },
    /// `task_begin`
    TaskBegin {
        /// Domain name
        domain: String,
        /// Task name
        name: String,
        /// Task id
        id: Id,
        /// Parent id
        parent: Option<Id>,
    },
    /// `task_end`, with the task it closed if one was open
    TaskEnd {
        /// Domain name
        domain: String,
        /// Name of the closed task
        name: Option<String>,
        /// Id of the closed task
        id: Option<Id>,
    },
    /// `task_begin_overlapped`
    TaskBeginOverlapped {
        /// Domain name
        domain: String,
        /// Task name
        name: String,
        /// Task id
        id: Id,
        /// Parent id
        parent: Option<Id>,
    },
    /// `task_end_overlapped`
    TaskEndOverlapped {
        /// Domain name
        domain: String,
        /// Name of the closed task, if it was open
        name: Option<String>,
        /// Task id
        id: Id,
    },
    /// `create_event`
    CreateEvent {
        /// Event name
        name: String,
    },
    /// `event_begin`
    EventBegin {
        /// Event name
        name: String,
    },
    /// `event_end`
    EventEnd {
        /// Event name
        name: String,
    },
    /// `pause`
    Pause,
    /// `resume`
    Resume,
    /// `detach`
    Detach,
    /// `thread_set_name`
    ThreadSetName {
        /// Thread name
        name: String,
    },
    /// `create_pt_region`
    CreatePtRegion {
        /// Region name
        name: String,
    },
    /// `pt_region_begin`
    PtRegionBegin {
        /// Region name
        name: String,
    },
    /// `pt_region_end`
    PtRegionEnd {
        /// Region name
        name: String,
    },
}

impl BackendCall {
    /// Check if this call begins or ends a region
    pub fn is_region_boundary(&self) -> bool {
        matches!(
            self,
            BackendCall::TaskBegin { .. }
                | BackendCall::TaskEnd { .. }
                | BackendCall::TaskBeginOverlapped { .. }
                | BackendCall::TaskEndOverlapped { .. }
                | BackendCall::EventBegin { .. }
                | BackendCall::EventEnd { .. }
                | BackendCall::PtRegionBegin { .. }
                | BackendCall::PtRegionEnd { .. }
        )
    }

    /// Check if this call creates a handle
    pub fn is_creation(&self) -> bool {
        matches!(
            self,
            BackendCall::CreateDomain { .. }
                | BackendCall::CreateId { .. }
                | BackendCall::CreateStringHandle { .. }
                | BackendCall::CreateEvent { .. }
                | BackendCall::CreatePtRegion { .. }
        )
    }
}

#[derive(Debug, Default)]
struct Recorder {
    calls: Vec<BackendCall>,
    nested: HashMap<(ThreadId, u64), Vec<(String, Id)>>,
    overlapped: HashMap<(u64, Id), String>,
    failing: HashSet<&'static str>,
}

/// Backend that records every primitive call in memory
///
/// Nested tasks are tracked per thread and per domain, so each recorded
/// [`BackendCall::TaskEnd`] names the task it closed. Failures can be
/// injected per primitive with [`MemoryBackend::fail_on`]; a failing
/// primitive records nothing.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use ittmark::{Instrumentation, Region};
/// use ittmark::platform::{BackendCall, MemoryBackend};
///
/// let backend = Arc::new(MemoryBackend::new());
/// let instr = Instrumentation::with_backend(backend.clone());
///
/// let task = instr.nested_task("load")?;
/// task.scope(|| ())?;
///
/// assert!(backend.calls().contains(&BackendCall::TaskEnd {
///     domain: "ittmark".into(),
///     name: Some("load".into()),
///     id: Some(task.id()),
/// }));
/// # Ok::<(), ittmark::RegionError>(())
/// ```
pub struct MemoryBackend {
    registry: HandleRegistry,
    recorder: Mutex<Recorder>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Create a recorder using the default domain name
    pub fn new() -> Self {
        Self::with_default_domain(DEFAULT_DOMAIN)
    }

    /// Create a recorder with a custom default domain name
    pub fn with_default_domain(default_domain: &str) -> Self {
        Self {
            registry: HandleRegistry::new(default_domain),
            recorder: Mutex::new(Recorder::default()),
        }
    }

    /// Every call recorded so far, in order
    pub fn calls(&self) -> Vec<BackendCall> {
        self.recorder.lock().calls.clone()
    }

    /// Recorded region begin and end calls only
    pub fn boundaries(&self) -> Vec<BackendCall> {
        self.recorder
            .lock()
            .calls
            .iter()
            .filter(|call| call.is_region_boundary())
            .cloned()
            .collect()
    }

    /// Forget recorded calls; open tasks stay open
    pub fn clear(&self) {
        self.recorder.lock().calls.clear();
    }

    /// Make `primitive` fail until [`MemoryBackend::heal`] is called
    pub fn fail_on(&self, primitive: &'static str) {
        self.recorder.lock().failing.insert(primitive);
    }

    /// Stop injecting failures
    pub fn heal(&self) {
        self.recorder.lock().failing.clear();
    }

    /// Number of nested tasks open on the calling thread in `domain`
    pub fn open_tasks(&self, domain: &Domain) -> usize {
        let key = (std::thread::current().id(), domain.token());
        self.recorder.lock().nested.get(&key).map_or(0, Vec::len)
    }

    fn record(
        &self,
        primitive: &'static str,
        apply: impl FnOnce(&mut Recorder) -> BackendCall,
    ) -> RegionResult<()> {
        let mut recorder = self.recorder.lock();
        if recorder.failing.contains(primitive) {
            return Err(RegionError::backend(primitive, "injected failure"));
        }
        let call = apply(&mut recorder);
        recorder.calls.push(call);
        Ok(())
    }
}

impl Backend for MemoryBackend {
    fn create_domain(&self, name: Option<&str>) -> RegionResult<Domain> {
        let domain = self.registry.domain(name);
        self.record("create_domain", |_| BackendCall::CreateDomain {
            requested: name.map(str::to_owned),
            name: domain.name().to_owned(),
        })?;
        Ok(domain)
    }

    fn create_id(&self, domain: &Domain) -> RegionResult<Id> {
        let id = self.registry.id();
        self.record("create_id", |_| BackendCall::CreateId {
            domain: domain.name().to_owned(),
            id,
        })?;
        Ok(id)
    }

    fn create_string_handle(&self, text: &str) -> RegionResult<StringHandle> {
        self.record("create_string_handle", |_| BackendCall::CreateStringHandle {
            text: text.to_owned(),
        })?;
        Ok(self.registry.string(text))
    }

    fn task_begin(
        &self,
        domain: &Domain,
        name: &StringHandle,
        id: &Id,
        parent: Option<&Id>,
    ) -> RegionResult<()> {
        let key = (std::thread::current().id(), domain.token());
        self.record("task_begin", |rec| {
            rec.nested
                .entry(key)
                .or_default()
                .push((name.as_str().to_owned(), *id));
            BackendCall::TaskBegin {
                domain: domain.name().to_owned(),
                name: name.as_str().to_owned(),
                id: *id,
                parent: parent.copied(),
            }
        })
    }

    fn task_end(&self, domain: &Domain) -> RegionResult<()> {
        let key = (std::thread::current().id(), domain.token());
        self.record("task_end", |rec| {
            let closed = rec.nested.get_mut(&key).and_then(Vec::pop);
            let (name, id) = closed.map_or((None, None), |(name, id)| (Some(name), Some(id)));
            BackendCall::TaskEnd {
                domain: domain.name().to_owned(),
                name,
                id,
            }
        })
    }

    fn task_begin_overlapped(
        &self,
        domain: &Domain,
        name: &StringHandle,
        id: &Id,
        parent: Option<&Id>,
    ) -> RegionResult<()> {
        self.record("task_begin_overlapped", |rec| {
            rec.overlapped
                .insert((domain.token(), *id), name.as_str().to_owned());
            BackendCall::TaskBeginOverlapped {
                domain: domain.name().to_owned(),
                name: name.as_str().to_owned(),
                id: *id,
                parent: parent.copied(),
            }
        })
    }

    fn task_end_overlapped(&self, domain: &Domain, id: &Id) -> RegionResult<()> {
        self.record("task_end_overlapped", |rec| BackendCall::TaskEndOverlapped {
            domain: domain.name().to_owned(),
            name: rec.overlapped.remove(&(domain.token(), *id)),
            id: *id,
        })
    }

    fn create_event(&self, name: &str) -> RegionResult<EventHandle> {
        self.record("create_event", |_| BackendCall::CreateEvent {
            name: name.to_owned(),
        })?;
        Ok(self.registry.event(name))
    }

    fn event_begin(&self, event: &EventHandle) -> RegionResult<()> {
        self.record("event_begin", |_| BackendCall::EventBegin {
            name: event.name().to_owned(),
        })
    }

    fn event_end(&self, event: &EventHandle) -> RegionResult<()> {
        self.record("event_end", |_| BackendCall::EventEnd {
            name: event.name().to_owned(),
        })
    }

    fn pause(&self) -> RegionResult<()> {
        self.record("pause", |_| BackendCall::Pause)
    }

    fn resume(&self) -> RegionResult<()> {
        self.record("resume", |_| BackendCall::Resume)
    }

    fn detach(&self) -> RegionResult<()> {
        self.record("detach", |_| BackendCall::Detach)
    }

    fn thread_set_name(&self, name: &str) -> RegionResult<()> {
        self.record("thread_set_name", |_| BackendCall::ThreadSetName {
            name: name.to_owned(),
        })
    }

    fn create_pt_region(&self, name: &str) -> RegionResult<PtRegionHandle> {
        self.record("create_pt_region", |_| BackendCall::CreatePtRegion {
            name: name.to_owned(),
        })?;
        Ok(self.registry.pt_region(name))
    }

    fn pt_region_begin(&self, region: &PtRegionHandle) -> RegionResult<()> {
        self.record("pt_region_begin", |_| BackendCall::PtRegionBegin {
            name: region.name().to_owned(),
        })
    }

    fn pt_region_end(&self, region: &PtRegionHandle) -> RegionResult<()> {
        self.record("pt_region_end", |_| BackendCall::PtRegionEnd {
            name: region.name().to_owned(),
        })
    }
}

impl core::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("registry", &self.registry)
            .field("calls", &self.recorder.lock().calls.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_end_closes_innermost_task() -> RegionResult<()> {
        let backend = MemoryBackend::new();
        let domain = backend.create_domain(None)?;
        let outer = backend.create_string_handle("outer")?;
        let inner = backend.create_string_handle("inner")?;

        backend.task_begin(&domain, &outer, &Id::new(1, 0), None)?;
        backend.task_begin(&domain, &inner, &Id::new(2, 0), Some(&Id::new(1, 0)))?;
        assert_eq!(backend.open_tasks(&domain), 2);
        backend.task_end(&domain)?;
        backend.task_end(&domain)?;

        let ends: Vec<_> = backend
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                BackendCall::TaskEnd { name, .. } => name,
                _ => None,
            })
            .collect();
        assert_eq!(ends, vec!["inner", "outer"]);
        assert_eq!(backend.open_tasks(&domain), 0);
        Ok(())
    }

    #[test]
    fn test_nesting_is_per_domain() -> RegionResult<()> {
        let backend = MemoryBackend::new();
        let a = backend.create_domain(Some("a"))?;
        let b = backend.create_domain(Some("b"))?;
        let name = backend.create_string_handle("work")?;

        backend.task_begin(&a, &name, &Id::new(1, 0), None)?;
        assert_eq!(backend.open_tasks(&a), 1);
        assert_eq!(backend.open_tasks(&b), 0);
        Ok(())
    }

    #[test]
    fn test_overlapped_end_reports_closed_task() -> RegionResult<()> {
        let backend = MemoryBackend::new();
        let domain = backend.create_domain(None)?;
        let name = backend.create_string_handle("io")?;
        let id = backend.create_id(&domain)?;

        backend.task_begin_overlapped(&domain, &name, &id, None)?;
        backend.task_end_overlapped(&domain, &id)?;

        assert_eq!(
            backend.boundaries().last(),
            Some(&BackendCall::TaskEndOverlapped {
                domain: "ittmark".into(),
                name: Some("io".into()),
                id,
            })
        );
        Ok(())
    }

    #[test]
    fn test_injected_failure_records_nothing() -> RegionResult<()> {
        let backend = MemoryBackend::new();
        backend.fail_on("pause");

        let err = backend.pause();
        assert!(matches!(
            err,
            Err(RegionError::Backend {
                primitive: "pause",
                ..
            })
        ));
        assert!(backend.calls().is_empty());

        backend.heal();
        backend.pause()?;
        assert_eq!(backend.calls(), vec![BackendCall::Pause]);
        Ok(())
    }

    #[test]
    fn test_unnamed_domain_uses_default_name() -> RegionResult<()> {
        let backend = MemoryBackend::with_default_domain("physics");
        let domain = backend.create_domain(None)?;
        assert_eq!(domain.name(), "physics");
        assert_eq!(
            backend.calls(),
            vec![BackendCall::CreateDomain {
                requested: None,
                name: "physics".into(),
            }]
        );
        Ok(())
    }
}
