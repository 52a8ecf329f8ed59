//! Task regions
//!
//! A task is a named unit of work on a domain, with an id assigned once at
//! construction and an optional parent id. Nested tasks must end in LIFO
//! order per thread and domain; overlapped tasks are ended by id and may
//! interleave freely.

use core::fmt;
use std::sync::Arc;

use crate::error::RegionResult;
use crate::handles::{Domain, Id, StringHandle};
use crate::manager::Instrumentation;
use crate::naming::{DisplayName, Identity, NameKind, Naming};
use crate::options::{DomainArg, RegionOptions};
use crate::region::Region;

struct TaskCore {
    instr: Instrumentation,
    naming: Naming,
    domain: Domain,
    id: Id,
    parent: Option<Id>,
}

impl TaskCore {
    fn new(instr: &Instrumentation, mut options: RegionOptions) -> RegionResult<Self> {
        let naming = Naming::new(instr, options.take_source())?;
        let domain = match options.domain {
            None => instr.domain(None)?,
            Some(DomainArg::Name(name)) => instr.domain(Some(&name))?,
            Some(DomainArg::Handle(domain)) => domain,
        };
        let id = match options.id {
            Some(id) => id,
            None => instr.id(&domain)?,
        };
        naming.finalize_if_determined(|_| Ok(()))?;

        Ok(Self {
            instr: instr.clone(),
            naming,
            domain,
            id,
            parent: options.parent,
        })
    }

    fn begin_with(
        &self,
        begin: impl FnOnce(&Domain, &StringHandle, &Id, Option<&Id>) -> RegionResult<()>,
    ) -> RegionResult<()> {
        self.naming.begin_with(
            |_| Ok(()),
            |name| begin(&self.domain, name, &self.id, self.parent.as_ref()),
        )
    }

    fn on_wrap(&self, identity: &Identity) -> RegionResult<()> {
        self.naming.on_wrap(&self.instr, identity, |_| Ok(()))
    }

    fn fmt_display(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{ name: '{}', domain: '{}', id: {}, parent_id: {} }}",
            DisplayName(self.naming.name()),
            self.domain,
            self.id,
            DisplayId(self.parent)
        )
    }

    fn fmt_debug(&self, kind: &str, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(kind)
            .field("name", &self.naming.name().map(|n| n.as_str().to_owned()))
            .field("domain", &self.domain.name())
            .field("id", &self.id)
            .field("parent_id", &self.parent)
            .finish()
    }
}

struct DisplayId(Option<Id>);

impl fmt::Display for DisplayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(id) => write!(f, "{id}"),
            None => f.write_str("None"),
        }
    }
}

macro_rules! task_accessors {
    () => {
        /// Current region name, `None` while unresolved
        pub fn name(&self) -> Option<StringHandle> {
            self.core.naming.name()
        }

        /// Where the current name came from
        pub fn name_kind(&self) -> NameKind {
            self.core.naming.kind()
        }

        /// Task domain
        pub fn domain(&self) -> &Domain {
            &self.core.domain
        }

        /// Task id, fixed at construction
        pub fn id(&self) -> Id {
            self.core.id
        }

        /// Parent task id
        pub fn parent_id(&self) -> Option<Id> {
            self.core.parent
        }
    };
}

/// Task that nests strictly inside other nested tasks of its domain
///
/// Clones share state: they are the same task.
#[derive(Clone)]
pub struct NestedTask {
    core: Arc<TaskCore>,
}

impl NestedTask {
    /// Create a nested task
    ///
    /// No call site is captured here; use the factories on
    /// [`Instrumentation`] for call-site names.
    ///
    /// # Errors
    ///
    /// Returns naming errors and backend handle creation errors.
    pub fn new(instr: &Instrumentation, options: RegionOptions) -> RegionResult<Self> {
        Ok(Self {
            core: Arc::new(TaskCore::new(instr, options)?),
        })
    }

    task_accessors!();
}

impl Region for NestedTask {
    fn begin(&self) -> RegionResult<()> {
        let instr = &self.core.instr;
        self.core
            .begin_with(|domain, name, id, parent| instr.task_begin(domain, name, id, parent))
    }

    fn end(&self) -> RegionResult<()> {
        self.core.instr.task_end(&self.core.domain)
    }

    fn on_wrap(&self, identity: &Identity) -> RegionResult<()> {
        self.core.on_wrap(identity)
    }
}

impl fmt::Display for NestedTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.core.fmt_display(f)
    }
}

impl fmt::Debug for NestedTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.core.fmt_debug("NestedTask", f)
    }
}

/// Task whose lifetime may overlap other tasks arbitrarily
#[derive(Clone)]
pub struct OverlappedTask {
    core: Arc<TaskCore>,
}

impl OverlappedTask {
    /// Create an overlapped task
    ///
    /// # Errors
    ///
    /// Returns naming errors and backend handle creation errors.
    pub fn new(instr: &Instrumentation, options: RegionOptions) -> RegionResult<Self> {
        Ok(Self {
            core: Arc::new(TaskCore::new(instr, options)?),
        })
    }

    task_accessors!();
}

impl Region for OverlappedTask {
    fn begin(&self) -> RegionResult<()> {
        let instr = &self.core.instr;
        self.core.begin_with(|domain, name, id, parent| {
            instr.task_begin_overlapped(domain, name, id, parent)
        })
    }

    fn end(&self) -> RegionResult<()> {
        self.core
            .instr
            .task_end_overlapped(&self.core.domain, &self.core.id)
    }

    fn on_wrap(&self, identity: &Identity) -> RegionResult<()> {
        self.core.on_wrap(identity)
    }
}

impl fmt::Display for OverlappedTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.core.fmt_display(f)
    }
}

impl fmt::Debug for OverlappedTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.core.fmt_debug("OverlappedTask", f)
    }
}

/// Either kind of task, as returned by the generic task factory
#[derive(Debug, Clone)]
pub enum Task {
    /// Nested task
    Nested(NestedTask),
    /// Overlapped task
    Overlapped(OverlappedTask),
}

impl Task {
    /// Create a nested or overlapped task depending on the options
    ///
    /// # Errors
    ///
    /// Returns naming errors and backend handle creation errors.
    pub fn new(instr: &Instrumentation, options: RegionOptions) -> RegionResult<Self> {
        if options.overlapped {
            OverlappedTask::new(instr, options).map(Task::Overlapped)
        } else {
            NestedTask::new(instr, options).map(Task::Nested)
        }
    }

    fn core(&self) -> &TaskCore {
        match self {
            Task::Nested(task) => &task.core,
            Task::Overlapped(task) => &task.core,
        }
    }

    /// Check if this is an overlapped task
    pub fn is_overlapped(&self) -> bool {
        matches!(self, Task::Overlapped(_))
    }

    /// Current region name
    pub fn name(&self) -> Option<StringHandle> {
        self.core().naming.name()
    }

    /// Where the current name came from
    pub fn name_kind(&self) -> NameKind {
        self.core().naming.kind()
    }

    /// Task domain
    pub fn domain(&self) -> &Domain {
        &self.core().domain
    }

    /// Task id
    pub fn id(&self) -> Id {
        self.core().id
    }

    /// Parent task id
    pub fn parent_id(&self) -> Option<Id> {
        self.core().parent
    }
}

impl Region for Task {
    fn begin(&self) -> RegionResult<()> {
        match self {
            Task::Nested(task) => task.begin(),
            Task::Overlapped(task) => task.begin(),
        }
    }

    fn end(&self) -> RegionResult<()> {
        match self {
            Task::Nested(task) => task.end(),
            Task::Overlapped(task) => task.end(),
        }
    }

    fn on_wrap(&self, identity: &Identity) -> RegionResult<()> {
        self.core().on_wrap(identity)
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.core().fmt_display(f)
    }
}

impl From<NestedTask> for Task {
    fn from(task: NestedTask) -> Self {
        Task::Nested(task)
    }
}

impl From<OverlappedTask> for Task {
    fn from(task: OverlappedTask) -> Self {
        Task::Overlapped(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{BackendCall, MemoryBackend};

    fn setup() -> (Arc<MemoryBackend>, Instrumentation) {
        let backend = Arc::new(MemoryBackend::new());
        let instr = Instrumentation::with_backend(backend.clone());
        (backend, instr)
    }

    #[test]
    fn test_nested_task_uses_default_domain_and_fresh_id() -> RegionResult<()> {
        let (backend, instr) = setup();
        let task = NestedTask::new(&instr, RegionOptions::from("load"))?;
        assert_eq!(task.domain().name(), "ittmark");
        assert_eq!(task.id(), Id::new(1, 0));
        assert_eq!(task.parent_id(), None);
        assert_eq!(task.name_kind(), NameKind::Custom);

        task.scope(|| ())?;
        assert_eq!(
            backend.boundaries(),
            vec![
                BackendCall::TaskBegin {
                    domain: "ittmark".into(),
                    name: "load".into(),
                    id: Id::new(1, 0),
                    parent: None,
                },
                BackendCall::TaskEnd {
                    domain: "ittmark".into(),
                    name: Some("load".into()),
                    id: Some(Id::new(1, 0)),
                },
            ]
        );
        Ok(())
    }

    #[test]
    fn test_supplied_id_and_domain_are_used_verbatim() -> RegionResult<()> {
        let (backend, instr) = setup();
        let domain = instr.domain(Some("media"))?;
        let task = OverlappedTask::new(
            &instr,
            RegionOptions::from("decode")
                .domain(&domain)
                .id(Id::new(9, 9))
                .parent(Id::new(3, 0)),
        )?;
        assert_eq!(task.domain(), &domain);
        assert_eq!(task.id(), Id::new(9, 9));
        assert_eq!(task.parent_id(), Some(Id::new(3, 0)));
        assert!(
            !backend
                .calls()
                .iter()
                .any(|call| matches!(call, BackendCall::CreateId { .. }))
        );
        Ok(())
    }

    #[test]
    fn test_id_is_stable_across_entries() -> RegionResult<()> {
        let (_backend, instr) = setup();
        let task = NestedTask::new(&instr, RegionOptions::from("loop"))?;
        let id = task.id();
        task.scope(|| ())?;
        task.scope(|| ())?;
        assert_eq!(task.id(), id);
        Ok(())
    }

    #[test]
    fn test_generic_task_picks_variant() -> RegionResult<()> {
        let (_backend, instr) = setup();
        let nested = Task::new(&instr, RegionOptions::from("a"))?;
        let overlapped = Task::new(&instr, RegionOptions::from("b").overlapped(true))?;
        assert!(!nested.is_overlapped());
        assert!(overlapped.is_overlapped());
        Ok(())
    }

    #[test]
    fn test_display_format() -> RegionResult<()> {
        let (_backend, instr) = setup();
        let parent = NestedTask::new(&instr, RegionOptions::from("outer"))?;
        let child = NestedTask::new(
            &instr,
            RegionOptions::from("inner")
                .domain("render")
                .parent(&parent),
        )?;
        assert_eq!(
            child.to_string(),
            "{ name: 'inner', domain: 'render', id: (2, 0), parent_id: (1, 0) }"
        );

        let unnamed = NestedTask::new(&instr, RegionOptions::new())?;
        assert!(unnamed.to_string().starts_with("{ name: 'None',"));
        Ok(())
    }

    #[test]
    fn test_begin_failure_propagates_unchanged() -> RegionResult<()> {
        let (backend, instr) = setup();
        let task = NestedTask::new(&instr, RegionOptions::from("x"))?;
        backend.fail_on("task_begin");
        let err = task.begin();
        assert!(matches!(
            err,
            Err(crate::RegionError::Backend {
                primitive: "task_begin",
                ..
            })
        ));
        Ok(())
    }
}
