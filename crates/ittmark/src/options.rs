//! Region construction options

use core::fmt;

use crate::callsite::CallSite;
use crate::collection::Activator;
use crate::handles::{Domain, Id};
use crate::naming::{Identity, Source};
use crate::task::{NestedTask, OverlappedTask, Task};

/// Domain selection for a task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainArg {
    /// Create or look up a domain by name
    Name(String),
    /// Use an existing domain handle
    Handle(Domain),
}

impl From<&str> for DomainArg {
    fn from(name: &str) -> Self {
        DomainArg::Name(name.to_owned())
    }
}

impl From<String> for DomainArg {
    fn from(name: String) -> Self {
        DomainArg::Name(name)
    }
}

impl From<Domain> for DomainArg {
    fn from(domain: Domain) -> Self {
        DomainArg::Handle(domain)
    }
}

impl From<&Domain> for DomainArg {
    fn from(domain: &Domain) -> Self {
        DomainArg::Handle(domain.clone())
    }
}

/// Anything that can stand for a parent task
pub trait IntoParent {
    /// The parent's task id
    fn into_parent(self) -> Id;
}

impl IntoParent for Id {
    fn into_parent(self) -> Id {
        self
    }
}

impl IntoParent for &Id {
    fn into_parent(self) -> Id {
        *self
    }
}

impl IntoParent for &NestedTask {
    fn into_parent(self) -> Id {
        self.id()
    }
}

impl IntoParent for &OverlappedTask {
    fn into_parent(self) -> Id {
        self.id()
    }
}

impl IntoParent for &Task {
    fn into_parent(self) -> Id {
        self.id()
    }
}

/// Options accepted by every region factory
///
/// Converts from a name (`&str`, `String`), a [`CallSite`], an
/// [`Identity`] or an [`Activator`], so the common cases need no builder:
///
/// ```rust
/// use std::sync::Arc;
/// use ittmark::{Instrumentation, RegionOptions, platform::MemoryBackend};
///
/// let instr = Instrumentation::with_backend(Arc::new(MemoryBackend::new()));
/// let parent = instr.nested_task("frame")?;
/// let child = instr.overlapped_task(
///     RegionOptions::new().name("decode").domain("media").parent(&parent),
/// )?;
/// assert_eq!(child.parent_id(), Some(parent.id()));
/// # Ok::<(), ittmark::RegionError>(())
/// ```
#[derive(Clone, Default)]
pub struct RegionOptions {
    pub(crate) source: Option<Source>,
    pub(crate) domain: Option<DomainArg>,
    pub(crate) id: Option<Id>,
    pub(crate) parent: Option<Id>,
    pub(crate) activator: Option<Activator>,
    pub(crate) overlapped: bool,
}

impl RegionOptions {
    /// Empty options; the factory captures its call site as the name
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom name
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.source = Some(Source::Custom(name.into()));
        self
    }

    /// Use an explicit call site as the provisional name
    #[must_use]
    pub fn call_site(mut self, site: CallSite) -> Self {
        self.source = Some(Source::CallSite(site));
        self
    }

    /// Name the region after a callable identity
    #[must_use]
    pub fn identity(mut self, identity: Identity) -> Self {
        self.source = Some(Source::Callable(identity));
        self
    }

    /// Set the name source directly
    #[must_use]
    pub fn source(mut self, source: impl Into<Source>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Select the task domain
    #[must_use]
    pub fn domain(mut self, domain: impl Into<DomainArg>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Use a caller supplied task id
    #[must_use]
    pub fn id(mut self, id: Id) -> Self {
        self.id = Some(id);
        self
    }

    /// Set the parent task
    #[must_use]
    pub fn parent(mut self, parent: impl IntoParent) -> Self {
        self.parent = Some(parent.into_parent());
        self
    }

    /// Gate a collection region behind an activator
    #[must_use]
    pub fn activator(mut self, activator: impl Into<Activator>) -> Self {
        self.activator = Some(activator.into());
        self
    }

    /// Make the generic task factory produce an overlapped task
    #[must_use]
    pub fn overlapped(mut self, overlapped: bool) -> Self {
        self.overlapped = overlapped;
        self
    }

    /// Fill in `site` when no name source was given
    pub(crate) fn or_call_site(mut self, site: CallSite) -> Self {
        if self.source.is_none() {
            self.source = Some(Source::CallSite(site));
        }
        self
    }

    /// Fill in `identity` when no name source was given
    pub(crate) fn or_identity(mut self, identity: &Identity) -> Self {
        if self.source.is_none() {
            self.source = Some(Source::Callable(identity.clone()));
        }
        self
    }

    pub(crate) fn take_source(&mut self) -> Source {
        self.source.take().unwrap_or_default()
    }
}

impl fmt::Debug for RegionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegionOptions")
            .field("source", &self.source)
            .field("domain", &self.domain)
            .field("id", &self.id)
            .field("parent", &self.parent)
            .field("activator", &self.activator.is_some())
            .field("overlapped", &self.overlapped)
            .finish()
    }
}

impl From<&str> for RegionOptions {
    fn from(name: &str) -> Self {
        Self::new().name(name)
    }
}

impl From<String> for RegionOptions {
    fn from(name: String) -> Self {
        Self::new().name(name)
    }
}

impl From<CallSite> for RegionOptions {
    fn from(site: CallSite) -> Self {
        Self::new().call_site(site)
    }
}

impl From<Identity> for RegionOptions {
    fn from(identity: Identity) -> Self {
        Self::new().identity(identity)
    }
}

impl From<Activator> for RegionOptions {
    fn from(activator: Activator) -> Self {
        Self::new().activator(activator)
    }
}
