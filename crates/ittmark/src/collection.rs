//! Collection control regions
//!
//! [`ActiveRegion`] resumes collection on begin and pauses it on end;
//! [`PausedRegion`] does the opposite. Either may be gated by an
//! [`Activator`] evaluated once per `begin()`: when it returns false the
//! region does nothing for that entry, and the matching `end()` does
//! nothing either. Decisions are kept per entry and per thread, so one
//! region may be re-entered or shared between threads.

use core::fmt;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, ThreadId};

use parking_lot::Mutex;

use crate::error::RegionResult;
use crate::manager::Instrumentation;
use crate::options::RegionOptions;
use crate::region::Region;

/// Predicate deciding whether a collection region takes effect
#[derive(Clone)]
pub struct Activator(Arc<dyn Fn() -> bool + Send + Sync>);

impl Activator {
    /// Wrap a predicate
    pub fn new(predicate: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(predicate))
    }

    /// Evaluate the predicate
    pub fn is_active(&self) -> bool {
        (self.0)()
    }
}

impl fmt::Debug for Activator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Activator").finish_non_exhaustive()
    }
}

impl<F> From<F> for Activator
where
    F: Fn() -> bool + Send + Sync + 'static,
{
    fn from(predicate: F) -> Self {
        Self::new(predicate)
    }
}

/// Shared on/off switch usable as an [`Activator`]
///
/// [`ManualActivator::new`] starts active; use
/// [`ManualActivator::with_state`] to choose the initial state.
#[derive(Debug, Clone)]
pub struct ManualActivator {
    active: Arc<AtomicBool>,
}

impl Default for ManualActivator {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualActivator {
    /// Create an active switch
    pub fn new() -> Self {
        Self::with_state(true)
    }

    /// Create a switch starting in the given state
    pub fn with_state(active: bool) -> Self {
        Self {
            active: Arc::new(AtomicBool::new(active)),
        }
    }

    /// Create an inactive switch
    pub fn inactive() -> Self {
        Self::with_state(false)
    }

    /// Let regions take effect
    pub fn activate(&self) {
        self.active.store(true, Ordering::Release);
    }

    /// Make regions do nothing
    pub fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }

    /// Current state
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

impl From<ManualActivator> for Activator {
    fn from(switch: ManualActivator) -> Self {
        Activator::new(move || switch.is_active())
    }
}

impl From<&ManualActivator> for Activator {
    fn from(switch: &ManualActivator) -> Self {
        switch.clone().into()
    }
}

/// Decisions recorded by `begin()`, innermost last, per entering thread
type EntryStacks = HashMap<ThreadId, Vec<bool>>;

#[derive(Debug)]
struct CollectionCore {
    instr: Instrumentation,
    activator: Option<Activator>,
    entries: Mutex<EntryStacks>,
}

impl CollectionCore {
    fn new(instr: &Instrumentation, options: RegionOptions) -> Self {
        Self {
            instr: instr.clone(),
            activator: options.activator,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn begin(&self, hook: impl FnOnce(&Instrumentation) -> RegionResult<()>) -> RegionResult<()> {
        let active = self.activator.as_ref().is_none_or(Activator::is_active);
        if active {
            hook(&self.instr)?;
        }
        self.entries
            .lock()
            .entry(thread::current().id())
            .or_default()
            .push(active);
        Ok(())
    }

    fn end(&self, hook: impl FnOnce(&Instrumentation) -> RegionResult<()>) -> RegionResult<()> {
        let active = {
            let mut entries = self.entries.lock();
            let current = thread::current().id();
            let active = entries.get_mut(&current).and_then(Vec::pop);
            if entries.get(&current).is_some_and(Vec::is_empty) {
                entries.remove(&current);
            }
            active
        };
        if active == Some(true) {
            hook(&self.instr)?;
        }
        Ok(())
    }

    #[cfg(test)]
    fn open_entries(&self) -> usize {
        self.entries.lock().values().map(Vec::len).sum()
    }
}

/// Region with collection resumed inside
#[derive(Debug, Clone)]
pub struct ActiveRegion {
    core: Arc<CollectionCore>,
}

impl ActiveRegion {
    /// Create an active region; only the options' activator is used
    pub fn new(instr: &Instrumentation, options: RegionOptions) -> Self {
        Self {
            core: Arc::new(CollectionCore::new(instr, options)),
        }
    }

    /// Check if a gating activator was supplied
    pub fn has_activator(&self) -> bool {
        self.core.activator.is_some()
    }
}

impl Region for ActiveRegion {
    fn begin(&self) -> RegionResult<()> {
        self.core.begin(Instrumentation::resume)
    }

    fn end(&self) -> RegionResult<()> {
        self.core.end(Instrumentation::pause)
    }
}

/// Region with collection paused inside
#[derive(Debug, Clone)]
pub struct PausedRegion {
    core: Arc<CollectionCore>,
}

impl PausedRegion {
    /// Create a paused region; only the options' activator is used
    pub fn new(instr: &Instrumentation, options: RegionOptions) -> Self {
        Self {
            core: Arc::new(CollectionCore::new(instr, options)),
        }
    }

    /// Check if a gating activator was supplied
    pub fn has_activator(&self) -> bool {
        self.core.activator.is_some()
    }
}

impl Region for PausedRegion {
    fn begin(&self) -> RegionResult<()> {
        self.core.begin(Instrumentation::pause)
    }

    fn end(&self) -> RegionResult<()> {
        self.core.end(Instrumentation::resume)
    }
}
