//! Process-wide instrumentation and free-function factories
//!
//! The global [`Instrumentation`] is either installed explicitly with
//! [`install`] or built on first use from the `ITTMARK_*` environment
//! variables. A configuration that cannot be honoured falls back to the
//! null backend with a warning rather than failing the caller.

use std::sync::OnceLock;

use crate::collection::{ActiveRegion, PausedRegion};
use crate::error::{RegionError, RegionResult};
use crate::event::Event;
use crate::handles::{Domain, EventHandle, Id, StringHandle};
use crate::manager::Instrumentation;
use crate::options::RegionOptions;
use crate::platform::NullBackend;
use crate::pt_region::PtRegion;
use crate::region::Traced;
use crate::task::{NestedTask, OverlappedTask, Task};

static GLOBAL: OnceLock<Instrumentation> = OnceLock::new();

/// Install `instr` as the process-wide instrumentation
///
/// # Errors
///
/// Returns [`RegionError::AlreadyInstalled`] if a global instance exists,
/// including one built lazily by an earlier free-function call.
pub fn install(instr: Instrumentation) -> RegionResult<()> {
    GLOBAL
        .set(instr)
        .map_err(|_rejected| RegionError::AlreadyInstalled)
}

/// The process-wide instrumentation
pub fn global() -> &'static Instrumentation {
    GLOBAL.get_or_init(|| match Instrumentation::from_env() {
        Ok(instr) => {
            if let Err(e) = instr.initialize() {
                tracing::warn!(error = %e, "global instrumentation failed to initialize");
            }
            instr
        }
        Err(e) => {
            tracing::warn!(error = %e, "invalid ITTMARK_* configuration, markup disabled");
            Instrumentation::with_backend(std::sync::Arc::new(NullBackend::default()))
        }
    })
}

/// Create or look up a domain on the global instrumentation
///
/// # Errors
///
/// Returns the backend error unchanged.
pub fn domain(name: Option<&str>) -> RegionResult<Domain> {
    global().domain(name)
}

/// Mint a task id on the global instrumentation
///
/// # Errors
///
/// Returns the backend error unchanged.
pub fn id(domain: &Domain) -> RegionResult<Id> {
    global().id(domain)
}

/// Intern a string on the global instrumentation
///
/// # Errors
///
/// Returns the backend error unchanged.
pub fn string_handle(text: &str) -> RegionResult<StringHandle> {
    global().string_handle(text)
}

/// Pause data collection
///
/// # Errors
///
/// Returns the backend error unchanged.
pub fn pause() -> RegionResult<()> {
    global().pause()
}

/// Resume data collection
///
/// # Errors
///
/// Returns the backend error unchanged.
pub fn resume() -> RegionResult<()> {
    global().resume()
}

/// Detach the collector
///
/// # Errors
///
/// Returns the backend error unchanged.
pub fn detach() -> RegionResult<()> {
    global().detach()
}

/// Name the calling thread
///
/// # Errors
///
/// Returns the backend error unchanged.
pub fn thread_set_name(name: &str) -> RegionResult<()> {
    global().thread_set_name(name)
}

/// Begin a nested task on the calling thread
///
/// # Errors
///
/// Returns the backend error unchanged.
pub fn task_begin(
    domain: &Domain,
    name: &StringHandle,
    id: &Id,
    parent: Option<&Id>,
) -> RegionResult<()> {
    global().task_begin(domain, name, id, parent)
}

/// Begin a nested task named `name`, returning its minted id
///
/// # Errors
///
/// Returns the backend error unchanged.
pub fn task_begin_named(domain: &Domain, name: &str) -> RegionResult<Id> {
    global().task_begin_named(domain, name)
}

/// End the innermost nested task of `domain`
///
/// # Errors
///
/// Returns the backend error unchanged.
pub fn task_end(domain: &Domain) -> RegionResult<()> {
    global().task_end(domain)
}

/// Begin an overlapped task
///
/// # Errors
///
/// Returns the backend error unchanged.
pub fn task_begin_overlapped(
    domain: &Domain,
    name: &StringHandle,
    id: &Id,
    parent: Option<&Id>,
) -> RegionResult<()> {
    global().task_begin_overlapped(domain, name, id, parent)
}

/// End the overlapped task `id`
///
/// # Errors
///
/// Returns the backend error unchanged.
pub fn task_end_overlapped(domain: &Domain, id: &Id) -> RegionResult<()> {
    global().task_end_overlapped(domain, id)
}

/// Create an event handle
///
/// # Errors
///
/// Returns the backend error unchanged.
pub fn create_event(name: &str) -> RegionResult<EventHandle> {
    global().create_event(name)
}

/// Begin an event
///
/// # Errors
///
/// Returns the backend error unchanged.
pub fn event_begin(event: &EventHandle) -> RegionResult<()> {
    global().event_begin(event)
}

/// End an event
///
/// # Errors
///
/// Returns the backend error unchanged.
pub fn event_end(event: &EventHandle) -> RegionResult<()> {
    global().event_end(event)
}

/// See [`Instrumentation::task`]
///
/// # Errors
///
/// Returns naming errors and backend errors unchanged.
#[track_caller]
pub fn task(options: impl Into<RegionOptions>) -> RegionResult<Task> {
    global().task(options)
}

/// See [`Instrumentation::nested_task`]
///
/// # Errors
///
/// Returns naming errors and backend errors unchanged.
#[track_caller]
pub fn nested_task(options: impl Into<RegionOptions>) -> RegionResult<NestedTask> {
    global().nested_task(options)
}

/// See [`Instrumentation::overlapped_task`]
///
/// # Errors
///
/// Returns naming errors and backend errors unchanged.
#[track_caller]
pub fn overlapped_task(options: impl Into<RegionOptions>) -> RegionResult<OverlappedTask> {
    global().overlapped_task(options)
}

/// See [`Instrumentation::event`]
///
/// # Errors
///
/// Returns naming errors and backend errors unchanged.
#[track_caller]
pub fn event(options: impl Into<RegionOptions>) -> RegionResult<Event> {
    global().event(options)
}

/// See [`Instrumentation::pt_region`]
///
/// # Errors
///
/// Returns naming errors and backend errors unchanged.
#[track_caller]
pub fn pt_region(options: impl Into<RegionOptions>) -> RegionResult<PtRegion> {
    global().pt_region(options)
}

/// See [`Instrumentation::active_region`]
pub fn active_region(options: impl Into<RegionOptions>) -> ActiveRegion {
    global().active_region(options)
}

/// See [`Instrumentation::paused_region`]
pub fn paused_region(options: impl Into<RegionOptions>) -> PausedRegion {
    global().paused_region(options)
}

/// See [`Instrumentation::task_for`]
///
/// # Errors
///
/// Returns naming errors and backend errors unchanged.
pub fn task_for<F>(f: F, options: impl Into<RegionOptions>) -> RegionResult<Traced<Task, F>> {
    global().task_for(f, options)
}

/// See [`Instrumentation::nested_task_for`]
///
/// # Errors
///
/// Returns naming errors and backend errors unchanged.
pub fn nested_task_for<F>(
    f: F,
    options: impl Into<RegionOptions>,
) -> RegionResult<Traced<NestedTask, F>> {
    global().nested_task_for(f, options)
}

/// See [`Instrumentation::overlapped_task_for`]
///
/// # Errors
///
/// Returns naming errors and backend errors unchanged.
pub fn overlapped_task_for<F>(
    f: F,
    options: impl Into<RegionOptions>,
) -> RegionResult<Traced<OverlappedTask, F>> {
    global().overlapped_task_for(f, options)
}

/// See [`Instrumentation::event_for`]
///
/// # Errors
///
/// Returns naming errors and backend errors unchanged.
pub fn event_for<F>(f: F, options: impl Into<RegionOptions>) -> RegionResult<Traced<Event, F>> {
    global().event_for(f, options)
}

/// See [`Instrumentation::pt_region_for`]
///
/// # Errors
///
/// Returns naming errors and backend errors unchanged.
pub fn pt_region_for<F>(
    f: F,
    options: impl Into<RegionOptions>,
) -> RegionResult<Traced<PtRegion, F>> {
    global().pt_region_for(f, options)
}

/// See [`Instrumentation::active_region_for`]
pub fn active_region_for<F>(f: F, options: impl Into<RegionOptions>) -> Traced<ActiveRegion, F> {
    global().active_region_for(f, options)
}

/// See [`Instrumentation::paused_region_for`]
pub fn paused_region_for<F>(f: F, options: impl Into<RegionOptions>) -> Traced<PausedRegion, F> {
    global().paused_region_for(f, options)
}
