//! Instrumentation facade coordinating regions and their backend

use std::sync::Arc;

use crate::backend::{Backend, create_backend};
use crate::callsite::CallSite;
use crate::collection::{ActiveRegion, PausedRegion};
use crate::config::MarkupConfig;
use crate::error::RegionResult;
use crate::event::Event;
use crate::handles::{Domain, EventHandle, Id, PtRegionHandle, StringHandle};
use crate::metrics::{AtomicMetrics, Counter, MarkupMetrics};
use crate::naming::Identity;
use crate::options::RegionOptions;
use crate::pt_region::PtRegion;
use crate::region::Traced;
use crate::task::{NestedTask, OverlappedTask, Task};

struct Shared {
    backend: Arc<dyn Backend>,
    config: MarkupConfig,
    metrics: AtomicMetrics,
}

/// Entry point for region markup
///
/// Holds the backend, the configuration and the metrics. Cloning is cheap
/// and clones share everything; every region keeps a clone.
///
/// Factories capture the caller's location: a region created without a
/// name is named `"{file}:{line}"` after the line calling the factory,
/// until a callable wrapped by it supplies a better one.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use ittmark::{Instrumentation, Region, RegionOptions, platform::MemoryBackend};
///
/// let instr = Instrumentation::with_backend(Arc::new(MemoryBackend::new()));
/// instr.initialize()?;
///
/// let frame = instr.nested_task("frame")?;
/// frame.scope(|| {
///     // work
/// })?;
///
/// let parse = instr.event(RegionOptions::new())?.wrap(|s: &str| s.len())?;
/// assert_eq!(parse.call(("abc",))?, 3);
///
/// assert!(instr.metrics().is_balanced());
/// # Ok::<(), ittmark::RegionError>(())
/// ```
#[derive(Clone)]
pub struct Instrumentation {
    shared: Arc<Shared>,
}

impl Instrumentation {
    /// Create an instrumentation with the default configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the platform backend cannot be created.
    pub fn new() -> RegionResult<Self> {
        Self::from_config(MarkupConfig::default())
    }

    /// Create an instrumentation from a configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or its backend is
    /// unavailable.
    pub fn from_config(config: MarkupConfig) -> RegionResult<Self> {
        let backend = create_backend(&config)?;
        Ok(Self::build(backend, config))
    }

    /// Create an instrumentation configured from `ITTMARK_*` variables
    ///
    /// # Errors
    ///
    /// See [`MarkupConfig::from_env`] and [`Instrumentation::from_config`].
    pub fn from_env() -> RegionResult<Self> {
        Self::from_config(MarkupConfig::from_env()?)
    }

    /// Create an instrumentation around a custom backend
    ///
    /// Use this for testing or custom backends.
    pub fn with_backend(backend: Arc<dyn Backend>) -> Self {
        Self::build(backend, MarkupConfig::default())
    }

    fn build(backend: Arc<dyn Backend>, config: MarkupConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                backend,
                config,
                metrics: AtomicMetrics::default(),
            }),
        }
    }

    /// Initialize the backend
    ///
    /// # Errors
    ///
    /// Returns an error if initialization fails.
    pub fn initialize(&self) -> RegionResult<()> {
        self.shared.backend.initialize()
    }

    /// Check if the backend records anything
    pub fn is_enabled(&self) -> bool {
        self.shared.config.enabled && self.shared.backend.is_enabled()
    }

    /// Active configuration
    pub fn config(&self) -> &MarkupConfig {
        &self.shared.config
    }

    /// The backend receiving primitives
    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.shared.backend
    }

    /// Snapshot of the markup counters
    pub fn metrics(&self) -> MarkupMetrics {
        self.shared.metrics.snapshot()
    }

    /// Reset the markup counters
    pub fn reset_metrics(&self) {
        self.shared.metrics.reset();
    }

    /// Shut the backend down
    pub fn shutdown(&self) {
        self.shared.backend.shutdown();
    }

    #[inline]
    fn observe<T>(
        &self,
        primitive: &'static str,
        counter: Option<Counter>,
        result: RegionResult<T>,
    ) -> RegionResult<T> {
        match &result {
            Ok(_) => {
                if let Some(counter) = counter {
                    self.shared.metrics.record(counter);
                }
            }
            Err(e) => {
                self.shared.metrics.record(Counter::BackendError);
                tracing::debug!(primitive, error = %e, "backend primitive failed");
            }
        }
        result
    }

    /// Create or look up a domain; `None` yields the backend's default
    ///
    /// # Errors
    ///
    /// Returns the backend error unchanged.
    pub fn domain(&self, name: Option<&str>) -> RegionResult<Domain> {
        self.observe(
            "create_domain",
            None,
            self.shared.backend.create_domain(name),
        )
    }

    /// Mint a task id in `domain`
    ///
    /// # Errors
    ///
    /// Returns the backend error unchanged.
    pub fn id(&self, domain: &Domain) -> RegionResult<Id> {
        self.observe("create_id", None, self.shared.backend.create_id(domain))
    }

    /// Intern a region name
    ///
    /// # Errors
    ///
    /// Returns the backend error unchanged.
    pub fn string_handle(&self, text: &str) -> RegionResult<StringHandle> {
        self.observe(
            "create_string_handle",
            None,
            self.shared.backend.create_string_handle(text),
        )
    }

    /// Pause data collection
    ///
    /// # Errors
    ///
    /// Returns the backend error unchanged.
    pub fn pause(&self) -> RegionResult<()> {
        self.observe("pause", Some(Counter::Pause), self.shared.backend.pause())
    }

    /// Resume data collection
    ///
    /// # Errors
    ///
    /// Returns the backend error unchanged.
    pub fn resume(&self) -> RegionResult<()> {
        self.observe("resume", Some(Counter::Resume), self.shared.backend.resume())
    }

    /// Detach the collector
    ///
    /// # Errors
    ///
    /// Returns the backend error unchanged.
    pub fn detach(&self) -> RegionResult<()> {
        self.observe("detach", Some(Counter::Detach), self.shared.backend.detach())
    }

    /// Name the calling thread in the profiler
    ///
    /// # Errors
    ///
    /// Returns the backend error unchanged.
    pub fn thread_set_name(&self, name: &str) -> RegionResult<()> {
        self.observe(
            "thread_set_name",
            None,
            self.shared.backend.thread_set_name(name),
        )
    }

    /// Begin a nested task on the calling thread
    ///
    /// # Errors
    ///
    /// Returns the backend error unchanged.
    pub fn task_begin(
        &self,
        domain: &Domain,
        name: &StringHandle,
        id: &Id,
        parent: Option<&Id>,
    ) -> RegionResult<()> {
        self.observe(
            "task_begin",
            Some(Counter::TaskBegin),
            self.shared.backend.task_begin(domain, name, id, parent),
        )
    }

    /// Begin a nested task named `name` with a freshly minted id
    ///
    /// Interns `name` and mints the id on every call; keep a
    /// [`NestedTask`] instead when the same task begins repeatedly.
    ///
    /// # Errors
    ///
    /// Returns the backend error unchanged.
    pub fn task_begin_named(&self, domain: &Domain, name: &str) -> RegionResult<Id> {
        let handle = self.string_handle(name)?;
        let id = self.id(domain)?;
        self.task_begin(domain, &handle, &id, None)?;
        Ok(id)
    }

    /// End the innermost nested task of `domain` on the calling thread
    ///
    /// # Errors
    ///
    /// Returns the backend error unchanged.
    pub fn task_end(&self, domain: &Domain) -> RegionResult<()> {
        self.observe(
            "task_end",
            Some(Counter::TaskEnd),
            self.shared.backend.task_end(domain),
        )
    }

    /// Begin an overlapped task, later ended by its id
    ///
    /// # Errors
    ///
    /// Returns the backend error unchanged.
    pub fn task_begin_overlapped(
        &self,
        domain: &Domain,
        name: &StringHandle,
        id: &Id,
        parent: Option<&Id>,
    ) -> RegionResult<()> {
        self.observe(
            "task_begin_overlapped",
            Some(Counter::OverlappedBegin),
            self.shared
                .backend
                .task_begin_overlapped(domain, name, id, parent),
        )
    }

    /// End the overlapped task `id` of `domain`
    ///
    /// # Errors
    ///
    /// Returns the backend error unchanged.
    pub fn task_end_overlapped(&self, domain: &Domain, id: &Id) -> RegionResult<()> {
        self.observe(
            "task_end_overlapped",
            Some(Counter::OverlappedEnd),
            self.shared.backend.task_end_overlapped(domain, id),
        )
    }

    /// Create a backend event handle named `name`
    ///
    /// # Errors
    ///
    /// Returns the backend error unchanged.
    pub fn create_event(&self, name: &str) -> RegionResult<EventHandle> {
        self.observe("create_event", None, self.shared.backend.create_event(name))
    }

    /// Begin an event
    ///
    /// # Errors
    ///
    /// Returns the backend error unchanged.
    pub fn event_begin(&self, event: &EventHandle) -> RegionResult<()> {
        self.observe(
            "event_begin",
            Some(Counter::EventBegin),
            self.shared.backend.event_begin(event),
        )
    }

    /// End an event
    ///
    /// # Errors
    ///
    /// Returns the backend error unchanged.
    pub fn event_end(&self, event: &EventHandle) -> RegionResult<()> {
        self.observe(
            "event_end",
            Some(Counter::EventEnd),
            self.shared.backend.event_end(event),
        )
    }

    /// Create a backend processor-trace region handle named `name`
    ///
    /// # Errors
    ///
    /// Returns the backend error unchanged.
    pub fn create_pt_region(&self, name: &str) -> RegionResult<PtRegionHandle> {
        self.observe(
            "create_pt_region",
            None,
            self.shared.backend.create_pt_region(name),
        )
    }

    /// Begin a processor-trace region
    ///
    /// # Errors
    ///
    /// Returns the backend error unchanged.
    pub fn pt_region_begin(&self, region: &PtRegionHandle) -> RegionResult<()> {
        self.observe(
            "pt_region_begin",
            Some(Counter::PtRegionBegin),
            self.shared.backend.pt_region_begin(region),
        )
    }

    /// End a processor-trace region
    ///
    /// # Errors
    ///
    /// Returns the backend error unchanged.
    pub fn pt_region_end(&self, region: &PtRegionHandle) -> RegionResult<()> {
        self.observe(
            "pt_region_end",
            Some(Counter::PtRegionEnd),
            self.shared.backend.pt_region_end(region),
        )
    }

    /// Create a nested or overlapped task, as selected by the options
    ///
    /// # Errors
    ///
    /// Returns naming errors and backend errors unchanged.
    #[track_caller]
    pub fn task(&self, options: impl Into<RegionOptions>) -> RegionResult<Task> {
        Task::new(self, options.into().or_call_site(CallSite::caller()))
    }

    /// Create a nested task
    ///
    /// # Errors
    ///
    /// Returns naming errors and backend errors unchanged.
    #[track_caller]
    pub fn nested_task(&self, options: impl Into<RegionOptions>) -> RegionResult<NestedTask> {
        NestedTask::new(self, options.into().or_call_site(CallSite::caller()))
    }

    /// Create an overlapped task
    ///
    /// # Errors
    ///
    /// Returns naming errors and backend errors unchanged.
    #[track_caller]
    pub fn overlapped_task(
        &self,
        options: impl Into<RegionOptions>,
    ) -> RegionResult<OverlappedTask> {
        OverlappedTask::new(self, options.into().or_call_site(CallSite::caller()))
    }

    /// Create an event
    ///
    /// # Errors
    ///
    /// Returns naming errors and backend errors unchanged.
    #[track_caller]
    pub fn event(&self, options: impl Into<RegionOptions>) -> RegionResult<Event> {
        Event::new(self, options.into().or_call_site(CallSite::caller()))
    }

    /// Create a processor-trace region
    ///
    /// # Errors
    ///
    /// Returns naming errors and backend errors unchanged.
    #[track_caller]
    pub fn pt_region(&self, options: impl Into<RegionOptions>) -> RegionResult<PtRegion> {
        PtRegion::new(self, options.into().or_call_site(CallSite::caller()))
    }

    /// Create a region with collection resumed inside
    pub fn active_region(&self, options: impl Into<RegionOptions>) -> ActiveRegion {
        ActiveRegion::new(self, options.into())
    }

    /// Create a region with collection paused inside
    pub fn paused_region(&self, options: impl Into<RegionOptions>) -> PausedRegion {
        PausedRegion::new(self, options.into())
    }

    /// Create a task around `f`, named after `f` unless the options name it
    ///
    /// # Errors
    ///
    /// Returns naming errors and backend errors unchanged.
    pub fn task_for<F>(
        &self,
        f: F,
        options: impl Into<RegionOptions>,
    ) -> RegionResult<Traced<Task, F>> {
        let identity = Identity::of_fn::<F>();
        let task = Task::new(self, options.into().or_identity(&identity))?;
        Ok(Traced::new(task, f, identity))
    }

    /// Create a nested task around `f`
    ///
    /// # Errors
    ///
    /// Returns naming errors and backend errors unchanged.
    pub fn nested_task_for<F>(
        &self,
        f: F,
        options: impl Into<RegionOptions>,
    ) -> RegionResult<Traced<NestedTask, F>> {
        let identity = Identity::of_fn::<F>();
        let task = NestedTask::new(self, options.into().or_identity(&identity))?;
        Ok(Traced::new(task, f, identity))
    }

    /// Create an overlapped task around `f`
    ///
    /// # Errors
    ///
    /// Returns naming errors and backend errors unchanged.
    pub fn overlapped_task_for<F>(
        &self,
        f: F,
        options: impl Into<RegionOptions>,
    ) -> RegionResult<Traced<OverlappedTask, F>> {
        let identity = Identity::of_fn::<F>();
        let task = OverlappedTask::new(self, options.into().or_identity(&identity))?;
        Ok(Traced::new(task, f, identity))
    }

    /// Create an event around `f`
    ///
    /// # Errors
    ///
    /// Returns naming errors and backend errors unchanged.
    pub fn event_for<F>(
        &self,
        f: F,
        options: impl Into<RegionOptions>,
    ) -> RegionResult<Traced<Event, F>> {
        let identity = Identity::of_fn::<F>();
        let event = Event::new(self, options.into().or_identity(&identity))?;
        Ok(Traced::new(event, f, identity))
    }

    /// Create a processor-trace region around `f`
    ///
    /// # Errors
    ///
    /// Returns naming errors and backend errors unchanged.
    pub fn pt_region_for<F>(
        &self,
        f: F,
        options: impl Into<RegionOptions>,
    ) -> RegionResult<Traced<PtRegion, F>> {
        let identity = Identity::of_fn::<F>();
        let region = PtRegion::new(self, options.into().or_identity(&identity))?;
        Ok(Traced::new(region, f, identity))
    }

    /// Run `f` with collection resumed
    pub fn active_region_for<F>(
        &self,
        f: F,
        options: impl Into<RegionOptions>,
    ) -> Traced<ActiveRegion, F> {
        Traced::new(self.active_region(options), f, Identity::of_fn::<F>())
    }

    /// Run `f` with collection paused
    pub fn paused_region_for<F>(
        &self,
        f: F,
        options: impl Into<RegionOptions>,
    ) -> Traced<PausedRegion, F> {
        Traced::new(self.paused_region(options), f, Identity::of_fn::<F>())
    }
}

impl core::fmt::Debug for Instrumentation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Instrumentation")
            .field("config", &self.shared.config)
            .field(
                "backend_type",
                &core::any::type_name_of_val(&*self.shared.backend),
            )
            .field("metrics", &self.metrics())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendKind;
    use crate::naming::NameKind;
    use crate::platform::{BackendCall, MemoryBackend};
    use crate::region::Region;

    fn setup() -> (Arc<MemoryBackend>, Instrumentation) {
        let backend = Arc::new(MemoryBackend::new());
        let instr = Instrumentation::with_backend(backend.clone());
        (backend, instr)
    }

    #[test]
    fn test_instrumentation_lifecycle() -> RegionResult<()> {
        let instr = Instrumentation::from_config(
            MarkupConfig::builder().backend(BackendKind::Log).build()?,
        )?;
        instr.initialize()?;
        assert!(instr.is_enabled());

        instr.nested_task("tick")?.scope(|| ())?;

        instr.shutdown();
        Ok(())
    }

    #[test]
    fn test_disabled_instrumentation_still_runs_regions() -> RegionResult<()> {
        let instr = Instrumentation::from_config(MarkupConfig::builder().enabled(false).build()?)?;
        assert!(!instr.is_enabled());
        let value = instr.event("quiet")?.scope(|| 5)?;
        assert_eq!(value, 5);
        Ok(())
    }

    #[test]
    fn test_factory_names_region_after_caller_line() -> RegionResult<()> {
        let (_backend, instr) = setup();
        let line = line!() + 1;
        let task = instr.nested_task(RegionOptions::new())?;
        assert_eq!(task.name_kind(), NameKind::CallSite);
        assert_eq!(
            task.name().map(|n| n.to_string()),
            Some(format!("manager.rs:{line}"))
        );
        Ok(())
    }

    #[test]
    fn test_for_variants_take_callable_name() -> RegionResult<()> {
        fn checksum(data: &[u8]) -> u32 {
            data.iter().map(|&b| u32::from(b)).sum()
        }

        let (_backend, instr) = setup();
        let traced = instr.event_for(checksum, RegionOptions::new())?;
        assert_eq!(traced.call((&[1_u8, 2, 3][..],))?, 6);
        assert_eq!(traced.region().name_kind(), NameKind::Callable);

        let named = instr.nested_task_for(checksum, "crc")?;
        assert_eq!(named.region().name().map(|n| n.to_string()), Some("crc".into()));
        Ok(())
    }

    #[test]
    fn test_metrics_track_primitives_and_failures() -> RegionResult<()> {
        let (backend, instr) = setup();
        let task = instr.nested_task("work")?;
        task.scope(|| ())?;

        backend.fail_on("task_end");
        let result = task.scope(|| ());
        assert!(matches!(result, Err(_)));

        let m = instr.metrics();
        assert_eq!(m.tasks_begun, 2);
        assert_eq!(m.tasks_ended, 1);
        assert_eq!(m.backend_errors, 1);

        instr.reset_metrics();
        assert_eq!(instr.metrics(), MarkupMetrics::default());
        Ok(())
    }

    #[test]
    fn test_raw_primitives_forward() -> RegionResult<()> {
        let (backend, instr) = setup();
        instr.thread_set_name("worker-1")?;
        instr.pause()?;
        instr.resume()?;
        instr.detach()?;
        assert_eq!(
            backend.calls(),
            vec![
                BackendCall::ThreadSetName {
                    name: "worker-1".into()
                },
                BackendCall::Pause,
                BackendCall::Resume,
                BackendCall::Detach,
            ]
        );
        assert_eq!(instr.metrics().detaches, 1);
        Ok(())
    }
}
