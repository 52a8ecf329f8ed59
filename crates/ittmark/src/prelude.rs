//! Prelude for ittmark
//!
//! This module re-exports the most commonly used types and macros.
//!
//! # Example
//!
//! ```rust
//! use ittmark::prelude::*;
//!
//! let instr = Instrumentation::with_backend(std::sync::Arc::new(NullBackend::default()));
//! let task = instr.nested_task("work")?;
//! task.scope(|| ())?;
//! # Ok::<(), RegionError>(())
//! ```

pub use crate::{
    ActiveRegion, Activator, Backend, CallSite, Event, Identity, Instrumentation, ManualActivator,
    NestedTask, OverlappedTask, PausedRegion, PtRegion, Region, RegionError, RegionGuard,
    RegionOptions, RegionResult, Task, Traced, callsite, event_scope,
    platform::{LogBackend, NullBackend},
    task_scope,
};
