//! Code region markup for profiling backends
//!
//! Annotate functions, closures, methods and lexical blocks as named
//! regions: tasks (nested or overlapped), events, processor-trace regions
//! and collection control regions. A pluggable [`Backend`] records when
//! each region begins and ends:
//!
//! - **Linux**: ftrace `trace_marker` in systrace format
//! - **Other platforms**: structured logging via `tracing`
//! - **Tests**: an in-memory recorder
//!
//! # Two ways to mark a region
//!
//! Every region is usable as a guard around a block ([`Region::enter`],
//! [`Region::scope`]) or as a transform over a callable ([`Region::wrap`]),
//! producing a [`Traced`] callable. In both cases the region ends on every
//! exit path once it has begun, panics included.
//!
//! # Naming
//!
//! A region is named by a custom string, by the callable it wraps, or,
//! failing both, provisionally by the `file:line` that created it. The
//! name becomes final on first use and never changes afterwards.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use ittmark::{Instrumentation, Region, RegionOptions};
//! use ittmark::platform::MemoryBackend;
//!
//! let instr = Instrumentation::with_backend(Arc::new(MemoryBackend::new()));
//!
//! // Guard around a block
//! let frame = instr.nested_task("frame")?;
//! frame.scope(|| {
//!     // Transform over a callable, named after the closure's path
//!     let step = instr.event(RegionOptions::new())?.wrap(|dt: f32| dt * 2.0)?;
//!     step.call((0.5,))
//! })??;
//!
//! assert!(instr.metrics().is_balanced());
//! # Ok::<(), ittmark::RegionError>(())
//! ```

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, missing_debug_implementations)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod backend;
pub mod callsite;
pub mod collection;
pub mod config;
pub mod error;
pub mod event;
pub mod global;
pub mod handles;
pub mod macros;
pub mod manager;
pub mod metrics;
pub mod naming;
pub mod options;
pub mod platform;
pub mod prelude;
pub mod pt_region;
pub mod region;
pub mod task;

pub use backend::{Backend, create_backend, create_platform_backend};
pub use callsite::CallSite;
pub use collection::{ActiveRegion, Activator, ManualActivator, PausedRegion};
pub use config::{BackendKind, MarkupConfig, MarkupConfigBuilder};
pub use error::{RegionError, RegionResult};
pub use event::Event;
pub use global::{global, install};
pub use handles::{Domain, EventHandle, Id, PtRegionHandle, StringHandle};
pub use manager::Instrumentation;
pub use metrics::MarkupMetrics;
pub use naming::{Identity, NameKind, Source};
pub use options::{DomainArg, IntoParent, RegionOptions};
pub use pt_region::PtRegion;
pub use region::{Bound, DynCallable, ErasedFn, Invoke, Region, RegionGuard, Traced};
pub use task::{NestedTask, OverlappedTask, Task};
