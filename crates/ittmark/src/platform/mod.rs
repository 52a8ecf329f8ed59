//! Bundled backends

mod fallback;
mod memory;
mod null;
mod registry;

#[cfg(target_os = "linux")]
mod linux;

pub use fallback::LogBackend;
pub use memory::{BackendCall, MemoryBackend};
pub use null::NullBackend;
pub use registry::HandleRegistry;

#[cfg(target_os = "linux")]
pub use linux::TraceMarkerBackend;
