//! Linux ftrace `trace_marker` backend

use std::collections::HashMap;
use std::fmt::{self, Arguments};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use super::registry::HandleRegistry;
use crate::backend::Backend;
use crate::error::{RegionError, RegionResult};
use crate::handles::{Domain, EventHandle, Id, PtRegionHandle, StringHandle};

/// Backend writing systrace-formatted lines to ftrace's `trace_marker`
///
/// Line format, readable by Perfetto and `systrace`:
///
/// - nested task, event and pt-region begin: `B|pid|name`
/// - their end: `E|pid`
/// - overlapped task begin: `S|pid|name|cookie`, the cookie being the id's
///   first word
/// - overlapped task end: `F|pid|name|cookie`
/// - pause and resume: counter `C|pid|ittmark.collecting|0` and `...|1`
///
/// # Permissions
///
/// Requires write access to the marker file, typically
/// `/sys/kernel/debug/tracing/trace_marker`. When it cannot be opened the
/// backend stays disabled and every primitive is a no-op.
///
/// # Contention
///
/// Writers use `try_lock`; a line that would have to wait for the file is
/// dropped and counted instead.
pub struct TraceMarkerBackend {
    path: PathBuf,
    registry: HandleRegistry,
    pid: u32,
    trace_file: Mutex<Option<File>>,
    overlapped: Mutex<HashMap<(u64, Id), Arc<str>>>,
    lines_written: AtomicU64,
    lines_dropped: AtomicU64,
}

impl TraceMarkerBackend {
    /// Create a backend for the marker file at `path`
    ///
    /// Nothing is opened until [`Backend::initialize`].
    pub fn new(path: impl AsRef<Path>, default_domain: &str) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            registry: HandleRegistry::new(default_domain),
            pid: std::process::id(),
            trace_file: Mutex::new(None),
            overlapped: Mutex::new(HashMap::new()),
            lines_written: AtomicU64::new(0),
            lines_dropped: AtomicU64::new(0),
        }
    }

    /// Marker file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lines written so far
    pub fn lines_written(&self) -> u64 {
        self.lines_written.load(Ordering::Relaxed)
    }

    /// Lines dropped because the file was busy
    pub fn lines_dropped(&self) -> u64 {
        self.lines_dropped.load(Ordering::Relaxed)
    }

    fn write_line(&self, primitive: &'static str, line: Arguments<'_>) -> RegionResult<()> {
        let Some(mut guard) = self.trace_file.try_lock() else {
            self.lines_dropped.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        };
        let Some(file) = guard.as_mut() else {
            return Ok(());
        };
        // ftrace turns every write(2) into its own marker entry
        let buf = format_line(line);
        file.write_all(buf.as_bytes())
            .map_err(|e| RegionError::backend(primitive, e))?;
        self.lines_written.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

fn format_line(line: Arguments<'_>) -> String {
    let mut buf = fmt::format(line);
    buf.push('\n');
    buf
}

impl Backend for TraceMarkerBackend {
    fn initialize(&self) -> RegionResult<()> {
        match File::options().write(true).open(&self.path) {
            Ok(mut file) => {
                if writeln!(file, "ittmark: markup initialized").is_ok() {
                    *self.trace_file.lock() = Some(file);
                    tracing::info!(path = %self.path.display(), "trace_marker backend initialized");
                } else {
                    tracing::warn!(
                        path = %self.path.display(),
                        "Failed to write to trace_marker, regions will not be recorded"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    "Failed to open trace_marker: {}, regions will not be recorded",
                    e
                );
            }
        }

        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.trace_file.lock().is_some()
    }

    fn shutdown(&self) {
        if let Some(mut file) = self.trace_file.lock().take() {
            if let Err(e) = writeln!(file, "ittmark: markup shutdown") {
                tracing::debug!(error = %e, "failed to write trace_marker shutdown line");
            }
        }
        tracing::info!("trace_marker backend shutdown");
    }

    fn create_domain(&self, name: Option<&str>) -> RegionResult<Domain> {
        Ok(self.registry.domain(name))
    }

    fn create_id(&self, _domain: &Domain) -> RegionResult<Id> {
        Ok(self.registry.id())
    }

    fn create_string_handle(&self, text: &str) -> RegionResult<StringHandle> {
        Ok(self.registry.string(text))
    }

    fn task_begin(
        &self,
        _domain: &Domain,
        name: &StringHandle,
        _id: &Id,
        _parent: Option<&Id>,
    ) -> RegionResult<()> {
        self.write_line("task_begin", format_args!("B|{}|{}", self.pid, name))
    }

    fn task_end(&self, _domain: &Domain) -> RegionResult<()> {
        self.write_line("task_end", format_args!("E|{}", self.pid))
    }

    fn task_begin_overlapped(
        &self,
        domain: &Domain,
        name: &StringHandle,
        id: &Id,
        _parent: Option<&Id>,
    ) -> RegionResult<()> {
        self.overlapped
            .lock()
            .insert((domain.token(), *id), Arc::from(name.as_str()));
        self.write_line(
            "task_begin_overlapped",
            format_args!("S|{}|{}|{}", self.pid, name, id.d1()),
        )
    }

    fn task_end_overlapped(&self, domain: &Domain, id: &Id) -> RegionResult<()> {
        let name = self.overlapped.lock().remove(&(domain.token(), *id));
        let name = name.as_deref().unwrap_or(domain.name());
        self.write_line(
            "task_end_overlapped",
            format_args!("F|{}|{}|{}", self.pid, name, id.d1()),
        )
    }

    fn create_event(&self, name: &str) -> RegionResult<EventHandle> {
        Ok(self.registry.event(name))
    }

    fn event_begin(&self, event: &EventHandle) -> RegionResult<()> {
        self.write_line("event_begin", format_args!("B|{}|{}", self.pid, event.name()))
    }

    fn event_end(&self, _event: &EventHandle) -> RegionResult<()> {
        self.write_line("event_end", format_args!("E|{}", self.pid))
    }

    fn pause(&self) -> RegionResult<()> {
        self.write_line("pause", format_args!("C|{}|ittmark.collecting|0", self.pid))
    }

    fn resume(&self) -> RegionResult<()> {
        self.write_line("resume", format_args!("C|{}|ittmark.collecting|1", self.pid))
    }

    fn detach(&self) -> RegionResult<()> {
        self.shutdown();
        Ok(())
    }

    fn thread_set_name(&self, name: &str) -> RegionResult<()> {
        tracing::debug!(thread = name, "trace_marker has no thread naming, ignored");
        Ok(())
    }

    fn create_pt_region(&self, name: &str) -> RegionResult<PtRegionHandle> {
        Ok(self.registry.pt_region(name))
    }

    fn pt_region_begin(&self, region: &PtRegionHandle) -> RegionResult<()> {
        self.write_line(
            "pt_region_begin",
            format_args!("B|{}|{}", self.pid, region.name()),
        )
    }

    fn pt_region_end(&self, _region: &PtRegionHandle) -> RegionResult<()> {
        self.write_line("pt_region_end", format_args!("E|{}", self.pid))
    }
}

impl core::fmt::Debug for TraceMarkerBackend {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TraceMarkerBackend")
            .field("path", &self.path)
            .field("lines_written", &self.lines_written())
            .field("lines_dropped", &self.lines_dropped())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marker_file() -> std::io::Result<tempfile::NamedTempFile> {
        tempfile::NamedTempFile::new()
    }

    fn thread_write_syscalls() -> Result<u64, Box<dyn std::error::Error>> {
        let io = std::fs::read_to_string("/proc/thread-self/io")?;
        let count = io
            .lines()
            .find_map(|line| line.strip_prefix("syscw:"))
            .ok_or("no syscw counter in /proc/thread-self/io")?;
        Ok(count.trim().parse()?)
    }

    #[test]
    fn test_each_primitive_is_a_single_write() -> Result<(), Box<dyn std::error::Error>> {
        let marker = marker_file()?;
        let backend = TraceMarkerBackend::new(marker.path(), "ittmark");
        backend.initialize()?;

        let domain = backend.create_domain(None)?;
        let name = backend.create_string_handle("frame")?;
        let id = backend.create_id(&domain)?;

        let before = thread_write_syscalls()?;
        backend.task_begin(&domain, &name, &id, None)?;
        let after_begin = thread_write_syscalls()?;
        assert_eq!(after_begin.saturating_sub(before), 1);

        backend.task_begin_overlapped(&domain, &name, &id, None)?;
        backend.task_end_overlapped(&domain, &id)?;
        backend.resume()?;
        backend.task_end(&domain)?;
        let after_all = thread_write_syscalls()?;
        assert_eq!(after_all.saturating_sub(after_begin), 4);
        assert_eq!(backend.lines_written(), 5);
        Ok(())
    }

    #[test]
    fn test_line_buffer_ends_with_newline() {
        let pid = 7;
        assert_eq!(format_line(format_args!("B|{pid}|{}", "frame")), "B|7|frame\n");
    }

    #[test]
    fn test_missing_marker_file_leaves_backend_disabled() -> RegionResult<()> {
        let backend = TraceMarkerBackend::new("/nonexistent/ittmark/trace_marker", "ittmark");
        backend.initialize()?;
        assert!(!backend.is_enabled());

        let domain = backend.create_domain(None)?;
        backend.task_end(&domain)?;
        assert_eq!(backend.lines_written(), 0);
        Ok(())
    }

    #[test]
    fn test_systrace_lines() -> Result<(), Box<dyn std::error::Error>> {
        let marker = marker_file()?;
        let backend = TraceMarkerBackend::new(marker.path(), "ittmark");
        backend.initialize()?;
        assert!(backend.is_enabled());

        let domain = backend.create_domain(None)?;
        let name = backend.create_string_handle("frame")?;
        let id = backend.create_id(&domain)?;
        backend.task_begin(&domain, &name, &id, None)?;
        backend.task_end(&domain)?;

        let io = backend.create_string_handle("io")?;
        let io_id = backend.create_id(&domain)?;
        backend.task_begin_overlapped(&domain, &io, &io_id, None)?;
        backend.task_end_overlapped(&domain, &io_id)?;
        backend.shutdown();

        let pid = std::process::id();
        let text = std::fs::read_to_string(marker.path())?;
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "ittmark: markup initialized".to_owned(),
                format!("B|{pid}|frame"),
                format!("E|{pid}"),
                format!("S|{pid}|io|2"),
                format!("F|{pid}|io|2"),
                "ittmark: markup shutdown".to_owned(),
            ]
        );
        assert_eq!(backend.lines_written(), 4);
        Ok(())
    }
}
