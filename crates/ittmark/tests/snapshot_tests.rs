//! Snapshot tests for ittmark display and serialization formats

use std::path::PathBuf;
use std::sync::Arc;

use ittmark::platform::MemoryBackend;
use ittmark::{
    BackendKind, CallSite, Instrumentation, MarkupConfig, MarkupMetrics, Region, RegionError,
    RegionOptions, RegionResult,
};

fn instr() -> Instrumentation {
    Instrumentation::with_backend(Arc::new(MemoryBackend::new()))
}

#[test]
fn test_task_display_snapshot() -> RegionResult<()> {
    let instr = instr();
    let frame = instr.nested_task(RegionOptions::from("frame").domain("render"))?;
    let draw = instr.overlapped_task(
        RegionOptions::from("draw")
            .domain(frame.domain())
            .parent(&frame),
    )?;

    insta::assert_snapshot!(
        frame.to_string(),
        @"{ name: 'frame', domain: 'render', id: (1, 0), parent_id: None }"
    );
    insta::assert_snapshot!(
        draw.to_string(),
        @"{ name: 'draw', domain: 'render', id: (2, 0), parent_id: (1, 0) }"
    );
    Ok(())
}

fn flush_buffers() {}

#[test]
fn test_event_and_pt_region_display_snapshot() -> RegionResult<()> {
    let instr = instr();
    let event = instr.event("flush")?;
    let region = instr.pt_region("hot_loop")?;
    let pending = instr.event(RegionOptions::new())?;

    insta::assert_snapshot!(event.to_string(), @"{ event name: 'flush' }");
    insta::assert_snapshot!(region.to_string(), @"{ region name: 'hot_loop' }");

    let named = pending.wrap(flush_buffers)?;
    insta::assert_snapshot!(named.region().to_string(), @"{ event name: 'flush_buffers' }");
    Ok(())
}

#[test]
fn test_call_site_display_snapshot() {
    let site = CallSite::new("/srv/app/src/render.rs", 42);
    insta::assert_snapshot!(site.to_string(), @"render.rs:42");
}

#[test]
fn test_metrics_display_snapshot() -> RegionResult<()> {
    let instr = instr();
    let task = instr.nested_task("tick")?;
    task.scope(|| instr.paused_region(RegionOptions::new()).scope(|| ()))??;

    insta::assert_snapshot!(
        instr.metrics().to_string(),
        @"MarkupMetrics(tasks=1/1, overlapped=0/0, events=0/0, pt=0/0, pauses=1, resumes=1, errors=0)"
    );
    insta::assert_snapshot!(
        MarkupMetrics::default().to_string(),
        @"MarkupMetrics(tasks=0/0, overlapped=0/0, events=0/0, pt=0/0, pauses=0, resumes=0, errors=0)"
    );
    Ok(())
}

#[test]
fn test_error_message_snapshots() {
    insta::assert_snapshot!(
        RegionError::NotCallable.to_string(),
        @"Callable object is expected as a first argument."
    );
    insta::assert_snapshot!(
        RegionError::UnnamedRegion.to_string(),
        @"Cannot get the name for the code region."
    );
    insta::assert_snapshot!(
        RegionError::backend("task_end", "no open task").to_string(),
        @"Backend primitive `task_end` failed: no open task"
    );
}

#[test]
fn test_config_json_snapshot() -> Result<(), Box<dyn std::error::Error>> {
    let config = MarkupConfig::builder()
        .backend(BackendKind::TraceMarker)
        .default_domain("engine")
        .trace_marker_path(PathBuf::from("/tmp/trace_marker"))
        .build()?;

    insta::assert_snapshot!(
        serde_json::to_string(&config)?,
        @r#"{"enabled":true,"backend":"trace_marker","default_domain":"engine","trace_marker_path":"/tmp/trace_marker"}"#
    );

    let partial: MarkupConfig = serde_json::from_str(r#"{"backend":"log"}"#)?;
    assert_eq!(partial.backend, BackendKind::Log);
    assert_eq!(partial.default_domain, "ittmark");
    Ok(())
}
