//! Markup macros

/// Capture the current source position as a [`CallSite`](crate::CallSite)
///
/// # Example
///
/// ```rust
/// use ittmark::callsite;
///
/// let site = callsite!();
/// assert_eq!(site.lineno(), line!() - 1);
/// ```
#[macro_export]
macro_rules! callsite {
    () => {
        $crate::CallSite::new(file!(), line!())
    };
}

/// Run a block inside a nested task
///
/// Evaluates to `RegionResult<T>` where `T` is the block's value. Without
/// an instrumentation argument the global one is used.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use ittmark::{Instrumentation, platform::MemoryBackend, task_scope};
///
/// let instr = Instrumentation::with_backend(Arc::new(MemoryBackend::new()));
/// let sum = task_scope!(instr, "sum", { 1 + 2 })?;
/// assert_eq!(sum, 3);
/// # Ok::<(), ittmark::RegionError>(())
/// ```
#[macro_export]
macro_rules! task_scope {
    ($instr:expr, $name:expr, $body:block) => {
        $instr
            .nested_task($name)
            .and_then(|task| $crate::Region::scope(&task, || $body))
    };
    ($name:expr, $body:block) => {
        $crate::task_scope!($crate::global::global(), $name, $body)
    };
}

/// Run a block inside an event
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use ittmark::{Instrumentation, platform::MemoryBackend, event_scope};
///
/// let instr = Instrumentation::with_backend(Arc::new(MemoryBackend::new()));
/// event_scope!(instr, "flush", { /* io */ })?;
/// # Ok::<(), ittmark::RegionError>(())
/// ```
#[macro_export]
macro_rules! event_scope {
    ($instr:expr, $name:expr, $body:block) => {
        $instr
            .event($name)
            .and_then(|event| $crate::Region::scope(&event, || $body))
    };
    ($name:expr, $body:block) => {
        $crate::event_scope!($crate::global::global(), $name, $body)
    };
}

#[cfg(test)]
mod tests {
    use crate::platform::{BackendCall, MemoryBackend};
    use crate::{Instrumentation, RegionOptions, RegionResult};
    use std::sync::Arc;

    #[test]
    fn test_callsite_macro() {
        let site = callsite!();
        assert_eq!(site.filename(), "macros.rs");
        assert_eq!(site.lineno(), line!() - 2);
    }

    #[test]
    fn test_scope_macros() -> RegionResult<()> {
        let backend = Arc::new(MemoryBackend::new());
        let instr = Instrumentation::with_backend(backend.clone());

        let value = task_scope!(instr, "outer", {
            event_scope!(instr, "inner", { 40 + 2 })
        })??;
        assert_eq!(value, 42);

        let line = line!() + 1;
        task_scope!(instr, RegionOptions::new(), {})?;

        let begins: Vec<_> = backend
            .boundaries()
            .into_iter()
            .filter_map(|call| match call {
                BackendCall::TaskBegin { name, .. } | BackendCall::EventBegin { name } => {
                    Some(name)
                }
                _ => None,
            })
            .collect();
        assert_eq!(
            begins,
            vec![
                "outer".to_owned(),
                "inner".to_owned(),
                format!("macros.rs:{line}")
            ]
        );
        Ok(())
    }
}
