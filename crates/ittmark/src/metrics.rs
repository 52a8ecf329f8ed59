//! Markup metrics for observability

use core::sync::atomic::{AtomicU64, Ordering};

/// Counters describing what the markup layer asked of its backend
///
/// All counters are monotonically increasing until [`reset`](Self::reset).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkupMetrics {
    /// Nested tasks begun
    pub tasks_begun: u64,

    /// Nested tasks ended
    pub tasks_ended: u64,

    /// Overlapped tasks begun
    pub overlapped_begun: u64,

    /// Overlapped tasks ended
    pub overlapped_ended: u64,

    /// Event occurrences begun
    pub events_begun: u64,

    /// Event occurrences ended
    pub events_ended: u64,

    /// Processor-trace regions begun
    pub pt_regions_begun: u64,

    /// Processor-trace regions ended
    pub pt_regions_ended: u64,

    /// Collection pauses issued
    pub pauses: u64,

    /// Collection resumes issued
    pub resumes: u64,

    /// Collector detaches issued
    pub detaches: u64,

    /// Primitives that returned an error
    pub backend_errors: u64,
}

impl MarkupMetrics {
    /// Create new metrics with zero values
    pub fn new() -> Self {
        Self::default()
    }

    /// Check that every begun region has also ended
    pub fn is_balanced(&self) -> bool {
        self.tasks_begun == self.tasks_ended
            && self.overlapped_begun == self.overlapped_ended
            && self.events_begun == self.events_ended
            && self.pt_regions_begun == self.pt_regions_ended
    }

    /// Regions begun but not yet ended
    pub fn open_regions(&self) -> u64 {
        let begun = self
            .tasks_begun
            .saturating_add(self.overlapped_begun)
            .saturating_add(self.events_begun)
            .saturating_add(self.pt_regions_begun);
        let ended = self
            .tasks_ended
            .saturating_add(self.overlapped_ended)
            .saturating_add(self.events_ended)
            .saturating_add(self.pt_regions_ended);
        begun.saturating_sub(ended)
    }

    /// Reset all metrics to zero
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Merge metrics from another instance
    pub fn merge(&mut self, other: &MarkupMetrics) {
        self.tasks_begun = self.tasks_begun.saturating_add(other.tasks_begun);
        self.tasks_ended = self.tasks_ended.saturating_add(other.tasks_ended);
        self.overlapped_begun = self.overlapped_begun.saturating_add(other.overlapped_begun);
        self.overlapped_ended = self.overlapped_ended.saturating_add(other.overlapped_ended);
        self.events_begun = self.events_begun.saturating_add(other.events_begun);
        self.events_ended = self.events_ended.saturating_add(other.events_ended);
        self.pt_regions_begun = self.pt_regions_begun.saturating_add(other.pt_regions_begun);
        self.pt_regions_ended = self.pt_regions_ended.saturating_add(other.pt_regions_ended);
        self.pauses = self.pauses.saturating_add(other.pauses);
        self.resumes = self.resumes.saturating_add(other.resumes);
        self.detaches = self.detaches.saturating_add(other.detaches);
        self.backend_errors = self.backend_errors.saturating_add(other.backend_errors);
    }
}

impl core::fmt::Display for MarkupMetrics {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "MarkupMetrics(tasks={}/{}, overlapped={}/{}, events={}/{}, pt={}/{}, pauses={}, resumes={}, errors={})",
            self.tasks_begun,
            self.tasks_ended,
            self.overlapped_begun,
            self.overlapped_ended,
            self.events_begun,
            self.events_ended,
            self.pt_regions_begun,
            self.pt_regions_ended,
            self.pauses,
            self.resumes,
            self.backend_errors
        )
    }
}

/// Which counter a primitive bumps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Counter {
    TaskBegin,
    TaskEnd,
    OverlappedBegin,
    OverlappedEnd,
    EventBegin,
    EventEnd,
    PtRegionBegin,
    PtRegionEnd,
    Pause,
    Resume,
    Detach,
    BackendError,
}

/// Lock-free counters behind [`MarkupMetrics`]
#[derive(Debug, Default)]
pub(crate) struct AtomicMetrics {
    counters: [AtomicU64; 12],
}

impl AtomicMetrics {
    #[inline]
    pub(crate) fn record(&self, counter: Counter) {
        if let Some(slot) = self.counters.get(counter as usize) {
            // fetch_update never fails with a closure that always returns Some
            let _ = slot.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                Some(v.saturating_add(1))
            });
        }
    }

    fn load(&self, counter: Counter) -> u64 {
        self.counters
            .get(counter as usize)
            .map_or(0, |slot| slot.load(Ordering::Relaxed))
    }

    pub(crate) fn snapshot(&self) -> MarkupMetrics {
        MarkupMetrics {
            tasks_begun: self.load(Counter::TaskBegin),
            tasks_ended: self.load(Counter::TaskEnd),
            overlapped_begun: self.load(Counter::OverlappedBegin),
            overlapped_ended: self.load(Counter::OverlappedEnd),
            events_begun: self.load(Counter::EventBegin),
            events_ended: self.load(Counter::EventEnd),
            pt_regions_begun: self.load(Counter::PtRegionBegin),
            pt_regions_ended: self.load(Counter::PtRegionEnd),
            pauses: self.load(Counter::Pause),
            resumes: self.load(Counter::Resume),
            detaches: self.load(Counter::Detach),
            backend_errors: self.load(Counter::BackendError),
        }
    }

    pub(crate) fn reset(&self) {
        for slot in &self.counters {
            slot.store(0, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_default() {
        let m = MarkupMetrics::default();
        assert_eq!(m.tasks_begun, 0);
        assert!(m.is_balanced());
        assert_eq!(m.open_regions(), 0);
    }

    #[test]
    fn test_metrics_recording() {
        let counters = AtomicMetrics::default();

        counters.record(Counter::TaskBegin);
        counters.record(Counter::TaskBegin);
        counters.record(Counter::TaskEnd);
        counters.record(Counter::Pause);

        let m = counters.snapshot();
        assert_eq!(m.tasks_begun, 2);
        assert_eq!(m.tasks_ended, 1);
        assert_eq!(m.pauses, 1);
        assert!(!m.is_balanced());
        assert_eq!(m.open_regions(), 1);
    }

    #[test]
    fn test_metrics_reset() {
        let counters = AtomicMetrics::default();
        counters.record(Counter::BackendError);
        counters.reset();
        assert_eq!(counters.snapshot(), MarkupMetrics::default());
    }

    #[test]
    fn test_metrics_merge() {
        let mut m1 = MarkupMetrics {
            events_begun: 100,
            backend_errors: 5,
            ..Default::default()
        };

        let m2 = MarkupMetrics {
            events_begun: 50,
            backend_errors: 3,
            ..Default::default()
        };

        m1.merge(&m2);

        assert_eq!(m1.events_begun, 150);
        assert_eq!(m1.backend_errors, 8);
    }

    #[test]
    fn test_metrics_saturating_add() {
        let mut m = MarkupMetrics {
            tasks_begun: u64::MAX,
            ..Default::default()
        };

        m.merge(&MarkupMetrics {
            tasks_begun: 1,
            ..Default::default()
        });

        assert_eq!(m.tasks_begun, u64::MAX);
    }

    #[test]
    fn test_metrics_display() {
        let m = MarkupMetrics {
            tasks_begun: 2,
            tasks_ended: 1,
            ..Default::default()
        };
        assert!(m.to_string().starts_with("MarkupMetrics(tasks=2/1,"));
    }
}
