//! Per-run shared state.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use chrono::{DateTime, Local};

use super::types::MAX_RUN_FAILURES;

/// State shared by every channel task of one run.
#[derive(Debug)]
pub struct RunContext {
    started_at: DateTime<Local>,
    failures: AtomicUsize,
    files_changed: AtomicBool,
}

impl RunContext {
    pub fn new(started_at: DateTime<Local>) -> Self {
        Self {
            started_at,
            failures: AtomicUsize::new(0),
            files_changed: AtomicBool::new(false),
        }
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    /// Count one channel failure, returning the new total.
    pub fn record_failure(&self) -> usize {
        self.failures.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }

    /// Whether no further channels may be dispatched.
    pub fn budget_exhausted(&self) -> bool {
        self.failures() >= MAX_RUN_FAILURES
    }

    pub fn mark_files_changed(&self) {
        self.files_changed.store(true, Ordering::SeqCst);
    }

    pub fn files_changed(&self) -> bool {
        self.files_changed.load(Ordering::SeqCst)
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new(Local::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget() {
        let ctx = RunContext::default();
        assert!(!ctx.budget_exhausted());
        assert_eq!(ctx.record_failure(), 1);
        assert_eq!(ctx.record_failure(), 2);
        assert!(!ctx.budget_exhausted());
        assert_eq!(ctx.record_failure(), 3);
        assert!(ctx.budget_exhausted());
    }

    #[test]
    fn test_files_changed_flag() {
        let ctx = RunContext::default();
        assert!(!ctx.files_changed());
        ctx.mark_files_changed();
        ctx.mark_files_changed();
        assert!(ctx.files_changed());
    }
}
