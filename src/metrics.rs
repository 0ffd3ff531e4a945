//! Process-wide announcement counters.
//! Cheap relaxed atomics; read with [`snapshot`] for status output and tests.
use std::sync::atomic::{AtomicU64, Ordering};

use crate::admin::outcome::DeliveryOutcome;

static SUBMITTED: AtomicU64 = AtomicU64::new(0);
static REJECTED: AtomicU64 = AtomicU64::new(0);
static PASSES: AtomicU64 = AtomicU64::new(0);
static PASSES_INTERRUPTED: AtomicU64 = AtomicU64::new(0);
static DELIVERED: AtomicU64 = AtomicU64::new(0);
static SKIPPED_NO_PERMISSION: AtomicU64 = AtomicU64::new(0);
static SKIPPED_UNREACHABLE: AtomicU64 = AtomicU64::new(0);
static FAILED: AtomicU64 = AtomicU64::new(0);

pub fn inc_submitted() {
    SUBMITTED.fetch_add(1, Ordering::Relaxed);
}

pub fn inc_rejected() {
    REJECTED.fetch_add(1, Ordering::Relaxed);
}

pub fn record_pass(interrupted: bool) {
    PASSES.fetch_add(1, Ordering::Relaxed);
    if interrupted {
        PASSES_INTERRUPTED.fetch_add(1, Ordering::Relaxed);
    }
}

pub fn record_outcome(outcome: DeliveryOutcome) {
    let counter = match outcome {
        DeliveryOutcome::Delivered => &DELIVERED,
        DeliveryOutcome::SkippedNoPermission => &SKIPPED_NO_PERMISSION,
        DeliveryOutcome::SkippedUnreachable => &SKIPPED_UNREACHABLE,
        DeliveryOutcome::Failed => &FAILED,
    };
    counter.fetch_add(1, Ordering::Relaxed);
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub submitted: u64,
    pub rejected: u64,
    pub passes: u64,
    pub passes_interrupted: u64,
    pub delivered: u64,
    pub skipped_no_permission: u64,
    pub skipped_unreachable: u64,
    pub failed: u64,
}

pub fn snapshot() -> Snapshot {
    Snapshot {
        submitted: SUBMITTED.load(Ordering::Relaxed),
        rejected: REJECTED.load(Ordering::Relaxed),
        passes: PASSES.load(Ordering::Relaxed),
        passes_interrupted: PASSES_INTERRUPTED.load(Ordering::Relaxed),
        delivered: DELIVERED.load(Ordering::Relaxed),
        skipped_no_permission: SKIPPED_NO_PERMISSION.load(Ordering::Relaxed),
        skipped_unreachable: SKIPPED_UNREACHABLE.load(Ordering::Relaxed),
        failed: FAILED.load(Ordering::Relaxed),
    }
}

impl std::fmt::Display for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "submitted={} rejected={} passes={} interrupted={} \
             delivered={} no_perm={} unreachable={} failed={}",
            self.submitted,
            self.rejected,
            self.passes,
            self.passes_interrupted,
            self.delivered,
            self.skipped_no_permission,
            self.skipped_unreachable,
            self.failed
        )
    }
}
