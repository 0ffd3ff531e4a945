//! Per-destination results of one fan-out pass.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::platform::GroupId;

/// What happened to one destination group during a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeliveryOutcome {
    Delivered,
    SkippedNoPermission,
    /// The group or its default target vanished between enumeration and send.
    SkippedUnreachable,
    /// Transport error or a crash inside the delivery attempt.
    Failed,
}

impl DeliveryOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            DeliveryOutcome::Delivered => "delivered",
            DeliveryOutcome::SkippedNoPermission => "skipped-no-permission",
            DeliveryOutcome::SkippedUnreachable => "skipped-unreachable",
            DeliveryOutcome::Failed => "failed",
        }
    }

    /// Whether the group and its default target resolved. Every resolved
    /// group is followed by the inter-send delay, including permission skips.
    pub fn resolved(&self) -> bool {
        !matches!(self, DeliveryOutcome::SkippedUnreachable)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryRecord {
    pub group_id: GroupId,
    /// Empty when the group could not be resolved.
    pub group_name: String,
    pub outcome: DeliveryOutcome,
}

#[derive(Debug, Clone)]
pub struct PassReport {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// One record per visited group, in enumeration order.
    pub records: Vec<DeliveryRecord>,
    /// The owning registration was superseded before every group was visited.
    pub interrupted: bool,
}

impl PassReport {
    pub(crate) fn begin() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            started_at: now,
            finished_at: now,
            records: Vec::new(),
            interrupted: false,
        }
    }

    pub fn count(&self, outcome: DeliveryOutcome) -> usize {
        self.records.iter().filter(|r| r.outcome == outcome).count()
    }

    pub fn outcomes(&self) -> Vec<DeliveryOutcome> {
        self.records.iter().map(|r| r.outcome).collect()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} groups: {} delivered, {} no permission, {} unreachable, {} failed",
            self.records.len(),
            self.count(DeliveryOutcome::Delivered),
            self.count(DeliveryOutcome::SkippedNoPermission),
            self.count(DeliveryOutcome::SkippedUnreachable),
            self.count(DeliveryOutcome::Failed)
        )
    }
}
