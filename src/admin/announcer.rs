//! Announcement dissemination loop.
//!
//! The announcer polls the [`Mailbox`] once per poll interval. When a message is
//! waiting it performs one fan-out pass over a fresh snapshot of destination
//! groups, then goes back to polling:
//!
//! ```text
//! Polling ──sleep──► liveness ──cancelled──► Terminated
//!    ▲                  │
//!    │                  ▼
//!    └──── empty ──── lease ──message──► Broadcasting ──done──┐
//!    ▲                                                        │
//!    └────────────────────────────────────────────────────────┘
//! ```
//!
//! For each group a pass re-resolves the group and its default target, probes
//! send permission and attempts a single delivery. Skips and failures are
//! recorded and logged; nothing propagates back to the submitter. The
//! inter-send delay follows every group that resolved, whether or not the bot
//! could post there, so the platform never sees a burst. Only vanished groups
//! and the last group of a pass are not followed by a delay.
//!
//! The loop stops when the [`CancellationToken`] of its owning registration is
//! cancelled, at the latest one poll interval after supersession. A pass in
//! progress stops before the next group.

use std::sync::Arc;

use chrono::Utc;
use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

use super::mailbox::Mailbox;
use super::outcome::{DeliveryOutcome, DeliveryRecord, PassReport};
use crate::config::AnnounceConfig;
use crate::logutil::escape_log;
use crate::metrics;
use crate::platform::{Destinations, GroupId};

pub struct Announcer {
    mailbox: Arc<Mailbox>,
    destinations: Arc<dyn Destinations>,
    cfg: AnnounceConfig,
    reports: Option<mpsc::UnboundedSender<PassReport>>,
}

/// Handle to a spawned announcer task.
#[derive(Debug)]
pub struct AnnouncerHandle {
    join: JoinHandle<()>,
}

impl AnnouncerHandle {
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the loop to reach its terminal state.
    pub async fn join(self) -> Result<(), JoinError> {
        self.join.await
    }
}

impl Announcer {
    pub fn new(
        mailbox: Arc<Mailbox>,
        destinations: Arc<dyn Destinations>,
        cfg: AnnounceConfig,
    ) -> Self {
        Self {
            mailbox,
            destinations,
            cfg,
            reports: None,
        }
    }

    /// Publish a [`PassReport`] on `tx` after every completed pass.
    pub fn with_reports(mut self, tx: mpsc::UnboundedSender<PassReport>) -> Self {
        self.reports = Some(tx);
        self
    }

    pub fn spawn(self, token: CancellationToken) -> AnnouncerHandle {
        AnnouncerHandle {
            join: tokio::spawn(self.run(token)),
        }
    }

    pub async fn run(self, token: CancellationToken) {
        debug!(
            "announcer started (poll={:?}, send_delay={:?})",
            self.cfg.poll_interval(),
            self.cfg.send_delay()
        );
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(self.cfg.poll_interval()) => {}
            }
            if token.is_cancelled() {
                break;
            }
            let Some(lease) = self.mailbox.lease() else {
                continue;
            };
            debug!("Found new announce message, announcing: {}", escape_log(lease.message()));
            let report = self.broadcast(lease.message(), &token).await;
            drop(lease);
            info!("announcement {} finished: {}", report.id, report.summary());
            if let Some(tx) = &self.reports {
                if tx.send(report).is_err() {
                    debug!("pass report receiver dropped");
                }
            }
        }
        if let Some(dropped) = self.mailbox.drain_if_present() {
            warn!(
                "announcer stopped with an undelivered announcement: {}",
                escape_log(&dropped)
            );
        }
        debug!("announcer loop terminated");
    }

    /// Run one fan-out pass of `message` over the current destination groups.
    pub async fn broadcast(&self, message: &str, token: &CancellationToken) -> PassReport {
        let mut report = PassReport::begin();
        let group_ids = self.destinations.group_ids();
        let total = group_ids.len();

        for (idx, group_id) in group_ids.iter().enumerate() {
            if token.is_cancelled() {
                info!(
                    "announcer superseded mid-pass; {} of {} groups not visited",
                    total - idx,
                    total
                );
                report.interrupted = true;
                break;
            }
            let record = self.deliver(group_id, message).await;
            metrics::record_outcome(record.outcome);
            let resolved = record.outcome.resolved();
            report.records.push(record);

            if resolved && idx + 1 < total {
                tokio::select! {
                    _ = token.cancelled() => {}
                    _ = tokio::time::sleep(self.cfg.send_delay()) => {}
                }
            }
        }

        report.finished_at = Utc::now();
        metrics::record_pass(report.interrupted);
        report
    }

    async fn deliver(&self, group_id: &GroupId, message: &str) -> DeliveryRecord {
        let Some(group) = self.destinations.group(group_id) else {
            debug!("group {} vanished before announce, skipping", group_id);
            return DeliveryRecord {
                group_id: group_id.clone(),
                group_name: String::new(),
                outcome: DeliveryOutcome::SkippedUnreachable,
            };
        };
        let record = |outcome| DeliveryRecord {
            group_id: group.id.clone(),
            group_name: group.name.clone(),
            outcome,
        };

        let Some(target) = self.destinations.default_target(&group) else {
            debug!("{} has no default channel, skipping", group.name);
            return record(DeliveryOutcome::SkippedUnreachable);
        };
        debug!("Looking to announce to {} on {}", target.name, group.name);

        if !self.destinations.can_send(&group.me, &target) {
            debug!("No send permission for {} on {}, skipping", target.name, group.name);
            return record(DeliveryOutcome::SkippedNoPermission);
        }

        // Own task so a panicking backend only costs this destination.
        let destinations = Arc::clone(&self.destinations);
        let send_target = target.clone();
        let text = message.to_string();
        let attempt =
            tokio::spawn(async move { destinations.send_message(&send_target, &text).await });

        match attempt.await {
            Ok(Ok(())) => {
                debug!("Announced to {} on {}", target.name, group.name);
                record(DeliveryOutcome::Delivered)
            }
            Ok(Err(e)) => {
                warn!("Announce to {} on {} failed: {}", target.name, group.name, e);
                record(DeliveryOutcome::Failed)
            }
            Err(e) => {
                warn!("Announce to {} on {} crashed: {}", target.name, group.name, e);
                record(DeliveryOutcome::Failed)
            }
        }
    }
}
