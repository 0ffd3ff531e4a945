//! # Admin Module
//!
//! Announcement broadcasting and role administration.
//!
//! ## Components
//!
//! - [`mailbox`] - single-slot, reject-on-full holding area for one announcement
//! - [`announcer`] - background loop that drains the mailbox and fans out
//! - [`registry`] - named registrations whose cancellation stops their loops
//! - [`outcome`] - per-destination delivery outcomes and pass reports
//! - [`roles`] - case-insensitive role lookup and role list parsing
//! - [`settings`] - persisted self-service role lists
//! - [`commands`] - command line parsing
//! - [`service`] - the [`Admin`] module tying it all together
//!
//! ## Flow
//!
//! ```text
//! operator ──announce──► Admin::submit_announcement ──► Mailbox (1 slot)
//!                                                         │ poll
//!                                                         ▼
//!                     Destinations ◄── fan-out pass ── Announcer
//! ```
//!
//! The submitter only ever learns whether the message was accepted. Delivery
//! results are logged, counted in [`crate::metrics`] and optionally published
//! as [`outcome::PassReport`]s.

pub mod announcer;
pub mod commands;
pub mod mailbox;
pub mod outcome;
pub mod registry;
pub mod roles;
pub mod service;
pub mod settings;

pub use announcer::{Announcer, AnnouncerHandle};
pub use commands::{parse_command, Command, CommandError};
pub use mailbox::{Ack, AlreadyPending, Mailbox};
pub use outcome::{DeliveryOutcome, DeliveryRecord, PassReport};
pub use registry::{Registration, Registry};
pub use service::{Admin, AdminDeps, Caller, CommandContext, SubmitError, ADMIN_REGISTRATION};
pub use settings::{SettingsError, SettingsStore};
