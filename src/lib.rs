//! # Herald - Announcement Broadcaster for Chat Communities
//!
//! Herald is the admin core of a chat bot that sits in many independently
//! administered communities. An operator submits one announcement; a background
//! loop delivers it to the default channel of every community the bot can post
//! in, one community at a time, at a fixed pace.
//!
//! ## Features
//!
//! - **Single-slot mailbox**: at most one announcement in flight; a second one is
//!   rejected, never queued or overwritten.
//! - **Paced fan-out**: fixed inter-send delay, per-community permission probe,
//!   partial-failure tolerance (one failing community never aborts the rest).
//! - **Self-terminating loop**: the announcer stops by itself when its owning
//!   registration is superseded (for example on module reload).
//! - **Role administration**: add/remove roles, self-service role lists persisted
//!   to `data/admin/settings.json`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use herald::config::Config;
//! use herald::server::HeraldServer;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     let mut server = HeraldServer::new(config).await?;
//!     server.run().await
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`admin`] - mailbox, announcer loop, registrations, role commands
//! - [`platform`] - traits for the host chat platform plus an in-memory directory
//! - [`server`] - operator console tying the pieces together
//! - [`config`] - TOML configuration
//! - [`validation`] - announcement and role-name validation
//! - [`logutil`] - single-line log escaping
//! - [`metrics`] - announcement counters

pub mod admin;
pub mod config;
pub mod logutil;
pub mod metrics;
pub mod platform;
pub mod server;
pub mod validation;
