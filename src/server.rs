//! # Herald Server - Operator Console
//!
//! `HeraldServer` wires configuration, the community directory, the settings
//! file and the [`Admin`] module together, then runs an operator console over
//! stdin. Console lines are either meta commands (leading `/`) or regular bot
//! commands with the configured prefix.
//!
//! ```text
//! /as <group|-> <member>   act as <member> in <group> ("-" = private message)
//! /reload                  re-run Admin setup; the previous announcer stops
//! /status                  mailbox state and announcement counters
//! /help                    this list
//! /quit                    stop the server
//! ```
//!
//! Pass reports from the announcer are printed as they arrive, so the operator
//! sees fan-out results without blocking the console.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use log::{debug, info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::admin::{
    parse_command, Admin, AdminDeps, Caller, CommandContext, PassReport, Registry,
};
use crate::config::Config;
use crate::metrics;
use crate::platform::{DirectorySeed, Destinations, MemoryDirectory, RoleDirectory};

/// Role names whose holders may manage roles from the console.
pub const MANAGER_ROLE_NAMES: [&str; 2] = ["Admin", "Mod"];

const CONSOLE_HELP: &str = "/as <group|-> <member>, /reload, /status, /help, /quit";

/// Result of one console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleReply {
    Silent,
    Text(String),
    Quit,
}

pub struct HeraldServer {
    config: Config,
    directory: Arc<MemoryDirectory>,
    registry: Registry,
    admin: Admin,
    context: CommandContext,
    reports_tx: mpsc::UnboundedSender<PassReport>,
    reports_rx: Option<mpsc::UnboundedReceiver<PassReport>>,
}

impl HeraldServer {
    /// Load the community directory from `storage.directory_file` and start.
    pub async fn new(config: Config) -> Result<Self> {
        let seed = DirectorySeed::load(config.storage.directory_path()).await?;
        Self::with_directory(config, Arc::new(MemoryDirectory::new(seed))).await
    }

    pub async fn with_directory(config: Config, directory: Arc<MemoryDirectory>) -> Result<Self> {
        let registry = Registry::new();
        let (reports_tx, reports_rx) = mpsc::unbounded_channel();
        let admin = Self::setup_admin(&config, &registry, &directory, &reports_tx).await?;
        let context = caller_context(&config, directory.as_ref(), None, &config.bot.owner);
        Ok(Self {
            config,
            directory,
            registry,
            admin,
            context,
            reports_tx,
            reports_rx: Some(reports_rx),
        })
    }

    async fn setup_admin(
        config: &Config,
        registry: &Registry,
        directory: &Arc<MemoryDirectory>,
        reports_tx: &mpsc::UnboundedSender<PassReport>,
    ) -> Result<Admin> {
        let deps = AdminDeps {
            destinations: directory.clone(),
            roles: directory.clone(),
            data_dir: PathBuf::from(&config.storage.data_dir),
            announce: config.announce.clone(),
            reports: Some(reports_tx.clone()),
        };
        Ok(Admin::setup(registry, deps).await?)
    }

    pub fn admin(&self) -> &Admin {
        &self.admin
    }

    pub fn directory(&self) -> &Arc<MemoryDirectory> {
        &self.directory
    }

    pub fn context(&self) -> &CommandContext {
        &self.context
    }

    /// Take the pass report stream (the console loop does this itself).
    pub fn take_reports(&mut self) -> Option<mpsc::UnboundedReceiver<PassReport>> {
        self.reports_rx.take()
    }

    /// Re-run Admin setup. The previous instance's announcer is superseded and
    /// this waits until it has stopped.
    pub async fn reload(&mut self) -> Result<()> {
        let fresh =
            Self::setup_admin(&self.config, &self.registry, &self.directory, &self.reports_tx)
                .await?;
        let previous = std::mem::replace(&mut self.admin, fresh);
        previous.wait_stopped().await;
        info!(
            "Admin module reloaded (generation {})",
            self.admin.registration().generation()
        );
        Ok(())
    }

    pub async fn handle_line(&mut self, line: &str) -> Result<ConsoleReply> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(ConsoleReply::Silent);
        }
        if let Some(meta) = trimmed.strip_prefix('/') {
            return self.handle_meta(meta).await;
        }
        match parse_command(&self.config.bot.command_prefix, trimmed) {
            Ok(Some(cmd)) => match self.admin.handle(&self.context, cmd).await {
                Ok(Some(reply)) => Ok(ConsoleReply::Text(reply)),
                Ok(None) => Ok(ConsoleReply::Silent),
                Err(e) => Ok(ConsoleReply::Text(e.to_string())),
            },
            Ok(None) => Ok(ConsoleReply::Silent),
            Err(e) => Ok(ConsoleReply::Text(e.to_string())),
        }
    }

    async fn handle_meta(&mut self, meta: &str) -> Result<ConsoleReply> {
        let mut parts = meta.split_whitespace();
        let reply = match parts.next().unwrap_or("").to_ascii_lowercase().as_str() {
            "as" => {
                let (Some(group), Some(member)) = (parts.next(), parts.next()) else {
                    return Ok(ConsoleReply::Text("Usage: /as <group|-> <member>".into()));
                };
                let group = (group != "-").then(|| group.to_string());
                if let Some(g) = &group {
                    if self.directory.member(g, member).is_none() {
                        let msg = format!("{} is not a member of {}", member, g);
                        return Ok(ConsoleReply::Text(msg));
                    }
                }
                self.context =
                    caller_context(&self.config, self.directory.as_ref(), group, member);
                format!(
                    "Acting as {} in {}",
                    self.context.caller.name,
                    self.context.group.as_deref().unwrap_or("private messages")
                )
            }
            "reload" => {
                self.reload().await?;
                "Admin module reloaded.".to_string()
            }
            "status" => self.status_line(),
            "help" => CONSOLE_HELP.to_string(),
            "quit" | "exit" => return Ok(ConsoleReply::Quit),
            other => format!("Unknown console command /{}. Try /help", other),
        };
        Ok(ConsoleReply::Text(reply))
    }

    fn status_line(&self) -> String {
        format!(
            "{}: {} groups, announcement {}, {}",
            self.config.bot.name,
            self.directory.group_count(),
            if self.admin.mailbox().is_pending() { "pending" } else { "idle" },
            metrics::snapshot()
        )
    }

    /// Print configuration and directory summary.
    pub async fn show_status(&self) -> Result<()> {
        println!("{} status", self.config.bot.name);
        println!("  owner:           {}", self.config.bot.owner);
        println!("  command prefix:  {}", self.config.bot.command_prefix);
        println!("  poll interval:   {:?}", self.config.announce.poll_interval());
        println!("  send delay:      {:?}", self.config.announce.send_delay());
        println!("  data dir:        {}", self.config.storage.data_dir);
        println!("  communities:     {}", self.directory.group_count());
        Ok(())
    }

    /// Run the operator console until `/quit`, end of input or Ctrl-C.
    pub async fn run(&mut self) -> Result<()> {
        let mut reports = self.reports_rx.take();
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        println!("{} console ready. {}", self.config.bot.name, CONSOLE_HELP);

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        debug!("console input closed");
                        break;
                    };
                    match self.handle_line(&line).await {
                        Ok(ConsoleReply::Text(text)) => println!("{}", text),
                        Ok(ConsoleReply::Silent) => {}
                        Ok(ConsoleReply::Quit) => break,
                        Err(e) => warn!("console command failed: {}", e),
                    }
                }
                Some(report) = recv_report(&mut reports) => {
                    println!("[announce] {}", report.summary());
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal");
                    break;
                }
            }
        }

        self.shutdown().await;
        Ok(())
    }

    async fn shutdown(&mut self) {
        self.registry.cancel_all();
        info!("Herald shutdown complete");
    }
}

async fn recv_report(
    reports: &mut Option<mpsc::UnboundedReceiver<PassReport>>,
) -> Option<PassReport> {
    match reports {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Build the command context for `member` acting in `group`.
pub fn caller_context(
    config: &Config,
    directory: &MemoryDirectory,
    group: Option<String>,
    member: &str,
) -> CommandContext {
    let is_owner = member == config.bot.owner;
    let mut name = member.to_string();
    let mut bot = false;
    let mut can_manage_roles = is_owner;
    let mut channel = None;

    if let Some(g) = group.as_deref() {
        if let Some(m) = directory.member(g, member) {
            let roles = directory.roles(g);
            can_manage_roles |= roles.iter().any(|r| {
                m.has_role(r) && MANAGER_ROLE_NAMES.iter().any(|n| n.eq_ignore_ascii_case(&r.name))
            });
            name = m.name;
            bot = m.bot;
        }
        channel = directory
            .group(g)
            .and_then(|grp| directory.default_target(&grp))
            .map(|t| t.channel_id);
    }

    CommandContext {
        group,
        channel,
        caller: Caller {
            id: member.to_string(),
            name,
            is_owner,
            can_manage_roles,
            bot,
        },
    }
}
