//! The `Admin` module: announcement submission plus role administration.
//!
//! [`Admin::setup`] registers the module under [`ADMIN_REGISTRATION`], opens the
//! settings file and spawns the announcer with the registration's cancellation
//! token. Running setup again (a reload) supersedes the earlier instance and its
//! announcer stops on its own.

use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, info, warn};
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};

use super::announcer::{Announcer, AnnouncerHandle};
use super::commands::{Command, CommandError, USAGE_SELFROLES};
use super::mailbox::{Ack, AlreadyPending, Mailbox};
use super::outcome::PassReport;
use super::registry::{Registration, Registry};
use super::roles::{parse_role_list, resolve_role_names, role_from_string};
use super::settings::{SettingsError, SettingsStore};
use crate::config::AnnounceConfig;
use crate::logutil::escape_log;
use crate::metrics;
use crate::platform::{
    ChannelId, Destinations, GroupId, MemberId, Role, RoleDirectory, TransportError,
};
use crate::validation::validate_announcement;

/// Registration name of the admin module.
pub const ADMIN_REGISTRATION: &str = "Admin";

/// Longest `say` reply, in characters.
pub const SAY_MAX_CHARS: usize = 2000;
const SAY_KEEP_CHARS: usize = 1990;

pub const MSG_QUEUED: &str = "Announcement queued.";
pub const MSG_ALREADY_ANNOUNCING: &str =
    "Already announcing, wait until complete to issue a new announcement.";
pub const MSG_SUPERSEDED: &str =
    "The admin module was reloaded, this instance no longer announces.";

/// Why [`Admin::submit_announcement`] refused a message.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    #[error(transparent)]
    AlreadyPending(#[from] AlreadyPending),

    /// The registration was superseded; no announcer will drain this mailbox.
    #[error("the admin registration has been superseded")]
    Superseded,
}

/// Who issued a command. Permission flags are computed by the host before dispatch.
#[derive(Debug, Clone)]
pub struct Caller {
    pub id: MemberId,
    pub name: String,
    pub is_owner: bool,
    pub can_manage_roles: bool,
    pub bot: bool,
}

/// Where a command was issued. `group == None` means a private message.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub group: Option<GroupId>,
    pub channel: Option<ChannelId>,
    pub caller: Caller,
}

impl CommandContext {
    fn require_group(&self) -> Result<&str, CommandError> {
        self.group.as_deref().ok_or(CommandError::NoPrivateMessage)
    }

    fn require_role_manager(&self) -> Result<(), CommandError> {
        if self.caller.is_owner || self.caller.can_manage_roles {
            Ok(())
        } else {
            Err(CommandError::CheckFailure)
        }
    }
}

pub struct AdminDeps {
    pub destinations: Arc<dyn Destinations>,
    pub roles: Arc<dyn RoleDirectory>,
    pub data_dir: PathBuf,
    pub announce: AnnounceConfig,
    pub reports: Option<mpsc::UnboundedSender<PassReport>>,
}

pub struct Admin {
    mailbox: Arc<Mailbox>,
    settings: Mutex<SettingsStore>,
    roles: Arc<dyn RoleDirectory>,
    max_message_len: usize,
    registration: Registration,
    announcer: AnnouncerHandle,
}

impl Admin {
    pub async fn setup(registry: &Registry, deps: AdminDeps) -> Result<Self, SettingsError> {
        let settings = SettingsStore::open(&deps.data_dir).await?;
        let registration = registry.register(ADMIN_REGISTRATION);
        let mailbox = Arc::new(Mailbox::new());

        let mut announcer =
            Announcer::new(mailbox.clone(), deps.destinations, deps.announce.clone());
        if let Some(tx) = deps.reports {
            announcer = announcer.with_reports(tx);
        }
        let announcer = announcer.spawn(registration.token());
        info!(
            "Admin module ready (generation {})",
            registration.generation()
        );

        Ok(Self {
            mailbox,
            settings: Mutex::new(settings),
            roles: deps.roles,
            max_message_len: deps.announce.max_message_len,
            registration,
            announcer,
        })
    }

    pub fn registration(&self) -> &Registration {
        &self.registration
    }

    pub fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }

    pub fn announcer_finished(&self) -> bool {
        self.announcer.is_finished()
    }

    /// Consume the module and wait for its announcer to stop. Only returns
    /// once the registration has been superseded or removed.
    pub async fn wait_stopped(self) {
        if let Err(e) = self.announcer.join().await {
            warn!("announcer task ended abnormally: {}", e);
        }
    }

    /// Store an announcement for the announcer to pick up.
    ///
    /// Refused once the registration is superseded, since the announcer that
    /// would drain this mailbox has stopped (or is about to).
    pub fn submit_announcement(&self, message: &str) -> Result<Ack, SubmitError> {
        if self.registration.is_superseded() {
            metrics::inc_rejected();
            debug!("Announcement rejected, registration superseded");
            return Err(SubmitError::Superseded);
        }
        if let Err(e) = self.mailbox.submit(message) {
            metrics::inc_rejected();
            debug!("Announcement rejected, one is already pending");
            return Err(e.into());
        }
        // Superseded between the check and the store: take the message back.
        if self.registration.is_superseded() && self.mailbox.drain_if_present().is_some() {
            metrics::inc_rejected();
            debug!("Announcement withdrawn, registration superseded");
            return Err(SubmitError::Superseded);
        }
        metrics::inc_submitted();
        info!("Announcement queued: {}", escape_log(message));
        Ok(Ack)
    }

    /// Execute a parsed command. `Ok(None)` means "stay silent".
    pub async fn handle(
        &self,
        ctx: &CommandContext,
        cmd: Command,
    ) -> Result<Option<String>, CommandError> {
        let reply = match cmd {
            Command::Announce { message } => self.announce(&message),
            Command::AddRole { role, member } => self.add_role(ctx, &role, member).await?,
            Command::RemoveRole { role, member } => self.remove_role(ctx, &role, member).await?,
            Command::AdminSet => format!("Usage: {}", USAGE_SELFROLES),
            Command::AdminSetSelfRoles { list } => self.set_self_roles(ctx, &list).await?,
            Command::SelfRole { role } => self.self_role(ctx, &role).await?,
            Command::Say { text } => return Ok(say(&ctx.caller, &text)),
        };
        Ok(Some(reply))
    }

    fn announce(&self, message: &str) -> String {
        let text = match validate_announcement(message, self.max_message_len) {
            Ok(text) => text,
            Err(e) => return e.to_string(),
        };
        match self.submit_announcement(&text) {
            Ok(Ack) => MSG_QUEUED.to_string(),
            Err(SubmitError::AlreadyPending(_)) => MSG_ALREADY_ANNOUNCING.to_string(),
            Err(SubmitError::Superseded) => MSG_SUPERSEDED.to_string(),
        }
    }

    async fn add_role(
        &self,
        ctx: &CommandContext,
        role_name: &str,
        member: Option<String>,
    ) -> Result<String, CommandError> {
        let group = ctx.require_group()?;
        ctx.require_role_manager()?;

        let roles = self.roles.roles(group);
        let Some(role) = role_from_string(&roles, role_name) else {
            return Ok("That role cannot be found.".to_string());
        };
        if !self.roles.can_manage_roles(group, ctx.channel.as_deref()) {
            return Ok("I don't have manage_roles.".to_string());
        }
        let member_id = member.unwrap_or_else(|| ctx.caller.id.clone());
        let Some(target) = self.roles.member(group, &member_id) else {
            return Ok("That member cannot be found.".to_string());
        };

        Ok(match self.roles.add_role(group, &target.id, role).await {
            Ok(()) => {
                info!("Added role {} to {} on {}", role.name, target.name, group);
                format!("Added role {} to {}", role.name, target.name)
            }
            Err(e) => role_failure("add", role, &e),
        })
    }

    async fn remove_role(
        &self,
        ctx: &CommandContext,
        role_name: &str,
        member: Option<String>,
    ) -> Result<String, CommandError> {
        let group = ctx.require_group()?;
        ctx.require_role_manager()?;

        let roles = self.roles.roles(group);
        let Some(role) = role_from_string(&roles, role_name) else {
            return Ok("Role not found.".to_string());
        };
        let member_id = member.unwrap_or_else(|| ctx.caller.id.clone());
        let Some(target) = self.roles.member(group, &member_id) else {
            return Ok("That member cannot be found.".to_string());
        };
        if !target.has_role(role) {
            return Ok("User does not have that role.".to_string());
        }

        Ok(match self.roles.remove_role(group, &target.id, role).await {
            Ok(()) => {
                info!("Removed role {} from {} on {}", role.name, target.name, group);
                "Role successfully removed.".to_string()
            }
            Err(e) => role_failure("remove", role, &e),
        })
    }

    async fn set_self_roles(
        &self,
        ctx: &CommandContext,
        list: &str,
    ) -> Result<String, CommandError> {
        let group = ctx.require_group()?;
        ctx.require_role_manager()?;

        let names = parse_role_list(list);
        if names.is_empty() {
            return Err(CommandError::Usage(USAGE_SELFROLES));
        }
        let roles = self.roles.roles(group);
        let (found, missing) = resolve_role_names(&roles, &names);
        if !missing.is_empty() {
            return Ok(format!(
                "These roles were not found: {}\n\nPlease try again.",
                missing.join(", ")
            ));
        }

        self.settings
            .lock()
            .await
            .set_self_roles(group, found.clone())?;
        Ok(format!("Self roles successfully set to: {}", found.join(", ")))
    }

    async fn self_role(
        &self,
        ctx: &CommandContext,
        role_name: &str,
    ) -> Result<String, CommandError> {
        let group = ctx.require_group()?;
        let allowed: Vec<String> = match self.settings.lock().await.self_roles(group) {
            Some(names) => names.to_vec(),
            None => return Ok("I have no user settable roles for this server.".to_string()),
        };

        let settable: Vec<Role> = self
            .roles
            .roles(group)
            .into_iter()
            .filter(|r| allowed.iter().any(|n| n.eq_ignore_ascii_case(&r.name)))
            .collect();
        let Some(role) = role_from_string(&settable, role_name) else {
            debug!("{} not found as settable on {}", escape_log(role_name), group);
            return Ok("That role isn't user settable.".to_string());
        };

        match self.roles.add_role(group, &ctx.caller.id, role).await {
            Ok(()) => {
                debug!("Role {} added to {} on {}", role.name, ctx.caller.name, group);
                Ok("Role added.".to_string())
            }
            Err(TransportError::Forbidden(_)) => {
                debug!("{} just tried to add a role but I was forbidden", ctx.caller.name);
                Ok("I don't have permissions to do that.".to_string())
            }
            Err(e) => Ok(role_failure("add", role, &e)),
        }
    }
}

fn role_failure(action: &str, role: &Role, err: &TransportError) -> String {
    match err {
        TransportError::Forbidden(_) => "I don't have permissions to manage roles!".to_string(),
        other => {
            warn!("Failed to {} role {}: {}", action, role.name, other);
            format!("Could not {} role {}.", action, role.name)
        }
    }
}

/// Echo `text` back. Bots are ignored; overlong replies keep only their tail.
pub fn say(caller: &Caller, text: &str) -> Option<String> {
    if caller.bot {
        return None;
    }
    let count = text.chars().count();
    if count <= SAY_MAX_CHARS {
        return Some(text.to_string());
    }
    let tail: String = text.chars().skip(count - SAY_KEEP_CHARS).collect();
    Some(format!("…{}", tail))
}
