//! # Platform Seam
//!
//! Herald never talks to a chat network directly. Everything it needs from the
//! host platform is expressed through two traits:
//!
//! - [`Destinations`] - enumerate the communities the bot belongs to, resolve each
//!   community's default delivery channel, probe send permission and deliver text.
//! - [`RoleDirectory`] - look up roles and members and mutate a member's role set.
//!
//! Permission is a capability probe (`can_send`, `can_manage_roles`) rather than
//! a platform specific type check, so a destination that "may or may not support
//! send" is modelled uniformly across backends.
//!
//! [`memory::MemoryDirectory`] implements both traits over an in-memory,
//! JSON-seeded community list. It backs the operator console and the test suite.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod memory;

pub use memory::{DirectorySeed, MemoryDirectory};

pub type GroupId = String;
pub type ChannelId = String;
pub type MemberId = String;
pub type RoleId = String;

/// The bot's own presence inside one destination group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub group_id: GroupId,
    pub member_id: MemberId,
}

/// One community the process currently belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationGroup {
    pub id: GroupId,
    pub name: String,
    /// The bot's own membership, used for permission probes.
    pub me: Membership,
}

/// A concrete delivery point (room/channel) inside a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub group_id: GroupId,
    pub channel_id: ChannelId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub name: String,
    #[serde(default)]
    pub bot: bool,
    /// Role ids currently held.
    #[serde(default)]
    pub roles: Vec<RoleId>,
}

impl Member {
    pub fn has_role(&self, role: &Role) -> bool {
        self.roles.iter().any(|r| r == &role.id)
    }
}

/// Failures reported by the platform for a single operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Target group, channel, member or role disappeared.
    #[error("not found: {0}")]
    NotFound(String),

    /// The platform refused the operation for lack of permission.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Platform-level rate limiting kicked in.
    #[error("rate limited (retry after {retry_after_ms} ms)")]
    RateLimited { retry_after_ms: u64 },

    /// Any other network or backend failure.
    #[error("transport failure: {0}")]
    Io(String),
}

/// Destination enumeration and delivery, as consumed by the announcer.
#[async_trait]
pub trait Destinations: Send + Sync {
    /// Snapshot of the ids of every group the process is currently a member of.
    fn group_ids(&self) -> Vec<GroupId>;

    /// Re-resolve a group by id. `None` when the group vanished since enumeration.
    fn group(&self, id: &str) -> Option<DestinationGroup>;

    /// The group's default delivery target, if it still has one.
    fn default_target(&self, group: &DestinationGroup) -> Option<Target>;

    /// Whether `membership` may post messages in `target`.
    fn can_send(&self, membership: &Membership, target: &Target) -> bool;

    /// Deliver `text` to `target`. May suspend on the network.
    async fn send_message(&self, target: &Target, text: &str) -> Result<(), TransportError>;
}

/// Role lookup and mutation used by the admin commands.
#[async_trait]
pub trait RoleDirectory: Send + Sync {
    /// All roles defined in a group, in platform order.
    fn roles(&self, group: &str) -> Vec<Role>;

    fn member(&self, group: &str, member: &str) -> Option<Member>;

    /// Whether the bot itself may manage roles from `channel` in `group`.
    fn can_manage_roles(&self, group: &str, channel: Option<&str>) -> bool;

    async fn add_role(&self, group: &str, member: &str, role: &Role) -> Result<(), TransportError>;

    async fn remove_role(
        &self,
        group: &str,
        member: &str,
        role: &Role,
    ) -> Result<(), TransportError>;
}
