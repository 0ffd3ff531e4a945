//! In-memory community directory.
//!
//! The directory is seeded from a JSON document (see [`DirectorySeed`]) and keeps
//! all state behind a single mutex. Mutators exist so tests and the operator
//! console can reshape the world between fan-out passes: drop a group, revoke a
//! send grant, make a channel fail.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, trace};
use serde::{Deserialize, Serialize};

use super::{
    DestinationGroup, Destinations, GroupId, Member, Membership, Role, RoleDirectory, Target,
    TransportError,
};

fn default_bot_id() -> String {
    "herald".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectorySeed {
    /// Member id the bot uses in every group.
    #[serde(default = "default_bot_id")]
    pub bot_id: String,
    #[serde(default)]
    pub groups: Vec<GroupSeed>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupSeed {
    pub id: GroupId,
    pub name: String,
    /// Channel id used for announcements. `None` means the group has no default channel.
    #[serde(default)]
    pub default_channel: Option<String>,
    #[serde(default)]
    pub channels: Vec<ChannelSeed>,
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub members: Vec<Member>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelSeed {
    pub id: String,
    pub name: String,
    #[serde(default = "default_true")]
    pub bot_can_send: bool,
    #[serde(default)]
    pub bot_can_manage_roles: bool,
}

impl DirectorySeed {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read directory file {}: {}", path.display(), e))?;
        serde_json::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse directory file {}: {}", path.display(), e))
    }

    /// A three-community world used by `herald init`.
    pub fn sample() -> Self {
        let channel = |id: &str, send: bool| ChannelSeed {
            id: id.to_string(),
            name: id.to_string(),
            bot_can_send: send,
            bot_can_manage_roles: send,
        };
        let role = |id: &str, name: &str| Role {
            id: id.to_string(),
            name: name.to_string(),
        };
        let member = |id: &str, name: &str| Member {
            id: id.to_string(),
            name: name.to_string(),
            bot: false,
            roles: vec![],
        };
        let roles = vec![
            role("r-staff", "Staff"),
            role("r-mod", "Mod"),
            role("r-news", "News"),
        ];
        let members = vec![member("owner", "Owner"), member("alice", "Alice")];
        DirectorySeed {
            bot_id: default_bot_id(),
            groups: vec![
                GroupSeed {
                    id: "rust-hub".into(),
                    name: "Rust Hub".into(),
                    default_channel: Some("general".into()),
                    channels: vec![channel("general", true)],
                    roles: roles.clone(),
                    members: members.clone(),
                },
                GroupSeed {
                    id: "mesh-club".into(),
                    name: "Mesh Club".into(),
                    default_channel: Some("lobby".into()),
                    channels: vec![channel("lobby", true)],
                    roles: roles.clone(),
                    members: members.clone(),
                },
                GroupSeed {
                    id: "read-only".into(),
                    name: "Read Only".into(),
                    default_channel: Some("news".into()),
                    channels: vec![channel("news", false)],
                    roles,
                    members,
                },
            ],
        }
    }
}

/// A message recorded by [`MemoryDirectory::send_message`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub group_id: GroupId,
    pub channel_id: String,
    pub text: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct DirectoryState {
    groups: Vec<GroupSeed>,
    failing: HashSet<GroupId>,
    panicking: HashSet<GroupId>,
    sent: Vec<SentMessage>,
    send_latency: Option<Duration>,
}

impl DirectoryState {
    fn group(&self, id: &str) -> Option<&GroupSeed> {
        self.groups.iter().find(|g| g.id == id)
    }

    fn group_mut(&mut self, id: &str) -> Option<&mut GroupSeed> {
        self.groups.iter_mut().find(|g| g.id == id)
    }
}

pub struct MemoryDirectory {
    bot_id: String,
    state: Mutex<DirectoryState>,
}

impl MemoryDirectory {
    pub fn new(seed: DirectorySeed) -> Self {
        Self {
            bot_id: seed.bot_id,
            state: Mutex::new(DirectoryState {
                groups: seed.groups,
                ..Default::default()
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, DirectoryState> {
        // Every mutation leaves the state consistent, so a poisoned lock is still usable.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_group(&self, group: GroupSeed) {
        self.state().groups.push(group);
    }

    /// Remove a group (the bot left or was kicked). Returns true if it existed.
    pub fn remove_group(&self, id: &str) -> bool {
        let mut state = self.state();
        let before = state.groups.len();
        state.groups.retain(|g| g.id != id);
        state.groups.len() != before
    }

    pub fn set_default_channel(&self, group: &str, channel: Option<&str>) {
        if let Some(g) = self.state().group_mut(group) {
            g.default_channel = channel.map(str::to_string);
        }
    }

    pub fn set_send_permission(&self, group: &str, channel: &str, allowed: bool) {
        if let Some(g) = self.state().group_mut(group) {
            if let Some(c) = g.channels.iter_mut().find(|c| c.id == channel) {
                c.bot_can_send = allowed;
            }
        }
    }

    /// Make every send into `group` fail with a transport error.
    pub fn fail_sends_to(&self, group: &str) {
        self.state().failing.insert(group.to_string());
    }

    /// Make every send into `group` panic. Exercises per-delivery crash isolation.
    pub fn panic_on_send_to(&self, group: &str) {
        self.state().panicking.insert(group.to_string());
    }

    pub fn set_send_latency(&self, latency: Option<Duration>) {
        self.state().send_latency = latency;
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.state().sent.clone()
    }

    pub fn group_count(&self) -> usize {
        self.state().groups.len()
    }
}

#[async_trait]
impl Destinations for MemoryDirectory {
    fn group_ids(&self) -> Vec<GroupId> {
        self.state().groups.iter().map(|g| g.id.clone()).collect()
    }

    fn group(&self, id: &str) -> Option<DestinationGroup> {
        self.state().group(id).map(|g| DestinationGroup {
            id: g.id.clone(),
            name: g.name.clone(),
            me: Membership {
                group_id: g.id.clone(),
                member_id: self.bot_id.clone(),
            },
        })
    }

    fn default_target(&self, group: &DestinationGroup) -> Option<Target> {
        let state = self.state();
        let g = state.group(&group.id)?;
        let channel_id = g.default_channel.as_deref()?;
        let channel = g.channels.iter().find(|c| c.id == channel_id)?;
        Some(Target {
            group_id: g.id.clone(),
            channel_id: channel.id.clone(),
            name: channel.name.clone(),
        })
    }

    fn can_send(&self, membership: &Membership, target: &Target) -> bool {
        if membership.member_id != self.bot_id || membership.group_id != target.group_id {
            return false;
        }
        self.state()
            .group(&target.group_id)
            .and_then(|g| g.channels.iter().find(|c| c.id == target.channel_id))
            .map(|c| c.bot_can_send)
            .unwrap_or(false)
    }

    async fn send_message(&self, target: &Target, text: &str) -> Result<(), TransportError> {
        let latency = self.state().send_latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        let should_panic = self.state().panicking.contains(&target.group_id);
        if should_panic {
            panic!("simulated crash while sending to {}", target.group_id);
        }
        let mut state = self.state();
        if state.failing.contains(&target.group_id) {
            return Err(TransportError::Io(format!(
                "simulated failure for {}",
                target.group_id
            )));
        }
        let exists = state
            .group(&target.group_id)
            .map(|g| g.channels.iter().any(|c| c.id == target.channel_id))
            .unwrap_or(false);
        if !exists {
            return Err(TransportError::NotFound(format!(
                "{}/{}",
                target.group_id, target.channel_id
            )));
        }
        trace!("memory send to {}/{}", target.group_id, target.channel_id);
        state.sent.push(SentMessage {
            group_id: target.group_id.clone(),
            channel_id: target.channel_id.clone(),
            text: text.to_string(),
            at: Utc::now(),
        });
        Ok(())
    }
}

#[async_trait]
impl RoleDirectory for MemoryDirectory {
    fn roles(&self, group: &str) -> Vec<Role> {
        self.state()
            .group(group)
            .map(|g| g.roles.clone())
            .unwrap_or_default()
    }

    fn member(&self, group: &str, member: &str) -> Option<Member> {
        self.state()
            .group(group)?
            .members
            .iter()
            .find(|m| m.id == member)
            .cloned()
    }

    fn can_manage_roles(&self, group: &str, channel: Option<&str>) -> bool {
        let state = self.state();
        let Some(g) = state.group(group) else {
            return false;
        };
        match channel {
            Some(channel) => g
                .channels
                .iter()
                .find(|c| c.id == channel)
                .map(|c| c.bot_can_manage_roles)
                .unwrap_or(false),
            None => g.channels.iter().any(|c| c.bot_can_manage_roles),
        }
    }

    async fn add_role(&self, group: &str, member: &str, role: &Role) -> Result<(), TransportError> {
        let mut state = self.state();
        let g = state
            .group_mut(group)
            .ok_or_else(|| TransportError::NotFound(group.to_string()))?;
        if !g.channels.iter().any(|c| c.bot_can_manage_roles) {
            return Err(TransportError::Forbidden("manage_roles".to_string()));
        }
        let m = g
            .members
            .iter_mut()
            .find(|m| m.id == member)
            .ok_or_else(|| TransportError::NotFound(member.to_string()))?;
        if !m.roles.contains(&role.id) {
            m.roles.push(role.id.clone());
        }
        debug!("memory add_role {} -> {} in {}", role.name, member, group);
        Ok(())
    }

    async fn remove_role(
        &self,
        group: &str,
        member: &str,
        role: &Role,
    ) -> Result<(), TransportError> {
        let mut state = self.state();
        let g = state
            .group_mut(group)
            .ok_or_else(|| TransportError::NotFound(group.to_string()))?;
        if !g.channels.iter().any(|c| c.bot_can_manage_roles) {
            return Err(TransportError::Forbidden("manage_roles".to_string()));
        }
        let m = g
            .members
            .iter_mut()
            .find(|m| m.id == member)
            .ok_or_else(|| TransportError::NotFound(member.to_string()))?;
        m.roles.retain(|r| r != &role.id);
        debug!("memory remove_role {} -> {} in {}", role.name, member, group);
        Ok(())
    }
}
