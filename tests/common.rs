//! Test utilities & fixtures.
//! Builds small in-memory community worlds and temp-dir backed configs.
#![allow(dead_code)] // each test binary uses a different subset

use std::sync::Arc;
use std::time::Duration;

use herald::admin::{Caller, CommandContext};
use herald::config::{AnnounceConfig, BotConfig, Config, LoggingConfig, StorageConfig};
use herald::platform::memory::{ChannelSeed, GroupSeed};
use herald::platform::{DirectorySeed, Member, MemoryDirectory, Role};

/// One group per entry: `(id, bot may send in its default channel)`.
pub fn world(groups: &[(&str, bool)]) -> DirectorySeed {
    DirectorySeed {
        bot_id: "herald".into(),
        groups: groups.iter().map(|(id, send)| group(id, *send)).collect(),
    }
}

pub fn group(id: &str, send: bool) -> GroupSeed {
    GroupSeed {
        id: id.to_string(),
        name: format!("Group {}", id),
        default_channel: Some("general".into()),
        channels: vec![ChannelSeed {
            id: "general".into(),
            name: "general".into(),
            bot_can_send: send,
            bot_can_manage_roles: true,
        }],
        roles: vec![Role {
            id: format!("{}-staff", id),
            name: "Staff".into(),
        }],
        members: vec![
            Member {
                id: "owner".into(),
                name: "Owner".into(),
                bot: false,
                roles: vec![],
            },
            Member {
                id: "alice".into(),
                name: "Alice".into(),
                bot: false,
                roles: vec![],
            },
        ],
    }
}

pub fn directory(groups: &[(&str, bool)]) -> Arc<MemoryDirectory> {
    Arc::new(MemoryDirectory::new(world(groups)))
}

pub fn fast_announce() -> AnnounceConfig {
    AnnounceConfig::with_interval_ms(5)
}

/// Config rooted at `data_dir`, with fast announcer pacing.
pub fn test_config(data_dir: &std::path::Path) -> Config {
    Config {
        bot: BotConfig {
            name: "Herald Test".into(),
            owner: "owner".into(),
            command_prefix: "!".into(),
        },
        announce: fast_announce(),
        storage: StorageConfig {
            data_dir: data_dir.to_string_lossy().into_owned(),
            directory_file: "directory.json".into(),
        },
        logging: LoggingConfig {
            level: "error".into(),
            file: None,
        },
    }
}

/// Poll `cond` every few ms until it holds or `within` elapses.
pub async fn eventually(within: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + within;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    cond()
}

/// The bot owner speaking in a private message.
pub fn owner_context() -> CommandContext {
    CommandContext {
        group: None,
        channel: None,
        caller: Caller {
            id: "owner".into(),
            name: "Owner".into(),
            is_owner: true,
            can_manage_roles: true,
            bot: false,
        },
    }
}
