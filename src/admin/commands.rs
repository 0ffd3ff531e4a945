//! Admin command parsing.
//!
//! Commands are recognised only when the line starts with the configured prefix
//! (`!` by default). The first word selects the command, case-insensitively.
//! Role arguments may be quoted to include spaces: `!addrole "Game Night" alice`.
use log::trace;
use thiserror::Error;

use super::settings::SettingsError;
use crate::validation::validate_role_name;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `announce <message>` - queue a message for every community.
    Announce { message: String },
    /// `addrole <role> [member]`
    AddRole {
        role: String,
        member: Option<String>,
    },
    /// `removerole <role> [member]`
    RemoveRole {
        role: String,
        member: Option<String>,
    },
    /// `adminset` with no subcommand.
    AdminSet,
    /// `adminset selfroles <A,B,C>`
    AdminSetSelfRoles { list: String },
    /// `selfrole <role>`
    SelfRole { role: String },
    /// `say <text>`
    Say { text: String },
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("That command cannot be used in private messages.")]
    NoPrivateMessage,

    #[error("You do not have permission to use that command.")]
    CheckFailure,

    #[error("Unknown command: {0}")]
    Unknown(String),

    #[error("Usage: {0}")]
    Usage(&'static str),

    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),
}

pub const USAGE_ANNOUNCE: &str = "announce <message>";
pub const USAGE_ADDROLE: &str = "addrole <role> [member]";
pub const USAGE_REMOVEROLE: &str = "removerole <role> [member]";
pub const USAGE_SELFROLES: &str = "adminset selfroles <Role1,Role2,...>";
pub const USAGE_SELFROLE: &str = "selfrole <role>";
pub const USAGE_SAY: &str = "say <text>";

/// Parse one input line. `Ok(None)` when the line is not a command at all.
pub fn parse_command(prefix: &str, line: &str) -> Result<Option<Command>, CommandError> {
    let trimmed = line.trim();
    let Some(body) = trimmed.strip_prefix(prefix) else {
        return Ok(None);
    };
    let (name, rest) = split_word(body);
    if name.is_empty() {
        return Ok(None);
    }
    trace!("Parsed command '{}' from '{}'", name, line);

    let cmd = match name.to_ascii_lowercase().as_str() {
        "announce" => Command::Announce {
            message: required(rest, USAGE_ANNOUNCE)?,
        },
        "addrole" => {
            let (role, member) = role_and_member(rest, USAGE_ADDROLE)?;
            Command::AddRole { role, member }
        }
        "removerole" => {
            let (role, member) = role_and_member(rest, USAGE_REMOVEROLE)?;
            Command::RemoveRole { role, member }
        }
        "adminset" => {
            let (sub, args) = split_word(rest);
            match sub.to_ascii_lowercase().as_str() {
                "" => Command::AdminSet,
                "selfroles" => Command::AdminSetSelfRoles {
                    list: required(args, USAGE_SELFROLES)?,
                },
                _ => return Err(CommandError::Unknown(format!("adminset {}", sub))),
            }
        }
        "selfrole" => Command::SelfRole {
            role: required(rest, USAGE_SELFROLE)?,
        },
        "say" => Command::Say {
            text: required(rest, USAGE_SAY)?,
        },
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Some(cmd))
}

fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.find(char::is_whitespace) {
        Some(i) => (&s[..i], s[i..].trim_start()),
        None => (s, ""),
    }
}

fn required(rest: &str, usage: &'static str) -> Result<String, CommandError> {
    let rest = rest.trim();
    if rest.is_empty() {
        Err(CommandError::Usage(usage))
    } else {
        Ok(rest.to_string())
    }
}

/// First argument (optionally double-quoted) plus an optional member argument.
fn role_and_member(
    rest: &str,
    usage: &'static str,
) -> Result<(String, Option<String>), CommandError> {
    let rest = rest.trim();
    let (role, tail) = if let Some(quoted) = rest.strip_prefix('"') {
        match quoted.find('"') {
            Some(end) => (&quoted[..end], quoted[end + 1..].trim()),
            None => return Err(CommandError::Usage(usage)),
        }
    } else {
        split_word(rest)
    };
    let role = validate_role_name(role).map_err(|_| CommandError::Usage(usage))?;
    let member = match tail.trim() {
        "" => None,
        m => Some(m.to_string()),
    };
    Ok((role.to_string(), member))
}
