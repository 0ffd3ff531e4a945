//! Role lookup helpers.
//!
//! Role names are matched case-insensitively against the roles a group defines.
//! Self-service role lists are stored by name (see [`super::settings`]) and
//! resolved back to roles at use time, so a renamed role silently drops out.

use log::debug;

use crate::logutil::escape_log;
use crate::platform::Role;

/// Find the role whose name equals `name`, ignoring case.
pub fn role_from_string<'a>(roles: &'a [Role], name: &str) -> Option<&'a Role> {
    let wanted = name.trim().to_lowercase();
    let found = roles.iter().find(|r| r.name.to_lowercase() == wanted);
    match found {
        Some(role) => debug!("Role {} found from rolename {}", role.name, escape_log(name)),
        None => debug!("Role not found for rolename {}", escape_log(name)),
    }
    found
}

/// Split a comma separated list of role names. Entries are trimmed; empties dropped.
pub fn parse_role_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Resolve each name in `names` against `roles`.
///
/// Returns the distinct canonical role names that matched (first occurrence
/// order) and the names that did not match anything.
pub fn resolve_role_names(roles: &[Role], names: &[String]) -> (Vec<String>, Vec<String>) {
    let mut found: Vec<String> = Vec::new();
    let mut missing = Vec::new();
    for name in names {
        match role_from_string(roles, name) {
            Some(role) => {
                if !found.contains(&role.name) {
                    found.push(role.name.clone());
                }
            }
            None => missing.push(name.clone()),
        }
    }
    (found, missing)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role(id: &str, name: &str) -> Role {
        Role {
            id: id.into(),
            name: name.into(),
        }
    }

    fn roles() -> Vec<Role> {
        vec![role("1", "Staff"), role("2", "Game Night")]
    }

    #[test]
    fn lookup_ignores_case() {
        let roles = roles();
        assert_eq!(role_from_string(&roles, "staff").map(|r| r.id.as_str()), Some("1"));
        assert_eq!(role_from_string(&roles, "GAME NIGHT").map(|r| r.id.as_str()), Some("2"));
        assert!(role_from_string(&roles, "Admin").is_none());
    }

    #[test]
    fn role_list_parsing() {
        assert_eq!(parse_role_list("Admin, Staff ,, Mod"), vec!["Admin", "Staff", "Mod"]);
        assert!(parse_role_list(" , ").is_empty());
    }

    #[test]
    fn resolve_dedupes_and_reports_missing() {
        let roles = roles();
        let names = parse_role_list("staff,STAFF,Nope,game night");
        let (found, missing) = resolve_role_names(&roles, &names);
        assert_eq!(found, vec!["Staff", "Game Night"]);
        assert_eq!(missing, vec!["Nope"]);
    }
}
