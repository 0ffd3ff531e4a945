mod common;

use std::sync::Arc;

use herald::admin::SettingsStore;
use herald::platform::{DirectorySeed, MemoryDirectory, Role, RoleDirectory};
use herald::server::{ConsoleReply, HeraldServer};
use tempfile::TempDir;

use common::{directory, test_config};

async fn server(dir: Arc<MemoryDirectory>) -> (HeraldServer, TempDir) {
    let data = TempDir::new().unwrap();
    let server = HeraldServer::with_directory(test_config(data.path()), dir)
        .await
        .unwrap();
    (server, data)
}

async fn say(server: &mut HeraldServer, line: &str) -> String {
    match server.handle_line(line).await.unwrap() {
        ConsoleReply::Text(text) => text,
        other => panic!("expected a reply to {:?}, got {:?}", line, other),
    }
}

fn staff(group: &str) -> Role {
    Role {
        id: format!("{}-staff", group),
        name: "Staff".into(),
    }
}

#[tokio::test]
async fn announce_is_rejected_while_one_is_pending() {
    let (mut server, _data) = server(directory(&[("a", true)])).await;
    assert_eq!(say(&mut server, "!announce hello").await, "Announcement queued.");
    assert_eq!(
        say(&mut server, "!announce world").await,
        "Already announcing, wait until complete to issue a new announcement."
    );
}

#[tokio::test]
async fn empty_announcement_is_refused() {
    let (mut server, _data) = server(directory(&[("a", true)])).await;
    assert_eq!(
        say(&mut server, "!announce").await,
        "Usage: announce <message>"
    );
    assert!(!server.admin().mailbox().is_pending());
}

#[tokio::test]
async fn role_commands_require_a_manager() {
    let (mut server, _data) = server(directory(&[("a", true)])).await;
    assert_eq!(say(&mut server, "/as a alice").await, "Acting as Alice in a");
    assert_eq!(
        say(&mut server, "!addrole Staff").await,
        "You do not have permission to use that command."
    );
    assert_eq!(
        say(&mut server, "!adminset selfroles Staff").await,
        "You do not have permission to use that command."
    );
}

#[tokio::test]
async fn owner_adds_and_removes_roles() {
    let dir = directory(&[("a", true)]);
    let (mut server, _data) = server(dir.clone()).await;
    say(&mut server, "/as a owner").await;

    assert_eq!(
        say(&mut server, "!addrole staff alice").await,
        "Added role Staff to Alice"
    );
    assert!(dir.member("a", "alice").unwrap().has_role(&staff("a")));

    assert_eq!(say(&mut server, "!addrole Nope alice").await, "That role cannot be found.");
    assert_eq!(
        say(&mut server, "!addrole Staff ghost").await,
        "That member cannot be found."
    );

    assert_eq!(
        say(&mut server, "!removerole Staff alice").await,
        "Role successfully removed."
    );
    assert!(!dir.member("a", "alice").unwrap().has_role(&staff("a")));
    assert_eq!(
        say(&mut server, "!removerole Staff alice").await,
        "User does not have that role."
    );
    assert_eq!(say(&mut server, "!removerole Nope alice").await, "Role not found.");

    // No member argument means the caller.
    assert_eq!(say(&mut server, "!addrole Staff").await, "Added role Staff to Owner");
}

#[tokio::test]
async fn addrole_without_manage_roles_permission() {
    let dir = Arc::new(MemoryDirectory::new(DirectorySeed::sample()));
    let (mut server, _data) = server(dir).await;
    say(&mut server, "/as read-only owner").await;
    assert_eq!(say(&mut server, "!addrole News alice").await, "I don't have manage_roles.");
}

#[tokio::test]
async fn role_commands_refuse_private_messages() {
    let (mut server, _data) = server(directory(&[("a", true)])).await;
    say(&mut server, "/as - alice").await;
    let refusal = "That command cannot be used in private messages.";
    assert_eq!(say(&mut server, "!addrole Staff").await, refusal);
    assert_eq!(say(&mut server, "!selfrole Staff").await, refusal);
    assert_eq!(say(&mut server, "!adminset selfroles Staff").await, refusal);
}

#[tokio::test]
async fn self_roles_are_configured_and_persisted() {
    let (mut server, data) = server(directory(&[("a", true), ("b", true)])).await;
    say(&mut server, "/as a owner").await;

    assert_eq!(
        say(&mut server, "!adminset").await,
        "Usage: adminset selfroles <Role1,Role2,...>"
    );
    assert_eq!(
        say(&mut server, "!adminset selfroles Staff, Nope").await,
        "These roles were not found: Nope\n\nPlease try again."
    );
    let store = SettingsStore::open(data.path()).await.unwrap();
    assert!(store.self_roles("a").is_none());

    assert_eq!(
        say(&mut server, "!adminset selfroles staff").await,
        "Self roles successfully set to: Staff"
    );
    let raw = std::fs::read_to_string(data.path().join("admin").join("settings.json")).unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(json["ROLES"]["a"], serde_json::json!(["Staff"]));
}

#[tokio::test]
async fn members_pick_their_own_roles() {
    let dir = directory(&[("a", true), ("b", true)]);
    let (mut server, _data) = server(dir.clone()).await;
    say(&mut server, "/as a owner").await;
    say(&mut server, "!adminset selfroles Staff").await;

    say(&mut server, "/as a alice").await;
    assert_eq!(say(&mut server, "!selfrole STAFF").await, "Role added.");
    assert!(dir.member("a", "alice").unwrap().has_role(&staff("a")));
    assert_eq!(
        say(&mut server, "!selfrole Moderator").await,
        "That role isn't user settable."
    );

    say(&mut server, "/as b alice").await;
    assert_eq!(
        say(&mut server, "!selfrole Staff").await,
        "I have no user settable roles for this server."
    );
}

#[tokio::test]
async fn selfrole_without_role_permission() {
    let dir = Arc::new(MemoryDirectory::new(DirectorySeed::sample()));
    let (mut server, _data) = server(dir).await;
    say(&mut server, "/as read-only owner").await;
    say(&mut server, "!adminset selfroles News").await;
    say(&mut server, "/as read-only alice").await;
    assert_eq!(
        say(&mut server, "!selfrole news").await,
        "I don't have permissions to do that."
    );
}

#[tokio::test]
async fn say_and_console_housekeeping() {
    let (mut server, _data) = server(directory(&[("a", true)])).await;
    assert_eq!(say(&mut server, "!say hello there").await, "hello there");
    assert_eq!(server.handle_line("just chatting").await.unwrap(), ConsoleReply::Silent);
    assert_eq!(server.handle_line("   ").await.unwrap(), ConsoleReply::Silent);
    assert_eq!(say(&mut server, "!frobnicate").await, "Unknown command: frobnicate");
    assert_eq!(
        say(&mut server, "/as a nobody").await,
        "nobody is not a member of a"
    );
    assert!(say(&mut server, "/status").await.contains("1 groups"));
    assert_eq!(server.handle_line("/quit").await.unwrap(), ConsoleReply::Quit);
}
