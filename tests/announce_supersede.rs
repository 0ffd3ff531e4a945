mod common;

use std::sync::Arc;
use std::time::Duration;

use herald::admin::service::MSG_SUPERSEDED;
use herald::admin::{
    Admin, AdminDeps, Announcer, Command, DeliveryOutcome, Mailbox, Registry, SubmitError,
    ADMIN_REGISTRATION,
};
use herald::server::{ConsoleReply, HeraldServer};
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use common::{directory, eventually, fast_announce, test_config};

fn deps(dir: &Arc<herald::platform::MemoryDirectory>, data: &TempDir) -> AdminDeps {
    AdminDeps {
        destinations: dir.clone(),
        roles: dir.clone(),
        data_dir: data.path().to_path_buf(),
        announce: fast_announce(),
        reports: None,
    }
}

#[tokio::test]
async fn second_setup_stops_first_announcer() {
    let data = TempDir::new().unwrap();
    let dir = directory(&[("a", true), ("b", true)]);
    let registry = Registry::new();

    let first = Admin::setup(&registry, deps(&dir, &data)).await.unwrap();
    assert!(registry.is_current(first.registration()));
    let second = Admin::setup(&registry, deps(&dir, &data)).await.unwrap();

    assert!(first.registration().is_superseded());
    assert!(!registry.is_current(first.registration()));
    assert!(registry.is_current(second.registration()));
    assert!(second.registration().generation() > first.registration().generation());

    // Within roughly one poll interval the old loop is gone.
    assert!(eventually(Duration::from_millis(500), || first.announcer_finished()).await);
    assert!(!second.announcer_finished());

    // The stale instance refuses new announcements instead of parking them.
    assert_eq!(first.submit_announcement("late"), Err(SubmitError::Superseded));
    assert!(!first.mailbox().is_pending());
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(dir.sent().is_empty());

    // The new instance still delivers.
    second.submit_announcement("fresh").unwrap();
    assert!(eventually(Duration::from_secs(1), || dir.sent().len() == 2).await);
    assert!(dir.sent().iter().all(|m| m.text == "fresh"));

    first.wait_stopped().await;
    registry.cancel_all();
    second.wait_stopped().await;
}

#[tokio::test]
async fn unregister_stops_the_loop() {
    let data = TempDir::new().unwrap();
    let dir = directory(&[("a", true)]);
    let registry = Registry::new();
    let admin = Admin::setup(&registry, deps(&dir, &data)).await.unwrap();

    assert!(registry.unregister(ADMIN_REGISTRATION));
    assert!(registry.current(ADMIN_REGISTRATION).is_none());
    tokio::time::timeout(Duration::from_secs(1), admin.wait_stopped())
        .await
        .expect("announcer did not stop after unregister");
}

#[tokio::test]
async fn superseded_admin_replies_instead_of_queueing() {
    let data = TempDir::new().unwrap();
    let dir = directory(&[("a", true)]);
    let registry = Registry::new();
    let first = Admin::setup(&registry, deps(&dir, &data)).await.unwrap();
    assert!(registry.unregister(ADMIN_REGISTRATION));

    let owner = common::owner_context();
    let announce = Command::Announce {
        message: "too late".into(),
    };
    let reply = first.handle(&owner, announce).await.unwrap();
    assert_eq!(reply.as_deref(), Some(MSG_SUPERSEDED));
    first.wait_stopped().await;
    assert!(dir.sent().is_empty());
}

#[tokio::test]
async fn leftover_message_is_cleared_when_the_loop_stops() {
    let dir = directory(&[("a", true)]);
    let mailbox = Arc::new(Mailbox::new());
    let token = CancellationToken::new();
    token.cancel();
    mailbox.submit("stranded").unwrap();
    let handle = Announcer::new(mailbox.clone(), dir.clone(), fast_announce()).spawn(token);
    tokio::time::timeout(Duration::from_secs(1), handle.join())
        .await
        .unwrap()
        .unwrap();
    assert!(!mailbox.is_pending());
    assert!(dir.sent().is_empty());
}

#[tokio::test]
async fn cancellation_mid_pass_skips_remaining_groups() {
    let dir = directory(&[("a", true), ("b", true), ("c", true), ("d", true)]);
    dir.set_send_latency(Some(Duration::from_millis(50)));
    let mailbox = Arc::new(Mailbox::new());
    let (tx, mut rx) = mpsc::unbounded_channel();
    let token = CancellationToken::new();
    let handle = Announcer::new(mailbox.clone(), dir.clone(), fast_announce())
        .with_reports(tx)
        .spawn(token.clone());

    mailbox.submit("partial").unwrap();
    assert!(eventually(Duration::from_secs(1), || !dir.sent().is_empty()).await);
    token.cancel();

    let report = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .expect("report for the interrupted pass");
    assert!(report.interrupted);
    assert!(report.records.len() < 4);
    assert!(report.count(DeliveryOutcome::Delivered) >= 1);

    tokio::time::timeout(Duration::from_secs(1), handle.join())
        .await
        .unwrap()
        .unwrap();
    assert!(dir.sent().len() < 4);
    // The lease was released with the pass.
    assert!(!mailbox.is_pending());
}

#[tokio::test]
async fn console_reload_supersedes_admin() {
    let data = TempDir::new().unwrap();
    let dir = directory(&[("a", true), ("b", false)]);
    let mut server = HeraldServer::with_directory(test_config(data.path()), dir.clone())
        .await
        .unwrap();
    let mut reports = server.take_reports().unwrap();
    let before = server.admin().registration().generation();

    let reply = server.handle_line("/reload").await.unwrap();
    assert_eq!(reply, ConsoleReply::Text("Admin module reloaded.".into()));
    let after = server.admin().registration().generation();
    assert!(after > before);

    let reply = server.handle_line("!announce after reload").await.unwrap();
    assert_eq!(reply, ConsoleReply::Text("Announcement queued.".into()));
    let report = tokio::time::timeout(Duration::from_secs(1), reports.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        report.outcomes(),
        vec![DeliveryOutcome::Delivered, DeliveryOutcome::SkippedNoPermission]
    );
    // Only one announcer is alive, so the message went out exactly once.
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(dir.sent().len(), 1);
}
