mod common;

use common::{completed, orchestrator, write_files, Scripted};
use organizer_core::error::{OrganizeError, UndoError};
use organizer_core::{organize, plan, CategoryGrouping, ResultCache, UndoManager};
use std::fs;
use std::sync::Arc;

#[tokio::test]
async fn organize_then_undo_round_trips() {
    let temp = tempfile::tempdir().unwrap();
    write_files(temp.path(), &["report.pdf", "photo.jpg"]);
    let local = Arc::new(Scripted::new(
        "local",
        &[("report.pdf", "Documents"), ("photo.jpg", "Images")],
    ));
    let orch = orchestrator(local, None, ResultCache::in_memory(), &["Documents", "Images"]);
    completed(orch.browse(temp.path()).await.unwrap()).await;
    let base = orch.current_directory().await.unwrap();

    let report = organize(&orch.full_grouping().await, &base, orch.remote_active().await).unwrap();
    assert!(report.failures.is_empty());
    let tx = report.transaction.expect("files moved");
    assert_eq!(tx.moves.len(), 2);
    assert_eq!(tx.created_folders.len(), 2);
    assert!(base.join("Documents").join("report.pdf").is_file());
    assert!(base.join("Images").join("photo.jpg").is_file());
    assert!(!base.join("report.pdf").exists());

    let mut undo = UndoManager::new();
    undo.push(tx).await.unwrap();

    // The organized files no longer sit at the top level.
    let summary = completed(orch.rescan().await.unwrap()).await;
    assert_eq!(summary.files, 0);

    let restored = undo.undo().await.unwrap();
    assert_eq!(restored.restored.len(), 2);
    assert!(restored.failures.is_empty());
    assert_eq!(restored.removed_folders.len(), 2);
    assert!(base.join("report.pdf").is_file());
    assert!(base.join("photo.jpg").is_file());
    assert!(!base.join("Documents").exists());
    assert!(!base.join("Images").exists());
    assert_eq!(undo.depth(), 0);
    assert!(matches!(undo.undo().await, Err(UndoError::NoHistory)));
}

#[tokio::test]
async fn existing_folder_is_reused_and_kept() {
    let temp = tempfile::tempdir().unwrap();
    let base = temp.path();
    write_files(base, &["report.pdf"]);
    fs::create_dir(base.join("Documents")).unwrap();
    fs::write(base.join("Documents").join("report.pdf"), "older").unwrap();

    let mut g = CategoryGrouping::new();
    g.insert("Documents", "API Disabled", "report.pdf");
    let report = organize(&g, base, false).unwrap();
    let tx = report.transaction.unwrap();

    assert!(tx.created_folders.is_empty());
    assert_eq!(tx.moves[0].destination, base.join("Documents").join("report_1.pdf"));
    assert_eq!(
        fs::read_to_string(base.join("Documents").join("report.pdf")).unwrap(),
        "older"
    );

    let mut undo = UndoManager::new();
    undo.push(tx).await.unwrap();
    let restored = undo.undo().await.unwrap();
    assert_eq!(restored.restored, vec![base.join("report.pdf")]);
    assert!(base.join("Documents").join("report.pdf").exists());
    assert!(!base.join("Documents").join("report_1.pdf").exists());
}

#[tokio::test]
async fn remote_label_names_the_folder_when_active() {
    let temp = tempfile::tempdir().unwrap();
    let base = temp.path();
    write_files(base, &["inv.pdf", "scan.pdf", "notes.txt"]);

    let mut g = CategoryGrouping::new();
    g.insert("Documents", "Invoices", "inv.pdf");
    g.insert("Documents", "API Error", "scan.pdf");
    g.insert("Documents", "Manual", "notes.txt");

    let planned = plan(&g, base, true);
    assert_eq!(planned.len(), 3);

    let report = organize(&g, base, true).unwrap();
    assert!(report.failures.is_empty());
    assert!(base.join("Invoices").join("inv.pdf").is_file());
    assert!(base.join("Documents").join("scan.pdf").is_file());
    assert!(base.join("Documents").join("notes.txt").is_file());
}

#[tokio::test]
async fn failures_are_collected_and_the_batch_continues() {
    let temp = tempfile::tempdir().unwrap();
    let base = temp.path();
    write_files(base, &["kept.txt"]);

    let mut g = CategoryGrouping::new();
    g.insert("Documents", "API Disabled", "vanished.txt");
    g.insert("Documents", "API Disabled", "kept.txt");
    g.insert("..", "API Disabled", "escape.txt");

    let report = organize(&g, base, false).unwrap();
    assert_eq!(report.moved(), 1);
    assert_eq!(report.failures.len(), 2);
    assert!(base.join("Documents").join("kept.txt").is_file());
    assert!(report
        .failures
        .iter()
        .any(|f| f.source == base.join("escape.txt") && f.destination.is_none()));
}

#[tokio::test]
async fn nothing_moved_leaves_no_folders_behind() {
    let temp = tempfile::tempdir().unwrap();
    let mut g = CategoryGrouping::new();
    g.insert("Documents", "API Disabled", "ghost.pdf");

    let report = organize(&g, temp.path(), false).unwrap();
    assert!(report.transaction.is_none());
    assert_eq!(report.failures.len(), 1);
    assert!(!temp.path().join("Documents").exists());
}

#[cfg(unix)]
#[tokio::test]
async fn read_only_base_is_rejected_up_front() {
    use std::os::unix::fs::PermissionsExt;

    let temp = tempfile::tempdir().unwrap();
    let base = temp.path().join("locked");
    fs::create_dir(&base).unwrap();
    write_files(&base, &["a.txt"]);
    fs::set_permissions(&base, fs::Permissions::from_mode(0o555)).unwrap();

    // Privileged users can write anyway; the probe is what decides.
    if tempfile::tempfile_in(&base).is_err() {
        let mut g = CategoryGrouping::new();
        g.insert("Documents", "API Disabled", "a.txt");
        let err = organize(&g, &base, false).unwrap_err();
        assert!(matches!(err, OrganizeError::NotWritable { .. }));
        assert!(base.join("a.txt").exists());
    }
    fs::set_permissions(&base, fs::Permissions::from_mode(0o755)).unwrap();
}

#[tokio::test]
async fn journal_keeps_history_across_managers() {
    let temp = tempfile::tempdir().unwrap();
    let base = temp.path().join("data");
    fs::create_dir(&base).unwrap();
    write_files(&base, &["a.txt", "b.txt"]);
    let db = temp.path().join("history.db");
    let url = db.to_string_lossy().into_owned();

    let mut first = CategoryGrouping::new();
    first.insert("Documents", "API Disabled", "a.txt");
    let mut second = CategoryGrouping::new();
    second.insert("Images", "API Disabled", "b.txt");

    {
        let journal = storage::Journal::open(&url).await.unwrap();
        let mut undo = UndoManager::with_journal(journal).await.unwrap();
        for g in [&first, &second] {
            let tx = organize(g, &base, false).unwrap().transaction.unwrap();
            undo.push(tx).await.unwrap();
        }
        assert_eq!(undo.depth(), 2);
    }

    let journal = storage::Journal::open(&url).await.unwrap();
    let mut undo = UndoManager::with_journal(journal.clone()).await.unwrap();
    assert_eq!(undo.depth(), 2);

    // Most recent first.
    let report = undo.undo().await.unwrap();
    assert_eq!(report.restored, vec![base.join("b.txt")]);
    assert!(base.join("Documents").join("a.txt").exists());
    assert_eq!(journal.len().await.unwrap(), 1);

    undo.undo().await.unwrap();
    assert!(base.join("a.txt").exists());
    assert_eq!(journal.len().await.unwrap(), 0);
}
