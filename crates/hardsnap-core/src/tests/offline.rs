use chrono::{TimeZone, Utc};
use tempfile::tempdir;

use crate::commands::offline::{self, OfflineOutcome};
use crate::lock;
use crate::testutil::{make_config, make_snapshot, FakeTransfer};

#[test]
fn copies_the_latest_snapshot_only() {
    let dest = tempdir().unwrap();
    let media = tempdir().unwrap();
    let config = make_config(dest.path(), &[("home", "/src/home")]);
    let fs_dir = dest.path().join("home");
    std::fs::create_dir_all(&fs_dir).unwrap();
    make_snapshot(&fs_dir, Utc.with_ymd_and_hms(2026, 8, 28, 3, 0, 0).unwrap());
    let newest = make_snapshot(&fs_dir, Utc.with_ymd_and_hms(2026, 8, 30, 3, 0, 0).unwrap());

    let transfer = FakeTransfer::hardlinking();
    let report = offline::run(&config, media.path(), &transfer, &[]).unwrap();
    assert!(report.all_succeeded());
    assert!(matches!(
        &report.outcomes[0].1,
        OfflineOutcome::Copied { snapshot } if *snapshot == newest
    ));

    let target = media.path().join("home").join(&newest);
    assert!(target.join("marker").is_file());
    assert!(!media.path().join("home/20260828.030000").exists());

    // Replication preserves hardlink structure and has no link base.
    let requests = transfer.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].preserve_hard_links);
    assert_eq!(requests[0].link_dest, None);
    assert_eq!(
        requests[0].source,
        fs_dir.join(&newest).to_string_lossy().to_string()
    );
}

#[test]
fn existing_target_is_skipped() {
    let dest = tempdir().unwrap();
    let media = tempdir().unwrap();
    let config = make_config(dest.path(), &[("home", "/src/home")]);
    let fs_dir = dest.path().join("home");
    std::fs::create_dir_all(&fs_dir).unwrap();
    make_snapshot(&fs_dir, Utc.with_ymd_and_hms(2026, 8, 30, 3, 0, 0).unwrap());

    let transfer = FakeTransfer::hardlinking();
    offline::run(&config, media.path(), &transfer, &[]).unwrap();
    let report = offline::run(&config, media.path(), &transfer, &[]).unwrap();

    assert!(report.all_succeeded());
    assert!(matches!(
        &report.outcomes[0].1,
        OfflineOutcome::AlreadyPresent { .. }
    ));
    assert_eq!(transfer.request_count(), 1);
}

#[test]
fn empty_catalog_reports_no_snapshots() {
    let dest = tempdir().unwrap();
    let media = tempdir().unwrap();
    let config = make_config(dest.path(), &[("home", "/src/home")]);

    let transfer = FakeTransfer::hardlinking();
    let report = offline::run(&config, media.path(), &transfer, &[]).unwrap();
    assert!(report.all_succeeded());
    assert!(matches!(
        &report.outcomes[0].1,
        OfflineOutcome::NoSnapshots
    ));
    assert_eq!(transfer.request_count(), 0);
}

#[test]
fn locked_filesystem_is_not_replicated() {
    let dest = tempdir().unwrap();
    let media = tempdir().unwrap();
    let config = make_config(dest.path(), &[("home", "/src/home")]);
    let fs_dir = dest.path().join("home");
    std::fs::create_dir_all(&fs_dir).unwrap();
    make_snapshot(&fs_dir, Utc.with_ymd_and_hms(2026, 8, 30, 3, 0, 0).unwrap());
    let _guard = lock::acquire(&fs_dir).unwrap();

    let transfer = FakeTransfer::hardlinking();
    let report = offline::run(&config, media.path(), &transfer, &[]).unwrap();
    assert!(!report.all_succeeded());
    assert!(matches!(
        &report.outcomes[0].1,
        OfflineOutcome::LockContention { .. }
    ));
    assert_eq!(transfer.request_count(), 0);
}

#[test]
fn transfer_failure_is_isolated_per_filesystem() {
    let dest = tempdir().unwrap();
    let media = tempdir().unwrap();
    let config = make_config(dest.path(), &[("a", "/src/a"), ("b", "/src/b")]);
    for fs in ["a", "b"] {
        let fs_dir = dest.path().join(fs);
        std::fs::create_dir_all(&fs_dir).unwrap();
        make_snapshot(&fs_dir, Utc.with_ymd_and_hms(2026, 8, 30, 3, 0, 0).unwrap());
    }

    let transfer = FakeTransfer::with_behavior(|req| {
        if req.source.contains("/a/") {
            return Err(crate::error::HardsnapError::Transfer("disk full".into()));
        }
        Ok(())
    });
    let report = offline::run(&config, media.path(), &transfer, &[]).unwrap();

    assert!(!report.all_succeeded());
    assert!(matches!(
        &report.outcomes[0].1,
        OfflineOutcome::TransferFailed { .. }
    ));
    assert!(report.outcomes[1].1.is_success());
}
