use std::sync::Arc;
use std::thread;

use patchloop_core::{ErrorLedger, FileKey, PatchloopError};

#[test]
fn latest_twice_returns_identical_record() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = ErrorLedger::open(dir.path().join("errors.json"));
    ledger
        .record("gen/bad.py", "ZeroDivisionError: division by zero", "Traceback ...")
        .unwrap();

    let first = ledger.latest("gen/bad.py").unwrap();
    let second = ledger.latest("gen/bad.py").unwrap();
    assert_eq!(first, second);
}

#[test]
fn second_record_replaces_first() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = ErrorLedger::open(dir.path().join("errors.json"));
    ledger.record("bad.py", "first", "tb1").unwrap();
    ledger.record("./bad.py", "second", "tb2").unwrap();

    let all = ledger.entries().unwrap();
    assert_eq!(all.len(), 1);
    let rec = &all[&FileKey::new("bad.py")];
    assert_eq!(rec.error_message, "second");
    assert_eq!(rec.traceback, "tb2");
}

#[test]
fn miss_is_not_found_not_a_crash() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = ErrorLedger::open(dir.path().join("errors.json"));
    match ledger.latest("never-ran.py") {
        Err(PatchloopError::LedgerMiss(path)) => assert_eq!(path, "never-ran.py"),
        other => panic!("expected LedgerMiss, got {other:?}"),
    }
}

#[test]
fn records_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state").join("errors.json");
    ErrorLedger::open(&path)
        .record("a.py", "NameError: name 'x' is not defined", "tb")
        .unwrap();

    let reopened = ErrorLedger::open(&path);
    assert_eq!(
        reopened.latest("a.py").unwrap().error_message,
        "NameError: name 'x' is not defined"
    );
}

#[test]
fn corrupt_ledger_file_propagates_storage_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("errors.json");
    std::fs::write(&path, "{ not json").unwrap();
    let ledger = ErrorLedger::open(&path);

    assert!(matches!(
        ledger.record("a.py", "x", "y"),
        Err(PatchloopError::Storage(_))
    ));
}

#[test]
fn concurrent_records_for_different_files_are_all_kept() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = Arc::new(ErrorLedger::open(dir.path().join("errors.json")));

    let handles: Vec<_> = (0..6)
        .map(|i| {
            let ledger = Arc::clone(&ledger);
            thread::spawn(move || {
                ledger
                    .record(format!("file_{i}.py"), format!("err {i}"), "tb")
                    .unwrap();
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(ledger.entries().unwrap().len(), 6);
}
