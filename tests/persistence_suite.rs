use std::fs;

use chrono::{Duration, NaiveDate};
use session_ledger::{
    config::Config,
    export,
    ledger::{AgingBucket, RecordInput, SessionLedger},
    storage::{self, csv_import, LedgerStore},
};
use tempfile::TempDir;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
}

fn populated_ledger() -> SessionLedger {
    let mut ledger = SessionLedger::new("Practice");
    let unpaid = RecordInput {
        clinician: Some("Dr. Okafor".into()),
        client_initials: "JS".into(),
        date_of_service: today() - Duration::days(45),
        cpt_code: "90837".into(),
        session_fee: 200.0,
        payment_received: 0.0,
        unpaid: true,
        date_of_payment: None,
    };
    let paid = RecordInput {
        clinician: None,
        client_initials: "MK".into(),
        date_of_service: today() - Duration::days(10),
        cpt_code: "90791".into(),
        session_fee: 150.0,
        payment_received: 150.0,
        unpaid: false,
        date_of_payment: Some(today()),
    };
    ledger.add(&unpaid, today()).expect("add unpaid");
    ledger.add(&paid, today()).expect("add paid");
    ledger
}

#[test]
fn json_snapshot_roundtrip() {
    let temp = TempDir::new().expect("temp dir");
    let store = LedgerStore::new(Some(temp.path().to_path_buf())).expect("store");
    let ledger = populated_ledger();
    store.save(&ledger).expect("save snapshot");
    let loaded = store.load("Practice").expect("load snapshot");
    assert_eq!(loaded.records, ledger.records);
    assert_eq!(loaded.schema_version, ledger.schema_version);
}

#[test]
fn snapshot_files_have_no_tmp_siblings_left_behind() {
    let temp = TempDir::new().expect("temp dir");
    let store = LedgerStore::new(Some(temp.path().to_path_buf())).expect("store");
    store.save(&populated_ledger()).expect("save snapshot");
    let leftovers: Vec<_> = fs::read_dir(temp.path().join("ledgers"))
        .expect("read ledgers dir")
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.contains("tmp"))
                .unwrap_or(false)
        })
        .collect();
    assert!(leftovers.is_empty(), "tmp files left behind: {leftovers:?}");
}

#[test]
fn export_then_reload_recovers_the_table() {
    let temp = TempDir::new().expect("temp dir");
    let path = temp.path().join("sessions.csv");
    let ledger = populated_ledger();
    export::write_csv(&ledger, &path).expect("export");

    let reload =
        csv_import::reload_from_csv(&path, &Config::default(), today()).expect("reload csv");
    assert!(reload.issues.is_empty(), "issues: {:?}", reload.issues);
    assert_eq!(reload.records, ledger.records);
}

#[test]
fn reload_flags_rows_that_fail_coercion() {
    let temp = TempDir::new().expect("temp dir");
    let path = temp.path().join("sessions.csv");
    let csv = "\
Clinician,Client Initials,Date of Service,CPT Code,Session Fee,Payment Received,Date of Payment,Outstanding,Days Outstanding,Aging Bucket
Dr. Okafor,JS,2024-05-01,90837,200,0,,200,45,31-60 days
,MK,not-a-date,90791,150,0,,150,10,0-30 days
,TL,2024-06-01,99999,100,0,,100,14,0-30 days
,RW,2024-06-01,90791,abc,0,,0,0,Paid
";
    fs::write(&path, csv).expect("write fixture");

    let reload =
        csv_import::reload_from_csv(&path, &Config::default(), today()).expect("reload csv");
    assert_eq!(reload.records.len(), 1);
    assert_eq!(reload.records[0].client_initials, "JS");
    assert_eq!(reload.issues.len(), 3);
    let lines: Vec<usize> = reload.issues.iter().map(|issue| issue.line).collect();
    assert_eq!(lines, vec![3, 4, 5]);
}

#[test]
fn reload_prices_missing_fees_from_the_schedule() {
    let temp = TempDir::new().expect("temp dir");
    let path = temp.path().join("sessions.csv");
    let csv = "\
Client Initials,Date of Service,CPT Code,Payment Received,Date of Payment
JS,2024-05-01,90837,0,
MK,2024-06-05,90791,150,2024-06-10
";
    fs::write(&path, csv).expect("write fixture");

    let reload =
        csv_import::reload_from_csv(&path, &Config::default(), today()).expect("reload csv");
    assert!(reload.issues.is_empty(), "issues: {:?}", reload.issues);
    assert_eq!(reload.records[0].session_fee, 200.0);
    assert_eq!(reload.records[0].aging_bucket, AgingBucket::Days31To60);
    assert_eq!(reload.records[1].session_fee, 150.0);
    assert_eq!(reload.records[1].aging_bucket, AgingBucket::Paid);
}

#[test]
fn reload_accepts_the_original_column_names() {
    let temp = TempDir::new().expect("temp dir");
    let path = temp.path().join("sessions.csv");
    let csv = "\
Client,Date of Session,CPT Code,Session Fee,Payment Received,Date of Payment
JS,2024-05-01,90837,200,0,
";
    fs::write(&path, csv).expect("write fixture");

    let reload =
        csv_import::reload_from_csv(&path, &Config::default(), today()).expect("reload csv");
    assert!(reload.issues.is_empty(), "issues: {:?}", reload.issues);
    assert_eq!(reload.records.len(), 1);
    assert_eq!(reload.records[0].client_initials, "JS");
}

#[test]
fn save_to_explicit_path_roundtrips() {
    let temp = TempDir::new().expect("temp dir");
    let path = temp.path().join("snapshot.json");
    let ledger = populated_ledger();
    storage::save_ledger_to_path(&ledger, &path).expect("save");
    let loaded = storage::load_ledger_from_path(&path).expect("load");
    assert_eq!(loaded.records, ledger.records);
}
