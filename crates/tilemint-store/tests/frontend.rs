use chrono::{NaiveDate, NaiveDateTime};
use tilemint_store::MemoryStore;
use tilemint_store::tilemint::store::RecordStore;
use tilemint_store::tilemint::{
    ErrorKind, FixedClock, FrontendCodeTables, FrontendRequest, Side, issue_frontend,
};

fn tables() -> FrontendCodeTables {
    let mut tables = FrontendCodeTables::default();
    tables.insert("MACHINE", "EQ01", "M");
    tables.insert("YEAR", "2025", "Y");
    tables.insert("MONTH", "3", "C");
    tables.insert("DAY", "7", "G");
    tables.insert("DAY", "8", "H");
    tables
}

fn at(day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 3, day)
        .unwrap()
        .and_hms_opt(14, 5, 9)
        .unwrap()
}

fn request(lot: &str, qty: usize, day: u32) -> FrontendRequest {
    FrontendRequest {
        lot_number: lot.into(),
        product_no: "12345".into(),
        equipment: "EQ01".into(),
        qty,
        checkout: at(day),
    }
}

#[test]
fn codes_continue_per_prefix() {
    let store = MemoryStore::new();
    let clock = FixedClock::new(at(7));

    let first = issue_frontend(&store, &tables(), &request("F1", 3, 7), &clock).unwrap();
    assert_eq!(first.prefix.as_str(), "000000000012345MYCG");
    let primaries: Vec<_> = first.identifiers.iter().map(|id| id.primary.as_str()).collect();
    assert_eq!(
        primaries,
        [
            "000000000012345MYCG001",
            "000000000012345MYCG002",
            "000000000012345MYCG003",
        ]
    );
    assert_eq!(first.summary.final_serial, "003");
    assert_eq!(first.summary.side, Side::Front);
    assert_eq!(first.summary.created_date, "250307");
    assert_eq!(first.summary.created_time, "14:05:09");

    let second = issue_frontend(&store, &tables(), &request("F2", 2, 7), &clock).unwrap();
    assert_eq!(second.identifiers[0].primary, "000000000012345MYCG004");
    assert_eq!(second.summary.terminal, "000000000012345MYCG005");

    // a new checkout day is a new prefix and restarts the range
    let third = issue_frontend(&store, &tables(), &request("F3", 1, 8), &clock).unwrap();
    assert_eq!(third.identifiers[0].primary, "000000000012345MYCH001");

    let records = store.snapshot();
    assert_eq!(records.lots["F1"].len(), 3);
    assert_eq!(records.lots["F2"][1].tile_fields, ["000000000012345MYCG005"]);
    assert_eq!(records.summaries.len(), 3);
}

#[test]
fn frontend_runs_persist_to_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("records.json");
    let clock = FixedClock::new(at(7));

    {
        let store = MemoryStore::open(&path).unwrap();
        issue_frontend(&store, &tables(), &request("F1", 2, 7), &clock).unwrap();
    }
    let store = MemoryStore::open(&path).unwrap();
    let outcome = issue_frontend(&store, &tables(), &request("F2", 1, 7), &clock).unwrap();
    assert_eq!(outcome.summary.final_serial, "003");
}

#[test]
fn invalid_requests_write_nothing() {
    let store = MemoryStore::new();
    let clock = FixedClock::new(at(7));

    let err = issue_frontend(&store, &tables(), &request("F1", 0, 7), &clock).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
    let err = issue_frontend(&store, &tables(), &request(" ", 1, 7), &clock).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
    // no day code for the 9th
    let err = issue_frontend(&store, &tables(), &request("F1", 1, 9), &clock).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);

    assert!(store.snapshot().summaries.is_empty());
}

#[test]
fn held_scope_is_a_retryable_conflict() {
    let store = MemoryStore::new();
    let request = request("F1", 1, 7);
    let _held = store.begin(&request.scope()).unwrap();

    let err = issue_frontend(&store, &tables(), &request, &FixedClock::new(at(7))).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert!(err.is_retryable());
}
