use std::thread;

use chrono::NaiveDate;
use tilemint_store::tilemint::store::RecordStore;
use tilemint_store::tilemint::{
    CustomerPolicy, ErrorKind, FixedClock, GenerationRequest, Orchestrator, ProductKey,
    ProductTemplate, RunState, Side, SideTemplate,
};
use tilemint_store::{MemoryStore, StaticConfig};

fn config() -> StaticConfig {
    let template = ProductTemplate {
        name: "P1".into(),
        sides: 2,
        front: SideTemplate::new(["TXT=AB,SN1"], ["SN"]).unwrap(),
        back: SideTemplate::new(["TXT=BK,SN1"], [""; 0]).unwrap(),
        ..Default::default()
    };
    StaticConfig::default()
        .with_template(&ProductKey::new("P1", "V1", "S1"), template.clone())
        .with_template(&ProductKey::new("P2", "V1", "S1"), template)
        .with_policy(CustomerPolicy {
            customer: "C1".into(),
            ..Default::default()
        })
        .with_policy(CustomerPolicy {
            customer: "C2".into(),
            ..Default::default()
        })
}

fn request(product: &str, lot: &str) -> GenerationRequest {
    request_for("C1", product, lot)
}

fn request_for(customer: &str, product: &str, lot: &str) -> GenerationRequest {
    GenerationRequest {
        customer: customer.into(),
        product: product.into(),
        version: "V1".into(),
        step: "S1".into(),
        lot_number: lot.into(),
        sub_batch_qty: 1,
        environment: String::new(),
    }
}

fn clock() -> FixedClock {
    FixedClock::new(
        NaiveDate::from_ymd_opt(2025, 2, 14)
            .unwrap()
            .and_hms_opt(9, 15, 30)
            .unwrap(),
    )
}

#[test]
fn runs_continue_across_reopened_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("records.json");
    let config = config();

    {
        let store = MemoryStore::open(&path).unwrap();
        let outcome = Orchestrator::with_clock(&config, &store, clock())
            .run(&request("P1", "L1"))
            .unwrap();
        assert_eq!(outcome.result, "AB00005");
    }

    let store = MemoryStore::open(&path).unwrap();
    let outcome = Orchestrator::with_clock(&config, &store, clock())
        .run(&request("P1", "L2"))
        .unwrap();
    assert_eq!(outcome.front.identifiers[0].primary, "AB00006");
    assert_eq!(outcome.result, "AB0001A");

    let records = store.snapshot();
    assert_eq!(records.lots["L1"].len(), 5);
    assert_eq!(records.lots["BL2"].len(), 5);
    assert_eq!(records.lots["L2"][0].cell_fields, ["00006"]);
    let sides: Vec<_> = records.summaries.iter().map(|s| (s.lot.as_str(), s.side)).collect();
    assert_eq!(
        sides,
        [
            ("L1", Side::Front),
            ("BL1", Side::Back),
            ("L2", Side::Front),
            ("BL2", Side::Back),
        ]
    );
}

#[test]
fn held_customer_conflicts_and_other_customers_proceed() {
    let config = config();
    let store = MemoryStore::new();
    let held = store.begin(&request("P1", "L1").scope()).unwrap();

    thread::scope(|s| {
        let same = s.spawn(|| {
            Orchestrator::with_clock(&config, &store, clock()).run(&request("P1", "L2"))
        });
        let sibling = s.spawn(|| {
            Orchestrator::with_clock(&config, &store, clock()).run(&request("P2", "L3"))
        });
        let other = s.spawn(|| {
            Orchestrator::with_clock(&config, &store, clock()).run(&request_for("C2", "P1", "L4"))
        });

        for run in [same, sibling] {
            let failure = run.join().unwrap().unwrap_err();
            assert_eq!(failure.state, RunState::ResolveLastSerial);
            assert_eq!(failure.error.kind(), ErrorKind::Conflict);
            assert!(failure.is_retryable());
        }

        assert_eq!(other.join().unwrap().unwrap().result, "AB00005");
    });

    drop(held);
    let outcome = Orchestrator::with_clock(&config, &store, clock())
        .run(&request("P1", "L2"))
        .unwrap();
    // C2's history is separate
    assert_eq!(outcome.front.identifiers[0].primary, "AB00001");
}

#[test]
fn products_of_one_customer_continue_one_sequence() {
    let config = config();
    let store = MemoryStore::new();

    let first = Orchestrator::with_clock(&config, &store, clock())
        .run(&request("P1", "L1"))
        .unwrap();
    assert_eq!(first.result, "AB00005");

    // P2 shares the customer's history and prefix
    let second = Orchestrator::with_clock(&config, &store, clock())
        .run(&request("P2", "L2"))
        .unwrap();
    assert_eq!(second.front.identifiers[0].primary, "AB00006");
}

#[test]
fn stores_sharing_a_file_exclude_each_other() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("records.json");
    let config = config();
    let first = MemoryStore::open(&path).unwrap();
    let second = MemoryStore::open(&path).unwrap();

    let held = first.begin(&request("P1", "L1").scope()).unwrap();
    let failure = Orchestrator::with_clock(&config, &second, clock())
        .run(&request("P1", "L2"))
        .unwrap_err();
    assert_eq!(failure.error.kind(), ErrorKind::Conflict);
    assert!(failure.is_retryable());
    drop(held);

    let one = Orchestrator::with_clock(&config, &first, clock())
        .run(&request("P1", "L1"))
        .unwrap();
    let two = Orchestrator::with_clock(&config, &second, clock())
        .run(&request("P1", "L2"))
        .unwrap();
    assert_eq!(one.result, "AB00005");
    assert_eq!(two.front.identifiers[0].primary, "AB00006");

    let records = MemoryStore::open(&path).unwrap().snapshot();
    assert_eq!(records.lots["L1"].len(), 5);
    assert_eq!(records.lots["L2"].len(), 5);
    assert_eq!(records.summaries.len(), 4);
}

#[test]
fn failed_run_leaves_the_file_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("records.json");
    let config = config();
    let store = MemoryStore::open(&path).unwrap();

    let mut bad = request("P1", "L1");
    bad.sub_batch_qty = 0;
    let failure = Orchestrator::with_clock(&config, &store, clock())
        .run(&bad)
        .unwrap_err();
    assert_eq!(failure.error.kind(), ErrorKind::Config);
    assert!(!path.exists());
}
