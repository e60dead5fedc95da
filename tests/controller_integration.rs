//! Integration tests for the quarantine controller.
//!
//! These run the full read → scan → decide → transition flow against the
//! in-memory store and check both the returned disposition and the state
//! the store is left in.

use std::sync::Arc;

use billing_quarantine::config::parse_config;
use billing_quarantine::event::ObjectCreatedEvent;
use billing_quarantine::models::{Disposition, ObjectRef, ViolationKind};
use billing_quarantine::quarantine::{Controller, ProcessError, TransitionStage};
use billing_quarantine::store::memory::{InMemoryStore, StoreCall};
use billing_quarantine::validate::{RuleSet, Validator};

// ─── Helpers ────────────────────────────────────────────────────────

const SOURCE: &str = "billing-bucket";
const QUARANTINE: &str = "billing-errors";
const HEADER: &str = "id,company,customer,channel,product_line,store,date,currency,amount";

fn csv(rows: &[&str]) -> String {
    let mut content = String::from(HEADER);
    for row in rows {
        content.push('\n');
        content.push_str(row);
    }
    content.push('\n');
    content
}

fn valid_rows() -> Vec<&'static str> {
    vec![
        "1,Acme,Jo,Retail,Bakery,North,2023-01-03,USD,10.00",
        "2,Acme,Sam,Retail,Meat,North,2023-01-04,Rands,250.50",
        "3,Bolt,Ana,Online,Dairy,South,2023-01-05,Bitcoin,0.0004",
        "4,Bolt,Lee,Online,Meat,South,2023-02-28,USD,7",
        "5,Core,Kim,Retail,Bakery,East,2024-02-29,USD,3.25",
    ]
}

fn setup(content: &str) -> (Arc<InMemoryStore>, Controller, ObjectRef) {
    let store = Arc::new(InMemoryStore::new());
    let source = ObjectRef::new(SOURCE, "uploads/jan-2023.csv");
    store.put(&source, content);
    let controller = Controller::new(store.clone(), Validator::default(), QUARANTINE);
    (store, controller, source)
}

// ─── Tests ──────────────────────────────────────────────────────────

/// All rows valid: accepted, nothing moved.
#[tokio::test]
async fn test_valid_file_is_accepted_and_left_in_place() {
    let content = csv(&valid_rows());
    let (store, controller, source) = setup(&content);

    let disposition = controller.process(&source).await.unwrap();

    assert_eq!(disposition, Disposition::Accepted { records: 5 });
    assert_eq!(store.get(&source), Some(content.into_bytes()));
    assert_eq!(store.count_in(QUARANTINE), 0);
    assert_eq!(store.calls(), vec![StoreCall::Read(source)]);
}

/// Row 3 of 5 has a bad currency: scan stops there, file moves unchanged.
#[tokio::test]
async fn test_invalid_row_quarantines_file() {
    let mut rows = valid_rows();
    rows[2] = "3,Bolt,Ana,Online,Dairy,South,2023-01-05,EUR,12";
    rows[3] = "4,Bolt,Lee,Online,Fish,South,2023-02-28,USD,7";
    let content = csv(&rows);
    let (store, controller, source) = setup(&content);

    let disposition = controller.process(&source).await.unwrap();

    let destination = ObjectRef::new(QUARANTINE, "uploads/jan-2023.csv");
    match disposition {
        Disposition::Quarantined {
            rejection,
            destination: dest,
        } => {
            assert_eq!(dest, destination);
            assert_eq!(rejection.line, 4);
            assert_eq!(rejection.violation.record_identifier, "3");
            assert_eq!(rejection.violation.kind, ViolationKind::UnrecognisedCurrency);
            assert_eq!(rejection.violation.offending_value, "EUR");
        }
        other => panic!("expected quarantine, got {:?}", other),
    }

    assert!(!store.contains(&source));
    assert_eq!(store.get(&destination), Some(content.into_bytes()));
    assert_eq!(
        store.calls(),
        vec![
            StoreCall::Read(source.clone()),
            StoreCall::Copy(source.clone(), QUARANTINE.to_string()),
            StoreCall::Delete(source),
        ]
    );
}

/// A quarantined file is gone from the source, so a second run must fail.
#[tokio::test]
async fn test_reprocessing_quarantined_file_reports_missing_source() {
    let content = csv(&["1,Acme,Jo,Retail,Fish,North,2023-01-03,USD,10.00"]);
    let (_store, controller, source) = setup(&content);

    let first = controller.process(&source).await.unwrap();
    assert!(matches!(first, Disposition::Quarantined { .. }));

    let err = controller.process(&source).await.unwrap_err();
    assert!(err.is_source_missing(), "unexpected error: {}", err);
    assert_eq!(err.status_code(), 404);
}

/// A row breaking two rules reports the first rule checked.
#[tokio::test]
async fn test_reason_is_first_failing_rule() {
    let content = csv(&["1,Acme,Jo,Retail,Fish,North,2023-01-03,EUR,10.00"]);
    let (_store, controller, source) = setup(&content);

    match controller.process(&source).await.unwrap() {
        Disposition::Quarantined { rejection, .. } => {
            assert_eq!(
                rejection.violation.kind,
                ViolationKind::UnrecognisedProductLine
            );
            assert_eq!(rejection.violation.offending_value, "Fish");
        }
        other => panic!("expected quarantine, got {:?}", other),
    }
}

/// Copy failure: no delete attempted, source untouched.
#[tokio::test]
async fn test_copy_failure_leaves_source_and_skips_delete() {
    let content = csv(&["1,Acme,Jo,Retail,Bakery,North,2023-02-30,USD,10.00"]);
    let (store, controller, source) = setup(&content);
    store.fail_copies(true);

    let err = controller.process(&source).await.unwrap_err();

    assert!(matches!(
        err,
        ProcessError::Transition {
            stage: TransitionStage::Copy,
            ..
        }
    ));
    assert_eq!(err.status_code(), 500);
    assert!(store.contains(&source));
    assert_eq!(store.count_in(QUARANTINE), 0);
    assert!(!store
        .calls()
        .iter()
        .any(|c| matches!(c, StoreCall::Delete(_))));
}

/// Delete failure after a good copy is reported, not swallowed.
#[tokio::test]
async fn test_delete_failure_is_reported() {
    let content = csv(&["1,Acme,Jo,Retail,Bakery,North,2023-01-01,USD,abc"]);
    let (store, controller, source) = setup(&content);
    store.fail_deletes(true);

    let err = controller.process(&source).await.unwrap_err();

    assert!(matches!(
        err,
        ProcessError::Transition {
            stage: TransitionStage::Delete,
            ..
        }
    ));
    assert!(store.contains(&source));
    assert!(store.contains(&source.in_container(QUARANTINE)));
}

/// Short rows and non-numeric amounts are validation verdicts, not faults.
#[tokio::test]
async fn test_malformed_rows_are_quarantined() {
    for (row, expected) in [
        ("1,Acme,Jo", ViolationKind::MalformedRecord),
        (
            "1,Acme,Jo,Retail,Meat,North,2023-01-01,USD,ten",
            ViolationKind::BadAmount,
        ),
    ] {
        let (store, controller, source) = setup(&csv(&[row]));
        match controller.process(&source).await.unwrap() {
            Disposition::Quarantined { rejection, .. } => {
                assert_eq!(rejection.violation.kind, expected, "row {:?}", row);
            }
            other => panic!("expected quarantine for {:?}, got {:?}", row, other),
        }
        assert!(!store.contains(&source));
    }
}

#[tokio::test]
async fn test_header_only_file_is_accepted() {
    let (store, controller, source) = setup(HEADER);
    assert_eq!(
        controller.process(&source).await.unwrap(),
        Disposition::Accepted { records: 0 }
    );
    assert!(store.contains(&source));
}

#[tokio::test]
async fn test_rules_from_config() {
    let cfg = parse_config(
        r#"
[rules]
product_lines = ["Produce"]
currencies = ["EUR"]
"#,
    )
    .unwrap();
    let store = Arc::new(InMemoryStore::new());
    let source = ObjectRef::new(SOURCE, "eu.csv");
    store.put(
        &source,
        csv(&["1,Acme,Jo,Retail,Produce,North,2023-01-03,EUR,10.00"]),
    );
    let controller = Controller::new(
        store.clone(),
        Validator::new(RuleSet::from(&cfg.rules)),
        QUARANTINE,
    );

    assert_eq!(
        controller.process(&source).await.unwrap(),
        Disposition::Accepted { records: 1 }
    );
}

#[tokio::test]
async fn test_handle_event_end_to_end() {
    let content = csv(&["1,Acme,Jo,Retail,Bakery,North,2023-01-03,Yen,10.00"]);
    let store = Arc::new(InMemoryStore::new());
    let source = ObjectRef::new(SOURCE, "uploads/jan 2023.csv");
    store.put(&source, content.as_str());
    let controller = Controller::new(store.clone(), Validator::default(), QUARANTINE);

    let event = ObjectCreatedEvent::from_json(
        r#"{"Records":[{"eventName":"ObjectCreated:Put","s3":{"bucket":{"name":"billing-bucket"},"object":{"key":"uploads/jan+2023.csv"}}}]}"#,
    )
    .unwrap();
    let result = controller.handle_event(&event).await;

    assert!(result.is_success(), "unexpected result: {:?}", result);
    assert!(result.body.starts_with("Moved billing-bucket/uploads/jan 2023.csv"));
    assert!(result.body.contains("unrecognised currency 'Yen'"));
    assert!(!store.contains(&source));
    assert!(store.contains(&source.in_container(QUARANTINE)));
}
