//! End-to-end print flows against the in-memory printer.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use pretty_assertions::assert_eq;
use serde_json::json;

use escble::{
    PrintError, PrintOutcome, ReceiptPrinter, Settings,
    error::{ErrorCategory, TransportError, ValidationError},
    notice::Notice,
    order::{LineItem, OrderRecord},
    protocol::encode,
    session::{CONNECT_PROMPT, ConnectionState},
    store::{FileStore, KeyValueStore, MemoryStore},
    transport::{
        DeviceInfo,
        mock::{MockAdapter, MockPrinter},
    },
};

fn date() -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339("2024-03-05T14:30:00+07:00").unwrap()
}

fn order() -> OrderRecord {
    OrderRecord::new(
        "ORD-2001",
        date(),
        &[
            LineItem::new("Flat White", 2, 4.5),
            LineItem::new("Banana Bread", 1, 3.75),
        ],
        2.0,
        14.75,
    )
}

fn settings(chunk_size: usize) -> Settings {
    let mut settings = Settings::default();
    settings.printer.chunk_size = chunk_size;
    settings.printer.chunk_delay_ms = 0;
    settings
}

fn printer_with_store(
    mock: &MockPrinter,
    store: Arc<dyn KeyValueStore>,
    chunk_size: usize,
) -> ReceiptPrinter<MockAdapter> {
    ReceiptPrinter::new(MockAdapter::new(mock.clone()), store, &settings(chunk_size))
}

fn printer(mock: &MockPrinter, chunk_size: usize) -> ReceiptPrinter<MockAdapter> {
    printer_with_store(mock, Arc::new(MemoryStore::new()), chunk_size)
}

#[test]
fn test_formatting_is_deterministic() {
    let mock = MockPrinter::new("Counter Printer");
    let printer = printer(&mock, 180);

    let a = printer.encode(&printer.formatter().format(&order()).unwrap());
    let b = printer.encode(&printer.formatter().format(&order()).unwrap());
    assert_eq!(a, b);
}

#[tokio::test]
async fn test_valid_order_writes_every_chunk_in_order() {
    let mock = MockPrinter::new("Counter Printer");
    let printer = printer(&mock, 16);

    let receipt = printer.formatter().format(&order()).unwrap();
    let expected = printer.encode(&receipt);
    assert!(expected.iter().all(|c| !c.is_empty() && c.len() <= 16));

    let outcome = printer.print(Some(&order())).await.unwrap();
    let PrintOutcome::Printed { device, report } = outcome else {
        panic!("expected a printed outcome");
    };
    assert_eq!(device.name, "Counter Printer");
    assert_eq!(report.chunks, expected.len());

    let writes = mock.writes();
    let data: Vec<Vec<u8>> = writes.iter().map(|w| w.data.clone()).collect();
    assert_eq!(data, expected);
    assert_eq!(mock.printed(), encode::to_bytes(receipt.lines()));
    for pair in writes.windows(2) {
        assert!(pair[1].started >= pair[0].finished);
    }
    assert_eq!(mock.max_in_flight(), 1);
}

#[tokio::test]
async fn test_malformed_item_is_skipped() {
    let mock = MockPrinter::new("Counter Printer");
    let printer = printer(&mock, 180);

    let mut order = order();
    order.items = Some(json!([
        {"title": "Flat White", "quantity": 2, "price": 4.5},
        {"title": "Mystery", "quantity": 1},
        {"title": "Banana Bread", "quantity": 1, "price": 3.75},
    ]));

    let receipt = printer.formatter().format(&order).unwrap();
    assert_eq!(receipt.items().count(), 2);

    let outcome = printer.print(Some(&order)).await.unwrap();
    assert!(matches!(outcome, PrintOutcome::Printed { .. }));
    assert_eq!(mock.printed(), encode::to_bytes(receipt.lines()));
}

#[tokio::test]
async fn test_invalid_order_never_touches_the_printer() {
    let mock = MockPrinter::new("Counter Printer");
    let printer = printer(&mock, 180);

    let mut order = order();
    order.items = Some(json!([{"title": "No price", "quantity": 1}, {"price": 2.0}]));
    let err = printer.print(Some(&order)).await.unwrap_err();
    assert!(matches!(
        err,
        PrintError::Validation(ValidationError::NoValidItems { dropped: 2 })
    ));
    assert_eq!(err.category(), ErrorCategory::Validation);

    order.items = None;
    let err = printer.print(Some(&order)).await.unwrap_err();
    assert!(matches!(
        err,
        PrintError::Validation(ValidationError::MissingItems)
    ));

    assert_eq!(mock.requests(), 0);
    assert_eq!(mock.connects(), 0);
    assert_eq!(mock.write_attempts(), 0);
}

#[tokio::test]
async fn test_connect_is_idempotent() {
    let mock = MockPrinter::new("Counter Printer");
    let printer = printer(&mock, 180);

    printer.connect().await.unwrap();
    printer.connect().await.unwrap();
    printer.print(Some(&order())).await.unwrap();

    assert_eq!(mock.requests(), 1);
    assert_eq!(mock.connects(), 1);
}

#[tokio::test]
async fn test_disconnect_forces_rediscovery() {
    let mock = MockPrinter::new("Counter Printer");
    let printer = printer(&mock, 180);

    printer.connect().await.unwrap();
    assert_eq!(printer.sessions().state().await, ConnectionState::Connected);

    mock.drop_link();
    assert_eq!(printer.sessions().state().await, ConnectionState::Idle);

    printer.print(Some(&order())).await.unwrap();
    assert_eq!(mock.requests(), 2);
    assert_eq!(mock.connects(), 2);
}

#[tokio::test]
async fn test_mid_stream_failure_stops_and_invalidates() {
    let mock = MockPrinter::new("Counter Printer");
    let printer = printer(&mock, 16);
    let total = printer
        .encode(&printer.formatter().format(&order()).unwrap())
        .len();
    assert!(total >= 10);

    mock.fail_write(4);
    let err = printer.print(Some(&order())).await.unwrap_err();

    match &err {
        PrintError::Transport(TransportError::Write { index, total: t, .. }) => {
            assert_eq!(*index, 4);
            assert_eq!(*t, total);
        }
        other => panic!("expected a write error, got {other:?}"),
    }
    assert_eq!(err.category(), ErrorCategory::Transport);
    assert_eq!(mock.write_attempts(), 5);
    assert_eq!(mock.writes().len(), 4);
    assert_eq!(printer.sessions().state().await, ConnectionState::Idle);

    // The next job starts over with discovery.
    printer.print(Some(&order())).await.unwrap();
    assert_eq!(mock.requests(), 2);
}

#[tokio::test]
async fn test_run_job_reports_progress() {
    let mock = MockPrinter::new("Counter Printer");
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let printer = printer(&mock, 180).with_notifier(Arc::new(tx));

    let last = printer.run_job(Some(&order())).await;
    let bytes = mock.printed().len();
    assert_eq!(
        last,
        Notice::Printed {
            printer: "Counter Printer".into(),
            bytes,
        }
    );

    let mut seen = Vec::new();
    while let Ok(notice) = rx.try_recv() {
        seen.push(notice);
    }
    assert_eq!(seen.len(), 3);
    assert!(matches!(seen[0], Notice::Connected { .. }));
    assert!(matches!(seen[1], Notice::PrintingStarted { .. }));
    assert_eq!(seen[2], last);
}

#[tokio::test]
async fn test_run_job_turns_errors_into_one_notice() {
    let mock = MockPrinter::new("Counter Printer");
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let printer = printer(&mock, 180).with_notifier(Arc::new(tx));

    let mut order = order();
    order.items = Some(json!("not a list"));
    let notice = printer.run_job(Some(&order)).await;
    assert_eq!(
        notice,
        Notice::Failed {
            category: ErrorCategory::Validation,
            message: ErrorCategory::Validation.user_message(),
        }
    );
    assert_eq!(rx.try_recv().unwrap(), notice);
    assert!(rx.try_recv().is_err());

    mock.set_connect_failure(Some("GATT error 133"));
    let notice = printer.run_job(None).await;
    assert!(matches!(
        notice,
        Notice::Failed {
            category: ErrorCategory::Connect,
            ..
        }
    ));
}

#[tokio::test]
async fn test_connect_only_prints_nothing() {
    let mock = MockPrinter::new("Counter Printer");
    let printer = printer(&mock, 180);

    let notice = printer.run_job(None).await;
    assert_eq!(
        notice,
        Notice::Connected {
            printer: "Counter Printer".into()
        }
    );
    assert_eq!(mock.write_attempts(), 0);
}

#[tokio::test]
async fn test_status_and_remembered_printer() {
    let dir = tempfile::tempdir().unwrap();
    let state = dir.path().join("state.json");

    let mock = MockPrinter::new("Counter Printer");
    let printer = printer_with_store(&mock, Arc::new(FileStore::new(&state)), 180);
    assert_eq!(printer.status().await, CONNECT_PROMPT);

    printer.connect().await.unwrap();
    assert_eq!(printer.status().await, "Counter Printer (connected)");

    printer.disconnect().await;
    assert!(
        printer
            .status()
            .await
            .starts_with("Counter Printer (last connected ")
    );

    // A later run sees the same record and prefers that printer.
    let other = MockPrinter::new("Counter Printer");
    other.set_devices(vec![
        DeviceInfo {
            id: "kitchen".into(),
            name: "Kitchen Printer".into(),
        },
        DeviceInfo {
            id: "mock-0".into(),
            name: "Counter Printer".into(),
        },
    ]);
    let later = printer_with_store(&other, Arc::new(FileStore::new(&state)), 180);
    assert!(later.status().await.starts_with("Counter Printer (last"));

    let PrintOutcome::Connected { device } = later.connect().await.unwrap() else {
        panic!("expected a connect-only outcome");
    };
    assert_eq!(device.id, "mock-0");
}

#[tokio::test]
async fn test_connect_rewrites_corrupt_state_file() {
    let dir = tempfile::tempdir().unwrap();
    let state = dir.path().join("state.json");
    std::fs::write(&state, "{truncated").unwrap();

    let mock = MockPrinter::new("Counter Printer");
    let printer = printer_with_store(&mock, Arc::new(FileStore::new(&state)), 180);
    assert_eq!(printer.status().await, CONNECT_PROMPT);

    printer.connect().await.unwrap();
    printer.disconnect().await;

    assert!(
        printer
            .status()
            .await
            .starts_with("Counter Printer (last connected ")
    );
    let raw = std::fs::read_to_string(&state).unwrap();
    assert!(raw.contains("escble.last_printer"));
}
