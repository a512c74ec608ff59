use super::*;
use std::{
    io,
    sync::{Arc, Mutex},
};
use tracing_subscriber::fmt::MakeWriter;

#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().expect("log buffer")).into_owned()
    }

    fn count(&self, level: &str) -> usize {
        self.text().lines().filter(|line| line.contains(level)).count()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("log buffer").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn with_logs<T>(run: impl FnOnce() -> T) -> (T, CapturedLogs) {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::INFO)
        .finish();
    let value = tracing::subscriber::with_default(subscriber, run);
    (value, logs)
}

/// Modular stand-in that fails every call.
struct BrokenModular;

impl ListingOps for BrokenModular {
    fn name(&self) -> &'static str {
        "broken"
    }

    fn add_row(&mut self, _: &mut ListingState, _: &BTreeMap<String, String>) -> Result<usize> {
        Err(ListingError::Validation("modular model unavailable".into()))
    }

    fn delete_rows(&mut self, _: &mut ListingState, _: &[usize]) -> Result<usize> {
        Err(ListingError::Validation("modular model unavailable".into()))
    }

    fn update_cell(&mut self, _: &mut ListingState, _: usize, _: &str, _: &str) -> Result<bool> {
        Err(ListingError::Validation("modular model unavailable".into()))
    }

    fn change_manager(&mut self, _: &mut ListingState, _: &[usize], _: &str) -> Result<usize> {
        Err(ListingError::Validation("modular model unavailable".into()))
    }

    fn promote_identity(&mut self, _: &mut ListingState, _: u64, _: u64) -> Result<usize> {
        Err(ListingError::Validation("modular model unavailable".into()))
    }

    fn load_rows(&mut self, _: &mut ListingState, _: &[Row]) -> Result<usize> {
        Err(ListingError::Validation("modular model unavailable".into()))
    }
}

fn broken_bridge(mode: BridgeMode) -> OneRoomBridge {
    let mut bridge = OneRoomBridge::with_paths(
        mode,
        Box::new(LegacyController::new()),
        Box::new(BrokenModular),
    );
    bridge.attach(ListingKind::Oneroom);
    bridge
}

fn persisted_rows(ids: &[u64]) -> Vec<Row> {
    ids.iter()
        .map(|id| Row::new(Identity::Persisted(*id)).with_field("manager", "Lee"))
        .collect()
}

#[test]
fn modular_failure_returns_legacy_result_without_switching_mode() {
    let mut bridge = broken_bridge(BridgeMode::Modular);

    let (position, logs) = with_logs(|| bridge.add_row(&BTreeMap::new()));

    assert_eq!(position, Some(0));
    assert_eq!(bridge.mode(), BridgeMode::Modular);
    assert_eq!(bridge.fallback_count(), 1);
    assert_eq!(logs.count("ERROR"), 1, "logs: {}", logs.text());
    assert_eq!(bridge.rows()[0].identity(), Identity::Temporary(1));
}

#[test]
fn fallback_is_per_call() {
    let mut bridge = broken_bridge(BridgeMode::Modular);
    bridge.load_rows(&persisted_rows(&[1, 2]));

    assert!(bridge.update_cell(0, "memo", "first"));
    assert_eq!(bridge.change_manager(&[0, 1], "Kim"), 2);

    assert_eq!(bridge.fallback_count(), 3);
    assert_eq!(bridge.mode(), BridgeMode::Modular);
}

#[test]
fn legacy_mode_never_calls_the_modular_path() {
    let mut bridge = broken_bridge(BridgeMode::Legacy);

    let (removed, logs) = with_logs(|| {
        bridge.load_rows(&persisted_rows(&[1, 2, 3]));
        bridge.delete_rows(&[2, 0, 1])
    });

    assert_eq!(removed, 3);
    assert_eq!(bridge.fallback_count(), 0);
    assert_eq!(logs.count("ERROR"), 0, "logs: {}", logs.text());
}

#[test]
fn detached_bridge_reports_configuration_error() {
    let mut bridge = OneRoomBridge::new(BridgeMode::Modular);

    let (results, logs) = with_logs(|| {
        (
            bridge.add_row(&BTreeMap::new()),
            bridge.update_cell(0, "memo", "x"),
            bridge.delete_rows(&[0]),
            bridge.update_row_identity(-1, 5),
        )
    });

    assert_eq!(results, (None, false, 0, false));
    assert_eq!(bridge.fallback_count(), 0);
    assert_eq!(logs.count("ERROR"), 4, "logs: {}", logs.text());
    assert!(logs.text().contains("not attached"));
}

#[test]
fn update_row_identity_promotes_store_and_pending_changes() {
    let mut bridge = OneRoomBridge::new(BridgeMode::Modular);
    bridge.attach(ListingKind::Oneroom);
    let position = bridge.add_row(&BTreeMap::new()).expect("add");
    let temp_wire = bridge.rows()[position].identity().to_wire();
    assert!(bridge.update_cell(position, "memo", "draft"));

    assert!(bridge.update_row_identity(temp_wire, 321));

    assert_eq!(bridge.rows()[position].identity(), Identity::Persisted(321));
    assert!(bridge.pending_changes().is_empty(), "the server already has the row");
    assert_eq!(
        bridge.save_request("Kim").map(|request| request.is_empty()),
        Some(true)
    );

    assert!(bridge.update_cell(position, "memo", "saved"));
    assert_eq!(
        bridge.pending_changes(),
        vec![PendingChange::Update {
            identity: Identity::Persisted(321),
            field: "memo".to_string(),
            value: "saved".to_string(),
        }]
    );
}

#[test]
fn update_row_identity_for_missing_row_warns_and_fails() {
    let mut bridge = OneRoomBridge::new(BridgeMode::Modular);
    bridge.attach(ListingKind::Oneroom);
    bridge.load_rows(&persisted_rows(&[1]));

    let (updated, logs) = with_logs(|| bridge.update_row_identity(-7, 70));

    assert!(!updated);
    assert_eq!(logs.count("WARN"), 1, "logs: {}", logs.text());
    assert_eq!(logs.count("ERROR"), 0);
    assert!(!bridge.update_row_identity(5, 70), "old id must be temporary");
    assert!(!bridge.update_row_identity(-1, -2), "new id must be persisted");
}

#[test]
fn modular_mode_emits_listing_events() {
    let mut bridge = OneRoomBridge::new(BridgeMode::Modular);
    let mut events = bridge.subscribe_events();
    bridge.attach(ListingKind::Oneroom);

    bridge.load_rows(&persisted_rows(&[1]));
    let position = bridge.add_row(&BTreeMap::new()).expect("add");

    assert_eq!(events.try_recv().expect("reset"), ListingEvent::Reset { rows: 1 });
    match events.try_recv().expect("insert") {
        ListingEvent::RowInserted { position: at, identity } => {
            assert_eq!(at, position);
            assert!(identity.is_temporary());
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[test]
fn set_mode_is_explicit() {
    let mut bridge = OneRoomBridge::new(BridgeMode::Legacy);
    bridge.attach(ListingKind::Oneroom);
    bridge.add_row(&BTreeMap::new()).expect("add");
    assert_eq!(bridge.mode(), BridgeMode::Legacy);

    bridge.set_mode(BridgeMode::Modular);
    assert_eq!(bridge.mode(), BridgeMode::Modular);
    assert_eq!("legacy".parse::<BridgeMode>(), Ok(BridgeMode::Legacy));
}

#[test]
fn acknowledge_save_promotes_new_rows_and_clears_sent_changes() {
    let mut bridge = OneRoomBridge::new(BridgeMode::Modular);
    bridge.attach(ListingKind::Oneroom);
    bridge.load_rows(&persisted_rows(&[1, 2]));
    let added = bridge.add_row(&BTreeMap::new()).expect("add");
    let temp_wire = bridge.rows()[added].identity().to_wire();
    assert!(bridge.update_cell(0, "memo", "edited"));
    assert_eq!(bridge.delete_rows(&[1]), 1);

    let sent = bridge.save_request("Kim").expect("attached");
    assert_eq!(sent.added.len(), 1);
    assert_eq!(sent.updated.len(), 1);
    assert_eq!(sent.deleted, vec![Identity::Persisted(2)]);

    let promoted = bridge.acknowledge_save(&sent, &[(temp_wire, 900)]);

    assert_eq!(promoted, 1);
    assert!(bridge.pending_changes().is_empty());
    assert!(bridge
        .rows()
        .iter()
        .any(|row| row.identity() == Identity::Persisted(900)));
}

#[test]
fn edit_to_new_row_during_save_is_sent_next_time() {
    let mut bridge = OneRoomBridge::new(BridgeMode::Modular);
    bridge.attach(ListingKind::Oneroom);
    let position = bridge.add_row(&BTreeMap::new()).expect("add");
    let temp_wire = bridge.rows()[position].identity().to_wire();

    let sent = bridge.save_request("Kim").expect("attached");
    assert!(bridge.update_cell(position, "memo", "typed after save started"));

    assert_eq!(bridge.acknowledge_save(&sent, &[(temp_wire, 900)]), 1);

    assert_eq!(
        bridge.pending_changes(),
        vec![PendingChange::Update {
            identity: Identity::Persisted(900),
            field: "memo".to_string(),
            value: "typed after save started".to_string(),
        }]
    );
    let next = bridge.save_request("Kim").expect("attached");
    assert!(next.added.is_empty());
    assert_eq!(next.updated.len(), 1);
    assert_eq!(next.updated[0].id, Identity::Persisted(900));
}

#[test]
fn new_row_without_id_assignment_keeps_later_edits_pending() {
    let mut bridge = OneRoomBridge::new(BridgeMode::Legacy);
    bridge.attach(ListingKind::Oneroom);
    let position = bridge.add_row(&BTreeMap::new()).expect("add");
    let identity = bridge.rows()[position].identity();

    let sent = bridge.save_request("Kim").expect("attached");
    assert!(bridge.update_cell(position, "memo", "late"));
    bridge.acknowledge_save(&sent, &[]);

    assert_eq!(bridge.pending_changes(), vec![PendingChange::Add(identity)]);
}

#[test]
fn row_deleted_during_save_is_deleted_on_the_server() {
    let mut bridge = OneRoomBridge::new(BridgeMode::Modular);
    bridge.attach(ListingKind::Oneroom);
    bridge.load_rows(&persisted_rows(&[1]));
    let position = bridge.add_row(&BTreeMap::new()).expect("add");
    let temp_wire = bridge.rows()[position].identity().to_wire();

    let sent = bridge.save_request("Kim").expect("attached");
    assert_eq!(bridge.delete_rows(&[position]), 1);

    let (promoted, logs) = with_logs(|| bridge.acknowledge_save(&sent, &[(temp_wire, 900)]));

    assert_eq!(promoted, 0);
    assert_eq!(logs.count("WARN"), 0, "logs: {}", logs.text());
    assert_eq!(
        bridge.pending_changes(),
        vec![PendingChange::Delete(Identity::Persisted(900))]
    );
    assert_eq!(
        bridge.save_request("Kim").expect("attached").deleted,
        vec![Identity::Persisted(900)]
    );
}
