use std::{collections::BTreeMap, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
use crossbeam_channel::{bounded, RecvTimeoutError};
use listing_core::{ListingError, LoadedListing, Row};
use shared::{
    domain::{Identity, ListingKind},
    protocol::{SaveRequest, SaveResponse},
};

use super::*;

struct FakeSource {
    delay: Duration,
}

#[async_trait]
impl ListingSource for FakeSource {
    async fn fetch_rows(
        &self,
        kind: ListingKind,
        manager: &str,
        _role: &str,
    ) -> listing_core::error::Result<LoadedListing> {
        tokio::time::sleep(self.delay).await;
        if manager == "Nobody" {
            return Err(ListingError::Transport("unknown manager".into()));
        }
        Ok(LoadedListing {
            kind,
            rows: vec![Row::new(Identity::Persisted(1)).with_field("manager", manager)],
            fetched_at: Utc::now(),
        })
    }

    async fn save_changes(
        &self,
        _kind: ListingKind,
        request: &SaveRequest,
    ) -> listing_core::error::Result<SaveResponse> {
        let id_map = request
            .added
            .iter()
            .enumerate()
            .filter_map(|(index, row)| {
                let temp = row.get("id")?.as_i64()?;
                Some((temp.to_string(), 500 + index as i64))
            })
            .collect::<BTreeMap<_, _>>();
        Ok(SaveResponse {
            status: "ok".into(),
            id_map,
            message: None,
            error: None,
        })
    }
}

fn start(delay: Duration) -> (Sender<BackendCommand>, Receiver<UiEvent>, thread::JoinHandle<()>) {
    let (cmd_tx, cmd_rx) = bounded(16);
    let (ui_tx, ui_rx) = bounded(16);
    let handle = launch(cmd_rx, ui_tx, Arc::new(FakeSource { delay }));
    match ui_rx.recv_timeout(Duration::from_secs(5)) {
        Ok(UiEvent::Info(text)) => assert_eq!(text, "Backend worker ready"),
        other => panic!("expected ready event, got {other:?}"),
    }
    (cmd_tx, ui_rx, handle)
}

fn load(view_id: ViewId, manager: &str) -> BackendCommand {
    BackendCommand::LoadRows {
        view_id,
        kind: ListingKind::Oneroom,
        manager: manager.into(),
        role: "staff".into(),
    }
}

fn stop(cmd_tx: Sender<BackendCommand>, handle: thread::JoinHandle<()>) {
    cmd_tx.send(BackendCommand::Shutdown).unwrap();
    handle.join().unwrap();
}

#[test]
fn load_delivers_rows_for_the_requesting_view() {
    let (cmd_tx, ui_rx, handle) = start(Duration::ZERO);
    cmd_tx.send(load(7, "Kim")).unwrap();

    match ui_rx.recv_timeout(Duration::from_secs(5)).unwrap() {
        UiEvent::RowsLoaded { view_id, listing } => {
            assert_eq!(view_id, 7);
            assert_eq!(listing.rows.len(), 1);
            assert_eq!(listing.rows[0].get("manager"), Some("Kim"));
        }
        other => panic!("unexpected event {other:?}"),
    }
    stop(cmd_tx, handle);
}

#[test]
fn load_failure_is_reported_with_view_context() {
    let (cmd_tx, ui_rx, handle) = start(Duration::ZERO);
    cmd_tx.send(load(3, "Nobody")).unwrap();

    match ui_rx.recv_timeout(Duration::from_secs(5)).unwrap() {
        UiEvent::Error(err) => {
            assert_eq!(err.context(), UiErrorContext::Load { view_id: 3 });
            assert!(err.message().contains("unknown manager"));
        }
        other => panic!("unexpected event {other:?}"),
    }
    stop(cmd_tx, handle);
}

#[test]
fn cancelled_view_never_receives_rows() {
    let (cmd_tx, ui_rx, handle) = start(Duration::from_millis(300));
    cmd_tx.send(load(9, "Kim")).unwrap();
    cmd_tx.send(BackendCommand::CancelView { view_id: 9 }).unwrap();

    assert!(matches!(
        ui_rx.recv_timeout(Duration::from_millis(800)),
        Err(RecvTimeoutError::Timeout)
    ));
    stop(cmd_tx, handle);
}

#[test]
fn save_completion_carries_id_assignments() {
    let (cmd_tx, ui_rx, handle) = start(Duration::ZERO);
    let mut added = serde_json::Map::new();
    added.insert("id".into(), serde_json::json!(-1));
    let request = SaveRequest {
        manager: "Kim".into(),
        added: vec![added],
        ..SaveRequest::default()
    };
    cmd_tx
        .send(BackendCommand::SaveChanges {
            view_id: 2,
            kind: ListingKind::Oneroom,
            request,
        })
        .unwrap();

    match ui_rx.recv_timeout(Duration::from_secs(5)).unwrap() {
        UiEvent::SaveCompleted {
            view_id,
            sent,
            assignments,
        } => {
            assert_eq!(view_id, 2);
            assert_eq!(sent.added.len(), 1);
            assert_eq!(assignments, vec![(-1, 500)]);
        }
        other => panic!("unexpected event {other:?}"),
    }
    stop(cmd_tx, handle);
}

#[test]
fn sending_without_an_open_channel_reports_an_error() {
    let (cmd_tx, ui_rx, handle) = start(Duration::ZERO);
    cmd_tx
        .send(BackendCommand::SendChannel {
            message: serde_json::Map::new(),
        })
        .unwrap();

    match ui_rx.recv_timeout(Duration::from_secs(5)).unwrap() {
        UiEvent::Error(err) => {
            assert_eq!(err.context(), UiErrorContext::Channel);
            assert!(err.message().contains("not connected"));
        }
        other => panic!("unexpected event {other:?}"),
    }
    stop(cmd_tx, handle);
}

#[test]
fn save_completion_waits_for_a_full_ui_queue() {
    let (cmd_tx, cmd_rx) = bounded(16);
    let (ui_tx, ui_rx) = bounded(1);
    let handle = launch(cmd_rx, ui_tx, Arc::new(FakeSource { delay: Duration::ZERO }));

    let mut added = serde_json::Map::new();
    added.insert("id".into(), serde_json::json!(-4));
    cmd_tx
        .send(BackendCommand::SaveChanges {
            view_id: 1,
            kind: ListingKind::Oneroom,
            request: SaveRequest {
                manager: "Kim".into(),
                added: vec![added],
                ..SaveRequest::default()
            },
        })
        .unwrap();
    // The ready notice still occupies the only slot while the save finishes.
    thread::sleep(Duration::from_millis(300));

    assert!(matches!(
        ui_rx.recv_timeout(Duration::from_secs(5)).unwrap(),
        UiEvent::Info(_)
    ));
    match ui_rx.recv_timeout(Duration::from_secs(5)).unwrap() {
        UiEvent::SaveCompleted { assignments, .. } => assert_eq!(assignments, vec![(-4, 500)]),
        other => panic!("unexpected event {other:?}"),
    }
    stop(cmd_tx, handle);
}
