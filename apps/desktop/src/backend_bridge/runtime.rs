//! Backend worker thread: a tokio runtime that turns queued commands into
//! network calls and reports every completion back as a [`UiEvent`].

use std::{collections::HashMap, sync::Arc, thread, time::Duration};

use crossbeam_channel::{Receiver, Sender};
use listing_core::{ChannelConnection, ChannelSender, ListingSource};
use tokio::{sync::Mutex, task::JoinHandle};

use crate::backend_bridge::commands::{BackendCommand, ViewId};
use crate::controller::events::{UiError, UiErrorContext, UiEvent};

const SAVE_DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

pub fn launch(
    cmd_rx: Receiver<BackendCommand>,
    ui_tx: Sender<UiEvent>,
    source: Arc<dyn ListingSource>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => {
                let _ = ui_tx.try_send(UiEvent::Error(UiError::from_message(
                    UiErrorContext::BackendStartup,
                    format!("failed to build backend runtime: {err}"),
                )));
                tracing::error!("failed to build backend runtime: {err}");
                return;
            }
        };
        runtime.block_on(run_backend(cmd_rx, ui_tx, source));
    })
}

async fn run_backend(
    cmd_rx: Receiver<BackendCommand>,
    ui_tx: Sender<UiEvent>,
    source: Arc<dyn ListingSource>,
) {
    let mut loads: HashMap<ViewId, JoinHandle<()>> = HashMap::new();
    let channel_sender: Arc<Mutex<Option<ChannelSender>>> = Arc::new(Mutex::new(None));
    let mut channel_task: Option<JoinHandle<()>> = None;
    let _ = ui_tx.try_send(UiEvent::Info("Backend worker ready".to_string()));

    while let Ok(cmd) = cmd_rx.recv() {
        loads.retain(|_, task| !task.is_finished());
        match cmd {
            BackendCommand::LoadRows {
                view_id,
                kind,
                manager,
                role,
            } => {
                if let Some(previous) = loads.remove(&view_id) {
                    previous.abort();
                }
                let source = Arc::clone(&source);
                let ui_tx = ui_tx.clone();
                let task = tokio::spawn(async move {
                    let event = match source.fetch_rows(kind, &manager, &role).await {
                        Ok(listing) => UiEvent::RowsLoaded { view_id, listing },
                        Err(err) => {
                            tracing::warn!(view_id, "backend: load failed: {err}");
                            UiEvent::Error(UiError::from_listing(
                                UiErrorContext::Load { view_id },
                                &err,
                            ))
                        }
                    };
                    let _ = ui_tx.try_send(event);
                });
                loads.insert(view_id, task);
            }
            BackendCommand::SaveChanges {
                view_id,
                kind,
                request,
            } => {
                let source = Arc::clone(&source);
                let ui_tx = ui_tx.clone();
                tokio::spawn(async move {
                    let event = match source.save_changes(kind, &request).await {
                        Ok(response) => UiEvent::SaveCompleted {
                            view_id,
                            assignments: response.id_assignments(),
                            sent: request,
                        },
                        Err(err) => {
                            tracing::warn!(view_id, "backend: save failed: {err}");
                            UiEvent::Error(UiError::from_listing(
                                UiErrorContext::Save { view_id },
                                &err,
                            ))
                        }
                    };
                    // A committed save must reach the UI even when its queue is full.
                    let delivered = tokio::task::spawn_blocking(move || {
                        ui_tx.send_timeout(event, SAVE_DELIVERY_TIMEOUT)
                    })
                    .await;
                    if !matches!(delivered, Ok(Ok(()))) {
                        tracing::error!(view_id, "backend: ui loop not draining, save result lost");
                    }
                });
            }
            BackendCommand::CancelView { view_id } => {
                if let Some(task) = loads.remove(&view_id) {
                    task.abort();
                    tracing::info!(view_id, "backend: cancelled in-flight load");
                }
            }
            BackendCommand::OpenChannel { url } => {
                if let Some(task) = channel_task.take() {
                    task.abort();
                }
                let slot = Arc::clone(&channel_sender);
                let ui_tx = ui_tx.clone();
                channel_task = Some(tokio::spawn(async move {
                    let mut connection = match ChannelConnection::connect(&url).await {
                        Ok(connection) => connection,
                        Err(err) => {
                            let _ = ui_tx.try_send(UiEvent::Error(UiError::from_message(
                                UiErrorContext::Channel,
                                format!("{err:#}"),
                            )));
                            return;
                        }
                    };
                    *slot.lock().await = Some(connection.sender());
                    let _ = ui_tx.try_send(UiEvent::Info(format!("Channel connected: {url}")));
                    while let Some(message) = connection.recv().await {
                        if ui_tx.try_send(UiEvent::ChannelMessage(message)).is_err() {
                            tracing::warn!("backend: ui queue full, dropping channel message");
                        }
                    }
                    *slot.lock().await = None;
                    let _ = ui_tx.try_send(UiEvent::Info("Channel closed".to_string()));
                }));
            }
            BackendCommand::SendChannel { message } => {
                let slot = Arc::clone(&channel_sender);
                let ui_tx = ui_tx.clone();
                tokio::spawn(async move {
                    let sender = slot.lock().await.clone();
                    let result = match sender {
                        Some(sender) => sender.send(&message).await,
                        None => Err(anyhow::anyhow!("channel is not connected")),
                    };
                    if let Err(err) = result {
                        let _ = ui_tx.try_send(UiEvent::Error(UiError::from_message(
                            UiErrorContext::Channel,
                            format!("{err:#}"),
                        )));
                    }
                });
            }
            BackendCommand::Shutdown => break,
        }
    }

    for (_, task) in loads.drain() {
        task.abort();
    }
    if let Some(task) = channel_task {
        task.abort();
    }
    tracing::info!("backend worker stopped");
}

#[cfg(test)]
#[path = "../tests/runtime_tests.rs"]
mod tests;
