/// The per-device monitoring session: one WebSocket, one collector.
///
/// On upgrade, a collector is built for the serial with an mpsc event
/// channel as its sink. The session loop multiplexes collector events out to
/// the socket against client commands coming in (`start` with an optional
/// target package, `stop`). While recording, monitor samples are teed into
/// the CSV recorder. Disconnect stops the collector and finalizes the file.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use perf_collector::adb::AdbShell;
use perf_collector::Collector;
use perf_protocol::events::Event;

use crate::config::SCREENSHOT_MOUNT;
use crate::recorder::Recorder;
use crate::state::AppState;

/// Collector → socket event channel capacity. Applies backpressure to the
/// sampling loops if a client stops draining.
const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientCommand {
    Start { target: Option<String> },
    Stop,
}

pub async fn ws_monitor_handler(
    ws: WebSocketUpgrade,
    Path(serial): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_monitor_ws(socket, serial, state))
}

async fn handle_monitor_ws(mut socket: WebSocket, serial: String, state: AppState) {
    info!(serial = %serial, "monitor client connected");
    state.register_session(&serial).await;

    let (events_tx, mut events_rx) = mpsc::channel::<Event>(EVENT_CHANNEL_CAPACITY);
    let shell = AdbShell::new(&state.inner.config.adb.binary, &serial);
    let collector = Collector::new(
        &serial,
        shell,
        events_tx,
        &state.inner.config.storage.screenshot_dir,
        SCREENSHOT_MOUNT,
    );
    let record_dir = state.inner.config.storage.record_dir.join(&serial);
    let mut recorder: Option<Recorder> = None;

    loop {
        tokio::select! {
            event = events_rx.recv() => {
                let Some(event) = event else { break };

                if let (Some(rec), Event::Monitor(sample)) = (recorder.as_mut(), &event) {
                    if let Err(e) = rec.write(sample) {
                        error!(serial = %serial, error = %e, "record write failed");
                    }
                }

                let payload = match serde_json::to_string(&event) {
                    Ok(p) => p,
                    Err(e) => {
                        error!(serial = %serial, error = %e, "event serialization failed");
                        continue;
                    }
                };
                if socket.send(Message::Text(payload)).await.is_err() {
                    break; // client disconnected
                }
            }

            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientCommand>(&text) {
                            Ok(ClientCommand::Start { target }) => {
                                if let Some(ref package) = target {
                                    collector.set_target(package.clone()).await;
                                }
                                if !collector.is_running() {
                                    collector.start().await;
                                }
                                match Recorder::create(&record_dir, target.as_deref()) {
                                    Ok(rec) => recorder = Some(rec),
                                    Err(e) => {
                                        error!(serial = %serial, error = %e, "failed to start recording");
                                    }
                                }
                            }
                            Ok(ClientCommand::Stop) => {
                                collector.stop();
                                if let Some(rec) = recorder.take() {
                                    rec.finalize();
                                }
                            }
                            Err(e) => {
                                debug!(serial = %serial, error = %e, "ignoring malformed command");
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        debug!(serial = %serial, error = %e, "socket error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    collector.stop();
    if let Some(rec) = recorder.take() {
        rec.finalize();
    }
    state.unregister_session(&serial).await;
    info!(serial = %serial, "monitor client disconnected");
}
