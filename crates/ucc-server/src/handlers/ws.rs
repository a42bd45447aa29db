//! `GET /ws/jobs/{job_id}` — streams `ProgressFrame`s until a terminal
//! frame, then closes (`spec.md` §4.11, §6). This is the redesign `spec.md`
//! §9 calls for: the bus, not this handler, owns fan-out; the handler only
//! subscribes and forwards.

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use uuid::Uuid;

use ucc_orchestrator::{FrameType, ProgressFrame};

use crate::state::AppState;

const CLOSE_NORMAL: u16 = 1000;
const CLOSE_SERVER_ERROR: u16 = 1011;

pub async fn job_progress_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, job_id))
}

async fn handle_socket(mut socket: WebSocket, state: AppState, job_id: Uuid) {
    let fallback = match state.job_store.get(job_id).await {
        Ok(job) => ProgressFrame {
            frame_type: FrameType::Initial,
            job_id,
            status: job.status,
            segment: Some(job.current_segment),
            segment_name: Some(job.current_segment_name),
            progress_pct: Some(job.progress_pct),
            error_message: job.error_message,
            timestamp: chrono::Utc::now(),
        },
        Err(_) => {
            let _ = send_close(&mut socket, CLOSE_SERVER_ERROR, "unknown job").await;
            return;
        }
    };

    let (initial, mut rx) = state.progress.subscribe(job_id, fallback).await;
    let initial_is_terminal = initial.status.is_terminal();
    if send_frame(&mut socket, &initial).await.is_err() {
        return;
    }
    if initial_is_terminal {
        let _ = send_close(&mut socket, CLOSE_NORMAL, "already terminal").await;
        return;
    }

    loop {
        tokio::select! {
            frame = rx.recv() => {
                match frame {
                    Ok(frame) => {
                        let terminal = matches!(frame.frame_type, FrameType::Final) || frame.status.is_terminal();
                        if send_frame(&mut socket, &frame).await.is_err() {
                            return;
                        }
                        if terminal {
                            let _ = send_close(&mut socket, CLOSE_NORMAL, "job finished").await;
                            return;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                        let _ = send_close(&mut socket, CLOSE_NORMAL, "topic closed").await;
                        return;
                    }
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    None | Some(Err(_)) => return,
                    Some(Ok(Message::Close(_))) => return,
                    Some(Ok(_)) => continue,
                }
            }
        }
    }
}

async fn send_frame(socket: &mut WebSocket, frame: &ProgressFrame) -> Result<(), axum::Error> {
    let text = serde_json::to_string(frame).unwrap_or_else(|_| "{}".to_string());
    socket.send(Message::Text(text)).await
}

async fn send_close(socket: &mut WebSocket, code: u16, reason: &str) -> Result<(), axum::Error> {
    socket
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.to_string().into(),
        })))
        .await
}
