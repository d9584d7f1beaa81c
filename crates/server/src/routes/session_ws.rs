//! WebSocket view of one game session.
//!
//! The server pushes a `snapshot` message whenever the session changes, so
//! the board keeps up with the computer's replies and the coach's comments
//! without polling. Clients may also drive the game over the same socket.

use std::sync::Arc;

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::Path,
    response::IntoResponse,
    Extension,
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};

use chess_core::rules::MoveIntent;

use crate::app::SessionRegistry;
use crate::difficulty::Difficulty;
use crate::error::AppError;
use crate::routes::games::lookup;
use crate::session::{MoveOutcome, SessionHandle, SessionSnapshot};

// ---- Message types ----

/// Server → Client messages
#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerMessage {
    Snapshot { snapshot: SessionSnapshot },
    MoveResult { outcome: MoveOutcome },
    Error { message: String },
}

/// Client → Server messages
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    Move {
        from: String,
        to: String,
        promotion: Option<String>,
    },
    Reset,
    Undo,
    SetDifficulty {
        difficulty: String,
    },
}

// ---- WebSocket handler ----

/// GET /api/games/{game_id}/ws
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Extension(registry): Extension<Arc<SessionRegistry>>,
    Path(game_id): Path<u64>,
) -> Result<impl IntoResponse, AppError> {
    let handle = lookup(&registry, game_id).await?;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, handle, game_id)))
}

async fn handle_socket(socket: WebSocket, handle: SessionHandle, game_id: u64) {
    let (mut sender, mut receiver) = socket.split();
    let mut snapshots = handle.subscribe();
    tracing::debug!(game_id, "Snapshot stream opened");

    let initial = snapshots.borrow_and_update().clone();
    if send(&mut sender, &ServerMessage::Snapshot { snapshot: initial })
        .await
        .is_err()
    {
        return;
    }

    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                if send(&mut sender, &ServerMessage::Snapshot { snapshot }).await.is_err() {
                    break;
                }
            }
            msg = receiver.next() => {
                let text = match msg {
                    Some(Ok(Message::Text(t))) => t.to_string(),
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(_)) => continue,
                };
                let reply = match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(client_msg) => dispatch(&handle, client_msg).await,
                    Err(e) => ServerMessage::Error {
                        message: format!("Invalid message: {}", e),
                    },
                };
                if send(&mut sender, &reply).await.is_err() {
                    break;
                }
            }
        }
    }

    tracing::debug!(game_id, "Snapshot stream closed");
}

async fn dispatch(handle: &SessionHandle, msg: ClientMessage) -> ServerMessage {
    let result = match msg {
        ClientMessage::Move {
            from,
            to,
            promotion,
        } => match MoveIntent::parse(&from, &to, promotion.as_deref()) {
            Ok(intent) => handle
                .apply_move(intent)
                .await
                .map(|outcome| ServerMessage::MoveResult { outcome })
                .map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        },
        ClientMessage::Reset => handle
            .reset()
            .await
            .map(|snapshot| ServerMessage::Snapshot { snapshot })
            .map_err(|e| e.to_string()),
        ClientMessage::Undo => handle
            .undo()
            .await
            .map(|snapshot| ServerMessage::Snapshot { snapshot })
            .map_err(|e| e.to_string()),
        ClientMessage::SetDifficulty { difficulty } => {
            match difficulty.parse::<Difficulty>() {
                Ok(level) => handle
                    .set_difficulty(level)
                    .await
                    .map(|snapshot| ServerMessage::Snapshot { snapshot })
                    .map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            }
        }
    };
    result.unwrap_or_else(|message| ServerMessage::Error { message })
}

async fn send(
    sender: &mut SplitSink<WebSocket, Message>,
    msg: &ServerMessage,
) -> Result<(), axum::Error> {
    let text = match serde_json::to_string(msg) {
        Ok(t) => t,
        Err(e) => {
            tracing::error!("Failed to encode message: {e}");
            return Ok(());
        }
    };
    sender.send(Message::Text(text.into())).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_messages_parse() {
        let mv: ClientMessage =
            serde_json::from_str(r#"{"type":"move","from":"e7","to":"e8","promotion":"q"}"#)
                .unwrap();
        assert!(matches!(mv, ClientMessage::Move { promotion: Some(ref p), .. } if p == "q"));

        let reset: ClientMessage = serde_json::from_str(r#"{"type":"reset"}"#).unwrap();
        assert!(matches!(reset, ClientMessage::Reset));

        let level: ClientMessage =
            serde_json::from_str(r#"{"type":"set_difficulty","difficulty":"hard"}"#).unwrap();
        assert!(matches!(level, ClientMessage::SetDifficulty { .. }));

        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"resign"}"#).is_err());
    }

    #[test]
    fn test_error_message_shape() {
        let json = serde_json::to_value(ServerMessage::Error {
            message: "nope".into(),
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({ "type": "error", "message": "nope" }));
    }
}
