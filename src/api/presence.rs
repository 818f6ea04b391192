/// WebSocket presence endpoint
///
/// Clients connect to /api/prompts/:id/presence?token=<access token>.
/// The server sends a snapshot frame, then join/leave frames as viewers
/// come and go. Clients send the text message "heartbeat" to stay alive;
/// silent connections are swept by the background job.
use crate::{
    context::AppContext,
    metrics,
    presence::{PresenceFrame, ViewerInfo},
};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use tokio::time::{interval, Duration};

const PING_INTERVAL_SECS: u64 = 30;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/prompts/:id/presence", get(subscribe))
        .route("/api/prompts/:id/viewers", get(viewers))
}

#[derive(Debug, Deserialize)]
struct PresenceParams {
    /// Access token; WebSocket clients cannot set an Authorization header
    token: String,
}

/// Current viewer snapshot without opening a socket
async fn viewers(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Json<Vec<ViewerInfo>> {
    Json(ctx.presence.viewers(&id).await)
}

async fn subscribe(
    ws: WebSocketUpgrade,
    Path(prompt_id): Path<String>,
    Query(params): Query<PresenceParams>,
    State(ctx): State<AppContext>,
) -> Response {
    // Authenticate and authorize before upgrading
    let session = match ctx.account_manager.validate_access_token(&params.token).await {
        Ok(session) => session,
        Err(e) => return e.into_response(),
    };
    if let Err(e) = ctx
        .prompt_store
        .get_visible(&prompt_id, Some(&session.user_id))
        .await
    {
        return e.into_response();
    }

    ws.on_upgrade(move |socket| handle_presence(socket, prompt_id, session, ctx))
}

async fn handle_presence(
    socket: WebSocket,
    prompt_id: String,
    session: crate::account::ValidatedSession,
    ctx: AppContext,
) {
    let (mut sender, mut receiver) = socket.split();

    let (mut frames, snapshot) = ctx
        .presence
        .join(&prompt_id, &session.user_id, &session.handle)
        .await;
    metrics::PRESENCE_VIEWERS.inc();

    // The snapshot goes out first so the client can render the room
    let snapshot_frame = PresenceFrame::Snapshot { viewers: snapshot };
    if send_frame(&mut sender, &snapshot_frame).await.is_err() {
        ctx.presence.leave(&prompt_id, &session.user_id).await;
        metrics::PRESENCE_VIEWERS.dec();
        return;
    }

    let mut ping_interval = interval(Duration::from_secs(PING_INTERVAL_SECS));
    // The first tick fires immediately
    ping_interval.tick().await;

    loop {
        tokio::select! {
            frame = frames.recv() => {
                match frame {
                    Ok(frame) => {
                        if send_frame(&mut sender, &frame).await.is_err() {
                            break;
                        }
                    }
                    // Lagged receivers missed frames; resync with a snapshot
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {
                        let viewers = ctx.presence.viewers(&prompt_id).await;
                        let frame = PresenceFrame::Snapshot { viewers };
                        if send_frame(&mut sender, &frame).await.is_err() {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }

            _ = ping_interval.tick() => {
                if sender.send(Message::Ping(vec![])).await.is_err() {
                    break;
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) if text == "heartbeat" => {
                        ctx.presence.heartbeat(&prompt_id, &session.user_id).await;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        ctx.presence.heartbeat(&prompt_id, &session.user_id).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::debug!("Presence socket error: {}", e);
                        break;
                    }
                }
            }
        }
    }

    ctx.presence.leave(&prompt_id, &session.user_id).await;
    metrics::PRESENCE_VIEWERS.dec();
}

async fn send_frame(
    sender: &mut futures::stream::SplitSink<WebSocket, Message>,
    frame: &PresenceFrame,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(frame).unwrap_or_default();
    sender.send(Message::Text(json)).await
}
