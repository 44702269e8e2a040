//! Real-time socket sessions.
//!
//! A session is one bus subscription plus the caller's identity, if any. Everything
//! committed while the session is open is forwarded as an `alertUpdate` or
//! `alertRemoved` frame; nothing is replayed on reconnect.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::HeaderMap,
    response::Response,
};
use futures::{stream::SplitSink, SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::auth::{bearer_token, Actor};
use crate::error::AppError;
use crate::protocol::{self, ClientFrame, ServerFrame};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct SocketParams {
    pub token: Option<String>,
}

/// Anonymous sessions are allowed and receive broadcasts; a token that is present but
/// invalid is refused before the upgrade.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<SocketParams>,
) -> Result<Response, AppError> {
    let actor = session_actor(&state, &headers, params.token.as_deref())?;
    Ok(ws.on_upgrade(move |socket| run_session(socket, state, actor)))
}

fn session_actor(
    state: &AppState,
    headers: &HeaderMap,
    query_token: Option<&str>,
) -> Result<Option<Actor>, AppError> {
    let token = bearer_token(headers).or(query_token.filter(|t| !t.trim().is_empty()));
    token.map(|t| state.tokens.verify(t.trim())).transpose()
}

async fn run_session(socket: WebSocket, state: AppState, actor: Option<Actor>) {
    let (mut sender, mut receiver) = socket.split();
    let mut subscription = state.bus().subscribe();
    let session = subscription.id();
    info!(
        session,
        user = actor.as_ref().map(|a| a.id.as_str()).unwrap_or("anonymous"),
        "Socket connected"
    );

    loop {
        tokio::select! {
            event = subscription.recv() => {
                let Some(event) = event else { break };
                if send_frame(&mut sender, &ServerFrame::from(event)).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    if let Some(reply) = handle_client_text(&state, actor.as_ref(), text.as_str()).await {
                        if send_frame(&mut sender, &reply).await.is_err() {
                            break;
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(session, error = %e, "Socket receive failed");
                    break;
                }
            },
        }
    }

    state.bus().unsubscribe(&mut subscription);
    info!(session, "Socket disconnected");
}

async fn send_frame(
    sender: &mut SplitSink<WebSocket, Message>,
    frame: &ServerFrame,
) -> Result<(), AppError> {
    let text = frame
        .to_json()
        .map_err(|e| AppError::Internal(format!("frame encoding failed: {e}")))?;
    sender
        .send(Message::Text(text.into()))
        .await
        .map_err(|e| AppError::Internal(format!("socket send failed: {e}")))
}

/// Handles one inbound text frame and returns the frame to send back, if any.
///
/// A successful `newAlert` gets no direct reply: the committed record reaches this
/// session through the bus like every other subscriber.
pub(crate) async fn handle_client_text(
    state: &AppState,
    actor: Option<&Actor>,
    text: &str,
) -> Option<ServerFrame> {
    let frame: ClientFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            debug!(error = %e, "Ignoring malformed client frame");
            return Some(ServerFrame::error(format!("Malformed frame: {e}")));
        }
    };

    match frame {
        ClientFrame::Ping => None,
        ClientFrame::NewAlert(payload) => {
            let Some(actor) = actor else {
                return Some(ServerFrame::error(
                    AppError::Unauthenticated("no token".into()).to_string(),
                ));
            };
            match state.alerts.create(payload, actor).await {
                Ok(_) => None,
                Err(e) => {
                    warn!(event = protocol::NEW_ALERT, error = %e, "Socket create rejected");
                    Some(ServerFrame::error(e.to_string()))
                }
            }
        }
    }
}
