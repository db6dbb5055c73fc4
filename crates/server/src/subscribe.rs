//! Live subscriptions over a WebSocket at `GET /subscribe`.
//!
//! A client subscribes a [`ReadRequest`] under an id of its choosing and
//! receives the result again after every change that can affect it.
//! Subscription ids only have to be unique within one connection.

use axum::{
    Extension,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use engine::{Push, ReadRequest, ReadResponse};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{message_for_engine_error, server::ServerState, user};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    Subscribe {
        subscription_id: String,
        request: ReadRequest,
    },
    Unsubscribe {
        subscription_id: String,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    Subscribed {
        subscription_id: String,
    },
    Unsubscribed {
        subscription_id: String,
    },
    Push {
        subscription_id: String,
        result: Option<ReadResponse>,
        error: Option<String>,
    },
    Error {
        subscription_id: Option<String>,
        error: String,
    },
}

pub async fn upgrade(
    ws: WebSocketUpgrade,
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
) -> Response {
    ws.on_upgrade(move |socket| session(socket, state, user.username))
}

fn scoped(session_id: &str, subscription_id: &str) -> String {
    format!("{session_id}/{subscription_id}")
}

fn unscoped(session_id: &str, push: Push) -> ServerMessage {
    let subscription_id = push
        .subscription_id
        .strip_prefix(session_id)
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or(&push.subscription_id)
        .to_string();
    ServerMessage::Push {
        subscription_id,
        result: push.result,
        error: push.error,
    }
}

async fn send(socket: &mut WebSocket, message: &ServerMessage) -> Result<(), axum::Error> {
    let text = match serde_json::to_string(message) {
        Ok(text) => text,
        Err(err) => {
            tracing::error!("failed to encode message: {err}");
            return Ok(());
        }
    };
    socket.send(Message::Text(text.into())).await
}

async fn handle_client_message(
    state: &ServerState,
    session_id: &str,
    user_id: &str,
    text: &str,
    pushes: &mpsc::UnboundedSender<Push>,
) -> ServerMessage {
    let message: ClientMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(err) => {
            return ServerMessage::Error {
                subscription_id: None,
                error: format!("invalid message: {err}"),
            };
        }
    };

    match message {
        ClientMessage::Subscribe {
            subscription_id,
            request,
        } => {
            let scoped_id = scoped(session_id, &subscription_id);
            match state
                .engine
                .subscribe(&scoped_id, request, user_id, session_id, pushes.clone())
                .await
            {
                Ok(()) => ServerMessage::Subscribed { subscription_id },
                Err(err) => ServerMessage::Error {
                    subscription_id: Some(subscription_id),
                    error: message_for_engine_error(err),
                },
            }
        }
        ClientMessage::Unsubscribe { subscription_id } => {
            state
                .engine
                .unsubscribe(&scoped(session_id, &subscription_id));
            ServerMessage::Unsubscribed { subscription_id }
        }
    }
}

async fn session(mut socket: WebSocket, state: ServerState, user_id: String) {
    let session_id = Uuid::new_v4().to_string();
    let (sender, mut pushes) = mpsc::unbounded_channel();
    tracing::debug!(session_id = %session_id, user_id = %user_id, "subscription session opened");

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                let message = match incoming {
                    Some(Ok(message)) => message,
                    Some(Err(err)) => {
                        tracing::debug!(session_id = %session_id, "socket error: {err}");
                        break;
                    }
                    None => break,
                };
                match message {
                    Message::Text(text) => {
                        let reply = handle_client_message(
                            &state,
                            &session_id,
                            &user_id,
                            text.as_str(),
                            &sender,
                        )
                        .await;
                        if send(&mut socket, &reply).await.is_err() {
                            break;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(push) = pushes.recv() => {
                if send(&mut socket, &unscoped(&session_id, push)).await.is_err() {
                    break;
                }
            }
        }
    }

    state.engine.unsubscribe_session(&session_id);
    tracing::debug!(session_id = %session_id, "subscription session closed");
}
