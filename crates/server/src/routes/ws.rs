use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use shared::{FeedEvent, FeedRequest};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{
    error::AppError,
    routes::{extract::user_id_from_token, ApiQuery},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct FeedParams {
    pub token: String,
}

/// GET /ws/messages?token=
///
/// Browsers cannot set headers on a WebSocket handshake, so the JWT rides in the query.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<FeedParams>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = user_id_from_token(&params.token, &state.config.auth.jwt_secret)?;
    let is_admin = state.db.get_active_admin(&user_id.to_string()).await?.is_some();

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, user_id, is_admin)))
}

/// Whether this caller may follow the order's thread
async fn may_subscribe(state: &AppState, user_id: Uuid, is_admin: bool, order_id: Uuid) -> bool {
    match state.db.get_order(&order_id.to_string()).await {
        Ok(Some(order)) => is_admin || order.user_id == user_id.to_string(),
        Ok(None) => false,
        Err(e) => {
            tracing::error!("Failed to load order {} for feed: {}", order_id, e);
            false
        }
    }
}

async fn handle_socket(socket: WebSocket, state: AppState, user_id: Uuid, is_admin: bool) {
    let (mut sender, mut receiver) = socket.split();
    let connection_id = Uuid::new_v4();

    // Channel for events to this client
    let (tx, mut rx) = mpsc::channel::<FeedEvent>(32);
    state.hub.register(connection_id, tx);

    // Task to forward events from channel to WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!("Failed to encode feed event: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    tracing::info!("Feed client connected: {} (user {}, admin: {})", connection_id, user_id, is_admin);

    while let Some(Ok(msg)) = receiver.next().await {
        let text = match msg {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };

        let reply = match serde_json::from_str::<FeedRequest>(&text) {
            Ok(FeedRequest::Subscribe { order_id }) => {
                if may_subscribe(&state, user_id, is_admin, order_id).await
                    && state.hub.subscribe(connection_id, order_id)
                {
                    FeedEvent::Subscribed { order_id }
                } else {
                    FeedEvent::error(format!("Cannot subscribe to order {}", order_id))
                }
            }
            Ok(FeedRequest::Unsubscribe { order_id }) => {
                state.hub.unsubscribe(&connection_id, &order_id);
                FeedEvent::Unsubscribed { order_id }
            }
            Ok(FeedRequest::Ping) => FeedEvent::Pong,
            Err(e) => {
                tracing::warn!("Failed to parse feed request: {}", e);
                FeedEvent::error("Invalid request")
            }
        };

        if !state.hub.send_to(&connection_id, reply).await {
            break;
        }
    }

    // Cleanup
    state.hub.unregister(&connection_id);
    send_task.abort();
    tracing::info!("Feed client disconnected: {}", connection_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::{create_user, insert_order, make_admin, test_app};

    #[tokio::test]
    async fn test_subscription_rules() {
        let (_, state) = test_app().await;
        let (owner_id, _) = create_user(&state, "owner@example.com").await;
        let (stranger_id, _) = create_user(&state, "stranger@example.com").await;
        let (admin_id, _) = create_user(&state, "admin@example.com").await;
        make_admin(&state, admin_id).await;
        let order_id = insert_order(&state, owner_id, "pending", "pending", 4999).await;

        assert!(may_subscribe(&state, owner_id, false, order_id).await);
        assert!(!may_subscribe(&state, stranger_id, false, order_id).await);
        assert!(may_subscribe(&state, admin_id, true, order_id).await);
        assert!(!may_subscribe(&state, owner_id, false, Uuid::new_v4()).await);
    }

    #[tokio::test]
    async fn test_handshake_requires_valid_token() {
        use crate::routes::test_support::send;
        use axum::http::{Method, StatusCode};

        let (app, _) = test_app().await;
        let (status, _) = send(&app, Method::GET, "/ws/messages?token=garbage", None, None).await;
        assert!(status.is_client_error());
        assert_ne!(status, StatusCode::SWITCHING_PROTOCOLS);
    }
}
