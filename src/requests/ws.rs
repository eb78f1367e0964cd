use axum::{debug_handler, extract::{ws::Message, State, WebSocketUpgrade}, response::{IntoResponse, Response}};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::mpsc;
use tower_sessions::Session;
use tracing::debug;

use crate::{session, store::{Collection, DocumentStore}, AppResult, AppState};

/// Live feed of the caller's own requests. Every message is the full list,
/// newest first: `{"items": [...]}`, or `{"error": "..."}` when a refresh failed.
#[debug_handler(state = AppState)]
pub(crate) async fn requests_ws(
    State(store): State<DocumentStore>,
    session: Session,

    ws: WebSocketUpgrade,
) -> AppResult<Response> {
    let principal = session::require_principal(&session).await?;

    Ok(ws.on_upgrade(async move |stream| {
        let (mut sender, mut receiver) = stream.split();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let subscription = store.subscribe(Collection::Requests, "uid", principal.uid.clone().into(), move |snapshot| {
            let _ = tx.send(snapshot);
        });

        let mut forward_task = tokio::spawn(async move {
            while let Some(snapshot) = rx.recv().await {
                let body = match snapshot {
                    Ok(items) => json!({ "items": items }),
                    Err(e) => json!({ "error": e.to_string() }),
                };
                if sender.send(Message::Text(body.to_string().into())).await.is_err() {
                    break;
                }
            }
        });

        // clients only ever close; anything else they send is ignored
        let mut recv_task = tokio::spawn(async move {
            while let Some(Ok(msg)) = receiver.next().await {
                if matches!(msg, Message::Close(_)) {
                    break;
                }
            }
        });

        tokio::select! {
            _ = &mut forward_task => recv_task.abort(),
            _ = &mut recv_task => forward_task.abort(),
        };

        subscription.close();
        debug!("live feed for u/{} closed", principal.uid);
    }).into_response())
}
