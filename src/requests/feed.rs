use axum::{debug_handler, extract::State, Json};
use tower_sessions::Session;

use crate::{session, store::{Document, DocumentStore}, workflow::{self, LogEntry}, AppResult, AppState};

#[debug_handler(state = AppState)]
pub(crate) async fn mine(
    State(store): State<DocumentStore>,
    session: Session,
) -> AppResult<Json<Vec<Document>>> {
    let principal = session::require_principal(&session).await?;
    Ok(Json(workflow::user_requests(&store, &principal.uid).await?))
}

/// Every request and complaint, for the public history table.
#[debug_handler(state = AppState)]
pub(crate) async fn public_log(
    State(store): State<DocumentStore>,
) -> Json<Vec<LogEntry>> {
    Json(workflow::public_log(&store).await)
}
