use axum::{debug_handler, extract::{Query, State}, response::Redirect};
use serde::Deserialize;
use tower_sessions::Session;

use crate::{session, AppResult, AppState};

#[derive(Deserialize)]
pub(crate) struct LogoutQuery {
    pub(crate) return_url: Option<String>,
}

/// Signing out twice is the same as once.
#[debug_handler]
pub(crate) async fn logout(
    Query(LogoutQuery { return_url }): Query<LogoutQuery>,
    State(state): State<AppState>,
    session: Session,
) -> AppResult<Redirect> {
    if let Some(principal) = session::principal(&session).await? {
        let gateway = state.gateway();
        gateway.sign_out().await?;
        tracing::info!("goodbye u/{}", principal.uid);
    }
    session.flush().await?;
    Ok(Redirect::to(return_url.unwrap_or("/".to_string()).as_str()))
}
