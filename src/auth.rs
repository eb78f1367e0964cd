mod lockin;
mod login;
mod logout;
mod password;

use axum::{debug_handler, extract::State, routing::{get, post}, Json, Router};
use serde_json::{json, Value};
use tower_sessions::Session;

use crate::{session, AppResult, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/signup", post(password::sign_up))
        .route("/signin", post(password::sign_in))
        .route("/login/{provider}", get(login::login))
        .route("/lockin/{provider}", get(lockin::lockin))
        .route("/logout", get(logout::logout))
        .route("/me", get(me))
}

/// The signed-in principal and their profile, for pre-filling forms.
#[debug_handler]
async fn me(
    State(state): State<AppState>,
    session: Session,
) -> AppResult<Json<Value>> {
    let principal = session::require_principal(&session).await?;
    let profile = state.gateway().profile(&principal.uid).await?;

    Ok(Json(json!({
        "principal": principal,
        "profile": profile,
    })))
}
