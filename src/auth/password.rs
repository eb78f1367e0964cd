use axum::{debug_handler, extract::State, http::StatusCode, response::{IntoResponse, Response}, Json};
use serde::Deserialize;
use serde_json::json;
use tower_sessions::Session;

use crate::{identity::ProfileFields, session, AppResult, AppState};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SignUpForm {
    email: String,
    password: String,
    username: String,
    /// `"HOSTEL-ROOM"`, as typed into the single sign-up field.
    hostel_room: String,
}

#[derive(Deserialize)]
pub(crate) struct SignInForm {
    email: String,
    password: String,
}

fn missing(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}

#[debug_handler]
pub(crate) async fn sign_up(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<SignUpForm>,
) -> AppResult<Response> {
    let email = form.email.trim();
    let password = form.password.trim();
    if [email, password, form.username.trim(), form.hostel_room.trim()].iter().any(|s| s.is_empty()) {
        return Ok(missing("All fields are required."));
    }

    let profile = ProfileFields::from_hostel_room(&form.username, &form.hostel_room);
    let principal = state.gateway().sign_up(email, password, profile).await?;
    session::sign_in(&session, &principal).await?;

    Ok((StatusCode::CREATED, Json(principal)).into_response())
}

#[debug_handler]
pub(crate) async fn sign_in(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<SignInForm>,
) -> AppResult<Response> {
    let email = form.email.trim();
    let password = form.password.trim();
    if email.is_empty() || password.is_empty() {
        return Ok(missing("Please enter email & password."));
    }

    let principal = state.gateway().sign_in(email, password).await?;
    session::sign_in(&session, &principal).await?;

    Ok(Json(principal).into_response())
}
