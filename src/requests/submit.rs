use axum::{debug_handler, extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_sessions::Session;

use crate::{session, store::DocumentStore, workflow, AppResult, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RequestForm {
    service_type: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    room: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ComplaintForm {
    complaint_type: String,
    #[serde(default)]
    description: String,
}

#[debug_handler(state = AppState)]
pub(crate) async fn request(
    State(store): State<DocumentStore>,
    session: Session,
    Json(form): Json<RequestForm>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let principal = session::principal(&session).await?;
    let id = workflow::submit_request(
        &store,
        principal.as_ref(),
        &form.service_type,
        &form.description,
        &form.display_name,
        &form.room,
    ).await?;

    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

#[debug_handler(state = AppState)]
pub(crate) async fn complaint(
    State(store): State<DocumentStore>,
    session: Session,
    Json(form): Json<ComplaintForm>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let principal = session::principal(&session).await?;
    let id = workflow::submit_complaint(&store, principal.as_ref(), &form.complaint_type, &form.description).await?;

    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}
