mod feed;
mod submit;
mod ws;

use axum::{routing::{get, post}, Router};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/requests", post(submit::request))
        .route("/requests/mine", get(feed::mine))
        .route("/requests/live", get(ws::requests_ws))
        .route("/complaints", post(submit::complaint))
        .route("/log", get(feed::public_log))
}
