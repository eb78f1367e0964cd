use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, Response, StatusCode},
    Router,
};
use fixitnow::{
    auth,
    identity::{AnyIdentity, Clients, EmulatorIdentity},
    requests,
    store::{Collection, DocumentStore},
    AppState,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use tower_sessions::{MemoryStore, SessionManagerLayer};

async fn app() -> (Router, DocumentStore) {
    let store = DocumentStore::in_memory().await.unwrap();
    let state = AppState {
        store: store.clone(),
        identity: Arc::new(AnyIdentity::Emulator(EmulatorIdentity::default())),
        clients: Clients::default(),
    };
    let app = Router::new()
        .merge(auth::router())
        .merge(requests::router())
        .with_state(state)
        .layer(SessionManagerLayer::new(MemoryStore::default()).with_secure(false));
    (app, store)
}

fn post_json(uri: &str, cookie: Option<&str>, body: Value) -> Request<Body> {
    let mut req = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        req = req.header(header::COOKIE, cookie);
    }
    req.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut req = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        req = req.header(header::COOKIE, cookie);
    }
    req.body(Body::empty()).unwrap()
}

async fn json_body(res: Response<Body>) -> Value {
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Signs a fresh resident up and returns the session cookie.
async fn signed_up(app: &Router, email: &str) -> String {
    let res = app
        .clone()
        .oneshot(post_json("/signup", None, json!({
            "email": email,
            "password": "hunter22",
            "username": "Res",
            "hostelRoom": "H1-12",
        })))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let set_cookie = res.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
    set_cookie.split(';').next().unwrap().to_owned()
}

#[tokio::test]
async fn me_follows_the_session() {
    let (app, _) = app().await;

    let anonymous = app.clone().oneshot(get("/me", None)).await.unwrap();
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let cookie = signed_up(&app, "me@example.com").await;
    let res = app.clone().oneshot(get("/me", Some(&cookie))).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = json_body(res).await;
    assert_eq!(body["principal"]["email"], "me@example.com");
    assert_eq!(body["profile"]["hostel"], "H1");

    let res = app.clone().oneshot(get("/logout", Some(&cookie))).await.unwrap();
    assert!(res.status().is_redirection());
    let after = app.clone().oneshot(get("/me", Some(&cookie))).await.unwrap();
    assert_eq!(after.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn bad_sign_in_is_rejected() {
    let (app, _) = app().await;
    signed_up(&app, "pw@example.com").await;

    let blank = app.clone().oneshot(post_json("/signin", None, json!({ "email": "pw@example.com", "password": " " }))).await.unwrap();
    assert_eq!(blank.status(), StatusCode::BAD_REQUEST);

    let wrong = app.clone().oneshot(post_json("/signin", None, json!({ "email": "pw@example.com", "password": "nope123" }))).await.unwrap();
    assert!(wrong.status().is_client_error());
    assert!(wrong.headers().get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn anonymous_submission_is_refused_and_writes_nothing() {
    let (app, store) = app().await;

    let res = app
        .clone()
        .oneshot(post_json("/requests", None, json!({ "serviceType": "AC", "description": "leaky tap" })))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = app
        .clone()
        .oneshot(post_json("/complaints", None, json!({ "complaintType": "Mess food" })))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    assert!(store.list_documents(Collection::Requests).await.unwrap().is_empty());
    assert!(store.list_documents(Collection::RectorComplaints).await.unwrap().is_empty());
}

#[tokio::test]
async fn signed_in_submission_shows_up_in_feeds() {
    let (app, _) = app().await;
    let cookie = signed_up(&app, "sub@example.com").await;

    let res = app
        .clone()
        .oneshot(post_json("/requests", Some(&cookie), json!({ "serviceType": "AC", "description": "leaky tap" })))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let id = json_body(res).await["id"].as_str().unwrap().to_owned();

    let blank = app
        .clone()
        .oneshot(post_json("/requests", Some(&cookie), json!({ "serviceType": "  " })))
        .await
        .unwrap();
    assert_eq!(blank.status(), StatusCode::BAD_REQUEST);

    let mine = json_body(app.clone().oneshot(get("/requests/mine", Some(&cookie))).await.unwrap()).await;
    assert_eq!(mine.as_array().unwrap().len(), 1);
    assert_eq!(mine[0]["id"], id.as_str());
    assert_eq!(mine[0]["status"], "Pending");

    let log = json_body(app.clone().oneshot(get("/log", None)).await.unwrap()).await;
    assert_eq!(log.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn live_feed_refuses_anonymous_upgrade() {
    let (app, _) = app().await;
    // upgrades need a real connection, so serve over loopback
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await });

    let res = reqwest::Client::new()
        .get(format!("http://{addr}/requests/live"))
        .header(header::CONNECTION, "upgrade")
        .header(header::UPGRADE, "websocket")
        .header(header::SEC_WEBSOCKET_VERSION, "13")
        .header(header::SEC_WEBSOCKET_KEY, "dGhlIHNhbXBsZSBub25jZQ==")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::UNAUTHORIZED);
}
