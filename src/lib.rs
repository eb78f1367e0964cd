pub mod appresult;
pub mod auth;
pub mod config;
pub mod error;
pub mod identity;
pub mod live;
pub mod records;
pub mod requests;
pub mod session;
pub mod store;
pub mod workflow;

use std::sync::Arc;

use anyhow::anyhow;
use axum::extract::FromRef;
use serde_json::Value;

pub use appresult::{AppError, AppResult};
use identity::{AnyIdentity, Clients, IdentityGateway};
use store::DocumentStore;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub store: DocumentStore,
    pub identity: Arc<AnyIdentity>,
    pub clients: Clients,
}

impl AppState {
    /// A gateway for one request. Who is signed in lives in the cookie
    /// session, so each request starts from a signed-out gateway.
    pub fn gateway(&self) -> IdentityGateway<AnyIdentity> {
        IdentityGateway::new(self.identity.clone(), self.store.clone())
    }
}

pub trait GetField {
    fn get_str_field(&self, field: &str) -> anyhow::Result<String>;
    fn get_obj_field(&self, field: &str) -> anyhow::Result<&Value>;
}

impl GetField for serde_json::Value {
    fn get_str_field(&self, field: &str) -> anyhow::Result<String> {
        Ok(
            self.get(field)
            .ok_or(anyhow!("expected {field} in {self}"))?
            .as_str()
            .ok_or(anyhow!("expected {field} in {self} to be string"))?
            .to_owned()
        )
    }

    fn get_obj_field(&self, field: &str) -> anyhow::Result<&Value> {
        self.get(field)
        .ok_or(anyhow!("expected {field} in {self}"))
    }
}
