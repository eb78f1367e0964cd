mod clients;
mod emulator;
mod firebase;

use std::{
    future::Future,
    sync::{Arc, Mutex, PoisonError},
};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::info;

use crate::{
    error::{AuthError, IdentityError, StoreError},
    records::{NOT_ASSIGNED, Record, UserProfile},
    store::{Collection, DocumentStore},
};

pub use clients::{ClientProvider, Clients};
pub use emulator::{EmulatorIdentity, FederatedProfile};
pub use firebase::FirebaseIdentity;

/// The signed-in identity as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

/// Proof of a completed provider login, handed over by the OAuth redirect.
#[derive(Debug, Clone)]
pub struct FederatedCredential {
    pub provider: ClientProvider,
    pub access_token: String,
}

/// Profile details collected at sign-up.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProfileFields {
    pub username: String,
    pub hostel: String,
    pub room: String,
}

impl ProfileFields {
    /// Splits a combined `"H4-101"` entry at its first dash, so `"B-2-7"`
    /// keeps `"2-7"` as the room. Without a dash the whole entry is the
    /// hostel and the room stays empty.
    pub fn from_hostel_room(username: &str, hostel_room: &str) -> Self {
        let (hostel, room) = hostel_room.split_once('-').unwrap_or((hostel_room, ""));
        Self {
            username: username.trim().to_owned(),
            hostel: hostel.trim().to_owned(),
            room: room.trim().to_owned(),
        }
    }
}

pub trait IdentityProvider: Send + Sync + 'static {
    fn create_account(&self, email: &str, password: &str) -> impl Future<Output = Result<Principal, AuthError>> + Send;
    fn sign_in(&self, email: &str, password: &str) -> impl Future<Output = Result<Principal, AuthError>> + Send;
    fn sign_in_federated(&self, credential: &FederatedCredential) -> impl Future<Output = Result<Principal, AuthError>> + Send;
    fn sign_out(&self) -> impl Future<Output = Result<(), AuthError>> + Send;
}

/// Provider picked at startup from configuration.
pub enum AnyIdentity {
    Firebase(FirebaseIdentity),
    Emulator(EmulatorIdentity),
}

impl IdentityProvider for AnyIdentity {
    async fn create_account(&self, email: &str, password: &str) -> Result<Principal, AuthError> {
        match self {
            AnyIdentity::Firebase(p) => p.create_account(email, password).await,
            AnyIdentity::Emulator(p) => p.create_account(email, password).await,
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Principal, AuthError> {
        match self {
            AnyIdentity::Firebase(p) => p.sign_in(email, password).await,
            AnyIdentity::Emulator(p) => p.sign_in(email, password).await,
        }
    }

    async fn sign_in_federated(&self, credential: &FederatedCredential) -> Result<Principal, AuthError> {
        match self {
            AnyIdentity::Firebase(p) => p.sign_in_federated(credential).await,
            AnyIdentity::Emulator(p) => p.sign_in_federated(credential).await,
        }
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        match self {
            AnyIdentity::Firebase(p) => p.sign_out().await,
            AnyIdentity::Emulator(p) => p.sign_out().await,
        }
    }
}

type Listener = Arc<dyn Fn(Option<&Principal>) + Send + Sync>;

struct SessionState {
    current: watch::Sender<Option<Principal>>,
    listeners: Mutex<Vec<Listener>>,
}

/// Sign-up, sign-in and sign-out on top of an [`IdentityProvider`], plus the
/// principal of this session. Clones share the same session.
pub struct IdentityGateway<P> {
    provider: Arc<P>,
    store: DocumentStore,
    session: Arc<SessionState>,
}

impl<P> Clone for IdentityGateway<P> {
    fn clone(&self) -> Self {
        Self {
            provider: self.provider.clone(),
            store: self.store.clone(),
            session: self.session.clone(),
        }
    }
}

impl<P: IdentityProvider> IdentityGateway<P> {
    /// A gateway with a fresh, signed-out session.
    pub fn new(provider: Arc<P>, store: DocumentStore) -> Self {
        Self {
            provider,
            store,
            session: Arc::new(SessionState {
                current: watch::Sender::new(None),
                listeners: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn current_principal(&self) -> Option<Principal> {
        self.session.current.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<Option<Principal>> {
        self.session.current.subscribe()
    }

    /// Calls `listener` now with the current principal, then again every time
    /// the session signs in, signs out or switches to another principal.
    pub fn on_principal_changed<F>(&self, listener: F)
    where
        F: Fn(Option<&Principal>) + Send + Sync + 'static,
    {
        let listener: Listener = Arc::new(listener);
        let current = {
            let mut listeners = self.session.listeners.lock().unwrap_or_else(PoisonError::into_inner);
            listeners.push(listener.clone());
            self.session.current.borrow().clone()
        };
        listener(current.as_ref());
    }

    /// Creates the account, signs it in and writes its `users/{uid}` profile.
    /// If the profile write fails the account exists and stays signed in.
    pub async fn sign_up(&self, email: &str, password: &str, profile: ProfileFields) -> Result<Principal, IdentityError> {
        let principal = self.provider.create_account(email, password).await?;
        self.transition(Some(principal.clone()));

        let ProfileFields { username, hostel, room } = profile;
        let profile = UserProfile {
            uid: principal.uid.clone(),
            email: email.to_owned(),
            username,
            hostel,
            room,
            created_at: None,
        };
        self.store
            .set_document(Collection::Users, &principal.uid, profile.into_fields())
            .await?;

        info!("signed up u/{}", principal.uid);
        Ok(principal)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Principal, AuthError> {
        let principal = self.provider.sign_in(email, password).await?;
        self.transition(Some(principal.clone()));
        info!("welcome u/{}", principal.uid);
        Ok(principal)
    }

    /// Signs in with a provider credential and makes sure a profile exists,
    /// creating a placeholder one on first visit.
    pub async fn sign_in_federated(&self, credential: &FederatedCredential) -> Result<Principal, IdentityError> {
        let principal = self.provider.sign_in_federated(credential).await?;
        self.transition(Some(principal.clone()));

        if self.store.get_document(Collection::Users, &principal.uid).await?.is_none() {
            let profile = UserProfile {
                uid: principal.uid.clone(),
                email: principal.email.clone().unwrap_or_default(),
                username: principal
                    .display_name
                    .clone()
                    .unwrap_or_else(|| format!("{} User", credential.provider)),
                hostel: NOT_ASSIGNED.to_owned(),
                room: String::new(),
                created_at: None,
            };
            // two first sign-ins racing both see no profile; only one write lands
            if self
                .store
                .create_document_if_absent(Collection::Users, &principal.uid, profile.into_fields())
                .await?
            {
                info!("adding u/{} via {}", principal.uid, credential.provider);
            }
        }

        info!("welcome u/{}", principal.uid);
        Ok(principal)
    }

    pub async fn sign_out(&self) -> Result<(), AuthError> {
        self.provider.sign_out().await?;
        self.transition(None);
        Ok(())
    }

    pub async fn profile(&self, uid: &str) -> Result<Option<UserProfile>, StoreError> {
        Ok(self
            .store
            .get_document(Collection::Users, uid)
            .await?
            .as_ref()
            .map(UserProfile::from_document))
    }

    /// `watch` receivers see every change to the principal, profile details
    /// included. Listeners only hear about a different uid.
    fn transition(&self, next: Option<Principal>) {
        let listeners = {
            let listeners = self.session.listeners.lock().unwrap_or_else(PoisonError::into_inner);
            let mut uid_changed = false;
            self.session.current.send_if_modified(|current| {
                uid_changed = current.as_ref().map(|p| &p.uid) != next.as_ref().map(|p| &p.uid);
                let modified = *current != next;
                *current = next.clone();
                modified
            });
            if !uid_changed {
                return;
            }
            listeners.clone()
        };

        for listener in listeners {
            listener(next.as_ref());
        }
    }
}
