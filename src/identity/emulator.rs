use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
    time::Duration,
};

use tokio::time::Instant;
use uuid::Uuid;

use crate::error::AuthError;

use super::{ClientProvider, FederatedCredential, IdentityProvider, Principal};

const MIN_PASSWORD_LEN: usize = 6;
const MAX_FAILED_ATTEMPTS: u32 = 5;
const LOCKOUT: Duration = Duration::from_secs(5 * 60);

/// What a provider reports about the person behind a federated token.
#[derive(Debug, Clone)]
pub struct FederatedProfile {
    pub subject: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

struct Account {
    uid: String,
    email: String,
    password: String,
    failed_attempts: u32,
    locked_until: Option<Instant>,
}

#[derive(Default)]
struct Accounts {
    by_email: HashMap<String, Account>,
    tokens: HashMap<(ClientProvider, String), FederatedProfile>,
    federated_uids: HashMap<(ClientProvider, String), String>,
}

/// In-process identity provider answering with the same reason codes as
/// Firebase. Passwords live in memory as given; for local runs and tests.
#[derive(Default)]
pub struct EmulatorIdentity {
    accounts: Mutex<Accounts>,
}

fn new_uid() -> String {
    Uuid::now_v7().simple().to_string()
}

impl EmulatorIdentity {
    /// Makes `access_token` from `provider` resolve to `profile`.
    pub fn register_federated(&self, provider: ClientProvider, access_token: &str, profile: FederatedProfile) {
        self.lock().tokens.insert((provider, access_token.to_owned()), profile);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Accounts> {
        self.accounts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl IdentityProvider for EmulatorIdentity {
    async fn create_account(&self, email: &str, password: &str) -> Result<Principal, AuthError> {
        let email = email.trim().to_lowercase();
        if !email.contains('@') {
            return Err(AuthError::new("INVALID_EMAIL"));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::new("WEAK_PASSWORD : Password should be at least 6 characters"));
        }

        let mut accounts = self.lock();
        if accounts.by_email.contains_key(&email) {
            return Err(AuthError::new("EMAIL_EXISTS"));
        }
        let uid = new_uid();
        accounts.by_email.insert(email.clone(), Account {
            uid: uid.clone(),
            email: email.clone(),
            password: password.to_owned(),
            failed_attempts: 0,
            locked_until: None,
        });

        Ok(Principal { uid, email: Some(email), display_name: None })
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Principal, AuthError> {
        let email = email.trim().to_lowercase();
        let mut accounts = self.lock();
        let Some(account) = accounts.by_email.get_mut(&email) else {
            return Err(AuthError::new("INVALID_LOGIN_CREDENTIALS"));
        };

        if account.locked_until.is_some_and(|until| Instant::now() < until) {
            return Err(AuthError::new("TOO_MANY_ATTEMPTS_TRY_LATER"));
        }
        if account.password != password {
            account.failed_attempts += 1;
            if account.failed_attempts >= MAX_FAILED_ATTEMPTS {
                account.failed_attempts = 0;
                account.locked_until = Some(Instant::now() + LOCKOUT);
            }
            return Err(AuthError::new("INVALID_LOGIN_CREDENTIALS"));
        }

        account.failed_attempts = 0;
        account.locked_until = None;
        Ok(Principal {
            uid: account.uid.clone(),
            email: Some(account.email.clone()),
            display_name: None,
        })
    }

    async fn sign_in_federated(&self, credential: &FederatedCredential) -> Result<Principal, AuthError> {
        let mut accounts = self.lock();
        let Some(profile) = accounts.tokens.get(&(credential.provider, credential.access_token.clone())).cloned() else {
            return Err(AuthError::new("INVALID_IDP_RESPONSE"));
        };

        let uid = accounts
            .federated_uids
            .entry((credential.provider, profile.subject))
            .or_insert_with(new_uid)
            .clone();

        Ok(Principal {
            uid,
            email: profile.email,
            display_name: profile.display_name,
        })
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthErrorKind;

    #[tokio::test]
    async fn rejects_weak_password_and_bad_email() {
        let emulator = EmulatorIdentity::default();
        let weak = emulator.create_account("a@example.com", "12345").await.unwrap_err();
        assert_eq!(weak.kind(), AuthErrorKind::WeakPassword);
        let bad = emulator.create_account("not-an-email", "hunter22").await.unwrap_err();
        assert_eq!(bad.reason, "INVALID_EMAIL");
    }

    #[tokio::test]
    async fn email_is_case_insensitive() {
        let emulator = EmulatorIdentity::default();
        let created = emulator.create_account("Alice@Example.com", "hunter22").await.unwrap();
        let signed_in = emulator.sign_in("alice@example.com", "hunter22").await.unwrap();
        assert_eq!(created.uid, signed_in.uid);
        let dup = emulator.create_account("ALICE@example.com", "hunter22").await.unwrap_err();
        assert_eq!(dup.reason, "EMAIL_EXISTS");
    }

    #[tokio::test]
    async fn throttles_after_repeated_failures() {
        let emulator = EmulatorIdentity::default();
        emulator.create_account("a@example.com", "hunter22").await.unwrap();

        for _ in 0..MAX_FAILED_ATTEMPTS {
            let err = emulator.sign_in("a@example.com", "wrong").await.unwrap_err();
            assert_eq!(err.kind(), AuthErrorKind::InvalidCredentials);
        }
        let err = emulator.sign_in("a@example.com", "hunter22").await.unwrap_err();
        assert_eq!(err.kind(), AuthErrorKind::RateLimited);
    }

    #[tokio::test(start_paused = true)]
    async fn lockout_lifts_after_cooldown() {
        let emulator = EmulatorIdentity::default();
        emulator.create_account("a@example.com", "hunter22").await.unwrap();
        for _ in 0..MAX_FAILED_ATTEMPTS {
            emulator.sign_in("a@example.com", "wrong").await.unwrap_err();
        }

        tokio::time::advance(LOCKOUT / 2).await;
        let err = emulator.sign_in("a@example.com", "hunter22").await.unwrap_err();
        assert_eq!(err.kind(), AuthErrorKind::RateLimited);

        tokio::time::advance(LOCKOUT).await;
        emulator.sign_in("a@example.com", "hunter22").await.unwrap();
    }

    #[tokio::test]
    async fn success_resets_failures() {
        let emulator = EmulatorIdentity::default();
        emulator.create_account("a@example.com", "hunter22").await.unwrap();
        for _ in 0..MAX_FAILED_ATTEMPTS - 1 {
            emulator.sign_in("a@example.com", "wrong").await.unwrap_err();
        }
        emulator.sign_in("a@example.com", "hunter22").await.unwrap();
        emulator.sign_in("a@example.com", "wrong").await.unwrap_err();
        emulator.sign_in("a@example.com", "hunter22").await.unwrap();
    }

    #[tokio::test]
    async fn federated_uid_is_stable_per_subject() {
        let emulator = EmulatorIdentity::default();
        let profile = FederatedProfile { subject: "s1".into(), email: None, display_name: Some("Sam".into()) };
        emulator.register_federated(ClientProvider::Github, "t1", profile.clone());
        emulator.register_federated(ClientProvider::Github, "t2", profile);

        let first = emulator.sign_in_federated(&FederatedCredential { provider: ClientProvider::Github, access_token: "t1".into() }).await.unwrap();
        let second = emulator.sign_in_federated(&FederatedCredential { provider: ClientProvider::Github, access_token: "t2".into() }).await.unwrap();
        assert_eq!(first.uid, second.uid);
        assert_eq!(first.display_name.as_deref(), Some("Sam"));

        let unknown = emulator.sign_in_federated(&FederatedCredential { provider: ClientProvider::Google, access_token: "t1".into() }).await.unwrap_err();
        assert_eq!(unknown.reason, "INVALID_IDP_RESPONSE");
    }
}
