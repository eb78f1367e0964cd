use thiserror::Error;

/// A rejection from the identity provider. `reason` is the provider's own
/// code, passed through untouched (`EMAIL_EXISTS`, `INVALID_LOGIN_CREDENTIALS`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("identity provider rejected the request: {reason}")]
pub struct AuthError {
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    InvalidCredentials,
    DuplicateAccount,
    WeakPassword,
    InvalidEmail,
    RateLimited,
    Network,
    Other,
}

impl AuthError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }

    /// Coarse classification of `reason`. Firebase appends detail after the
    /// code (`WEAK_PASSWORD : Password should be ...`) so only the prefix counts.
    pub fn kind(&self) -> AuthErrorKind {
        use AuthErrorKind::*;
        let code = self.reason.split([' ', ':']).next().unwrap_or_default();
        match code {
            "INVALID_LOGIN_CREDENTIALS" | "INVALID_PASSWORD" | "EMAIL_NOT_FOUND"
            | "USER_DISABLED" | "INVALID_IDP_RESPONSE" => InvalidCredentials,
            "EMAIL_EXISTS" => DuplicateAccount,
            "WEAK_PASSWORD" => WeakPassword,
            "INVALID_EMAIL" | "MISSING_EMAIL" => InvalidEmail,
            "TOO_MANY_ATTEMPTS_TRY_LATER" => RateLimited,
            "NETWORK_REQUEST_FAILED" => Network,
            _ => Other,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document store request failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("malformed document {collection}/{id}: {source}")]
    Malformed {
        collection: String,
        id: String,
        source: serde_json::Error,
    },

    #[error("cannot encode document fields: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("cannot filter on a {0} value")]
    UnsupportedFilter(&'static str),

    #[error("invalid field name {0:?}")]
    InvalidField(String),
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("sign in before submitting")]
    NotAuthenticated,

    #[error("{0} must not be empty")]
    Invalid(&'static str),

    #[error(transparent)]
    Store(#[from] StoreError),
}
