use tower_sessions::Session;

use crate::{error::SubmitError, identity::Principal, AppResult};

pub const CSRF_STATE: &str = "csrf_state";
pub const PKCE_VERIFIER: &str = "pkce_verifier";
pub const RETURN_URL: &str = "return_url";
pub const PRINCIPAL: &str = "principal";

pub async fn principal(session: &Session) -> AppResult<Option<Principal>> {
    Ok(session.get::<Principal>(PRINCIPAL).await?)
}

pub async fn require_principal(session: &Session) -> AppResult<Principal> {
    principal(session).await?.ok_or(SubmitError::NotAuthenticated.into())
}

/// Binds `principal` to this session under a fresh session id.
pub async fn sign_in(session: &Session, principal: &Principal) -> AppResult<()> {
    session.cycle_id().await?;
    session.insert(PRINCIPAL, principal).await?;
    Ok(())
}
