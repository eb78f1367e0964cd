use axum::{debug_handler, extract::{Path, Query, State}, response::Redirect};
use oauth2::{AuthorizationCode, CsrfToken, PkceCodeVerifier, TokenResponse};
use serde::Deserialize;
use tower_sessions::Session;

use crate::{identity::{ClientProvider, FederatedCredential}, session::{self, CSRF_STATE, PKCE_VERIFIER, RETURN_URL}, AppResult, AppState};

#[derive(Deserialize)]
pub struct LockinQuery {
    pub state: Option<String>,
    pub code: Option<String>,
}

/// Where the provider sends the browser back: checks the CSRF state, trades
/// the code for an access token and signs in with it.
#[debug_handler]
pub(crate) async fn lockin(
    Path(provider): Path<ClientProvider>,
    Query(LockinQuery { state: csrf, code }): Query<LockinQuery>,
    State(state): State<AppState>,
    session: Session,
) -> AppResult<Redirect> {
    let csrf = CsrfToken::new(csrf.ok_or(anyhow::anyhow!("OAuth: without state"))?);
    let code = AuthorizationCode::new(code.ok_or(anyhow::anyhow!("OAuth: without code"))?);

    let Some(stored_state) = session.remove::<String>(CSRF_STATE).await? else {
        return Err(anyhow::anyhow!("no csrf_state"))?;
    };

    if csrf.secret().as_str() != stored_state.as_str() {
        return Err(anyhow::anyhow!("csrf tokens don't match"))?;
    }

    let Some(pkce_verifier) = session.remove::<String>(PKCE_VERIFIER).await? else {
        return Err(anyhow::anyhow!("no pkce_verifier"))?;
    };

    let client = state.clients.get_client(provider)?;
    let http_client = reqwest::ClientBuilder::new()
        .redirect(reqwest::redirect::Policy::none())
        .build()?;
    let token_result = client
        .exchange_code(code)
        .set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier))
        .request_async(&http_client)
        .await?;

    let credential = FederatedCredential {
        provider,
        access_token: token_result.access_token().secret().to_owned(),
    };
    let principal = state.gateway().sign_in_federated(&credential).await?;

    let return_url = session.remove::<String>(RETURN_URL).await?;
    session::sign_in(&session, &principal).await?;

    let return_url: String = return_url.unwrap_or("/".to_string());
    Ok(Redirect::to(return_url.as_str()))
}
