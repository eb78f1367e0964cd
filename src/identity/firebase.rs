use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::{error::AuthError, GetField};

use super::{FederatedCredential, IdentityProvider, Principal};

const IDENTITY_TOOLKIT: &str = "https://identitytoolkit.googleapis.com/v1";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IdpRequest {
    post_body: String,
    request_uri: String,
    return_idp_credential: bool,
    return_secure_token: bool,
}

/// Firebase Authentication through the Identity Toolkit REST API.
pub struct FirebaseIdentity {
    http_client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl FirebaseIdentity {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_endpoint(api_key, IDENTITY_TOOLKIT)
    }

    /// Points at another Identity Toolkit host, e.g. the auth emulator at
    /// `http://localhost:9099/identitytoolkit.googleapis.com/v1`.
    pub fn with_endpoint(api_key: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            api_key: api_key.into(),
            endpoint: endpoint.into().trim_end_matches('/').to_owned(),
        }
    }

    async fn call(&self, method: &str, body: &impl Serialize) -> Result<Value, AuthError> {
        let url = format!("{}/accounts:{method}?key={}", self.endpoint, self.api_key);
        let response = self.http_client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(network_failure)?;

        let status = response.status();
        let body: Value = response.json().await.map_err(network_failure)?;
        if !status.is_success() {
            let reason = body["error"]["message"].as_str().unwrap_or("INTERNAL_ERROR");
            return Err(AuthError::new(reason));
        }
        Ok(body)
    }

    async fn password_call(&self, method: &str, email: &str, password: &str) -> Result<Principal, AuthError> {
        let body = self.call(method, &PasswordRequest {
            email,
            password,
            return_secure_token: true,
        }).await?;
        principal_from(&body)
    }
}

fn network_failure(err: reqwest::Error) -> AuthError {
    warn!("identity toolkit unreachable: {err}");
    AuthError::new("NETWORK_REQUEST_FAILED")
}

fn principal_from(body: &Value) -> Result<Principal, AuthError> {
    let uid = body.get_str_field("localId").map_err(|e| {
        warn!("identity toolkit answered without a user: {e}");
        AuthError::new("INVALID_RESPONSE")
    })?;
    let text = |field: &str| body.get(field).and_then(Value::as_str).filter(|s| !s.is_empty()).map(str::to_owned);

    Ok(Principal {
        uid,
        email: text("email"),
        display_name: text("displayName"),
    })
}

impl IdentityProvider for FirebaseIdentity {
    async fn create_account(&self, email: &str, password: &str) -> Result<Principal, AuthError> {
        self.password_call("signUp", email, password).await
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Principal, AuthError> {
        self.password_call("signInWithPassword", email, password).await
    }

    async fn sign_in_federated(&self, credential: &FederatedCredential) -> Result<Principal, AuthError> {
        let body = self.call("signInWithIdp", &IdpRequest {
            post_body: format!("access_token={}&providerId={}", credential.access_token, credential.provider.id()),
            request_uri: "http://localhost/".to_owned(),
            return_idp_credential: true,
            return_secure_token: true,
        }).await?;
        principal_from(&body)
    }

    /// Tokens are never kept, so there is nothing to revoke.
    async fn sign_out(&self) -> Result<(), AuthError> {
        Ok(())
    }
}
