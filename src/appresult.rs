use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;
use tracing::error;

use crate::error::{AuthError, AuthErrorKind, IdentityError, SubmitError};

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = classify(&self.0);
        if status.is_server_error() {
            error!("{:#}\n\n{}", self.0, self.0.backtrace());
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

fn classify(err: &anyhow::Error) -> (StatusCode, String) {
    let auth = err.downcast_ref::<AuthError>().or_else(|| match err.downcast_ref::<IdentityError>() {
        Some(IdentityError::Auth(e)) => Some(e),
        _ => None,
    });
    if let Some(auth) = auth {
        return auth_response(auth);
    }

    match err.downcast_ref::<SubmitError>() {
        Some(e @ SubmitError::NotAuthenticated) => (StatusCode::UNAUTHORIZED, e.to_string()),
        Some(e @ SubmitError::Invalid(_)) => (StatusCode::BAD_REQUEST, e.to_string()),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

/// What a resident gets to read for each kind of identity rejection.
fn auth_response(err: &AuthError) -> (StatusCode, String) {
    use AuthErrorKind::*;
    let (status, message) = match err.kind() {
        InvalidCredentials => (StatusCode::UNAUTHORIZED, "Invalid email or password. If you signed up with Google, please use that button."),
        DuplicateAccount => (StatusCode::CONFLICT, "This email is already registered."),
        WeakPassword => (StatusCode::BAD_REQUEST, "Password should be at least 6 characters."),
        InvalidEmail => (StatusCode::BAD_REQUEST, "Please enter a valid email address."),
        RateLimited => (StatusCode::TOO_MANY_REQUESTS, "Too many failed attempts. Please try again later."),
        Network => (StatusCode::BAD_GATEWAY, "Could not reach the sign-in service. Please try again."),
        Other => return (StatusCode::UNAUTHORIZED, err.reason.clone()),
    };
    (status, message.to_owned())
}
