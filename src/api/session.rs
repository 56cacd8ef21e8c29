use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use tower_sessions::Session;

use crate::error::AppError;

pub const SESSION_USER_KEY: &str = "username";

/// The username bound to the caller's session. Rejects with
/// [`AppError::Unauthenticated`] when nobody is signed in.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub String);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|(_, msg)| AppError::Internal(msg.to_string()))?;

        session
            .get::<String>(SESSION_USER_KEY)
            .await?
            .map(CurrentUser)
            .ok_or(AppError::Unauthenticated)
    }
}

/// Binds `username` to the session under a fresh session id.
pub async fn sign_in(session: &Session, username: &str) -> Result<(), AppError> {
    session.cycle_id().await?;
    session.insert(SESSION_USER_KEY, username).await?;
    Ok(())
}

pub async fn sign_out(session: &Session) -> Result<(), AppError> {
    session.flush().await?;
    Ok(())
}
