use crate::api::KomaApi;
use crate::error::ClientError;
use crate::session::Session;

/// End the server session and forget everything stored locally.
///
/// The store is only cleared once the backend confirms with `200`.
pub async fn logout(api: &KomaApi, session: &mut Session) -> Result<(), ClientError> {
    if let Err(e) = api.logout().await {
        tracing::error!(error = %e, "Logout failed");
        return Err(e);
    }
    session.clear()?;
    tracing::info!("Logged out");
    Ok(())
}

/// Header text for the user menu.
pub fn greeting(session: &Session) -> String {
    format!("Hi, {}", session.username().unwrap_or("guest"))
}
