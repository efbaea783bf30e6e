//! Signing in, registering and restoring a stored session.

use crate::api::PortalApiClient;
use crate::models::{AuthResponse, LoginRequest};
use crate::notice::{ActionResult, OrNotice};
use crate::session::{Session, SessionStore};
use crate::validation::RegistrationForm;

pub async fn login(
    api: &mut PortalApiClient,
    store: &dyn SessionStore,
    email: &str,
    password: &str,
) -> ActionResult<Session> {
    let request = LoginRequest {
        email: email.trim().to_string(),
        password: password.to_string(),
    };
    let response = api.login(&request).await.or_notice("Login failed")?;
    Ok(establish(api, store, response))
}

pub async fn register(
    api: &mut PortalApiClient,
    store: &dyn SessionStore,
    form: &RegistrationForm,
) -> ActionResult<Session> {
    let request = form.validate()?;
    let response = api
        .register(&request)
        .await
        .or_notice("Registration failed")?;
    Ok(establish(api, store, response))
}

fn establish(api: &mut PortalApiClient, store: &dyn SessionStore, response: AuthResponse) -> Session {
    let session = Session::new(response.token, response.user);
    api.set_token(Some(session.token.clone()));
    if let Err(e) = store.save(&session) {
        // The session still works for this run.
        tracing::warn!("Failed to persist session: {:#}", e);
    }
    tracing::info!(role = ?session.role(), "Signed in");
    session
}

/// Load the stored session and confirm it with the server. The stored
/// user is replaced by the server's current view of it. A session the
/// server rejects is cleared.
pub async fn restore(api: &mut PortalApiClient, store: &dyn SessionStore) -> Option<Session> {
    let stored = match store.load() {
        Ok(stored) => stored?,
        Err(e) => {
            tracing::warn!("Failed to read stored session: {:#}", e);
            return None;
        }
    };

    api.set_token(Some(stored.token.clone()));
    match api.me().await {
        Ok(user) => {
            let changed = stored.user.as_ref() != Some(&user);
            let session = Session::new(stored.token, user);
            if changed
                && let Err(e) = store.save(&session)
            {
                tracing::warn!("Failed to persist session: {:#}", e);
            }
            Some(session)
        }
        Err(e) => {
            tracing::warn!("Stored session is no longer valid: {}", e);
            api.set_token(None);
            if let Err(e) = store.clear() {
                tracing::warn!("Failed to clear session: {:#}", e);
            }
            None
        }
    }
}

pub fn logout(api: &mut PortalApiClient, store: &dyn SessionStore) -> anyhow::Result<()> {
    api.set_token(None);
    store.clear()?;
    tracing::info!("Signed out");
    Ok(())
}
