//! Current-user profile with coalesced fetches

use crate::auth_client::AuthClient;
use crate::error::{Result, SessionError};
use crate::single_flight::SingleFlight;
use crate::storage::SecureStorage;
use crate::transport::Transport;
use crate::types::UserProfile;
use tracing::warn;

/// Fetches the current user's profile, sharing one request between all
/// callers that ask while it is outstanding
///
/// The fetched profile becomes the session's [current user](crate::AuthSession::current_user).
/// A 401 at this layer means the refresh beneath it already failed, so the
/// session is ended instead of retried.
pub struct UserProfileCache<T, S> {
    client: AuthClient<T, S>,
    fetch: SingleFlight<UserProfile, SessionError>,
}

impl<T: Transport, S: SecureStorage> UserProfileCache<T, S> {
    pub fn new(client: AuthClient<T, S>) -> Self {
        Self {
            client,
            fetch: SingleFlight::new(),
        }
    }

    pub async fn current_user(&self) -> Result<UserProfile> {
        let client = self.client.clone();
        self.fetch.run(move || fetch_me(client)).await
    }

    pub fn is_fetching(&self) -> bool {
        self.fetch.is_in_flight()
    }
}

async fn fetch_me<T: Transport, S: SecureStorage>(client: AuthClient<T, S>) -> Result<UserProfile> {
    let session = client.session();

    match client.get::<UserProfile>(&session.config().user_info_path).await {
        Ok(profile) => {
            session.set_current_user(profile.clone());
            Ok(profile)
        }
        Err(e) => {
            if e.is_unauthorized() {
                warn!("Profile fetch unauthorized, ending session");
                if let Err(logout_err) = session.logout(false).await {
                    warn!(error = %logout_err, "Logout after unauthorized profile fetch failed");
                }
            }
            Err(e)
        }
    }
}
