//! Verify-then-redirect wrapper for protected pages.

use crate::auth::{verify_session, UserProfile};
use crate::http::ApiClient;
use crate::navigation::Route;

/// Outcome of a guarded page mount
#[derive(Debug, Clone, PartialEq)]
pub enum Guarded<T> {
    Allowed { profile: UserProfile, content: T },
    Redirected,
}

/// The verified profile, or `None` after sending the client to login.
pub fn require_session(client: &ApiClient) -> Option<UserProfile> {
    let profile = verify_session(client);
    if profile.is_none() {
        // A 401 during verification has already moved us; this is then a no-op.
        client.session().navigate(Route::Login);
    }
    profile
}

/// Run `content` only for a verified session.
pub fn protect<T, F>(client: &ApiClient, content: F) -> Guarded<T>
where
    F: FnOnce(&UserProfile) -> T,
{
    match require_session(client) {
        Some(profile) => {
            let content = content(&profile);
            Guarded::Allowed { profile, content }
        }
        None => Guarded::Redirected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::PROFILE_PATH;
    use crate::http::testing::*;
    use crate::http::Method;

    #[test]
    fn test_allowed_yields_profile_and_content() {
        let transport = MockTransport::new();
        transport.on(Method::Get, PROFILE_PATH, 200, PROFILE_JSON);
        let client = logged_in_client(&transport, Route::Profile);

        let guarded = protect(&client, |p| p.username.len());
        match guarded {
            Guarded::Allowed { profile, content } => {
                assert_eq!(profile.id, 3);
                assert_eq!(content, 3);
            }
            Guarded::Redirected => panic!("expected allowed"),
        }
        assert!(client.session().navigator().history().is_empty());
    }

    #[test]
    fn test_401_redirects_exactly_once() {
        let transport = MockTransport::new();
        transport.on(Method::Get, PROFILE_PATH, 401, "");
        let client = logged_in_client(&transport, Route::Reservations);

        let mut ran = false;
        let guarded = protect(&client, |_| ran = true);
        assert_eq!(guarded, Guarded::Redirected);
        assert!(!ran);
        assert_eq!(client.session().navigator().current(), Route::Login);
        assert_eq!(client.session().navigator().visits(Route::Login), 1);
    }

    #[test]
    fn test_server_error_and_network_redirect() {
        let transport = MockTransport::new();
        transport.on(Method::Get, PROFILE_PATH, 500, "boom");
        let client = logged_in_client(&transport, Route::Flights);
        assert_eq!(protect(&client, |_| ()), Guarded::Redirected);
        assert_eq!(client.session().navigator().current(), Route::Login);

        let transport = MockTransport::new();
        transport.fail(Method::Get, PROFILE_PATH, "connection refused");
        let client = client_at(&transport, Route::Profile);
        assert_eq!(require_session(&client), None);
        assert_eq!(client.session().navigator().visits(Route::Login), 1);
    }
}
