use crate::auth;
use crate::http::ApiClient;
use crate::navigation::Route;

pub const LOGIN_FAILED: &str = "Login failed. Check your credentials.";
pub const MISSING_FIELDS: &str = "Username and password are required.";

/// `/auth/login`
#[derive(Debug, Default)]
pub struct LoginPage {
    pub username: String,
    error: Option<String>,
    submitting: bool,
}

impl LoginPage {
    pub fn mount(client: &ApiClient) -> Self {
        client.session().navigate(Route::Login);
        Self::default()
    }

    /// Returns true when logged in and moved on to the flights page.
    pub fn submit(&mut self, client: &ApiClient, username: &str, password: &str) -> bool {
        if self.submitting {
            return false;
        }
        self.username = username.trim().to_string();
        self.error = None;
        if self.username.is_empty() || password.is_empty() {
            self.error = Some(MISSING_FIELDS.to_string());
            return false;
        }

        self.submitting = true;
        let result = auth::login(client, &self.username, password);
        self.submitting = false;

        match result {
            Ok(_) => {
                client.session().navigate(Route::Flights);
                true
            }
            Err(e) => {
                self.error = Some(e.user_message(LOGIN_FAILED));
                false
            }
        }
    }

    #[cfg(test)]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn render(&self) -> String {
        let mut out = String::from("SABJ Air: sign in\n");
        if self.submitting {
            out.push_str("  Signing in...\n");
        }
        if let Some(error) = &self.error {
            out.push_str(&format!("  {}\n", error));
        }
        if !self.username.is_empty() {
            out.push_str(&format!("  Username: {}\n", self.username));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::LOGIN_PATH;
    use crate::error::CONNECTIVITY_MESSAGE;
    use crate::http::testing::*;
    use crate::http::Method;

    #[test]
    fn test_valid_login_stores_and_navigates() {
        let transport = MockTransport::new();
        transport.on(Method::Post, LOGIN_PATH, 200, r#"{"access": "a", "refresh": "r"}"#);
        let client = client_at(&transport, Route::Flights);

        let mut page = LoginPage::mount(&client);
        assert!(page.submit(&client, "ana", "secret"));
        assert_eq!(page.error(), None);
        assert_eq!(client.session().navigator().current(), Route::Flights);
        let creds = client.session().credentials().unwrap();
        assert!(creds.access.is_some() && creds.refresh.is_some());
    }

    #[test]
    fn test_invalid_login_shows_body_message() {
        let transport = MockTransport::new();
        transport.on(
            Method::Post,
            LOGIN_PATH,
            401,
            r#"{"detail": "No active account found with the given credentials"}"#,
        );
        let client = client_at(&transport, Route::Login);

        let mut page = LoginPage::mount(&client);
        assert!(!page.submit(&client, "ana", "wrong"));
        assert_eq!(
            page.error(),
            Some("No active account found with the given credentials")
        );
        assert!(client.session().navigator().history().is_empty());
        assert!(client.session().credentials().unwrap().is_empty());
        assert!(page.render().contains("No active account"));
    }

    #[test]
    fn test_fallback_and_connectivity_messages() {
        let transport = MockTransport::new();
        transport.on(Method::Post, LOGIN_PATH, 500, "");
        let client = client_at(&transport, Route::Login);
        let mut page = LoginPage::mount(&client);
        page.submit(&client, "ana", "pw");
        assert_eq!(page.error(), Some(LOGIN_FAILED));

        let transport = MockTransport::new();
        transport.fail(Method::Post, LOGIN_PATH, "connection refused");
        let client = client_at(&transport, Route::Login);
        let mut page = LoginPage::mount(&client);
        page.submit(&client, "ana", "pw");
        assert_eq!(page.error(), Some(CONNECTIVITY_MESSAGE));
        assert!(!page.submitting);
    }

    #[test]
    fn test_blank_fields_never_hit_the_network() {
        let transport = MockTransport::new();
        let client = client_at(&transport, Route::Login);
        let mut page = LoginPage::mount(&client);
        assert!(!page.submit(&client, "  ", "pw"));
        assert_eq!(page.error(), Some(MISSING_FIELDS));
        assert!(transport.sent().is_empty());
    }
}
