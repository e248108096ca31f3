use super::StatusMessage;
use crate::auth::{self, Registration};
use crate::http::ApiClient;
use crate::navigation::Route;

pub const REGISTERED: &str = "Registration successful. You can now log in.";
pub const REGISTER_FAILED: &str = "Registration failed. Please check your details.";

/// `/auth/register`
#[derive(Debug, Default)]
pub struct RegisterPage {
    pub form: Registration,
    status: Option<StatusMessage>,
}

impl RegisterPage {
    pub fn mount(client: &ApiClient) -> Self {
        client.session().navigate(Route::Register);
        Self::default()
    }

    /// Apply `key=value` edits by wire field name.
    pub fn fill(&mut self, assignments: &[(String, String)]) -> Result<(), String> {
        for (field, value) in assignments {
            self.form.set(field, value)?;
        }
        Ok(())
    }

    pub fn submit(&mut self, client: &ApiClient) -> bool {
        let missing = self.form.missing_required();
        if !missing.is_empty() {
            self.status = Some(StatusMessage::error(format!(
                "Required: {}",
                missing.join(", ")
            )));
            return false;
        }

        match auth::register(client, &self.form) {
            Ok(user) => {
                tracing::info!(username = %user.username, "registered");
                self.status = Some(StatusMessage::success(REGISTERED));
                client.session().navigate(Route::Login);
                true
            }
            Err(e) => {
                self.status = Some(StatusMessage::error(e.user_message(REGISTER_FAILED)));
                false
            }
        }
    }

    pub fn status(&self) -> Option<&StatusMessage> {
        self.status.as_ref()
    }

    pub fn render(&self) -> String {
        let mut out = String::from("Create an account\n");
        if let Some(status) = &self.status {
            out.push_str(&format!("  {}\n", status));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::REGISTER_PATH;
    use crate::http::testing::*;
    use crate::http::Method;
    use crate::pages::StatusKind;

    fn filled(page: &mut RegisterPage) {
        page.fill(&[
            ("username".to_string(), "ana".to_string()),
            ("email".to_string(), "ana@example.com".to_string()),
            ("password".to_string(), "secret123".to_string()),
        ])
        .unwrap();
    }

    #[test]
    fn test_success_navigates_to_login() {
        let transport = MockTransport::new();
        transport.on(Method::Post, REGISTER_PATH, 201, PROFILE_JSON);
        let client = client_at(&transport, Route::Login);
        let mut page = RegisterPage::mount(&client);
        filled(&mut page);

        assert!(page.submit(&client));
        assert_eq!(page.status().unwrap().text, REGISTERED);
        assert_eq!(client.session().navigator().current(), Route::Login);
    }

    #[test]
    fn test_field_messages_joined() {
        let transport = MockTransport::new();
        transport.on(
            Method::Post,
            REGISTER_PATH,
            400,
            r#"{"email": ["Enter a valid email address."], "username": ["A user with that username already exists."]}"#,
        );
        let client = client_at(&transport, Route::Login);
        let mut page = RegisterPage::mount(&client);
        filled(&mut page);

        assert!(!page.submit(&client));
        let status = page.status().unwrap();
        assert_eq!(status.kind, StatusKind::Error);
        assert_eq!(
            status.text,
            "Enter a valid email address. A user with that username already exists."
        );
        assert_eq!(client.session().navigator().current(), Route::Register);
    }

    #[test]
    fn test_missing_required_fields() {
        let transport = MockTransport::new();
        let client = client_at(&transport, Route::Login);
        let mut page = RegisterPage::mount(&client);
        assert!(!page.submit(&client));
        assert_eq!(page.status().unwrap().text, "Required: username, email, password");
        assert!(transport.sent().is_empty());
        assert!(page.fill(&[("age".to_string(), "3".to_string())]).is_err());
    }
}
