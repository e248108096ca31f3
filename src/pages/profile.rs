use super::{render_state, EditMode, PageState, StatusMessage};
use crate::auth::{self, ProfileUpdate, UserProfile};
use crate::error::ApiError;
use crate::guard;
use crate::http::ApiClient;
use crate::navigation::Route;

pub const UPDATED: &str = "Profile updated.";
pub const UPDATE_FAILED: &str = "Could not update the profile. Try again.";
pub const NO_CHANGES: &str = "No changes to save.";

/// Wire names of the fields a user may edit
pub const EDITABLE_FIELDS: &[&str] = &[
    "email",
    "first_name",
    "last_name",
    "telefono",
    "direccion",
    "fecha_nacimiento",
];

#[derive(Debug, Clone, PartialEq)]
pub struct ProfileView {
    pub profile: UserProfile,
    pub mode: EditMode,
    pub draft: UserProfile,
}

/// `/auth/profile`
#[derive(Debug)]
pub struct ProfilePage {
    state: PageState<ProfileView>,
    status: Option<StatusMessage>,
}

impl ProfilePage {
    pub fn mount(client: &ApiClient) -> Self {
        client.session().navigate(Route::Profile);
        let state = match guard::require_session(client) {
            Some(profile) => PageState::Ready(ProfileView {
                draft: profile.clone(),
                profile,
                mode: EditMode::Viewing,
            }),
            None => PageState::Redirected,
        };
        Self { state, status: None }
    }

    pub fn state(&self) -> &PageState<ProfileView> {
        &self.state
    }

    #[cfg(test)]
    pub fn status(&self) -> Option<&StatusMessage> {
        self.status.as_ref()
    }

    /// Switch between viewing and editing. Entering edit mode resets the draft.
    pub fn toggle_edit(&mut self) {
        self.status = None;
        if let Some(view) = self.state.ready_mut() {
            view.mode = match view.mode {
                EditMode::Viewing => {
                    view.draft = view.profile.clone();
                    EditMode::Editing
                }
                EditMode::Editing => EditMode::Viewing,
            };
        }
    }

    /// Change one draft field. Only valid while editing.
    pub fn set_field(&mut self, field: &str, value: &str) -> Result<(), String> {
        let view = self
            .state
            .ready_mut()
            .filter(|v| v.mode == EditMode::Editing)
            .ok_or_else(|| "Not editing".to_string())?;
        let value = value.trim().to_string();
        let draft = &mut view.draft;
        match field {
            "username" => return Err("Username cannot be changed".to_string()),
            "email" => draft.email = value,
            "first_name" => draft.first_name = Some(value),
            "last_name" => draft.last_name = Some(value),
            "telefono" => draft.phone = Some(value),
            "direccion" => draft.address = Some(value),
            "fecha_nacimiento" => draft.birth_date = Some(value),
            _ => return Err(format!("Unknown field: {}", field)),
        }
        Ok(())
    }

    /// Send the changed draft fields. Success returns to viewing; failure
    /// stays in edit mode with the error shown.
    pub fn submit(&mut self, client: &ApiClient) -> bool {
        let Some(view) = self.state.ready_mut() else {
            return false;
        };
        if view.mode != EditMode::Editing {
            return false;
        }

        let update = ProfileUpdate::diff(&view.profile, &view.draft);
        if update.is_empty() {
            view.mode = EditMode::Viewing;
            self.status = Some(StatusMessage::success(NO_CHANGES));
            return true;
        }

        match auth::update_profile(client, &update) {
            Ok(updated) => {
                view.draft = updated.clone();
                view.profile = updated;
                view.mode = EditMode::Viewing;
                self.status = Some(StatusMessage::success(UPDATED));
                true
            }
            Err(e) => {
                let text = match &e {
                    ApiError::Validation { .. } => {
                        format!("Update failed: {}", e.user_message(UPDATE_FAILED))
                    }
                    _ => e.user_message(UPDATE_FAILED),
                };
                self.status = Some(StatusMessage::error(text));
                false
            }
        }
    }

    pub fn logout(&mut self, client: &ApiClient) {
        auth::logout(client.session());
        self.state = PageState::Redirected;
    }

    pub fn render(&self) -> String {
        let mut out = String::from("My profile\n");
        if let Some(status) = &self.status {
            out.push_str(&format!("  {}\n", status));
        }
        let Some(view) = render_state(&self.state, &mut out) else {
            return out;
        };
        out.push_str(&format!("  {}\n", view.profile.display_name()));
        let shown = match view.mode {
            EditMode::Viewing => &view.profile,
            EditMode::Editing => {
                out.push_str("  (editing; username cannot be changed)\n");
                &view.draft
            }
        };
        let dash = |v: &Option<String>| match v.as_deref() {
            Some(s) if !s.is_empty() => s.to_string(),
            _ => "-".to_string(),
        };
        out.push_str(&format!("  Username:   {}\n", shown.username));
        out.push_str(&format!("  Email:      {}\n", shown.email));
        out.push_str(&format!("  First name: {}\n", dash(&shown.first_name)));
        out.push_str(&format!("  Last name:  {}\n", dash(&shown.last_name)));
        out.push_str(&format!("  Phone:      {}\n", dash(&shown.phone)));
        out.push_str(&format!("  Address:    {}\n", dash(&shown.address)));
        out.push_str(&format!("  Birth date: {}\n", dash(&shown.birth_date)));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::PROFILE_PATH;
    use crate::http::testing::*;
    use crate::http::Method;
    use crate::pages::StatusKind;

    fn ready_page(transport: &MockTransport) -> (ApiClient, ProfilePage) {
        transport.on(Method::Get, PROFILE_PATH, 200, PROFILE_JSON);
        let client = logged_in_client(transport, Route::Flights);
        let page = ProfilePage::mount(&client);
        (client, page)
    }

    #[test]
    fn test_mount_shows_profile() {
        let transport = MockTransport::new();
        let (_client, page) = ready_page(&transport);
        let view = page.state().ready().unwrap();
        assert_eq!(view.mode, EditMode::Viewing);
        assert!(page.render().starts_with("My profile\n  Ana Vera\n"));
    }

    #[test]
    fn test_unverified_session_redirects() {
        let transport = MockTransport::new();
        transport.on(Method::Get, PROFILE_PATH, 401, "");
        let client = logged_in_client(&transport, Route::Flights);
        let page = ProfilePage::mount(&client);
        assert!(page.state().is_redirected());
        assert_eq!(client.session().navigator().current(), Route::Login);
        assert_eq!(client.session().navigator().visits(Route::Login), 1);
    }

    #[test]
    fn test_submit_sends_only_changed_fields() {
        let transport = MockTransport::new();
        let updated = PROFILE_JSON.replace(r#""telefono": null"#, r#""telefono": "0999""#);
        transport.on(Method::Patch, PROFILE_PATH, 200, &updated);
        let (client, mut page) = ready_page(&transport);

        page.toggle_edit();
        page.set_field("telefono", "0999").unwrap();
        assert!(page.set_field("username", "bob").is_err());
        assert!(page.submit(&client));

        let view = page.state().ready().unwrap();
        assert_eq!(view.mode, EditMode::Viewing);
        assert_eq!(view.profile.phone.as_deref(), Some("0999"));
        assert_eq!(page.status().unwrap().text, UPDATED);
        let sent = transport.sent_to(Method::Patch, PROFILE_PATH);
        assert_eq!(sent[0].body, Some(serde_json::json!({"telefono": "0999"})));
    }

    #[test]
    fn test_failed_submit_stays_editing() {
        let transport = MockTransport::new();
        transport.on(
            Method::Patch,
            PROFILE_PATH,
            400,
            r#"{"email": ["Enter a valid email address."]}"#,
        );
        let (client, mut page) = ready_page(&transport);

        page.toggle_edit();
        page.set_field("email", "nope").unwrap();
        assert!(!page.submit(&client));
        assert_eq!(page.state().ready().unwrap().mode, EditMode::Editing);
        let status = page.status().unwrap();
        assert_eq!(status.kind, StatusKind::Error);
        assert_eq!(status.text, "Update failed: Enter a valid email address.");
    }

    #[test]
    fn test_unchanged_draft_skips_request() {
        let transport = MockTransport::new();
        let (client, mut page) = ready_page(&transport);
        page.toggle_edit();
        assert!(page.submit(&client));
        assert_eq!(page.status().unwrap().text, NO_CHANGES);
        assert!(transport.sent_to(Method::Patch, PROFILE_PATH).is_empty());
    }

    #[test]
    fn test_set_field_requires_edit_mode() {
        let transport = MockTransport::new();
        let (_client, mut page) = ready_page(&transport);
        assert!(page.set_field("email", "x@y.z").is_err());
    }

    #[test]
    fn test_logout_clears_session() {
        let transport = MockTransport::new();
        let (client, mut page) = ready_page(&transport);
        page.logout(&client);
        assert!(page.state().is_redirected());
        assert_eq!(client.session().access_token(), None);
        assert_eq!(client.session().navigator().current(), Route::Login);
    }
}
