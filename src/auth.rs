//! Login, registration, logout, session verification and profile updates.

use crate::error::ApiError;
use crate::http::{ApiClient, HttpRequest};
use crate::navigation::Route;
use crate::session::SessionContext;
use serde::{Deserialize, Serialize};

pub const LOGIN_PATH: &str = "usuarios/api/auth/login/";
pub const REGISTER_PATH: &str = "usuarios/api/auth/registro/";
pub const PROFILE_PATH: &str = "usuarios/api/auth/perfil/";

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AuthResponse {
    pub access: String,
    pub refresh: String,
    #[serde(default)]
    pub user_id: Option<u64>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct UserProfile {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default, rename = "telefono")]
    pub phone: Option<String>,
    #[serde(default, rename = "direccion")]
    pub address: Option<String>,
    #[serde(default, rename = "fecha_nacimiento")]
    pub birth_date: Option<String>,
}

impl UserProfile {
    /// "First Last", falling back to the username
    pub fn display_name(&self) -> String {
        let name = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if name.is_empty() {
            self.username.clone()
        } else {
            name
        }
    }

    /// Uppercase first letter of the username, for the page header
    pub fn initial(&self) -> char {
        self.username
            .chars()
            .next()
            .map(|c| c.to_ascii_uppercase())
            .unwrap_or('U')
    }
}

/// Payload for a new account. Blank optional fields are not sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub first_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub last_name: String,
    #[serde(rename = "telefono", skip_serializing_if = "String::is_empty")]
    pub phone: String,
    #[serde(rename = "direccion", skip_serializing_if = "String::is_empty")]
    pub address: String,
    #[serde(rename = "fecha_nacimiento", skip_serializing_if = "String::is_empty")]
    pub birth_date: String,
}

impl Registration {
    /// Set a field by its wire name.
    pub fn set(&mut self, field: &str, value: &str) -> Result<(), String> {
        let slot = match field {
            "username" => &mut self.username,
            "email" => &mut self.email,
            "password" => &mut self.password,
            "first_name" => &mut self.first_name,
            "last_name" => &mut self.last_name,
            "telefono" => &mut self.phone,
            "direccion" => &mut self.address,
            "fecha_nacimiento" => &mut self.birth_date,
            _ => return Err(format!("Unknown field: {}", field)),
        };
        *slot = value.trim().to_string();
        Ok(())
    }

    /// Names of required fields left blank
    pub fn missing_required(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.username.is_empty() {
            missing.push("username");
        }
        if self.email.is_empty() {
            missing.push("email");
        }
        if self.password.is_empty() {
            missing.push("password");
        }
        missing
    }
}

/// Partial profile update. Only `Some` fields are sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(rename = "telefono", skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(rename = "direccion", skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(rename = "fecha_nacimiento", skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,
}

impl ProfileUpdate {
    /// Fields of `draft` that differ from `current`
    pub fn diff(current: &UserProfile, draft: &UserProfile) -> Self {
        fn changed(old: &Option<String>, new: &Option<String>) -> Option<String> {
            let old = old.as_deref().unwrap_or("");
            let new = new.as_deref().unwrap_or("");
            (old != new).then(|| new.to_string())
        }
        Self {
            email: (current.email != draft.email).then(|| draft.email.clone()),
            first_name: changed(&current.first_name, &draft.first_name),
            last_name: changed(&current.last_name, &draft.last_name),
            phone: changed(&current.phone, &draft.phone),
            address: changed(&current.address, &draft.address),
            birth_date: changed(&current.birth_date, &draft.birth_date),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Authenticate and persist both credentials.
pub fn login(client: &ApiClient, username: &str, password: &str) -> Result<AuthResponse, ApiError> {
    let request = HttpRequest::post(LOGIN_PATH, &LoginRequest { username, password })?;
    let response: AuthResponse = client.fetch_json(request)?;
    client
        .session()
        .store_tokens(&response.access, &response.refresh)
        .map_err(|e| ApiError::Storage(format!("{:#}", e)))?;
    client.session().record(|j| j.login(username));
    tracing::info!(username, "logged in");
    Ok(response)
}

pub fn register(client: &ApiClient, registration: &Registration) -> Result<UserProfile, ApiError> {
    client.fetch_json(HttpRequest::post(REGISTER_PATH, registration)?)
}

/// Drop both credentials and go to login. No network call.
pub fn logout(session: &SessionContext) {
    if let Err(e) = session.clear() {
        tracing::warn!("failed to clear credentials: {:#}", e);
    }
    session.record(|j| j.logout());
    session.navigate(Route::Login);
}

/// The current user's profile, or `None` on any failure.
pub fn verify_session(client: &ApiClient) -> Option<UserProfile> {
    match client.fetch_json(HttpRequest::get(PROFILE_PATH)) {
        Ok(profile) => Some(profile),
        Err(e) => {
            tracing::debug!("session verification failed: {}", e);
            None
        }
    }
}

pub fn update_profile(client: &ApiClient, update: &ProfileUpdate) -> Result<UserProfile, ApiError> {
    client.fetch_json(HttpRequest::patch(PROFILE_PATH, update)?)
}
