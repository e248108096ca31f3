//! Terminal pages, one per route.
//!
//! Each page owns its state machine and renders itself to text. Pages call
//! the auth and domain modules through the shared [`ApiClient`](crate::http::ApiClient)
//! and show failures only via [`ApiError::user_message`](crate::error::ApiError::user_message).

pub mod flights;
pub mod login;
pub mod profile;
pub mod register;
pub mod reservation_detail;
pub mod reservations;
pub mod reserve;

use crate::http::ApiClient;
use crate::navigation::Route;
use chrono::{DateTime, NaiveDate};
use std::fmt;

/// Lifecycle of a page's primary data
#[derive(Debug, Clone, PartialEq)]
pub enum PageState<T> {
    Loading,
    /// Sent to login by the guard; nothing else happens on this page.
    Redirected,
    Failed(String),
    Ready(T),
}

impl<T> PageState<T> {
    pub fn ready(&self) -> Option<&T> {
        match self {
            PageState::Ready(data) => Some(data),
            _ => None,
        }
    }

    pub fn ready_mut(&mut self) -> Option<&mut T> {
        match self {
            PageState::Ready(data) => Some(data),
            _ => None,
        }
    }

    pub fn is_redirected(&self) -> bool {
        matches!(self, PageState::Redirected)
    }

    #[cfg(test)]
    pub fn failure(&self) -> Option<&str> {
        match self {
            PageState::Failed(message) => Some(message),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditMode {
    Viewing,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Success,
    Error,
}

/// Transient banner shown above a page after an action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub kind: StatusKind,
    pub text: String,
}

impl StatusMessage {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Success,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Error,
            text: text.into(),
        }
    }
}

impl fmt::Display for StatusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            StatusKind::Success => write!(f, "[ok] {}", self.text),
            StatusKind::Error => write!(f, "[error] {}", self.text),
        }
    }
}

/// Render the non-ready states the same way on every page. Returns the data
/// when there is something more to show.
pub(crate) fn render_state<'a, T>(state: &'a PageState<T>, out: &mut String) -> Option<&'a T> {
    match state {
        PageState::Loading => out.push_str("  Loading...\n"),
        PageState::Redirected => out.push_str("  Redirecting to login...\n"),
        PageState::Failed(message) => out.push_str(&format!("  {}\n", message)),
        PageState::Ready(data) => return Some(data),
    }
    None
}

/// Decimal string with two places; unparseable input is shown as-is.
pub fn format_price(raw: &str) -> String {
    match raw.trim().parse::<f64>() {
        Ok(value) => format!("{:.2}", value),
        Err(_) => raw.to_string(),
    }
}

/// `YYYY-MM-DD HH:MM` for RFC 3339 timestamps, `YYYY-MM-DD` for dates.
pub fn format_datetime(raw: &str) -> String {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return ts.format("%Y-%m-%d %H:%M").to_string();
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.format("%Y-%m-%d").to_string();
    }
    raw.to_string()
}

/// Positive numeric id from a path segment
pub fn parse_id(raw: &str) -> Option<u64> {
    raw.trim().parse().ok().filter(|id| *id > 0)
}

/// The dashboard has no content of its own.
pub fn open_dashboard(client: &ApiClient) {
    client.session().navigate(Route::Dashboard);
    client.session().navigate(Route::Flights);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::*;

    #[test]
    fn test_format_price() {
        assert_eq!(format_price("150"), "150.00");
        assert_eq!(format_price("99.5"), "99.50");
        assert_eq!(format_price("n/a"), "n/a");
    }

    #[test]
    fn test_format_datetime() {
        assert_eq!(format_datetime("2024-05-01T08:30:00Z"), "2024-05-01 08:30");
        assert_eq!(format_datetime("2024-05-01"), "2024-05-01");
        assert_eq!(format_datetime("soon"), "soon");
    }

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("12"), Some(12));
        assert_eq!(parse_id("0"), None);
        assert_eq!(parse_id("abc"), None);
        assert_eq!(parse_id("-3"), None);
    }

    #[test]
    fn test_dashboard_forwards_to_flights() {
        let transport = MockTransport::new();
        let client = logged_in_client(&transport, Route::Login);
        open_dashboard(&client);
        assert_eq!(client.session().navigator().current(), Route::Flights);
        assert_eq!(
            client.session().navigator().history(),
            vec![Route::Dashboard, Route::Flights]
        );
    }

    #[test]
    fn test_status_message_display() {
        assert_eq!(StatusMessage::success("done").to_string(), "[ok] done");
        assert_eq!(StatusMessage::error("nope").to_string(), "[error] nope");
    }
}
