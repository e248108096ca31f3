//! Client routes and the navigator that moves between them.

use std::fmt;
use std::sync::{Mutex, PoisonError};

/// One page of the client, addressed by the same paths the web client used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    Register,
    Profile,
    Dashboard,
    Flights,
    Reserve(u64),
    Reservations,
    ReservationDetail(u64),
}

impl Route {
    pub fn path(&self) -> String {
        match self {
            Route::Login => "/auth/login".to_string(),
            Route::Register => "/auth/register".to_string(),
            Route::Profile => "/auth/profile".to_string(),
            Route::Dashboard => "/dashboard".to_string(),
            Route::Flights => "/vuelos".to_string(),
            Route::Reserve(flight_id) => format!("/reservar/{}", flight_id),
            Route::Reservations => "/mis-reservas".to_string(),
            Route::ReservationDetail(id) => format!("/mis-reservas/{}", id),
        }
    }

    /// Parse a browser-style path. Trailing slashes are ignored.
    pub fn parse(path: &str) -> Option<Self> {
        let segments: Vec<&str> = path
            .trim_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();
        match segments.as_slice() {
            ["auth", "login"] => Some(Route::Login),
            ["auth", "register"] => Some(Route::Register),
            ["auth", "profile"] => Some(Route::Profile),
            ["dashboard"] => Some(Route::Dashboard),
            ["vuelos"] => Some(Route::Flights),
            ["reservar", id] => id.parse().ok().map(Route::Reserve),
            ["mis-reservas"] => Some(Route::Reservations),
            ["mis-reservas", id] => id.parse().ok().map(Route::ReservationDetail),
            _ => None,
        }
    }

    /// Whether the page behind this route requires a verified session
    pub fn is_protected(&self) -> bool {
        !matches!(self, Route::Login | Route::Register)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

#[derive(Debug)]
struct NavState {
    current: Route,
    history: Vec<Route>,
}

/// Tracks the current route and every navigation performed.
///
/// Navigating to the route that is already current is a no-op, so a failure
/// that several layers react to (the HTTP client and a page guard) moves the
/// client at most once.
#[derive(Debug)]
pub struct Navigator {
    state: Mutex<NavState>,
}

impl Navigator {
    pub fn new(start: Route) -> Self {
        Self {
            state: Mutex::new(NavState {
                current: start,
                history: Vec::new(),
            }),
        }
    }

    pub fn current(&self) -> Route {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .current
    }

    /// Move to `to`. Returns the previous route, or `None` if already there.
    pub fn navigate(&self, to: Route) -> Option<Route> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.current == to {
            return None;
        }
        let from = state.current;
        state.current = to;
        state.history.push(to);
        Some(from)
    }

    /// Every route navigated to, oldest first
    pub fn history(&self) -> Vec<Route> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .history
            .clone()
    }

    #[cfg(test)]
    pub fn visits(&self, route: Route) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .history
            .iter()
            .filter(|r| **r == route)
            .count()
    }
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new(Route::Login)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_paths_round_trip() {
        for route in [
            Route::Login,
            Route::Register,
            Route::Profile,
            Route::Dashboard,
            Route::Flights,
            Route::Reserve(12),
            Route::Reservations,
            Route::ReservationDetail(7),
        ] {
            assert_eq!(Route::parse(&route.path()), Some(route));
        }
    }

    #[test]
    fn test_route_parse_rejects_bad_ids() {
        assert_eq!(Route::parse("/reservar/abc"), None);
        assert_eq!(Route::parse("/mis-reservas/-1"), None);
        assert_eq!(Route::parse("/nowhere"), None);
        assert_eq!(Route::parse("/vuelos/"), Some(Route::Flights));
    }

    #[test]
    fn test_protected_routes() {
        assert!(!Route::Login.is_protected());
        assert!(!Route::Register.is_protected());
        assert!(Route::Flights.is_protected());
        assert!(Route::ReservationDetail(1).is_protected());
    }

    #[test]
    fn test_navigate_to_current_is_noop() {
        let nav = Navigator::new(Route::Flights);
        assert_eq!(nav.navigate(Route::Login), Some(Route::Flights));
        assert_eq!(nav.navigate(Route::Login), None);
        assert_eq!(nav.visits(Route::Login), 1);
        assert_eq!(nav.current(), Route::Login);
        assert_eq!(nav.history(), vec![Route::Login]);
    }
}
