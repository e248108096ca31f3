use super::{format_datetime, format_price, render_state, PageState};
use crate::api::{self, Flight, FlightFilters};
use crate::auth::{self, UserProfile};
use crate::error::ApiError;
use crate::fetch::{FetchSequence, FetchToken};
use crate::guard;
use crate::http::ApiClient;
use crate::navigation::Route;

pub const LOAD_FAILED: &str = "Could not load flights. Try again later.";

/// `/vuelos`
#[derive(Debug)]
pub struct FlightsPage {
    filters: FlightFilters,
    state: PageState<Vec<Flight>>,
    profile: Option<UserProfile>,
    searches: FetchSequence,
}

impl FlightsPage {
    /// Verify the session, then run an unfiltered search.
    pub fn mount(client: &ApiClient) -> Self {
        Self::mount_with(client, FlightFilters::default())
    }

    pub fn mount_with(client: &ApiClient, filters: FlightFilters) -> Self {
        client.session().navigate(Route::Flights);
        let mut page = Self {
            filters: FlightFilters::default(),
            state: PageState::Loading,
            profile: None,
            searches: FetchSequence::new(),
        };
        page.set_filters(
            filters.origin.as_deref(),
            filters.destination.as_deref(),
            filters.date.as_deref(),
        );
        match guard::require_session(client) {
            Some(profile) => {
                page.profile = Some(profile);
                page.search(client);
            }
            None => page.state = PageState::Redirected,
        }
        page
    }

    pub fn state(&self) -> &PageState<Vec<Flight>> {
        &self.state
    }

    pub fn filters(&self) -> &FlightFilters {
        &self.filters
    }

    /// Airport codes are matched uppercase.
    pub fn set_filters(&mut self, origin: Option<&str>, destination: Option<&str>, date: Option<&str>) {
        self.filters = FlightFilters {
            origin: origin.map(str::to_uppercase),
            destination: destination.map(str::to_uppercase),
            date: date.map(str::to_string),
        };
    }

    pub fn search(&mut self, client: &ApiClient) {
        let token = self.begin_search();
        let result = api::list_flights(client, &self.filters);
        self.finish_search(client, token, result);
    }

    pub fn clear_filters(&mut self, client: &ApiClient) {
        self.filters = FlightFilters::default();
        self.search(client);
    }

    /// Start a search; any search started earlier becomes stale.
    pub fn begin_search(&mut self) -> FetchToken {
        if self.state.ready().is_none() {
            self.state = PageState::Loading;
        }
        self.searches.begin()
    }

    /// Apply a search result unless a newer search has started since.
    /// Returns whether the result was applied.
    pub fn finish_search(
        &mut self,
        client: &ApiClient,
        token: FetchToken,
        result: Result<Vec<Flight>, ApiError>,
    ) -> bool {
        if !self.searches.is_current(token) {
            tracing::debug!("discarding superseded flight search");
            return false;
        }
        self.state = match result {
            Ok(flights) => PageState::Ready(flights),
            Err(e) if e.is_unauthorized() => {
                auth::logout(client.session());
                PageState::Redirected
            }
            Err(e) => PageState::Failed(e.user_message(LOAD_FAILED)),
        };
        true
    }

    pub fn logout(&mut self, client: &ApiClient) {
        self.searches.cancel();
        auth::logout(client.session());
        self.state = PageState::Redirected;
    }

    pub fn render(&self) -> String {
        let mut out = String::from("SABJ Air: available flights");
        if let Some(profile) = &self.profile {
            out.push_str(&format!("  [{}]", profile.initial()));
        }
        out.push('\n');

        if !self.filters.is_empty() {
            let shown: Vec<String> = self
                .filters
                .query_pairs()
                .iter().map(|(k, v)| format!("{}={}", k, v)).collect();
            out.push_str(&format!("  Filters: {}\n", shown.join(" ")));
        }

        let Some(flights) = render_state(&self.state, &mut out) else {
            return out;
        };
        if flights.is_empty() {
            out.push_str("  No flights match the filters.\n");
            return out;
        }
        for flight in flights {
            out.push_str(&format!(
                "  #{:<4} {} {}  {} -> {}  {} to {}  seats {}  ${}\n",
                flight.id,
                flight.code,
                flight.airline.name,
                flight.origin.code,
                flight.destination.code,
                format_datetime(&flight.departure),
                format_datetime(&flight.arrival),
                flight.seats_available,
                format_price(&flight.base_price),
            ));
        }
        out
    }
}

/// Full description of one flight
pub fn describe_flight(flight: &Flight) -> String {
    let mut out = format!("{} ({}, {})\n", flight.code, flight.airline.name, flight.airline.code);
    for (label, airport) in [("From", &flight.origin), ("To", &flight.destination)] {
        out.push_str(&format!(
            "  {:<5} {} ({}), {}, {}\n",
            label, airport.name, airport.code, airport.city, airport.country
        ));
    }
    out.push_str(&format!(
        "  Departs {}  arrives {}  duration {}\n",
        format_datetime(&flight.departure),
        format_datetime(&flight.arrival),
        flight.duration
    ));
    out.push_str(&format!(
        "  ${} per seat, {} seats available\n",
        format_price(&flight.base_price),
        flight.seats_available
    ));
    out
}
