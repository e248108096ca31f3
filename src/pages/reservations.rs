use super::{format_datetime, format_price, render_state, PageState, StatusMessage};
use crate::api::{self, Flight, Reservation};
use crate::fetch::join_related;
use crate::guard;
use crate::http::ApiClient;
use crate::navigation::Route;

pub const LOAD_FAILED: &str = "Could not load your reservations.";
pub const CANCELLED: &str = "Reservation cancelled.";
pub const CANCEL_FAILED: &str = "Could not cancel the reservation. Try again.";
pub const FLIGHT_UNAVAILABLE: &str = "flight details unavailable";

/// Cancellation dialog state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelFlow {
    Idle,
    Confirming(u64),
    Cancelling(u64),
}

/// A reservation joined with its flight, when that could be fetched
#[derive(Debug, Clone, PartialEq)]
pub struct ReservationRow {
    pub reservation: Reservation,
    pub flight: Option<Flight>,
}

impl ReservationRow {
    pub fn can_cancel(&self) -> bool {
        !self.reservation.is_cancelled()
    }
}

/// `/mis-reservas`
#[derive(Debug)]
pub struct ReservationsPage {
    state: PageState<Vec<ReservationRow>>,
    cancel: CancelFlow,
    status: Option<StatusMessage>,
}

impl ReservationsPage {
    pub fn mount(client: &ApiClient) -> Self {
        client.session().navigate(Route::Reservations);
        let mut page = Self {
            state: PageState::Loading,
            cancel: CancelFlow::Idle,
            status: None,
        };
        if guard::require_session(client).is_some() {
            page.load(client);
        } else {
            page.state = PageState::Redirected;
        }
        page
    }

    pub fn state(&self) -> &PageState<Vec<ReservationRow>> {
        &self.state
    }

    #[cfg(test)]
    pub fn cancel_flow(&self) -> CancelFlow {
        self.cancel
    }

    #[cfg(test)]
    pub fn status(&self) -> Option<&StatusMessage> {
        self.status.as_ref()
    }

    /// Fetch the list, then every flight concurrently.
    pub fn load(&mut self, client: &ApiClient) {
        let result = api::list_reservations(client).map(|reservations| {
            join_related(reservations, |r| api::get_flight(client, r.flight_id))
                .into_iter()
                .map(|(reservation, flight)| ReservationRow { reservation, flight })
                .collect::<Vec<_>>()
        });
        self.state = match result {
            Ok(rows) => PageState::Ready(rows),
            Err(e) if e.is_unauthorized() => PageState::Redirected,
            Err(e) => PageState::Failed(e.user_message(LOAD_FAILED)),
        };
    }

    fn row(&self, id: u64) -> Option<&ReservationRow> {
        self.state
            .ready()?
            .iter()
            .find(|row| row.reservation.id == id)
    }

    /// Ask for confirmation. Not offered for cancelled reservations.
    pub fn request_cancel(&mut self, id: u64) -> Result<(), String> {
        let row = self
            .row(id)
            .ok_or_else(|| format!("No reservation #{} in the list", id))?;
        if !row.can_cancel() {
            return Err("Reservation is already cancelled.".to_string());
        }
        self.status = None;
        self.cancel = CancelFlow::Confirming(id);
        Ok(())
    }

    pub fn abort_cancel(&mut self) {
        if let CancelFlow::Confirming(_) = self.cancel {
            self.cancel = CancelFlow::Idle;
        }
    }

    /// Cancel the reservation being confirmed, then re-fetch the list
    /// whatever the outcome.
    pub fn confirm_cancel(&mut self, client: &ApiClient) -> bool {
        let CancelFlow::Confirming(id) = self.cancel else {
            return false;
        };
        self.cancel = CancelFlow::Cancelling(id);
        let result = api::cancel_reservation(client, id);
        let ok = result.is_ok();
        self.status = Some(match result {
            Ok(()) => StatusMessage::success(CANCELLED),
            Err(e) => StatusMessage::error(e.user_message(CANCEL_FAILED)),
        });
        self.cancel = CancelFlow::Idle;
        self.load(client);
        ok
    }

    pub fn render(&self) -> String {
        let mut out = String::from("My reservations\n");
        if let Some(status) = &self.status {
            out.push_str(&format!("  {}\n", status));
        }
        let Some(rows) = render_state(&self.state, &mut out) else {
            return out;
        };
        if rows.is_empty() {
            out.push_str("  You have no reservations yet.\n");
            return out;
        }
        for row in rows {
            let r = &row.reservation;
            out.push_str(&format!(
                "  #{:<4} {}  {}  {} seat(s)  ${}{}\n",
                r.id,
                r.code,
                r.status,
                r.seats,
                r.total_price.as_deref().map(format_price).unwrap_or_else(|| "-".to_string()),
                if row.can_cancel() { "  [cancellable]" } else { "" },
            ));
            match &row.flight {
                Some(f) => out.push_str(&format!(
                    "        {} {} -> {}  {}\n",
                    f.code,
                    f.origin.code,
                    f.destination.code,
                    format_datetime(&f.departure)
                )),
                None => out.push_str(&format!("        ({})\n", FLIGHT_UNAVAILABLE)),
            }
        }
        match self.cancel {
            CancelFlow::Confirming(id) => {
                out.push_str(&format!("  Cancel reservation #{}? This cannot be undone.\n", id))
            }
            CancelFlow::Cancelling(id) => out.push_str(&format!("  Cancelling #{}...\n", id)),
            CancelFlow::Idle => {}
        }
        out
    }
}
