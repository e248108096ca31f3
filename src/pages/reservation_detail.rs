use super::{format_datetime, format_price, parse_id, render_state, PageState};
use crate::api::{self, Flight, Reservation};
use crate::guard;
use crate::http::ApiClient;
use crate::navigation::Route;

pub const INVALID_RESERVATION: &str = "Invalid reservation id.";
pub const LOAD_FAILED: &str = "Could not load the reservation details.";

#[derive(Debug, Clone, PartialEq)]
pub struct ReservationDetail {
    pub reservation: Reservation,
    /// `None` when the flight could not be fetched
    pub flight: Option<Flight>,
}

/// `/mis-reservas/{reservaId}`
#[derive(Debug)]
pub struct ReservationDetailPage {
    state: PageState<ReservationDetail>,
}

impl ReservationDetailPage {
    pub fn mount(client: &ApiClient, raw_id: &str) -> Self {
        let id = parse_id(raw_id);
        if let Some(id) = id {
            client.session().navigate(Route::ReservationDetail(id));
        }
        let state = match (guard::require_session(client), id) {
            (None, _) => PageState::Redirected,
            (Some(_), None) => PageState::Failed(INVALID_RESERVATION.to_string()),
            (Some(_), Some(id)) => Self::load(client, id),
        };
        Self { state }
    }

    fn load(client: &ApiClient, id: u64) -> PageState<ReservationDetail> {
        let reservation = match api::get_reservation(client, id) {
            Ok(r) => r,
            Err(e) if e.is_unauthorized() => return PageState::Redirected,
            Err(e) => return PageState::Failed(e.user_message(LOAD_FAILED)),
        };
        let flight = match api::get_flight(client, reservation.flight_id) {
            Ok(flight) => Some(flight),
            Err(e) if e.is_unauthorized() => return PageState::Redirected,
            Err(e) => {
                tracing::warn!(flight_id = reservation.flight_id, "flight fetch failed: {}", e);
                None
            }
        };
        PageState::Ready(ReservationDetail {
            reservation,
            flight,
        })
    }

    #[cfg(test)]
    pub fn state(&self) -> &PageState<ReservationDetail> {
        &self.state
    }

    pub fn render(&self) -> String {
        let mut out = String::from("Reservation details\n");
        let Some(detail) = render_state(&self.state, &mut out) else {
            return out;
        };
        let r = &detail.reservation;
        out.push_str(&format!("  Code:    {}\n", r.code));
        out.push_str(&format!("  Status:  {}\n", r.status));
        if let Some(booked) = &r.booked_at {
            out.push_str(&format!("  Booked:  {}\n", format_datetime(booked)));
        }
        out.push_str(&format!("  Seats:   {}\n", r.seats));
        out.push_str(&format!(
            "  Total:   {}\n",
            r.total_price
                .as_deref()
                .map(|p| format!("${}", format_price(p)))
                .unwrap_or_else(|| "N/A".to_string())
        ));

        out.push_str("  Flight\n");
        match &detail.flight {
            Some(f) => {
                out.push_str(&format!("    {} ({})\n", f.code, f.airline.name));
                out.push_str(&format!(
                    "    {}, {} ({}) -> {}, {} ({})\n",
                    f.origin.city,
                    f.origin.country,
                    f.origin.code,
                    f.destination.city,
                    f.destination.country,
                    f.destination.code
                ));
                out.push_str(&format!(
                    "    Departs {}  arrives {}  ({})\n",
                    format_datetime(&f.departure),
                    format_datetime(&f.arrival),
                    f.duration
                ));
            }
            None => out.push_str("    Flight details unavailable.\n"),
        }

        out.push_str("  Passengers\n");
        if r.passengers.is_empty() {
            out.push_str("    No passengers registered.\n");
        }
        for (i, p) in r.passengers.iter().enumerate() {
            out.push_str(&format!(
                "    {}. {} {}  {} {}  born {}\n",
                i + 1,
                p.first_name,
                p.last_name,
                p.document_type,
                p.document_number,
                format_datetime(&p.birth_date)
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{flight_path, reservation_path};
    use crate::auth::PROFILE_PATH;
    use crate::http::testing::*;
    use crate::http::Method;

    fn setup(transport: &MockTransport) -> ApiClient {
        transport.on(Method::Get, PROFILE_PATH, 200, PROFILE_JSON);
        logged_in_client(transport, Route::Reservations)
    }

    #[test]
    fn test_detail_with_flight() {
        let transport = MockTransport::new();
        let body = reservation_json(4, 1, "C").replace(r#""150.00""#, r#""300.5""#);
        transport.on(Method::Get, &reservation_path(4), 200, &body);
        transport.on(Method::Get, &flight_path(1), 200, &flight_json(1, 40));
        let client = setup(&transport);

        let page = ReservationDetailPage::mount(&client, "4");
        let detail = page.state().ready().unwrap();
        assert_eq!(detail.flight.as_ref().unwrap().id, 1);
        let text = page.render();
        assert!(text.contains("$300.50"));
        assert!(text.contains("Confirmed"));
        assert!(text.contains("Quito, Ecuador (UIO)"));
        assert_eq!(client.session().navigator().current(), Route::ReservationDetail(4));
    }

    #[test]
    fn test_flight_failure_degrades() {
        let transport = MockTransport::new();
        transport.on(Method::Get, &reservation_path(4), 200, &reservation_json(4, 8, "P"));
        transport.fail(Method::Get, &flight_path(8), "connection reset");
        let client = setup(&transport);

        let page = ReservationDetailPage::mount(&client, "4");
        assert_eq!(page.state().ready().unwrap().flight, None);
        assert!(page.render().contains("Flight details unavailable."));
    }

    #[test]
    fn test_no_passengers_and_missing_price() {
        let transport = MockTransport::new();
        transport.on(
            Method::Get,
            &reservation_path(4),
            200,
            r#"{"id": 4, "codigo_reserva": "ABC", "vuelo_id": 1, "estado": "P", "asientos": 1, "pasajeros": []}"#,
        );
        transport.on(Method::Get, &flight_path(1), 200, &flight_json(1, 40));
        let client = setup(&transport);

        let text = ReservationDetailPage::mount(&client, "4").render();
        assert!(text.contains("No passengers registered."));
        assert!(text.contains("Total:   N/A"));
    }

    #[test]
    fn test_invalid_and_missing_reservation() {
        let transport = MockTransport::new();
        let client = setup(&transport);
        let page = ReservationDetailPage::mount(&client, "x1");
        assert_eq!(page.state().failure(), Some(INVALID_RESERVATION));

        let page = ReservationDetailPage::mount(&client, "99");
        assert_eq!(page.state().failure(), Some(LOAD_FAILED));
    }

    #[test]
    fn test_expired_session_redirects() {
        let transport = MockTransport::new();
        transport.on(Method::Get, PROFILE_PATH, 401, "");
        let client = logged_in_client(&transport, Route::Reservations);
        let page = ReservationDetailPage::mount(&client, "4");
        assert!(page.state().is_redirected());
        assert_eq!(client.session().navigator().visits(Route::Login), 1);
        assert!(transport.sent_to(Method::Get, &reservation_path(4)).is_empty());
    }
}
