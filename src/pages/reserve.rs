use super::{format_datetime, format_price, parse_id, render_state, PageState, StatusMessage};
use crate::api::{self, Flight, NewReservation, Passenger, Reservation, DOCUMENT_TYPES};
use crate::auth::UserProfile;
use crate::error::ApiError;
use crate::guard;
use crate::http::ApiClient;
use crate::navigation::Route;

/// Upper bound on seats per reservation, whatever the flight has left
pub const MAX_SEATS: u32 = 10;

pub const INVALID_FLIGHT: &str = "Invalid flight id.";
pub const LOAD_FAILED: &str = "Could not load the flight details.";
pub const RESERVE_FAILED: &str = "Could not create the reservation. Try again.";

/// Wire names of the passenger fields
pub const PASSENGER_FIELDS: &[&str] = &[
    "nombre",
    "apellido",
    "tipo_documento",
    "numero_documento",
    "fecha_nacimiento",
];

/// One entry per seat. Resizing keeps the entries that remain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassengerForm {
    passengers: Vec<Passenger>,
}

impl PassengerForm {
    pub fn new(first: Passenger) -> Self {
        Self {
            passengers: vec![first],
        }
    }

    /// First passenger seeded from the profile; documents are entered by hand.
    pub fn prefilled(profile: &UserProfile) -> Self {
        Self::new(Passenger {
            first_name: profile.first_name.clone().unwrap_or_default(),
            last_name: profile.last_name.clone().unwrap_or_default(),
            birth_date: profile.birth_date.clone().unwrap_or_default(),
            ..Default::default()
        })
    }

    pub fn len(&self) -> usize {
        self.passengers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passengers.is_empty()
    }

    pub fn passengers(&self) -> &[Passenger] {
        &self.passengers
    }

    pub fn resize(&mut self, count: usize) {
        self.passengers.resize_with(count, Passenger::default);
    }

    pub fn set(&mut self, index: usize, field: &str, value: &str) -> Result<(), String> {
        let count = self.passengers.len();
        let passenger = self
            .passengers
            .get_mut(index)
            .ok_or_else(|| format!("Passenger {} does not exist (have {})", index + 1, count))?;
        let value = value.trim().to_string();
        match field {
            "nombre" => passenger.first_name = value,
            "apellido" => passenger.last_name = value,
            "tipo_documento" => {
                let value = value.to_uppercase();
                if !DOCUMENT_TYPES.contains(&value.as_str()) {
                    return Err(format!(
                        "Document type must be one of {}",
                        DOCUMENT_TYPES.join(", ")
                    ));
                }
                passenger.document_type = value;
            }
            "numero_documento" => passenger.document_number = value,
            "fecha_nacimiento" => passenger.birth_date = value,
            _ => return Err(format!("Unknown passenger field: {}", field)),
        }
        Ok(())
    }

    /// Index of the first passenger with a blank field
    pub fn first_incomplete(&self) -> Option<usize> {
        self.passengers.iter().position(|p| !p.is_complete())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReserveView {
    pub flight: Flight,
    pub profile: UserProfile,
    pub seats: u32,
    pub form: PassengerForm,
}

impl ReserveView {
    pub fn max_seats(&self) -> u32 {
        self.flight.seats_available.min(MAX_SEATS)
    }
}

/// `/reservar/{flightId}`
#[derive(Debug)]
pub struct ReservePage {
    state: PageState<ReserveView>,
    status: Option<StatusMessage>,
    created: Option<Reservation>,
}

impl ReservePage {
    pub fn mount(client: &ApiClient, raw_flight_id: &str) -> Self {
        let flight_id = parse_id(raw_flight_id);
        if let Some(id) = flight_id {
            client.session().navigate(Route::Reserve(id));
        }
        let state = match (guard::require_session(client), flight_id) {
            (None, _) => PageState::Redirected,
            (Some(_), None) => PageState::Failed(INVALID_FLIGHT.to_string()),
            (Some(profile), Some(id)) => match api::get_flight(client, id) {
                Ok(flight) => PageState::Ready(ReserveView {
                    form: PassengerForm::prefilled(&profile),
                    flight,
                    profile,
                    seats: 1,
                }),
                Err(e) if e.is_unauthorized() => PageState::Redirected,
                Err(e) => PageState::Failed(e.user_message(LOAD_FAILED)),
            },
        };
        Self {
            state,
            status: None,
            created: None,
        }
    }

    pub fn state(&self) -> &PageState<ReserveView> {
        &self.state
    }

    pub fn status(&self) -> Option<&StatusMessage> {
        self.status.as_ref()
    }

    pub fn created(&self) -> Option<&Reservation> {
        self.created.as_ref()
    }

    fn view_mut(&mut self) -> Result<&mut ReserveView, String> {
        self.state
            .ready_mut()
            .ok_or_else(|| "Flight not loaded".to_string())
    }

    /// Change the seat count and resize the passenger list to match.
    pub fn select_seats(&mut self, seats: u32) -> Result<(), String> {
        let view = self.view_mut()?;
        let max = view.max_seats();
        if seats == 0 || seats > max {
            return Err(format!("Choose between 1 and {} seats.", max));
        }
        view.seats = seats;
        view.form.resize(seats as usize);
        Ok(())
    }

    pub fn set_passenger(&mut self, index: usize, field: &str, value: &str) -> Result<(), String> {
        self.view_mut()?.form.set(index, field, value)
    }

    fn check(view: &ReserveView) -> Result<(), String> {
        if view.max_seats() == 0 {
            return Err("No seats available on this flight.".to_string());
        }
        if view.seats > view.max_seats() || view.form.len() != view.seats as usize {
            return Err(format!("Choose between 1 and {} seats.", view.max_seats()));
        }
        if let Some(index) = view.form.first_incomplete() {
            return Err(format!("Passenger {} is incomplete.", index + 1));
        }
        Ok(())
    }

    /// Post the reservation. Success keeps the page and reports the code.
    pub fn submit(&mut self, client: &ApiClient) -> bool {
        let Some(view) = self.state.ready() else {
            return false;
        };
        if let Err(message) = Self::check(view) {
            self.status = Some(StatusMessage::error(message));
            return false;
        }

        let request = NewReservation {
            flight_id: view.flight.id,
            seats: view.seats,
            passengers: view.form.passengers().to_vec(),
        };
        match api::create_reservation(client, &request) {
            Ok(reservation) => {
                tracing::info!(code = %reservation.code, "reservation created");
                self.status = Some(StatusMessage::success(format!(
                    "Reservation created. Code: {}",
                    reservation.code
                )));
                self.created = Some(reservation);
                true
            }
            Err(e) => {
                let text = match &e {
                    ApiError::Validation { .. } => {
                        format!("Reservation failed: {}", e.user_message(RESERVE_FAILED))
                    }
                    _ => e.user_message(RESERVE_FAILED),
                };
                self.status = Some(StatusMessage::error(text));
                false
            }
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::from("Book a flight\n");
        if let Some(status) = &self.status {
            out.push_str(&format!("  {}\n", status));
        }
        let Some(view) = render_state(&self.state, &mut out) else {
            return out;
        };
        let flight = &view.flight;
        out.push_str(&format!(
            "  {} {}  {} ({}) -> {} ({})\n",
            flight.code,
            flight.airline.name,
            flight.origin.city,
            flight.origin.code,
            flight.destination.city,
            flight.destination.code,
        ));
        out.push_str(&format!(
            "  Departs {}  arrives {}\n",
            format_datetime(&flight.departure),
            format_datetime(&flight.arrival)
        ));
        out.push_str(&format!(
            "  ${} per seat, {} available\n",
            format_price(&flight.base_price),
            flight.seats_available
        ));
        out.push_str(&format!("  Seats: {} (max {})\n", view.seats, view.max_seats()));
        for (i, p) in view.form.passengers().iter().enumerate() {
            let blank = |s: &str| if s.is_empty() { "_".to_string() } else { s.to_string() };
            out.push_str(&format!(
                "  Passenger {}: {} {}  {} {}  born {}\n",
                i + 1,
                blank(&p.first_name),
                blank(&p.last_name),
                blank(&p.document_type),
                blank(&p.document_number),
                blank(&p.birth_date),
            ));
        }
        out
    }
}
