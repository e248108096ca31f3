//! Flights and reservations endpoints.

use crate::error::ApiError;
use crate::http::{ApiClient, HttpRequest};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

pub const FLIGHTS_PATH: &str = "vuelos/api/vuelos/";
pub const RESERVATIONS_PATH: &str = "reservas/api/reservas/";

pub fn flight_path(id: u64) -> String {
    format!("{}{}/", FLIGHTS_PATH, id)
}

pub fn reservation_path(id: u64) -> String {
    format!("{}{}/", RESERVATIONS_PATH, id)
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Airline {
    #[serde(rename = "codigo")]
    pub code: String,
    #[serde(rename = "nombre")]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Airport {
    #[serde(rename = "codigo")]
    pub code: String,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "ciudad")]
    pub city: String,
    #[serde(rename = "pais")]
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Flight {
    pub id: u64,
    #[serde(rename = "codigo_vuelo")]
    pub code: String,
    #[serde(rename = "aerolinea")]
    pub airline: Airline,
    #[serde(rename = "origen")]
    pub origin: Airport,
    #[serde(rename = "destino")]
    pub destination: Airport,
    #[serde(rename = "fecha_salida")]
    pub departure: String,
    #[serde(rename = "fecha_llegada")]
    pub arrival: String,
    #[serde(rename = "duracion", default)]
    pub duration: String,
    #[serde(rename = "asientos_disponibles")]
    pub seats_available: u32,
    #[serde(rename = "precio_base", deserialize_with = "decimal_string")]
    pub base_price: String,
}

/// Accepted values of `tipo_documento`
pub const DOCUMENT_TYPES: &[&str] = &["DNI", "PASAPORTE", "CEDULA"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Passenger {
    #[serde(rename = "nombre")]
    pub first_name: String,
    #[serde(rename = "apellido")]
    pub last_name: String,
    #[serde(rename = "tipo_documento")]
    pub document_type: String,
    #[serde(rename = "numero_documento")]
    pub document_number: String,
    #[serde(rename = "fecha_nacimiento")]
    pub birth_date: String,
}

impl Passenger {
    pub fn is_complete(&self) -> bool {
        [
            &self.first_name,
            &self.last_name,
            &self.document_type,
            &self.document_number,
            &self.birth_date,
        ]
        .iter()
        .all(|f| !f.trim().is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum ReservationStatus {
    #[serde(rename = "P")]
    Pending,
    #[serde(rename = "C")]
    Confirmed,
    #[serde(rename = "X")]
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl ReservationStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "Pending",
            ReservationStatus::Confirmed => "Confirmed",
            ReservationStatus::Cancelled => "Cancelled",
            ReservationStatus::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Reservation {
    pub id: u64,
    #[serde(rename = "codigo_reserva")]
    pub code: String,
    #[serde(rename = "vuelo_id")]
    pub flight_id: u64,
    #[serde(rename = "fecha_reserva", default)]
    pub booked_at: Option<String>,
    #[serde(rename = "estado")]
    pub status: ReservationStatus,
    #[serde(rename = "asientos")]
    pub seats: u32,
    #[serde(rename = "precio_total", default, deserialize_with = "optional_decimal_string")]
    pub total_price: Option<String>,
    #[serde(rename = "pasajeros", default)]
    pub passengers: Vec<Passenger>,
}

impl Reservation {
    pub fn is_cancelled(&self) -> bool {
        self.status == ReservationStatus::Cancelled
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewReservation {
    #[serde(rename = "vuelo_id")]
    pub flight_id: u64,
    #[serde(rename = "asientos")]
    pub seats: u32,
    #[serde(rename = "pasajeros")]
    pub passengers: Vec<Passenger>,
}

/// Search filters; blank values are left out of the query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlightFilters {
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub date: Option<String>,
}

impl FlightFilters {
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        [
            ("origen", &self.origin),
            ("destino", &self.destination),
            ("fecha", &self.date),
        ]
        .into_iter()
        .filter_map(|(key, value)| {
            let value = value.as_deref()?.trim();
            (!value.is_empty()).then(|| (key.to_string(), value.to_string()))
        })
        .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.query_pairs().is_empty()
    }
}

// Decimal fields arrive as strings, but tolerate bare numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum DecimalRepr {
    Text(String),
    Number(serde_json::Number),
}

impl From<DecimalRepr> for String {
    fn from(repr: DecimalRepr) -> Self {
        match repr {
            DecimalRepr::Text(s) => s,
            DecimalRepr::Number(n) => n.to_string(),
        }
    }
}

fn decimal_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    DecimalRepr::deserialize(deserializer).map(String::from)
}

fn optional_decimal_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Option::<DecimalRepr>::deserialize(deserializer).map(|r| r.map(String::from))
}

pub fn list_flights(client: &ApiClient, filters: &FlightFilters) -> Result<Vec<Flight>, ApiError> {
    client.fetch_json(HttpRequest::get(FLIGHTS_PATH).with_query(filters.query_pairs()))
}

pub fn get_flight(client: &ApiClient, id: u64) -> Result<Flight, ApiError> {
    client.fetch_json(HttpRequest::get(flight_path(id)))
}

pub fn create_reservation(
    client: &ApiClient,
    reservation: &NewReservation,
) -> Result<Reservation, ApiError> {
    client.fetch_json(HttpRequest::post(RESERVATIONS_PATH, reservation)?)
}

pub fn list_reservations(client: &ApiClient) -> Result<Vec<Reservation>, ApiError> {
    client.fetch_json(HttpRequest::get(RESERVATIONS_PATH))
}

pub fn get_reservation(client: &ApiClient, id: u64) -> Result<Reservation, ApiError> {
    client.fetch_json(HttpRequest::get(reservation_path(id)))
}

/// The server marks the reservation cancelled; the body is ignored.
pub fn cancel_reservation(client: &ApiClient, id: u64) -> Result<(), ApiError> {
    client.send_unit(HttpRequest::delete(reservation_path(id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::*;
    use crate::http::Method;
    use crate::navigation::Route;

    fn passenger(name: &str) -> Passenger {
        Passenger {
            first_name: name.to_string(),
            last_name: "Vera".to_string(),
            document_type: "DNI".to_string(),
            document_number: "123".to_string(),
            birth_date: "1990-02-14".to_string(),
        }
    }

    #[test]
    fn test_filters_build_exact_query() {
        let transport = MockTransport::new();
        transport.on(Method::Get, FLIGHTS_PATH, 200, &format!("[{}]", flight_json(1, 40)));
        let client = logged_in_client(&transport, Route::Flights);

        let filters = FlightFilters {
            origin: Some("UIO".to_string()),
            destination: Some("BOG".to_string()),
            date: Some("2024-05-01".to_string()),
        };
        let flights = list_flights(&client, &filters).unwrap();
        assert_eq!(flights.len(), 1);
        assert_eq!(flights[0].origin.code, "UIO");
        assert_eq!(flights[0].base_price, "150.00");

        let query = transport.sent()[0].query.clone();
        assert_eq!(
            query,
            vec![
                ("origen".to_string(), "UIO".to_string()),
                ("destino".to_string(), "BOG".to_string()),
                ("fecha".to_string(), "2024-05-01".to_string()),
            ]
        );
    }

    #[test]
    fn test_blank_filters_are_omitted() {
        let filters = FlightFilters {
            origin: Some("  ".to_string()),
            destination: None,
            date: Some("2024-05-01".to_string()),
        };
        assert_eq!(
            filters.query_pairs(),
            vec![("fecha".to_string(), "2024-05-01".to_string())]
        );
        assert!(FlightFilters::default().is_empty());
    }

    #[test]
    fn test_create_reservation_payload() {
        let transport = MockTransport::new();
        transport.on(Method::Post, RESERVATIONS_PATH, 201, &reservation_json(7, 1, "P"));
        let client = logged_in_client(&transport, Route::Reserve(1));

        let new = NewReservation {
            flight_id: 1,
            seats: 2,
            passengers: vec![passenger("Ana"), passenger("Luis")],
        };
        let created = create_reservation(&client, &new).unwrap();
        assert_eq!(created.code, "R7XYZ12");
        assert_eq!(created.status, ReservationStatus::Pending);

        let body = transport.sent()[0].body.clone().unwrap();
        assert_eq!(body["vuelo_id"], 1);
        assert_eq!(body["asientos"], 2);
        assert_eq!(body["pasajeros"].as_array().unwrap().len(), 2);
        assert_eq!(body["pasajeros"][1]["nombre"], "Luis");
        assert_eq!(body["pasajeros"][0]["tipo_documento"], "DNI");
    }

    #[test]
    fn test_create_reservation_surfaces_server_validation() {
        let transport = MockTransport::new();
        transport.on(
            Method::Post,
            RESERVATIONS_PATH,
            400,
            r#"{"asientos": ["No puede reservar más de 10 asientos"]}"#,
        );
        let client = logged_in_client(&transport, Route::Reserve(1));
        let new = NewReservation {
            flight_id: 1,
            seats: 11,
            passengers: Vec::new(),
        };
        let err = create_reservation(&client, &new).unwrap_err();
        assert_eq!(err.user_message("x"), "No puede reservar más de 10 asientos");
    }

    #[test]
    fn test_reservation_decoding_tolerates_shapes() {
        let r: Reservation = serde_json::from_str(
            r#"{"id": 1, "codigo_reserva": "ABC", "vuelo_id": 2, "estado": "Z",
                "asientos": 1, "precio_total": 99.5}"#,
        )
        .unwrap();
        assert_eq!(r.status, ReservationStatus::Unknown);
        assert_eq!(r.total_price.as_deref(), Some("99.5"));
        assert!(r.passengers.is_empty());
        assert_eq!(r.booked_at, None);
    }

    #[test]
    fn test_cancel_and_detail_paths() {
        let transport = MockTransport::new();
        transport.on(Method::Delete, &reservation_path(5), 204, "");
        transport.on(Method::Get, &reservation_path(5), 200, &reservation_json(5, 1, "X"));
        let client = logged_in_client(&transport, Route::Reservations);

        cancel_reservation(&client, 5).unwrap();
        let r = get_reservation(&client, 5).unwrap();
        assert!(r.is_cancelled());
        assert_eq!(transport.sent_to(Method::Delete, "reservas/api/reservas/5/").len(), 1);
    }

    #[test]
    fn test_missing_flight_is_not_found() {
        let transport = MockTransport::new();
        let client = logged_in_client(&transport, Route::Reserve(99));
        assert_eq!(get_flight(&client, 99).unwrap_err(), ApiError::NotFound);
    }

    #[test]
    fn test_passenger_completeness() {
        assert!(passenger("Ana").is_complete());
        let mut p = passenger("Ana");
        p.document_number = " ".to_string();
        assert!(!p.is_complete());
    }
}
