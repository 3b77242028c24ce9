//! Flight records and their lifecycle.

use airport_contract::FlightId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a flight.
///
/// `Active → Cancelled`; `Cancelled` is terminal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlightStatus {
    /// Scheduled and operating
    #[default]
    Active,
    /// Cancelled; never leaves this state
    Cancelled,
}

impl fmt::Display for FlightStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "Active"),
            Self::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// Where a flight sits relative to "now", derived from its timestamps
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlightWindow {
    /// Departure is still ahead
    Upcoming,
    /// Departed, not yet arrived
    InFlight,
    /// Arrived
    Departed,
}

/// A scheduled flight
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flight {
    /// Caller-assigned id
    pub id: FlightId,
    /// Flight name, e.g. `LH1234`
    pub name: String,
    /// Origin airport code
    pub airport_from: String,
    /// Destination airport code
    pub airport_to: String,
    /// Scheduled departure
    pub departure_time: DateTime<Utc>,
    /// Scheduled arrival
    pub arrival_time: DateTime<Utc>,
    /// Seat capacity
    pub capacity: u32,
    /// Lifecycle status
    #[serde(default)]
    pub status: FlightStatus,
}

impl Flight {
    /// Window of this flight at `now`.
    ///
    /// Departure is inclusive for `InFlight`, arrival inclusive for
    /// `Departed`.
    #[must_use]
    pub fn window(&self, now: DateTime<Utc>) -> FlightWindow {
        if now < self.departure_time {
            FlightWindow::Upcoming
        } else if now < self.arrival_time {
            FlightWindow::InFlight
        } else {
            FlightWindow::Departed
        }
    }

    /// Whether the flight has been cancelled
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.status == FlightStatus::Cancelled
    }

    /// Read model of this flight at `now`
    #[must_use]
    pub fn view(&self, now: DateTime<Utc>) -> FlightView {
        FlightView {
            window: self.window(now),
            flight: self.clone(),
        }
    }
}

/// A flight plus its window, as served over HTTP
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightView {
    /// The stored record
    #[serde(flatten)]
    pub flight: Flight,
    /// Derived window, never stored
    pub window: FlightWindow,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use chrono::Duration;

    fn flight_departing(departure: DateTime<Utc>) -> Flight {
        Flight {
            id: FlightId::new(1),
            name: "AB100".to_string(),
            airport_from: "ZAG".to_string(),
            airport_to: "LHR".to_string(),
            departure_time: departure,
            arrival_time: departure + Duration::hours(2),
            capacity: 180,
            status: FlightStatus::Active,
        }
    }

    #[test]
    fn window_follows_timestamps() {
        let departure = DateTime::parse_from_rfc3339("2025-01-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let flight = flight_departing(departure);

        assert_eq!(flight.window(departure - Duration::minutes(1)), FlightWindow::Upcoming);
        assert_eq!(flight.window(departure), FlightWindow::InFlight);
        assert_eq!(flight.window(departure + Duration::hours(2)), FlightWindow::Departed);
    }

    #[test]
    fn missing_status_defaults_to_active() {
        let json = serde_json::json!({
            "id": 7,
            "name": "AB7",
            "airport_from": "ZAG",
            "airport_to": "CDG",
            "departure_time": "2025-02-01T08:00:00Z",
            "arrival_time": "2025-02-01T10:00:00Z",
            "capacity": 120,
        });

        let flight: Flight = serde_json::from_value(json).unwrap();
        assert_eq!(flight.status, FlightStatus::Active);
        assert!(!flight.is_cancelled());
    }

    #[test]
    fn view_flattens_flight_fields() {
        let flight = flight_departing(Utc::now() + Duration::days(1));
        let value = serde_json::to_value(flight.view(Utc::now())).unwrap();

        assert_eq!(value["name"], "AB100");
        assert_eq!(value["status"], "Active");
        assert_eq!(value["window"], "upcoming");
    }
}
