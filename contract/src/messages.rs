//! Notification text templates.

use crate::types::FlightId;

/// Text sent to each passenger of a cancelled flight
#[must_use]
pub fn cancellation_message(flight_id: FlightId, reason: &str) -> String {
    format!("Your flight {flight_id} has been cancelled. Reason: {reason}")
}

/// Text sent when a passenger's bag changes status
#[must_use]
pub fn baggage_message(new_status: &str, baggage_id: u64) -> String {
    format!("Baggage state changed to {new_status} for baggage {baggage_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_text_embeds_flight_and_reason() {
        let text = cancellation_message(FlightId::new(1), "Weather");
        assert_eq!(text, "Your flight 1 has been cancelled. Reason: Weather");
    }

    #[test]
    fn baggage_text_embeds_status_and_bag() {
        let text = baggage_message("LOST", 77);
        assert_eq!(text, "Baggage state changed to LOST for baggage 77");
    }
}
