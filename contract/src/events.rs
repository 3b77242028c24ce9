//! Events carried on the baggage feed.

use crate::types::PassengerId;
use airport_core::event::Event;
use serde::{Deserialize, Serialize};

/// Default topic the baggage service publishes status changes on
pub const BAGGAGE_TOPIC: &str = "baggage-state-change";

/// A bag moved to a new handling status.
///
/// Produced outside this workspace; delivered at least once and unordered
/// across bags. On the wire the fields are camelCase:
/// `{"baggageId": 555, "passengerId": 10, "newStatus": "LOADED"}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaggageStateChanged {
    /// Bag identifier
    pub baggage_id: u64,
    /// Owner of the bag
    pub passenger_id: PassengerId,
    /// New handling status, e.g. `LOADED` or `LOST`
    pub new_status: String,
}

impl BaggageStateChanged {
    /// Envelope type for this event
    pub const EVENT_TYPE: &'static str = "BaggageStateChanged.v1";
}

impl Event for BaggageStateChanged {
    fn event_type(&self) -> &'static str {
        Self::EVENT_TYPE
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use airport_core::event::SerializedEvent;

    #[test]
    fn decodes_producer_json() {
        let envelope = SerializedEvent::new(
            BaggageStateChanged::EVENT_TYPE.to_string(),
            br#"{"baggageId":555,"passengerId":10,"newStatus":"LOADED"}"#.to_vec(),
            None,
        );

        let event: BaggageStateChanged = envelope.decode(BaggageStateChanged::EVENT_TYPE).unwrap();
        assert_eq!(event.baggage_id, 555);
        assert_eq!(event.passenger_id, PassengerId::new(10));
        assert_eq!(event.new_status, "LOADED");
    }

    #[test]
    fn encodes_camel_case_fields() {
        let event = BaggageStateChanged {
            baggage_id: 7,
            passenger_id: PassengerId::new(3),
            new_status: "LOST".to_string(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "baggageId": 7, "passengerId": 3, "newStatus": "LOST" })
        );
    }

    #[test]
    fn snake_case_fields_are_rejected() {
        let result = serde_json::from_slice::<BaggageStateChanged>(
            br#"{"baggage_id":1,"passenger_id":2,"new_status":"LOADED"}"#,
        );
        assert!(result.is_err());
    }
}
