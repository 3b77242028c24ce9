//! Error taxonomy shared by both services.
//!
//! Every failure a caller can observe maps to one [`AirportError`] variant.
//! Each variant has a stable machine-readable [`code`](AirportError::code) that
//! travels in HTTP error bodies, so a remote caller can tell a ledger failure
//! from a missing passenger without parsing prose.

use crate::rpc::RpcError;
use crate::types::{FlightId, PassengerId};
use std::fmt;
use thiserror::Error;

/// Kind of record a lookup or insert refers to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Entity {
    /// A flight record
    Flight,
    /// A passenger record
    Passenger,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flight => write!(f, "flight"),
            Self::Passenger => write!(f, "passenger"),
        }
    }
}

/// Domain errors for the cancellation pipeline
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AirportError {
    /// No record with this id exists
    #[error("{entity} {id} not found")]
    NotFound {
        /// What was looked up
        entity: Entity,
        /// Raw id that was looked up
        id: u64,
    },

    /// A record with this id already exists
    #[error("{entity} {id} already exists")]
    Conflict {
        /// What was inserted
        entity: Entity,
        /// Raw id of the existing record
        id: u64,
    },

    /// The flight is cancelled locally but the passenger fan-out did not
    /// confirm.
    #[error("passenger fan-out for flight {flight_id} failed: {source}")]
    RemoteCancellationFailed {
        /// Flight that stays cancelled
        flight_id: FlightId,
        /// What went wrong on the call
        #[source]
        source: RpcError,
    },

    /// A notification targeted a passenger the directory does not know
    #[error("passenger {0} is not registered")]
    UnknownPassenger(PassengerId),

    /// The ledger refused the batch; nothing was appended
    #[error("notification ledger append failed: {0}")]
    LedgerAppendFailed(String),
}

impl AirportError {
    /// Shorthand for a missing flight
    #[must_use]
    pub const fn flight_not_found(id: FlightId) -> Self {
        Self::NotFound {
            entity: Entity::Flight,
            id: id.get(),
        }
    }

    /// Shorthand for a missing passenger
    #[must_use]
    pub const fn passenger_not_found(id: PassengerId) -> Self {
        Self::NotFound {
            entity: Entity::Passenger,
            id: id.get(),
        }
    }

    /// Stable error code used in wire error bodies
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Conflict { .. } => "CONFLICT",
            Self::RemoteCancellationFailed { .. } => "REMOTE_CANCELLATION_FAILED",
            Self::UnknownPassenger(_) => "UNKNOWN_PASSENGER",
            Self::LedgerAppendFailed(_) => "LEDGER_APPEND_FAILED",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_record() {
        let error = AirportError::flight_not_found(FlightId::new(7));
        assert_eq!(error.to_string(), "flight 7 not found");

        let error = AirportError::Conflict {
            entity: Entity::Passenger,
            id: 10,
        };
        assert_eq!(error.to_string(), "passenger 10 already exists");
    }

    #[test]
    fn remote_failure_keeps_the_rpc_cause() {
        let error = AirportError::RemoteCancellationFailed {
            flight_id: FlightId::new(1),
            source: RpcError::Transport("connection refused".to_string()),
        };

        assert_eq!(error.code(), "REMOTE_CANCELLATION_FAILED");
        assert!(error.to_string().contains("connection refused"));
        assert!(std::error::Error::source(&error).is_some());
    }
}
