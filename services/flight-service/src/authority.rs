//! The flight authority: request-response facade over the flight store.
//!
//! Each call sends one command and waits for the outcome action carrying the
//! same correlation id. The RPC runs in an effect task owned by the store, so
//! a caller that stops waiting does not abort an in-flight fan-out.

use crate::reducer::{FlightAction, FlightEnvironment, FlightReducer, FlightState};
use crate::types::{Flight, FlightView};
use airport_contract::{AirportError, FlightId};
use airport_core::environment::Clock;
use airport_runtime::{Store, StoreError};
use airport_web::AppError;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Store type backing the authority
pub type FlightStore = Store<FlightState, FlightAction, FlightEnvironment, FlightReducer>;

/// Added to the RPC bound so the store wait never expires before the RPC does
const WAIT_MARGIN: Duration = Duration::from_secs(2);

/// Errors from the flight authority
#[derive(Error, Debug)]
pub enum AuthorityError {
    /// The command was refused or the fan-out failed
    #[error(transparent)]
    Domain(#[from] AirportError),

    /// The store could not take the command or answer in time
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The store answered with an action that is not an outcome of the command
    #[error("unexpected outcome: {0}")]
    UnexpectedOutcome(String),
}

impl From<AuthorityError> for AppError {
    fn from(err: AuthorityError) -> Self {
        match err {
            AuthorityError::Domain(err) => err.into(),
            AuthorityError::Store(err) => err.into(),
            AuthorityError::UnexpectedOutcome(outcome) => {
                Self::internal(format!("Unexpected action received: {outcome}"))
            },
        }
    }
}

/// Owner of flight records and their lifecycle.
pub struct FlightAuthority {
    store: FlightStore,
    clock: Arc<dyn Clock>,
    wait_timeout: Duration,
}

impl FlightAuthority {
    /// Authority with no flights
    #[must_use]
    pub fn new(environment: FlightEnvironment) -> Self {
        Self::with_state(FlightState::default(), environment)
    }

    /// Authority seeded with `state`
    #[must_use]
    pub fn with_state(state: FlightState, environment: FlightEnvironment) -> Self {
        let clock = Arc::clone(&environment.clock);
        let wait_timeout = environment.rpc_timeout + WAIT_MARGIN;
        Self {
            store: Store::new(state, FlightReducer::new(), environment),
            clock,
            wait_timeout,
        }
    }

    /// Add a flight.
    ///
    /// # Errors
    ///
    /// Returns [`AirportError::Conflict`] if the id is taken.
    pub async fn register_flight(&self, flight: Flight) -> Result<Flight, AuthorityError> {
        let correlation_id = Uuid::new_v4();
        let outcome = self
            .store
            .send_and_wait_for(
                FlightAction::RegisterFlight {
                    correlation_id,
                    flight,
                },
                move |a| a.is_outcome_of(correlation_id),
                self.wait_timeout,
            )
            .await?;

        match outcome {
            FlightAction::FlightRegistered { flight, .. } => Ok(flight),
            FlightAction::RegistrationRejected { error, .. } => Err(error.into()),
            other => Err(AuthorityError::UnexpectedOutcome(format!("{other:?}"))),
        }
    }

    /// Cancel a flight and notify its passengers.
    ///
    /// `reason` defaults to `"Unknown"`. Cancelling a cancelled flight is
    /// accepted and notifies again. At most one RPC per call.
    ///
    /// # Errors
    ///
    /// - [`AirportError::NotFound`]: no such flight; nothing changed, no RPC
    /// - [`AirportError::RemoteCancellationFailed`]: the flight is cancelled
    ///   but the fan-out did not confirm
    #[tracing::instrument(skip(self, reason))]
    pub async fn cancel(
        &self,
        flight_id: FlightId,
        reason: Option<String>,
        correlation_id: Uuid,
    ) -> Result<(), AuthorityError> {
        let outcome = self
            .store
            .send_and_wait_for(
                FlightAction::CancelFlight {
                    correlation_id,
                    flight_id,
                    reason,
                },
                move |a| a.is_outcome_of(correlation_id),
                self.wait_timeout,
            )
            .await?;

        match outcome {
            FlightAction::PassengersNotified { .. } => Ok(()),
            FlightAction::CancellationRejected { error, .. } => Err(error.into()),
            FlightAction::FanOutFailed {
                flight_id, error, ..
            } => Err(AirportError::RemoteCancellationFailed {
                flight_id,
                source: error,
            }
            .into()),
            other => Err(AuthorityError::UnexpectedOutcome(format!("{other:?}"))),
        }
    }

    /// Remove a flight without notifying its passengers.
    ///
    /// # Errors
    ///
    /// Returns [`AirportError::NotFound`] if there is no such flight.
    pub async fn delete_flight(&self, flight_id: FlightId) -> Result<Flight, AuthorityError> {
        let correlation_id = Uuid::new_v4();
        let outcome = self
            .store
            .send_and_wait_for(
                FlightAction::DeleteFlight {
                    correlation_id,
                    flight_id,
                },
                move |a| a.is_outcome_of(correlation_id),
                self.wait_timeout,
            )
            .await?;

        match outcome {
            FlightAction::FlightDeleted { flight, .. } => Ok(flight),
            FlightAction::DeletionRejected { error, .. } => Err(error.into()),
            other => Err(AuthorityError::UnexpectedOutcome(format!("{other:?}"))),
        }
    }

    /// Remove every flight, returning how many there were.
    ///
    /// # Errors
    ///
    /// Only store failures: shutdown or a missed outcome.
    pub async fn delete_all_flights(&self) -> Result<usize, AuthorityError> {
        let correlation_id = Uuid::new_v4();
        let outcome = self
            .store
            .send_and_wait_for(
                FlightAction::DeleteAllFlights { correlation_id },
                move |a| a.is_outcome_of(correlation_id),
                self.wait_timeout,
            )
            .await?;

        match outcome {
            FlightAction::FlightsCleared { removed, .. } => Ok(removed),
            other => Err(AuthorityError::UnexpectedOutcome(format!("{other:?}"))),
        }
    }

    /// Look up one flight.
    ///
    /// # Errors
    ///
    /// Returns [`AirportError::NotFound`] if there is no such flight.
    pub async fn flight(&self, flight_id: FlightId) -> Result<Flight, AirportError> {
        self.store
            .state(|s| s.flights.get(&flight_id).cloned())
            .await
            .ok_or(AirportError::flight_not_found(flight_id))
    }

    /// Every flight, ordered by id
    pub async fn flights(&self) -> Vec<Flight> {
        self.store
            .state(|s| s.flights.values().cloned().collect())
            .await
    }

    /// One flight with its window at the current time.
    ///
    /// # Errors
    ///
    /// Returns [`AirportError::NotFound`] if there is no such flight.
    pub async fn flight_view(&self, flight_id: FlightId) -> Result<FlightView, AirportError> {
        let now = self.clock.now();
        Ok(self.flight(flight_id).await?.view(now))
    }

    /// Every flight with its window at the current time
    pub async fn flight_views(&self) -> Vec<FlightView> {
        let now = self.clock.now();
        self.flights()
            .await
            .iter()
            .map(|flight| flight.view(now))
            .collect()
    }

    /// Cancelled flights whose most recent fan-out did not confirm
    pub async fn awaiting_fanout(&self) -> Vec<FlightId> {
        self.store
            .state(|s| s.awaiting_fanout.iter().copied().collect())
            .await
    }

    /// Stop accepting commands and wait for running fan-outs.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownTimeout`] if effects are still running
    /// after `timeout`.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), StoreError> {
        self.store.shutdown(timeout).await
    }
}

impl std::fmt::Debug for FlightAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlightAuthority")
            .field("wait_timeout", &self.wait_timeout)
            .field("pending_effects", &self.store.pending_effects())
            .finish_non_exhaustive()
    }
}
