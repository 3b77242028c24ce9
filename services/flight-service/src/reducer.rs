//! Flight reducer: the flight lifecycle and the cancellation fan-out.
//!
//! Commands (`RegisterFlight`, `CancelFlight`, `DeleteFlight`,
//! `DeleteAllFlights`) are validated against state and applied immediately. Every command answers through an effect, so a caller
//! waiting with `send_and_wait_for` always sees exactly one outcome action
//! carrying its correlation id.
//!
//! # Cancellation
//!
//! ```text
//! CancelFlight ──▶ status = Cancelled ──▶ Effect::Future(RPC with timeout)
//!                                              │
//!                          ┌───────────────────┴──────────────────┐
//!                          ▼                                      ▼
//!                 PassengersNotified                        FanOutFailed
//!           (drop from awaiting_fanout)             (add to awaiting_fanout)
//! ```
//!
//! The status change is never rolled back. A flight whose last fan-out failed
//! stays in `awaiting_fanout` until a later cancel succeeds or the flight is
//! deleted. A fan-out still running when its flight is deleted does not bring
//! the flight back into `awaiting_fanout`.

use crate::types::{Flight, FlightStatus};
use airport_contract::{
    AirportError, CancellationRequest, FlightId, PassengerDirectoryClient, RpcError,
};
use airport_core::effect::Effect;
use airport_core::environment::Clock;
use airport_core::reducer::Reducer;
use airport_core::{SmallVec, smallvec};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// State owned by the flight authority
#[derive(Clone, Debug, Default)]
pub struct FlightState {
    /// Flights by id
    pub flights: BTreeMap<FlightId, Flight>,
    /// Cancelled flights whose most recent fan-out did not confirm
    pub awaiting_fanout: BTreeSet<FlightId>,
}

/// Environment for the flight reducer
#[derive(Clone)]
pub struct FlightEnvironment {
    /// Clock for flight windows
    pub clock: Arc<dyn Clock>,
    /// Remote passenger directory
    pub directory: Arc<dyn PassengerDirectoryClient>,
    /// Bound on one cancellation RPC
    pub rpc_timeout: Duration,
}

impl FlightEnvironment {
    /// Creates a new flight environment
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        directory: Arc<dyn PassengerDirectoryClient>,
        rpc_timeout: Duration,
    ) -> Self {
        Self {
            clock,
            directory,
            rpc_timeout,
        }
    }
}

impl std::fmt::Debug for FlightEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlightEnvironment")
            .field("rpc_timeout", &self.rpc_timeout)
            .finish_non_exhaustive()
    }
}

/// Commands and outcomes of the flight authority
#[derive(Clone, Debug, PartialEq)]
pub enum FlightAction {
    // Commands
    /// Add a flight; its status starts `Active`
    RegisterFlight {
        /// Ties the outcome to this command
        correlation_id: Uuid,
        /// The flight to add
        flight: Flight,
    },
    /// Cancel a flight and notify its passengers
    CancelFlight {
        /// Ties the outcome to this command
        correlation_id: Uuid,
        /// Flight to cancel
        flight_id: FlightId,
        /// Free-text reason; `"Unknown"` when absent
        reason: Option<String>,
    },
    /// Remove one flight; passengers are not notified
    DeleteFlight {
        /// Ties the outcome to this command
        correlation_id: Uuid,
        /// Flight to remove
        flight_id: FlightId,
    },
    /// Remove every flight
    DeleteAllFlights {
        /// Ties the outcome to this command
        correlation_id: Uuid,
    },

    // Outcomes
    /// The flight was added
    FlightRegistered {
        /// Echo of the command's id
        correlation_id: Uuid,
        /// Stored record
        flight: Flight,
    },
    /// The flight was not added
    RegistrationRejected {
        /// Echo of the command's id
        correlation_id: Uuid,
        /// Why
        error: AirportError,
    },
    /// The flight is cancelled and the directory confirmed the fan-out
    PassengersNotified {
        /// Echo of the command's id
        correlation_id: Uuid,
        /// Cancelled flight
        flight_id: FlightId,
    },
    /// Nothing was cancelled
    CancellationRejected {
        /// Echo of the command's id
        correlation_id: Uuid,
        /// Why
        error: AirportError,
    },
    /// The flight is cancelled but the fan-out did not confirm
    FanOutFailed {
        /// Echo of the command's id
        correlation_id: Uuid,
        /// Flight that stays cancelled
        flight_id: FlightId,
        /// What went wrong on the call
        error: RpcError,
    },
    /// The flight was removed
    FlightDeleted {
        /// Echo of the command's id
        correlation_id: Uuid,
        /// The removed record
        flight: Flight,
    },
    /// Nothing was removed
    DeletionRejected {
        /// Echo of the command's id
        correlation_id: Uuid,
        /// Why
        error: AirportError,
    },
    /// Every flight was removed
    FlightsCleared {
        /// Echo of the command's id
        correlation_id: Uuid,
        /// How many flights there were
        removed: usize,
    },
}

impl FlightAction {
    /// Correlation id carried by this action
    #[must_use]
    pub const fn correlation_id(&self) -> Uuid {
        match self {
            Self::RegisterFlight { correlation_id, .. }
            | Self::CancelFlight { correlation_id, .. }
            | Self::DeleteFlight { correlation_id, .. }
            | Self::DeleteAllFlights { correlation_id }
            | Self::FlightRegistered { correlation_id, .. }
            | Self::RegistrationRejected { correlation_id, .. }
            | Self::PassengersNotified { correlation_id, .. }
            | Self::CancellationRejected { correlation_id, .. }
            | Self::FanOutFailed { correlation_id, .. }
            | Self::FlightDeleted { correlation_id, .. }
            | Self::DeletionRejected { correlation_id, .. }
            | Self::FlightsCleared { correlation_id, .. } => *correlation_id,
        }
    }

    /// Whether this is the outcome of the command with `correlation_id`
    #[must_use]
    pub fn is_outcome_of(&self, correlation_id: Uuid) -> bool {
        let is_outcome = !matches!(
            self,
            Self::RegisterFlight { .. }
                | Self::CancelFlight { .. }
                | Self::DeleteFlight { .. }
                | Self::DeleteAllFlights { .. }
        );
        is_outcome && self.correlation_id() == correlation_id
    }
}

/// Reducer implementing the flight lifecycle
#[derive(Clone, Debug, Default)]
pub struct FlightReducer;

impl FlightReducer {
    /// Creates a new flight reducer
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Effect resolving immediately to `action`
    fn emit(action: FlightAction) -> Effect<FlightAction> {
        Effect::Future(Box::pin(async move { Some(action) }))
    }

    /// Effect performing the cancellation RPC within the environment's bound
    fn fan_out(
        env: &FlightEnvironment,
        correlation_id: Uuid,
        request: CancellationRequest,
    ) -> Effect<FlightAction> {
        let directory = Arc::clone(&env.directory);
        let timeout = env.rpc_timeout;
        let flight_id = request.flight_id;

        Effect::Future(Box::pin(async move {
            let call = directory.cancel_flight(correlation_id, request);
            let outcome = match tokio::time::timeout(timeout, call).await {
                Ok(Ok(_confirmed)) => FlightAction::PassengersNotified {
                    correlation_id,
                    flight_id,
                },
                Ok(Err(error)) => FlightAction::FanOutFailed {
                    correlation_id,
                    flight_id,
                    error,
                },
                Err(_elapsed) => FlightAction::FanOutFailed {
                    correlation_id,
                    flight_id,
                    error: RpcError::Timeout(timeout),
                },
            };
            Some(outcome)
        }))
    }
}

impl Reducer for FlightReducer {
    type State = FlightState;
    type Action = FlightAction;
    type Environment = FlightEnvironment;

    #[allow(clippy::too_many_lines)] // One arm per action
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            // ========== Commands ==========
            FlightAction::RegisterFlight {
                correlation_id,
                mut flight,
            } => {
                if state.flights.contains_key(&flight.id) {
                    tracing::warn!(flight_id = %flight.id, "Flight already registered");
                    return smallvec![Self::emit(FlightAction::RegistrationRejected {
                        correlation_id,
                        error: AirportError::Conflict {
                            entity: airport_contract::Entity::Flight,
                            id: flight.id.get(),
                        },
                    })];
                }

                flight.status = FlightStatus::Active;
                tracing::info!(
                    flight_id = %flight.id,
                    name = %flight.name,
                    window = ?flight.window(env.clock.now()),
                    "Flight registered"
                );
                state.flights.insert(flight.id, flight.clone());
                crate::metrics::record_registration();

                smallvec![Self::emit(FlightAction::FlightRegistered {
                    correlation_id,
                    flight,
                })]
            },

            FlightAction::CancelFlight {
                correlation_id,
                flight_id,
                reason,
            } => {
                let Some(flight) = state.flights.get_mut(&flight_id) else {
                    tracing::warn!(%flight_id, %correlation_id, "Cancel for unknown flight");
                    crate::metrics::record_cancellation("not_found");
                    return smallvec![Self::emit(FlightAction::CancellationRejected {
                        correlation_id,
                        error: AirportError::flight_not_found(flight_id),
                    })];
                };

                if flight.is_cancelled() {
                    tracing::info!(%flight_id, %correlation_id, "Flight already cancelled, notifying again");
                } else {
                    flight.status = FlightStatus::Cancelled;
                    tracing::info!(%flight_id, %correlation_id, "Flight cancelled");
                }

                let request = CancellationRequest::new(flight_id, reason);
                smallvec![Self::fan_out(env, correlation_id, request)]
            },

            FlightAction::DeleteFlight {
                correlation_id,
                flight_id,
            } => {
                let Some(flight) = state.flights.remove(&flight_id) else {
                    tracing::warn!(%flight_id, %correlation_id, "Delete for unknown flight");
                    return smallvec![Self::emit(FlightAction::DeletionRejected {
                        correlation_id,
                        error: AirportError::flight_not_found(flight_id),
                    })];
                };

                state.awaiting_fanout.remove(&flight_id);
                tracing::info!(%flight_id, %correlation_id, "Flight deleted");
                smallvec![Self::emit(FlightAction::FlightDeleted {
                    correlation_id,
                    flight,
                })]
            },

            FlightAction::DeleteAllFlights { correlation_id } => {
                let removed = state.flights.len();
                state.flights.clear();
                state.awaiting_fanout.clear();
                tracing::info!(%correlation_id, removed, "All flights deleted");
                smallvec![Self::emit(FlightAction::FlightsCleared {
                    correlation_id,
                    removed,
                })]
            },

            // ========== Outcomes ==========
            FlightAction::PassengersNotified {
                correlation_id,
                flight_id,
            } => {
                state.awaiting_fanout.remove(&flight_id);
                tracing::info!(%flight_id, %correlation_id, "Passengers notified");
                crate::metrics::record_cancellation("notified");
                smallvec![Effect::None]
            },

            FlightAction::FanOutFailed {
                correlation_id,
                flight_id,
                error,
            } => {
                if state.flights.contains_key(&flight_id) {
                    state.awaiting_fanout.insert(flight_id);
                }
                tracing::warn!(
                    %flight_id,
                    %correlation_id,
                    error = %error,
                    "Flight cancelled but passenger fan-out failed"
                );
                crate::metrics::record_cancellation("fanout_failed");
                smallvec![Effect::None]
            },

            FlightAction::FlightRegistered { .. }
            | FlightAction::RegistrationRejected { .. }
            | FlightAction::CancellationRejected { .. }
            | FlightAction::FlightDeleted { .. }
            | FlightAction::DeletionRejected { .. }
            | FlightAction::FlightsCleared { .. } => {
                // Applied when the command was reduced
                smallvec![Effect::None]
            },
        }
    }
}
