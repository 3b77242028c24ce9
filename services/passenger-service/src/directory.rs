//! The passenger directory.
//!
//! Owns passenger records indexed by flight and the notification ledger. The
//! cancellation fan-out and the baggage handler both append through
//! [`PassengerDirectory`], so every notification goes through the same
//! lookup-then-append discipline:
//!
//! 1. take the passenger index for reading
//! 2. resolve recipients
//! 3. append the whole batch to the ledger
//! 4. release the index
//!
//! Holding the read guard across the append means a passenger cannot be
//! removed between being resolved and being notified.

use crate::ledger::{NotificationDraft, NotificationLedger};
use airport_contract::{
    AirportError, CancellationRequest, CancellationResponse, Entity, FlightId, Notification,
    Passenger, PassengerDirectoryClient, PassengerId, RpcError, cancellation_message,
};
use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Default)]
struct PassengerIndex {
    by_id: HashMap<PassengerId, Passenger>,
    by_flight: HashMap<FlightId, BTreeSet<PassengerId>>,
}

impl PassengerIndex {
    fn on_flight(&self, flight_id: FlightId) -> Vec<Passenger> {
        self.by_flight
            .get(&flight_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.by_id.get(id).cloned())
            .collect()
    }
}

/// Passenger records plus the notification ledger.
pub struct PassengerDirectory {
    index: RwLock<PassengerIndex>,
    ledger: Arc<dyn NotificationLedger>,
}

impl PassengerDirectory {
    /// Empty directory appending to `ledger`
    #[must_use]
    pub fn new(ledger: Arc<dyn NotificationLedger>) -> Self {
        Self {
            index: RwLock::new(PassengerIndex::default()),
            ledger,
        }
    }

    /// Add a passenger.
    ///
    /// # Errors
    ///
    /// Returns [`AirportError::Conflict`] if the id is taken.
    pub async fn register_passenger(&self, passenger: Passenger) -> Result<Passenger, AirportError> {
        let mut index = self.index.write().await;
        if index.by_id.contains_key(&passenger.id) {
            return Err(AirportError::Conflict {
                entity: Entity::Passenger,
                id: passenger.id.get(),
            });
        }

        index
            .by_flight
            .entry(passenger.flight_id)
            .or_default()
            .insert(passenger.id);
        index.by_id.insert(passenger.id, passenger.clone());

        tracing::debug!(
            passenger_id = %passenger.id,
            flight_id = %passenger.flight_id,
            "Passenger registered"
        );
        Ok(passenger)
    }

    /// Look up one passenger.
    ///
    /// # Errors
    ///
    /// Returns [`AirportError::NotFound`] if no passenger has this id.
    pub async fn passenger(&self, id: PassengerId) -> Result<Passenger, AirportError> {
        self.index
            .read()
            .await
            .by_id
            .get(&id)
            .cloned()
            .ok_or_else(|| AirportError::passenger_not_found(id))
    }

    /// Every passenger, ordered by id
    pub async fn passengers(&self) -> Vec<Passenger> {
        let index = self.index.read().await;
        let mut passengers: Vec<Passenger> = index.by_id.values().cloned().collect();
        passengers.sort_by_key(|p| p.id);
        passengers
    }

    /// Remove a passenger. Their notifications stay in the ledger.
    ///
    /// # Errors
    ///
    /// Returns [`AirportError::NotFound`] if no passenger has this id.
    pub async fn remove_passenger(&self, id: PassengerId) -> Result<Passenger, AirportError> {
        let mut index = self.index.write().await;
        let passenger = index
            .by_id
            .remove(&id)
            .ok_or_else(|| AirportError::passenger_not_found(id))?;

        if let Some(ids) = index.by_flight.get_mut(&passenger.flight_id) {
            ids.remove(&id);
            if ids.is_empty() {
                index.by_flight.remove(&passenger.flight_id);
            }
        }
        Ok(passenger)
    }

    /// Passengers booked on `flight_id`, ordered by id; empty when none
    pub async fn passengers_for_flight(&self, flight_id: FlightId) -> Vec<Passenger> {
        self.index.read().await.on_flight(flight_id)
    }

    /// Notifications for one passenger, oldest first; empty when none
    #[must_use]
    pub fn notifications_for_passenger(&self, passenger_id: PassengerId) -> Vec<Notification> {
        self.ledger.for_passenger(passenger_id)
    }

    /// Every notification, oldest first
    #[must_use]
    pub fn notifications(&self) -> Vec<Notification> {
        self.ledger.all()
    }

    /// Delete every notification and return how many were removed
    pub fn delete_all_notifications(&self) -> usize {
        let removed = self.ledger.clear();
        tracing::info!(removed, "Notifications deleted");
        removed
    }

    /// Notify every passenger of a cancelled flight.
    ///
    /// One notification per passenger, appended as a single batch. A flight
    /// without passengers succeeds with nothing appended. Flight state is
    /// never touched here.
    ///
    /// # Errors
    ///
    /// Returns [`AirportError::LedgerAppendFailed`] if the ledger refuses the
    /// batch; no notification from this fan-out is stored.
    #[tracing::instrument(skip(self, reason), fields(notified = tracing::field::Empty))]
    pub async fn cancel_flight(
        &self,
        flight_id: FlightId,
        reason: &str,
    ) -> Result<CancellationResponse, AirportError> {
        let index = self.index.read().await;
        let message = cancellation_message(flight_id, reason);
        let drafts: Vec<NotificationDraft> = index
            .on_flight(flight_id)
            .into_iter()
            .map(|p| NotificationDraft::new(p.id, message.clone()))
            .collect();

        let result = self.ledger.append(drafts);
        drop(index);

        match result {
            Ok(appended) => {
                tracing::Span::current().record("notified", appended.len());
                tracing::info!(notified = appended.len(), "Passengers notified of cancellation");
                crate::metrics::record_cancellation_fanout(appended.len());
                Ok(CancellationResponse::cancelled())
            },
            Err(err) => {
                tracing::error!(error = %err, "Cancellation fan-out refused by ledger");
                crate::metrics::record_cancellation_failed();
                Err(err.into())
            },
        }
    }

    /// Append one notification for a known passenger.
    ///
    /// # Errors
    ///
    /// Returns [`AirportError::UnknownPassenger`] if the passenger is not
    /// registered, or [`AirportError::LedgerAppendFailed`] if the ledger
    /// refuses the append.
    pub async fn notify_passenger(
        &self,
        passenger_id: PassengerId,
        message: String,
    ) -> Result<Notification, AirportError> {
        let index = self.index.read().await;
        if !index.by_id.contains_key(&passenger_id) {
            return Err(AirportError::UnknownPassenger(passenger_id));
        }

        let appended = self
            .ledger
            .append(vec![NotificationDraft::new(passenger_id, message)])?;
        drop(index);

        appended.into_iter().next().ok_or_else(|| {
            AirportError::LedgerAppendFailed("ledger returned no notification".to_string())
        })
    }
}

impl std::fmt::Debug for PassengerDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PassengerDirectory")
            .field("notifications", &self.ledger.len())
            .finish_non_exhaustive()
    }
}

/// In-process transport for the cancellation RPC.
///
/// Lets the flight authority call a directory living in the same process,
/// with domain errors carried the way the HTTP transport carries them.
impl PassengerDirectoryClient for PassengerDirectory {
    fn cancel_flight(
        &self,
        correlation_id: Uuid,
        request: CancellationRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CancellationResponse, RpcError>> + Send + '_>> {
        Box::pin(async move {
            tracing::debug!(%correlation_id, flight_id = %request.flight_id, "In-process cancellation");
            Self::cancel_flight(self, request.flight_id, &request.reason)
                .await
                .map_err(|err| RpcError::Rejected {
                    code: err.code().to_string(),
                    message: err.to_string(),
                })
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::ledger::InMemoryNotificationLedger;
    use airport_testing::test_clock;

    fn passenger(id: u64, flight: u64, email: &str) -> Passenger {
        Passenger {
            id: PassengerId::new(id),
            first_name: format!("First{id}"),
            last_name: format!("Last{id}"),
            email: email.to_string(),
            flight_id: FlightId::new(flight),
        }
    }

    fn directory() -> PassengerDirectory {
        PassengerDirectory::new(Arc::new(InMemoryNotificationLedger::new(Arc::new(
            test_clock(),
        ))))
    }

    #[tokio::test]
    async fn duplicate_passenger_is_a_conflict() {
        let directory = directory();
        directory
            .register_passenger(passenger(10, 1, "alice@x"))
            .await
            .unwrap();

        let err = directory
            .register_passenger(passenger(10, 2, "other@x"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "CONFLICT");
        assert_eq!(
            directory.passenger(PassengerId::new(10)).await.unwrap().email,
            "alice@x"
        );
    }

    #[tokio::test]
    async fn flight_index_follows_removals() {
        let directory = directory();
        directory.register_passenger(passenger(11, 1, "bob@x")).await.unwrap();
        directory.register_passenger(passenger(10, 1, "alice@x")).await.unwrap();
        directory.register_passenger(passenger(12, 2, "carol@x")).await.unwrap();

        let ids: Vec<u64> = directory
            .passengers_for_flight(FlightId::new(1))
            .await
            .iter()
            .map(|p| p.id.get())
            .collect();
        assert_eq!(ids, vec![10, 11]);

        directory.remove_passenger(PassengerId::new(10)).await.unwrap();
        assert_eq!(directory.passengers_for_flight(FlightId::new(1)).await.len(), 1);
        assert!(directory.passengers_for_flight(FlightId::new(9)).await.is_empty());
        assert_eq!(
            directory
                .remove_passenger(PassengerId::new(10))
                .await
                .unwrap_err()
                .code(),
            "NOT_FOUND"
        );
    }

    #[tokio::test]
    async fn cancel_flight_notifies_each_passenger_once() {
        let directory = directory();
        directory.register_passenger(passenger(10, 1, "alice@x")).await.unwrap();
        directory.register_passenger(passenger(11, 1, "bob@x")).await.unwrap();
        directory.register_passenger(passenger(12, 2, "carol@x")).await.unwrap();

        let response = directory.cancel_flight(FlightId::new(1), "Unknown").await.unwrap();
        assert_eq!(response, CancellationResponse::cancelled());

        for id in [10, 11] {
            let notes = directory.notifications_for_passenger(PassengerId::new(id));
            assert_eq!(notes.len(), 1);
            assert!(notes[0].message.contains('1'));
            assert!(notes[0].message.contains("Unknown"));
        }
        assert!(
            directory
                .notifications_for_passenger(PassengerId::new(12))
                .is_empty()
        );
    }

    #[tokio::test]
    async fn flight_without_passengers_succeeds_with_nothing_appended() {
        let directory = directory();
        directory.cancel_flight(FlightId::new(5), "Weather").await.unwrap();
        assert!(directory.notifications().is_empty());
    }

    #[tokio::test]
    async fn refused_batch_is_all_or_nothing() {
        let ledger = Arc::new(InMemoryNotificationLedger::with_capacity(
            Arc::new(test_clock()),
            1,
        ));
        let directory = PassengerDirectory::new(ledger);
        directory.register_passenger(passenger(10, 1, "alice@x")).await.unwrap();
        directory.register_passenger(passenger(11, 1, "bob@x")).await.unwrap();

        let err = directory
            .cancel_flight(FlightId::new(1), "Weather")
            .await
            .unwrap_err();
        assert!(matches!(err, AirportError::LedgerAppendFailed(_)));
        assert!(directory.notifications().is_empty());
    }

    #[tokio::test]
    async fn notify_unknown_passenger_is_rejected() {
        let directory = directory();
        let err = directory
            .notify_passenger(PassengerId::new(3), "hello".to_string())
            .await
            .unwrap_err();
        assert_eq!(err, AirportError::UnknownPassenger(PassengerId::new(3)));
        assert!(directory.notifications().is_empty());
    }

    #[tokio::test]
    async fn rpc_client_impl_carries_error_codes() {
        let ledger = Arc::new(InMemoryNotificationLedger::with_capacity(
            Arc::new(test_clock()),
            0,
        ));
        let directory = PassengerDirectory::new(ledger);
        directory.register_passenger(passenger(10, 1, "alice@x")).await.unwrap();

        let client: &dyn PassengerDirectoryClient = &directory;
        let err = client
            .cancel_flight(Uuid::new_v4(), CancellationRequest::new(FlightId::new(1), None))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RpcError::Rejected { ref code, .. } if code == "LEDGER_APPEND_FAILED"
        ));
    }
}
