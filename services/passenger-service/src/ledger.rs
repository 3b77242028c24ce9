//! The notification ledger.
//!
//! One append-only store for every notification the passenger service
//! produces, whether from a cancellation fan-out or a baggage event. Appends
//! are batches: either every draft in the batch is stored, or none is.

use airport_contract::{AirportError, Notification, NotificationId, PassengerId};
use airport_core::environment::Clock;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

/// A notification that has not been assigned an id yet
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NotificationDraft {
    /// Recipient
    pub passenger_id: PassengerId,
    /// Rendered message text
    pub message: String,
}

impl NotificationDraft {
    /// Create a draft
    #[must_use]
    pub fn new(passenger_id: PassengerId, message: impl Into<String>) -> Self {
        Self {
            passenger_id,
            message: message.into(),
        }
    }
}

/// Why an append was refused
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The batch would push the ledger past its bound
    #[error("capacity {capacity} exceeded: {stored} stored, {requested} requested")]
    CapacityExceeded {
        /// Configured bound
        capacity: usize,
        /// Notifications currently stored
        stored: usize,
        /// Size of the refused batch
        requested: usize,
    },
}

impl From<LedgerError> for AirportError {
    fn from(err: LedgerError) -> Self {
        Self::LedgerAppendFailed(err.to_string())
    }
}

/// Append-only notification storage.
///
/// Implementations must be safe under concurrent writers and must assign ids
/// that are unique and strictly increasing in append order.
pub trait NotificationLedger: Send + Sync {
    /// Append a batch atomically and return the stored notifications in
    /// draft order.
    ///
    /// An empty batch succeeds and stores nothing.
    ///
    /// # Errors
    ///
    /// Returns a [`LedgerError`] if the batch cannot be stored; the ledger is
    /// then unchanged.
    fn append(&self, drafts: Vec<NotificationDraft>) -> Result<Vec<Notification>, LedgerError>;

    /// Notifications for one passenger, oldest first
    fn for_passenger(&self, passenger_id: PassengerId) -> Vec<Notification>;

    /// Every notification, oldest first
    fn all(&self) -> Vec<Notification>;

    /// Delete every notification and return how many were removed.
    ///
    /// Ids are never reused after a clear.
    fn clear(&self) -> usize;

    /// Number of stored notifications
    fn len(&self) -> usize;

    /// Whether the ledger is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Default)]
struct LedgerInner {
    last_id: u64,
    by_id: BTreeMap<NotificationId, Notification>,
    by_passenger: HashMap<PassengerId, Vec<NotificationId>>,
}

/// In-process [`NotificationLedger`] guarded by a single mutex.
///
/// The id counter, the id-keyed map and the passenger index live under the
/// same lock, so a batch becomes visible all at once.
pub struct InMemoryNotificationLedger {
    inner: Mutex<LedgerInner>,
    capacity: Option<usize>,
    clock: Arc<dyn Clock>,
}

impl InMemoryNotificationLedger {
    /// Unbounded ledger stamping notifications with `clock`
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(LedgerInner::default()),
            capacity: None,
            clock,
        }
    }

    /// Ledger refusing any batch that would exceed `capacity` notifications
    #[must_use]
    pub fn with_capacity(clock: Arc<dyn Clock>, capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::new(clock)
        }
    }

    /// Configured bound, if any
    #[must_use]
    pub const fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, LedgerInner> {
        // Every mutation completes before the guard drops, so a poisoned
        // guard still holds consistent data.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for InMemoryNotificationLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryNotificationLedger")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

impl NotificationLedger for InMemoryNotificationLedger {
    fn append(&self, drafts: Vec<NotificationDraft>) -> Result<Vec<Notification>, LedgerError> {
        let mut inner = self.lock();

        if let Some(capacity) = self.capacity {
            let stored = inner.by_id.len();
            if stored + drafts.len() > capacity {
                return Err(LedgerError::CapacityExceeded {
                    capacity,
                    stored,
                    requested: drafts.len(),
                });
            }
        }

        let created_at = self.clock.now();
        let mut appended = Vec::with_capacity(drafts.len());

        for draft in drafts {
            inner.last_id += 1;
            let notification = Notification {
                id: NotificationId::new(inner.last_id),
                passenger_id: draft.passenger_id,
                message: draft.message,
                created_at,
            };
            inner
                .by_passenger
                .entry(notification.passenger_id)
                .or_default()
                .push(notification.id);
            inner.by_id.insert(notification.id, notification.clone());
            appended.push(notification);
        }

        Ok(appended)
    }

    fn for_passenger(&self, passenger_id: PassengerId) -> Vec<Notification> {
        let inner = self.lock();
        inner
            .by_passenger
            .get(&passenger_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| inner.by_id.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn all(&self) -> Vec<Notification> {
        self.lock().by_id.values().cloned().collect()
    }

    fn clear(&self) -> usize {
        let mut inner = self.lock();
        let removed = inner.by_id.len();
        inner.by_id.clear();
        inner.by_passenger.clear();
        removed
    }

    fn len(&self) -> usize {
        self.lock().by_id.len()
    }
}
