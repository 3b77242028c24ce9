//! # Airport Testing
//!
//! Testing utilities for the airport services:
//! - Deterministic clocks
//! - An in-memory [`EventBus`](airport_core::event_bus::EventBus)
//! - Passenger-directory doubles that fail the way a remote service does
//! - A Given-When-Then harness for reducers
//!
//! ## Example
//!
//! ```ignore
//! use airport_testing::{test_clock, mocks::UnreachableDirectory};
//!
//! let env = FlightEnvironment::new(
//!     Arc::new(test_clock()),
//!     Arc::new(UnreachableDirectory::default()),
//!     Duration::from_millis(100),
//! );
//! ```

use airport_core::environment::Clock;
use chrono::{DateTime, Duration as ChronoDuration, Utc};

pub mod event_bus;

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{ChronoDuration, Clock, DateTime, Utc};
    use airport_contract::{
        CancellationRequest, CancellationResponse, PassengerDirectoryClient, RpcError,
    };
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use airport_testing::mocks::FixedClock;
    /// use airport_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }

        /// A clock fixed `offset` after this one
        #[must_use]
        pub fn advanced(&self, offset: ChronoDuration) -> Self {
            Self::new(self.time + offset)
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// Panics if the hardcoded timestamp fails to parse, which cannot happen.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }

    /// Directory whose transport always fails, like a service that is down.
    #[derive(Debug, Default)]
    pub struct UnreachableDirectory {
        calls: AtomicUsize,
    }

    impl UnreachableDirectory {
        /// Number of calls attempted so far
        #[must_use]
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl PassengerDirectoryClient for UnreachableDirectory {
        fn cancel_flight(
            &self,
            _correlation_id: Uuid,
            _request: CancellationRequest,
        ) -> Pin<Box<dyn Future<Output = Result<CancellationResponse, RpcError>> + Send + '_>>
        {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async {
                Err(RpcError::Transport("connection refused".to_string()))
            })
        }
    }

    /// Directory that never answers, for exercising the call timeout.
    #[derive(Debug, Default)]
    pub struct StalledDirectory;

    impl PassengerDirectoryClient for StalledDirectory {
        fn cancel_flight(
            &self,
            _correlation_id: Uuid,
            _request: CancellationRequest,
        ) -> Pin<Box<dyn Future<Output = Result<CancellationResponse, RpcError>> + Send + '_>>
        {
            Box::pin(std::future::pending())
        }
    }

    /// Directory that records every request and answers with a scripted result.
    #[derive(Debug)]
    pub struct RecordingDirectory {
        answer: Result<CancellationResponse, RpcError>,
        requests: Mutex<Vec<(Uuid, CancellationRequest)>>,
    }

    impl RecordingDirectory {
        /// Answer every call with `Cancelled`
        #[must_use]
        pub fn succeeding() -> Self {
            Self::answering(Ok(CancellationResponse::cancelled()))
        }

        /// Answer every call with `answer`
        #[must_use]
        pub fn answering(answer: Result<CancellationResponse, RpcError>) -> Self {
            Self {
                answer,
                requests: Mutex::new(Vec::new()),
            }
        }

        /// Requests received so far, oldest first
        #[must_use]
        pub fn requests(&self) -> Vec<(Uuid, CancellationRequest)> {
            self.requests
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .clone()
        }
    }

    impl PassengerDirectoryClient for RecordingDirectory {
        fn cancel_flight(
            &self,
            correlation_id: Uuid,
            request: CancellationRequest,
        ) -> Pin<Box<dyn Future<Output = Result<CancellationResponse, RpcError>> + Send + '_>>
        {
            self.requests
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push((correlation_id, request));
            let answer = self.answer.clone();
            Box::pin(async move { answer })
        }
    }
}

pub use event_bus::InMemoryEventBus;
pub use mocks::{FixedClock, test_clock};
pub use reducer_test::ReducerTest;

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::mocks::*;
    use super::*;
    use airport_contract::{CancellationRequest, FlightId, PassengerDirectoryClient, RpcError};
    use std::time::Duration;
    use uuid::Uuid;

    #[test]
    fn fixed_clock_is_stable_and_advances_explicitly() {
        let clock = test_clock();
        assert_eq!(clock.now(), clock.now());

        let later = clock.advanced(ChronoDuration::hours(2));
        assert_eq!(later.now() - clock.now(), ChronoDuration::hours(2));
    }

    #[tokio::test]
    async fn unreachable_directory_counts_calls() {
        let directory = UnreachableDirectory::default();
        let result = directory
            .cancel_flight(Uuid::new_v4(), CancellationRequest::new(FlightId::new(1), None))
            .await;

        assert!(matches!(result, Err(RpcError::Transport(_))));
        assert_eq!(directory.calls(), 1);
    }

    #[tokio::test]
    async fn stalled_directory_never_answers() {
        let directory = StalledDirectory;
        let call =
            directory.cancel_flight(Uuid::new_v4(), CancellationRequest::new(FlightId::new(1), None));
        assert!(tokio::time::timeout(Duration::from_millis(20), call).await.is_err());
    }

    #[tokio::test]
    async fn recording_directory_keeps_requests() {
        let directory = RecordingDirectory::succeeding();
        let id = Uuid::new_v4();
        directory
            .cancel_flight(id, CancellationRequest::new(FlightId::new(4), Some("Fog".into())))
            .await
            .unwrap();

        let requests = directory.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].0, id);
        assert_eq!(requests[0].1.reason, "Fog");
    }
}
