//! Integration tests for the cancellation fan-out
//!
//! Drives the directory through its public API and checks the ledger
//! afterwards: per-flight fan-out, batch atomicity under a capacity bound,
//! and id uniqueness under concurrent fan-outs and baggage appends.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use airport_contract::{
    AirportError, BaggageStateChanged, CancellationStatus, FlightId, Passenger, PassengerId,
    baggage_message, cancellation_message,
};
use airport_core::event::SerializedEvent;
use airport_testing::test_clock;
use passenger_service::{
    BaggageEventHandler, EventHandler, InMemoryNotificationLedger, PassengerDirectory,
};
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

fn passenger(id: u64, flight: u64) -> Passenger {
    Passenger {
        id: PassengerId::new(id),
        first_name: format!("First{id}"),
        last_name: format!("Last{id}"),
        email: format!("p{id}@example.com"),
        flight_id: FlightId::new(flight),
    }
}

fn directory() -> PassengerDirectory {
    PassengerDirectory::new(Arc::new(InMemoryNotificationLedger::new(Arc::new(
        test_clock(),
    ))))
}

#[tokio::test]
async fn repeated_cancellation_notifies_again() {
    let directory = directory();
    directory.register_passenger(passenger(10, 1)).await.unwrap();
    directory.register_passenger(passenger(11, 1)).await.unwrap();
    directory.register_passenger(passenger(12, 2)).await.unwrap();

    let first = directory.cancel_flight(FlightId::new(1), "Unknown").await.unwrap();
    assert_eq!(first.status, CancellationStatus::Cancelled);
    assert_eq!(directory.notifications().len(), 2);

    directory.cancel_flight(FlightId::new(1), "Weather").await.unwrap();
    let all = directory.notifications();
    assert_eq!(all.len(), 4);

    let for_10: Vec<String> = directory
        .notifications_for_passenger(PassengerId::new(10))
        .into_iter()
        .map(|n| n.message)
        .collect();
    assert_eq!(
        for_10,
        vec![
            cancellation_message(FlightId::new(1), "Unknown"),
            cancellation_message(FlightId::new(1), "Weather"),
        ]
    );
    assert!(
        directory
            .notifications_for_passenger(PassengerId::new(12))
            .is_empty()
    );
}

#[tokio::test]
async fn flight_without_passengers_succeeds_with_nothing_appended() {
    let directory = directory();
    directory.register_passenger(passenger(10, 1)).await.unwrap();

    let response = directory.cancel_flight(FlightId::new(7), "Crew").await.unwrap();

    assert_eq!(response.status, CancellationStatus::Cancelled);
    assert!(directory.notifications().is_empty());
}

#[tokio::test]
async fn capacity_refusal_appends_nothing_from_the_batch() {
    let ledger = InMemoryNotificationLedger::with_capacity(Arc::new(test_clock()), 3);
    let directory = PassengerDirectory::new(Arc::new(ledger));
    for id in 10..12 {
        directory.register_passenger(passenger(id, 1)).await.unwrap();
    }
    for id in 20..22 {
        directory.register_passenger(passenger(id, 2)).await.unwrap();
    }

    directory.cancel_flight(FlightId::new(1), "Weather").await.unwrap();
    let err = directory
        .cancel_flight(FlightId::new(2), "Weather")
        .await
        .unwrap_err();

    assert!(matches!(err, AirportError::LedgerAppendFailed(_)));
    let stored: BTreeSet<PassengerId> = directory
        .notifications()
        .into_iter()
        .map(|n| n.passenger_id)
        .collect();
    assert_eq!(
        stored,
        BTreeSet::from([PassengerId::new(10), PassengerId::new(11)])
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_fanouts_get_unique_increasing_ids() {
    let directory = Arc::new(directory());
    for flight in 1..=8u64 {
        for seat in 0..5u64 {
            directory
                .register_passenger(passenger(flight * 100 + seat, flight))
                .await
                .unwrap();
        }
    }

    let tasks: Vec<_> = (1..=8u64)
        .map(|flight| {
            let directory = Arc::clone(&directory);
            tokio::spawn(async move {
                directory
                    .cancel_flight(FlightId::new(flight), "Strike")
                    .await
                    .unwrap();
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    let all = directory.notifications();
    assert_eq!(all.len(), 40);
    let ids: Vec<u64> = all.iter().map(|n| n.id.get()).collect();
    assert!(ids.windows(2).all(|w| w[0] < w[1]));

    // Each fan-out is one batch, so a flight's notifications are contiguous.
    let mut flights_in_order: Vec<u64> = all
        .iter()
        .map(|n| n.passenger_id.get() / 100)
        .collect();
    flights_in_order.dedup();
    assert_eq!(flights_in_order.len(), 8);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn baggage_appends_interleave_with_fanouts_without_losing_ids() {
    const FLIGHTS: u64 = 4;
    const SEATS: u64 = 5;
    const ROUNDS: u64 = 2;
    const BAGGAGE_EVENTS: u64 = 3;

    let directory = Arc::new(directory());
    for flight in 1..=FLIGHTS {
        for seat in 0..SEATS {
            directory
                .register_passenger(passenger(flight * 100 + seat, flight))
                .await
                .unwrap();
        }
    }
    let handler = Arc::new(BaggageEventHandler::new(Arc::clone(&directory)));

    let mut tasks = Vec::new();
    for round in 0..ROUNDS {
        for flight in 1..=FLIGHTS {
            let directory = Arc::clone(&directory);
            tasks.push(tokio::spawn(async move {
                directory
                    .cancel_flight(FlightId::new(flight), &format!("Strike{round}"))
                    .await
                    .unwrap();
            }));
        }
        for flight in 1..=FLIGHTS {
            for seat in 0..SEATS {
                let handler = Arc::clone(&handler);
                let passenger_id = flight * 100 + seat;
                tasks.push(tokio::spawn(async move {
                    for bag in 0..BAGGAGE_EVENTS {
                        let event = SerializedEvent::from_event(
                            &BaggageStateChanged {
                                baggage_id: passenger_id * 10 + bag,
                                passenger_id: PassengerId::new(passenger_id),
                                new_status: format!("R{round}"),
                            },
                            None,
                        )
                        .unwrap();
                        handler.handle(&event).await.unwrap();
                        tokio::task::yield_now().await;
                    }
                }));
            }
        }
    }
    for task in tasks {
        task.await.unwrap();
    }

    let all = directory.notifications();
    let passengers = FLIGHTS * SEATS;
    let expected_total = passengers * ROUNDS * (1 + BAGGAGE_EVENTS);
    assert_eq!(all.len() as u64, expected_total);

    let ids: Vec<u64> = all.iter().map(|n| n.id.get()).collect();
    assert_eq!(ids, (1..=expected_total).collect::<Vec<_>>());

    // A fan-out is one batch, so its ids are contiguous even with baggage
    // appends racing it.
    for round in 0..ROUNDS {
        for flight in 1..=FLIGHTS {
            let message = cancellation_message(FlightId::new(flight), &format!("Strike{round}"));
            let batch: Vec<u64> = all
                .iter()
                .filter(|n| n.message == message)
                .map(|n| n.id.get())
                .collect();
            assert_eq!(batch.len() as u64, SEATS);
            assert_eq!(batch[batch.len() - 1] - batch[0] + 1, SEATS, "{message}");
        }
    }

    for flight in 1..=FLIGHTS {
        for seat in 0..SEATS {
            let passenger_id = PassengerId::new(flight * 100 + seat);
            let notes = directory.notifications_for_passenger(passenger_id);
            let messages: Vec<&str> = notes.iter().map(|n| n.message.as_str()).collect();
            let mut expected = Vec::new();
            for round in 0..ROUNDS {
                expected.push(cancellation_message(FlightId::new(flight), &format!("Strike{round}")));
                for bag in 0..BAGGAGE_EVENTS {
                    expected.push(baggage_message(
                        &format!("R{round}"),
                        passenger_id.get() * 10 + bag,
                    ));
                }
            }
            assert_eq!(notes.len(), expected.len());
            for message in &expected {
                assert!(messages.contains(&message.as_str()), "missing {message}");
            }
        }
    }
}

proptest! {
    #[test]
    fn each_passenger_gets_one_notification_per_cancellation(
        bookings in prop::collection::btree_map(1u64..500, 1u64..5, 0..30),
        cancelled in 1u64..5,
        repeats in 1usize..3,
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();

        runtime.block_on(async {
            let directory = directory();
            for (&id, &flight) in &bookings {
                directory.register_passenger(passenger(id, flight)).await.unwrap();
            }

            for _ in 0..repeats {
                directory.cancel_flight(FlightId::new(cancelled), "Weather").await.unwrap();
            }

            let expected: BTreeSet<u64> = bookings
                .iter()
                .filter(|&(_, &flight)| flight == cancelled)
                .map(|(&id, _)| id)
                .collect();

            let mut per_passenger: BTreeMap<u64, usize> = BTreeMap::new();
            for note in directory.notifications() {
                *per_passenger.entry(note.passenger_id.get()).or_default() += 1;
            }

            prop_assert_eq!(per_passenger.keys().copied().collect::<BTreeSet<_>>(), expected);
            prop_assert!(per_passenger.values().all(|&count| count == repeats));
            Ok(())
        })?;
    }
}
