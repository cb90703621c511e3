//! Per-key request coalescing.
//!
//! The first caller for a key becomes the leader and runs the work. Callers
//! arriving while it runs block until it finishes and receive a clone of its
//! result. Once the leader finishes the key is released, so a later call
//! starts a fresh flight. If the leader panics, waiting callers run the work
//! themselves.

use crate::sync::lock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};

enum FlightState<T> {
    Running,
    Finished(T),
    Abandoned,
}

struct Flight<T> {
    state: Mutex<FlightState<T>>,
    done: Condvar,
    waiters: AtomicUsize,
}

type FlightMap<T> = Mutex<HashMap<String, Arc<Flight<T>>>>;

pub struct SingleFlight<T> {
    flights: FlightMap<T>,
}

impl<T> Default for SingleFlight<T> {
    fn default() -> Self {
        Self {
            flights: Mutex::new(HashMap::new()),
        }
    }
}

impl<T: Clone> SingleFlight<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `work` for `key`, or wait for the flight already running it.
    pub fn run<F: FnOnce() -> T>(&self, key: &str, work: F) -> T {
        let (flight, leader) = {
            let mut flights = lock(&self.flights);
            match flights.get(key) {
                Some(existing) => (Arc::clone(existing), false),
                None => {
                    let flight = Arc::new(Flight {
                        state: Mutex::new(FlightState::Running),
                        done: Condvar::new(),
                        waiters: AtomicUsize::new(0),
                    });
                    flights.insert(key.to_string(), Arc::clone(&flight));
                    (flight, true)
                }
            }
        };

        if leader {
            let mut guard = LeaderGuard {
                flights: &self.flights,
                key,
                flight: &flight,
                finished: false,
            };
            let value = work();
            guard.finish(value.clone());
            return value;
        }

        flight.waiters.fetch_add(1, Ordering::SeqCst);
        let mut state = lock(&flight.state);
        while matches!(*state, FlightState::Running) {
            state = flight
                .done
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        flight.waiters.fetch_sub(1, Ordering::SeqCst);
        if let FlightState::Finished(value) = &*state {
            return value.clone();
        }
        drop(state);
        work()
    }

    /// Number of keys with a flight in progress.
    pub fn in_flight(&self) -> usize {
        lock(&self.flights).len()
    }

    /// Callers currently blocked on the flight for `key`.
    pub fn waiting(&self, key: &str) -> usize {
        lock(&self.flights)
            .get(key)
            .map_or(0, |f| f.waiters.load(Ordering::SeqCst))
    }
}

/// Publishes the leader's outcome and releases the key, including on unwind.
struct LeaderGuard<'a, T> {
    flights: &'a FlightMap<T>,
    key: &'a str,
    flight: &'a Arc<Flight<T>>,
    finished: bool,
}

impl<T> LeaderGuard<'_, T> {
    fn finish(&mut self, value: T) {
        *lock(&self.flight.state) = FlightState::Finished(value);
        self.finished = true;
    }
}

impl<T> Drop for LeaderGuard<'_, T> {
    fn drop(&mut self) {
        if !self.finished {
            *lock(&self.flight.state) = FlightState::Abandoned;
        }
        {
            let mut flights = lock(self.flights);
            if flights
                .get(self.key)
                .is_some_and(|f| Arc::ptr_eq(f, self.flight))
            {
                flights.remove(self.key);
            }
        }
        self.flight.done.notify_all();
    }
}
