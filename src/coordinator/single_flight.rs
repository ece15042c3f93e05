// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Per-key in-flight markers for de-duplicating concurrent misses
//!
//! The first caller to miss on a key becomes its leader and receives a
//! [`FlightGuard`]. Later callers get a [`watch::Receiver`] that resolves once
//! the guard is dropped, whether the leader finished, failed or was cancelled.
//! The map lock is only held to look up or change markers, never across an
//! `.await`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;

/// Outcome of joining a flight for a key
pub(crate) enum Flight {
    /// No computation was running; the caller must run it and hold the guard
    Leader(FlightGuard),
    /// Another caller is computing; wait on the receiver, then re-probe
    Follower(watch::Receiver<()>),
}

/// Registry of keys currently being computed
#[derive(Debug, Default)]
pub(crate) struct InFlight {
    calls: Mutex<HashMap<String, watch::Receiver<()>>>,
}

impl InFlight {
    /// Joins the flight for `key`, becoming its leader if there is none
    pub(crate) fn join(self: &Arc<Self>, key: &str) -> Flight {
        let mut calls = self.calls.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(done) = calls.get(key) {
            return Flight::Follower(done.clone());
        }

        let (tx, rx) = watch::channel(());
        calls.insert(key.to_string(), rx);
        Flight::Leader(FlightGuard {
            flights: Arc::clone(self),
            key: key.to_string(),
            done: Some(tx),
        })
    }

    /// Number of keys with a running leader
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Leadership of one key; dropping it releases every follower
pub(crate) struct FlightGuard {
    flights: Arc<InFlight>,
    key: String,
    done: Option<watch::Sender<()>>,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.flights
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
        // Closing the channel wakes followers; they find the marker gone
        drop(self.done.take());
    }
}

/// Waits until the leader behind `done` releases its key
pub(crate) async fn wait(mut done: watch::Receiver<()>) {
    // Err means the sender was dropped, which is the only release signal
    let _ = done.changed().await;
}
