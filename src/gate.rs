// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Readiness Gate
//!
//! Broadcasts "the connection is usable" to any number of waiters.
//!
//! The gate is backed by a `watch` channel holding the current signal and the
//! number of times the gate has opened. Because the channel always retains the
//! latest value, a waiter that subscribes before a `reset`/`open` pair can
//! never miss the `open`: it either sees `Ready` on its first look or is woken
//! by the change.
//!
//! `reset` and `open` are only called by the supervisor while it holds its
//! state lock, so the reset of one recovery cycle always happens before the
//! open of the same cycle.

use crate::errors::AmqpError;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Signal {
    Pending,
    Ready,
    Shutdown,
}

#[derive(Debug, Clone, Copy)]
struct GateState {
    signal: Signal,
    generation: u64,
}

#[derive(Debug)]
pub struct ReadinessGate {
    tx: watch::Sender<GateState>,
}

impl ReadinessGate {
    /// Creates a gate in the pending state.
    pub fn new() -> ReadinessGate {
        let (tx, _) = watch::channel(GateState {
            signal: Signal::Pending,
            generation: 0,
        });
        ReadinessGate { tx }
    }

    /// Returns a waitable handle on the gate.
    pub fn handle(&self) -> Readiness {
        Readiness {
            rx: self.tx.subscribe(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.tx.borrow().signal == Signal::Ready
    }

    /// Number of times the gate went from not ready to ready.
    pub fn generation(&self) -> u64 {
        self.tx.borrow().generation
    }

    pub(crate) fn reset(&self) {
        self.tx.send_modify(|state| state.signal = Signal::Pending);
    }

    pub(crate) fn open(&self) {
        self.tx.send_if_modified(|state| {
            if state.signal == Signal::Ready {
                return false;
            }
            state.signal = Signal::Ready;
            state.generation += 1;
            true
        });
    }

    pub(crate) fn shutdown(&self) {
        self.tx.send_modify(|state| state.signal = Signal::Shutdown);
    }
}

impl Default for ReadinessGate {
    fn default() -> Self {
        ReadinessGate::new()
    }
}

/// A handle on a `ReadinessGate`.
#[derive(Debug, Clone)]
pub struct Readiness {
    rx: watch::Receiver<GateState>,
}

impl Readiness {
    /// Waits until the gate opens.
    ///
    /// Fails with `ConnectionClosedError` when the supervisor is closed or
    /// gives up reconnecting. Dropping the future abandons the wait.
    pub async fn wait(&mut self) -> Result<(), AmqpError> {
        let signal = self
            .rx
            .wait_for(|state| state.signal != Signal::Pending)
            .await
            .map_err(|_| AmqpError::ConnectionClosedError)?
            .signal;

        match signal {
            Signal::Ready => Ok(()),
            _ => Err(AmqpError::ConnectionClosedError),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.rx.borrow().signal == Signal::Ready
    }

    pub fn generation(&self) -> u64 {
        self.rx.borrow().generation
    }
}
