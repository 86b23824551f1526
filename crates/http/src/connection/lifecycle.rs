//! Per-connection keep-alive bookkeeping.
//!
//! A connection is `Idle` with a deadline while it waits for the next request,
//! `Active` from the moment a request head is complete until the exchange is
//! finished, and `Closing` once anything decided to close it. Only the
//! connection's own reader and writer and the reaper touch this state, each
//! through a single lock acquisition per transition.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::codec::Persistence;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle { deadline: Instant },
    Active,
    Closing,
}

#[derive(Debug)]
struct LifecycleState {
    phase: Phase,
    keep_alive_requested: bool,
    keep_alive_granted: bool,
    remaining: u32,
    upgrade: bool,
    open: bool,
    /// incremented for every exchange, so writes from an earlier one can be told apart
    exchange: u64,
}

#[derive(Debug)]
pub struct ConnectionLifecycle {
    state: Mutex<LifecycleState>,
    keep_alive_timeout: Duration,
}

impl ConnectionLifecycle {
    /// A fresh connection: idle, with the full request allowance.
    pub fn new(max_requests: u32, keep_alive_timeout: Duration) -> Self {
        Self {
            state: Mutex::new(LifecycleState {
                phase: Phase::Idle { deadline: Instant::now() + keep_alive_timeout },
                keep_alive_requested: false,
                keep_alive_granted: false,
                remaining: max_requests,
                upgrade: false,
                open: true,
                exchange: 0,
            }),
            keep_alive_timeout,
        }
    }

    fn lock(&self) -> MutexGuard<'_, LifecycleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts an exchange once a request head is complete.
    ///
    /// Returns `None` if the connection is already closing, e.g. because the
    /// reaper got to it first.
    pub fn begin_request(&self, keep_alive_requested: bool, upgrade: bool) -> Option<u64> {
        let mut state = self.lock();
        if !state.open || state.phase == Phase::Closing {
            return None;
        }
        state.remaining = state.remaining.saturating_sub(1);
        state.keep_alive_requested = keep_alive_requested;
        state.upgrade = upgrade;
        state.keep_alive_granted = keep_alive_requested && !upgrade && state.remaining > 0;
        state.phase = Phase::Active;
        state.exchange += 1;
        debug!(
            exchange = state.exchange,
            keep_alive = state.keep_alive_granted,
            remaining = state.remaining,
            "request started"
        );
        Some(state.exchange)
    }

    /// Starts an exchange that can only end with the connection closing,
    /// used to answer requests that failed to parse.
    pub fn begin_rejection(&self) -> Option<u64> {
        let mut state = self.lock();
        if !state.open || state.phase == Phase::Closing {
            return None;
        }
        state.keep_alive_granted = false;
        state.upgrade = false;
        state.phase = Phase::Active;
        state.exchange += 1;
        Some(state.exchange)
    }

    /// The exchange responses are currently written for.
    pub fn exchange(&self) -> u64 {
        self.lock().exchange
    }

    /// The idle timeout in whole seconds. A sub-second timeout is never advertised as zero.
    fn advertised_timeout(&self) -> u64 {
        self.keep_alive_timeout.as_secs() + u64::from(self.keep_alive_timeout.subsec_nanos() > 0)
    }

    /// What the current response tells the client about the connection.
    pub fn persistence(&self) -> Persistence {
        let state = self.lock();
        if state.upgrade {
            Persistence::Upgrade
        } else if state.keep_alive_granted {
            Persistence::KeepAlive { timeout_secs: self.advertised_timeout(), max: state.remaining }
        } else {
            Persistence::Close
        }
    }

    /// Ends the current exchange. Returns `true` if the connection went back
    /// to `Idle` with a fresh deadline, `false` if it is now closing.
    pub fn finish_request(&self, now: Instant) -> bool {
        let mut state = self.lock();
        if state.open && state.phase == Phase::Active && state.keep_alive_granted {
            state.phase = Phase::Idle { deadline: now + self.keep_alive_timeout };
            true
        } else {
            state.phase = Phase::Closing;
            false
        }
    }

    /// Closes the connection if it sat idle past its deadline, or
    /// unconditionally when `force` is set. Returns whether it was closed.
    ///
    /// An `Active` connection is never closed unless forced.
    pub fn try_reap(&self, now: Instant, force: bool) -> bool {
        let mut state = self.lock();
        let expired = matches!(state.phase, Phase::Idle { deadline } if now >= deadline);
        if !state.open || !(expired || force) {
            return false;
        }
        state.phase = Phase::Closing;
        state.open = false;
        true
    }

    /// Marks the connection closed; its socket must not be used afterwards.
    pub fn close(&self) {
        let mut state = self.lock();
        state.phase = Phase::Closing;
        state.open = false;
    }

    pub fn is_open(&self) -> bool {
        self.lock().open
    }

    pub fn phase(&self) -> Phase {
        self.lock().phase
    }

    pub fn keep_alive_requested(&self) -> bool {
        self.lock().keep_alive_requested
    }

    pub fn remaining(&self) -> u32 {
        self.lock().remaining
    }
}
