//! Refresh coordination state
//!
//! Pure state machine over `Idle | Refreshing { waiters }`. The gateway keeps
//! it behind a `std::sync::Mutex` and only touches it in short synchronous
//! sections, never across an `.await`. That makes "observe Idle, become
//! Refreshing" a single atomic step: of N requests failing together, exactly
//! one becomes the refresh initiator and the rest queue as waiters.
//!
//! Transitions:
//! - Idle → Refreshing (first 401 while Idle; caller becomes initiator)
//! - Refreshing → Refreshing (later 401s; caller becomes a waiter)
//! - Refreshing → Idle (refresh finished or abandoned; waiters drained FIFO)

use std::sync::{Mutex, MutexGuard, PoisonError};

use common::Secret;
use tokio::sync::oneshot;
use tracing::warn;

/// Resolution slot for a suspended request: `Some(token)` means replay with
/// that token, `None` means the refresh failed.
pub type Release = Option<Secret<String>>;

pub type Waiter = oneshot::Sender<Release>;

/// Shared coordination state for one gateway.
#[derive(Default)]
pub enum RefreshState {
    #[default]
    Idle,
    Refreshing { waiters: Vec<Waiter> },
}

/// Observable snapshot of `RefreshState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPhase {
    Idle,
    Refreshing { waiters: usize },
}

/// What a request that just got a 401 should do next.
#[derive(Debug)]
pub enum Entry {
    /// Run the refresh, then release everyone
    Initiator,
    /// Wait for the in-flight refresh
    Waiter(oneshot::Receiver<Release>),
}

impl RefreshState {
    pub fn phase(&self) -> RefreshPhase {
        match self {
            RefreshState::Idle => RefreshPhase::Idle,
            RefreshState::Refreshing { waiters } => RefreshPhase::Refreshing {
                waiters: waiters.len(),
            },
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, RefreshState::Idle)
    }

    /// Join the current refresh episode, starting one if none is in flight.
    pub fn enter(&mut self) -> Entry {
        match self {
            RefreshState::Idle => {
                *self = RefreshState::Refreshing {
                    waiters: Vec::new(),
                };
                Entry::Initiator
            }
            RefreshState::Refreshing { waiters } => {
                let (tx, rx) = oneshot::channel();
                waiters.push(tx);
                Entry::Waiter(rx)
            }
        }
    }

    /// Return to Idle, handing back the waiters in the order they queued.
    pub fn finish(&mut self) -> Vec<Waiter> {
        match std::mem::take(self) {
            RefreshState::Refreshing { waiters } => waiters,
            RefreshState::Idle => Vec::new(),
        }
    }
}

/// Lock the state, recovering from poisoning. The state is always left
/// consistent because no section holding the lock can panic midway.
pub fn lock(state: &Mutex<RefreshState>) -> MutexGuard<'_, RefreshState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Held by the refresh initiator for the duration of the refresh.
///
/// `release` ends the episode explicitly. If the initiator's future is
/// dropped before that, `Drop` ends it with `None` so waiters are rejected
/// instead of hanging and the next 401 can start a fresh refresh.
pub struct RefreshGuard<'a> {
    state: &'a Mutex<RefreshState>,
    released: bool,
}

impl<'a> RefreshGuard<'a> {
    pub fn new(state: &'a Mutex<RefreshState>) -> Self {
        Self {
            state,
            released: false,
        }
    }

    /// Transition to Idle and wake every waiter with `release`. Returns the
    /// number of waiters released.
    pub fn release(mut self, release: Release) -> usize {
        self.released = true;
        drain(self.state, release)
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        if !self.released {
            let abandoned = drain(self.state, None);
            warn!(waiters = abandoned, "refresh abandoned before completion");
        }
    }
}

fn drain(state: &Mutex<RefreshState>, release: Release) -> usize {
    let waiters = lock(state).finish();
    let count = waiters.len();
    for waiter in waiters {
        // A waiter whose caller went away has dropped its receiver
        let _ = waiter.send(release.clone());
    }
    count
}
