//! Quota latch for the upstream daily request threshold.
//!
//! Once the upstream rejects a request for quota reasons, every later request
//! in this process is refused locally. The daily threshold does not reset
//! within a single run, so further calls would only burn time.

use std::sync::{Mutex, MutexGuard};

/// State of the latch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LatchState {
    /// Requests are allowed.
    Open,
    /// Quota exhausted, with the upstream message that tripped it.
    Exhausted { message: String },
}

#[derive(Debug)]
pub struct QuotaLatch {
    state: Mutex<LatchState>,
}

impl QuotaLatch {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LatchState::Open),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LatchState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The tripping message, if the quota has been exhausted.
    pub fn exhausted(&self) -> Option<String> {
        match &*self.lock() {
            LatchState::Open => None,
            LatchState::Exhausted { message } => Some(message.clone()),
        }
    }

    /// Trip the latch. The first message wins.
    pub fn trip(&self, message: impl Into<String>) {
        let mut state = self.lock();
        if *state == LatchState::Open {
            *state = LatchState::Exhausted {
                message: message.into(),
            };
        }
    }

    pub fn state(&self) -> LatchState {
        self.lock().clone()
    }
}

impl Default for QuotaLatch {
    fn default() -> Self {
        Self::new()
    }
}
