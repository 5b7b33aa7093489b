//! Caller-side holder for the latest prediction.
//!
//! The client itself is stateless. A presentation layer that shows one result
//! at a time keeps a `PredictionSlot`: starting a new submission cancels the one
//! still in flight, only the newest submission may store its result, and a
//! failed submission leaves the previous value in place.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
struct SlotState {
    generation: u64,
    value: Option<f64>,
    pending: Option<CancellationToken>,
}

/// Handle for one in-flight submission.
#[derive(Debug, Clone)]
pub struct Submission {
    generation: u64,
    cancel: CancellationToken,
}

impl Submission {
    /// Fires when a newer submission starts or the slot is reset.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

#[derive(Debug, Default)]
pub struct PredictionSlot {
    state: Mutex<SlotState>,
}

impl PredictionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts a submission, cancelling any earlier one.
    pub fn begin(&self) -> Submission {
        let mut state = self.lock();
        if let Some(previous) = state.pending.take() {
            previous.cancel();
        }
        state.generation += 1;
        let cancel = CancellationToken::new();
        state.pending = Some(cancel.clone());
        Submission {
            generation: state.generation,
            cancel,
        }
    }

    /// Stores `value` if `submission` is still the newest one. Returns whether
    /// the slot changed.
    pub fn complete(&self, submission: &Submission, value: f64) -> bool {
        let mut state = self.lock();
        if state.generation != submission.generation {
            return false;
        }
        state.value = Some(value);
        state.pending = None;
        true
    }

    /// Ends a failed submission. The stored value is kept.
    pub fn fail(&self, submission: &Submission) {
        let mut state = self.lock();
        if state.generation == submission.generation {
            state.pending = None;
        }
    }

    /// Clears the stored value and cancels whatever is in flight.
    pub fn reset(&self) {
        let mut state = self.lock();
        if let Some(pending) = state.pending.take() {
            pending.cancel();
        }
        state.generation += 1;
        state.value = None;
    }

    pub fn current(&self) -> Option<f64> {
        self.lock().value
    }

    pub fn is_pending(&self) -> bool {
        self.lock().pending.is_some()
    }
}
