//! Implicit row locks held by edit dialogs.
//!
//! The server takes a lock on a row when it serves the edit form. The client
//! never asks for the lock; it presumes one once the dialog is fully shown and
//! gives it back with a single unlock call when the user walks away without
//! saving. A session can outlive its dialog while the unlock waits for an
//! in-flight request to settle.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

use crate::event::{DialogId, RowId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LockState {
    #[default]
    Unlocked,
    LockPresumed,
    Submitted,
    Abandoned,
    Refused,
}

impl LockState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unlocked => "unlocked",
            Self::LockPresumed => "lock_presumed",
            Self::Submitted => "submitted",
            Self::Abandoned => "abandoned",
            Self::Refused => "refused",
        }
    }

    /// `Abandoned` is not terminal: a save or a 423 may still settle after
    /// the dialog was hidden.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Submitted | Self::Refused)
    }

    #[must_use]
    pub fn valid_transitions(self) -> Vec<Self> {
        match self {
            Self::Unlocked => vec![Self::LockPresumed, Self::Submitted, Self::Refused],
            Self::LockPresumed => vec![Self::Submitted, Self::Abandoned, Self::Refused],
            Self::Abandoned => vec![Self::Submitted, Self::Refused],
            Self::Submitted | Self::Refused => vec![],
        }
    }

    #[must_use]
    pub fn can_transition_to(self, to: Self) -> bool {
        self.valid_transitions().contains(&to)
    }

    pub fn validate_transition(self, to: Self) -> Result<(), TransitionError> {
        if self == to {
            return Err(TransitionError::SameState);
        }
        if self.is_terminal() {
            return Err(TransitionError::FromTerminal { state: self });
        }
        if !self.can_transition_to(to) {
            return Err(TransitionError::Invalid { from: self, to });
        }
        Ok(())
    }
}

impl std::fmt::Display for LockState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Cannot transition to the same lock state")]
    SameState,
    #[error("Cannot transition from terminal lock state: {state}")]
    FromTerminal { state: LockState },
    #[error("Invalid lock transition from {from} to {to}")]
    Invalid { from: LockState, to: LockState },
    #[error("Lock was already released")]
    AlreadyReleased,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditSession {
    row_id: RowId,
    lock: LockState,
    load_in_flight: bool,
    content_loaded: bool,
    submit_in_flight: bool,
    hidden: bool,
    released: bool,
}

impl EditSession {
    /// A session starts with its content load already issued.
    #[must_use]
    pub fn new(row_id: RowId) -> Self {
        Self {
            row_id,
            lock: LockState::Unlocked,
            load_in_flight: true,
            content_loaded: false,
            submit_in_flight: false,
            hidden: false,
            released: false,
        }
    }

    pub fn row_id(&self) -> &RowId {
        &self.row_id
    }

    pub fn lock(&self) -> LockState {
        self.lock
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn has_request_in_flight(&self) -> bool {
        self.load_in_flight || self.submit_in_flight
    }

    fn transition(&mut self, to: LockState) -> Result<(), TransitionError> {
        if self.released {
            return Err(TransitionError::AlreadyReleased);
        }
        self.lock.validate_transition(to)?;
        debug!(row = %self.row_id, from = %self.lock, to = %to, "lock state changed");
        self.lock = to;
        Ok(())
    }

    /// First "fully shown" event. Returns whether the lock is now presumed.
    pub fn on_shown(&mut self) -> bool {
        if self.hidden || self.lock != LockState::Unlocked {
            return false;
        }
        self.transition(LockState::LockPresumed).is_ok()
    }

    pub fn on_load_succeeded(&mut self) {
        if self.load_in_flight {
            self.load_in_flight = false;
            self.content_loaded = true;
        }
    }

    pub fn on_load_failed(&mut self) {
        self.load_in_flight = false;
    }

    /// HTTP 423 on the edit load: the lock was never granted to us.
    pub fn on_lock_refused(&mut self) -> Result<(), TransitionError> {
        self.load_in_flight = false;
        self.transition(LockState::Refused)
    }

    /// Returns `false` when a submit must not go out for this session.
    pub fn on_submit_started(&mut self) -> bool {
        let lock_usable = matches!(self.lock, LockState::Unlocked | LockState::LockPresumed);
        if self.hidden || !self.content_loaded || self.submit_in_flight || !lock_usable {
            return false;
        }
        self.submit_in_flight = true;
        true
    }

    /// Recorded before the dialog is asked to hide.
    pub fn on_submit_saved(&mut self) -> Result<(), TransitionError> {
        self.submit_in_flight = false;
        self.transition(LockState::Submitted)
    }

    pub fn on_submit_failed(&mut self) {
        self.submit_in_flight = false;
    }

    /// Returns `false` for duplicate hidden events.
    pub fn on_hidden(&mut self) -> bool {
        if self.hidden {
            return false;
        }
        self.hidden = true;
        if self.lock == LockState::LockPresumed {
            // Cannot fail: LockPresumed -> Abandoned is always valid before release.
            let _ = self.transition(LockState::Abandoned);
        }
        true
    }

    /// Hands out the row to unlock, at most once, and only once nothing that
    /// could still turn the outcome into a save or a refusal is in flight.
    pub fn take_release(&mut self) -> Option<RowId> {
        if self.lock != LockState::Abandoned || self.released || self.has_request_in_flight() {
            return None;
        }
        self.released = true;
        Some(self.row_id.clone())
    }

    /// Page unload: give back any presumed lock now, in-flight requests or not.
    pub fn force_release(&mut self) -> Option<RowId> {
        if self.released || !matches!(self.lock, LockState::LockPresumed | LockState::Abandoned) {
            return None;
        }
        self.lock = LockState::Abandoned;
        self.released = true;
        Some(self.row_id.clone())
    }

    /// Nothing left to observe or send for this session.
    pub fn is_finished(&self) -> bool {
        self.hidden
            && !self.has_request_in_flight()
            && (self.lock != LockState::Abandoned || self.released)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionRegistry {
    sessions: HashMap<DialogId, EditSession>,
}

impl SessionRegistry {
    pub fn insert(&mut self, dialog: DialogId, session: EditSession) {
        self.sessions.insert(dialog, session);
    }

    pub fn get_mut(&mut self, dialog: &DialogId) -> Option<&mut EditSession> {
        self.sessions.get_mut(dialog)
    }

    pub fn remove(&mut self, dialog: &DialogId) -> Option<EditSession> {
        self.sessions.remove(dialog)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&DialogId, &mut EditSession)> {
        self.sessions.iter_mut()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
