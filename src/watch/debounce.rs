// src/watch/debounce.rs

//! Pure debounce state machine: idle -> debouncing -> (poll) -> idle.
//!
//! The window opens with the first event and is not extended by later ones,
//! so a steady stream of saves still dispatches once per window.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use tokio::time::Instant;

use crate::types::{ChangeEvent, ChangeKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
    Idle,
    Debouncing { deadline: Instant },
}

#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    state: DebounceState,
    pending: BTreeMap<PathBuf, ChangeKind>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            state: DebounceState::Idle,
            pending: BTreeMap::new(),
        }
    }

    pub fn state(&self) -> DebounceState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, DebounceState::Idle)
    }

    /// When the current window closes, if one is open.
    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            DebounceState::Idle => None,
            DebounceState::Debouncing { deadline } => Some(deadline),
        }
    }

    /// Record an event. Opens a window when idle.
    pub fn observe(&mut self, event: ChangeEvent, now: Instant) {
        if self.is_idle() {
            self.state = DebounceState::Debouncing {
                deadline: now + self.window,
            };
        }
        self.pending
            .entry(event.path)
            .and_modify(|k| *k = k.merge(event.kind))
            .or_insert(event.kind);
    }

    /// Close the window if its deadline has passed and return the coalesced
    /// events, one per path, in path order.
    pub fn poll(&mut self, now: Instant) -> Option<Vec<ChangeEvent>> {
        let deadline = self.deadline()?;
        if now < deadline {
            return None;
        }
        self.state = DebounceState::Idle;
        let events = std::mem::take(&mut self.pending)
            .into_iter()
            .map(|(path, kind)| ChangeEvent::new(path, kind))
            .collect();
        Some(events)
    }

    /// Drop everything pending and go idle.
    pub fn reset(&mut self) {
        self.pending.clear();
        self.state = DebounceState::Idle;
    }
}
