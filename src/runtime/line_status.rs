//! Per-line status machine
//!
//! A line moves strictly forward through
//! `Running -> Interrupted -> Delivered -> Ended`. `Interrupted` may be
//! skipped, and `Ended` may be reached from any earlier state. Two signals
//! drive it: the proceed signal (the player wants to move on) and delivery
//! (every view finished presenting).

use crate::errors::DialogueError;
use serde::{Deserialize, Serialize};

/// Presentation status of the current line
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LineStatus {
    /// Views are presenting the line
    Running,
    /// The player asked to hurry; views should finish presenting now
    Interrupted,
    /// Every view finished presenting
    Delivered,
    /// The line is being dismissed or is gone
    Ended,
}

/// What the orchestrator must do after a proceed signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProceedEffect {
    /// Tell views the line was interrupted so they fast-finish delivery
    Interrupt,
    /// Tell views to dismiss the line
    Dismiss,
    /// Nothing in flight
    Ignored,
}

impl LineStatus {
    /// Whether `next` is a legal successor of `self`
    pub fn can_advance_to(self, next: LineStatus) -> bool {
        next > self
    }

    /// Move to `next`, refusing any backward or repeated transition
    pub fn advance_to(&mut self, next: LineStatus) -> Result<(), DialogueError> {
        if !self.can_advance_to(next) {
            return Err(DialogueError::InvalidStatusTransition {
                from: *self,
                to: next,
            });
        }
        *self = next;
        Ok(())
    }

    /// Apply the proceed signal
    pub fn proceed(&mut self) -> ProceedEffect {
        match *self {
            LineStatus::Running => {
                *self = LineStatus::Interrupted;
                ProceedEffect::Interrupt
            }
            LineStatus::Interrupted | LineStatus::Delivered => {
                *self = LineStatus::Ended;
                ProceedEffect::Dismiss
            }
            LineStatus::Ended => ProceedEffect::Ignored,
        }
    }

    /// Apply the "all views done presenting" signal.
    /// Returns false when the line had already moved past delivery.
    pub fn deliver(&mut self) -> bool {
        match *self {
            LineStatus::Running | LineStatus::Interrupted => {
                *self = LineStatus::Delivered;
                true
            }
            LineStatus::Delivered | LineStatus::Ended => false,
        }
    }

    pub fn is_ended(self) -> bool {
        self == LineStatus::Ended
    }
}
