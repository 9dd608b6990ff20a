//! Synchronization primitives the orchestrator is built on
//!
//! - [`barrier`]: one continuation after N views complete
//! - [`line_status`]: the forward-only per-line state machine
//! - [`resume`]: exactly-once resume token for pausing commands

pub mod barrier;
pub mod line_status;
pub mod resume;

#[cfg(test)]
mod tests;

pub use barrier::{CompletionBarrier, CompletionToken, Continuation};
pub use line_status::{LineStatus, ProceedEffect};
pub use resume::ResumeHandle;
