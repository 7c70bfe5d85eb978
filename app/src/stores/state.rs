//! Run state machine shared by every model store.
//!
//! State diagram:
//! ```text
//!            ┌──────Start──────┐
//!            │                 ↓
//! Idle ──Start──> Processing ──Complete──> Succeeded
//!   │                 │   ↑                     │
//!   │                Fail └────────Start────────┤
//!   │                 ↓                         │
//!   └──Fail────────> Failed <──────Fail─────────┘
//!
//! Reset: any state ──> Idle
//! ```
//!
//! `Fail` is accepted outside `Processing` because input validation fails a
//! run before it ever starts.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Outcome of the latest run, payload included
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "camelCase")]
pub enum RunState<T> {
    Idle,
    Processing,
    Succeeded(T),
    Failed(String),
}

impl<T> RunState<T> {
    pub fn phase(&self) -> RunPhase {
        match self {
            RunState::Idle => RunPhase::Idle,
            RunState::Processing => RunPhase::Processing,
            RunState::Succeeded(_) => RunPhase::Succeeded,
            RunState::Failed(_) => RunPhase::Failed,
        }
    }

    pub fn is_processing(&self) -> bool {
        matches!(self, RunState::Processing)
    }

    pub fn output(&self) -> Option<&T> {
        match self {
            RunState::Succeeded(output) => Some(output),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            RunState::Failed(message) => Some(message),
            _ => None,
        }
    }
}

/// Payload-free view of `RunState`
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum RunPhase {
    Idle,
    Processing,
    Succeeded,
    Failed,
}

/// Events that can trigger phase transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum RunEvent {
    /// A run was dispatched to the engine
    Start,
    /// The engine answered and the output decoded
    Complete,
    /// Validation, the engine or decoding failed
    Fail,
    /// User reset
    Reset,
}

/// Reason a transition was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{attempted_event} event rejected in {current_phase} phase")]
pub struct TransitionRejection {
    pub current_phase: RunPhase,
    pub attempted_event: RunEvent,
}

impl RunPhase {
    /// Pure function: the phase after `event`, or a rejection
    pub fn next(self, event: RunEvent) -> Result<RunPhase, TransitionRejection> {
        match (self, event) {
            (_, RunEvent::Start) => Ok(RunPhase::Processing),
            (RunPhase::Processing, RunEvent::Complete) => Ok(RunPhase::Succeeded),
            (_, RunEvent::Fail) => Ok(RunPhase::Failed),
            (_, RunEvent::Reset) => Ok(RunPhase::Idle),
            (current, event) => Err(TransitionRejection {
                current_phase: current,
                attempted_event: event,
            }),
        }
    }
}

/// Start/end timestamps of one run
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationTiming {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl GenerationTiming {
    pub fn start(now: DateTime<Utc>) -> Self {
        Self {
            started_at: now,
            finished_at: None,
        }
    }

    pub fn finish(&mut self, now: DateTime<Utc>) {
        self.finished_at = Some(now);
    }

    /// `None` until the run has finished
    pub fn duration_ms(&self) -> Option<i64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds())
    }

    /// Seconds with two decimals, e.g. `"3.42s"`
    pub fn formatted(&self) -> Option<String> {
        self.duration_ms()
            .map(|ms| format!("{:.2}s", ms as f64 / 1000.0))
    }
}
