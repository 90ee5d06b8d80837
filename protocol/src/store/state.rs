//! System state and the attack duty cycle.
//!
//! ```text
//!   NORMAL ──► UNDER_ATTACK ──► RECOVERY ──► NORMAL
//! ```
//!
//! Transitions are administrative only and follow the cycle above; nothing
//! in the store changes state on its own.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Process-wide operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SystemState {
    /// Reads and writes proceed normally.
    Normal,
    /// An attack is in progress: guarded operations fail on the duty cycle
    /// and repair is refused.
    UnderAttack,
    /// Cleaning up after an attack: writes are suspended, reads and repair
    /// proceed.
    Recovery,
}

impl SystemState {
    /// The only state this one may move to.
    pub fn successor(self) -> SystemState {
        match self {
            SystemState::Normal => SystemState::UnderAttack,
            SystemState::UnderAttack => SystemState::Recovery,
            SystemState::Recovery => SystemState::Normal,
        }
    }

    pub fn can_transition_to(self, to: SystemState) -> bool {
        self.successor() == to
    }

    pub fn accepts_writes(self) -> bool {
        self != SystemState::Recovery
    }
}

impl fmt::Display for SystemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SystemState::Normal => "NORMAL",
            SystemState::UnderAttack => "UNDER_ATTACK",
            SystemState::Recovery => "RECOVERY",
        };
        f.write_str(name)
    }
}

/// Returned when a string names no state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown system state: {0} (expected NORMAL, UNDER_ATTACK or RECOVERY)")]
pub struct ParseStateError(pub String);

impl FromStr for SystemState {
    type Err = ParseStateError;

    /// Case-insensitive; `-` and `_` are interchangeable.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "NORMAL" => Ok(SystemState::Normal),
            "UNDER_ATTACK" => Ok(SystemState::UnderAttack),
            "RECOVERY" => Ok(SystemState::Recovery),
            _ => Err(ParseStateError(s.to_string())),
        }
    }
}

/// Current state plus the injected-failure counter.
#[derive(Debug, Clone)]
pub struct StateMachine {
    state: SystemState,
    fail_every: u64,
    guarded_ops: u64,
    entered_at: DateTime<Utc>,
}

impl StateMachine {
    /// Start in NORMAL. `fail_every = 0` disables injected failures.
    pub fn new(fail_every: u64) -> Self {
        Self {
            state: SystemState::Normal,
            fail_every,
            guarded_ops: 0,
            entered_at: Utc::now(),
        }
    }

    pub fn state(&self) -> SystemState {
        self.state
    }

    /// When the current state was entered.
    pub fn entered_at(&self) -> DateTime<Utc> {
        self.entered_at
    }

    /// Guarded operations admitted or failed since entering UNDER_ATTACK.
    pub fn guarded_ops(&self) -> u64 {
        self.guarded_ops
    }

    /// Move to `to`. Returns the previous state, or `(from, to)` if the
    /// transition is not allowed.
    pub fn transition(&mut self, to: SystemState) -> Result<SystemState, (SystemState, SystemState)> {
        let from = self.state;
        if !from.can_transition_to(to) {
            return Err((from, to));
        }
        self.state = to;
        self.entered_at = Utc::now();
        if to == SystemState::UnderAttack {
            self.guarded_ops = 0;
        }
        Ok(from)
    }

    /// Count one guarded operation against the duty cycle.
    ///
    /// Outside UNDER_ATTACK this always admits and does not count. Under
    /// attack the n-th call (1-based) is refused with `Err(n)` when
    /// `n % fail_every == 0`.
    pub fn admit(&mut self) -> Result<(), u64> {
        if self.state != SystemState::UnderAttack {
            return Ok(());
        }
        self.guarded_ops += 1;
        if self.fail_every != 0 && self.guarded_ops % self.fail_every == 0 {
            return Err(self.guarded_ops);
        }
        Ok(())
    }
}
