//! Per-operation circuit state.

use crate::types::CircuitState;

#[derive(Debug, Clone)]
pub(crate) struct Circuit {
    pub consecutive_failures: u32,
    pub state: CircuitState,
}

impl Default for Circuit {
    fn default() -> Self {
        Self {
            consecutive_failures: 0,
            state: CircuitState::Closed,
        }
    }
}

impl Circuit {
    pub fn is_open(&self) -> bool {
        self.state == CircuitState::Open
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.state = CircuitState::Closed;
    }

    /// Increments the failure count and opens the circuit once it
    /// reaches `threshold`.
    pub fn record_failure(&mut self, threshold: u32) {
        self.consecutive_failures += 1;
        if self.consecutive_failures >= threshold {
            self.state = CircuitState::Open;
        }
    }
}
