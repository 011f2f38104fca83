use std::time::Duration;

use crate::policy::ReconnectPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Opening,
    Open,
    Lost,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    /// Reopen after `delay`; `attempt` counts consecutive failures (1-based).
    Retry { attempt: u32, delay: Duration },
    /// Budget spent after `attempts` reopen attempts.
    Exhausted { attempts: u32 },
    /// Session already terminal or closed; never reconnect.
    Suppressed,
}

/// Transport lifecycle and reconnection bookkeeping for one session. No I/O.
#[derive(Debug)]
pub struct ConnectionManager {
    policy: ReconnectPolicy,
    state: ConnectionState,
    failures: u32,
    terminal: bool,
}

impl ConnectionManager {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            state: ConnectionState::Idle,
            failures: 0,
            terminal: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Consecutive failures since the last successful open or liveness signal.
    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// Returns false when the connection must stay closed.
    pub fn begin_open(&mut self) -> bool {
        if self.terminal || self.state == ConnectionState::Closed {
            return false;
        }
        self.state = ConnectionState::Opening;
        true
    }

    pub fn opened(&mut self) {
        if self.state == ConnectionState::Opening {
            self.state = ConnectionState::Open;
            self.failures = 0;
        }
    }

    /// Any decoded frame proves the server is alive.
    pub fn liveness(&mut self) {
        self.failures = 0;
    }

    /// The session saw `complete` or `error`; later losses never reconnect.
    pub fn mark_terminal(&mut self) {
        self.terminal = true;
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    /// Transport dropped, failed to open, or went silent.
    pub fn lost(&mut self) -> ReconnectDecision {
        if self.terminal || self.state == ConnectionState::Closed {
            self.state = ConnectionState::Closed;
            return ReconnectDecision::Suppressed;
        }

        self.failures = self.failures.saturating_add(1);
        if self.failures > self.policy.max_attempts {
            self.state = ConnectionState::Closed;
            return ReconnectDecision::Exhausted {
                attempts: self.policy.max_attempts,
            };
        }

        self.state = ConnectionState::Lost;
        ReconnectDecision::Retry {
            attempt: self.failures,
            delay: self.policy.delay_for(self.failures),
        }
    }

    /// Idempotent; valid from any state.
    pub fn close(&mut self) {
        self.state = ConnectionState::Closed;
    }
}
