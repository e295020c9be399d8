//! Per-question countdown.
//!
//! The timer holds no clock of its own. Whoever owns the real cadence calls
//! [`QuestionTimer::tick`] once per second.

/// State of the countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Stopped,
    Running,
    /// Reached zero. Further ticks do nothing until restarted.
    Expired,
}

/// Result of a single tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Timer is not running.
    Inactive,
    /// Seconds left after this tick.
    Remaining(u32),
    /// This tick expired the timer. Reported exactly once per start.
    Expired,
}

/// Countdown for the active question.
#[derive(Debug, Clone)]
pub struct QuestionTimer {
    state: TimerState,
    remaining: u32,
}

impl Default for QuestionTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl QuestionTimer {
    pub fn new() -> Self {
        Self {
            state: TimerState::Stopped,
            remaining: 0,
        }
    }

    /// (Re)start with a full budget.
    pub fn start(&mut self, budget_secs: u32) {
        self.remaining = budget_secs;
        self.state = TimerState::Running;
    }

    /// Stop without expiring. `remaining` is kept for display.
    pub fn stop(&mut self) {
        self.state = TimerState::Stopped;
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn is_running(&self) -> bool {
        self.state == TimerState::Running
    }

    /// Advance by one second.
    pub fn tick(&mut self) -> Tick {
        if self.state != TimerState::Running {
            return Tick::Inactive;
        }
        if self.remaining <= 1 {
            self.remaining = 0;
            self.state = TimerState::Expired;
            return Tick::Expired;
        }
        self.remaining -= 1;
        Tick::Remaining(self.remaining)
    }
}
