use std::time::Duration;

/// Identifies one arming of the batch timer.
///
/// The scheduler hands out a fresh ticket every time it starts the timer and only
/// accepts a firing that carries the ticket it armed last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
#[display("#{_0}")]
pub struct TimerTicket(pub(super) u64);

impl TimerTicket {
    #[must_use]
    pub fn value(self) -> u64 {
        self.0
    }
}

/// Schedules the end of a batch.
///
/// Implementations call back into
/// [`Scheduler::on_timer_fired`](super::Scheduler::on_timer_fired) with the ticket once
/// `lifetime` has elapsed. Starting a new ticket implicitly supersedes the previous one.
pub trait BatchTimer {
    fn start(&mut self, ticket: TimerTicket, lifetime: Duration);
    fn cancel(&mut self, ticket: TimerTicket);
}

/// A timer driven by an explicit clock, for tests and offline runs.
#[derive(Debug, Clone, Default)]
pub struct ManualTimer {
    now: Duration,
    armed: Option<(TimerTicket, Duration)>,
    started: usize,
    cancelled: usize,
}

impl ManualTimer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn now(&self) -> Duration {
        self.now
    }

    /// The armed ticket and its deadline, if any.
    #[must_use]
    pub fn armed(&self) -> Option<(TimerTicket, Duration)> {
        self.armed
    }

    #[must_use]
    pub fn started_count(&self) -> usize {
        self.started
    }

    #[must_use]
    pub fn cancelled_count(&self) -> usize {
        self.cancelled
    }

    /// Moves the clock forward and returns the ticket whose deadline was reached.
    pub fn advance(&mut self, by: Duration) -> Option<TimerTicket> {
        self.now += by;
        match self.armed {
            Some((ticket, deadline)) if deadline <= self.now => {
                self.armed = None;
                Some(ticket)
            }
            _ => None,
        }
    }

    /// Jumps to the deadline of the armed ticket and returns it.
    pub fn advance_to_deadline(&mut self) -> Option<TimerTicket> {
        let (ticket, deadline) = self.armed.take()?;
        self.now = self.now.max(deadline);
        Some(ticket)
    }
}

impl BatchTimer for ManualTimer {
    fn start(&mut self, ticket: TimerTicket, lifetime: Duration) {
        self.started += 1;
        self.armed = Some((ticket, self.now + lifetime));
    }

    fn cancel(&mut self, ticket: TimerTicket) {
        if self.armed.is_some_and(|(armed, _)| armed == ticket) {
            self.armed = None;
            self.cancelled += 1;
        }
    }
}
