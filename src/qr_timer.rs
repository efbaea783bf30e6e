//! Countdown for a generated check-in code.
//!
//! One code is shown at a time. Starting a new countdown replaces the
//! previous one, and expiry is reported exactly once.

use std::time::Duration;

/// How long a check-in code stays on screen.
pub const DEFAULT_VALIDITY_SECS: u32 = 300;

/// Result of advancing the timer by one second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    /// No countdown is running.
    Idle,
    Running { remaining: u32 },
    /// The countdown just reached zero. Reported once per countdown.
    Expired,
}

#[derive(Debug, Clone, Default)]
pub struct QrSessionTimer {
    remaining: u32,
    active: bool,
    generation: u64,
}

impl QrSessionTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a countdown of `duration_secs`, replacing any running one.
    /// Returns the countdown's generation number.
    pub fn start(&mut self, duration_secs: u32) -> u64 {
        self.generation += 1;
        self.remaining = duration_secs;
        self.active = true;
        tracing::debug!(
            generation = self.generation,
            duration_secs,
            "Check-in countdown started"
        );
        self.generation
    }

    pub fn tick(&mut self) -> TimerEvent {
        if !self.active {
            return TimerEvent::Idle;
        }

        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.active = false;
            tracing::debug!(generation = self.generation, "Check-in countdown expired");
            TimerEvent::Expired
        } else {
            TimerEvent::Running {
                remaining: self.remaining,
            }
        }
    }

    /// Stop early. Returns whether a countdown was running.
    pub fn cancel(&mut self) -> bool {
        let was_active = self.active;
        self.active = false;
        self.remaining = 0;
        was_active
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The remaining time as `M:SS`.
    pub fn display(&self) -> String {
        format_countdown(self.remaining)
    }
}

/// `M:SS`: minutes unpadded, seconds padded to two digits.
pub fn format_countdown(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// Tick `timer` once per second until it expires or is cancelled, calling
/// `on_tick` with every event. Returns the final event.
pub async fn run_countdown<F>(timer: &mut QrSessionTimer, mut on_tick: F) -> TimerEvent
where
    F: FnMut(TimerEvent, &QrSessionTimer),
{
    let mut interval = tokio::time::interval(Duration::from_secs(1));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately.
    interval.tick().await;

    loop {
        interval.tick().await;
        let event = timer.tick();
        on_tick(event, timer);
        if !matches!(event, TimerEvent::Running { .. }) {
            return event;
        }
    }
}
