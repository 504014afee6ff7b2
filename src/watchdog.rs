//! Watchdog façade: a thin state machine over a hardware countdown timer
//! that cannot truly be disabled once armed.

use crate::err::WatchdogError;
use crate::platform::{Clock, WatchdogHardware};

pub const TIMEOUT_MIN_MS: u32 = 1;
pub const TIMEOUT_MAX_MS: u32 = 8388;
pub const TIMEOUT_DEFAULT_MS: u32 = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Uninit,
    Ready,
    Enabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetReason {
    None,
    Timeout,
    Forced,
}

fn clamp_timeout(timeout_ms: u32) -> u32 {
    timeout_ms.clamp(TIMEOUT_MIN_MS, TIMEOUT_MAX_MS)
}

/// The watchdog façade. Generic over the clock and hardware countdown so it
/// can be exercised against `platform::host` test doubles.
pub struct Watchdog<'a> {
    clock: &'a dyn Clock,
    hw: &'a dyn WatchdogHardware,
    state: State,
    timeout_ms: u32,
    feed_count: u32,
    last_feed_time_ms: u64,
    reset_reason: ResetReason,
}

impl<'a> Watchdog<'a> {
    pub fn new(clock: &'a dyn Clock, hw: &'a dyn WatchdogHardware) -> Self {
        Self {
            clock,
            hw,
            state: State::Uninit,
            timeout_ms: TIMEOUT_DEFAULT_MS,
            feed_count: 0,
            last_feed_time_ms: 0,
            reset_reason: ResetReason::None,
        }
    }

    /// Records the requested timeout (clamped to `[1, 8388]` ms) and detects
    /// whether the previous boot ended in a watchdog reset.
    pub fn init(&mut self, timeout_ms: u32) {
        self.timeout_ms = clamp_timeout(timeout_ms);
        self.reset_reason = if self.hw.caused_reboot() {
            ResetReason::Timeout
        } else {
            ResetReason::None
        };
        self.last_feed_time_ms = self.clock.now_ms();
        self.feed_count = 0;
        self.state = State::Ready;
    }

    /// Transitions to `Enabled`, starts the hardware countdown, and resets
    /// feed accounting.
    pub fn enable(&mut self, timeout_ms: u32) -> Result<(), WatchdogError> {
        if self.state == State::Uninit {
            return Err(WatchdogError::Uninitialized);
        }
        self.timeout_ms = clamp_timeout(timeout_ms);
        self.hw.arm(self.timeout_ms);
        self.feed_count = 0;
        self.last_feed_time_ms = self.clock.now_ms();
        self.state = State::Enabled;
        Ok(())
    }

    /// No-op when not `Enabled`; otherwise kicks the hardware and updates
    /// feed stats.
    pub fn feed(&mut self) {
        if self.state != State::Enabled {
            return;
        }
        self.hw.kick();
        self.feed_count += 1;
        self.last_feed_time_ms = self.clock.now_ms();
    }

    /// `max(0, timeout - (now - last_feed))` when `Enabled`, else `0`.
    pub fn time_remaining_ms(&self) -> u32 {
        if self.state != State::Enabled {
            return 0;
        }
        let elapsed = self.clock.now_ms().saturating_sub(self.last_feed_time_ms);
        if elapsed >= self.timeout_ms as u64 {
            0
        } else {
            self.timeout_ms - elapsed as u32
        }
    }

    /// Arms the hardware for an immediate reset, then spins forever. Never
    /// returns.
    pub fn reboot(&mut self, delay_ms: u32) -> ! {
        self.reset_reason = ResetReason::Forced;
        self.hw.force_reset(delay_ms.max(1))
    }

    /// Marks the façade disabled and pins the hardware timeout to its
    /// maximum — the hardware itself cannot truly be disabled once armed.
    pub fn disable(&mut self) {
        if self.state == State::Enabled {
            self.hw.arm(TIMEOUT_MAX_MS);
        }
        self.state = State::Ready;
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn reset_reason(&self) -> ResetReason {
        self.reset_reason
    }

    pub fn feed_count(&self) -> u32 {
        self.feed_count
    }

    pub fn timeout_ms(&self) -> u32 {
        self.timeout_ms
    }
}
