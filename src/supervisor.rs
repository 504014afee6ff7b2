//! Core-1 health monitor.
//!
//! The supervisor owns one shared metrics record, updated exclusively by its
//! own tick and by `heartbeat()` calls from the primary core. It is built
//! the same way `watchdog::Watchdog` is: generic over borrowed platform
//! trait objects so it can be exercised against `platform::host` doubles.

use crate::err::SupervisorError;
use crate::platform::{adc_to_celsius, Clock, TempSensor, WatchdogHardware};
use crate::watchdog::Watchdog;

/// ~11 days in milliseconds — any heartbeat age beyond this is treated as a
/// clock resync rather than a genuine hang.
const HEARTBEAT_WRAP_GUARD_MS: u64 = 11 * 24 * 60 * 60 * 1000;
const CORE0_HANG_THRESHOLD_MS: u64 = 5_000;
const MEMORY_HIGH_THRESHOLD_PERCENT: f32 = 80.0;
const TEMP_HIGH_C: f32 = 70.0;
const TEMP_CRITICAL_C: f32 = 80.0;
const MEMORY_LEAK_FLOOR_BYTES: usize = 50 * 1024;
const MEMORY_LEAK_GROWTH_BYTES: usize = 1024;
/// Consecutive non-decreasing ticks (at the 100 ms cadence) before a
/// sustained climb is called a leak rather than noise. This is a
/// best-effort diagnostic, not a precise leak detector.
const MEMORY_LEAK_WINDOW_TICKS: u32 = 10;

bitflags::bitflags! {
    /// Active health conditions, recomputed every tick.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct HealthFlags: u32 {
        const WATCHDOG = 1 << 0;
        const CORE0_HUNG = 1 << 1;
        const MEMORY_LEAK = 1 << 2;
        const MEMORY_HIGH = 1 << 3;
        const TEMP_HIGH = 1 << 4;
        const TEMP_CRITICAL = 1 << 5;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum HealthStatus {
    #[default]
    Ok,
    Warning,
    Critical,
    Emergency,
}

impl HealthFlags {
    fn status(self) -> HealthStatus {
        if self.contains(HealthFlags::TEMP_CRITICAL) {
            HealthStatus::Emergency
        } else if self.contains(HealthFlags::CORE0_HUNG) {
            HealthStatus::Critical
        } else if self.intersects(
            HealthFlags::WATCHDOG | HealthFlags::MEMORY_LEAK | HealthFlags::MEMORY_HIGH | HealthFlags::TEMP_HIGH,
        ) {
            HealthStatus::Warning
        } else {
            HealthStatus::Ok
        }
    }
}

/// Snapshot of the shared metrics record, read by the rest
/// of the system.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SupervisorMetrics {
    pub uptime_ms: u64,
    pub heap_used: usize,
    pub heap_free: usize,
    pub heap_peak: usize,
    pub alloc_count: u32,
    pub free_count: u32,
    pub usage_percent: f32,
    pub temp_current_c: f32,
    pub temp_peak_c: f32,
    pub watchdog_feed_count: u32,
    pub watchdog_last_feed_ms: u64,
    pub heartbeat_core0_ms: u64,
    pub heartbeat_core1_ms: u64,
    /// Whether core 0's heartbeat is still within the hang threshold.
    /// Cleared the moment `CORE0_HUNG` is raised, restored once a fresh
    /// heartbeat arrives.
    pub core0_responsive: bool,
    pub status: HealthStatus,
    pub flags: HealthFlags,
    pub warnings_total: u32,
    pub criticals_total: u32,
    pub recoveries_total: u32,
}

impl Default for SupervisorMetrics {
    fn default() -> Self {
        Self {
            uptime_ms: 0,
            heap_used: 0,
            heap_free: 0,
            heap_peak: 0,
            alloc_count: 0,
            free_count: 0,
            usage_percent: 0.0,
            temp_current_c: 0.0,
            temp_peak_c: 0.0,
            watchdog_feed_count: 0,
            watchdog_last_feed_ms: 0,
            heartbeat_core0_ms: 0,
            heartbeat_core1_ms: 0,
            core0_responsive: true,
            status: HealthStatus::default(),
            flags: HealthFlags::default(),
            warnings_total: 0,
            criticals_total: 0,
            recoveries_total: 0,
        }
    }
}

/// The supervisor health-monitor loop, pinned to core 1.
pub struct Supervisor<'a> {
    temp_sensor: &'a dyn TempSensor,
    watchdog: Watchdog<'a>,
    running: bool,
    alerts_enabled: bool,
    managed_heap_total: usize,
    metrics: SupervisorMetrics,
    prev_heap_used: usize,
    stable_ticks: u32,
    window_start_heap_used: usize,
}

impl<'a> Supervisor<'a> {
    pub fn new(
        clock: &'a dyn Clock,
        temp_sensor: &'a dyn TempSensor,
        hw: &'a dyn WatchdogHardware,
        managed_heap_total: usize,
        alerts_enabled: bool,
    ) -> Self {
        Self {
            temp_sensor,
            watchdog: Watchdog::new(clock, hw),
            running: false,
            alerts_enabled,
            managed_heap_total,
            metrics: SupervisorMetrics::default(),
            prev_heap_used: 0,
            stable_ticks: 0,
            window_start_heap_used: 0,
        }
    }

    /// Starts the loop: initialises and enables the watchdog for
    /// `watchdog_timeout_ms` and resets the metrics record.
    pub fn init(&mut self, now_ms: u64, watchdog_timeout_ms: u32) -> Result<(), SupervisorError> {
        if self.running {
            return Err(SupervisorError::AlreadyRunning);
        }
        self.watchdog.init(watchdog_timeout_ms);
        self.watchdog
            .enable(watchdog_timeout_ms)
            .expect("watchdog is Ready immediately after init");
        self.metrics = SupervisorMetrics::default();
        self.metrics.uptime_ms = now_ms;
        self.metrics.heartbeat_core0_ms = now_ms;
        self.metrics.heartbeat_core1_ms = now_ms;
        self.prev_heap_used = 0;
        self.stable_ticks = 0;
        self.window_start_heap_used = 0;
        self.running = true;
        Ok(())
    }

    /// Clears the running flag; the next tick (bounded by the 100 ms
    /// cadence) is the last one.
    pub fn stop(&mut self) -> Result<(), SupervisorError> {
        if !self.running {
            return Err(SupervisorError::NotRunning);
        }
        self.running = false;
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn metrics(&self) -> SupervisorMetrics {
        self.metrics
    }

    fn feed_watchdog(&mut self, now_ms: u64) {
        self.watchdog.feed();
        self.metrics.watchdog_feed_count += 1;
        self.metrics.watchdog_last_feed_ms = now_ms;
    }

    /// Called from the primary core. Double-duty: updates the core-0
    /// heartbeat timestamp *and* the watchdog last-feed bookkeeping in one
    /// call.
    pub fn heartbeat(&mut self, now_ms: u64) -> Result<(), SupervisorError> {
        if !self.running {
            return Err(SupervisorError::NotRunning);
        }
        self.metrics.heartbeat_core0_ms = now_ms;
        self.feed_watchdog(now_ms);
        Ok(())
    }

    /// Accumulates heap used/free, updates peak, and recomputes usage
    /// percent against the managed-heap total.
    pub fn report_memory(&mut self, used_delta: i64, free_delta: i64) -> Result<(), SupervisorError> {
        if !self.running {
            return Err(SupervisorError::NotRunning);
        }
        self.metrics.heap_used = (self.metrics.heap_used as i64 + used_delta).max(0) as usize;
        self.metrics.heap_free = (self.metrics.heap_free as i64 + free_delta).max(0) as usize;
        if self.metrics.heap_used > self.metrics.heap_peak {
            self.metrics.heap_peak = self.metrics.heap_used;
        }
        if self.managed_heap_total > 0 {
            self.metrics.usage_percent = self.metrics.heap_used as f32 / self.managed_heap_total as f32 * 100.0;
        }
        if used_delta > 0 {
            self.metrics.alloc_count += 1;
        }
        if used_delta < 0 {
            self.metrics.free_count += 1;
        }
        Ok(())
    }

    fn update_memory_leak_tracking(&mut self) {
        let used = self.metrics.heap_used;
        if used >= self.prev_heap_used {
            if self.stable_ticks == 0 {
                self.window_start_heap_used = self.prev_heap_used;
            }
            self.stable_ticks += 1;
        } else {
            self.stable_ticks = 0;
        }
        self.prev_heap_used = used;
    }

    fn memory_leak_detected(&self) -> bool {
        self.stable_ticks >= MEMORY_LEAK_WINDOW_TICKS
            && self.metrics.heap_used > MEMORY_LEAK_FLOOR_BYTES
            && self.metrics.heap_used >= self.window_start_heap_used + MEMORY_LEAK_GROWTH_BYTES
    }

    /// Runs one 100 ms loop iteration. The sleep
    /// itself (step 9) is the caller's responsibility; this advances
    /// everything that happens within one tick.
    pub fn tick(&mut self, now_ms: u64) -> Result<(), SupervisorError> {
        if !self.running {
            return Err(SupervisorError::NotRunning);
        }

        // 1. advance uptime.
        self.metrics.uptime_ms = now_ms;

        // 2. sample temperature.
        let celsius = adc_to_celsius(self.temp_sensor.read_raw());
        self.metrics.temp_current_c = celsius;
        if celsius > self.metrics.temp_peak_c {
            self.metrics.temp_peak_c = celsius;
        }

        let mut flags = HealthFlags::empty();

        // 3. watchdog-feed age.
        let feed_age = now_ms.saturating_sub(self.metrics.watchdog_last_feed_ms);
        if feed_age > self.watchdog.timeout_ms() as u64 / 2 {
            flags |= HealthFlags::WATCHDOG;
        }

        // 4. core-0 heartbeat age, guarding against time-base wrap.
        let heartbeat_age = now_ms.saturating_sub(self.metrics.heartbeat_core0_ms);
        if heartbeat_age > HEARTBEAT_WRAP_GUARD_MS {
            self.metrics.heartbeat_core0_ms = now_ms;
            self.metrics.core0_responsive = true;
        } else if heartbeat_age > CORE0_HANG_THRESHOLD_MS {
            flags |= HealthFlags::CORE0_HUNG;
            self.metrics.core0_responsive = false;
        } else {
            self.metrics.core0_responsive = true;
        }

        // 5. memory-leak heuristic.
        self.update_memory_leak_tracking();
        if self.memory_leak_detected() {
            flags |= HealthFlags::MEMORY_LEAK;
        }

        // 6. memory-high threshold.
        if self.metrics.usage_percent > MEMORY_HIGH_THRESHOLD_PERCENT {
            flags |= HealthFlags::MEMORY_HIGH;
        }

        // 7. temperature thresholds.
        if celsius >= TEMP_CRITICAL_C {
            flags |= HealthFlags::TEMP_CRITICAL;
        } else if celsius >= TEMP_HIGH_C {
            flags |= HealthFlags::TEMP_HIGH;
        }

        self.metrics.flags = flags;
        let new_status = flags.status();
        self.apply_status_transition(new_status);

        // 8. unconditional watchdog feed — the second-core safety net.
        self.feed_watchdog(now_ms);

        self.metrics.heartbeat_core1_ms = now_ms;
        Ok(())
    }

    fn apply_status_transition(&mut self, new_status: HealthStatus) {
        let old_status = self.metrics.status;
        if new_status > old_status {
            match new_status {
                HealthStatus::Warning => self.metrics.warnings_total += 1,
                HealthStatus::Critical | HealthStatus::Emergency => self.metrics.criticals_total += 1,
                HealthStatus::Ok => {}
            }
            if self.alerts_enabled {
                crate::kwarn!("[SUPERVISOR] health {:?} -> {:?} (flags {:?})", old_status, new_status, self.metrics.flags);
            }
        } else if new_status < old_status {
            self.metrics.recoveries_total += 1;
        }
        self.metrics.status = new_status;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::platform::host::{HostClock, HostTempSensor, HostWatchdog};

    fn supervisor<'a>(
        clock: &'a HostClock,
        temp: &'a HostTempSensor,
        hw: &'a HostWatchdog,
    ) -> Supervisor<'a> {
        Supervisor::new(clock, temp, hw, 100 * 1024, true)
    }

    #[test]
    fn init_then_stop_toggles_running() {
        let clock = HostClock::new();
        let temp = HostTempSensor::default();
        let hw = HostWatchdog::default();
        let mut sup = supervisor(&clock, &temp, &hw);
        assert_eq!(sup.stop(), Err(SupervisorError::NotRunning));
        sup.init(0, 1000).unwrap();
        assert!(sup.is_running());
        assert_eq!(sup.init(0, 1000), Err(SupervisorError::AlreadyRunning));
        sup.stop().unwrap();
        assert!(!sup.is_running());
    }

    #[test]
    fn heartbeat_feeds_watchdog_and_updates_timestamp() {
        let clock = HostClock::new();
        let temp = HostTempSensor::default();
        let hw = HostWatchdog::default();
        let mut sup = supervisor(&clock, &temp, &hw);
        sup.init(0, 1000).unwrap();
        sup.heartbeat(50).unwrap();
        assert_eq!(sup.metrics().heartbeat_core0_ms, 50);
        assert_eq!(sup.metrics().watchdog_feed_count, 1);
    }

    #[test]
    fn tick_raises_core0_hung_after_five_seconds_silence() {
        let clock = HostClock::new();
        let temp = HostTempSensor::default();
        let hw = HostWatchdog::default();
        let mut sup = supervisor(&clock, &temp, &hw);
        sup.init(0, 10_000).unwrap();
        sup.tick(6_000).unwrap();
        assert!(sup.metrics().flags.contains(HealthFlags::CORE0_HUNG));
        assert_eq!(sup.metrics().status, HealthStatus::Critical);
        assert_eq!(sup.metrics().criticals_total, 1);
        assert!(!sup.metrics().core0_responsive);
    }

    #[test]
    fn heartbeat_age_wrap_guard_resyncs_instead_of_hanging() {
        let clock = HostClock::new();
        let temp = HostTempSensor::default();
        let hw = HostWatchdog::default();
        let mut sup = supervisor(&clock, &temp, &hw);
        sup.init(0, 10_000).unwrap();
        let far_future = HEARTBEAT_WRAP_GUARD_MS + 1_000_000;
        sup.tick(far_future).unwrap();
        assert!(!sup.metrics().flags.contains(HealthFlags::CORE0_HUNG));
        assert_eq!(sup.metrics().heartbeat_core0_ms, far_future);
    }

    #[test]
    fn temperature_thresholds_raise_warning_then_emergency() {
        let clock = HostClock::new();
        let temp = HostTempSensor::default();
        let hw = HostWatchdog::default();
        let mut sup = supervisor(&clock, &temp, &hw);
        sup.init(0, 10_000).unwrap();

        // raw value corresponding to ~75C.
        let raw_75 = ((75.0f32 - 27.0) * -0.001721 + 0.706) / (3.3 / 4096.0);
        temp.set_raw(raw_75 as u16);
        sup.tick(100).unwrap();
        assert!(sup.metrics().flags.contains(HealthFlags::TEMP_HIGH));
        assert_eq!(sup.metrics().status, HealthStatus::Warning);

        let raw_85 = ((85.0f32 - 27.0) * -0.001721 + 0.706) / (3.3 / 4096.0);
        temp.set_raw(raw_85 as u16);
        sup.tick(200).unwrap();
        assert!(sup.metrics().flags.contains(HealthFlags::TEMP_CRITICAL));
        assert_eq!(sup.metrics().status, HealthStatus::Emergency);
    }

    #[test]
    fn memory_high_raises_warning_above_eighty_percent() {
        let clock = HostClock::new();
        let temp = HostTempSensor::default();
        let hw = HostWatchdog::default();
        let mut sup = supervisor(&clock, &temp, &hw);
        sup.init(0, 10_000).unwrap();
        sup.report_memory(85 * 1024, 0).unwrap();
        sup.tick(100).unwrap();
        assert!(sup.metrics().flags.contains(HealthFlags::MEMORY_HIGH));
    }

    #[test]
    fn sustained_non_decreasing_heap_above_floor_raises_memory_leak() {
        let clock = HostClock::new();
        let temp = HostTempSensor::default();
        let hw = HostWatchdog::default();
        let mut sup = supervisor(&clock, &temp, &hw);
        sup.init(0, 10_000).unwrap();
        sup.report_memory(60 * 1024, 0).unwrap();
        let mut leaked = false;
        for t in 1..=(MEMORY_LEAK_WINDOW_TICKS + 1) {
            sup.report_memory(200, 0).unwrap();
            sup.tick(t as u64 * 100).unwrap();
            if sup.metrics().flags.contains(HealthFlags::MEMORY_LEAK) {
                leaked = true;
            }
        }
        assert!(leaked);
    }

    #[test]
    fn recovery_is_counted_when_status_drops() {
        let clock = HostClock::new();
        let temp = HostTempSensor::default();
        let hw = HostWatchdog::default();
        let mut sup = supervisor(&clock, &temp, &hw);
        sup.init(0, 10_000).unwrap();
        sup.tick(6_000).unwrap();
        assert_eq!(sup.metrics().status, HealthStatus::Critical);
        assert!(!sup.metrics().core0_responsive);
        sup.heartbeat(6_050).unwrap();
        sup.tick(6_100).unwrap();
        assert_eq!(sup.metrics().status, HealthStatus::Ok);
        assert_eq!(sup.metrics().recoveries_total, 1);
        assert!(sup.metrics().core0_responsive);
    }

    #[test]
    fn tick_before_init_is_not_running() {
        let clock = HostClock::new();
        let temp = HostTempSensor::default();
        let hw = HostWatchdog::default();
        let mut sup = supervisor(&clock, &temp, &hw);
        assert_eq!(sup.tick(0), Err(SupervisorError::NotRunning));
    }
}
