//! System info & fetch: uptime, clock, temperature, and memory summary
//! views over the rest of the kernel's bookkeeping.
//!
//! Rather than keep a parallel set of counters, this module assembles
//! read-only snapshots directly
//! from [`crate::mem`], [`crate::time`], and [`crate::platform`] — the same
//! "thin façade over someone else's bookkeeping" shape as `fs::backend`
//! wrapping a `BlockDevice`.

use crate::err::SysInfoError;
use crate::mem::MemStats;
use crate::platform::{adc_to_celsius, Clock, TempSensor};

const MS_PER_SEC: u64 = 1_000;
const MS_PER_MIN: u64 = 60 * MS_PER_SEC;
const MS_PER_HOUR: u64 = 60 * MS_PER_MIN;
const MS_PER_DAY: u64 = 24 * MS_PER_HOUR;

/// Raw ADC reading a disconnected / not-yet-warmed-up sensor reports on
/// this platform (all bits set — the conversion channel's idle value).
const SENSOR_UNAVAILABLE_RAW: u16 = 0xFFFF;

/// `uptime_info_t`: total milliseconds since boot, plus
/// the same value broken into days/hours/minutes/seconds for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UptimeInfo {
    pub uptime_ms: u64,
    pub days: u32,
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
}

impl UptimeInfo {
    fn from_ms(uptime_ms: u64) -> Self {
        let days = (uptime_ms / MS_PER_DAY) as u32;
        let rem = uptime_ms % MS_PER_DAY;
        let hours = (rem / MS_PER_HOUR) as u8;
        let rem = rem % MS_PER_HOUR;
        let minutes = (rem / MS_PER_MIN) as u8;
        let seconds = ((rem % MS_PER_MIN) / MS_PER_SEC) as u8;
        Self {
            uptime_ms,
            days,
            hours,
            minutes,
            seconds,
        }
    }
}

/// Samples the platform clock relative to a recorded boot timestamp.
pub fn uptime(clock: &dyn Clock, boot_ms: u64) -> UptimeInfo {
    UptimeInfo::from_ms(clock.now_ms().saturating_sub(boot_ms))
}

/// `cpu_info_t`: on-die temperature, current and peak-observed. The
/// scheduler and supervisor run on the same two Cortex-M0+ cores this
/// reports on, so there is no separate per-core load figure in this
/// design — temperature is the whole of "CPU info" here.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CpuInfo {
    pub temperature_c: f32,
    pub temperature_peak_c: f32,
}

/// Samples the on-die temperature sensor once, using the standard ADC
/// conversion formula (`platform::adc_to_celsius`), and folds it into a
/// caller-threaded running peak. Returns [`SysInfoError::SensorUnavailable`]
/// if the channel reads back its idle/disconnected value.
pub fn cpu_info(sensor: &dyn TempSensor, prev_peak_c: f32) -> Result<CpuInfo, SysInfoError> {
    let raw = sensor.read_raw();
    if raw == SENSOR_UNAVAILABLE_RAW {
        return Err(SysInfoError::SensorUnavailable);
    }
    let celsius = adc_to_celsius(raw);
    Ok(CpuInfo {
        temperature_c: celsius,
        temperature_peak_c: if celsius > prev_peak_c { celsius } else { prev_peak_c },
    })
}

/// `memory_info_t`: the two managed regions' usage, rolled
/// up into totals and a usage percentage — the same shape the supervisor
/// tracks for its own `MEMORY_HIGH` threshold, but addressable on demand
/// rather than only from inside the tick loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemoryInfo {
    pub kernel_used: usize,
    pub kernel_capacity: usize,
    pub interpreter_used: usize,
    pub interpreter_capacity: usize,
    pub total_used: usize,
    pub total_capacity: usize,
    /// Fixed-point percent (hundredths), to keep this struct `Eq`-able;
    /// divide by 100.0 for the human-readable figure.
    pub usage_percent_hundredths: u32,
}

/// Rolls [`MemStats`] into one summary.
/// `kernel_capacity`/`interpreter_capacity` are the
/// regions' compile-time sizes (`KERNEL_SIZE`/`INTERPRETER_SIZE` on
/// [`crate::mem::MemoryManager`]).
pub fn memory_info(stats: MemStats, kernel_capacity: usize, interpreter_capacity: usize) -> MemoryInfo {
    let total_used = stats.kernel.used + stats.interpreter.used;
    let total_capacity = kernel_capacity + interpreter_capacity;
    let usage_percent_hundredths = if total_capacity > 0 {
        (total_used as u64 * 10_000 / total_capacity as u64) as u32
    } else {
        0
    };
    MemoryInfo {
        kernel_used: stats.kernel.used,
        kernel_capacity,
        interpreter_used: stats.interpreter.used,
        interpreter_capacity,
        total_used,
        total_capacity,
        usage_percent_hundredths,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mem::MemoryManager;
    use crate::platform::host::{HostClock, HostTempSensor};

    #[test]
    fn uptime_breaks_down_days_hours_minutes_seconds() {
        let clock = HostClock::new();
        let two_days = 2 * MS_PER_DAY + 3 * MS_PER_HOUR + 4 * MS_PER_MIN + 5 * MS_PER_SEC;
        clock.set_ms(two_days);
        let info = uptime(&clock, 0);
        assert_eq!(info.days, 2);
        assert_eq!(info.hours, 3);
        assert_eq!(info.minutes, 4);
        assert_eq!(info.seconds, 5);
        assert_eq!(info.uptime_ms, two_days);
    }

    #[test]
    fn uptime_is_relative_to_boot_timestamp() {
        let clock = HostClock::new();
        clock.set_ms(10_000);
        let info = uptime(&clock, 4_000);
        assert_eq!(info.uptime_ms, 6_000);
    }

    #[test]
    fn cpu_info_tracks_peak_across_calls() {
        let sensor = HostTempSensor::default();
        let raw_60 = ((60.0f32 - 27.0) * -0.001721 + 0.706) / (3.3 / 4096.0);
        sensor.set_raw(raw_60 as u16);
        let info = cpu_info(&sensor, 0.0).unwrap();
        assert!(info.temperature_peak_c >= 59.0);

        let raw_30 = ((30.0f32 - 27.0) * -0.001721 + 0.706) / (3.3 / 4096.0);
        sensor.set_raw(raw_30 as u16);
        let info2 = cpu_info(&sensor, info.temperature_peak_c).unwrap();
        assert_eq!(info2.temperature_peak_c, info.temperature_peak_c);
        assert!(info2.temperature_c < info2.temperature_peak_c);
    }

    #[test]
    fn cpu_info_reports_sensor_unavailable() {
        let sensor = HostTempSensor::default();
        sensor.set_raw(SENSOR_UNAVAILABLE_RAW);
        assert_eq!(cpu_info(&sensor, 0.0), Err(SysInfoError::SensorUnavailable));
    }

    #[test]
    fn memory_info_sums_both_regions() {
        let mut mem: MemoryManager<1024, 2048> = MemoryManager::new();
        mem.kernel_alloc(64).unwrap();
        mem.interpreter_alloc(128).unwrap();
        let info = memory_info(mem.get_stats(), 1024, 2048);
        assert_eq!(info.kernel_used, 64);
        assert_eq!(info.interpreter_used, 128);
        assert_eq!(info.total_used, 192);
        assert_eq!(info.total_capacity, 3072);
        assert!(info.usage_percent_hundredths > 0);
    }

    #[test]
    fn memory_info_zero_capacity_does_not_divide_by_zero() {
        let info = memory_info(MemStats::default(), 0, 0);
        assert_eq!(info.usage_percent_hundredths, 0);
    }
}
