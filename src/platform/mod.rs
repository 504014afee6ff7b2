//! The platform-services seam: every primitive the core
//! kernel subsystems consume from the concrete hardware, expressed as
//! traits so the rest of the crate never pokes a register directly.
//!
//! This mirrors the `DiskDevice`-style pattern used elsewhere in the
//! crate: a trait describing the standard operations, implemented once per
//! physical backend. Here the "physical backend" is the MCU itself; the
//! `host` submodule supplies a test double so every subsystem above this
//! seam can be exercised without hardware.

#[cfg(any(feature = "std", test))]
pub mod host;

use core::fmt::Write;

/// A 64-bit monotonic millisecond clock, readable from either core.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Single ADC channel dedicated to on-die temperature sensing.
pub trait TempSensor: Send + Sync {
    /// Raw 12-bit ADC sample.
    fn read_raw(&self) -> u16;
}

/// Converts a 12-bit ADC sample into degrees Celsius using the standard
/// on-die sensor conversion: `voltage = raw * 3.3 / 4096`,
/// `celsius = 27.0 - (voltage - 0.706) / -0.001721`.
pub fn adc_to_celsius(raw: u16) -> f32 {
    let voltage = raw as f32 * (3.3 / 4096.0);
    27.0 - (voltage - 0.706) / -0.001721
}

/// Hardware watchdog countdown. The countdown itself cannot be stopped once
/// armed; `disable` only stops the façade from feeding it promptly.
pub trait WatchdogHardware: Send + Sync {
    /// Arms (or re-arms) the countdown for `timeout_ms`.
    fn arm(&self, timeout_ms: u32);
    /// Kicks the countdown, restarting it from `timeout_ms`.
    fn kick(&self);
    /// True if the previous boot ended because this watchdog fired.
    fn caused_reboot(&self) -> bool;
    /// Arms for `delay_ms` and never returns control to the caller.
    fn force_reset(&self, delay_ms: u32) -> !;
}

/// Inter-core FIFO, 8 entries deep.
pub trait CoreFifo: Send + Sync {
    /// Blocks until space is available, then pushes.
    fn push_blocking(&self, value: u32);
    /// Pushes if space is available within `timeout_ms`, else returns `false`.
    fn try_push(&self, value: u32, timeout_ms: u32) -> bool;
    /// Blocks until an entry is available, then pops it.
    fn pop_blocking(&self) -> u32;
    /// Returns the next entry without removing it, if any.
    fn peek(&self) -> Option<u32>;
}

/// Flash sector erase/program primitives for the K/V store.
pub trait FlashProgrammer: Send + Sync {
    fn sector_size(&self) -> usize;
    /// Erases the sector containing `offset`.
    fn erase_sector(&self, offset: usize);
    /// Programs `data` at `offset`. Caller disables interrupts around the
    /// erase+program pair via [`FlashProgrammer::with_interrupts_disabled`].
    fn program(&self, offset: usize, data: &[u8]);
    /// Reads `len` bytes back from `offset` (memory-mapped flash read).
    fn read(&self, offset: usize, len: usize, out: &mut [u8]);
    /// Runs `f` with interrupts disabled, restoring them afterward.
    fn with_interrupts_disabled(&self, f: &mut dyn FnMut());
}

/// Spawns a function on core 1, and can reset it.
pub trait CoreLauncher: Send + Sync {
    fn launch_core1(&self, entry: fn());
    fn reset_core1(&self);
}

/// Current stack pointer probe, used by the memory manager's collision
/// check.
pub trait StackProbe: Send + Sync {
    /// Current stack pointer value, as a byte address.
    fn current_sp(&self) -> usize;
}

/// A destination for kernel log output. Implementations typically wrap a
/// UART; `core::fmt::Write` gives them `write_fmt` for free.
pub trait LogSink: Write + Send {}
