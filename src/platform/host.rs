//! Host-side test doubles for the platform traits, used by the crate's own
//! test suite and available to any downstream consumer that wants to run
//! the kernel subsystems off-target.

use super::{Clock, CoreFifo, CoreLauncher, FlashProgrammer, StackProbe, TempSensor, WatchdogHardware};
use std::sync::atomic::{AtomicU16, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Instant;
use std::vec;
use std::vec::Vec;

/// Monotonic clock backed by `std::time::Instant`.
pub struct HostClock {
    start: Instant,
    /// Optional override, set by tests that want full control over "now".
    override_ms: AtomicU64,
    use_override: std::sync::atomic::AtomicBool,
}

impl Default for HostClock {
    fn default() -> Self {
        Self {
            start: Instant::now(),
            override_ms: AtomicU64::new(0),
            use_override: std::sync::atomic::AtomicBool::new(false),
        }
    }
}

impl HostClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_ms(&self, ms: u64) {
        self.override_ms.store(ms, Ordering::SeqCst);
        self.use_override.store(true, Ordering::SeqCst);
    }

    pub fn advance_ms(&self, delta: u64) {
        self.override_ms.fetch_add(delta, Ordering::SeqCst);
        self.use_override.store(true, Ordering::SeqCst);
    }
}

impl Clock for HostClock {
    fn now_ms(&self) -> u64 {
        if self.use_override.load(Ordering::SeqCst) {
            self.override_ms.load(Ordering::SeqCst)
        } else {
            self.start.elapsed().as_millis() as u64
        }
    }
}

/// Temperature sensor fixed at a settable raw ADC value (default corresponds
/// to ~25C).
pub struct HostTempSensor {
    raw: AtomicU16,
}

impl Default for HostTempSensor {
    fn default() -> Self {
        // Solve adc_to_celsius(raw) == 25.0 for raw.
        let raw = ((25.0f32 - 27.0) * -0.001721 + 0.706) / (3.3 / 4096.0);
        Self {
            raw: AtomicU16::new(raw as u16),
        }
    }
}

impl HostTempSensor {
    pub fn set_raw(&self, raw: u16) {
        self.raw.store(raw, Ordering::SeqCst);
    }
}

impl TempSensor for HostTempSensor {
    fn read_raw(&self) -> u16 {
        self.raw.load(Ordering::SeqCst)
    }
}

/// In-memory watchdog hardware double.
#[derive(Default)]
pub struct HostWatchdog {
    caused_reboot: std::sync::atomic::AtomicBool,
}

impl HostWatchdog {
    pub fn set_caused_reboot(&self, value: bool) {
        self.caused_reboot.store(value, Ordering::SeqCst);
    }
}

impl WatchdogHardware for HostWatchdog {
    fn arm(&self, _timeout_ms: u32) {}
    fn kick(&self) {}
    fn caused_reboot(&self) -> bool {
        self.caused_reboot.load(Ordering::SeqCst)
    }
    fn force_reset(&self, _delay_ms: u32) -> ! {
        panic!("host double: force_reset invoked");
    }
}

/// Bounded 8-entry FIFO double backed by a `Mutex<VecDeque>`.
pub struct HostFifo {
    queue: Mutex<std::collections::VecDeque<u32>>,
}

impl Default for HostFifo {
    fn default() -> Self {
        Self {
            queue: Mutex::new(std::collections::VecDeque::with_capacity(8)),
        }
    }
}

impl CoreFifo for HostFifo {
    fn push_blocking(&self, value: u32) {
        self.queue.lock().unwrap().push_back(value);
    }
    fn try_push(&self, value: u32, _timeout_ms: u32) -> bool {
        let mut q = self.queue.lock().unwrap();
        if q.len() >= 8 {
            return false;
        }
        q.push_back(value);
        true
    }
    fn pop_blocking(&self) -> u32 {
        self.queue.lock().unwrap().pop_front().unwrap_or(0)
    }
    fn peek(&self) -> Option<u32> {
        self.queue.lock().unwrap().front().copied()
    }
}

/// Flash double backed by an in-memory byte vector.
pub struct HostFlash {
    data: Mutex<Vec<u8>>,
    sector_size: usize,
}

impl HostFlash {
    pub fn new(total_size: usize, sector_size: usize) -> Self {
        Self {
            data: Mutex::new(vec![0xFF; total_size]),
            sector_size,
        }
    }
}

impl FlashProgrammer for HostFlash {
    fn sector_size(&self) -> usize {
        self.sector_size
    }
    fn erase_sector(&self, offset: usize) {
        let mut d = self.data.lock().unwrap();
        for b in &mut d[offset..offset + self.sector_size] {
            *b = 0xFF;
        }
    }
    fn program(&self, offset: usize, data: &[u8]) {
        let mut d = self.data.lock().unwrap();
        d[offset..offset + data.len()].copy_from_slice(data);
    }
    fn read(&self, offset: usize, len: usize, out: &mut [u8]) {
        let d = self.data.lock().unwrap();
        out[..len].copy_from_slice(&d[offset..offset + len]);
    }
    fn with_interrupts_disabled(&self, f: &mut dyn FnMut()) {
        f();
    }
}

/// Core launcher double: "core 1" just runs synchronously on the calling
/// thread when launched, which is sufficient for exercising the supervisor
/// loop body in tests.
#[derive(Default)]
pub struct HostCoreLauncher {
    reset_count: AtomicUsize,
}

impl CoreLauncher for HostCoreLauncher {
    fn launch_core1(&self, entry: fn()) {
        entry();
    }
    fn reset_core1(&self) {
        self.reset_count.fetch_add(1, Ordering::SeqCst);
    }
}

/// Stack probe double reporting a settable address, defaulting to a value
/// that never collides.
pub struct HostStackProbe {
    sp: AtomicUsize,
}

impl Default for HostStackProbe {
    fn default() -> Self {
        Self {
            sp: AtomicUsize::new(usize::MAX / 2),
        }
    }
}

impl HostStackProbe {
    pub fn set_sp(&self, sp: usize) {
        self.sp.store(sp, Ordering::SeqCst);
    }
}

impl StackProbe for HostStackProbe {
    fn current_sp(&self) -> usize {
        self.sp.load(Ordering::SeqCst)
    }
}
