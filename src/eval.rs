//! Eval bridge: a façade onto a scripting evaluator the kernel drives but
//! does not own. The hard engineering of littleOS lives in the other
//! kernel subsystems; this module's whole job
//! is wiring an opaque evaluator into them safely — periodic heartbeats so
//! a long-running script doesn't trip the core-0-hung detector, watchdog
//! feeds so it doesn't trip the hardware countdown, and a cooperative
//! timeout enforced at statement boundaries.
//!
//! Built on the same borrowed-trait-object shape as [`crate::watchdog::Watchdog`]
//! and [`crate::supervisor::Supervisor`]: the bridge holds a clock
//! reference and drives calls into whatever [`ScriptEngine`] the caller
//! installs, rather than owning or re-implementing an interpreter.

use crate::err::EvalError;
use crate::platform::Clock;
use crate::supervisor::Supervisor;

/// Default per-evaluation timeout.
pub const DEFAULT_TIMEOUT_MS: u32 = 5_000;

/// How often the bridge re-feeds the supervisor while parsing/executing is
/// in progress, independent of statement boundaries.
const HEARTBEAT_TICK_MS: u64 = 250;

/// `eval_result_t`. `Ok` on success; every other variant is
/// returned verbatim from [`ScriptEngine`] or synthesised by the bridge
/// itself (`Unsupported` when no engine is installed).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalOutcome {
    Ok,
    ParseError,
    RuntimeError,
    TimeoutError,
    OutOfMemory,
    IoError,
    Unsupported,
}

impl From<EvalOutcome> for EvalError {
    fn from(outcome: EvalOutcome) -> Self {
        match outcome {
            EvalOutcome::Ok => EvalError::RuntimeError, // callers never convert `Ok`
            EvalOutcome::ParseError => EvalError::ParseError,
            EvalOutcome::RuntimeError => EvalError::RuntimeError,
            EvalOutcome::TimeoutError => EvalError::TimeoutError,
            EvalOutcome::OutOfMemory => EvalError::OutOfMemory,
            EvalOutcome::IoError => EvalError::IoError,
            EvalOutcome::Unsupported => EvalError::Unsupported,
        }
    }
}

/// `get_memory_stats(ctx)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EvalMemoryStats {
    pub bytes: usize,
    pub object_count: u32,
}

/// The collaborator contract a concrete scripting evaluator implements to
/// be driven by the eval bridge. Deliberately opaque to the rest of the
/// kernel: the bridge
/// never inspects an AST or a value, only statement counts and outcomes.
///
/// Parsing is split from execution, and execution is split per top-level
/// statement, so the bridge can interleave heartbeats and a timeout check
/// between statements.
pub trait ScriptEngine {
    /// Parses `source`, returning the number of top-level statements found.
    fn parse(&mut self, source: &str) -> Result<usize, EvalOutcome>;
    /// Executes the `index`-th top-level statement from the most recent
    /// successful `parse` call (0-based).
    fn exec_statement(&mut self, index: usize) -> Result<(), EvalOutcome>;
    /// Text of the most recent parse/runtime error, for `get_error`.
    fn last_error(&self) -> &str;
    /// Current memory footprint, for `get_memory_stats`.
    fn memory_stats(&self) -> EvalMemoryStats;
}

/// The eval bridge. Generic over the installed engine type,
/// the same way [`crate::watchdog::Watchdog`] is generic over borrowed
/// platform traits rather than using a trait object for its one concrete
/// caller.
pub struct EvalBridge<'a, E: ScriptEngine> {
    clock: &'a dyn Clock,
    engine: Option<E>,
    timeout_ms: u32,
}

impl<'a, E: ScriptEngine> EvalBridge<'a, E> {
    pub fn new(clock: &'a dyn Clock) -> Self {
        Self {
            clock,
            engine: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    /// Installs `engine` as the active context. Returns
    /// `false` ("null") if a context is already installed — `cleanup`
    /// must run first; only one context is live at a time.
    pub fn init(&mut self, engine: E) -> bool {
        if self.engine.is_some() {
            return false;
        }
        self.engine = Some(engine);
        true
    }

    /// `eval_cleanup(ctx)`: releases the installed engine.
    pub fn cleanup(&mut self) {
        self.engine = None;
    }

    pub fn is_initialized(&self) -> bool {
        self.engine.is_some()
    }

    pub fn set_execution_timeout(&mut self, timeout_ms: u32) {
        self.timeout_ms = timeout_ms;
    }

    pub fn get_execution_timeout(&self) -> u32 {
        self.timeout_ms
    }

    /// `eval_get_error(ctx)`. Empty string when no context is installed.
    pub fn get_error(&self) -> &str {
        self.engine.as_ref().map(ScriptEngine::last_error).unwrap_or("")
    }

    pub fn get_memory_stats(&self) -> EvalMemoryStats {
        self.engine.as_ref().map(ScriptEngine::memory_stats).unwrap_or_default()
    }

    /// `eval_string(ctx, source, len)`: parses `source`,
    /// then executes each top-level statement in order, heartbeating the
    /// supervisor before and after parsing and before and after every
    /// statement, and aborting with `TimeoutError` if the configured
    /// timeout has elapsed by a statement boundary.
    ///
    /// The "250 ms timer" heartbeat is a periodic backstop
    /// for scripts whose statements are many and cheap; since the engine
    /// is opaque and cannot be interrupted mid-statement, a single
    /// pathologically long statement is only caught at its own boundary —
    /// a limit inherent to any cooperative, non-preemptive evaluator.
    pub fn eval_string(&mut self, source: &str, supervisor: &mut Supervisor) -> EvalOutcome {
        let Some(engine) = self.engine.as_mut() else {
            return EvalOutcome::Unsupported;
        };

        let start_ms = self.clock.now_ms();
        let mut last_tick_ms = start_ms;
        let _ = supervisor.heartbeat(start_ms);

        let stmt_count = match engine.parse(source) {
            Ok(n) => n,
            Err(outcome) => {
                let _ = supervisor.heartbeat(self.clock.now_ms());
                return outcome;
            }
        };

        let after_parse_ms = self.clock.now_ms();
        let _ = supervisor.heartbeat(after_parse_ms);
        last_tick_ms = after_parse_ms;

        for index in 0..stmt_count {
            let now_ms = self.clock.now_ms();
            if now_ms.saturating_sub(start_ms) > self.timeout_ms as u64 {
                let _ = supervisor.heartbeat(now_ms);
                return EvalOutcome::TimeoutError;
            }
            let _ = supervisor.heartbeat(now_ms);

            let result = engine.exec_statement(index);

            let after_ms = self.clock.now_ms();
            if after_ms.saturating_sub(last_tick_ms) >= HEARTBEAT_TICK_MS {
                last_tick_ms = after_ms;
            }
            let _ = supervisor.heartbeat(after_ms);

            if let Err(outcome) = result {
                return outcome;
            }
        }

        EvalOutcome::Ok
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::platform::host::{HostClock, HostTempSensor, HostWatchdog};
    use std::vec::Vec;

    /// Deterministic `ScriptEngine` double: `source` is a `;`-separated
    /// list of directives (`"ok"`, `"err:<variant>"`, `"sleep:<ms>"`)
    /// executed one per top-level statement. Advances the shared clock by
    /// `sleep:<ms>` to exercise the bridge's timeout/heartbeat plumbing
    /// deterministically.
    struct MockEngine<'a> {
        clock: &'a HostClock,
        statements: Vec<&'static str>,
        error: &'static str,
    }

    impl<'a> MockEngine<'a> {
        fn new(clock: &'a HostClock) -> Self {
            Self {
                clock,
                statements: Vec::new(),
                error: "",
            }
        }
    }

    impl<'a> ScriptEngine for MockEngine<'a> {
        fn parse(&mut self, source: &str) -> Result<usize, EvalOutcome> {
            if source == "bad syntax" {
                self.error = "unexpected token";
                return Err(EvalOutcome::ParseError);
            }
            self.statements = source.split(';').filter(|s| !s.is_empty()).collect();
            Ok(self.statements.len())
        }

        fn exec_statement(&mut self, index: usize) -> Result<(), EvalOutcome> {
            let stmt = self.statements[index];
            if let Some(ms) = stmt.strip_prefix("sleep:") {
                self.clock.advance_ms(ms.parse().unwrap());
                return Ok(());
            }
            if stmt == "err:runtime" {
                self.error = "division by zero";
                return Err(EvalOutcome::RuntimeError);
            }
            Ok(())
        }

        fn last_error(&self) -> &str {
            self.error
        }

        fn memory_stats(&self) -> EvalMemoryStats {
            EvalMemoryStats {
                bytes: self.statements.len() * 32,
                object_count: self.statements.len() as u32,
            }
        }
    }

    fn supervisor<'a>(clock: &'a HostClock, temp: &'a HostTempSensor, hw: &'a HostWatchdog) -> Supervisor<'a> {
        let mut sup = Supervisor::new(clock, temp, hw, 64 * 1024, false);
        sup.init(clock.now_ms(), 1000).unwrap();
        sup
    }

    #[test]
    fn init_then_init_again_fails_until_cleanup() {
        let clock = HostClock::new();
        let mut bridge: EvalBridge<MockEngine> = EvalBridge::new(&clock);
        assert!(bridge.init(MockEngine::new(&clock)));
        assert!(!bridge.init(MockEngine::new(&clock)));
        bridge.cleanup();
        assert!(bridge.init(MockEngine::new(&clock)));
    }

    #[test]
    fn eval_without_init_returns_unsupported() {
        let clock = HostClock::new();
        let temp = HostTempSensor::default();
        let hw = HostWatchdog::default();
        let mut sup = supervisor(&clock, &temp, &hw);
        let mut bridge: EvalBridge<MockEngine> = EvalBridge::new(&clock);
        assert_eq!(bridge.eval_string("ok", &mut sup), EvalOutcome::Unsupported);
    }

    #[test]
    fn successful_eval_heartbeats_and_returns_ok() {
        let clock = HostClock::new();
        let temp = HostTempSensor::default();
        let hw = HostWatchdog::default();
        let mut sup = supervisor(&clock, &temp, &hw);
        let mut bridge = EvalBridge::new(&clock);
        bridge.init(MockEngine::new(&clock));

        let before_feeds = sup.metrics().watchdog_feed_count;
        let outcome = bridge.eval_string("ok;ok;ok", &mut sup);
        assert_eq!(outcome, EvalOutcome::Ok);
        assert!(sup.metrics().watchdog_feed_count > before_feeds);
        assert_eq!(bridge.get_memory_stats().object_count, 3);
    }

    #[test]
    fn parse_error_surfaces_engine_text_via_get_error() {
        let clock = HostClock::new();
        let temp = HostTempSensor::default();
        let hw = HostWatchdog::default();
        let mut sup = supervisor(&clock, &temp, &hw);
        let mut bridge = EvalBridge::new(&clock);
        bridge.init(MockEngine::new(&clock));

        let outcome = bridge.eval_string("bad syntax", &mut sup);
        assert_eq!(outcome, EvalOutcome::ParseError);
        assert_eq!(bridge.get_error(), "unexpected token");
    }

    #[test]
    fn runtime_error_statement_stops_the_loop() {
        let clock = HostClock::new();
        let temp = HostTempSensor::default();
        let hw = HostWatchdog::default();
        let mut sup = supervisor(&clock, &temp, &hw);
        let mut bridge = EvalBridge::new(&clock);
        bridge.init(MockEngine::new(&clock));

        let outcome = bridge.eval_string("ok;err:runtime;ok", &mut sup);
        assert_eq!(outcome, EvalOutcome::RuntimeError);
        assert_eq!(bridge.get_error(), "division by zero");
    }

    #[test]
    fn long_running_script_times_out_at_a_statement_boundary() {
        let clock = HostClock::new();
        let temp = HostTempSensor::default();
        let hw = HostWatchdog::default();
        let mut sup = supervisor(&clock, &temp, &hw);
        let mut bridge = EvalBridge::new(&clock);
        bridge.set_execution_timeout(100);
        bridge.init(MockEngine::new(&clock));

        let outcome = bridge.eval_string("sleep:50;sleep:50;sleep:50;ok", &mut sup);
        assert_eq!(outcome, EvalOutcome::TimeoutError);
    }

    #[test]
    fn default_timeout_is_generous_enough_for_quick_scripts() {
        let clock = HostClock::new();
        let temp = HostTempSensor::default();
        let hw = HostWatchdog::default();
        let mut sup = supervisor(&clock, &temp, &hw);
        let mut bridge: EvalBridge<MockEngine> = EvalBridge::new(&clock);
        assert_eq!(bridge.get_execution_timeout(), DEFAULT_TIMEOUT_MS);
        bridge.init(MockEngine::new(&clock));
        assert_eq!(bridge.eval_string("ok", &mut sup), EvalOutcome::Ok);
    }

    #[test]
    fn eval_outcome_converts_to_eval_error() {
        assert_eq!(EvalError::from(EvalOutcome::TimeoutError), EvalError::TimeoutError);
        assert_eq!(EvalError::from(EvalOutcome::Unsupported), EvalError::Unsupported);
    }
}
