//! Crate-wide error taxonomy.
//!
//! Every error type defined by a kernel subsystem implements [`BaseError`],
//! the same shared marker the rest of the crate's fallible APIs are built
//! around. `CanFail<T>` and `GenericError` exist for operations that either
//! succeed with no payload or fail with a specific / opaque error.

use core::fmt::Debug;

/// Implemented by every error type in littleOS.
///
/// Errors are plain data (`Copy`-friendly enums, no backtraces, no heap in
/// the common case) since the kernel runs without an allocator available at
/// every call site.
pub trait BaseError: Debug {}

/// Return type for operations that either succeed with nothing to report,
/// or fail with a specific error.
pub type CanFail<T> = Result<(), T>;

/// Return type for operations with no crate-specific error kind of their
/// own (init-time checks, feature probes).
pub type GenericError = Result<(), ()>;

/// Errors from the segmented memory manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemError {
    /// The region has no more room for this allocation.
    OutOfMemory,
    /// `count * size` overflowed computing a zeroed allocation's byte size.
    SizeOverflow,
    /// Stack pointer has crossed the interpreter region's bump pointer.
    StackCollision,
}

impl BaseError for MemError {}

/// Errors from the task table & scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedError {
    /// The task table has no free descriptor slots.
    TableFull,
    /// `entry` was null / the provided id does not name a live task.
    InvalidTask,
}

impl BaseError for SchedError {}

/// Errors from the watchdog façade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogError {
    /// Requested timeout is outside `[1, 8388]` ms after clamping logic
    /// could not make sense of it (only reachable for degenerate inputs
    /// such as 0 combined with a platform that rejects clamped values).
    InvalidTimeout,
    /// `feed`/`disable` called before `init`.
    Uninitialized,
}

impl BaseError for WatchdogError {}

/// Errors from the log-structured filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    NoSpace,
    NotFound,
    Exists,
    InvalidInode,
    InvalidBlock,
    Io,
    NotDirectory,
    PermissionDenied,
    Corrupted,
    InvalidArg,
    Unsupported,
}

impl BaseError for FsError {}

/// Errors from the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorError {
    /// `stop`/`heartbeat`/`report_memory` called before `init`.
    NotRunning,
    /// `init` called while already running.
    AlreadyRunning,
}

impl BaseError for SupervisorError {}

/// Errors from the persistent K/V config store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KvError {
    NotFound,
    Full,
    InvalidKey,
    InvalidValue,
    Flash,
    Corrupt,
}

impl BaseError for KvError {}

/// Errors from the eval bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalError {
    ParseError,
    RuntimeError,
    TimeoutError,
    OutOfMemory,
    IoError,
    Unsupported,
}

impl BaseError for EvalError {}

/// Errors from system info & fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SysInfoError {
    SensorUnavailable,
}

impl BaseError for SysInfoError {}
