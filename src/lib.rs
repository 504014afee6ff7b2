#![allow(clippy::mut_from_ref)]
#![no_std]

#[cfg(any(feature = "std", test))]
extern crate std;

#[cfg(feature = "alloc")]
extern crate alloc;

#[macro_use]
pub mod klog;

pub mod err;
pub mod eval;
pub mod fs;
pub mod kv;
pub mod mem;
pub mod platform;
pub mod sched;
pub mod security;
pub mod supervisor;
pub mod sysinfo;
pub mod time;
pub mod watchdog;

pub use err::{BaseError, CanFail, GenericError};
