//! Kernel logging.
//!
//! The kernel has no VGA text buffer to print into; instead, log output is
//! routed through whatever [`crate::platform::LogSink`] the platform layer
//! installs (typically a UART). `kprintln!`/`kprint!` mirror the shape of a
//! classic freestanding `println!`: they format into the sink while holding
//! its lock for the duration of the write, and are no-ops (silently
//! dropping the message) if no sink has been installed yet.

use core::fmt::Write;
use spin::Mutex;

use crate::platform::LogSink;

struct NullSink;

impl Write for NullSink {
    fn write_str(&mut self, _s: &str) -> core::fmt::Result {
        Ok(())
    }
}

static SINK: Mutex<Option<&'static mut dyn LogSink>> = Mutex::new(None);

/// Installs the platform log sink. Must be called once, early in boot;
/// logging before this call is a silent no-op.
pub fn install_sink(sink: &'static mut dyn LogSink) {
    *SINK.lock() = Some(sink);
}

#[doc(hidden)]
pub fn arg_print(args: core::fmt::Arguments) {
    let mut guard = SINK.lock();
    if let Some(sink) = guard.as_mut() {
        let _ = sink.write_fmt(args);
    }
}

/// Prints to the installed log sink, with a trailing newline.
#[macro_export]
macro_rules! kprintln {
    () => {
        $crate::klog::arg_print(format_args!("\n"))
    };
    ($($arg: tt)*) => {
        $crate::klog::arg_print(format_args!("{}\n", format_args!($($arg)*)))
    };
}

/// Prints an informational message, tagged `[info]`.
#[macro_export]
macro_rules! kinfo {
    ($($arg: tt)*) => {
        $crate::kprintln!("[info] {}", format_args!($($arg)*))
    };
}

/// Prints a warning message, tagged `[warn]`.
#[macro_export]
macro_rules! kwarn {
    ($($arg: tt)*) => {
        $crate::kprintln!("[warn] {}", format_args!($($arg)*))
    };
}

/// Prints an error message, tagged `[error]`.
#[macro_export]
macro_rules! kerror {
    ($($arg: tt)*) => {
        $crate::kprintln!("[error] {}", format_args!($($arg)*))
    };
}

#[cfg(test)]
mod test {
    use super::*;
    use std::boxed::Box;
    use std::string::String;
    use std::sync::Mutex as StdMutex;

    struct RecordingSink(&'static StdMutex<String>);

    impl Write for RecordingSink {
        fn write_str(&mut self, s: &str) -> core::fmt::Result {
            self.0.lock().unwrap().push_str(s);
            Ok(())
        }
    }

    impl LogSink for RecordingSink {}

    lazy_static::lazy_static! {
        static ref BUF: StdMutex<String> = StdMutex::new(String::new());
    }

    #[test]
    fn kprintln_writes_through_installed_sink() {
        BUF.lock().unwrap().clear();
        let sink: &'static mut RecordingSink = Box::leak(Box::new(RecordingSink(&BUF)));
        install_sink(sink);
        kprintln!("value = {}", 42);
        assert_eq!(BUF.lock().unwrap().as_str(), "value = 42\n");
    }
}
