//! The kernel-wide `debug!` logging facility.
//!
//! Chip drivers format diagnostic messages through this macro the same way
//! they would call into `log` on a hosted target; on an embedded target
//! there is no stdout, so instead the formatted line is handed to whatever
//! `DebugWriter` the board registered at startup (typically a UART). With
//! no writer registered, `debug!` is a no-op — chip drivers must not depend
//! on it for correctness, only for post-mortem visibility.

use crate::common::cells::OptionalCell;

pub trait DebugWriter {
    fn write_str(&self, s: &str);
}

static DEBUG_WRITER: OptionalCell<&'static dyn DebugWriter> = OptionalCell::empty();

/// Registers the board's debug sink. Call once during board bring-up.
pub fn set_debug_writer(writer: &'static dyn DebugWriter) {
    DEBUG_WRITER.set(writer);
}

#[doc(hidden)]
pub fn __debug_write_fmt(args: core::fmt::Arguments) {
    DEBUG_WRITER.map(|writer| {
        // no_std: format into a small stack buffer rather than allocating.
        use core::fmt::Write;
        struct Sink<'a>(&'a dyn DebugWriter);
        impl<'a> Write for Sink<'a> {
            fn write_str(&mut self, s: &str) -> core::fmt::Result {
                self.0.write_str(s);
                Ok(())
            }
        }
        let _ = write!(Sink(*writer), "{}", args);
    });
}

#[macro_export]
macro_rules! debug {
    ($msg:expr) => {
        $crate::debug::__debug_write_fmt(format_args!(concat!($msg, "\n")))
    };
    ($fmt:expr, $($arg:tt)+) => {
        $crate::debug::__debug_write_fmt(format_args!(concat!($fmt, "\n"), $($arg)+))
    };
}
