/* Copyright (c) 2018-2023 Jeremy Davis (jeremydavis519@gmail.com)
 *
 * Permission is hereby granted, free of charge, to any person obtaining a copy of this software
 * and associated documentation files (the "Software"), to deal in the Software without restriction,
 * including without limitation the rights to use, copy, modify, merge, publish, distribute,
 * sublicense, and/or sell copies of the Software, and to permit persons to whom the Software is
 * furnished to do so, subject to the following conditions:
 *
 * The above copyright notice and this permission notice shall be included in all copies or
 * substantial portions of the Software.
 *
 * THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR IMPLIED, INCLUDING BUT
 * NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
 * NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM,
 * DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
 * OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.
 */

//! A minimal logging sink. The console itself is one of the collaborators this kernel doesn't
//! implement (see `collab::console`); this module only owns the handful of macros the rest of the
//! kernel uses to talk to it, plus the indirection that lets a test harness capture what would
//! otherwise go to the screen.

use core::fmt;
use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, Ordering};

/// Anything that can receive formatted kernel log output.
pub trait Sink: Sync {
    /// Writes a string to the sink. Must not panic or allocate.
    fn write_str(&self, s: &str);
}

struct SinkSlot {
    sink: UnsafeCell<Option<&'static dyn Sink>>,
    set: AtomicBool
}
unsafe impl Sync for SinkSlot {}

static SINK: SinkSlot = SinkSlot { sink: UnsafeCell::new(None), set: AtomicBool::new(false) };

/// Registers the sink that `print!`/`printdebug!` write to. Intended to be called once, early in
/// boot (or once per test, for a capturing sink).
///
/// # Safety
/// Must not be called concurrently with another call to `set_sink` or with `_print`.
pub unsafe fn set_sink(sink: &'static dyn Sink) {
    *SINK.sink.get() = Some(sink);
    SINK.set.store(true, Ordering::Release);
}

#[doc(hidden)]
pub fn _print(args: fmt::Arguments) {
    if SINK.set.load(Ordering::Acquire) {
        if let Some(sink) = unsafe { *SINK.sink.get() } {
            struct Adapter<'a>(&'a dyn Sink);
            impl fmt::Write for Adapter<'_> {
                fn write_str(&mut self, s: &str) -> fmt::Result {
                    self.0.write_str(s);
                    Ok(())
                }
            }
            let _ = fmt::Write::write_fmt(&mut Adapter(sink), args);
        }
    }
}

/// Writes formatted text to the registered log sink, if any. A no-op if no sink has been set.
#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => { $crate::log::_print(format_args!($($arg)*)) };
}

/// Writes formatted text followed by a newline to the registered log sink, if any.
#[macro_export]
macro_rules! println {
    () => { $crate::print!("\n") };
    ($fmt:expr) => { $crate::print!(concat!($fmt, "\n")) };
    ($fmt:expr, $($arg:tt)*) => { $crate::print!(concat!($fmt, "\n"), $($arg)*) };
}

/// Like `print!`, but compiled out entirely in release builds. Any side effects in the arguments
/// still happen in release mode--only the formatting and write are skipped.
#[macro_export]
macro_rules! printdebug {
    ($($fmt:expr)?) => {
        #[cfg(debug_assertions)] $crate::print!($($fmt)?);
        #[cfg(not(debug_assertions))] { $($fmt;)? }
    };
    ($fmt:expr $(, $arg:expr)+) => {
        #[cfg(debug_assertions)] $crate::print!($fmt $(, $arg)+);
        #[cfg(not(debug_assertions))] { $($arg;)+ }
    };
}

/// Like `println!`, but compiled out entirely in release builds.
#[macro_export]
macro_rules! printlndebug {
    ($($fmt:expr)?) => { $crate::printdebug!(concat!($($fmt,)? "\n")) };
    ($fmt:expr $(, $arg:expr)+) => { $crate::printdebug!(concat!($fmt, "\n") $(, $arg)+) };
}
