/* Copyright (c) 2017-2023 Jeremy Davis (jeremydavis519@gmail.com)
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

//! An extremely barebones implementation of some of `std::error` from the Rust standard library,
//! plus the `unreachable_debug!` macro used throughout the kernel to mark invariants that the
//! caller has already proven, while still panicking loudly in debug builds if the proof was wrong.

use core::fmt::{Debug, Display};

/// Base functionality for all errors in this kernel.
pub trait Error: Debug + Display {
    /// Indicates the error that led to this one, if any.
    fn source(&self) -> Option<&'static dyn Error> {
        None
    }
}

/// Marks a branch as unreachable, given a proof (a string describing why). In debug builds, this
/// panics with the proof attached if it's ever actually reached, so a flawed proof is caught during
/// testing; in release builds it compiles down to `core::hint::unreachable_unchecked`.
///
/// # Safety
/// Reaching this macro when the given proof does not actually hold is undefined behavior in
/// release builds. Only use it where the caller can show the branch is truly dead.
#[macro_export]
macro_rules! unreachable_debug {
    ( $proof:expr ) => {
        {
            #[cfg(debug_assertions)] {
                #[inline(always)]
                unsafe fn unreachable() -> ! {
                    unreachable!("flawed proof of unreachability: `{}`", $proof)
                }
                unreachable()
            }

            #[cfg(not(debug_assertions))] {
                core::hint::unreachable_unchecked()
            }
        }
    };
}
