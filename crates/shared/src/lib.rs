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

//! This crate defines helper functions, macros, and types for the rest of the kernel. It's
//! basically a stripped-down and specialized kind of standard library: error handling (`error`),
//! a debug-log sink (`log`), lazily-initialized statics without `std` or `spin` (`once`), and the
//! `ffi_enum!` macro used to give wire/hardware enums a checked integer conversion. As such, it
//! cannot have dependencies on any other crates in the kernel and is therefore pretty
//! self-contained.

#![no_std]

#![deny(warnings, missing_docs)]

extern crate alloc;

pub mod error;
pub mod ffi;
pub mod log;
#[macro_use] pub mod once;

lazy_static! {
    unsafe {
        /// The current version of the kernel (defined in Cargo.toml)
        pub static ref KERNEL_VERSION: Option<&'static str> = option_env!("CARGO_PKG_VERSION");
        /// The homepage for the kernel's documentation (defined in Cargo.toml)
        pub static ref KERNEL_HOMEPAGE: Option<&'static str> = option_env!("CARGO_PKG_HOMEPAGE");
    }
}
