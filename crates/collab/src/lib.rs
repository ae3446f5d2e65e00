/* Copyright (c) 2023 Jeremy Davis (jeremydavis519@gmail.com)
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

//! The narrow interfaces spec.md §6 assumes are given by the rest of the kernel: the page-directory
//! hardware interface, the raw physical-page allocator, the swap block device, and the kernel
//! command line. None of these is this crate's problem to implement for real hardware--that's the
//! ELF loader's, the MMU driver's, and the block-device driver's job, all out of scope per spec.md
//! §1. What this crate owns is the *shape* of those collaborators (a trait per interface) plus a
//! simulation-backed implementation of each, so the `vm` and `scheduler` crates can be built and
//! tested against something concrete instead of an unimplemented trait object.
//!
//! The simulation backends are deliberately simple (linear scans, a `BTreeMap` standing in for a
//! page table) rather than fast--exactly the tradeoff the teacher's own `self-test` feature makes
//! when it substitutes software timers for hardware ones.

#![cfg_attr(not(test), no_std)]

#![deny(warnings, missing_docs)]

extern crate alloc;

#[macro_use] extern crate bitflags;

pub mod block;
pub mod cmdline;
pub mod pagedir;
pub mod palloc;

pub use block::BlockDevice;
pub use pagedir::PageDirectory;
pub use palloc::PageAllocator;
