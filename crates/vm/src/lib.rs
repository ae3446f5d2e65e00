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

//! The virtual-memory layer (spec.md §4.5-§4.7): a frame table mapping physical user-pool pages to
//! their owners, a swap manager that ferries evicted pages to and from a block device, and the
//! per-process bookkeeping (stack growth, mmap, address classification) that ties the two together
//! behind a page-fault handler.
//!
//! None of this crate touches real memory or a real MMU. It's built against the `collab` crate's
//! `PageAllocator`/`PageDirectory`/`BlockDevice` traits, the same way the scheduler core is built
//! against `ContextSwitch`: the frame table and swap manager are the actual subject under test, and
//! the hardware they'd normally sit on top of is supplied by whatever implements those traits.

#![cfg_attr(not(test), no_std)]

#![deny(warnings, missing_docs)]

extern crate alloc;

pub mod frame;
pub mod swap;
pub mod pager;

pub use frame::FrameTable;
pub use pager::{Vm, VmError};
pub use swap::SwapTable;

/// The page size assumed throughout the core, matching Pintos's `PGSIZE`.
pub const PGSIZE: usize = 4096;

/// The virtual address at which a process's address space ends and the kernel's begins, matching
/// Pintos's `PHYS_BASE`. The user stack grows down from just below this address.
pub const PHYS_BASE: usize = 0xc000_0000;

/// The maximum number of demand-paged stack pages a single process may accumulate (spec.md §6).
pub const MAX_STACK_PAGES: usize = 32;
