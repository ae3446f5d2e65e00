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

//! Semaphores and locks that cooperate with the scheduler to block threads and, for locks, donate
//! priority (spec.md §4.4). This is a different animal from the teacher's own `locks` crate: that
//! one is a spinning, non-blocking mutex meant for code with somewhere else to be while it waits.
//! These types are the opposite--built for exactly the call sites that are supposed to suspend the
//! calling thread--so they're grounded on the teacher's RAII-guard shape (construct, deref, drop to
//! release) but rewritten around `scheduler::Scheduler` rather than a spinning `AtomicBool`.
//!
//! Every operation here takes `&mut Scheduler` and `&mut dyn ContextSwitch` explicitly rather than
//! reaching for an ambient global, for the same reason `scheduler` itself does (see that crate's
//! module docs): there is exactly one scheduler per kernel, but threading it through arguments
//! keeps ownership unambiguous and lets tests construct a fresh one per case.

#![no_std]

#![deny(warnings, missing_docs)]

pub mod lock;
pub mod semaphore;

pub use lock::Lock;
pub use semaphore::Semaphore;
