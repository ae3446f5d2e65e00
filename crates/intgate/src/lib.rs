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

//! The interrupt gate: the primitive the rest of the kernel uses to mark critical sections.
//!
//! This crate owns exactly the state spec.md §6 calls "the interrupt gate contract": whether
//! interrupts are currently enabled, whether we're inside interrupt-handler context, and a
//! one-shot "yield on return" flag that the timer tick handler sets when it wants the scheduler
//! to run at the next opportunity. Everything here assumes a single CPU (per spec.md's
//! Non-goals), so plain atomics are enough; there is no need for per-CPU state.

#![cfg_attr(not(test), no_std)]

#![deny(warnings, missing_docs)]

use core::sync::atomic::{AtomicBool, Ordering};

static ENABLED: AtomicBool = AtomicBool::new(false);
static IN_INTERRUPT: AtomicBool = AtomicBool::new(false);
static YIELD_ON_RETURN: AtomicBool = AtomicBool::new(false);

/// Whether interrupts are enabled or disabled. Returned by [`disable`] and [`get_level`] so a
/// caller can later restore exactly the level it found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Interrupts may fire and preempt the current thread.
    Enabled,
    /// Interrupts are masked; nothing will preempt the current thread until [`set`] re-enables
    /// them.
    Disabled
}

/// Disables interrupts and returns the level that was in effect beforehand, so it can be restored
/// with [`set`]. Nests correctly: disabling twice and restoring twice leaves interrupts exactly as
/// they were before the first call.
#[inline]
pub fn disable() -> Level {
    let was_enabled = ENABLED.swap(false, Ordering::AcqRel);
    if was_enabled { Level::Enabled } else { Level::Disabled }
}

/// Sets the interrupt level directly. Used to restore a level previously returned by [`disable`]
/// or [`get_level`].
#[inline]
pub fn set(level: Level) {
    ENABLED.store(level == Level::Enabled, Ordering::Release);
}

/// Returns the current interrupt level without changing it.
#[inline]
pub fn get_level() -> Level {
    if ENABLED.load(Ordering::Acquire) { Level::Enabled } else { Level::Disabled }
}

/// An RAII guard that restores the interrupt level that was in effect when it was created.
/// Mirrors the `MutexGuard`/`SemaphoreGuard` pattern used by the `sync` crate: construct it with
/// [`disable_guarded`], and interrupts come back exactly as they were when the guard drops.
#[must_use = "the interrupt level is restored only when this guard is dropped"]
pub struct Guard {
    prior: Level
}

/// Disables interrupts and returns a guard that restores the prior level on drop. This is the
/// preferred way to protect a critical section, since it can't be forgotten the way a bare
/// `disable`/`set` pair could be if a function returns early.
#[inline]
pub fn disable_guarded() -> Guard {
    Guard { prior: disable() }
}

impl Drop for Guard {
    fn drop(&mut self) {
        set(self.prior);
    }
}

/// Returns `true` if we are currently executing in interrupt-handler context (i.e. somewhere
/// between [`enter_interrupt_context`] and [`leave_interrupt_context`]).
#[inline]
pub fn in_interrupt_context() -> bool {
    IN_INTERRUPT.load(Ordering::Acquire)
}

/// Marks the start of interrupt-handler context. Interrupts are necessarily disabled already (the
/// CPU does that on interrupt entry); this just lets the rest of the kernel know it's running on
/// behalf of an interrupt, which changes a few rules (e.g. `thread_yield` must not be called
/// directly--see spec.md §4.3's tick handler, which sets `yield_on_return` instead).
///
/// # Safety
/// Must be paired with exactly one call to [`leave_interrupt_context`] before interrupts are
/// re-enabled.
pub unsafe fn enter_interrupt_context() {
    IN_INTERRUPT.store(true, Ordering::Release);
}

/// Marks the end of interrupt-handler context. See [`enter_interrupt_context`].
///
/// # Safety
/// Must only be called once per matching [`enter_interrupt_context`] call.
pub unsafe fn leave_interrupt_context() {
    IN_INTERRUPT.store(false, Ordering::Release);
}

/// Requests that the scheduler run as soon as the current interrupt handler returns, instead of
/// resuming whatever it interrupted. Used by the timer tick handler when a thread's time slice has
/// expired (spec.md §4.3, step 2).
#[inline]
pub fn request_yield_on_return() {
    YIELD_ON_RETURN.store(true, Ordering::Release);
}

/// Returns whether a yield was requested by [`request_yield_on_return`], clearing the flag. The
/// interrupt-return path should call this once, and if it returns `true`, invoke the scheduler
/// before resuming the interrupted thread.
#[inline]
pub fn yield_on_return() -> bool {
    YIELD_ON_RETURN.swap(false, Ordering::AcqRel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // These tests mutate process-global state, so they must not run concurrently with each other.
    static TEST_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn disable_then_set_restores_enabled() {
        let _guard = TEST_LOCK.lock().unwrap();
        set(Level::Enabled);
        let prior = disable();
        assert_eq!(prior, Level::Enabled);
        assert_eq!(get_level(), Level::Disabled);
        set(prior);
        assert_eq!(get_level(), Level::Enabled);
    }

    #[test]
    fn guard_restores_on_drop() {
        let _lock = TEST_LOCK.lock().unwrap();
        set(Level::Enabled);
        {
            let _guard = disable_guarded();
            assert_eq!(get_level(), Level::Disabled);
        }
        assert_eq!(get_level(), Level::Enabled);
    }

    #[test]
    fn yield_on_return_is_one_shot() {
        let _lock = TEST_LOCK.lock().unwrap();
        assert!(!yield_on_return());
        request_yield_on_return();
        assert!(yield_on_return());
        assert!(!yield_on_return());
    }
}
