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

//! A counting semaphore with a FIFO-within-priority waiter list (spec.md §4.4).
//!
//! `down`/`up` here follow the source's actual semaphore, not the simplified gloss in spec.md's
//! prose ("up: if waiters nonempty, remove one and unblock; else increment"): the counter is
//! *always* incremented by `up`, and a woken waiter loops back through `down`'s `while value == 0`
//! check and decrements the counter itself. Doing it the other way--handing the waiter the resource
//! directly, without incrementing--would leave the counter permanently short by one unit of
//! whatever was transferred, since nothing ever increments on that path. The prose's "else" reads as
//! a simplification of that loop rather than a distinct algorithm; see DESIGN.md.

use {
    collections::Fifo,
    scheduler::{thread::ThreadId, ContextSwitch, Scheduler}
};

/// A counting semaphore. `value` starts at whatever `new` is given; `down` blocks while it's zero,
/// `up` increments it and wakes the highest-priority waiter, if any.
#[derive(Debug)]
pub struct Semaphore {
    value: usize,
    waiters: Fifo<ThreadId>
}

impl Semaphore {
    /// Constructs a semaphore with the given initial value.
    pub const fn new(value: usize) -> Semaphore {
        Semaphore { value, waiters: Fifo::new() }
    }

    /// Blocks the current thread until the semaphore's value is positive, then decrements it.
    ///
    /// Interrupts are disabled for the duration of the check/block, as spec.md §5 requires for any
    /// mutation of the ready set or a TCB's status.
    pub fn down(&mut self, sched: &mut Scheduler, switch: &mut dyn ContextSwitch) {
        let _guard = intgate::disable_guarded();
        while self.value == 0 {
            let me = sched.current();
            self.waiters.push_back(me);
            sched.thread_block(switch);
        }
        self.value -= 1;
    }

    /// Increments the semaphore's value and, if any thread is waiting, wakes the highest-priority
    /// one (FIFO among ties--see [`Fifo::remove_best`]). If that thread now outranks the caller, the
    /// caller yields.
    pub fn up(&mut self, sched: &mut Scheduler, switch: &mut dyn ContextSwitch) {
        let _guard = intgate::disable_guarded();
        let woken = self.waiters.remove_best(|&id| sched.thread(id).effective_priority());
        self.value += 1;
        if let Some(t) = woken {
            sched.thread_unblock(t);
            let current = sched.current();
            if sched.thread(t).effective_priority() > sched.thread(current).effective_priority() {
                sched.thread_yield(switch);
            }
        }
    }

    /// The semaphore's current value, for tests and diagnostics.
    pub fn value(&self) -> usize { self.value }

    /// How many threads are currently queued on this semaphore.
    pub fn waiter_count(&self) -> usize { self.waiters.len() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scheduler::{thread::PRI_DEFAULT, Mode, NullContextSwitch};

    fn boot() -> Scheduler {
        intgate::set(intgate::Level::Disabled);
        let mut sched = Scheduler::new(Mode::priority());
        sched.thread_init("main");
        sched.thread_start();
        sched.idle_thread_ready();
        sched
    }

    #[test]
    fn down_on_positive_value_does_not_block() {
        let mut sched = boot();
        let mut sw = NullContextSwitch;
        let mut sema = Semaphore::new(1);
        let before = sched.current();
        sema.down(&mut sched, &mut sw);
        assert_eq!(sched.current(), before);
        assert_eq!(sema.value(), 0);
    }

    #[test]
    fn down_on_zero_blocks_until_up() {
        let mut sched = boot();
        let mut sw = NullContextSwitch;
        let mut sema = Semaphore::new(0);

        // A higher priority than `main`'s so creating it makes it `current`; from there, calling
        // `down` models "the waiter thread calls down on itself".
        let waiter = sched.thread_create("waiter", PRI_DEFAULT + 10, &mut sw);
        assert_eq!(sched.current(), waiter);
        sema.down(&mut sched, &mut sw);
        assert_eq!(sema.waiter_count(), 1);
        assert_eq!(sched.thread(waiter).status(), scheduler::thread::Status::Blocked);

        sema.up(&mut sched, &mut sw);
        assert_eq!(sched.thread(waiter).status(), scheduler::thread::Status::Running);
        assert_eq!(sema.value(), 0);
    }

    #[test]
    fn up_wakes_highest_priority_waiter_first() {
        let mut sched = boot();
        let mut sw = NullContextSwitch;
        let mut sema = Semaphore::new(0);

        // Both priorities exceed `main`'s, so each becomes `current` in turn and its `down` call
        // blocks itself, exactly like two threads that each call `sema_down` before either `up`.
        let low = sched.thread_create("low", 40, &mut sw);
        sema.down(&mut sched, &mut sw);
        let high = sched.thread_create("high", 50, &mut sw);
        sema.down(&mut sched, &mut sw);

        assert_eq!(sema.waiter_count(), 2);
        sema.up(&mut sched, &mut sw);
        assert_eq!(sched.thread(high).status(), scheduler::thread::Status::Running);
        assert_eq!(sched.thread(low).status(), scheduler::thread::Status::Blocked);
    }
}
