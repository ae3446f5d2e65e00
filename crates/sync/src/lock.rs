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

//! A lock: a binary [`Semaphore`] plus a holder reference and priority donation (spec.md §4.4).
//!
//! Acquiring a held lock donates the caller's priority to the holder (and transitively, through
//! whatever the holder is itself waiting on) before blocking, so a low-priority holder can't stall
//! a high-priority waiter behind an unrelated medium-priority thread. Releasing drops every
//! donation that was made on this lock's behalf and restores each affected thread's effective
//! priority to the best of its base priority and whatever it's still owed.

use scheduler::{
    thread::{LockId, ThreadId},
    ContextSwitch, Scheduler
};
use crate::semaphore::Semaphore;

/// A mutual-exclusion lock. At most one thread holds it at a time; others block.
#[derive(Debug)]
pub struct Lock {
    id: LockId,
    sema: Semaphore,
    holder: Option<ThreadId>
}

impl Lock {
    /// Creates a new, unheld lock. `id` must be unique among locks a single [`Scheduler`] knows
    /// about; get one from [`Scheduler::alloc_lock_id`].
    pub fn new(id: LockId) -> Lock {
        Lock { id, sema: Semaphore::new(1), holder: None }
    }

    /// This lock's identity, as used by [`Scheduler::donate`] and friends.
    pub fn id(&self) -> LockId { self.id }

    /// The thread currently holding this lock, if any.
    pub fn holder(&self) -> Option<ThreadId> { self.holder }

    /// Whether the calling thread already holds this lock.
    pub fn is_held_by_current(&self, sched: &Scheduler) -> bool {
        self.holder == Some(sched.current())
    }

    /// Acquires the lock, blocking the calling thread if it's already held.
    ///
    /// If the lock is held, the caller donates its effective priority to the holder (and, through
    /// the holder, to whatever chain of locks the holder itself is waiting on) before blocking, so
    /// priority inversion can't stall it behind an unrelated thread of middling priority. Panics (in
    /// debug builds, via the scheduler's own assertions) if the calling thread already holds this
    /// lock; Pintos locks are not reentrant, and neither is this one.
    pub fn acquire(&mut self, sched: &mut Scheduler, switch: &mut dyn ContextSwitch) {
        let me = sched.current();
        debug_assert_ne!(self.holder, Some(me), "lock is not reentrant");

        if let Some(holder) = self.holder {
            sched.set_waiting_on(me, Some(self.id));
            sched.donate(me, holder, self.id)
                .expect("donation array exceeded MAX_PRIORITY_DONATION entries");
        }

        self.sema.down(sched, switch);

        self.holder = Some(sched.current());
        sched.set_lock_holder(self.id, self.holder);
        sched.set_waiting_on(sched.current(), None);
    }

    /// Releases the lock. Clears the holder, drops every donation made on this lock's behalf
    /// (restoring the former holder's and any intermediate donors' effective priorities), then wakes
    /// the next waiter, if any.
    pub fn release(&mut self, sched: &mut Scheduler, switch: &mut dyn ContextSwitch) {
        debug_assert_eq!(self.holder, Some(sched.current()), "lock released by non-holder");

        self.holder = None;
        sched.set_lock_holder(self.id, None);
        sched.release_donations_for_lock(self.id);

        self.sema.up(sched, switch);
    }
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
    fn uncontended_acquire_and_release_round_trips() {
        let mut sched = boot();
        let mut sw = NullContextSwitch;
        let id = sched.alloc_lock_id();
        let mut lock = Lock::new(id);

        let me = sched.current();
        lock.acquire(&mut sched, &mut sw);
        assert_eq!(lock.holder(), Some(me));
        lock.release(&mut sched, &mut sw);
        assert_eq!(lock.holder(), None);
    }

    #[test]
    fn contended_acquire_donates_priority_to_holder() {
        let mut sched = boot();
        let mut sw = NullContextSwitch;
        let id = sched.alloc_lock_id();
        let mut lock = Lock::new(id);

        // `main` (the default-priority holder) takes the lock first.
        lock.acquire(&mut sched, &mut sw);
        let holder = sched.current();

        // A higher-priority thread becomes `current` on creation and blocks on the held lock,
        // donating its priority to `holder` in the process.
        let waiter = sched.thread_create("waiter", PRI_DEFAULT + 10, &mut sw);
        assert_eq!(sched.current(), waiter);
        lock.acquire(&mut sched, &mut sw);

        assert_eq!(sched.thread(holder).effective_priority(), PRI_DEFAULT + 10);
        assert_eq!(sched.thread(waiter).status(), scheduler::thread::Status::Blocked);
    }

    #[test]
    fn release_restores_holders_base_priority() {
        let mut sched = boot();
        let mut sw = NullContextSwitch;
        let id = sched.alloc_lock_id();
        let mut lock = Lock::new(id);

        lock.acquire(&mut sched, &mut sw);
        let holder = sched.current();
        let _waiter = sched.thread_create("waiter", PRI_DEFAULT + 10, &mut sw);
        lock.acquire(&mut sched, &mut sw);
        assert_eq!(sched.thread(holder).effective_priority(), PRI_DEFAULT + 10);

        // `waiter` blocked itself inside `acquire`, so `schedule` already switched `current` back
        // to `holder`; releasing from here is exactly what the real holder would do.
        lock.release(&mut sched, &mut sw);
        assert_eq!(sched.thread(holder).effective_priority(), PRI_DEFAULT);
    }
}
