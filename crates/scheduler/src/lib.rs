/* Copyright (c) 2022-2023 Jeremy Davis (jeremydavis519@gmail.com)
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

//! Phoenix's scheduler. Two scheduling policies are supported: priority scheduling with donation
//! through locks (the default), and a 64-level multi-level feedback queue driven by fixed-point
//! load-average and recent-CPU accounting (selected at boot with `-o mlfqs`). The two are mutually
//! exclusive, as in the source this was distilled from: priority donation never runs under MLFQS,
//! and `thread_set_priority` is a no-op under MLFQS.
//!
//! Every process-lifetime singleton the scheduler needs--the ready set, the all-threads list, the
//! `ready_threads` counter, `load_avg`--lives as an explicit field of [`Scheduler`] rather than as
//! an ambient global, so the whole thing can be constructed fresh for each test and so ownership is
//! unambiguous. The one exception is the interrupt gate (`intgate`), which really is process-wide
//! state by nature (it tracks whether the one CPU we support has interrupts masked right now) and
//! is asserted against rather than threaded through every call.

#![no_std]

#![deny(warnings, missing_docs)]

extern crate alloc;

#[macro_use] extern crate shared;

pub mod process;
pub mod thread;

use {
    alloc::{collections::BTreeMap, string::ToString, vec::Vec},
    fixedpoint::{mlfqs, Fixed},
    thread::{Donation, DonationOverflow, LockId, Status, Thread, ThreadId,
              PRI_DEFAULT, PRI_LEVELS, PRI_MAX, PRI_MIN}
};

/// How many ticks a thread may hold the CPU before the timer handler asks for a yield.
pub const TIME_SLICE: u32 = 4;
/// How many ticks make up one simulated second, and thus the cadence of the MLFQS `load_avg` and
/// `recent_cpu` recalculation.
pub const TIMER_FREQ: i64 = 100;
/// How often (in ticks) MLFQS priorities are recomputed and threads re-bucketed.
pub const PRIORITY_RECALC_PERIOD: i64 = 4;

/// Which scheduling discipline is in effect. Chosen once at boot from the kernel command line (see
/// `collab::cmdline`) and never changed afterward.
#[derive(Debug)]
pub enum Mode {
    /// Flat ready queue, priorities fixed except for donation.
    Priority(collections::Fifo<ThreadId>),
    /// 64 priority buckets, priorities recomputed from `recent_cpu` and `nice`.
    Mlfqs(collections::Buckets<ThreadId, PRI_LEVELS>)
}

impl Mode {
    /// The priority-scheduling mode with an empty ready queue.
    pub fn priority() -> Mode { Mode::Priority(collections::Fifo::new()) }
    /// The MLFQS mode with empty buckets.
    pub fn mlfqs() -> Mode { Mode::Mlfqs(collections::Buckets::new()) }

    /// Whether this is MLFQS mode.
    pub fn is_mlfqs(&self) -> bool { matches!(self, Mode::Mlfqs(_)) }

    fn push(&mut self, priority: u8, tid: ThreadId) {
        match self {
            Mode::Priority(q) => q.push_back(tid),
            Mode::Mlfqs(b) => b.push(priority as usize, tid)
        }
    }
}

/// Which role the CPU was executing in when a timer tick landed, for the idle/kernel/user tick
/// counters (spec's tick handler, step 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickRole {
    /// The idle thread was running.
    Idle,
    /// A kernel thread (no attached process) was running.
    Kernel,
    /// A user thread was running.
    User
}

/// The context-switch primitive, assumed given by the platform (spec §6): saves the current
/// thread's callee-saved registers and stack pointer, loads `next`'s, and returns with control in
/// `next`. The scheduler core only ever calls this through the trait, never caring how it's
/// implemented; a hosted build can supply [`NullContextSwitch`], which performs no real switch and
/// is enough to drive the bookkeeping in this crate from a test.
pub trait ContextSwitch {
    /// Switches execution from `prev` to `next`. Returns once `prev` is switched back to.
    ///
    /// # Safety
    /// The caller must ensure `prev` and `next` name threads that are actually ready to run code,
    /// and that interrupts are disabled across the call.
    unsafe fn switch(&mut self, prev: ThreadId, next: ThreadId);
}

/// A [`ContextSwitch`] that performs no real switch. Used by tests and by any caller that only
/// wants to drive the logical scheduling state (donation, MLFQS accounting, wakeup ordering)
/// without a real set of stacks to jump between.
#[derive(Debug, Default)]
pub struct NullContextSwitch;

impl ContextSwitch for NullContextSwitch {
    unsafe fn switch(&mut self, _prev: ThreadId, _next: ThreadId) {}
}

/// The scheduler core: thread table, ready set, and all the MLFQS/donation accounting that runs
/// off the timer tick.
#[derive(Debug)]
pub struct Scheduler {
    mode: Mode,
    threads: BTreeMap<ThreadId, Thread>,
    all_threads: Vec<ThreadId>,
    /// Which thread currently holds each lock, keyed by the lock ids `sync` hands out. Lets
    /// [`Scheduler::donate`] walk a chain of donations across more than one lock.
    lock_holder_of: BTreeMap<LockId, ThreadId>,
    ready_threads: i64,
    load_avg: Fixed,
    next_tid: ThreadId,
    next_lock_id: LockId,
    current: ThreadId,
    idle: Option<ThreadId>,
    tick: i64,
    slice_ticks: u32,
    idle_ticks: u64,
    kernel_ticks: u64,
    user_ticks: u64
}

impl Scheduler {
    /// Constructs a scheduler in the given mode, with no threads yet. Call [`Scheduler::thread_init`]
    /// next.
    pub fn new(mode: Mode) -> Scheduler {
        Scheduler {
            mode,
            threads: BTreeMap::new(),
            all_threads: Vec::new(),
            lock_holder_of: BTreeMap::new(),
            ready_threads: 0,
            load_avg: Fixed::ZERO,
            next_tid: 1,
            next_lock_id: 1,
            current: 0,
            idle: None,
            tick: 0,
            slice_ticks: 0,
            idle_ticks: 0,
            kernel_ticks: 0,
            user_ticks: 0
        }
    }

    /// Allocates a fresh, never-before-used lock id, for the `sync` crate to tag its donation
    /// bookkeeping with.
    pub fn alloc_lock_id(&mut self) -> LockId {
        let id = self.next_lock_id;
        self.next_lock_id += 1;
        id
    }

    /// Whether this scheduler is running in MLFQS mode.
    pub fn is_mlfqs(&self) -> bool { self.mode.is_mlfqs() }

    /// The number of ticks elapsed since boot.
    pub fn ticks(&self) -> i64 { self.tick }

    /// The three tick-role counters accumulated so far (idle, kernel, user).
    pub fn tick_counters(&self) -> (u64, u64, u64) { (self.idle_ticks, self.kernel_ticks, self.user_ticks) }

    /// The id of the thread currently marked running.
    pub fn current(&self) -> ThreadId { self.current }

    /// Looks up a thread by id.
    pub fn thread(&self, id: ThreadId) -> &Thread {
        self.threads.get(&id).expect("invalid thread id")
    }

    /// Mutable lookup of a thread by id. Exposed (rather than crate-private) because `vm` needs to
    /// reach into a thread's attached `Process` (file descriptors, vaddr maps, stack-page count) to
    /// do its job; the scheduler core itself never looks inside a `Process`.
    pub fn thread_mut(&mut self, id: ThreadId) -> &mut Thread {
        self.threads.get_mut(&id).expect("invalid thread id")
    }

    /// The number of threads in state READY or RUNNING, excluding idle. Feeds the MLFQS
    /// `load_avg` formula.
    pub fn ready_threads(&self) -> i64 { self.ready_threads }

    /// The current load average (MLFQS mode only; meaningless otherwise).
    pub fn load_avg(&self) -> Fixed { self.load_avg }

    /// Iterates over every thread that has ever been created and not yet reaped, in creation order.
    /// Used by the wakeup sweep and by MLFQS's periodic recomputation, both of which must visit
    /// sleeping and blocked threads too, not just the ready set.
    pub fn thread_foreach(&self) -> impl Iterator<Item = &Thread> {
        self.all_threads.iter().map(move |id| self.thread(*id))
    }

    fn alloc_tid(&mut self) -> ThreadId {
        let id = self.next_tid;
        self.next_tid += 1;
        id
    }

    /// Constructs the TCB for the currently running bootstrap thread.
    ///
    /// # Preconditions
    /// Interrupts must be off.
    pub fn thread_init(&mut self, name: &str) -> ThreadId {
        debug_assert_eq!(intgate::get_level(), intgate::Level::Disabled);
        let id = self.alloc_tid();
        let mut thread = Thread::new(id, name.to_string(), PRI_DEFAULT);
        thread.set_status(Status::Running);
        self.threads.insert(id, thread);
        self.all_threads.push(id);
        self.current = id;
        self.ready_threads = 1;
        id
    }

    /// Creates the idle thread and enables interrupts. The idle thread is created at `PRI_MAX` so
    /// it is guaranteed to be scheduled at least once to publish itself (see
    /// [`Scheduler::idle_thread_ready`]); once it has done so it demotes itself to `PRI_MIN`, which
    /// is where it sits for the rest of the kernel's life.
    pub fn thread_start(&mut self) -> ThreadId {
        let idle = self.thread_create_raw("idle", PRI_MAX);
        self.idle = Some(idle);
        intgate::set(intgate::Level::Enabled);
        idle
    }

    /// Called by the idle thread itself, once scheduled, to publish that it has started and drop
    /// back to its resting priority.
    pub fn idle_thread_ready(&mut self) {
        let idle = self.idle.expect("idle_thread_ready called before thread_start");
        debug_assert_eq!(self.current, idle);
        let t = self.thread_mut(idle);
        t.set_base_priority(PRI_MIN);
        t.set_effective_priority(PRI_MIN);
    }

    fn thread_create_raw(&mut self, name: &str, priority: u8) -> ThreadId {
        let id = self.alloc_tid();
        let thread = Thread::new(id, name.to_string(), priority);
        self.threads.insert(id, thread);
        self.all_threads.push(id);
        id
    }

    /// Creates a new thread at the given priority (in MLFQS mode, the new thread instead inherits
    /// `nice` from its creator and has its starting priority computed from `(recent_cpu=0, nice)`).
    /// If the new thread's priority exceeds the current thread's, the caller yields.
    pub fn thread_create(&mut self, name: &str, priority: u8, switch: &mut dyn ContextSwitch) -> ThreadId {
        let id = self.thread_create_raw(name, priority);
        printlndebug!("Created thread {:x} ({})", id, name);
        if self.is_mlfqs() {
            let nice = self.thread(self.current).nice();
            self.thread_mut(id).set_nice(nice);
            self.recompute_mlfqs_priority(id);
        }
        self.thread_unblock(id);
        if self.thread(id).effective_priority() > self.thread(self.current).effective_priority() {
            self.thread_yield(switch);
        }
        id
    }

    /// Blocks the current thread.
    ///
    /// # Preconditions
    /// Interrupts must be off.
    pub fn thread_block(&mut self, switch: &mut dyn ContextSwitch) {
        debug_assert_eq!(intgate::get_level(), intgate::Level::Disabled);
        let current = self.current;
        self.thread_mut(current).set_status(Status::Blocked);
        if Some(current) != self.idle {
            self.ready_threads -= 1;
        }
        self.schedule(switch);
    }

    /// Moves a blocked thread back to the ready set. Does not preempt the current thread.
    ///
    /// # Preconditions
    /// `t` must currently be blocked.
    pub fn thread_unblock(&mut self, t: ThreadId) {
        debug_assert_eq!(self.thread(t).status(), Status::Blocked);
        let priority = self.thread(t).effective_priority();
        self.mode.push(priority, t);
        self.thread_mut(t).set_status(Status::Ready);
        if Some(t) != self.idle {
            self.ready_threads += 1;
        }
    }

    /// Re-enqueues the current thread (unless it's idle) and reschedules.
    pub fn thread_yield(&mut self, switch: &mut dyn ContextSwitch) {
        let current = self.current;
        if Some(current) != self.idle {
            let priority = self.thread(current).effective_priority();
            self.mode.push(priority, current);
        }
        self.thread_mut(current).set_status(Status::Ready);
        self.schedule(switch);
    }

    /// Terminates the current thread. `schedule_tail` (invoked by the next `schedule`) frees its
    /// TCB once a successor has been chosen.
    pub fn thread_exit(&mut self, switch: &mut dyn ContextSwitch) -> ! {
        let current = self.current;
        printlndebug!("Terminating thread {:x}", current);
        self.all_threads.retain(|&id| id != current);
        self.thread_mut(current).set_status(Status::Dying);
        if Some(current) != self.idle {
            self.ready_threads -= 1;
        }
        self.schedule(switch);
        unreachable!("a dying thread must never be scheduled again")
    }

    /// Sets the current thread's priority.
    ///
    /// In priority mode: if the thread currently holds an active donation, only the base priority
    /// is updated (the effective priority, and thus the donation, is left alone until the donation
    /// is released). Lowering the priority below a ready peer's forces a yield.
    ///
    /// In MLFQS mode, the requested value is ignored entirely; priority is always derived from
    /// `(recent_cpu, nice)` instead.
    pub fn thread_set_priority(&mut self, p: u8, switch: &mut dyn ContextSwitch) {
        let current = self.current;
        if self.is_mlfqs() {
            self.recompute_mlfqs_priority(current);
            self.yield_if_preempted(switch);
            return;
        }
        let had_donation = self.thread(current).has_active_donation();
        self.thread_mut(current).set_base_priority(p);
        if !had_donation {
            self.thread_mut(current).set_effective_priority(p);
        }
        self.yield_if_preempted(switch);
    }

    /// Sets the current thread's `nice` value and recomputes its priority (MLFQS mode), yielding if
    /// that lowers it below a ready peer's.
    pub fn thread_set_nice(&mut self, n: i8, switch: &mut dyn ContextSwitch) {
        let current = self.current;
        self.thread_mut(current).set_nice(n);
        self.recompute_mlfqs_priority(current);
        self.yield_if_preempted(switch);
    }

    fn yield_if_preempted(&mut self, switch: &mut dyn ContextSwitch) {
        let current_priority = self.thread(self.current).effective_priority();
        let outranked = self.ready_priorities().any(|pri| pri > current_priority);
        if outranked {
            self.thread_yield(switch);
        }
    }

    fn ready_priorities(&self) -> alloc::vec::IntoIter<u8> {
        let v: Vec<u8> = match &self.mode {
            Mode::Priority(q) => q.iter().map(|&id| self.thread(id).effective_priority()).collect(),
            Mode::Mlfqs(b) => b.iter().map(|&id| self.thread(id).effective_priority()).collect()
        };
        v.into_iter()
    }

    /// Puts the current thread to sleep until at least `wake_tick`.
    pub fn thread_make_sleep(&mut self, wake_tick: i64, switch: &mut dyn ContextSwitch) {
        let current = self.current;
        self.thread_mut(current).set_sleep(wake_tick);
        self.thread_mut(current).set_status(Status::Blocked);
        if Some(current) != self.idle {
            self.ready_threads -= 1;
        }
        self.schedule(switch);
    }

    /// The timer tick handler. `role` says what was executing when the tick landed.
    pub fn tick(&mut self, role: TickRole) {
        debug_assert!(intgate::in_interrupt_context());
        self.tick += 1;
        match role {
            TickRole::Idle => self.idle_ticks += 1,
            TickRole::Kernel => self.kernel_ticks += 1,
            TickRole::User => self.user_ticks += 1
        }

        self.slice_ticks += 1;
        if self.slice_ticks >= TIME_SLICE {
            intgate::request_yield_on_return();
        }

        if self.is_mlfqs() {
            if role != TickRole::Idle {
                let current = self.current;
                let recent_cpu = self.thread(current).recent_cpu();
                self.thread_mut(current).set_recent_cpu(recent_cpu.add_int(1));
            }
            if self.tick % TIMER_FREQ == 0 {
                self.recompute_load_avg();
                self.recompute_all_recent_cpu();
            }
            if self.tick % PRIORITY_RECALC_PERIOD == 0 {
                self.recompute_all_mlfqs_priorities();
            }
        }
    }

    fn recompute_load_avg(&mut self) {
        let ready_threads = self.ready_threads.max(0) as u32;
        self.load_avg = mlfqs::next_load_avg(self.load_avg, ready_threads);
    }

    fn recompute_all_recent_cpu(&mut self) {
        let load_avg = self.load_avg;
        let ids: Vec<ThreadId> = self.all_threads.clone();
        for id in ids {
            let t = self.thread_mut(id);
            let recent_cpu = mlfqs::next_recent_cpu(t.recent_cpu(), load_avg, t.nice() as i32);
            t.set_recent_cpu(recent_cpu);
        }
    }

    fn recompute_all_mlfqs_priorities(&mut self) {
        let ids: Vec<ThreadId> = self.all_threads.clone();
        for id in ids {
            if Some(id) == self.idle { continue; }
            self.recompute_mlfqs_priority(id);
        }
    }

    fn recompute_mlfqs_priority(&mut self, id: ThreadId) {
        if !self.is_mlfqs() { return; }
        let old_priority = self.thread(id).effective_priority();
        let status = self.thread(id).status();
        let nice = self.thread(id).nice() as i32;
        let recent_cpu = self.thread(id).recent_cpu();
        let new_priority = mlfqs::priority(recent_cpu, nice, PRI_MIN as i32, PRI_MAX as i32) as u8;
        if new_priority == old_priority {
            return;
        }
        if status == Status::Ready {
            if let Mode::Mlfqs(buckets) = &mut self.mode {
                buckets.remove_where(old_priority as usize, |&queued| queued == id);
                buckets.push(new_priority as usize, id);
            }
        }
        let t = self.thread_mut(id);
        t.set_base_priority(new_priority);
        t.set_effective_priority(new_priority);
    }

    /// Walks the all-threads list waking any thread whose sleep has expired. Called at the top of
    /// every [`Scheduler::schedule`].
    fn wakeup_sweep(&mut self) {
        let now = self.tick;
        let woken: Vec<ThreadId> = self.all_threads.iter()
            .copied()
            .filter(|&id| self.thread(id).sleeping() && self.thread(id).wake_at() <= now)
            .collect();
        for id in woken {
            self.thread_mut(id).clear_sleep();
            self.thread_unblock(id);
        }
    }

    /// Chooses the next thread to run and switches to it if it differs from the current thread.
    /// Always starts with the wakeup sweep. Falls back to the idle thread if nothing else is ready.
    pub fn schedule(&mut self, switch: &mut dyn ContextSwitch) {
        self.wakeup_sweep();

        let prev = self.current;
        let next = self.pick_next();

        if next != prev {
            unsafe { switch.switch(prev, next); }
        }
        self.schedule_tail(prev, next);
    }

    fn pick_next(&mut self) -> ThreadId {
        let threads = &self.threads;
        let next = match &mut self.mode {
            Mode::Priority(q) => q.remove_best(|id| threads.get(id).map_or(0, Thread::effective_priority)),
            Mode::Mlfqs(b) => b.pop_highest()
        };
        next.unwrap_or_else(|| self.idle.expect("schedule() called before thread_start()"))
    }

    fn schedule_tail(&mut self, prev: ThreadId, next: ThreadId) {
        self.current = next;
        self.slice_ticks = 0;
        self.thread_mut(next).set_status(Status::Running);

        if self.thread(prev).status() == Status::Dying {
            self.threads.remove(&prev);
        }
    }

    // --- Priority donation (spec.md §4.4) -----------------------------------------------------

    /// Records that `donor` is donating its effective priority to `holder` on behalf of `lock`,
    /// propagating through any chain of locks `holder` (and its holders, transitively) is itself
    /// blocked on. Does nothing if `donor`'s priority does not exceed `holder`'s, and is a no-op
    /// entirely in MLFQS mode (donation is a priority-scheduling-only mechanism).
    ///
    /// Each hop is tagged with the lock that actually connects that donor/holder pair (`lock` for
    /// the first hop, then whatever the previous holder was itself waiting on for every hop after
    /// that), not just the lock `donor` originally blocked on. Otherwise releasing an intermediate
    /// lock in the chain wouldn't unwind the donations it transitively caused further down the chain.
    pub fn donate(&mut self, donor: ThreadId, holder: ThreadId, lock: LockId) -> Result<(), DonationOverflow> {
        if self.is_mlfqs() {
            return Ok(());
        }

        let mut holder = holder;
        let mut lock = lock;
        loop {
            let donor_priority = self.thread(donor).effective_priority();
            let holder_priority = self.thread(holder).effective_priority();
            if donor_priority <= holder_priority {
                return Ok(());
            }

            self.thread_mut(donor).push_donation(Donation { to: holder, prior_priority: holder_priority, lock })?;
            let received = self.thread(holder).donations_received() + 1;
            self.thread_mut(holder).set_donations_received(received);
            self.thread_mut(holder).set_effective_priority(donor_priority);

            match self.thread(holder).waiting_on() {
                Some(next_lock) => match self.lock_holder_of.get(&next_lock).copied() {
                    Some(next_holder) => { holder = next_holder; lock = next_lock; }
                    None => return Ok(())
                },
                None => return Ok(())
            }
        }
    }

    /// Called by `lock_release`: removes every outgoing donation (on any thread) made on behalf of
    /// `lock`, and restores each affected holder's effective priority to the greatest of its base
    /// priority and its remaining donors.
    pub fn release_donations_for_lock(&mut self, lock: LockId) {
        let ids: Vec<ThreadId> = self.all_threads.clone();
        let mut affected = Vec::new();
        for id in ids {
            let removed = self.thread_mut(id).take_donations_for_lock(lock);
            affected.extend(removed.into_iter().map(|d| d.to));
        }
        affected.sort_unstable();
        affected.dedup();
        for holder in affected {
            self.recompute_donated_priority(holder);
        }
    }

    fn recompute_donated_priority(&mut self, holder: ThreadId) {
        let base = self.thread(holder).base_priority();
        let mut best = base;
        let mut count = 0usize;
        for &donor in &self.all_threads {
            for d in self.thread(donor).donations() {
                if d.to == holder {
                    count += 1;
                    let donor_priority = self.thread(donor).effective_priority();
                    if donor_priority > best {
                        best = donor_priority;
                    }
                }
            }
        }
        self.thread_mut(holder).set_effective_priority(best);
        self.thread_mut(holder).set_donations_received(count);
    }

    /// Records which thread currently holds each lock, so [`Scheduler::donate`] can walk donation
    /// chains. The `sync` crate is the only caller; it updates this on every acquire/release.
    pub fn set_lock_holder(&mut self, lock: LockId, holder: Option<ThreadId>) {
        match holder {
            Some(h) => { self.lock_holder_of.insert(lock, h); }
            None => { self.lock_holder_of.remove(&lock); }
        }
    }

    /// Directly overrides a thread's `waiting_on` field. The `sync` crate uses this while a thread
    /// is parked on a lock's waiter list, before calling [`Scheduler::donate`].
    pub fn set_waiting_on(&mut self, t: ThreadId, lock: Option<LockId>) {
        self.thread_mut(t).set_waiting_on(lock);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boot(mode: Mode) -> Scheduler {
        intgate::set(intgate::Level::Disabled);
        let mut sched = Scheduler::new(mode);
        sched.thread_init("main");
        sched.thread_start();
        sched.idle_thread_ready();
        sched
    }

    #[test]
    fn new_thread_with_higher_priority_preempts() {
        let mut sched = boot(Mode::priority());
        let main = sched.current();
        let mut sw = NullContextSwitch;
        let high = sched.thread_create("high", PRI_DEFAULT + 1, &mut sw);
        assert_eq!(sched.thread(high).status(), Status::Running);
        assert_eq!(sched.thread(main).status(), Status::Ready);
        assert_eq!(sched.current(), high);
    }

    #[test]
    fn lower_priority_thread_does_not_preempt() {
        let mut sched = boot(Mode::priority());
        let main = sched.current();
        let mut sw = NullContextSwitch;
        let _low = sched.thread_create("low", PRI_DEFAULT - 1, &mut sw);
        assert_eq!(sched.current(), main);
    }

    #[test]
    fn block_then_unblock_restores_ready_thread() {
        let mut sched = boot(Mode::priority());
        let mut sw = NullContextSwitch;
        let main = sched.current();
        let worker = sched.thread_create("worker", PRI_DEFAULT - 1, &mut sw);
        let before = sched.ready_threads();

        // The main thread blocks itself waiting on something; only `worker` and idle are left.
        sched.thread_block(&mut sw);
        assert_eq!(sched.current(), worker);
        assert_eq!(sched.ready_threads(), before - 1);

        sched.thread_unblock(main);
        assert_eq!(sched.thread(main).status(), Status::Ready);
        assert_eq!(sched.ready_threads(), before);
    }

    #[test]
    fn priority_donation_raises_then_release_restores_holder() {
        let mut sched = boot(Mode::priority());
        let mut sw = NullContextSwitch;
        let lock = sched.alloc_lock_id();

        let low = sched.thread_create("low", 10, &mut sw);
        let high = sched.thread_create("high", 50, &mut sw);

        sched.set_lock_holder(lock, Some(low));
        sched.set_waiting_on(high, Some(lock));

        sched.donate(high, low, lock).unwrap();
        assert_eq!(sched.thread(low).effective_priority(), 50);
        assert!(sched.thread(low).has_active_donation());

        sched.release_donations_for_lock(lock);
        assert_eq!(sched.thread(low).effective_priority(), 10);
        assert!(!sched.thread(low).has_active_donation());
    }

    #[test]
    fn donation_chain_propagates_through_second_lock() {
        let mut sched = boot(Mode::priority());
        let mut sw = NullContextSwitch;
        let lock_a = sched.alloc_lock_id();
        let lock_b = sched.alloc_lock_id();

        let low = sched.thread_create("low", 10, &mut sw);
        let mid = sched.thread_create("mid", 20, &mut sw);
        let high = sched.thread_create("high", 50, &mut sw);

        // mid holds lock_a and waits on lock_b, which low holds.
        sched.set_lock_holder(lock_b, Some(low));
        sched.set_lock_holder(lock_a, Some(mid));
        sched.set_waiting_on(mid, Some(lock_b));
        sched.set_waiting_on(high, Some(lock_a));

        sched.donate(mid, low, lock_b).unwrap();
        sched.donate(high, mid, lock_a).unwrap();

        assert_eq!(sched.thread(mid).effective_priority(), 50);
        assert_eq!(sched.thread(low).effective_priority(), 50);
    }

    #[test]
    fn mlfqs_priority_decreases_as_recent_cpu_grows() {
        let mut sched = boot(Mode::mlfqs());
        let t = sched.current();
        let start_priority = sched.thread(t).effective_priority();
        for _ in 0..400 {
            unsafe { intgate::enter_interrupt_context(); }
            sched.tick(TickRole::Kernel);
            unsafe { intgate::leave_interrupt_context(); }
        }
        assert!(sched.thread(t).effective_priority() <= start_priority);
    }

    #[test]
    fn sleeping_thread_wakes_up_once_its_tick_elapses() {
        let mut sched = boot(Mode::priority());
        let mut sw = NullContextSwitch;
        let sleeper = sched.current();
        sched.thread_make_sleep(5, &mut sw);
        assert_eq!(sched.current(), sched.thread_foreach().find(|t| t.id() != sleeper).map(Thread::id).unwrap());

        for _ in 0..5 {
            unsafe { intgate::enter_interrupt_context(); }
            sched.tick(TickRole::Idle);
            unsafe { intgate::leave_interrupt_context(); }
        }
        sched.schedule(&mut sw);
        assert!(!sched.thread(sleeper).sleeping());
        assert_eq!(sched.thread(sleeper).status(), Status::Running);
    }
}
