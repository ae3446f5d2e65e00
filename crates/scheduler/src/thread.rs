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

//! The thread control block and the small pieces of state that live only on it: lifecycle status,
//! the donation bookkeeping that backs priority-inversion avoidance, and the MLFQS accounting.
//!
//! Threads are identified by a stable [`ThreadId`] rather than by reference. The TCB, its donation
//! array, and the waiter lists in `sync` would otherwise form a reference graph with cycles
//! (T waits on a lock held by H, H's donation entry points back at T); looking threads up by id in
//! `Scheduler`'s table sidesteps that entirely.

use alloc::string::String;
use alloc::vec::Vec;
use fixedpoint::Fixed;

/// Identifies a thread for its entire lifetime. Never reused while the thread exists; ids are
/// handed out by an ever-increasing counter (see `Scheduler::next_tid`).
pub type ThreadId = u64;

/// Identifies a lock for the purpose of donation bookkeeping (see [`Donation`]). Assigned by the
/// `sync` crate when a lock is constructed.
pub type LockId = u64;

/// The lowest priority a thread may have.
pub const PRI_MIN: u8 = 0;
/// The priority a thread has unless a caller overrides it.
pub const PRI_DEFAULT: u8 = 31;
/// The highest priority a thread may have.
pub const PRI_MAX: u8 = 63;
/// The number of priority buckets in MLFQS mode (`PRI_MAX - PRI_MIN + 1`).
pub const PRI_LEVELS: usize = (PRI_MAX - PRI_MIN + 1) as usize;
/// How many outgoing donations a single thread may hold at once. Exceeding this is a bug upstream,
/// not a resource limit to be handled gracefully--see [`DonationError`].
pub const MAX_PRIORITY_DONATION: usize = 8;
/// A sentinel written just past a thread's kernel stack, checked on every `thread_current` call to
/// catch stack overflow.
pub const THREAD_MAGIC: u32 = 0xcd6a_bf4b;

/// Where a thread is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Currently assigned the CPU.
    Running,
    /// Eligible to run, sitting in a ready queue.
    Ready,
    /// Waiting on a semaphore, lock, or sleep timer.
    Blocked,
    /// Has called `thread_exit` or hit a fatal fault; its resources are being reclaimed.
    Dying
}

/// One outgoing donation: a record, kept on the donor, of a holder whose effective priority the
/// donor has temporarily raised, the value it had before the raise, and the lock the donor is
/// (or was) blocked on that caused the donation. The `lock` field is what `lock_release` uses to
/// decide which donations to roll back--only entries whose `lock` matches the lock being released.
#[derive(Debug, Clone, Copy)]
pub struct Donation {
    /// The thread whose priority was raised.
    pub to: ThreadId,
    /// `to`'s effective priority immediately before this donation.
    pub prior_priority: u8,
    /// The lock this donation was made on behalf of.
    pub lock: LockId
}

/// Thrown when a thread's donation array is already full. Per the design, reaching this indicates
/// a bug upstream (a donation chain longer than the cap, or a cycle); it is not meant to be
/// recovered from.
#[derive(Debug)]
pub struct DonationOverflow;

/// A thread's control block: everything the scheduler core needs to make decisions about it, plus
/// the process-level state it carries along but never interprets (see [`super::process::Process`]).
#[derive(Debug)]
pub struct Thread {
    id: ThreadId,
    name: String,
    status: Status,
    magic: u32,

    base_priority: u8,
    effective_priority: u8,

    donations: Vec<Donation>,
    donations_received: usize,
    waiting_on: Option<LockId>,

    nice: i8,
    recent_cpu: Fixed,

    wake_at: i64,
    sleeping: bool,

    process: Option<super::process::Process>
}

impl Thread {
    /// Builds a new TCB. `id` must be unique for the lifetime of the kernel; callers get one from
    /// `Scheduler::alloc_tid`.
    pub fn new(id: ThreadId, name: String, priority: u8) -> Thread {
        Thread {
            id,
            name,
            status: Status::Blocked,
            magic: THREAD_MAGIC,
            base_priority: priority,
            effective_priority: priority,
            donations: Vec::with_capacity(MAX_PRIORITY_DONATION),
            donations_received: 0,
            waiting_on: None,
            nice: 0,
            recent_cpu: Fixed::ZERO,
            wake_at: -1,
            sleeping: false,
            process: None
        }
    }

    /// This thread's id.
    pub fn id(&self) -> ThreadId { self.id }

    /// This thread's human-readable name (for logging, not used for identity).
    pub fn name(&self) -> &str { &self.name }

    /// Checks the stack-overflow sentinel. A corrupted magic value is a fatal condition (spec's
    /// error-handling design: stack-overflow sentinel corruption is always fatal).
    pub fn check_magic(&self) -> bool {
        self.magic == THREAD_MAGIC
    }

    /// Current lifecycle status.
    pub fn status(&self) -> Status { self.status }

    /// Sets the lifecycle status. Scheduler-internal: callers should go through `Scheduler`'s
    /// public operations rather than poke this directly.
    pub(crate) fn set_status(&mut self, status: Status) { self.status = status; }

    /// The priority set by the user (or inherited nice-based computation in MLFQS mode); unaffected
    /// by donations.
    pub fn base_priority(&self) -> u8 { self.base_priority }

    /// The priority actually used for scheduling: `max(base_priority, active donations)`.
    pub fn effective_priority(&self) -> u8 { self.effective_priority }

    pub(crate) fn set_base_priority(&mut self, p: u8) { self.base_priority = p; }
    pub(crate) fn set_effective_priority(&mut self, p: u8) { self.effective_priority = p; }

    /// Whether this thread currently holds any donations (its effective priority was raised above
    /// its base).
    pub fn has_active_donation(&self) -> bool {
        self.effective_priority > self.base_priority
    }

    /// The lock this thread is blocked trying to acquire, if any.
    pub fn waiting_on(&self) -> Option<LockId> { self.waiting_on }
    pub(crate) fn set_waiting_on(&mut self, lock: Option<LockId>) { self.waiting_on = lock; }

    /// This thread's outgoing donations.
    pub fn donations(&self) -> &[Donation] { &self.donations }

    /// How many donations other threads have made to this one (for the symmetry invariant: this
    /// must equal the number of outgoing entries across all threads that name this one as `to`).
    pub fn donations_received(&self) -> usize { self.donations_received }
    pub(crate) fn set_donations_received(&mut self, n: usize) { self.donations_received = n; }

    /// Records a new outgoing donation. Fails if the donation array is already at
    /// [`MAX_PRIORITY_DONATION`]--this is an assertion failure upstream, not a resource limit.
    pub(crate) fn push_donation(&mut self, donation: Donation) -> Result<(), DonationOverflow> {
        if self.donations.len() >= MAX_PRIORITY_DONATION {
            return Err(DonationOverflow);
        }
        self.donations.push(donation);
        Ok(())
    }

    /// Removes every outgoing donation made on behalf of `lock`, returning the removed entries.
    pub(crate) fn take_donations_for_lock(&mut self, lock: LockId) -> Vec<Donation> {
        let (keep, removed): (Vec<_>, Vec<_>) = self.donations.drain(..).partition(|d| d.lock != lock);
        self.donations = keep;
        removed
    }

    /// MLFQS niceness, in `[-20, 20]`.
    pub fn nice(&self) -> i8 { self.nice }
    pub(crate) fn set_nice(&mut self, nice: i8) { self.nice = nice; }

    /// MLFQS recent-CPU accumulator.
    pub fn recent_cpu(&self) -> Fixed { self.recent_cpu }
    pub(crate) fn set_recent_cpu(&mut self, recent_cpu: Fixed) { self.recent_cpu = recent_cpu; }

    /// The tick at which a sleeping thread should wake, or `-1` if not sleeping.
    pub fn wake_at(&self) -> i64 { self.wake_at }
    pub fn sleeping(&self) -> bool { self.sleeping }
    pub(crate) fn set_sleep(&mut self, wake_at: i64) {
        self.wake_at = wake_at;
        self.sleeping = true;
    }
    pub(crate) fn clear_sleep(&mut self) {
        self.wake_at = -1;
        self.sleeping = false;
    }

    /// The process-level state attached to this thread, if it's a user thread.
    pub fn process(&self) -> Option<&super::process::Process> { self.process.as_ref() }
    /// Mutable access to the process-level state.
    pub fn process_mut(&mut self) -> Option<&mut super::process::Process> { self.process.as_mut() }
    /// Attaches process-level state to a kernel thread, making it a user thread.
    pub fn set_process(&mut self, process: super::process::Process) { self.process = Some(process); }
}
