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

//! The kernel core distilled from Pintos's `threads` and `userprog`/`vm` subsystems: a thread
//! scheduler with priority donation and an MLFQS mode (`scheduler`), synchronization primitives
//! built on top of it (`sync`), and a virtual-memory layer with a frame table, a swap manager and
//! per-process paging (`vm`). This crate is the seam where those pieces meet the rest of a real
//! kernel: it owns the kernel command line, boots the scheduler and idle thread, and names the
//! system-call surface that the (out-of-scope) syscall dispatcher would use.
//!
//! None of the hardware this would eventually run on is this crate's problem. Every external
//! collaborator--the page directory, the physical-page allocator, the swap block device--comes in
//! through the traits in `collab`, so `KernelContext` can be built and driven identically whether
//! it's wired to real hardware or, as in every test in this repository, to `collab`'s simulation
//! backends.

#![no_std]

#![deny(warnings, missing_docs)]

extern crate alloc;
#[macro_use] extern crate shared;

pub mod syscall;

use {
    alloc::string::ToString,
    collab::{cmdline, BlockDevice, PageAllocator, PageDirectory},
    scheduler::{ContextSwitch, Mode, Scheduler, TickRole},
    scheduler::thread::ThreadId,
    vm::Vm
};

/// Ties the scheduler and the virtual-memory layer together behind the one kernel command line
/// that decides which scheduling policy is in effect (spec.md §6: `-o mlfqs`).
///
/// Owning both halves in one struct, rather than threading two independent globals through every
/// caller, mirrors how Pintos itself keeps `thread.c`'s statics and `vm/frame.c`'s frame table in
/// the same address space and lets one drive the other (eviction needs to know which thread to
/// charge a frame to; the scheduler never needs to know about frames at all).
pub struct KernelContext<PD: PageDirectory, PA: PageAllocator, B: BlockDevice> {
    /// The thread scheduler: ready queues, donation bookkeeping, MLFQS accounting.
    pub scheduler: Scheduler,
    /// The virtual-memory layer: frame table, swap manager, per-process paging.
    pub vm: Vm<PD, PA, B>
}

impl<PD: PageDirectory, PA: PageAllocator, B: BlockDevice> KernelContext<PD, PA, B> {
    /// Builds a fresh kernel context. `cmdline` is scanned for `-o mlfqs` to choose the scheduling
    /// policy (spec.md §6); everything else on the command line is somebody else's problem.
    ///
    /// Mirrors Pintos's boot order: `thread_init` happens before the page allocator is ready to
    /// serve frames, so the scheduler and the VM layer are constructed in the same call rather than
    /// staged across two kernel-init functions that could be called out of order.
    pub fn new(cmdline: &str, palloc: PA, block: B) -> KernelContext<PD, PA, B> {
        let mode = match cmdline::scheduling_policy(cmdline) {
            cmdline::SchedulingPolicy::Mlfqs => Mode::mlfqs(),
            cmdline::SchedulingPolicy::PriorityDonation => Mode::priority()
        };
        let mut scheduler = Scheduler::new(mode);
        let vm = Vm::new(&mut scheduler, palloc, block);
        KernelContext { scheduler, vm }
    }

    /// Whether this context was booted into MLFQS mode.
    pub fn is_mlfqs(&self) -> bool { self.scheduler.is_mlfqs() }

    /// Finishes booting: transforms the running bootstrap code into the main thread
    /// (`thread_init`), then creates the idle thread and enables interrupts (`thread_start`). This
    /// is the kernel-core half of what Pintos's `threads_init`/`thread_start` do; everything
    /// hardware-specific (loading the GDT, initializing the page allocator) happens on the caller's
    /// side of this call, same as in the original.
    ///
    /// Returns the id of the idle thread, which the caller must schedule at least once (see
    /// [`idle_loop`]) before it settles to its resting priority.
    pub fn boot(&mut self) -> ThreadId {
        self.scheduler.thread_init("main");
        self.scheduler.thread_start()
    }
}

/// The body of the idle thread, grounded on Pintos's `idle()` (`threads/thread.c`): publish that
/// idle has started, drop to `PRI_MIN`, then forever disable interrupts and block, relying on the
/// timer interrupt to re-enable them and hand control back out. A real port would replace the
/// `core::hint::spin_loop` below with a `hlt` instruction (or platform equivalent) executed with
/// interrupts re-enabled for exactly that one instruction, as the original's comment explains; this
/// crate only owns the scheduling side of that dance.
///
/// `published` is called once idle has recorded itself with the scheduler, standing in for Pintos's
/// `sema_up(idle_started)`--the thread that called [`KernelContext::boot`] is blocked on exactly
/// that signal in the original and would be here too, if this crate modeled blocking `sema_down`
/// calls made from outside a scheduled thread.
pub fn idle_loop(sched: &mut Scheduler, switch: &mut dyn ContextSwitch, mut published: impl FnMut()) -> ! {
    sched.idle_thread_ready();
    published();
    loop {
        intgate::disable();
        sched.thread_block(switch);
        core::hint::spin_loop();
    }
}

/// Runs the timer-tick handler for one tick, charging it to whichever role was executing.
/// Callers in interrupt context should call this once per tick and then check
/// [`intgate::yield_on_return`] before returning to user or kernel code.
pub fn on_timer_tick(sched: &mut Scheduler, role: TickRole) {
    sched.tick(role);
}

/// Formats a thread's name and id the way kernel log lines throughout this codebase do, e.g. for a
/// panic handler to print which thread faulted.
pub fn describe_thread(sched: &Scheduler, id: ThreadId) -> alloc::string::String {
    let name = sched.thread(id).name().to_string();
    alloc::format!("{} (tid {})", name, id)
}
