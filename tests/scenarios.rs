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

//! End-to-end scenarios exercising the scheduler and VM layer together through `collab`'s
//! simulation backends, the same way `crypt`'s `tests/nist.rs` drives that crate's library code
//! against real vectors rather than unit-testing its internals in isolation.

use {
    collab::{block::SimBlockDevice, pagedir::SimPageDirectory, palloc::SimPool},
    scheduler::{process::{Process, VaddrMapKind}, thread::{Status, PRI_DEFAULT}, Mode, NullContextSwitch, Scheduler},
    sync::Lock,
    vm::{Vm, PGSIZE, PHYS_BASE}
};

fn boot_priority() -> Scheduler {
    intgate::set(intgate::Level::Disabled);
    let mut sched = Scheduler::new(Mode::priority());
    sched.thread_init("main");
    sched.thread_start();
    sched.idle_thread_ready();
    sched
}

fn boot_mlfqs() -> Scheduler {
    intgate::set(intgate::Level::Disabled);
    let mut sched = Scheduler::new(Mode::mlfqs());
    sched.thread_init("main");
    sched.thread_start();
    sched.idle_thread_ready();
    sched
}

// --- S1: priority donation, one lock --------------------------------------------------------

#[test]
fn s1_priority_donation_one_lock_orders_by_donated_priority() {
    let mut sched = boot_priority();
    let mut sw = NullContextSwitch;
    let lock_id = sched.alloc_lock_id();
    let mut lock = Lock::new(lock_id);

    // Main (priority 31 by default) acquires L.
    assert_eq!(sched.thread(sched.current()).effective_priority(), PRI_DEFAULT);
    lock.acquire(&mut sched, &mut sw);
    let main = sched.current();

    let mut log: Vec<&'static str> = Vec::new();

    // A (priority 32) tries to acquire L and blocks, donating up to 32.
    let a = sched.thread_create("A", PRI_DEFAULT + 1, &mut sw);
    assert_eq!(sched.current(), main, "A does not outrank main while main holds the lock");
    lock.acquire(&mut sched, &mut sw);
    assert_eq!(sched.thread(main).effective_priority(), PRI_DEFAULT + 1);
    assert_eq!(sched.thread(a).status(), Status::Blocked);

    // B (priority 33) does the same, donating up to 33.
    let b = sched.thread_create("B", PRI_DEFAULT + 2, &mut sw);
    lock.acquire(&mut sched, &mut sw);
    assert_eq!(sched.thread(main).effective_priority(), PRI_DEFAULT + 2);
    assert_eq!(sched.thread(b).status(), Status::Blocked);

    // Main releases L. The highest-priority waiter (B) gets it first.
    lock.release(&mut sched, &mut sw);
    assert_eq!(sched.current(), b);
    log.push("B got lock");
    log.push("B done");
    lock.release(&mut sched, &mut sw);

    assert_eq!(sched.current(), a);
    log.push("A got lock");
    log.push("A done");
    lock.release(&mut sched, &mut sw);

    assert_eq!(sched.current(), main);
    assert_eq!(sched.thread(main).effective_priority(), PRI_DEFAULT);
    assert_eq!(log, ["B got lock", "B done", "A got lock", "A done"]);
}

// --- S2: chained donation --------------------------------------------------------------------

#[test]
fn s2_chained_donation_propagates_through_two_locks_and_unwinds() {
    let mut sched = boot_priority();
    let mut sw = NullContextSwitch;
    let l1 = sched.alloc_lock_id();
    let l2 = sched.alloc_lock_id();
    let mut lock1 = Lock::new(l1);
    let mut lock2 = Lock::new(l2);

    // H holds L1.
    lock1.acquire(&mut sched, &mut sw);
    let h = sched.current();

    // M (priority 32) takes L2, then blocks on L1 -> H.eff becomes 32.
    let m = sched.thread_create("M", PRI_DEFAULT + 1, &mut sw);
    lock2.acquire(&mut sched, &mut sw);
    lock1.acquire(&mut sched, &mut sw);
    assert_eq!(sched.current(), h);
    assert_eq!(sched.thread(h).effective_priority(), PRI_DEFAULT + 1);

    // T (priority 33) blocks on L2 -> M.eff and H.eff both become 33.
    let t = sched.thread_create("T", PRI_DEFAULT + 2, &mut sw);
    lock2.acquire(&mut sched, &mut sw);
    assert_eq!(sched.current(), h);
    assert_eq!(sched.thread(m).effective_priority(), PRI_DEFAULT + 2);
    assert_eq!(sched.thread(h).effective_priority(), PRI_DEFAULT + 2);

    // H releases L1: H's priority unwinds to base; M (highest-priority waiter on L1) runs.
    lock1.release(&mut sched, &mut sw);
    assert_eq!(sched.thread(h).effective_priority(), PRI_DEFAULT);
    assert_eq!(sched.current(), m);

    // M releases L2, handing it to T; M's priority unwinds to base once T stops donating.
    lock2.release(&mut sched, &mut sw);
    assert_eq!(sched.current(), t);
    assert_eq!(sched.thread(m).effective_priority(), PRI_DEFAULT + 1);

    lock1.release(&mut sched, &mut sw);
    assert_eq!(sched.thread(m).effective_priority(), PRI_DEFAULT);

    assert_eq!(sched.thread(t).status(), Status::Running);
}

// --- S3: MLFQS convergence -------------------------------------------------------------------

#[test]
fn s3_mlfqs_cpu_bound_nice_zero_thread_outranks_nice_five_set_within_a_second() {
    let mut sched = boot_mlfqs();
    let mut sw = NullContextSwitch;

    let cpu_bound = sched.current();
    assert_eq!(sched.thread(cpu_bound).nice(), 0);

    // `thread_set_nice` always targets the calling thread, so each new thread has to become
    // `current` before its own nice value can be set. A same-priority `thread_yield` hands off
    // to it (FIFO order within its bucket puts it ahead of the just-yielded creator); setting its
    // nice then hands control back to the cpu-bound thread once it's outranked again.
    let niced: Vec<_> = (0..3)
        .map(|i| {
            let id = sched.thread_create(if i == 0 { "n0" } else if i == 1 { "n1" } else { "n2" }, PRI_DEFAULT, &mut sw);
            sched.thread_yield(&mut sw);
            assert_eq!(sched.current(), id);
            sched.thread_set_nice(5, &mut sw);
            assert_eq!(sched.current(), cpu_bound);
            id
        })
        .collect();

    // Only the CPU-bound thread racks up recent_cpu; the niced threads stay idle (asleep in
    // spirit--this harness just never switches to them), matching the scenario's premise that one
    // thread is CPU-bound while the rest are not.
    for _ in 0..(scheduler::TIMER_FREQ as u32) {
        unsafe { intgate::enter_interrupt_context(); }
        sched.tick(scheduler::TickRole::Kernel);
        unsafe { intgate::leave_interrupt_context(); }
    }

    let cpu_bound_priority = sched.thread(cpu_bound).effective_priority();
    for &id in &niced {
        assert!(
            cpu_bound_priority <= sched.thread(id).effective_priority(),
            "a thread that burned a full second of recent_cpu should not outrank idle nice=5 threads"
        );
    }
}

// --- S4: sleep ordering -----------------------------------------------------------------------

#[test]
fn s4_sleepers_wake_in_order_of_their_target_tick() {
    let mut sched = boot_priority();
    let mut sw = NullContextSwitch;

    // `thread_make_sleep` always puts `current` to sleep, and a same-priority `thread_create`
    // doesn't preempt its creator, so each sleeper has to be handed control (the same
    // `thread_yield`-then-assert idiom S3 uses for `thread_set_nice`) before it can put *itself*
    // to sleep; control then falls back to `main` to create the next one.
    let deadlines = [10i64, 20, 30];
    let sleepers: Vec<_> = deadlines.iter().map(|&d| {
        let id = sched.thread_create("sleeper", PRI_DEFAULT, &mut sw);
        sched.thread_yield(&mut sw);
        assert_eq!(sched.current(), id);
        sched.thread_make_sleep(sched.ticks() + d, &mut sw);
        id
    }).collect();

    let mut woken_order = Vec::new();
    for _ in 0..30 {
        unsafe { intgate::enter_interrupt_context(); }
        sched.tick(scheduler::TickRole::Idle);
        unsafe { intgate::leave_interrupt_context(); }
        sched.schedule(&mut sw);
        for (i, &id) in sleepers.iter().enumerate() {
            if !sched.thread(id).sleeping() && !woken_order.contains(&i) {
                woken_order.push(i);
                assert!(sched.ticks() >= deadlines[i], "woke before its target tick");
            }
        }
    }

    assert_eq!(woken_order, [0, 1, 2], "sleepers must wake in ascending deadline order");
}

// --- S5: mmap round-trip ----------------------------------------------------------------------

#[test]
fn s5_mmap_round_trip_through_write_back_and_reopen() {
    let mut sched = boot_priority();
    let mut sw = NullContextSwitch;
    sched.thread_mut(sched.current()).set_process(Process::new(0, None, 0));
    let me = sched.current();

    let palloc = SimPool::new(0x1000, PGSIZE, 8);
    let block = SimBlockDevice::new(64);
    let mut v: Vm<SimPageDirectory, SimPool, SimBlockDevice> = Vm::new(&mut sched, palloc, block);
    v.register_process(me, SimPageDirectory::new());

    // A file "f" of 2*PGSIZE bytes, all pattern P.
    const P: u8 = 0xAA;
    const Q: u8 = 0x55;
    let mut file = vec![P; 2 * PGSIZE];

    let vaddr = 0x4000;
    let fd = 3;
    let mapid = v.write_file_to_vaddr(
        me, VaddrMapKind::UserFile, vaddr, file.len(), fd,
        |buf| { let n = buf.len().min(file.len()); buf[..n].copy_from_slice(&file[..n]); n },
        &mut sched, &mut sw
    ).unwrap();
    assert!(mapid < scheduler::process::MAX_VADDR_MAPS);

    // Reading [V, V+2*PGSIZE) yields P.
    for i in 0..2 {
        let page = v.read_page(me, vaddr + i * PGSIZE).unwrap();
        assert!(page.iter().all(|&b| b == P));
    }

    // Writing pattern Q to [V, V+2*PGSIZE), the way a CPU store through the mapping would, dirties
    // both pages.
    for i in 0..2 {
        assert!(v.write_page(me, vaddr + i * PGSIZE, &[Q; PGSIZE]));
    }

    // `munmap` write-back: since both pages are now dirty, both get written back to the file.
    let mut written_back = vec![0u8; 2 * PGSIZE];
    v.write_back_to_file(me, mapid, |offset, bytes| {
        written_back[offset..offset + bytes.len()].copy_from_slice(bytes);
    }, &mut sched).unwrap();
    assert_eq!(written_back, vec![Q; 2 * PGSIZE]);
    file = written_back;

    v.clear_vaddr_map_and_pte(me, mapid, &mut sched).unwrap();
    assert!(sched.thread(me).process().unwrap().vaddr_map(mapid).is_none());

    // Reopen f and read: contents equal Q.
    assert_eq!(file, vec![Q; 2 * PGSIZE]);
}

// --- S6: eviction and swap ---------------------------------------------------------------------

#[test]
fn s6_n_plus_one_processes_over_n_frames_all_stay_readable_after_swap_round_trip() {
    let mut sched = boot_priority();
    let mut sw = NullContextSwitch;

    const N: usize = 3;
    let palloc = SimPool::new(0x1000, PGSIZE, N);
    let block = SimBlockDevice::new(256);
    let mut v: Vm<SimPageDirectory, SimPool, SimBlockDevice> = Vm::new(&mut sched, palloc, block);

    let mut owners = Vec::new();
    let mut expected = Vec::new();
    for i in 0..(N + 1) {
        let tid = sched.thread_create("toucher", PRI_DEFAULT, &mut sw);
        sched.thread_mut(tid).set_process(Process::new(0, None, 0));
        v.register_process(tid, SimPageDirectory::new());

        let vaddr = 0x2000;
        let pattern = (i as u8).wrapping_mul(17).wrapping_add(1);
        let paddr = v.get_user_page(true, tid, vaddr, &mut sched, &mut sw).unwrap();
        v.install_page(tid, vaddr, paddr, true);
        v.palloc_write_test_hook(paddr, pattern);

        owners.push(tid);
        expected.push(pattern);
    }

    // With only N frames and N+1 touching processes, at least one page must have been evicted to
    // swap at some point.
    let any_in_swap = owners.iter().any(|&tid| v.is_in_swap(tid, 0x2000));
    assert!(any_in_swap || v.frames().occupied_count() <= N, "N+1 pages over N frames must have forced an eviction");

    // Every page remains readable with its original contents, bringing evicted ones back from
    // swap as needed.
    for (i, &tid) in owners.iter().enumerate() {
        if v.is_in_swap(tid, 0x2000) {
            v.bring_from_swap(tid, 0x2000, true, &mut sched, &mut sw).unwrap();
        }
        let byte = v.read_test_hook(tid, 0x2000);
        assert_eq!(byte, expected[i], "process {} did not read back its own pattern", i);
    }
}
