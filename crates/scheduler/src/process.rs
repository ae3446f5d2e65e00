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

//! Process-level state attached to a user thread.
//!
//! The scheduler core never looks inside a `Process`; it exists purely so a `Thread` can carry it
//! along. The `vm` crate is the one that reads and writes most of these fields (file descriptors,
//! the mmap map, segment bounds); `sync`'s syscall-adjacent exec/wait bookkeeping touches the rest.

use crate::thread::ThreadId;

/// A process may have at most this many child processes tracked at once.
pub const MAX_CHILDREN: usize = 10;
/// A process may have at most this many open file descriptors (2 reserved below them for stdin/out).
pub const MAX_OPEN_FD: usize = 10;
/// The first file descriptor handed out by `open` (0 and 1 are reserved).
pub const FIRST_FD: i32 = 2;
/// A process may have at most this many memory-mapped regions at once.
pub const MAX_VADDR_MAPS: usize = 10;

/// An opaque handle to a hardware page directory. Its actual representation is owned by the
/// page-directory collaborator (see `collab::page_table`); the scheduler and `vm` crates only ever
/// pass it through.
pub type PageDirHandle = u64;

/// A file descriptor, as handed back to user code by `open`.
pub type Fd = i32;

/// One memory-mapped (or otherwise page-backed) region of a process's address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaddrMapKind {
    /// Pages backing the executable's code/data segments, loaded from its ELF image.
    LoadPages,
    /// Pages backing the process's stack.
    StackPages,
    /// Pages backing a `mmap`ed file.
    UserFile
}

/// A single entry in a process's mmap/VM map table (spec's "per-process VM map array").
#[derive(Debug, Clone, Copy)]
pub struct VaddrMap {
    /// What this range of pages is for.
    pub kind: VaddrMapKind,
    /// First virtual address covered (inclusive).
    pub start: usize,
    /// First virtual address *not* covered (exclusive).
    pub end: usize,
    /// The file this range is backed by, or `-1` if it isn't file-backed.
    pub fd: Fd,
    /// The size, in bytes, of the backing file (meaningful only when `fd >= 0`).
    pub file_size: usize
}

/// The user-process-level state attached to a thread. Opaque to the scheduler core; read and
/// mutated by `vm` and by the syscall-dispatch collaborator.
#[derive(Debug)]
pub struct Process {
    page_dir: PageDirHandle,

    parent: Option<ThreadId>,
    children: heapless_children::ChildList,

    exit_status: i32,
    /// The semaphore the parent `sema_down`s on after `process_execute`, and the child `sema_up`s
    /// after it has either loaded successfully or failed to load, but before `exit_status` is
    /// committed. Represented as a raw id rather than a `sync::Semaphore` to avoid a dependency
    /// cycle between `scheduler` and `sync`; `sync` owns the actual semaphore table.
    exec_sema: u64,

    fds: [Option<OpenFile>; MAX_OPEN_FD],

    vaddr_maps: [Option<VaddrMap>; MAX_VADDR_MAPS],

    code_segment: (usize, usize),
    data_segment: (usize, usize),

    allocated_stack_pages: usize
}

/// Bookkeeping for one open file descriptor. The file handle itself belongs to the
/// filesystem/block-device collaborator; this just carries the fd -> file-identity mapping.
#[derive(Debug, Clone, Copy)]
pub struct OpenFile {
    /// An opaque identity for the underlying file, assigned by the filesystem collaborator.
    pub file: u64,
    /// Current seek position.
    pub position: usize
}

impl Process {
    /// Creates a new process with no children, no open files, and no mapped memory beyond what the
    /// caller records separately (code/data segments are set after the ELF loader runs).
    pub fn new(page_dir: PageDirHandle, parent: Option<ThreadId>, exec_sema: u64) -> Process {
        Process {
            page_dir,
            parent,
            children: heapless_children::ChildList::new(),
            exit_status: 0,
            exec_sema,
            fds: [None; MAX_OPEN_FD],
            vaddr_maps: [None; MAX_VADDR_MAPS],
            code_segment: (0, 0),
            data_segment: (0, 0),
            allocated_stack_pages: 0
        }
    }

    /// The page directory this process's threads run in.
    pub fn page_dir(&self) -> PageDirHandle { self.page_dir }

    /// This process's parent, if any (the initial process has none).
    pub fn parent(&self) -> Option<ThreadId> { self.parent }

    /// This process's children.
    pub fn children(&self) -> &[ThreadId] { self.children.as_slice() }

    /// Records a new child. Fails if [`MAX_CHILDREN`] children are already tracked.
    pub fn add_child(&mut self, child: ThreadId) -> Result<(), ChildLimitReached> {
        self.children.push(child)
    }

    /// Removes a child (e.g. once its exit status has been collected by `wait`).
    pub fn remove_child(&mut self, child: ThreadId) {
        self.children.remove(child);
    }

    /// This process's exit status, valid once it has called `thread_exit`.
    pub fn exit_status(&self) -> i32 { self.exit_status }
    /// Sets the exit status, as the process-exit epilogue does just before `thread_exit` runs.
    pub fn set_exit_status(&mut self, status: i32) { self.exit_status = status; }

    /// The raw id of this process's exec-synchronization semaphore.
    pub fn exec_sema(&self) -> u64 { self.exec_sema }

    /// Allocates the next free file descriptor for `file`, starting at [`FIRST_FD`]. Returns `None`
    /// if the table is full.
    pub fn open_fd(&mut self, file: u64) -> Option<Fd> {
        for (i, slot) in self.fds.iter_mut().enumerate() {
            if slot.is_none() {
                *slot = Some(OpenFile { file, position: 0 });
                return Some(i as Fd + FIRST_FD);
            }
        }
        None
    }

    /// Looks up the open-file record for `fd`.
    pub fn fd(&self, fd: Fd) -> Option<&OpenFile> {
        self.fd_index(fd).and_then(|i| self.fds[i].as_ref())
    }

    /// Mutable lookup of the open-file record for `fd`.
    pub fn fd_mut(&mut self, fd: Fd) -> Option<&mut OpenFile> {
        let i = self.fd_index(fd)?;
        self.fds[i].as_mut()
    }

    /// Closes `fd`, freeing the slot.
    pub fn close_fd(&mut self, fd: Fd) {
        if let Some(i) = self.fd_index(fd) {
            self.fds[i] = None;
        }
    }

    fn fd_index(&self, fd: Fd) -> Option<usize> {
        if fd < FIRST_FD { return None; }
        let i = (fd - FIRST_FD) as usize;
        if i < MAX_OPEN_FD { Some(i) } else { None }
    }

    /// This process's mmap/VM map table.
    pub fn vaddr_maps(&self) -> impl Iterator<Item = (usize, &VaddrMap)> {
        self.vaddr_maps.iter().enumerate().filter_map(|(i, m)| m.as_ref().map(|m| (i, m)))
    }

    /// Finds a free slot in the mmap table and records `map` there. Returns the map id, or `None`
    /// if [`MAX_VADDR_MAPS`] entries are already in use.
    pub fn allocate_vaddr_map(&mut self, map: VaddrMap) -> Option<usize> {
        for (i, slot) in self.vaddr_maps.iter_mut().enumerate() {
            if slot.is_none() {
                *slot = Some(map);
                return Some(i);
            }
        }
        None
    }

    /// Looks up a map entry by id.
    pub fn vaddr_map(&self, mapid: usize) -> Option<&VaddrMap> {
        self.vaddr_maps.get(mapid).and_then(|m| m.as_ref())
    }

    /// Frees a map entry by id (after `clear_vaddr_map_and_pte` has unmapped its pages).
    pub fn free_vaddr_map(&mut self, mapid: usize) {
        if let Some(slot) = self.vaddr_maps.get_mut(mapid) {
            *slot = None;
        }
    }

    /// The `[start, end)` range of the process's code segment.
    pub fn code_segment(&self) -> (usize, usize) { self.code_segment }
    /// The `[start, end)` range of the process's data segment.
    pub fn data_segment(&self) -> (usize, usize) { self.data_segment }
    /// Records the code/data segment bounds, as determined by the ELF loader.
    pub fn set_segments(&mut self, code: (usize, usize), data: (usize, usize)) {
        self.code_segment = code;
        self.data_segment = data;
    }

    /// How many stack pages have been demand-allocated so far.
    pub fn allocated_stack_pages(&self) -> usize { self.allocated_stack_pages }
    pub(crate) fn set_allocated_stack_pages(&mut self, n: usize) { self.allocated_stack_pages = n; }
}

/// Returned when a process already has [`MAX_CHILDREN`] children tracked.
#[derive(Debug)]
pub struct ChildLimitReached;

mod heapless_children {
    use super::{ThreadId, MAX_CHILDREN, ChildLimitReached};

    /// A fixed-capacity, order-preserving list of child thread ids.
    #[derive(Debug)]
    pub struct ChildList {
        items: [ThreadId; MAX_CHILDREN],
        len: usize
    }

    impl ChildList {
        pub fn new() -> ChildList {
            ChildList { items: [0; MAX_CHILDREN], len: 0 }
        }

        pub fn push(&mut self, child: ThreadId) -> Result<(), ChildLimitReached> {
            if self.len >= MAX_CHILDREN {
                return Err(ChildLimitReached);
            }
            self.items[self.len] = child;
            self.len += 1;
            Ok(())
        }

        pub fn remove(&mut self, child: ThreadId) {
            if let Some(pos) = self.items[..self.len].iter().position(|&c| c == child) {
                self.items[pos..self.len].rotate_left(1);
                self.len -= 1;
            }
        }

        pub fn as_slice(&self) -> &[ThreadId] {
            &self.items[..self.len]
        }
    }
}
