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

//! The page-directory hardware interface (spec.md §6): `install`/`clear`/`get`/dirty/accessed-bit
//! primitives. Real hardware keeps this state in page-table entries walked by the MMU; the
//! simulation backend keeps it in a `BTreeMap` keyed by page-aligned virtual address, which is
//! observationally identical for everything the core asks of it.

use alloc::collections::BTreeMap;

/// The page-directory hardware interface. One instance per process address space.
pub trait PageDirectory {
    /// Maps `vaddr` to `paddr`, installing it writable or read-only as requested. Overwrites any
    /// existing mapping for `vaddr`.
    fn set_page(&mut self, vaddr: usize, paddr: usize, writable: bool);
    /// Removes whatever mapping `vaddr` has, if any.
    fn clear_page(&mut self, vaddr: usize);
    /// The physical page `vaddr` is mapped to, if it's mapped.
    fn get_page(&self, vaddr: usize) -> Option<usize>;
    /// Whether the page at `vaddr` has been written to since it was installed or last had its
    /// dirty bit cleared.
    fn is_dirty(&self, vaddr: usize) -> bool;
    /// Sets or clears the dirty bit for `vaddr`.
    fn set_dirty(&mut self, vaddr: usize, dirty: bool);
    /// Whether the page at `vaddr` has been read or written since it was installed or last had its
    /// accessed bit cleared.
    fn is_accessed(&self, vaddr: usize) -> bool;
    /// Sets or clears the accessed bit for `vaddr`.
    fn set_accessed(&mut self, vaddr: usize, accessed: bool);
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    paddr: usize,
    writable: bool,
    dirty: bool,
    accessed: bool
}

/// A page directory backed by a `BTreeMap` rather than real page-table hardware. Each process gets
/// its own, the same way each process gets its own real page directory.
#[derive(Debug, Default)]
pub struct SimPageDirectory {
    entries: BTreeMap<usize, Entry>
}

impl SimPageDirectory {
    /// Creates an empty address space.
    pub fn new() -> SimPageDirectory {
        SimPageDirectory { entries: BTreeMap::new() }
    }
}

impl PageDirectory for SimPageDirectory {
    fn set_page(&mut self, vaddr: usize, paddr: usize, writable: bool) {
        self.entries.insert(vaddr, Entry { paddr, writable, dirty: false, accessed: false });
    }

    fn clear_page(&mut self, vaddr: usize) {
        self.entries.remove(&vaddr);
    }

    fn get_page(&self, vaddr: usize) -> Option<usize> {
        self.entries.get(&vaddr).map(|e| e.paddr)
    }

    fn is_dirty(&self, vaddr: usize) -> bool {
        self.entries.get(&vaddr).map_or(false, |e| e.dirty)
    }

    fn set_dirty(&mut self, vaddr: usize, dirty: bool) {
        if let Some(e) = self.entries.get_mut(&vaddr) {
            e.dirty = dirty;
        }
    }

    fn is_accessed(&self, vaddr: usize) -> bool {
        self.entries.get(&vaddr).map_or(false, |e| e.accessed)
    }

    fn set_accessed(&mut self, vaddr: usize, accessed: bool) {
        if let Some(e) = self.entries.get_mut(&vaddr) {
            e.accessed = accessed;
        }
    }
}
