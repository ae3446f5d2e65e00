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

//! The raw physical-page allocator (spec.md §6, "Page allocator"). Real Pintos carves the user
//! pool out of physical memory once at boot and serves pages from a bitmap; `SimPool` does the
//! same thing over a plain byte-indexed `Vec<bool>`, since the core never needs the pages to be
//! real memory--only for `paddr_to_slot` arithmetic (spec.md §3, "Frame table") to be consistent.

use alloc::vec::Vec;

bitflags! {
    /// Which pool a page should come from, and whether it should be zeroed. Mirrors Pintos's
    /// `PAL_USER`/`PAL_ZERO` flags (spec.md §6).
    pub struct PoolFlags: u32 {
        /// Allocate from the user pool (as opposed to the kernel pool). The core only ever asks
        /// for user-pool pages; the kernel pool is outside its scope.
        const USER = 0b01;
        /// Zero the page's contents before returning it.
        const ZERO = 0b10;
    }
}

/// The raw physical-page allocator collaborator.
pub trait PageAllocator {
    /// Allocates one physical page, or returns `None` if the requested pool is exhausted.
    fn palloc(&mut self, flags: PoolFlags) -> Option<usize>;
    /// Returns a page to the pool it came from.
    fn palloc_free(&mut self, paddr: usize);
    /// The physical address of the first page in the user pool.
    fn user_pool_base(&self) -> usize;
    /// How many pages the user pool holds in total.
    fn user_page_count(&self) -> usize;
    /// The size, in bytes, of one page.
    fn page_size(&self) -> usize;
    /// Reads a whole page's contents out of the frame at `paddr`. `buf` must be exactly
    /// [`PageAllocator::page_size`] bytes. Real hardware would just be reading physical memory
    /// directly; a collaborator is needed here only because the simulation has no real memory
    /// behind its addresses.
    fn read_frame(&self, paddr: usize, buf: &mut [u8]);
    /// Writes a whole page's contents into the frame at `paddr`. `buf` must be exactly
    /// [`PageAllocator::page_size`] bytes.
    fn write_frame(&mut self, paddr: usize, buf: &[u8]);
}

/// A simulated user-pool allocator: `page_count` fixed-size pages starting at `base`, tracked by a
/// plain free bitmap, with a byte buffer standing in for the pages' actual contents so that
/// eviction and swap-in round-trips have something real to move around. Good enough to drive
/// `vm`'s frame table and eviction path in tests without a real MMU backing it.
#[derive(Debug)]
pub struct SimPool {
    base: usize,
    page_size: usize,
    free: Vec<bool>,
    bytes: Vec<u8>
}

impl SimPool {
    /// Creates a simulated pool of `page_count` pages of size `page_size`, based at `base`. All
    /// pages start free and zeroed.
    pub fn new(base: usize, page_size: usize, page_count: usize) -> SimPool {
        SimPool {
            base,
            page_size,
            free: alloc::vec![true; page_count],
            bytes: alloc::vec![0u8; page_size * page_count]
        }
    }

    /// Converts a physical address back to its slot index (spec.md §3: `(paddr - base) / PGSIZE`).
    pub fn slot_of(&self, paddr: usize) -> usize {
        (paddr - self.base) / self.page_size
    }

    fn addr_of(&self, slot: usize) -> usize {
        self.base + slot * self.page_size
    }
}

impl PageAllocator for SimPool {
    fn palloc(&mut self, flags: PoolFlags) -> Option<usize> {
        let slot = self.free.iter().position(|&free| free)?;
        self.free[slot] = false;
        let addr = self.addr_of(slot);
        if flags.contains(PoolFlags::ZERO) {
            let start = slot * self.page_size;
            self.bytes[start..start + self.page_size].fill(0);
        }
        Some(addr)
    }

    fn palloc_free(&mut self, paddr: usize) {
        let slot = self.slot_of(paddr);
        self.free[slot] = true;
    }

    fn user_pool_base(&self) -> usize { self.base }
    fn user_page_count(&self) -> usize { self.free.len() }
    fn page_size(&self) -> usize { self.page_size }

    fn read_frame(&self, paddr: usize, buf: &mut [u8]) {
        let slot = self.slot_of(paddr);
        let start = slot * self.page_size;
        buf.copy_from_slice(&self.bytes[start..start + self.page_size]);
    }

    fn write_frame(&mut self, paddr: usize, buf: &[u8]) {
        let slot = self.slot_of(paddr);
        let start = slot * self.page_size;
        self.bytes[start..start + self.page_size].copy_from_slice(buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_and_frees_round_trip() {
        let mut pool = SimPool::new(0x1000, 0x1000, 4);
        let a = pool.palloc(PoolFlags::USER).unwrap();
        let b = pool.palloc(PoolFlags::USER).unwrap();
        assert_ne!(a, b);
        pool.palloc_free(a);
        let c = pool.palloc(PoolFlags::USER).unwrap();
        assert_eq!(a, c);
    }

    #[test]
    fn exhausted_pool_returns_none() {
        let mut pool = SimPool::new(0, 0x1000, 2);
        pool.palloc(PoolFlags::USER).unwrap();
        pool.palloc(PoolFlags::USER).unwrap();
        assert!(pool.palloc(PoolFlags::USER).is_none());
    }

    #[test]
    fn frame_contents_round_trip() {
        let mut pool = SimPool::new(0x1000, 0x1000, 2);
        let a = pool.palloc(PoolFlags::USER).unwrap();
        let page = alloc::vec![0x42u8; pool.page_size()];
        pool.write_frame(a, &page);
        let mut out = alloc::vec![0u8; pool.page_size()];
        pool.read_frame(a, &mut out);
        assert_eq!(out, page);
    }

    #[test]
    fn slot_of_matches_spec_formula() {
        let pool = SimPool::new(0x8000, 0x1000, 8);
        assert_eq!(pool.slot_of(0x8000), 0);
        assert_eq!(pool.slot_of(0xb000), 3);
    }
}
