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

//! The swap manager (spec.md §4.6): a fixed number of `sectors_per_page`-sector slots on a block
//! device, each holding exactly one evicted page. Allocation is a linear scan under a lock owned by
//! the caller (see [`crate::pager::Vm`])--spec.md §5 calls out that this lock can't just globally
//! disable interrupts, since the write it protects is block I/O and may suspend the caller.

use {
    alloc::vec::Vec,
    collab::block::{BlockDevice, BLOCK_SECTOR_SIZE},
    scheduler::thread::ThreadId
};

#[derive(Debug, Clone, Copy)]
struct SlotEntry {
    owner: ThreadId,
    vaddr: usize
}

/// The swap-slot table: `sector_count / sectors_per_page` fixed-size slots, each either empty or
/// holding one evicted page's owner and address.
#[derive(Debug)]
pub struct SwapTable {
    sectors_per_page: usize,
    slots: Vec<Option<SlotEntry>>,
    allocated: usize
}

impl SwapTable {
    /// Discovers the swap device's geometry and sizes the slot table accordingly (spec.md §4.6:
    /// `sectors_per_page = ceil(page_size / sector_size)`, `swap_pages = sector_count /
    /// sectors_per_page`).
    pub fn new<B: BlockDevice>(block: &B, page_size: usize) -> SwapTable {
        let sectors_per_page = ceil_div(page_size, BLOCK_SECTOR_SIZE);
        let slot_count = block.size() / sectors_per_page;
        SwapTable { sectors_per_page, slots: alloc::vec![None; slot_count], allocated: 0 }
    }

    /// How many sectors one page occupies on the swap device.
    pub fn sectors_per_page(&self) -> usize { self.sectors_per_page }

    /// The first sector a given slot index covers.
    pub fn slot_to_sector(&self, slot: usize) -> usize { slot * self.sectors_per_page }

    /// How many slots are currently in use.
    pub fn allocated_count(&self) -> usize { self.allocated }

    /// The total number of slots the swap device can hold.
    pub fn capacity(&self) -> usize { self.slots.len() }

    /// Reserves the first free slot, returning its index, or `None` if the device is full.
    /// Reserving does not record an owner; follow up with [`SwapTable::map_and_write_to_swapslot`].
    pub fn get_swapslot(&mut self) -> Option<usize> {
        let slot = self.slots.iter().position(Option::is_none)?;
        // Mark it provisionally occupied (with a dummy entry) so a second `get_swapslot` before
        // the write completes can't double-allocate it; `map_and_write_to_swapslot` overwrites this.
        self.slots[slot] = Some(SlotEntry { owner: ThreadId::MAX, vaddr: 0 });
        self.allocated += 1;
        Some(slot)
    }

    /// Frees `slot`, making it available for reuse.
    pub fn free_swapslot(&mut self, slot: usize) {
        if self.slots[slot].take().is_some() {
            self.allocated -= 1;
        }
    }

    /// Records `slot`'s owner and writes `page` (exactly `sectors_per_page * BLOCK_SECTOR_SIZE`
    /// bytes) to the sectors backing it.
    pub fn map_and_write_to_swapslot<B: BlockDevice>(
        &mut self,
        slot: usize,
        owner: ThreadId,
        vaddr: usize,
        page: &[u8],
        block: &mut B
    ) {
        debug_assert_eq!(page.len(), self.sectors_per_page * BLOCK_SECTOR_SIZE);
        self.slots[slot] = Some(SlotEntry { owner, vaddr });
        let base = self.slot_to_sector(slot);
        for i in 0..self.sectors_per_page {
            block.write(base + i, &page[i * BLOCK_SECTOR_SIZE..(i + 1) * BLOCK_SECTOR_SIZE]);
        }
    }

    /// Finds the slot holding `(owner, vaddr)`'s evicted page, if any (a linear scan, as spec.md
    /// §9 explicitly permits: "an implementer is free to use a hash map... without changing
    /// semantics", implying the naive scan is an acceptable baseline).
    pub fn find_in_swap(&self, owner: ThreadId, vaddr: usize) -> Option<usize> {
        self.slots.iter().position(|slot| {
            matches!(slot, Some(entry) if entry.owner == owner && entry.vaddr == vaddr)
        })
    }

    /// Reads `(owner, vaddr)`'s page back out of swap into `buf` and frees its slot. Returns
    /// `false` if no such page is in swap.
    pub fn get_from_swap<B: BlockDevice>(
        &mut self,
        owner: ThreadId,
        vaddr: usize,
        buf: &mut [u8],
        block: &mut B
    ) -> bool {
        let slot = match self.find_in_swap(owner, vaddr) {
            Some(slot) => slot,
            None => return false
        };
        debug_assert_eq!(buf.len(), self.sectors_per_page * BLOCK_SECTOR_SIZE);
        let base = self.slot_to_sector(slot);
        for i in 0..self.sectors_per_page {
            block.read(base + i, &mut buf[i * BLOCK_SECTOR_SIZE..(i + 1) * BLOCK_SECTOR_SIZE]);
        }
        self.free_swapslot(slot);
        true
    }
}

fn ceil_div(a: usize, b: usize) -> usize { (a + b - 1) / b }

#[cfg(test)]
mod tests {
    use super::*;
    use collab::block::SimBlockDevice;

    #[test]
    fn sizes_table_from_device_geometry() {
        let dev = SimBlockDevice::new(16);
        let table = SwapTable::new(&dev, 4096);
        assert_eq!(table.sectors_per_page(), 8);
        assert_eq!(table.capacity(), 2);
    }

    #[test]
    fn write_then_read_round_trips_and_frees_slot() {
        let mut dev = SimBlockDevice::new(16);
        let mut table = SwapTable::new(&dev, 4096);

        let slot = table.get_swapslot().unwrap();
        let page = alloc::vec![0xab; table.sectors_per_page() * BLOCK_SECTOR_SIZE];
        table.map_and_write_to_swapslot(slot, 5, 0x4000, &page, &mut dev);
        assert_eq!(table.allocated_count(), 1);

        let mut out = alloc::vec![0u8; table.sectors_per_page() * BLOCK_SECTOR_SIZE];
        assert!(table.get_from_swap(5, 0x4000, &mut out, &mut dev));
        assert_eq!(out, page);
        assert_eq!(table.allocated_count(), 0);
        assert_eq!(table.find_in_swap(5, 0x4000), None);
    }

    #[test]
    fn exhausted_swap_returns_none() {
        let dev = SimBlockDevice::new(8);
        let mut table = SwapTable::new(&dev, 4096);
        assert!(table.get_swapslot().is_some());
        assert!(table.get_swapslot().is_none());
    }
}
