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

//! The block-device collaborator (spec.md §6), narrowed to exactly what the swap manager needs:
//! find the device with the `SWAP` role, learn its size in sectors, and read/write whole sectors.
//! The filesystem and its own block device are out of scope (spec.md §1); this crate only models
//! the swap device.

use alloc::vec::Vec;

/// The fixed sector size every block device uses, regardless of role.
pub const BLOCK_SECTOR_SIZE: usize = 512;

/// Which role a block device plays. The core only ever asks for [`Role::Swap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The swap device `vm::swap` reads and writes evicted pages to.
    Swap
}

/// A block device: a fixed number of [`BLOCK_SECTOR_SIZE`]-byte sectors, addressed by index.
pub trait BlockDevice {
    /// The number of sectors this device holds.
    fn size(&self) -> usize;
    /// Reads sector `sector` into `buf`, which must be exactly [`BLOCK_SECTOR_SIZE`] bytes.
    fn read(&mut self, sector: usize, buf: &mut [u8]);
    /// Writes `buf` (exactly [`BLOCK_SECTOR_SIZE`] bytes) to sector `sector`.
    fn write(&mut self, sector: usize, buf: &[u8]);
}

/// Looks up the block device with the given role. The simulation only ever has a swap device, so
/// this just hands back the one it was given.
pub fn block_get_role<'a, B: BlockDevice>(role: Role, swap: &'a mut B) -> Option<&'a mut B> {
    match role {
        Role::Swap => Some(swap)
    }
}

/// An in-memory stand-in for a real swap block device: `sector_count` sectors of zeroed bytes.
#[derive(Debug)]
pub struct SimBlockDevice {
    sectors: Vec<[u8; BLOCK_SECTOR_SIZE]>
}

impl SimBlockDevice {
    /// Creates a device with `sector_count` zeroed sectors.
    pub fn new(sector_count: usize) -> SimBlockDevice {
        SimBlockDevice { sectors: alloc::vec![[0u8; BLOCK_SECTOR_SIZE]; sector_count] }
    }
}

impl BlockDevice for SimBlockDevice {
    fn size(&self) -> usize { self.sectors.len() }

    fn read(&mut self, sector: usize, buf: &mut [u8]) {
        assert_eq!(buf.len(), BLOCK_SECTOR_SIZE, "block reads must be exactly one sector");
        buf.copy_from_slice(&self.sectors[sector]);
    }

    fn write(&mut self, sector: usize, buf: &[u8]) {
        assert_eq!(buf.len(), BLOCK_SECTOR_SIZE, "block writes must be exactly one sector");
        self.sectors[sector].copy_from_slice(buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips() {
        let mut dev = SimBlockDevice::new(4);
        let mut data = [0u8; BLOCK_SECTOR_SIZE];
        data[0] = 0xab;
        data[BLOCK_SECTOR_SIZE - 1] = 0xcd;
        dev.write(2, &data);

        let mut out = [0u8; BLOCK_SECTOR_SIZE];
        dev.read(2, &mut out);
        assert_eq!(out, data);
    }

    #[test]
    fn sectors_start_zeroed() {
        let mut dev = SimBlockDevice::new(1);
        let mut out = [0xffu8; BLOCK_SECTOR_SIZE];
        dev.read(0, &mut out);
        assert_eq!(out, [0u8; BLOCK_SECTOR_SIZE]);
    }
}
