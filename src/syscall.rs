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

//! Numeric codes for the system-call surface named in spec.md §6. The dispatcher that reads these
//! off a user stack and the handlers behind them are out of this crate's scope (spec.md §1's
//! Non-goals); what belongs here is just the wire format, the same way `collab::block::Role` names
//! a block device's role without implementing a driver for one.
//!
//! The numbering follows the conventional Pintos `syscall-nr.h` ordering (HALT first, then the
//! process life cycle, then file operations, then the two VM calls tacked on last).

ffi_enum! {
    #[repr(u32)]
    /// A system-call number, as pushed onto the user stack before a syscall instruction traps into
    /// the kernel.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum SyscallNumber {
        /// Shuts the machine down.
        Halt = 0,
        /// Terminates the current process, recording its exit status.
        Exit = 1,
        /// Runs an executable as a child process.
        Exec = 2,
        /// Waits for a child process to exit, returning its exit status.
        Wait = 3,
        /// Creates a new file.
        Create = 4,
        /// Deletes a file.
        Remove = 5,
        /// Opens a file, returning a file descriptor.
        Open = 6,
        /// Returns the size of an open file.
        Filesize = 7,
        /// Reads from an open file or the keyboard.
        Read = 8,
        /// Writes to an open file or the console.
        Write = 9,
        /// Changes the next byte to be read or written in an open file.
        Seek = 10,
        /// Returns the position of the next byte to be read or written in an open file.
        Tell = 11,
        /// Closes a file descriptor.
        Close = 12,
        /// Maps a file into a process's virtual address space (spec.md §4.7).
        Mmap = 13,
        /// Unmaps a previously-mapped file, writing dirty pages back (spec.md §4.7).
        Munmap = 14,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::TryFrom;
    use shared::ffi::InvalidVariantError;

    #[test]
    fn round_trips_through_its_wire_value() {
        for n in &[
            SyscallNumber::Halt, SyscallNumber::Exit, SyscallNumber::Exec, SyscallNumber::Wait,
            SyscallNumber::Create, SyscallNumber::Remove, SyscallNumber::Open,
            SyscallNumber::Filesize, SyscallNumber::Read, SyscallNumber::Write,
            SyscallNumber::Seek, SyscallNumber::Tell, SyscallNumber::Close,
            SyscallNumber::Mmap, SyscallNumber::Munmap
        ] {
            let wire: u32 = (*n).into();
            assert_eq!(SyscallNumber::try_from(wire).unwrap(), *n);
        }
    }

    #[test]
    fn rejects_unknown_numbers() {
        let err: InvalidVariantError<u32> = SyscallNumber::try_from(255).unwrap_err();
        assert_eq!(alloc::format!("{}", err),
            "attempted to construct a variant of enum `SyscallNumber` from invalid numeric representation 255");
    }
}
