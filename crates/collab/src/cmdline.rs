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

//! Kernel command-line parsing (spec.md §6). The only switch the core cares about is `-o mlfqs`,
//! which selects the MLFQS scheduler; its absence selects priority scheduling with donation.

/// Which scheduling discipline the command line asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulingPolicy {
    /// Priority scheduling with donation through locks (the default).
    PriorityDonation,
    /// The multi-level feedback queue scheduler.
    Mlfqs
}

/// Scans a whitespace-separated command line for `-o mlfqs`, the way Pintos's own kernel command
/// line passes options through to `thread_init`. Any other `-o` option is ignored; this crate
/// doesn't know about the rest of the kernel's switches.
pub fn scheduling_policy(cmdline: &str) -> SchedulingPolicy {
    let mut words = cmdline.split_whitespace();
    while let Some(word) = words.next() {
        if word == "-o" {
            if let Some(option) = words.next() {
                if option == "mlfqs" {
                    return SchedulingPolicy::Mlfqs;
                }
            }
        }
    }
    SchedulingPolicy::PriorityDonation
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_priority_donation() {
        assert_eq!(scheduling_policy(""), SchedulingPolicy::PriorityDonation);
        assert_eq!(scheduling_policy("-q -vga no"), SchedulingPolicy::PriorityDonation);
    }

    #[test]
    fn recognizes_mlfqs_switch() {
        assert_eq!(scheduling_policy("-o mlfqs"), SchedulingPolicy::Mlfqs);
        assert_eq!(scheduling_policy("-q -o mlfqs -vga no"), SchedulingPolicy::Mlfqs);
    }

    #[test]
    fn ignores_unrelated_o_options() {
        assert_eq!(scheduling_policy("-o something-else"), SchedulingPolicy::PriorityDonation);
    }
}
