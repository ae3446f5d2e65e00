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

//! A 17.14 signed fixed-point type, used by the MLFQS scheduler for `load_avg` and `recent_cpu`.
//! The representation is a plain `i64`: a value `v` encodes the real number `v / 2^14`. Integer
//! overflow is not guarded against, exactly as in the scheduler this type was built for--the
//! quantities it carries (load averages, recent-CPU accumulators) never approach `i64::MAX`.

#![no_std]

#![deny(warnings, missing_docs)]

use core::ops::{Add, Sub};

/// The number of fractional bits (the "14" in "17.14").
pub const Q: u32 = 14;

/// `2^Q`, the scale factor between a `Fixed` value and the integer it's built from.
const F: i64 = 1 << Q;

/// A 17.14 fixed-point number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Fixed(i64);

impl Fixed {
    /// The value zero.
    pub const ZERO: Fixed = Fixed(0);

    /// Converts an integer to fixed-point.
    pub const fn from_int(n: i32) -> Fixed {
        Fixed((n as i64) << Q)
    }

    /// Returns the raw 17.14 representation, mostly useful for tests and debugging.
    pub const fn into_raw(self) -> i64 {
        self.0
    }

    /// Builds a `Fixed` from its raw 17.14 representation.
    pub const fn from_raw(raw: i64) -> Fixed {
        Fixed(raw)
    }

    /// `self + from_int(n)`.
    pub const fn add_int(self, n: i32) -> Fixed {
        Fixed(self.0 + Fixed::from_int(n).0)
    }

    /// `self - from_int(n)`.
    pub const fn sub_int(self, n: i32) -> Fixed {
        Fixed(self.0 - Fixed::from_int(n).0)
    }

    /// Fixed-point multiplication, computed in the wide (`i128`) domain to avoid intermediate
    /// overflow, then scaled back down by `F`.
    pub fn mul(self, other: Fixed) -> Fixed {
        Fixed((((self.0 as i128) * (other.0 as i128)) >> Q) as i64)
    }

    /// Fixed-point division: `(self << Q) / other`, also computed in the wide domain.
    pub fn div(self, other: Fixed) -> Fixed {
        Fixed((((self.0 as i128) << Q) / (other.0 as i128)) as i64)
    }

    /// Multiplies by a plain integer: `self * n`.
    pub const fn mul_int(self, n: i32) -> Fixed {
        Fixed(self.0 * n as i64)
    }

    /// Divides by a plain integer: `self / n`.
    pub const fn div_int(self, n: i32) -> Fixed {
        Fixed(self.0 / n as i64)
    }

    /// Truncates toward zero, the way a C cast from `fxpoint` to `int` does.
    pub const fn to_int_zero(self) -> i32 {
        (self.0 >> Q) as i32
    }

    /// Rounds to the nearest integer, ties rounding away from zero.
    pub const fn to_int_nearest(self) -> i32 {
        if self.0 >= 0 {
            ((self.0 + F / 2) / F) as i32
        } else {
            ((self.0 - F / 2) / F) as i32
        }
    }
}

impl Add for Fixed {
    type Output = Fixed;
    fn add(self, other: Fixed) -> Fixed { Fixed(self.0 + other.0) }
}

impl Sub for Fixed {
    type Output = Fixed;
    fn sub(self, other: Fixed) -> Fixed { Fixed(self.0 - other.0) }
}

/// The coefficients used by the MLFQS load-average and recent-CPU formulas (spec.md §4.1).
pub mod mlfqs {
    use super::Fixed;

    /// `59/60`, the decay coefficient applied to the previous `load_avg`.
    pub fn load_avg_decay() -> Fixed {
        Fixed::from_int(59).div(Fixed::from_int(60))
    }

    /// `1/60`, the weight given to the current `ready_threads` count.
    pub fn load_avg_gain() -> Fixed {
        Fixed::from_int(1).div(Fixed::from_int(60))
    }

    /// `load_avg' = (59/60)*load_avg + (1/60)*ready_threads`.
    pub fn next_load_avg(load_avg: Fixed, ready_threads: u32) -> Fixed {
        load_avg_decay().mul(load_avg) + load_avg_gain().mul_int(ready_threads as i32)
    }

    /// `recent_cpu' = (2*load_avg / (2*load_avg + 1)) * recent_cpu + nice`.
    pub fn next_recent_cpu(recent_cpu: Fixed, load_avg: Fixed, nice: i32) -> Fixed {
        let twice_load_avg = load_avg.mul_int(2);
        let coeff = twice_load_avg.div(twice_load_avg.add_int(1));
        coeff.mul(recent_cpu).add_int(nice)
    }

    /// `priority = clamp(PRI_MAX - round(recent_cpu/4) - nice*2, PRI_MIN, PRI_MAX)`.
    pub fn priority(recent_cpu: Fixed, nice: i32, pri_min: i32, pri_max: i32) -> i32 {
        let raw = pri_max - recent_cpu.div_int(4).to_int_nearest() - nice * 2;
        raw.clamp(pri_min, pri_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_zero_and_small() {
        for n in [-1000, -1, 0, 1, 1000, i32::MIN / 4, i32::MAX / 4] {
            assert_eq!(Fixed::from_int(n).to_int_zero(), n);
        }
    }

    #[test]
    fn nearest_rounds_both_directions() {
        let half = Fixed::from_raw(F / 2);
        assert_eq!((Fixed::from_int(1) - half).to_int_nearest(), 1);
        assert_eq!((Fixed::from_int(1) + half).to_int_nearest(), 2);
        assert_eq!(Fixed::ZERO.to_int_nearest(), 0);
    }

    #[test]
    fn mul_div_are_inverse_for_exact_quotients() {
        let x = Fixed::from_int(10);
        let y = Fixed::from_int(4);
        assert_eq!(x.div(y).mul(y).to_int_nearest(), 10);
    }

    #[test]
    fn priority_clamps_at_bounds() {
        let recent_cpu = Fixed::from_int(1000);
        assert_eq!(mlfqs::priority(recent_cpu, 20, 0, 63), 0);
        assert_eq!(mlfqs::priority(Fixed::ZERO, -20, 0, 63), 63);
    }

    #[test]
    fn load_avg_formula_matches_spec_example() {
        // With no ready threads and load_avg already 0, it should stay at 0.
        let next = mlfqs::next_load_avg(Fixed::ZERO, 0);
        assert_eq!(next, Fixed::ZERO);
        // With one ready thread starting from 0, load_avg becomes 1/60.
        let next = mlfqs::next_load_avg(Fixed::ZERO, 1);
        assert_eq!(next.to_int_zero(), 0);
        assert!(next.into_raw() > 0);
    }
}
