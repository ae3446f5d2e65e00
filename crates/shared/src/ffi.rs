/* Copyright (c) 2018-2021 Jeremy Davis (jeremydavis519@gmail.com)
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

//! This module defines various helpful abstractions to use when interfacing with things outside of
//! Rust, namely the small integer codes that stand in for enums at the boundaries of this kernel
//! (on-disk swap slot kinds, syscall numbers, wire statuses and the like).

use core::fmt;
use crate::error::Error;

/// Wraps enum definitions with specific `#[repr]`s, adding a way to convert from an integer to the
/// enum type.
#[macro_export]
macro_rules! ffi_enum {
    ($(
        #[repr( $base_type:tt )]
        $(#[$post_attr:meta])*
        $vis:vis enum $enum:ident {
            $(
                $(#[$variant_attr:meta])*
                $variant:ident $(= $val:expr)?
            ),* $(,)?
        }
      )*) => {
        $(
            #[repr($base_type)]
            $(#[$post_attr])*
            $vis enum $enum {
                $(
                    $(#[$variant_attr])*
                    $variant $(= $val)?
                ),*
            }
            impl core::convert::TryFrom<$base_type> for $enum {
                type Error = $crate::ffi::InvalidVariantError<$base_type>;

                fn try_from(value: $base_type) -> Result<$enum, Self::Error> {
                    match value {
                        $(x if x == $enum::$variant as $base_type => Ok($enum::$variant),)*
                        value => Err($crate::ffi::InvalidVariantError::new(stringify!($enum), value))
                    }
                }
            }
            impl From<$enum> for $base_type {
                fn from(value: $enum) -> $base_type {
                    value as $base_type
                }
            }
        )*
    };
}

/// Represents an error that can occur when trying to convert an integer to a variant of an enum
/// defined by the `ffi_enum` macro.
#[derive(Debug)]
pub struct InvalidVariantError<T: Into<Int128>+Copy+core::fmt::Debug> {
    enum_type: &'static str,
    value: T
}

impl<T: Into<Int128>+Copy+core::fmt::Debug> InvalidVariantError<T> {
    /// Makes a new instance of the error for the given enum type and integer value. (The meaning
    /// is that this integer cannot be converted to the enum type.)
    pub fn new(enum_type: &'static str, value: T) -> InvalidVariantError<T> {
        InvalidVariantError { enum_type, value }
    }
}

impl<T: Into<Int128>+Copy+core::fmt::Debug> Error for InvalidVariantError<T> {}

impl<T: Into<Int128>+Copy+core::fmt::Debug> fmt::Display for InvalidVariantError<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "attempted to construct a variant of enum `{}` from invalid numeric representation {}", self.enum_type, self.value.into())
    }
}

// A signed or unsigned 128-bit number. This exists only to make `InvalidVariantError` work with
// `#[repr(u128)]` enums.
#[doc(hidden)]
#[derive(Debug)]
pub enum Int128 {
    Signed(i128),
    Unsigned(u128)
}
impl fmt::Display for Int128 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::Signed(x) => x.fmt(f),
            Self::Unsigned(x) => x.fmt(f)
        }
    }
}
macro_rules! impl_into_int128 {
    ($type:ty, $sign:ident) => {
        impl From<$type> for Int128 {
            fn from(x: $type) -> Int128 {
                Int128::$sign(x.into())
            }
        }
    };
}
impl_into_int128!(i8, Signed);
impl_into_int128!(u8, Unsigned);
impl_into_int128!(i16, Signed);
impl_into_int128!(u16, Unsigned);
impl_into_int128!(i32, Signed);
impl_into_int128!(u32, Unsigned);
impl_into_int128!(i64, Signed);
impl_into_int128!(u64, Unsigned);
impl_into_int128!(i128, Signed);
impl_into_int128!(u128, Unsigned);
