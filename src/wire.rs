// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! C-like enums with a fixed integer representation on the wire.
//!
//! Firmware formats are full of type tags: CBFS file types, FIT entry types,
//! TPM algorithm identifiers. [`WireEnum`] is the common interface for all of
//! them, and `wire_enum!` generates the boilerplate.

use core::fmt;

/// A type tag with a fixed integer encoding and a symbolic name.
///
/// Every variant maps to exactly one wire value and one name, and both
/// mappings invert:
/// ```
/// # use fwimage::wire::WireEnum;
/// # fn test<T: WireEnum + Copy + PartialEq + std::fmt::Debug>(x: T) {
/// assert_eq!(T::from_wire_value(x.to_wire_value()), Some(x));
/// assert_eq!(T::from_name(x.name()), Some(x));
/// # }
/// ```
/// The converse does not hold: most wire values name no variant, and
/// decoders keep those as raw integers.
pub trait WireEnum: Sized + Copy {
    /// The integer type the tag is stored as.
    type Wire;

    /// Converts `self` into its underlying wire representation.
    fn to_wire_value(self) -> Self::Wire;

    /// Looks up the variant for a raw wire value.
    fn from_wire_value(wire: Self::Wire) -> Option<Self>;

    /// Returns the variant's name, as written in the source.
    fn name(self) -> &'static str;

    /// Looks up a variant by name.
    fn from_name(str: &str) -> Option<Self>;
}

/// Returned by `FromStr` for names that match no variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct WireEnumFromStrError;

impl fmt::Display for WireEnumFromStrError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "unknown variant")
    }
}

/// Declares an enum and implements [`WireEnum`], `Display` and `FromStr`
/// for it.
///
/// ```text
/// wire_enum! {
///     /// A CBFS file type.
///     pub enum FileType : u32 {
///         /// A stage.
///         Stage = 0x10,
///         /// A payload.
///         Payload = 0x20,
///     }
/// }
/// ```
macro_rules! wire_enum {
    ($(#[$meta:meta])* $vis:vis enum $name:ident : $wire:ident {
        $($(#[$meta_variant:meta])* $variant:ident = $value:tt,)*
    }) => {
        $(#[$meta])*
        #[repr($wire)]
        #[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
        $vis enum $name {
           $(
               $(#[$meta_variant])*
               $variant = $value,
           )*
        }

        impl $crate::wire::WireEnum for $name {
            type Wire = $wire;
            fn to_wire_value(self) -> Self::Wire {
                match self {
                    $(
                        Self::$variant => $value,
                    )*
                }
            }
            fn from_wire_value(wire: Self::Wire) -> Option<Self> {
                match wire {
                    $(
                        $value => Some(Self::$variant),
                    )*
                    _ => None,
                }
            }

            fn name(self) -> &'static str {
                match self {
                    $(
                        Self::$variant => stringify!($variant),
                    )*
                }
            }

            fn from_name(name: &str) -> Option<Self> {
                match name {
                    $(
                        stringify!($variant) => Some(Self::$variant),
                    )*
                    _ => None,
                }
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
                use $crate::wire::WireEnum;

                write!(f, "{}", self.name())
            }
        }

        impl core::str::FromStr for $name {
            type Err = $crate::wire::WireEnumFromStrError;

            fn from_str(
                s: &str
            ) -> core::result::Result<
                Self,
                $crate::wire::WireEnumFromStrError
            > {
                use $crate::wire::WireEnum;

                match $name::from_name(s) {
                    Some(val) => Ok(val),
                    None => Err($crate::wire::WireEnumFromStrError),
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    wire_enum! {
        /// An enum for testing.
        pub enum DemoEnum: u32 {
            /// Unknown value
            Unknown = 0x00,

            /// First enum value
            First = 0x01,

            /// Sentinel value
            Sentinel = 0xffffffff,
        }
    }

    #[test]
    fn from_name() {
        use crate::wire::*;

        let value = DemoEnum::from_name("Sentinel").expect("from_name failed");
        assert_eq!(value, DemoEnum::Sentinel);

        let value = DemoEnum::from_name("First").expect("from_name failed");
        assert_eq!(value, DemoEnum::First);

        assert_eq!(None, DemoEnum::from_name("does not exist"));
    }

    #[test]
    fn wire_values() {
        use crate::wire::*;

        assert_eq!(DemoEnum::from_wire_value(0xffffffff), Some(DemoEnum::Sentinel));
        assert_eq!(DemoEnum::from_wire_value(2), None);
        assert_eq!(DemoEnum::First.to_wire_value(), 1);
        assert_eq!(DemoEnum::First.to_string(), "First");
    }
}
