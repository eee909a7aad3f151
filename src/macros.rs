#[macro_export]
#[doc(hidden)]
macro_rules! dummy {
    ($t:expr) => {
        ()
    };
}

/// Defines a fixed set of chip slots (buffers, filters, masks) as an enum.
///
/// Every slot names the first register of its `SIDH`, `SIDL`, `EID8`, `EID0`
/// block. Conversion from a slot index fails with `$err(index)`.
#[macro_export]
#[doc(hidden)]
macro_rules! slot_def {
    (
        $(#[doc = $doc:expr])*
        $name:ident($err:path) => {
            $(
                $(#[doc = $slot_doc:expr])*
                $slot:ident => $sidh:expr
            ),*
        }
    ) => {
        $(#[doc = $doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        #[cfg_attr(feature = "defmt", derive(defmt::Format))]
        #[cfg_attr(feature = "ufmt", derive(ufmt::derive::uDebug))]
        pub enum $name {
            $(
                $(#[doc = $slot_doc])*
                $slot,
            )*
        }

        impl $name {
            #[doc = concat!("All valid options for [`", stringify!($name), "`], in priority order.")]
            pub const ALL: [Self; <[_]>::len(&[$($crate::dummy!($slot)),*])] = [$(Self::$slot),*];

            #[doc = concat!("Returns the `SIDH` register, first of the identifier block of the [`", stringify!($name), "`].")]
            pub const fn sidh(self) -> $crate::regs::Register {
                match self {
                    $(Self::$slot => $sidh,)*
                }
            }

            /// Index of the slot on the chip.
            #[inline]
            pub const fn index(self) -> u8 {
                self as u8
            }
        }

        impl core::convert::TryFrom<u8> for $name {
            type Error = $crate::error::ConfigError;

            fn try_from(index: u8) -> core::result::Result<Self, Self::Error> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|slot| slot.index() == index)
                    .ok_or($err(index))
            }
        }
    };
}
