//! Acceptance filters and masks.
//!
//! The wiring between filters, masks and receive buffers is fixed by the chip
//! and is **not** one mask per filter:
//!
//! | Filters    | Mask  | Buffer |
//! |------------|-------|--------|
//! | RXF0, RXF1 | RXM0  | RXB0   |
//! | RXF2-RXF5  | RXM1  | RXB1   |
//!
//! Filters and masks can only be written in configuration mode.

use crate::{buffer::RxBuf, error::ConfigError, id, regs::Register};

/// Identifier to load into a filter or mask.
///
/// For a filter `extended` also selects which frame format the filter
/// accepts. For a mask it only selects the layout of `id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "ufmt", derive(ufmt::derive::uDebug))]
pub struct IdSpec {
    pub id: u32,
    pub extended: bool,
}

impl IdSpec {
    pub const fn standard(id: u32) -> Self {
        Self {
            id,
            extended: false,
        }
    }

    pub const fn extended(id: u32) -> Self {
        Self { id, extended: true }
    }

    /// Register image in register order, via the identifier layout.
    pub fn to_wire(self) -> [u8; 4] {
        id::encode(self.id, self.extended)
    }
}

crate::slot_def! {
    /// Receive filters.
    RxFilter(ConfigError::InvalidFilter) => {
        /// RXF0
        F0 => Register::RXF0SIDH,
        /// RXF1
        F1 => Register::RXF1SIDH,
        /// RXF2
        F2 => Register::RXF2SIDH,
        /// RXF3
        F3 => Register::RXF3SIDH,
        /// RXF4
        F4 => Register::RXF4SIDH,
        /// RXF5
        F5 => Register::RXF5SIDH
    }
}

impl RxFilter {
    /// Mask gating this filter.
    pub const fn mask(self) -> RxMask {
        match self {
            RxFilter::F0 | RxFilter::F1 => RxMask::Mask0,
            _ => RxMask::Mask1,
        }
    }

    /// Buffer receiving frames accepted by this filter (before rollover).
    pub const fn buffer(self) -> RxBuf {
        match self {
            RxFilter::F0 | RxFilter::F1 => RxBuf::B0,
            _ => RxBuf::B1,
        }
    }
}

crate::slot_def! {
    /// Receive masks.
    RxMask(ConfigError::InvalidMask) => {
        /// Mask 0, gates RXF0 and RXF1.
        Mask0 => Register::RXM0SIDH,
        /// Mask 1, gates RXF2 to RXF5.
        Mask1 => Register::RXM1SIDH
    }
}

impl RxMask {
    /// Filters gated by this mask.
    pub fn filters(self) -> &'static [RxFilter] {
        match self {
            RxMask::Mask0 => &[RxFilter::F0, RxFilter::F1],
            RxMask::Mask1 => &[RxFilter::F2, RxFilter::F3, RxFilter::F4, RxFilter::F5],
        }
    }
}
