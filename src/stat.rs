//! Status, interrupt and error flag registers.

use bitflags::bitflags;
use modular_bitfield::prelude::*;

use crate::buffer::RxBuf;

/// Response to the READ STATUS instruction.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Status {
    #[skip(setters)]
    pub rx0if: bool,
    #[skip(setters)]
    pub rx1if: bool,
    #[skip(setters)]
    pub tx0req: bool,
    #[skip(setters)]
    pub tx0if: bool,
    #[skip(setters)]
    pub tx1req: bool,
    #[skip(setters)]
    pub tx1if: bool,
    #[skip(setters)]
    pub tx2req: bool,
    #[skip(setters)]
    pub tx2if: bool,
}

/// Filter which accepted the frame, as reported by RX STATUS.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, BitfieldSpecifier)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "ufmt", derive(ufmt::derive::uDebug))]
#[bits = 3]
pub enum FilterMatch {
    Rxf0,
    Rxf1,
    Rxf2,
    Rxf3,
    Rxf4,
    Rxf5,
    /// RXF0, rolled over into RXB1.
    Rxf0Rollover,
    /// RXF1, rolled over into RXB1.
    Rxf1Rollover,
}

/// Format of the received frame, as reported by RX STATUS.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, BitfieldSpecifier)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "ufmt", derive(ufmt::derive::uDebug))]
#[bits = 2]
pub enum FrameKind {
    StandardData,
    StandardRemote,
    ExtendedData,
    ExtendedRemote,
}

impl FrameKind {
    pub const fn new(extended: bool, remote: bool) -> Self {
        match (extended, remote) {
            (false, false) => FrameKind::StandardData,
            (false, true) => FrameKind::StandardRemote,
            (true, false) => FrameKind::ExtendedData,
            (true, true) => FrameKind::ExtendedRemote,
        }
    }

    #[inline]
    pub const fn is_extended(self) -> bool {
        matches!(self, FrameKind::ExtendedData | FrameKind::ExtendedRemote)
    }

    #[inline]
    pub const fn is_remote(self) -> bool {
        matches!(self, FrameKind::StandardRemote | FrameKind::ExtendedRemote)
    }
}

/// Response to the RX STATUS instruction.
///
/// When both buffers hold a frame, `filter` and `kind` describe RXB0.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RxStatus {
    #[skip(setters)]
    pub filter: FilterMatch,
    #[skip(setters)]
    pub kind: FrameKind,
    #[skip]
    __: B1,
    /// Frame pending in RXB0.
    #[skip(setters)]
    pub rxb0: bool,
    /// Frame pending in RXB1.
    #[skip(setters)]
    pub rxb1: bool,
}

impl RxStatus {
    /// Whether `buf` holds a frame.
    pub fn pending(self, buf: RxBuf) -> bool {
        match buf {
            RxBuf::B0 => self.rxb0(),
            RxBuf::B1 => self.rxb1(),
        }
    }

    /// Frame kind of `buf`, if this status describes that buffer.
    pub fn kind_of(self, buf: RxBuf) -> Option<FrameKind> {
        let describes = match buf {
            RxBuf::B0 => self.rxb0(),
            RxBuf::B1 => self.rxb1() && !self.rxb0(),
        };
        describes.then(|| self.kind())
    }
}

bitflags! {
    /// `CANINTF` flags, also used for the `CANINTE` enables.
    #[derive(Default)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct Interrupts: u8 {
        /// Receive buffer 0 full.
        const RX0 = 0b0000_0001;
        /// Receive buffer 1 full.
        const RX1 = 0b0000_0010;
        /// Transmit buffer 0 empty.
        const TX0 = 0b0000_0100;
        /// Transmit buffer 1 empty.
        const TX1 = 0b0000_1000;
        /// Transmit buffer 2 empty.
        const TX2 = 0b0001_0000;
        /// Error flag change in `EFLG`.
        const ERR = 0b0010_0000;
        /// Wake-up.
        const WAK = 0b0100_0000;
        /// Message error.
        const MERR = 0b1000_0000;
    }
}

bitflags! {
    /// `EFLG` register.
    #[derive(Default)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct ErrorFlags: u8 {
        /// `TEC` or `REC` is at least 96.
        const EWARN = 0b0000_0001;
        /// `REC` is at least 96.
        const RXWAR = 0b0000_0010;
        /// `TEC` is at least 96.
        const TXWAR = 0b0000_0100;
        /// Receive error-passive, `REC` is at least 128.
        const RXEP = 0b0000_1000;
        /// Transmit error-passive, `TEC` is at least 128.
        const TXEP = 0b0001_0000;
        /// Bus-off, `TEC` reached 255.
        const TXBO = 0b0010_0000;
        /// Receive buffer 0 overflow.
        const RX0OVR = 0b0100_0000;
        /// Receive buffer 1 overflow.
        const RX1OVR = 0b1000_0000;
    }
}

impl ErrorFlags {
    /// Flags past the warning level: error-passive, bus-off and overflows.
    pub const ERRORS: Self = Self::from_bits_truncate(0b1111_1000);

    /// Whether any error-passive, bus-off or overflow flag is set.
    #[inline]
    pub fn has_errors(self) -> bool {
        self.intersects(Self::ERRORS)
    }

    #[inline]
    pub fn is_bus_off(self) -> bool {
        self.contains(Self::TXBO)
    }

    #[inline]
    pub fn is_error_passive(self) -> bool {
        self.intersects(Self::RXEP | Self::TXEP)
    }
}
