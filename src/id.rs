//! CAN identifier layout in the `SIDH`, `SIDL`, `EID8` and `EID0` registers.
//!
//! The same four byte layout is shared by the transmit buffers, the receive
//! buffers, the acceptance filters and the acceptance masks:
//!
//! ```text
//! SIDH: SID10 .. SID3
//! SIDL: SID2 SID1 SID0 SRR EXIDE - EID17 EID16
//! EID8: EID15 .. EID8
//! EID0: EID7 .. EID0
//! ```
//!
//! Extended identifiers put their 11 most significant bits into the `SID`
//! field and the remaining 18 bits into `EID`.

use modular_bitfield::prelude::*;

/// Mask of a standard (11 bit) identifier.
pub const STANDARD_MASK: u32 = 0x7FF;
/// Mask of an extended (29 bit) identifier.
pub const EXTENDED_MASK: u32 = 0x1FFF_FFFF;

/// Identifier registers concatenated into one 32 bit register.
///
/// Bytes are stored `EID0` first, use [`IdRegs::from_wire`] and
/// [`IdRegs::to_wire`] to convert from and to register order.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IdRegs {
    /// Extended identifier.
    pub eid: B18,
    #[skip]
    __: B1,
    /// Extended identifier enable (`EXIDE` / `IDE`).
    pub exide: bool,
    /// Standard frame remote transmit request, receive buffers only.
    #[skip(setters)]
    pub srr: bool,
    /// Standard identifier.
    pub sid: B11,
}

impl IdRegs {
    /// Builds the registers from bytes in register order (`SIDH` first).
    pub fn from_wire(bytes: [u8; 4]) -> Self {
        let [sidh, sidl, eid8, eid0] = bytes;
        Self::from_bytes([eid0, eid8, sidl, sidh])
    }

    /// Register content in register order (`SIDH` first).
    pub fn to_wire(self) -> [u8; 4] {
        let [eid0, eid8, sidl, sidh] = self.into_bytes();
        [sidh, sidl, eid8, eid0]
    }
}

/// Returns the identifier mask for the frame format.
#[inline]
pub const fn mask(extended: bool) -> u32 {
    if extended {
        EXTENDED_MASK
    } else {
        STANDARD_MASK
    }
}

/// Packs an identifier into `SIDH`, `SIDL`, `EID8` and `EID0`.
///
/// Bits above the 11 (standard) or 29 (extended) identifier bits are
/// truncated, not rejected. Extended identifiers set `EXIDE`.
pub fn encode(id: u32, extended: bool) -> [u8; 4] {
    let id = id & mask(extended);
    let regs = if extended {
        IdRegs::new()
            .with_exide(true)
            .with_eid(id & 0x3FFFF) // Lower 18 bits go into EID
            .with_sid((id >> 18) as u16) // Upper 11 bits go into SID
    } else {
        IdRegs::new().with_exide(false).with_sid(id as u16)
    };
    regs.to_wire()
}

/// Unpacks an identifier from `SIDH`, `SIDL`, `EID8` and `EID0`.
///
/// `extended` selects the layout, the `EXIDE` bit itself is not consulted.
pub fn decode(bytes: [u8; 4], extended: bool) -> u32 {
    let regs = IdRegs::from_wire(bytes);
    let sid = u32::from(regs.sid());
    if extended {
        (sid << 18) | regs.eid()
    } else {
        sid
    }
}
