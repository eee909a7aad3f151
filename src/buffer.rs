//! Transmit and receive buffers, and the frame layout inside them.
//!
//! Buffer state (pending request, frame received) lives in the chip only. The
//! descriptors here are plain register addresses and are never cached.

use embedded_hal::can::{ExtendedId, Frame, Id, StandardId};
use modular_bitfield::prelude::*;

use crate::{
    error::ConfigError,
    frame::{CanFrame, MAX_DLC},
    id::{self, IdRegs},
    regs::Register,
    stat::FrameKind,
};

/// Identifier registers followed by the `DLC` register.
pub const HEADER_LEN: usize = 5;

/// `TXBnDLC` / `RXBnDLC` register.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DlcReg {
    /// Size of data packet, 0-8. The chip may report up to 15.
    pub dlc: B4,
    #[skip]
    __: B2,
    /// Remote transmission request. On receive only valid for extended
    /// frames, standard remote frames set `SRR` instead.
    pub rtr: bool,
    #[skip]
    __: B1,
}

crate::slot_def! {
    /// Transmit buffer. Scanned in declaration order when looking for a free one.
    TxBuf(ConfigError::InvalidBuffer) => {
        /// Tx buffer 0.
        B0 => Register::TXB0SIDH,
        /// Tx buffer 1.
        B1 => Register::TXB1SIDH,
        /// Tx buffer 2.
        B2 => Register::TXB2SIDH
    }
}

impl TxBuf {
    /// Returns the `CTRL` register for the selected Tx buffer.
    pub const fn ctrl(self) -> Register {
        match self {
            TxBuf::B0 => Register::TXB0CTRL,
            TxBuf::B1 => Register::TXB1CTRL,
            TxBuf::B2 => Register::TXB2CTRL,
        }
    }
}

crate::slot_def! {
    /// Receive buffer. RXB0 has priority over RXB1.
    RxBuf(ConfigError::InvalidBuffer) => {
        /// Rx buffer 0.
        B0 => Register::RXB0SIDH,
        /// Rx buffer 1.
        B1 => Register::RXB1SIDH
    }
}

impl RxBuf {
    /// Returns the `CTRL` register for the selected Rx buffer.
    pub const fn ctrl(self) -> Register {
        match self {
            RxBuf::B0 => Register::RXB0CTRL,
            RxBuf::B1 => Register::RXB1CTRL,
        }
    }
}

/// Builds the header (`SIDH`, `SIDL`, `EID8`, `EID0`, `DLC`) of an outgoing
/// frame and returns it with the data bytes to write after it.
pub fn encode_tx(frame: &CanFrame) -> ([u8; HEADER_LEN], &[u8]) {
    let [sidh, sidl, eid8, eid0] = id::encode(frame.raw_id(), frame.is_extended());
    let dlc = DlcReg::new()
        .with_dlc(frame.dlc.min(MAX_DLC))
        .with_rtr(frame.rtr)
        .into_bytes()[0];
    ([sidh, sidl, eid8, eid0, dlc], frame.data())
}

/// Decodes the header of a received frame.
///
/// `kind` comes from RX STATUS when it describes this buffer. Without it the
/// format is taken from `IDE`, and remote frames from `SRR` (standard) or the
/// `DLC` `RTR` bit (extended). The DLC is clamped to 8, the data bytes are
/// left zeroed for the caller to fill.
pub fn decode_rx(header: [u8; HEADER_LEN], kind: Option<FrameKind>) -> CanFrame {
    let [sidh, sidl, eid8, eid0, dlc] = header;
    let regs = IdRegs::from_wire([sidh, sidl, eid8, eid0]);
    let dlc = DlcReg::from_bytes([dlc]);

    let kind = kind.unwrap_or_else(|| {
        let extended = regs.exide();
        let remote = if extended { dlc.rtr() } else { regs.srr() };
        FrameKind::new(extended, remote)
    });
    let raw = id::decode([sidh, sidl, eid8, eid0], kind.is_extended());

    CanFrame {
        id: to_id(raw, kind.is_extended()),
        rtr: kind.is_remote(),
        dlc: dlc.dlc().min(MAX_DLC),
        data: [0; 8],
    }
}

fn to_id(raw: u32, extended: bool) -> Id {
    // `id::decode` never exceeds the 11/29 bit range.
    if extended {
        Id::Extended(ExtendedId::new(raw).unwrap_or(ExtendedId::MAX))
    } else {
        Id::Standard(StandardId::new(raw as u16).unwrap_or(StandardId::MAX))
    }
}
