use embedded_hal::can::{ExtendedId, Frame, Id, StandardId};

use crate::id;

/// Maximum number of data bytes in a CAN frame.
pub const MAX_DLC: u8 = 8;

/// CAN frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanFrame {
    /// ID of CAN frame.
    pub(crate) id: Id,
    /// Whether the frame is an RTR frame.
    pub(crate) rtr: bool,
    /// Length of data in CAN frame.
    pub(crate) dlc: u8,
    /// Data, maximum 8 bytes. Bytes past `dlc` are zero.
    pub(crate) data: [u8; 8],
}

impl CanFrame {
    /// Creates a data frame from a raw identifier.
    ///
    /// `id` is truncated to 11 or 29 bits depending on `extended`. Returns
    /// `None` if `data` is longer than 8 bytes.
    pub fn from_raw(id: u32, extended: bool, data: &[u8]) -> Option<Self> {
        Frame::new(raw_id(id, extended)?, data)
    }

    /// Creates a remote frame from a raw identifier.
    ///
    /// Returns `None` if `dlc` is larger than 8.
    pub fn remote_from_raw(id: u32, extended: bool, dlc: usize) -> Option<Self> {
        Frame::new_remote(raw_id(id, extended)?, dlc)
    }

    /// Identifier as a plain integer, without the format.
    pub fn raw_id(&self) -> u32 {
        match self.id {
            Id::Standard(id) => u32::from(id.as_raw()),
            Id::Extended(id) => id.as_raw(),
        }
    }

    /// All 8 data bytes, including the ones past the DLC.
    #[inline]
    pub fn payload(&self) -> &[u8; 8] {
        &self.data
    }
}

fn raw_id(id: u32, extended: bool) -> Option<Id> {
    let id = id & id::mask(extended);
    if extended {
        ExtendedId::new(id).map(Id::Extended)
    } else {
        StandardId::new(id as u16).map(Id::Standard)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for CanFrame {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(
            fmt,
            "CanFrame {{ id: {:#X}, extended: {}, rtr: {}, dlc: {}, data: {:#X} }}",
            self.raw_id(),
            self.is_extended(),
            self.rtr,
            self.dlc,
            self.data
        );
    }
}

impl Frame for CanFrame {
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        if data.len() > usize::from(MAX_DLC) {
            return None;
        }
        let mut frame = CanFrame {
            id: id.into(),
            rtr: false,
            dlc: data.len() as u8, // Already asserted data.len() <= 8
            data: [0; 8],
        };
        frame.data[..data.len()].copy_from_slice(data);
        Some(frame)
    }

    fn new_remote(id: impl Into<Id>, dlc: usize) -> Option<Self> {
        if dlc > usize::from(MAX_DLC) {
            return None;
        }
        Some(CanFrame {
            id: id.into(),
            rtr: true,
            dlc: dlc as u8, // Already asserted dlc <= 8
            data: [0; 8],
        })
    }

    #[inline]
    fn is_extended(&self) -> bool {
        matches!(self.id, Id::Extended(_))
    }

    #[inline]
    fn is_remote_frame(&self) -> bool {
        self.rtr
    }

    #[inline]
    fn id(&self) -> Id {
        self.id
    }

    #[inline]
    fn dlc(&self) -> usize {
        self.dlc as usize
    }

    /// Data bytes on the wire. Remote frames carry none.
    #[inline]
    fn data(&self) -> &[u8] {
        if self.rtr {
            &[]
        } else {
            &self.data[..self.dlc()]
        }
    }
}
