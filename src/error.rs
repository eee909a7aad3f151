use core::fmt::Debug;

use embedded_hal::can::ErrorKind;

use crate::regs::OpMode;

pub type Result<T, SPIE, CSE> = core::result::Result<T, Error<SPIE, CSE>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<SPIE, CSE> {
    /// SPI transfer failed.
    Spi(SPIE),
    /// Chip select pin could not be driven.
    Hal(CSE),
    /// Invalid configuration, nothing was written to the chip.
    Config(ConfigError),
    /// Transmission could not be started or was reported failed.
    Tx(TxError),
    /// `CANSTAT.OPMOD` holds a code which is not an operation mode.
    UnknownMode(u8),
    /// Read-back after a mode request shows a different mode.
    ModeMismatch { requested: OpMode, current: OpMode },
    /// Operation is only allowed in configuration mode.
    NotInConfigMode(OpMode),
    /// No frame pending in either receive buffer.
    NoMessage,
}

/// Invalid parameters, detected before any register is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "ufmt", derive(ufmt::derive::uDebug))]
pub enum ConfigError {
    /// Oscillator frequency outside of 1-40 MHz.
    InvalidOscillator(u8),
    /// Bit rate outside of 1-1000 kbps.
    InvalidBaudRate(u16),
    /// Synchronization jump width outside of 1-4.
    InvalidSyncJumpWidth(u8),
    /// Baud rate prescaler above 63.
    InvalidPrescaler(u8),
    /// Propagation or phase segment outside of 1-8.
    InvalidSegment(u8),
    /// Phase segment 2 must be longer than the synchronization jump width.
    PhaseSeg2NotAboveSjw { phase_seg2: u8, sjw: u8 },
    /// Propagation plus phase segment 1 must be at least phase segment 2.
    PhaseSeg2TooLong { prop_seg: u8, phase_seg1: u8, phase_seg2: u8 },
    /// No filter with this index (0-5).
    InvalidFilter(u8),
    /// No mask with this index (0-1).
    InvalidMask(u8),
    /// No buffer with this index.
    InvalidBuffer(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "ufmt", derive(ufmt::derive::uDebug))]
pub enum TxError {
    /// All transmit buffers have a pending request. Retry later.
    NoBufferAvailable,
    /// The chip flagged a bus error, lost arbitration or an abort. Holds the
    /// raw `TXBnCTRL` content. The frame is not retried.
    TransmitFailed(u8),
}

impl<SPIE, CSE> From<ConfigError> for Error<SPIE, CSE> {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl<SPIE, CSE> From<TxError> for Error<SPIE, CSE> {
    fn from(e: TxError) -> Self {
        Error::Tx(e)
    }
}

impl<SPIE: Debug, CSE: Debug> embedded_hal::can::Error for Error<SPIE, CSE> {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}
