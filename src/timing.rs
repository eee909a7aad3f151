//! Oscillator relative delays and bit timing (`CNF1`, `CNF2`, `CNF3`).

use crate::{
    error::ConfigError,
    regs::{Cnf1, Cnf2, Cnf3, SyncJumpWidth},
};

/// Oscillator cycles the chip needs to settle after a reset or mode request.
pub const SETTLE_CYCLES: u32 = 128;

/// Frequency of the oscillator attached to the MCP2515.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "ufmt", derive(ufmt::derive::uDebug))]
pub struct Oscillator {
    mhz: u8,
}

impl Oscillator {
    pub const MHZ8: Self = Self { mhz: 8 };
    pub const MHZ16: Self = Self { mhz: 16 };

    /// Creates an oscillator description. The MCP2515 supports 1 to 40 MHz.
    pub fn from_mhz(mhz: u8) -> Result<Self, ConfigError> {
        match mhz {
            1..=40 => Ok(Self { mhz }),
            _ => Err(ConfigError::InvalidOscillator(mhz)),
        }
    }

    #[inline]
    pub fn mhz(self) -> u8 {
        self.mhz
    }

    /// Time taken by `cycles` oscillator cycles in microseconds, rounded up.
    pub fn cycles_to_us(self, cycles: u32) -> u32 {
        let mhz = u32::from(self.mhz);
        (cycles + mhz - 1) / mhz
    }

    /// Settling time after a reset or an operation mode request.
    pub fn settle_time_us(self) -> u32 {
        self.cycles_to_us(SETTLE_CYCLES)
    }
}

/// Bit timing parameters.
///
/// Segment lengths are in time quanta. The registers are derived from the
/// segment parameters only, `baud_kbps` is checked for range but does not
/// influence the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "ufmt", derive(ufmt::derive::uDebug))]
pub struct BitTiming {
    /// Bus speed in kbps, 1-1000.
    pub baud_kbps: u16,
    /// Synchronization jump width, 1-4.
    pub sjw: u8,
    /// Baud rate prescaler, 0-63.
    pub prescaler: u8,
    /// Propagation segment, 1-8.
    pub prop_seg: u8,
    /// Phase segment 1, 1-8.
    pub phase_seg1: u8,
    /// Phase segment 2, 1-8.
    pub phase_seg2: u8,
    /// Sample the bus three times at the sample point.
    pub triple_sample: bool,
    /// Low-pass filter on the wake-up input.
    pub wake_filter: bool,
    /// Start-of-Frame signal on the CLKOUT pin.
    pub start_of_frame: bool,
    /// Phase segment 2 taken from `phase_seg2` rather than derived.
    pub btl_mode: bool,
}

impl BitTiming {
    /// Default segments for `baud_kbps`.
    pub const fn simplified(baud_kbps: u16) -> Self {
        Self {
            baud_kbps,
            sjw: 2,
            prescaler: 0,
            prop_seg: 2,
            phase_seg1: 2,
            phase_seg2: 3,
            triple_sample: false,
            wake_filter: false,
            start_of_frame: false,
            btl_mode: true,
        }
    }

    /// Checks ranges and segment consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=1000).contains(&self.baud_kbps) {
            return Err(ConfigError::InvalidBaudRate(self.baud_kbps));
        }
        if !(1..=4).contains(&self.sjw) {
            return Err(ConfigError::InvalidSyncJumpWidth(self.sjw));
        }
        if self.prescaler > 63 {
            return Err(ConfigError::InvalidPrescaler(self.prescaler));
        }
        for seg in [self.prop_seg, self.phase_seg1, self.phase_seg2] {
            if !(1..=8).contains(&seg) {
                return Err(ConfigError::InvalidSegment(seg));
            }
        }
        if self.phase_seg2 <= self.sjw {
            return Err(ConfigError::PhaseSeg2NotAboveSjw {
                phase_seg2: self.phase_seg2,
                sjw: self.sjw,
            });
        }
        if self.prop_seg + self.phase_seg1 < self.phase_seg2 {
            return Err(ConfigError::PhaseSeg2TooLong {
                prop_seg: self.prop_seg,
                phase_seg1: self.phase_seg1,
                phase_seg2: self.phase_seg2,
            });
        }
        Ok(())
    }

    /// Validates the parameters and packs them into the `CNF` registers.
    pub fn registers(&self) -> Result<(Cnf1, Cnf2, Cnf3), ConfigError> {
        self.validate()?;

        let sjw = match self.sjw {
            1 => SyncJumpWidth::Tq1,
            2 => SyncJumpWidth::Tq2,
            3 => SyncJumpWidth::Tq3,
            _ => SyncJumpWidth::Tq4,
        };
        let cnf1 = Cnf1::new().with_brp(self.prescaler).with_sjw(sjw);
        // PRSEG holds the segment length itself, 8 wraps to 0.
        let cnf2 = Cnf2::new()
            .with_prseg(self.prop_seg & 0x07)
            .with_phseg1(self.phase_seg1 - 1)
            .with_sam(self.triple_sample)
            .with_btlmode(self.btl_mode);
        let cnf3 = Cnf3::new()
            .with_phseg2(self.phase_seg2 - 1)
            .with_wakfil(self.wake_filter)
            .with_sof(self.start_of_frame);
        Ok((cnf1, cnf2, cnf3))
    }

    /// Raw `CNF1`, `CNF2` and `CNF3` content.
    pub fn compute(&self) -> Result<(u8, u8, u8), ConfigError> {
        let (cnf1, cnf2, cnf3) = self.registers()?;
        Ok((
            cnf1.into_bytes()[0],
            cnf2.into_bytes()[0],
            cnf3.into_bytes()[0],
        ))
    }
}

impl Default for BitTiming {
    fn default() -> Self {
        Self::simplified(500)
    }
}
