#![cfg_attr(not(test), no_std)]

//! Driver for the MCP2515 stand-alone CAN controller.
//!
//! The driver speaks the chip's SPI instruction set over any
//! [`embedded_hal`] SPI bus, chip-select pin and delay provider, so it runs on
//! microcontrollers and on hosts with a spidev style HAL alike.
//!
//! ```ignore
//! let mut can = MCP2515::new(spi, cs, delay, Oscillator::MHZ8);
//! can.init(&Settings { mode: OpMode::Loopback, ..Settings::default() })?;
//! can.send(&CanFrame::from_raw(0x420, false, &[0x69; 8]).unwrap())?;
//! let frame = can.try_receive()?;
//! ```

pub mod buffer;
pub mod error;
pub mod filter;
pub mod frame;
pub mod id;
pub(crate) mod macros;
pub mod regs;
pub mod stat;
pub mod timing;

#[cfg(test)]
pub(crate) mod mocks;
#[cfg(test)]
mod tests;

use core::fmt::Debug;

use embedded_hal::{
    blocking::{delay::DelayUs, spi::Transfer},
    can::Frame,
    digital::v2::OutputPin,
};
use log::{debug, trace, warn};

use crate::{
    buffer::{RxBuf, TxBuf, HEADER_LEN},
    error::{Error, Result, TxError},
    filter::{IdSpec, RxFilter, RxMask},
    frame::CanFrame,
    regs::{
        BitModifiable, CanCtrl, CanStat, ClkPre, Cnf1, Cnf2, Cnf3, OpMode, RecvBufOpMode, Reg,
        Register, Rxb0Ctrl, Rxb1Ctrl, TxbCtrl,
    },
    stat::{ErrorFlags, FrameKind, Interrupts, RxStatus, Status},
    timing::{BitTiming, Oscillator},
};

#[repr(u8)]
enum Instruction {
    Write = 0x02,
    Read = 0x03,
    Bitmod = 0x05,
    ReadRx0 = 0x90,
    ReadRx1 = 0x94,
    ReadStatus = 0xA0,
    RxStatus = 0xB0,
    Reset = 0xC0,
}

/// Size of the register block behind each buffer `CTRL` register.
const BUFFER_BLOCK_LEN: usize = 14;

/// Bytes sent per SPI transfer when writing sequential registers.
const WRITE_CHUNK: usize = 16;

/// Time given to a transmission before its `CTRL` register is checked.
pub const DEFAULT_TX_COMPLETION_DELAY_US: u32 = 750;

/// Settings used to initialize the MCP2515.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Settings {
    /// Device operation mode entered at the end of initialization.
    pub mode: OpMode,
    /// CAN bit timing.
    pub bit_timing: BitTiming,
    /// `CLKOUT` pin prescaler, `None` to disable the pin.
    pub clkout: Option<ClkPre>,
    /// Interrupts enabled on the `INT` pin.
    pub interrupts: Interrupts,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mode: OpMode::Normal,
            bit_timing: BitTiming::default(),
            clkout: None,
            interrupts: Interrupts::RX0 | Interrupts::RX1 | Interrupts::ERR | Interrupts::MERR,
        }
    }
}

/// MCP2515 driver.
///
/// The driver owns the bus, the chip select pin and the delay. All state of
/// the transmit and receive buffers is read from the chip on every call.
pub struct MCP2515<SPI, CS, D> {
    /// SPI interface to interact with the MCP2515.
    spi: SPI,
    /// Chip select pin to select the MCP2515.
    cs: CS,
    /// Delay used for settling times.
    delay: D,
    /// Oscillator attached to the MCP2515.
    oscillator: Oscillator,
    /// Wait between requesting a transmission and checking its result.
    tx_completion_delay_us: u32,
}

impl<SPI, CS, D, SPIE, CSE> MCP2515<SPI, CS, D>
where
    SPI: Transfer<u8, Error = SPIE>,
    CS: OutputPin<Error = CSE>,
    D: DelayUs<u32>,
    SPIE: Debug,
    CSE: Debug,
{
    /// Creates a new MCP2515 driver. Nothing is sent to the chip, call
    /// [`MCP2515::init`] or at least [`MCP2515::reset`] before anything else.
    ///
    /// # Configuration
    ///
    /// As this driver only takes ownership of the SPI interface, it is up to
    /// the user to create and configure the SPI interface. Namely, the MCP2515
    /// requires the following options:
    ///
    /// * **Data Order**: MSB first.
    /// * **Clock**: up to 10 MHz.
    /// * **Mode**: Mode 0 or Mode 3.
    ///
    /// # Parameters
    ///
    /// * `spi` - SPI interface.
    /// * `cs` - Chip-select pin for the MCP2515.
    /// * `delay` - Delay provider for the settling times.
    /// * `oscillator` - Oscillator frequency of the MCP2515.
    pub fn new(spi: SPI, cs: CS, delay: D, oscillator: Oscillator) -> Self {
        Self {
            spi,
            cs,
            delay,
            oscillator,
            tx_completion_delay_us: DEFAULT_TX_COMPLETION_DELAY_US,
        }
    }

    /// Sets how long [`MCP2515::send`] waits before checking the transmit
    /// result. Slow buses need longer than the default.
    pub fn with_tx_completion_delay(mut self, us: u32) -> Self {
        self.tx_completion_delay_us = us;
        self
    }

    /// Releases the SPI interface, chip select pin and delay.
    pub fn release(self) -> (SPI, CS, D) {
        (self.spi, self.cs, self.delay)
    }

    #[inline]
    pub fn oscillator(&self) -> Oscillator {
        self.oscillator
    }

    /// Initializes the MCP2515. This should be called once at the start of
    /// the program.
    ///
    /// Resets the chip, writes the bit timing, `CLKOUT` and interrupt
    /// enables, opens all masks so every frame is accepted, and finally
    /// switches to `settings.mode`, verifying the switch.
    pub fn init(&mut self, settings: &Settings) -> Result<(), SPIE, CSE> {
        let (cnf1, cnf2, cnf3) = settings.bit_timing.registers()?;

        self.cs.set_high().map_err(Error::Hal)?;
        self.reset()?;

        // Reset leaves the chip in configuration mode.
        let current = self.current_mode()?;
        if current != OpMode::Configuration {
            return Err(Error::ModeMismatch {
                requested: OpMode::Configuration,
                current,
            });
        }

        self.load_cnf(cnf1, cnf2, cnf3)?;
        self.set_clkout(settings.clkout)?;
        self.enable_interrupts(settings.interrupts)?;

        // Masks of zero let everything through. Odd filters take extended
        // frames so each buffer sees both formats.
        for mask in RxMask::ALL {
            self.write_registers(mask.sidh(), &IdSpec::extended(0).to_wire())?;
        }
        for filter in RxFilter::ALL {
            let spec = if filter.index() % 2 == 1 {
                IdSpec::extended(0)
            } else {
                IdSpec::standard(0)
            };
            self.write_registers(filter.sidh(), &spec.to_wire())?;
        }

        self.set_mode(settings.mode)
    }

    /// Resets the MCP2515.
    ///
    /// The chip enters configuration mode. After the settling time the
    /// control and identifier blocks of all five buffers are zeroed, since
    /// the reset does not clear them reliably.
    pub fn reset(&mut self) -> Result<(), SPIE, CSE> {
        debug!("resetting MCP2515");
        self.transfer(&mut [Instruction::Reset as u8])?;
        self.settle();

        let blank = [0u8; BUFFER_BLOCK_LEN];
        for buf in TxBuf::ALL {
            self.write_registers(buf.ctrl(), &blank)?;
        }
        for buf in RxBuf::ALL {
            self.write_registers(buf.ctrl(), &blank)?;
        }
        Ok(())
    }

    /// Requests an operation mode and waits out the settling time.
    ///
    /// The chip ignores requests it cannot honour without any indication.
    /// Use [`MCP2515::current_mode`] afterwards, or [`MCP2515::set_mode`].
    pub fn request_mode(&mut self, mode: OpMode) -> Result<(), SPIE, CSE> {
        debug!("requesting mode {:?}", mode);
        self.modify_register(CanCtrl::new().with_reqop(mode), CanCtrl::MASK_REQOP)?;
        self.settle();
        Ok(())
    }

    /// Reads the operation mode the chip is in.
    pub fn current_mode(&mut self) -> Result<OpMode, SPIE, CSE> {
        let canstat: CanStat = self.read_register()?;
        canstat
            .opmod_or_err()
            .map_err(|e| Error::UnknownMode(e.invalid_bytes()))
    }

    /// Requests an operation mode and verifies the chip entered it.
    pub fn set_mode(&mut self, mode: OpMode) -> Result<(), SPIE, CSE> {
        self.request_mode(mode)?;
        let current = self.current_mode()?;
        if current != mode {
            debug!("mode request {:?} ignored, chip is in {:?}", mode, current);
            return Err(Error::ModeMismatch {
                requested: mode,
                current,
            });
        }
        Ok(())
    }

    /// Wakes the chip from sleep mode into listen-only mode.
    ///
    /// Raises the wake-up interrupt flag with the wake-up interrupt enabled,
    /// restoring the previous enable and clearing the flag afterwards.
    pub fn wake(&mut self) -> Result<(), SPIE, CSE> {
        let enabled = self.interrupt_mask()?;
        if !enabled.contains(Interrupts::WAK) {
            self.modify_register_addr(Register::CANINTE, Interrupts::WAK.bits(), 0xFF)?;
        }

        self.modify_register_addr(Register::CANINTF, Interrupts::WAK.bits(), 0xFF)?;
        self.request_mode(OpMode::ListenOnly)?;

        if !enabled.contains(Interrupts::WAK) {
            self.modify_register_addr(Register::CANINTE, Interrupts::WAK.bits(), 0)?;
        }
        self.clear_interrupts(Interrupts::WAK)
    }

    /// Validates the bit timing and writes it to `CNF1`, `CNF2` and `CNF3`.
    ///
    /// Only allowed in configuration mode. Nothing is written if validation
    /// fails.
    pub fn configure_bit_timing(&mut self, timing: &BitTiming) -> Result<(), SPIE, CSE> {
        let (cnf1, cnf2, cnf3) = timing.registers()?;
        self.set_cnf(cnf1, cnf2, cnf3)
    }

    /// Writes raw `CNF` registers. Only allowed in configuration mode.
    pub fn set_cnf(&mut self, cnf1: Cnf1, cnf2: Cnf2, cnf3: Cnf3) -> Result<(), SPIE, CSE> {
        self.ensure_config_mode()?;
        self.load_cnf(cnf1, cnf2, cnf3)
    }

    /// Reads the `CNF` registers.
    pub fn read_cnf(&mut self) -> Result<(Cnf1, Cnf2, Cnf3), SPIE, CSE> {
        let mut ret = [0u8; 3];
        self.read_registers(Register::CNF3, &mut ret)?;
        let [cnf3, cnf2, cnf1] = ret;
        Ok((
            Cnf1::from_byte(cnf1),
            Cnf2::from_byte(cnf2),
            Cnf3::from_byte(cnf3),
        ))
    }

    fn load_cnf(&mut self, cnf1: Cnf1, cnf2: Cnf2, cnf3: Cnf3) -> Result<(), SPIE, CSE> {
        debug!(
            "CNF1 {:#04x} CNF2 {:#04x} CNF3 {:#04x}",
            cnf1.into_byte(),
            cnf2.into_byte(),
            cnf3.into_byte()
        );
        // CNF3, CNF2 and CNF1 are consecutive.
        self.write_registers(
            Register::CNF3,
            &[cnf3.into_byte(), cnf2.into_byte(), cnf1.into_byte()],
        )
    }

    /// Sets a receive filter. Only allowed in configuration mode.
    ///
    /// # Parameters
    ///
    /// * `filter` - The filter to action on.
    /// * `spec` - Identifier and frame format the filter accepts.
    pub fn configure_filter(&mut self, filter: RxFilter, spec: IdSpec) -> Result<(), SPIE, CSE> {
        self.ensure_config_mode()?;
        self.write_registers(filter.sidh(), &spec.to_wire())
    }

    /// Sets a receive mask. Only allowed in configuration mode.
    ///
    /// Mask 0 applies to filters 0 and 1, mask 1 to filters 2 to 5.
    pub fn configure_mask(&mut self, mask: RxMask, spec: IdSpec) -> Result<(), SPIE, CSE> {
        self.ensure_config_mode()?;
        self.write_registers(mask.sidh(), &spec.to_wire())
    }

    fn ensure_config_mode(&mut self) -> Result<(), SPIE, CSE> {
        match self.current_mode()? {
            OpMode::Configuration => Ok(()),
            mode => Err(Error::NotInConfigMode(mode)),
        }
    }

    /// Turns masks and filters of a receive buffer on or off.
    pub fn set_receive_mode(&mut self, buf: RxBuf, mode: RecvBufOpMode) -> Result<(), SPIE, CSE> {
        match buf {
            RxBuf::B0 => self.modify_register(Rxb0Ctrl::new().with_rxm(mode), Rxb0Ctrl::MASK_RXM),
            RxBuf::B1 => self.modify_register(Rxb1Ctrl::new().with_rxm(mode), Rxb1Ctrl::MASK_RXM),
        }
    }

    /// Lets frames accepted for a full RXB0 roll over into RXB1.
    pub fn set_rollover(&mut self, enabled: bool) -> Result<(), SPIE, CSE> {
        self.modify_register(Rxb0Ctrl::new().with_bukt(enabled), Rxb0Ctrl::MASK_BUKT)
    }

    /// Enables the `CLKOUT` pin with the given prescaler, or disables it.
    pub fn set_clkout(&mut self, prescaler: Option<ClkPre>) -> Result<(), SPIE, CSE> {
        let ctrl = match prescaler {
            Some(pre) => CanCtrl::new().with_clken(true).with_clkpre(pre),
            None => CanCtrl::new(),
        };
        self.modify_register(ctrl, CanCtrl::MASK_CLKEN | CanCtrl::MASK_CLKPRE)
    }

    /// One-shot mode: the chip attempts each transmission only once.
    pub fn set_one_shot(&mut self, enabled: bool) -> Result<(), SPIE, CSE> {
        self.modify_register(CanCtrl::new().with_osm(enabled), CanCtrl::MASK_OSM)
    }

    /// Requests abort of all pending transmissions. New transmissions are
    /// held back until this is set to `false` again.
    pub fn set_abort_all(&mut self, abort: bool) -> Result<(), SPIE, CSE> {
        self.modify_register(CanCtrl::new().with_abat(abort), CanCtrl::MASK_ABAT)
    }

    /// Sends a CAN frame over the CAN bus via the first free Tx buffer.
    ///
    /// Buffers are tried in order B0, B1, B2. Returns the buffer used.
    pub fn send(&mut self, frame: &CanFrame) -> Result<TxBuf, SPIE, CSE> {
        let buf = self
            .find_free_tx_buf()?
            .ok_or(Error::Tx(TxError::NoBufferAvailable))?;
        self.load_and_request(buf, frame)?;
        Ok(buf)
    }

    /// Sends a CAN frame over the CAN bus via a specific Tx buffer.
    ///
    /// # Parameters
    ///
    /// * `buf` - Tx buffer to use for transmission.
    /// * `frame` - Frame to send.
    pub fn send_via(&mut self, buf: TxBuf, frame: &CanFrame) -> Result<(), SPIE, CSE> {
        if self.read_txb_ctrl(buf)?.txreq() {
            return Err(TxError::NoBufferAvailable.into());
        }
        self.load_and_request(buf, frame)
    }

    /// Attempts to find a free Tx buffer.
    ///
    /// # Returns
    ///
    /// The first Tx buffer without a pending transmit request, `None` if all
    /// are busy.
    pub fn find_free_tx_buf(&mut self) -> Result<Option<TxBuf>, SPIE, CSE> {
        for buffer in TxBuf::ALL {
            let ctrl = self.read_txb_ctrl(buffer)?;
            trace!("{:?} ctrl {:#04x}", buffer, ctrl.into_bytes()[0]);
            if !ctrl.txreq() {
                debug!("using {:?}", buffer);
                return Ok(Some(buffer));
            }
        }
        debug!("no free tx buffer");
        Ok(None)
    }

    fn load_and_request(&mut self, buf: TxBuf, frame: &CanFrame) -> Result<(), SPIE, CSE> {
        let (header, data) = buffer::encode_tx(frame);
        let len = HEADER_LEN + data.len();
        let mut payload = [0u8; HEADER_LEN + 8];
        payload[..HEADER_LEN].copy_from_slice(&header);
        payload[HEADER_LEN..len].copy_from_slice(data);

        self.write_registers(buf.sidh(), &payload[..len])?;
        self.modify_register_addr(
            buf.ctrl(),
            TxbCtrl::MASK_TXREQ.into_bytes()[0],
            TxbCtrl::new().with_txreq(true).into_bytes()[0],
        )?;

        self.delay.delay_us(self.tx_completion_delay_us);

        let ctrl = self.read_txb_ctrl(buf)?;
        if ctrl.failed() {
            let raw = ctrl.into_bytes()[0];
            warn!("{:?} transmission failed, ctrl {:#04x}", buf, raw);
            return Err(TxError::TransmitFailed(raw).into());
        }
        if ctrl.txreq() {
            debug!("{:?} transmission still pending", buf);
            return Ok(());
        }
        self.clear_tx_interrupt(buf)
    }

    /// Clears the transmit-complete interrupt flag of a Tx buffer.
    pub fn clear_tx_interrupt(&mut self, buf: TxBuf) -> Result<(), SPIE, CSE> {
        self.clear_interrupts(match buf {
            TxBuf::B0 => Interrupts::TX0,
            TxBuf::B1 => Interrupts::TX1,
            TxBuf::B2 => Interrupts::TX2,
        })
    }

    /// Read the `CTRL` register of a Tx buffer.
    fn read_txb_ctrl(&mut self, buffer: TxBuf) -> Result<TxbCtrl, SPIE, CSE> {
        self.read_register_addr(buffer.ctrl())
            .map(|b| TxbCtrl::from_bytes([b]))
    }

    /// Reads a frame from the Rx buffers, RXB0 first.
    ///
    /// Only one buffer is read per call. While RXB0 keeps receiving, RXB1 is
    /// not looked at; use [`MCP2515::receive_from`] to drain a specific
    /// buffer.
    pub fn try_receive(&mut self) -> Result<Option<CanFrame>, SPIE, CSE> {
        let status = self.read_rx_status()?;
        let buf = if status.rxb0() {
            RxBuf::B0
        } else if status.rxb1() {
            RxBuf::B1
        } else {
            return Ok(None);
        };
        self.read_rx_buf(buf, status.kind_of(buf)).map(Some)
    }

    /// Reads a frame from a specific Rx buffer, if it holds one.
    ///
    /// # Parameters
    ///
    /// * `buf` - Rx buffer to read from.
    pub fn receive_from(&mut self, buf: RxBuf) -> Result<Option<CanFrame>, SPIE, CSE> {
        let status = self.read_rx_status()?;
        if !status.pending(buf) {
            return Ok(None);
        }
        self.read_rx_buf(buf, status.kind_of(buf)).map(Some)
    }

    /// Whether any Rx buffer holds a frame.
    pub fn message_pending(&mut self) -> Result<bool, SPIE, CSE> {
        let status = self.read_rx_status()?;
        Ok(status.rxb0() || status.rxb1())
    }

    /// Whether a specific Rx buffer holds a frame.
    pub fn message_pending_in(&mut self, buf: RxBuf) -> Result<bool, SPIE, CSE> {
        self.read_rx_status().map(|status| status.pending(buf))
    }

    /// Reads header and data of an Rx buffer with READ RX BUFFER, which
    /// clears the buffer's interrupt flag when chip select is released.
    fn read_rx_buf(&mut self, buf: RxBuf, kind: Option<FrameKind>) -> Result<CanFrame, SPIE, CSE> {
        let instruction = match buf {
            RxBuf::B0 => Instruction::ReadRx0,
            RxBuf::B1 => Instruction::ReadRx1,
        };
        let mut cmd = [instruction as u8];
        let mut header = [0u8; HEADER_LEN];

        let frame = self
            .with_cs(|spi| -> core::result::Result<CanFrame, SPIE> {
                spi.transfer(&mut cmd)?;
                spi.transfer(&mut header)?;
                let mut frame = buffer::decode_rx(header, kind);
                let n = usize::from(frame.dlc);
                if !frame.rtr && n > 0 {
                    spi.transfer(&mut frame.data[..n])?;
                }
                Ok(frame)
            })?
            .map_err(Error::Spi)?;

        debug!(
            "{:?}: id {:#x} ext {} rtr {} dlc {}",
            buf,
            frame.raw_id(),
            frame.is_extended(),
            frame.rtr,
            frame.dlc
        );
        Ok(frame)
    }

    /// Reads the status register.
    pub fn read_status(&mut self) -> Result<Status, SPIE, CSE> {
        let mut data = [Instruction::ReadStatus as u8, 0];
        self.transfer(&mut data)
            .map(|b| [b])
            .map(Status::from_bytes)
    }

    /// Reads the receive status: pending buffers, frame format and filter.
    pub fn read_rx_status(&mut self) -> Result<RxStatus, SPIE, CSE> {
        let mut data = [Instruction::RxStatus as u8, 0];
        let status = self
            .transfer(&mut data)
            .map(|b| [b])
            .map(RxStatus::from_bytes)?;
        trace!("rx status {:#04x}", status.into_bytes()[0]);
        Ok(status)
    }

    /// Reads the interrupt flags (`CANINTF`).
    pub fn interrupt_flags(&mut self) -> Result<Interrupts, SPIE, CSE> {
        self.read_register_addr(Register::CANINTF)
            .map(Interrupts::from_bits_truncate)
    }

    /// Clears the given interrupt flags, leaving all others untouched.
    pub fn clear_interrupts(&mut self, flags: Interrupts) -> Result<(), SPIE, CSE> {
        self.modify_register_addr(Register::CANINTF, flags.bits(), 0)
    }

    /// Clears every interrupt flag.
    pub fn clear_all_interrupts(&mut self) -> Result<(), SPIE, CSE> {
        self.write_register_addr(Register::CANINTF, 0)
    }

    /// Sets which interrupts drive the `INT` pin (`CANINTE`).
    pub fn enable_interrupts(&mut self, flags: Interrupts) -> Result<(), SPIE, CSE> {
        self.write_register_addr(Register::CANINTE, flags.bits())
    }

    /// Reads which interrupts drive the `INT` pin (`CANINTE`).
    pub fn interrupt_mask(&mut self) -> Result<Interrupts, SPIE, CSE> {
        self.read_register_addr(Register::CANINTE)
            .map(Interrupts::from_bits_truncate)
    }

    /// Reads the error flags (`EFLG`).
    pub fn error_flags(&mut self) -> Result<ErrorFlags, SPIE, CSE> {
        self.read_register_addr(Register::EFLG)
            .map(ErrorFlags::from_bits_truncate)
    }

    /// Clears the error interrupt flag.
    pub fn clear_error_interrupt(&mut self) -> Result<(), SPIE, CSE> {
        self.clear_interrupts(Interrupts::ERR)
    }

    /// Clears the receive buffer overflow flags in `EFLG`.
    pub fn clear_rx_overflow(&mut self) -> Result<(), SPIE, CSE> {
        let mask = ErrorFlags::RX0OVR | ErrorFlags::RX1OVR;
        self.modify_register_addr(Register::EFLG, mask.bits(), 0)
    }

    /// Reads the transmit error counter (`TEC`).
    pub fn tx_error_count(&mut self) -> Result<u8, SPIE, CSE> {
        self.read_register_addr(Register::TEC)
    }

    /// Reads the receive error counter (`REC`).
    pub fn rx_error_count(&mut self) -> Result<u8, SPIE, CSE> {
        self.read_register_addr(Register::REC)
    }

    /// Read a register via a register object.
    #[inline]
    pub fn read_register<R: Reg>(&mut self) -> Result<R, SPIE, CSE> {
        self.read_register_addr(R::ADDRESS).map(R::from_byte)
    }

    /// Write to a register using a register object.
    #[inline]
    pub fn write_register<R: Reg>(&mut self, reg: R) -> Result<(), SPIE, CSE> {
        self.write_register_addr(R::ADDRESS, reg.into_byte())
    }

    /// Modifies a register.
    ///
    /// # Parameters
    ///
    /// * `reg` - New register content.
    /// * `mask` - Mask register. The bits must be 1 in the positions you want
    ///   to modify.
    #[inline]
    pub fn modify_register<R: BitModifiable>(&mut self, reg: R, mask: R) -> Result<(), SPIE, CSE> {
        self.modify_register_addr(R::ADDRESS, mask.into_byte(), reg.into_byte())
    }

    /// Reads a single register.
    pub fn read_register_addr(&mut self, reg: Register) -> Result<u8, SPIE, CSE> {
        let mut data = [Instruction::Read as u8, reg as u8, 0];
        self.transfer(&mut data)
    }

    /// Writes a single register.
    pub fn write_register_addr(&mut self, reg: Register, value: u8) -> Result<(), SPIE, CSE> {
        let mut data = [Instruction::Write as u8, reg as u8, value];
        self.transfer(&mut data)?;
        Ok(())
    }

    /// Reads registers starting from `reg` sequentially, moving on to the next
    /// register until `ret` is full.
    ///
    /// # Parameters
    ///
    /// * `reg` - Register to start reading from.
    /// * `ret` - Return slice to write into.
    pub fn read_registers(&mut self, reg: Register, ret: &mut [u8]) -> Result<(), SPIE, CSE> {
        let mut hdr = [Instruction::Read as u8, reg as u8];
        ret.fill(0);
        self.with_cs(|spi| -> core::result::Result<(), SPIE> {
            spi.transfer(&mut hdr)?;
            // The MCP2515 ignores what it receives while reading, the zeroed
            // `ret` is overwritten with the register content.
            spi.transfer(ret)?;
            Ok(())
        })?
        .map_err(Error::Spi)
    }

    /// Writes to sequential registers. Writing will start at `reg` and continue
    /// sequentially until `data` is empty.
    pub fn write_registers(&mut self, reg: Register, data: &[u8]) -> Result<(), SPIE, CSE> {
        trace!("write {:?} {:02x?}", reg, data);
        let mut hdr = [Instruction::Write as u8, reg as u8];
        self.with_cs(|spi| -> core::result::Result<(), SPIE> {
            spi.transfer(&mut hdr)?;
            for chunk in data.chunks(WRITE_CHUNK) {
                let mut buf = [0u8; WRITE_CHUNK];
                let buf = &mut buf[..chunk.len()];
                buf.copy_from_slice(chunk);
                spi.transfer(buf)?;
            }
            Ok(())
        })?
        .map_err(Error::Spi)
    }

    /// Modifies the bits of `reg` selected by `mask` with BIT MODIFY.
    ///
    /// # Parameters
    ///
    /// * `reg` - Register to modify, must support BIT MODIFY.
    /// * `mask` - Bits to change.
    /// * `data` - New values for the bits in `mask`.
    pub fn modify_register_addr(&mut self, reg: Register, mask: u8, data: u8) -> Result<(), SPIE, CSE> {
        let mut data = [
            Instruction::Bitmod as u8, // BIT MODIFY
            reg as u8,                 // Register address
            mask,                      // Modify mask byte
            data,                      // Data byte
        ];
        self.transfer(&mut data)?;
        Ok(())
    }

    /// Waits 128 oscillator cycles.
    fn settle(&mut self) {
        self.delay.delay_us(self.oscillator.settle_time_us());
    }

    /// Transfers an array of bytes via SPI, returning the slave response inside
    /// the given mutable bytes array.
    ///
    /// # Returns
    ///
    /// Returns the last element received from the slave. If no bytes were sent,
    /// 0 is returned.
    fn transfer(&mut self, bytes: &mut [u8]) -> Result<u8, SPIE, CSE> {
        self.with_cs(|spi| spi.transfer(bytes).map(|_| ()))?
            .map_err(Error::Spi)?;
        if let [.., data] = bytes {
            Ok(*data)
        } else {
            Ok(0)
        }
    }

    /// Calls a function `f` after bringing the chip select pin low, restoring
    /// it to high after the function has finished.
    fn with_cs<T>(&mut self, f: impl FnOnce(&mut SPI) -> T) -> Result<T, SPIE, CSE> {
        self.cs.set_low().map_err(Error::Hal)?;
        let result = f(&mut self.spi);
        self.cs.set_high().map_err(Error::Hal)?;
        Ok(result)
    }
}

impl<SPI, CS, D, SPIE, CSE> embedded_hal::blocking::can::Can for MCP2515<SPI, CS, D>
where
    SPI: Transfer<u8, Error = SPIE>,
    CS: OutputPin<Error = CSE>,
    D: DelayUs<u32>,
    SPIE: Debug,
    CSE: Debug,
{
    type Frame = CanFrame;
    type Error = Error<SPIE, CSE>;

    #[inline]
    fn transmit(&mut self, frame: &Self::Frame) -> Result<(), SPIE, CSE> {
        self.send(frame).map(|_| ())
    }

    #[inline]
    fn receive(&mut self) -> Result<Self::Frame, SPIE, CSE> {
        self.try_receive()?.ok_or(Error::NoMessage)
    }
}

impl<SPI, CS, D, SPIE, CSE> embedded_hal::can::nb::Can for MCP2515<SPI, CS, D>
where
    SPI: Transfer<u8, Error = SPIE>,
    CS: OutputPin<Error = CSE>,
    D: DelayUs<u32>,
    SPIE: Debug,
    CSE: Debug,
{
    type Frame = CanFrame;
    type Error = Error<SPIE, CSE>;

    fn transmit(&mut self, frame: &Self::Frame) -> nb::Result<Option<Self::Frame>, Self::Error> {
        match self.send(frame) {
            Ok(_) => Ok(None),
            Err(Error::Tx(TxError::NoBufferAvailable)) => Err(nb::Error::WouldBlock),
            Err(e) => Err(nb::Error::Other(e)),
        }
    }

    fn receive(&mut self) -> nb::Result<Self::Frame, Self::Error> {
        match self.try_receive() {
            Ok(Some(frame)) => Ok(frame),
            Ok(None) => Err(nb::Error::WouldBlock),
            Err(e) => Err(nb::Error::Other(e)),
        }
    }
}
