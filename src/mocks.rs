use std::{cell::RefCell, rc::Rc};

use embedded_hal::{
    blocking::{delay::DelayUs, spi::Transfer},
    digital::v2::OutputPin,
};
use mockall::mock;

use crate::{id, timing::Oscillator, MCP2515};

mock! {
    pub SPIBus {}

    impl Transfer<u8> for SPIBus {
        type Error = u32;

        fn transfer<'w>(&mut self, words: &'w mut [u8]) -> Result<&'static [u8], u32>;
    }
}

mock! {
    pub Pin {}

    impl OutputPin for Pin {
        type Error = u32;

        fn set_low(&mut self) -> Result<(), u32>;
        fn set_high(&mut self) -> Result<(), u32>;
    }
}

/// Delay which only records the requested durations.
#[derive(Debug, Default)]
pub struct RecordingDelay {
    pub calls: Vec<u32>,
}

impl DelayUs<u32> for RecordingDelay {
    fn delay_us(&mut self, us: u32) {
        self.calls.push(us);
    }
}

const CANSTAT: usize = 0x0E;
const CANCTRL: usize = 0x0F;
const CANINTF: usize = 0x2C;
const EFLG: usize = 0x2D;
const TXB_CTRL: [usize; 3] = [0x30, 0x40, 0x50];
const RXB_CTRL: [usize; 2] = [0x60, 0x70];
const FILTERS: [usize; 6] = [0x00, 0x04, 0x08, 0x10, 0x14, 0x18];
const MASKS: [usize; 2] = [0x20, 0x24];

const TXREQ: u8 = 0x08;
const RXRTR: u8 = 0x08;
const SRR: u8 = 0x10;
const IDE: u8 = 0x08;
const DLC_RTR: u8 = 0x40;

/// Register level model of an MCP2515.
///
/// Understands every SPI instruction the driver uses. Frames requested for
/// transmission in loopback mode are run through the acceptance filters and
/// delivered into the receive buffers. In every other mode they stay pending.
#[derive(Debug)]
pub struct SimChip {
    pub regs: [u8; 128],
    /// Instruction byte of every chip select window, in order.
    pub instructions: Vec<u8>,
    /// OPMOD stays at this mode regardless of requests.
    pub stuck_mode: Option<u8>,
    /// Error bits reported in `TXBnCTRL` for every transmission.
    pub tx_error: u8,
    /// Every SPI transfer fails.
    pub fail_transfers: bool,
    /// Filter match per receive buffer, as reported by RX STATUS.
    filhit: [u8; 2],
    window: Option<Window>,
}

#[derive(Debug, Default)]
struct Window {
    instruction: Option<u8>,
    address: Option<usize>,
    mask: Option<u8>,
}

impl SimChip {
    pub fn new() -> Self {
        let mut chip = Self {
            regs: [0; 128],
            instructions: Vec::new(),
            stuck_mode: None,
            tx_error: 0,
            fail_transfers: false,
            filhit: [0; 2],
            window: None,
        };
        chip.reset();
        chip
    }

    fn reset(&mut self) {
        self.regs = [0; 128];
        self.regs[CANCTRL] = 0x87;
        self.regs[CANSTAT] = 0x80;
        self.filhit = [0; 2];
    }

    fn select(&mut self) {
        self.window = Some(Window::default());
    }

    fn deselect(&mut self) {
        if let Some(window) = self.window.take() {
            match window.instruction {
                Some(0x90) => self.regs[CANINTF] &= !0x01,
                Some(0x94) => self.regs[CANINTF] &= !0x02,
                _ => {}
            }
            self.process_tx();
        }
    }

    fn exchange(&mut self, byte: u8) -> u8 {
        let mut window = match self.window.take() {
            Some(window) => window,
            None => return 0,
        };
        let response = self.step(&mut window, byte);
        self.window = Some(window);
        response
    }

    fn step(&mut self, window: &mut Window, byte: u8) -> u8 {
        let instruction = match window.instruction {
            Some(instruction) => instruction,
            None => {
                window.instruction = Some(byte);
                self.instructions.push(byte);
                match byte {
                    0xC0 => self.reset(),
                    0x90 => window.address = Some(0x61),
                    0x94 => window.address = Some(0x71),
                    _ => {}
                }
                return 0;
            }
        };

        match instruction {
            0x03 | 0x02 | 0x05 if window.address.is_none() => {
                window.address = Some(usize::from(byte) & 0x7F);
                0
            }
            0x03 | 0x90 | 0x94 => {
                let address = window.address.unwrap_or(0);
                window.address = Some((address + 1) & 0x7F);
                self.regs[address]
            }
            0x02 => {
                let address = window.address.unwrap_or(0);
                window.address = Some((address + 1) & 0x7F);
                self.write(address, 0xFF, byte);
                0
            }
            0x05 => {
                match window.mask {
                    None => window.mask = Some(byte),
                    Some(mask) => {
                        let address = window.address.unwrap_or(0);
                        self.write(address, mask, byte);
                    }
                }
                0
            }
            0xA0 => self.status(),
            0xB0 => self.rx_status(),
            _ => 0,
        }
    }

    fn write(&mut self, address: usize, mask: u8, data: u8) {
        let rx_readonly = RXB_CTRL
            .iter()
            .any(|ctrl| address > *ctrl && address < ctrl + 14);
        if address == CANSTAT || rx_readonly {
            return;
        }
        let old = self.regs[address];
        self.regs[address] = (old & !mask) | (data & mask);

        if address == CANCTRL {
            let mode = self.stuck_mode.unwrap_or(self.regs[CANCTRL] >> 5);
            self.regs[CANSTAT] = (self.regs[CANSTAT] & 0x1F) | (mode << 5);
        }
    }

    fn mode(&self) -> u8 {
        self.regs[CANSTAT] >> 5
    }

    fn status(&self) -> u8 {
        let intf = self.regs[CANINTF];
        let req = |n: usize| (self.regs[TXB_CTRL[n]] & TXREQ) >> 3;
        (intf & 0x01)
            | (intf & 0x02)
            | (req(0) << 2)
            | ((intf & 0x04) << 1)
            | (req(1) << 4)
            | ((intf & 0x08) << 2)
            | (req(2) << 6)
            | ((intf & 0x10) << 3)
    }

    fn rx_status(&self) -> u8 {
        let intf = self.regs[CANINTF];
        let pending = ((intf & 0x01) << 6) | ((intf & 0x02) << 6);
        let described = if intf & 0x01 != 0 {
            Some(0)
        } else if intf & 0x02 != 0 {
            Some(1)
        } else {
            None
        };
        match described {
            Some(n) => {
                let base = RXB_CTRL[n];
                let sidl = self.regs[base + 2];
                let extended = sidl & IDE != 0;
                let remote = if extended {
                    self.regs[base + 5] & DLC_RTR != 0
                } else {
                    sidl & SRR != 0
                };
                let kind = (u8::from(extended) << 1) | u8::from(remote);
                pending | (kind << 3) | self.filhit[n]
            }
            None => pending,
        }
    }

    /// Places a frame into a receive buffer as if it came from the bus.
    pub fn inject(&mut self, buf: usize, raw_id: u32, extended: bool, remote: bool, data: &[u8]) {
        let base = RXB_CTRL[buf];
        let mut header = id::encode(raw_id, extended);
        if remote && !extended {
            header[1] |= SRR;
        }
        self.regs[base + 1..base + 5].copy_from_slice(&header);
        let mut dlc = data.len() as u8;
        if remote && extended {
            dlc |= DLC_RTR;
        }
        self.regs[base + 5] = dlc;
        self.regs[base + 6..base + 6 + data.len()].copy_from_slice(data);
        if remote {
            self.regs[base] |= RXRTR;
        }
        self.regs[CANINTF] |= 1 << buf;
    }

    fn process_tx(&mut self) {
        for (n, ctrl) in TXB_CTRL.iter().copied().enumerate() {
            if self.regs[ctrl] & TXREQ == 0 {
                continue;
            }
            if self.tx_error != 0 {
                self.regs[ctrl] |= self.tx_error;
                continue;
            }
            if self.mode() != 0b010 {
                continue;
            }
            self.deliver(ctrl);
            self.regs[ctrl] &= !TXREQ;
            self.regs[CANINTF] |= 0x04 << n;
        }
    }

    fn accepts(&self, filter: usize, mask: usize, header: &[u8]) -> bool {
        let wire = |base: usize| {
            [
                self.regs[base],
                self.regs[base + 1],
                self.regs[base + 2],
                self.regs[base + 3],
            ]
        };
        let frame_ext = header[1] & IDE != 0;
        let filter_wire = wire(filter);
        if (filter_wire[1] & IDE != 0) != frame_ext {
            return false;
        }
        let frame_id = id::decode([header[0], header[1], header[2], header[3]], frame_ext);
        let filter_id = id::decode(filter_wire, frame_ext);
        let mask_id = id::decode(wire(mask), frame_ext);
        (frame_id ^ filter_id) & mask_id == 0
    }

    fn matching_filter(&self, filters: &[usize], mask: usize, header: &[u8]) -> Option<usize> {
        filters
            .iter()
            .position(|filter| self.accepts(*filter, mask, header))
    }

    fn deliver(&mut self, ctrl: usize) {
        let mut header = [0u8; 5];
        header.copy_from_slice(&self.regs[ctrl + 1..ctrl + 6]);
        let extended = header[1] & IDE != 0;
        let remote = header[4] & DLC_RTR != 0;
        let len = usize::from(header[4] & 0x0F).min(8);
        let mut data = [0u8; 8];
        if !remote {
            data[..len].copy_from_slice(&self.regs[ctrl + 6..ctrl + 6 + len]);
        }

        let filter_off = [0, 1].map(|buf| self.regs[RXB_CTRL[buf]] & 0x60 == 0x60);
        let full = [0, 1].map(|buf| self.regs[CANINTF] & (1 << buf) != 0);

        let hit0 = if filter_off[0] {
            Some(0)
        } else {
            self.matching_filter(&FILTERS[..2], MASKS[0], &header)
        };
        let hit1 = if filter_off[1] {
            Some(2)
        } else {
            self.matching_filter(&FILTERS[2..], MASKS[1], &header)
                .map(|n| n + 2)
        };
        let rollover = self.regs[RXB_CTRL[0]] & 0x04 != 0;

        let target = match (hit0, hit1) {
            (Some(hit), _) if !full[0] => Some((0, hit as u8)),
            (Some(hit), _) if rollover && !full[1] => Some((1, hit as u8 + 6)),
            (_, Some(hit)) if !full[1] => Some((1, hit as u8)),
            _ => None,
        };
        if target.is_none() {
            if hit0.is_some() {
                self.regs[EFLG] |= 0x40;
            } else if hit1.is_some() {
                self.regs[EFLG] |= 0x80;
            }
        }

        if let Some((buf, hit)) = target {
            self.filhit[buf] = hit;
            let sent = &data[..if remote { 0 } else { len }];
            let raw = id::decode([header[0], header[1], header[2], header[3]], extended);
            self.regs[RXB_CTRL[buf]] &= !RXRTR;
            self.inject(buf, raw, extended, remote, sent);
            if remote {
                let base = RXB_CTRL[buf];
                self.regs[base + 5] = (self.regs[base + 5] & DLC_RTR) | (len as u8);
            }
        }
    }
}

/// SPI side of a [`SimChip`].
pub struct SimBus(pub Rc<RefCell<SimChip>>);

impl Transfer<u8> for SimBus {
    type Error = u32;

    fn transfer<'w>(&mut self, words: &'w mut [u8]) -> Result<&'w [u8], u32> {
        let mut chip = self.0.borrow_mut();
        if chip.fail_transfers {
            return Err(7);
        }
        for word in words.iter_mut() {
            *word = chip.exchange(*word);
        }
        Ok(words)
    }
}

/// Chip select side of a [`SimChip`].
pub struct SimPin(pub Rc<RefCell<SimChip>>);

impl OutputPin for SimPin {
    type Error = u32;

    fn set_low(&mut self) -> Result<(), u32> {
        self.0.borrow_mut().select();
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), u32> {
        self.0.borrow_mut().deselect();
        Ok(())
    }
}

pub type SimDriver = MCP2515<SimBus, SimPin, RecordingDelay>;

/// Driver wired to a fresh simulated chip with an 8 MHz oscillator.
pub fn simulated() -> (SimDriver, Rc<RefCell<SimChip>>) {
    let chip = Rc::new(RefCell::new(SimChip::new()));
    let driver = MCP2515::new(
        SimBus(chip.clone()),
        SimPin(chip.clone()),
        RecordingDelay::default(),
        Oscillator::MHZ8,
    );
    (driver, chip)
}
