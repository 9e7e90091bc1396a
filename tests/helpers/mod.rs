//! Simulated MCP2515 for integration tests.
//!
//! `Chip` holds a 128-byte register file and decodes the SPI instruction set
//! byte by byte. `SimSpi`, `SimCs` and `SimDelay` share it and implement the
//! `embedded-hal` traits the driver consumes.
#![allow(dead_code)]

use std::{cell::RefCell, rc::Rc};

use embedded_hal::{
    blocking::{delay::DelayMs, spi::Transfer},
    digital::v2::OutputPin,
};
use mcp2515_poll::MCP2515;
use void::Void;

pub const CANSTAT: u8 = 0x0E;
pub const CANCTRL: u8 = 0x0F;
pub const CNF3: u8 = 0x28;
pub const CNF2: u8 = 0x29;
pub const CNF1: u8 = 0x2A;
pub const CANINTE: u8 = 0x2B;
pub const CANINTF: u8 = 0x2C;
pub const TXB0CTRL: u8 = 0x30;
pub const TXB0SIDH: u8 = 0x31;
pub const TXB0D0: u8 = 0x36;
pub const RXB0CTRL: u8 = 0x60;
pub const RXB0SIDH: u8 = 0x61;
pub const RXB0SIDL: u8 = 0x62;
pub const RXB0DLC: u8 = 0x65;
pub const RXB0D0: u8 = 0x66;
pub const RXF0SIDH: u8 = 0x00;
pub const RXF0SIDL: u8 = 0x01;

pub const RX0IF: u8 = 0x01;
pub const TX0IF: u8 = 0x04;
pub const TXREQ: u8 = 0x08;
pub const MLOA: u8 = 0x20;
pub const SRR: u8 = 0x10;

/// One decoded SPI instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Reset,
    Read { addr: u8, value: u8 },
    Write { addr: u8, value: u8 },
    BitModify { addr: u8, mask: u8, data: u8 },
    ReadStatus(u8),
}

/// Error returned by `SimSpi` when a fault is injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimFault;

pub struct Chip {
    pub regs: [u8; 128],
    /// Every decoded instruction, in order.
    pub ops: Vec<Op>,
    /// Every delay requested, in milliseconds.
    pub delays: Vec<u8>,
    /// Number of `CANSTAT` reads still reporting the old mode after a mode
    /// request.
    pub mode_latency: usize,
    /// Copy transmitted frames into Rx buffer 0, as if another node echoed
    /// them. Loopback mode does this regardless.
    pub echo_tx: bool,
    /// `TXB0CTRL` error bits (ABTF, MLOA, TXERR) raised instead of sending.
    pub tx_fault: u8,
    /// Lose arbitration on every attempt: MLOA is raised and the frame stays
    /// queued for retransmission.
    pub lose_arbitration: bool,
    /// Number of upcoming transfers that fail.
    pub failing_transfers: usize,
    pub cs_low: bool,
    /// Number of completed chip-select frames.
    pub cs_frames: usize,
    pending_mode: Option<(u8, usize)>,
    frame: Vec<u8>,
}

impl Chip {
    fn new() -> Self {
        let mut chip = Self {
            regs: [0; 128],
            ops: Vec::new(),
            delays: Vec::new(),
            mode_latency: 0,
            echo_tx: false,
            tx_fault: 0,
            lose_arbitration: false,
            failing_transfers: 0,
            cs_low: false,
            cs_frames: 0,
            pending_mode: None,
            frame: Vec::new(),
        };
        chip.power_on();
        chip
    }

    fn power_on(&mut self) {
        self.regs = [0; 128];
        self.regs[CANSTAT as usize] = 0x80;
        self.regs[CANCTRL as usize] = 0x87;
        self.pending_mode = None;
    }

    /// Current OPMOD field.
    pub fn mode(&self) -> u8 {
        self.regs[CANSTAT as usize] >> 5
    }

    pub fn reg(&self, addr: u8) -> u8 {
        self.regs[addr as usize]
    }

    /// Places a received standard frame in Rx buffer 0 and raises `RX0IF`.
    pub fn inject_rx(&mut self, id: u16, data: &[u8]) {
        self.regs[RXB0SIDH as usize] = (id >> 3) as u8;
        self.regs[RXB0SIDL as usize] = ((id & 0x7) << 5) as u8;
        self.regs[RXB0DLC as usize] = data.len() as u8;
        for (i, byte) in data.iter().enumerate() {
            self.regs[RXB0D0 as usize + i] = *byte;
        }
        self.regs[CANINTF as usize] |= RX0IF;
    }

    pub fn reads_of(&self, addr: u8) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, Op::Read { addr: a, .. } if *a == addr))
            .count()
    }

    pub fn writes_to(&self, addr: u8) -> Vec<u8> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                Op::Write { addr: a, value } if *a == addr => Some(*value),
                _ => None,
            })
            .collect()
    }

    fn read(&mut self, addr: u8) -> u8 {
        if addr == CANSTAT {
            if let Some((mode, remaining)) = self.pending_mode {
                if remaining > 0 {
                    self.pending_mode = Some((mode, remaining - 1));
                } else {
                    let stat = &mut self.regs[CANSTAT as usize];
                    *stat = (*stat & 0x1F) | (mode << 5);
                    self.pending_mode = None;
                }
            }
        }
        self.regs[addr as usize & 0x7F]
    }

    fn write(&mut self, addr: u8, value: u8) {
        match addr {
            CANSTAT => {}
            CANCTRL => {
                self.regs[CANCTRL as usize] = value;
                let reqop = value >> 5;
                self.pending_mode = if reqop == self.mode() {
                    None
                } else {
                    Some((reqop, self.mode_latency))
                };
            }
            TXB0CTRL => {
                let ctrl = &mut self.regs[TXB0CTRL as usize];
                *ctrl = (*ctrl & !0x0B) | (value & 0x0B);
                if value & TXREQ != 0 {
                    // Requesting a transmission clears the previous errors.
                    *ctrl &= !0x70;
                    self.send();
                }
            }
            _ => self.regs[addr as usize & 0x7F] = value,
        }
    }

    fn send(&mut self) {
        if self.tx_fault != 0 {
            self.regs[TXB0CTRL as usize] = (self.regs[TXB0CTRL as usize] & !TXREQ) | self.tx_fault;
            return;
        }
        if self.lose_arbitration {
            self.regs[TXB0CTRL as usize] |= MLOA;
            return;
        }
        // Loopback mode is OPMOD 0b010.
        if !self.echo_tx && self.mode() != 0b010 {
            return;
        }
        for offset in 0..13 {
            self.regs[RXB0SIDH as usize + offset] = self.regs[TXB0SIDH as usize + offset];
        }
        self.regs[TXB0CTRL as usize] &= !TXREQ;
        self.regs[CANINTF as usize] |= RX0IF | TX0IF;
    }

    fn status(&self) -> u8 {
        let intf = self.regs[CANINTF as usize];
        let txreq = (self.regs[TXB0CTRL as usize] & TXREQ != 0) as u8;
        let tx0if = (intf & TX0IF != 0) as u8;
        (intf & 0x03) | (txreq << 2) | (tx0if << 3)
    }

    /// Feeds one byte of the current chip-select frame, returning the byte
    /// shifted out by the chip.
    fn clock(&mut self, byte: u8) -> u8 {
        self.frame.push(byte);
        let len = self.frame.len();
        match self.frame[0] {
            0xC0 => {
                if len == 1 {
                    self.power_on();
                    self.ops.push(Op::Reset);
                }
                0
            }
            0x03 if len >= 3 => {
                let addr = self.frame[1].wrapping_add((len - 3) as u8);
                let value = self.read(addr);
                self.ops.push(Op::Read { addr, value });
                value
            }
            0x02 if len >= 3 => {
                let addr = self.frame[1].wrapping_add((len - 3) as u8);
                self.write(addr, byte);
                self.ops.push(Op::Write { addr, value: byte });
                0
            }
            0x05 if len == 4 => {
                let (addr, mask, data) = (self.frame[1], self.frame[2], self.frame[3]);
                let old = self.regs[addr as usize & 0x7F];
                self.write(addr, (old & !mask) | (data & mask));
                self.ops.push(Op::BitModify { addr, mask, data });
                0
            }
            0xA0 if len >= 2 => {
                let status = self.status();
                if len == 2 {
                    self.ops.push(Op::ReadStatus(status));
                }
                status
            }
            0x02 | 0x03 | 0x05 | 0xA0 => 0,
            other => panic!("unknown instruction {other:#04x}"),
        }
    }
}

pub type Sim = Rc<RefCell<Chip>>;

pub struct SimSpi(Sim);

impl Transfer<u8> for SimSpi {
    type Error = SimFault;

    fn transfer<'w>(&mut self, words: &'w mut [u8]) -> Result<&'w [u8], Self::Error> {
        let mut chip = self.0.borrow_mut();
        assert!(chip.cs_low, "SPI transfer without chip select");
        if chip.failing_transfers > 0 {
            chip.failing_transfers -= 1;
            return Err(SimFault);
        }
        for word in words.iter_mut() {
            *word = chip.clock(*word);
        }
        Ok(words)
    }
}

pub struct SimCs(Sim);

impl OutputPin for SimCs {
    type Error = Void;

    fn set_low(&mut self) -> Result<(), Self::Error> {
        let mut chip = self.0.borrow_mut();
        assert!(!chip.cs_low, "chip select asserted twice");
        chip.cs_low = true;
        chip.frame.clear();
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        let mut chip = self.0.borrow_mut();
        if chip.cs_low {
            chip.cs_low = false;
            chip.cs_frames += 1;
        }
        Ok(())
    }
}

pub struct SimDelay(Sim);

impl DelayMs<u8> for SimDelay {
    fn delay_ms(&mut self, ms: u8) {
        self.0.borrow_mut().delays.push(ms);
    }
}

pub type SimDriver = MCP2515<SimSpi, SimCs, SimDelay>;

/// A driver wired to a freshly powered simulated chip.
pub fn driver() -> (SimDriver, Sim) {
    let sim = Rc::new(RefCell::new(Chip::new()));
    let driver = MCP2515::new(SimSpi(sim.clone()), SimCs(sim.clone()), SimDelay(sim.clone()));
    (driver, sim)
}

/// A driver whose chip has been initialized with `settings`. The recorded
/// operations and delays are cleared.
pub fn initialized(settings: mcp2515_poll::Settings) -> (SimDriver, Sim) {
    let (mut can, sim) = driver();
    can.init(settings).unwrap();
    sim.borrow_mut().ops.clear();
    sim.borrow_mut().delays.clear();
    (can, sim)
}
