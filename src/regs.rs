//! MCP2515 register map and typed views over the control registers.
//!
//! Every register is a single byte. Registers used as bitfields are modelled
//! with `modular-bitfield`, where the first field is the least significant
//! bit.

use bitflags::bitflags;
use modular_bitfield::prelude::*;

use crate::macros::register;

/// Register addresses used by the driver.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::upper_case_acronyms)]
pub enum Register {
    RXF0SIDH = 0x00,
    RXF0SIDL = 0x01,
    RXF0EID8 = 0x02,
    RXF0EID0 = 0x03,
    BFPCTRL = 0x0C,
    TXRTSCTRL = 0x0D,
    CANSTAT = 0x0E,
    CANCTRL = 0x0F,
    TEC = 0x1C,
    REC = 0x1D,
    CNF3 = 0x28,
    CNF2 = 0x29,
    CNF1 = 0x2A,
    CANINTE = 0x2B,
    CANINTF = 0x2C,
    EFLG = 0x2D,
    TXB0CTRL = 0x30,
    TXB0SIDH = 0x31,
    TXB0SIDL = 0x32,
    TXB0EID8 = 0x33,
    TXB0EID0 = 0x34,
    TXB0DLC = 0x35,
    TXB0D0 = 0x36,
    TXB0D1 = 0x37,
    TXB0D2 = 0x38,
    TXB0D3 = 0x39,
    TXB0D4 = 0x3A,
    TXB0D5 = 0x3B,
    TXB0D6 = 0x3C,
    TXB0D7 = 0x3D,
    RXB0CTRL = 0x60,
    RXB0SIDH = 0x61,
    RXB0SIDL = 0x62,
    RXB0EID8 = 0x63,
    RXB0EID0 = 0x64,
    RXB0DLC = 0x65,
    RXB0D0 = 0x66,
    RXB0D1 = 0x67,
    RXB0D2 = 0x68,
    RXB0D3 = 0x69,
    RXB0D4 = 0x6A,
    RXB0D5 = 0x6B,
    RXB0D6 = 0x6C,
    RXB0D7 = 0x6D,
}

impl From<Register> for u8 {
    #[inline]
    fn from(reg: Register) -> Self {
        reg as u8
    }
}

/// A register that can be read and written as a typed value.
pub trait Reg: Copy {
    /// Address of the register.
    const ADDRESS: Register;

    fn from_byte(byte: u8) -> Self;

    fn into_byte(self) -> u8;
}

/// A register that supports the `BIT MODIFY` instruction.
pub trait BitModifiable: Reg {}

/// Operation mode of the MCP2515. Used both for the requested mode
/// (`CANCTRL.REQOP`) and the current mode (`CANSTAT.OPMOD`).
#[derive(BitfieldSpecifier, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[bits = 3]
pub enum OpMode {
    /// Live participation on the bus.
    Normal = 0b000,
    Sleep = 0b001,
    /// Transmitted frames are looped back internally, nothing reaches the
    /// bus.
    Loopback = 0b010,
    ListenOnly = 0b011,
    /// Required for writing the bit timing, filter and mask registers.
    Configuration = 0b100,
}

/// Receive buffer operating mode (`RXBnCTRL.RXM`).
#[derive(BitfieldSpecifier, Debug, Clone, Copy, PartialEq, Eq)]
#[bits = 2]
pub enum RecvBufOpMode {
    /// Receive messages that match the filters.
    FilterOn = 0b00,
    /// Receive any message, filters and masks are ignored.
    FilterOff = 0b11,
}

/// `CANSTAT`: current operation mode and interrupt code.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanStat {
    #[skip]
    __: B1,
    pub icod: B3,
    #[skip]
    __: B1,
    pub opmod: OpMode,
}
register!(CanStat, CANSTAT);

/// `CANCTRL`: requested operation mode and clock output control.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanCtrl {
    pub clkpre: B2,
    pub clken: bool,
    /// One-shot mode.
    pub osm: bool,
    /// Abort all pending transmissions.
    pub abat: bool,
    pub reqop: OpMode,
}
register!(CanCtrl, CANCTRL, bitmod);

impl CanCtrl {
    pub const MASK_REQOP: Self = Self::from_bytes([0b1110_0000]);
}

/// `CNF1`: synchronisation jump width and baud rate prescaler.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cnf1 {
    pub brp: B6,
    pub sjw: B2,
}
register!(Cnf1, CNF1, bitmod);

/// `CNF2`: propagation and phase segment 1 lengths.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cnf2 {
    pub prseg: B3,
    pub phseg1: B3,
    /// Sample the bus three times.
    pub sam: bool,
    /// Phase segment 2 length taken from `CNF3`.
    pub btlmode: bool,
}
register!(Cnf2, CNF2, bitmod);

/// `CNF3`: phase segment 2 length, wake-up filter and start-of-frame output.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cnf3 {
    pub phseg2: B3,
    #[skip]
    __: B3,
    pub wakfil: bool,
    pub sof: bool,
}
register!(Cnf3, CNF3, bitmod);

/// `CANINTE`: interrupt enables.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanInte {
    pub rx0ie: bool,
    pub rx1ie: bool,
    pub tx0ie: bool,
    pub tx1ie: bool,
    pub tx2ie: bool,
    pub errie: bool,
    pub wakie: bool,
    pub merre: bool,
}
register!(CanInte, CANINTE, bitmod);

bitflags! {
    /// `CANINTF`: interrupt flags. The flags are set by the chip whether or
    /// not the matching source is enabled in `CANINTE`.
    #[derive(Default)]
    pub struct CanIntf: u8 {
        /// Receive buffer 0 full.
        const RX0IF = 0b0000_0001;
        /// Receive buffer 1 full.
        const RX1IF = 0b0000_0010;
        /// Transmit buffer 0 empty.
        const TX0IF = 0b0000_0100;
        const TX1IF = 0b0000_1000;
        const TX2IF = 0b0001_0000;
        const ERRIF = 0b0010_0000;
        const WAKIF = 0b0100_0000;
        /// Message error.
        const MERRF = 0b1000_0000;
    }
}

impl Reg for CanIntf {
    const ADDRESS: Register = Register::CANINTF;

    #[inline]
    fn from_byte(byte: u8) -> Self {
        Self::from_bits_truncate(byte)
    }

    #[inline]
    fn into_byte(self) -> u8 {
        self.bits()
    }
}

impl BitModifiable for CanIntf {}

/// `TXB0CTRL`: transmit buffer 0 control and status.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxbCtrl {
    /// Transmit priority.
    pub txp: B2,
    #[skip]
    __: B1,
    /// Transmission requested and still pending.
    pub txreq: bool,
    /// Bus error during transmission.
    pub txerr: bool,
    /// Message lost arbitration.
    pub mloa: bool,
    /// Message aborted.
    pub abtf: bool,
    #[skip]
    __: B1,
}
register!(TxbCtrl, TXB0CTRL, bitmod);

impl TxbCtrl {
    pub const MASK_TXREQ: Self = Self::from_bytes([0b0000_1000]);
}

/// `RXB0CTRL`: receive buffer 0 control.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rxb0Ctrl {
    /// Which filter accepted the message.
    pub filhit0: bool,
    /// Read-only copy of `bukt`.
    pub bukt1: bool,
    /// Roll over into receive buffer 1 when buffer 0 is full.
    pub bukt: bool,
    /// Received a remote transfer request.
    pub rxrtr: bool,
    #[skip]
    __: B1,
    pub rxm: RecvBufOpMode,
    #[skip]
    __: B1,
}
register!(Rxb0Ctrl, RXB0CTRL, bitmod);
