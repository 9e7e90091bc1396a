//! Transmit/receive buffer 0 and the packing of its identifier and length
//! registers.

use embedded_hal::can::StandardId;
use modular_bitfield::prelude::*;

use crate::regs::Register;

/// Identifier, length and data registers of one message buffer. The control
/// registers are reached through [`TxbCtrl`](crate::regs::TxbCtrl) and
/// [`Rxb0Ctrl`](crate::regs::Rxb0Ctrl).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MsgBuf {
    pub sidh: Register,
    pub sidl: Register,
    pub dlc: Register,
    pub data: [Register; 8],
}

/// Transmit buffer 0, the only Tx buffer used by the driver.
pub const TXB0: MsgBuf = MsgBuf {
    sidh: Register::TXB0SIDH,
    sidl: Register::TXB0SIDL,
    dlc: Register::TXB0DLC,
    data: [
        Register::TXB0D0,
        Register::TXB0D1,
        Register::TXB0D2,
        Register::TXB0D3,
        Register::TXB0D4,
        Register::TXB0D5,
        Register::TXB0D6,
        Register::TXB0D7,
    ],
};

/// Receive buffer 0, the only Rx buffer used by the driver.
pub const RXB0: MsgBuf = MsgBuf {
    sidh: Register::RXB0SIDH,
    sidl: Register::RXB0SIDL,
    dlc: Register::RXB0DLC,
    data: [
        Register::RXB0D0,
        Register::RXB0D1,
        Register::RXB0D2,
        Register::RXB0D3,
        Register::RXB0D4,
        Register::RXB0D5,
        Register::RXB0D6,
        Register::RXB0D7,
    ],
};

/// The `SIDH`/`SIDL` register pair of a buffer.
///
/// The 11-bit identifier is split: bits 10..3 go into `SIDH`, bits 2..0 into
/// the top three bits of `SIDL`.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StdIdent {
    pub sid_high: B8,
    /// Extended identifier bits 17..16.
    pub eid_high: B2,
    #[skip]
    __: B1,
    /// Extended identifier flag (`EXIDE` on Tx, `IDE` on Rx).
    pub ide: bool,
    /// Standard remote frame (Rx only).
    pub srr: bool,
    pub sid_low: B3,
}

impl StdIdent {
    pub fn from_id(id: StandardId) -> Self {
        let raw = id.as_raw();
        Self::new()
            .with_sid_high((raw >> 3) as u8)
            .with_sid_low((raw & 0b111) as u8)
    }

    /// The standard identifier held by the registers, or `None` when they
    /// describe an extended frame.
    pub fn id(&self) -> Option<StandardId> {
        if self.ide() {
            return None;
        }
        StandardId::new((u16::from(self.sid_high()) << 3) | u16::from(self.sid_low()))
    }
}

/// The `DLC` register of a buffer.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DlcReg {
    pub dlc: B4,
    #[skip]
    __: B2,
    /// Remote transmission request.
    pub rtr: bool,
    #[skip]
    __: B1,
}
