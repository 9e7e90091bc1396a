//! Blocking, polling-mode driver for the MCP2515 stand-alone CAN controller.
//!
//! The driver uses transmit buffer 0 and receive buffer 0 only, standard
//! (11-bit) identifiers only, and keeps every chip interrupt source
//! disabled: received frames are picked up by calling
//! [`MCP2515::receive`] repeatedly.
//!
//! Every method takes `&mut self`. Sharing one SPI bus between several
//! devices is left to the caller, e.g. by passing a shared-bus proxy as
//! `SPI`.
#![no_std]

pub mod buffer;
pub mod error;
pub mod frame;
pub(crate) mod macros;
pub mod regs;
pub mod stat;

use core::fmt::Debug;

use embedded_hal::{
    blocking::{delay::DelayMs, spi::Transfer},
    digital::v2::OutputPin,
};
use frame::CanFrame;
use regs::{OpMode, Register};
use stat::Status;

use crate::{
    buffer::{DlcReg, StdIdent, RXB0, TXB0},
    error::{Error, Result},
    macros::{debug, trace, warning},
    regs::{
        BitModifiable, CanCtrl, CanInte, CanIntf, CanStat, Cnf1, Cnf2, Cnf3, RecvBufOpMode, Reg,
        Rxb0Ctrl, TxbCtrl,
    },
};

#[repr(u8)]
enum Instruction {
    Write = 0x2,
    Read = 0x3,
    Bitmod = 0x5,
    ReadStatus = 0xA0,
    Reset = 0xC0,
}

/// Delay after the `RESET` instruction before the chip is accessed again.
const RESET_SETTLE_MS: u8 = 10;

/// Default maximum number of `CANSTAT` polls when confirming a mode change.
pub const DEFAULT_MODE_POLL_LIMIT: u16 = 100;

/// Settings used to initialize the MCP2515.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    /// CAN bit rate in bits per second. Only 500 kbit/s is supported.
    pub bitrate: u32,
    /// Mode entered once the chip is configured.
    pub mode: OpMode,
    /// Maximum number of `CANSTAT` reads when waiting for a mode change to
    /// take effect, one millisecond apart. `None` waits forever.
    pub mode_poll_limit: Option<u16>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bitrate: 500_000,
            mode: OpMode::Normal,
            mode_poll_limit: Some(DEFAULT_MODE_POLL_LIMIT),
        }
    }
}

/// State of transmit buffer 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TxStatus {
    /// A frame is waiting for, or in the middle of, transmission.
    Pending,
    /// No transmission is pending and the last one did not fail. Also
    /// reported when nothing has been sent yet.
    Complete,
    /// The last transmission was aborted, lost arbitration or hit a bus
    /// error.
    Failed,
}

impl From<TxbCtrl> for TxStatus {
    fn from(ctrl: TxbCtrl) -> Self {
        if ctrl.txreq() {
            TxStatus::Pending
        } else if ctrl.abtf() || ctrl.mloa() || ctrl.txerr() {
            TxStatus::Failed
        } else {
            TxStatus::Complete
        }
    }
}

/// CNF1, CNF2 and CNF3 values for a bit rate.
///
/// The 500 kbit/s entry holds the values calibrated for the target board.
/// On a 16 MHz oscillator they encode BRP = 1 (TQ = 250 ns) and 16 TQ per
/// bit, which is 250 kbit/s; a 500 kbit/s bus needs an 8 MHz oscillator
/// with these values.
fn bit_timing(bitrate: u32) -> Option<(u8, u8, u8)> {
    match bitrate {
        500_000 => Some((0x01, 0xB1, 0x05)),
        _ => None,
    }
}

/// MCP2515 driver.
pub struct MCP2515<SPI, CS, D> {
    /// SPI interface to interact with the MCP2515.
    spi: SPI,
    /// Chip select pin to select the MCP2515.
    cs: CS,
    /// Delay interface from users HAL.
    delay: D,
    /// Bound on the mode change confirmation loop.
    mode_poll_limit: Option<u16>,
}

impl<SPI, CS, D, SPIE, CSE> MCP2515<SPI, CS, D>
where
    SPI: Transfer<u8, Error = SPIE>,
    CS: OutputPin<Error = CSE>,
    D: DelayMs<u8>,
    SPIE: Debug,
    CSE: Debug,
{
    /// Creates a new MCP2515 driver. The chip is not touched until
    /// [`init`](Self::init) is called.
    ///
    /// # Configuration
    ///
    /// It is up to the user to create and configure the SPI interface.
    /// Namely, the MCP2515 requires the following options:
    ///
    /// * **Data Order**: MSB first.
    /// * **Clock**: 10 MHz at most.
    /// * **Mode**: Mode 0.
    ///
    /// # Parameters
    ///
    /// * `spi` - SPI interface.
    /// * `cs` - Chip-select pin for the MCP2515.
    /// * `delay` - Delay interface from downstream HAL.
    pub const fn new(spi: SPI, cs: CS, delay: D) -> Self {
        Self {
            spi,
            cs,
            delay,
            mode_poll_limit: Some(DEFAULT_MODE_POLL_LIMIT),
        }
    }

    /// Releases the SPI interface, chip-select pin and delay.
    pub fn release(self) -> (SPI, CS, D) {
        (self.spi, self.cs, self.delay)
    }

    /// Sets the maximum number of `CANSTAT` reads performed by
    /// [`set_mode`](Self::set_mode). `None` polls until the chip confirms.
    pub fn set_mode_poll_limit(&mut self, limit: Option<u16>) {
        self.mode_poll_limit = limit;
    }

    /// Initializes the MCP2515. This should be called once at the start of
    /// the program, before any other operation.
    ///
    /// The chip is reset, configured for the requested bit rate, set to
    /// accept every standard and extended frame into Rx buffer 0 with all
    /// interrupt sources disabled, and finally switched to `settings.mode`.
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedBitrate`] if no bit timing is known for
    /// `settings.bitrate`. Nothing is sent to the chip in that case.
    pub fn init(&mut self, settings: Settings) -> Result<(), SPIE, CSE> {
        if bit_timing(settings.bitrate).is_none() {
            warning!("unsupported bit rate {=u32}", settings.bitrate);
            return Err(Error::UnsupportedBitrate(settings.bitrate));
        }
        self.mode_poll_limit = settings.mode_poll_limit;
        self.cs.set_high().map_err(Error::Cs)?;

        self.reset()?;
        self.set_mode(OpMode::Configuration)?;
        self.set_bitrate(settings.bitrate)?;

        // Receive everything into buffer 0, filter 0 cleared.
        self.write_reg(Rxb0Ctrl::new().with_rxm(RecvBufOpMode::FilterOff))?;
        self.write_register(Register::RXF0SIDH, 0)?;
        self.write_register(Register::RXF0SIDL, 0)?;

        // Polling only.
        self.write_reg(CanInte::new())?;

        self.set_mode(settings.mode)
    }

    /// Configures the MCP2515 to operate at a certain CAN bit rate. The chip
    /// must be in configuration mode.
    ///
    /// # Parameters
    ///
    /// * `bitrate` - Bit rate in bits per second. Only `500_000` is
    ///   supported.
    pub fn set_bitrate(&mut self, bitrate: u32) -> Result<(), SPIE, CSE> {
        let (cnf1, cnf2, cnf3) =
            bit_timing(bitrate).ok_or(Error::UnsupportedBitrate(bitrate))?;
        debug!(
            "bit timing for {=u32} bit/s: {=u8:#x} {=u8:#x} {=u8:#x}",
            bitrate, cnf1, cnf2, cnf3
        );
        self.write_reg(Cnf1::from_byte(cnf1))?;
        self.write_reg(Cnf2::from_byte(cnf2))?;
        self.write_reg(Cnf3::from_byte(cnf3))?;
        Ok(())
    }

    /// Set the operation mode of the device and wait until the chip reports
    /// it in `CANSTAT`.
    ///
    /// Waking the device from sleep is not handled.
    ///
    /// # Parameters
    ///
    /// * `mode` - New device mode.
    ///
    /// # Returns
    ///
    /// Nothing on success, [`Error::NewModeTimeout`] if the chip did not
    /// report the new mode within the poll limit.
    pub fn set_mode(&mut self, mode: OpMode) -> Result<(), SPIE, CSE> {
        self.modify_reg(CanCtrl::new().with_reqop(mode), CanCtrl::MASK_REQOP)?;
        self.delay.delay_ms(1);

        let mut polls: u32 = 0;
        loop {
            let canstat: CanStat = self.read_reg()?;
            polls += 1;
            if canstat.opmod_or_err() == Ok(mode) {
                debug!("entered {} after {=u32} polls", mode, polls);
                return Ok(());
            }
            if let Some(limit) = self.mode_poll_limit {
                if polls >= u32::from(limit) {
                    warning!("mode {} not confirmed after {=u32} polls", mode, polls);
                    return Err(Error::NewModeTimeout);
                }
            }
            self.delay.delay_ms(1);
        }
    }

    /// Queues a frame in Tx buffer 0 and requests its transmission.
    ///
    /// This does not wait for the frame to go out, use
    /// [`tx_status`](Self::tx_status) for that.
    ///
    /// # Errors
    ///
    /// * [`Error::TxBusy`] if the previous frame is still pending. The buffer
    ///   is left untouched.
    /// * [`Error::TxFailed`] if the chip flags the transmission as failed
    ///   right after the request.
    pub fn transmit(&mut self, frame: &CanFrame) -> Result<(), SPIE, CSE> {
        let ctrl: TxbCtrl = self.read_reg()?;
        if ctrl.txreq() {
            return Err(Error::TxBusy);
        }

        let [sidh, sidl] = StdIdent::from_id(frame.std_id()).into_bytes();
        self.write_register(TXB0.sidh, sidh)?;
        self.write_register(TXB0.sidl, sidl)?;
        let [dlc] = DlcReg::new().with_dlc(frame.len() & 0x0F).into_bytes();
        self.write_register(TXB0.dlc, dlc)?;
        for (&reg, &byte) in TXB0.data.iter().zip(frame.data()) {
            self.write_register(reg, byte)?;
        }

        self.modify_reg(TxbCtrl::MASK_TXREQ, TxbCtrl::MASK_TXREQ)?;
        trace!("requested transmission of {}", frame);

        // A frame still queued after an error is retried by the chip.
        match self.tx_status()? {
            TxStatus::Failed => Err(Error::TxFailed),
            TxStatus::Pending | TxStatus::Complete => Ok(()),
        }
    }

    /// Reads the state of Tx buffer 0.
    pub fn tx_status(&mut self) -> Result<TxStatus, SPIE, CSE> {
        self.read_reg::<TxbCtrl>().map(TxStatus::from)
    }

    /// Reads a frame from Rx buffer 0 if one has arrived.
    ///
    /// Only `CANINTF` is read when no frame is waiting. Otherwise the frame
    /// is read register by register and the buffer is released by clearing
    /// `RX0IF`; the other interrupt flags are left as they are.
    ///
    /// # Errors
    ///
    /// * [`Error::InvalidFrameId`] if the frame has an extended identifier.
    /// * [`Error::RemoteFrame`] if the frame is a remote transmission
    ///   request. Its data registers are not read.
    ///
    /// The buffer is released all the same.
    pub fn receive(&mut self) -> Result<Option<CanFrame>, SPIE, CSE> {
        let flags: CanIntf = self.read_reg()?;
        if !flags.contains(CanIntf::RX0IF) {
            return Ok(None);
        }

        let sidh = self.read_register(RXB0.sidh)?;
        let sidl = self.read_register(RXB0.sidl)?;
        let ident = StdIdent::from_bytes([sidh, sidl]);
        let id = match ident.id() {
            Some(id) => id,
            None => {
                debug!("dropping extended frame");
                self.clear_rx_flag()?;
                return Err(Error::InvalidFrameId);
            }
        };
        if ident.srr() {
            debug!("dropping remote frame for {=u16:#x}", id.as_raw());
            self.clear_rx_flag()?;
            return Err(Error::RemoteFrame);
        }

        // DLC values above 8 still mean 8 data bytes.
        let dlc = DlcReg::from_bytes([self.read_register(RXB0.dlc)?])
            .dlc()
            .min(8);
        let mut data = [0u8; 8];
        for (byte, &reg) in data.iter_mut().zip(RXB0.data.iter()).take(usize::from(dlc)) {
            *byte = self.read_register(reg)?;
        }
        self.clear_rx_flag()?;

        let frame = CanFrame::from_parts(id, dlc, data);
        trace!("received {}", frame);
        Ok(Some(frame))
    }

    fn clear_rx_flag(&mut self) -> Result<(), SPIE, CSE> {
        self.modify_reg(CanIntf::empty(), CanIntf::RX0IF)
    }

    /// Resets the MCP2515 and waits for it to settle.
    pub fn reset(&mut self) -> Result<(), SPIE, CSE> {
        let mut data = [Instruction::Reset as u8];
        self.transfer(&mut data)?;
        self.delay.delay_ms(RESET_SETTLE_MS);
        trace!("reset");
        Ok(())
    }

    /// Reads the status register.
    pub fn read_status(&mut self) -> Result<Status, SPIE, CSE> {
        let mut data = [Instruction::ReadStatus as u8, 0];
        self.transfer(&mut data)
            .map(|b| [b])
            .map(Status::from_bytes)
    }

    /// Reads a single register.
    pub fn read_register(&mut self, reg: Register) -> Result<u8, SPIE, CSE> {
        let mut data = [Instruction::Read as u8, reg.into(), 0];
        self.transfer(&mut data)
    }

    /// Writes a single register.
    pub fn write_register(&mut self, reg: Register, value: u8) -> Result<(), SPIE, CSE> {
        let mut data = [Instruction::Write as u8, reg.into(), value];
        self.transfer(&mut data)?;
        Ok(())
    }

    /// Modifies the bits of a register selected by `mask`, leaving the other
    /// bits untouched.
    ///
    /// Only some registers support this, see
    /// [`BitModifiable`](regs::BitModifiable). Other registers are written in
    /// full with `data`.
    ///
    /// # Parameters
    ///
    /// * `reg` - Register to modify.
    /// * `mask` - Bits set to 1 are the positions to modify.
    /// * `data` - New value of the selected bits.
    pub fn modify_register(&mut self, reg: Register, mask: u8, data: u8) -> Result<(), SPIE, CSE> {
        let mut data = [Instruction::Bitmod as u8, reg.into(), mask, data];
        self.transfer(&mut data)?;
        Ok(())
    }

    /// Read a register via a register object.
    #[inline]
    pub fn read_reg<R: Reg>(&mut self) -> Result<R, SPIE, CSE> {
        self.read_register(R::ADDRESS).map(R::from_byte)
    }

    /// Write to a register using a register object.
    #[inline]
    pub fn write_reg<R: Reg>(&mut self, reg: R) -> Result<(), SPIE, CSE> {
        self.write_register(R::ADDRESS, reg.into_byte())
    }

    /// Modifies a register.
    ///
    /// # Parameters
    ///
    /// * `reg` - New register content.
    /// * `mask` - Mask register. The bits must be 1 in the positions you want
    ///   to modify.
    #[inline]
    pub fn modify_reg<R: BitModifiable>(&mut self, reg: R, mask: R) -> Result<(), SPIE, CSE> {
        self.modify_register(R::ADDRESS, mask.into_byte(), reg.into_byte())
    }

    /// Transfers an array of bytes via SPI in one chip-select frame,
    /// returning the slave response inside the given mutable bytes array.
    ///
    /// # Returns
    ///
    /// Returns the last element received from the slave. If no bytes were
    /// sent, 0 is returned.
    fn transfer(&mut self, bytes: &mut [u8]) -> Result<u8, SPIE, CSE> {
        self.with_cs(|spi| spi.transfer(bytes).map(|_| ()))?;
        if let [.., data] = bytes {
            Ok(*data)
        } else {
            Ok(0)
        }
    }

    /// Calls `f` after bringing the chip select pin low, restoring it to high
    /// afterwards whether `f` failed or not.
    fn with_cs<T>(
        &mut self,
        f: impl FnOnce(&mut SPI) -> core::result::Result<T, SPIE>,
    ) -> Result<T, SPIE, CSE> {
        self.cs.set_low().map_err(Error::Cs)?;
        let result = f(&mut self.spi);
        self.cs.set_high().map_err(Error::Cs)?;
        result.map_err(Error::Spi)
    }
}

impl<SPI, CS, D, SPIE, CSE> embedded_hal::can::nb::Can for MCP2515<SPI, CS, D>
where
    SPI: Transfer<u8, Error = SPIE>,
    CS: OutputPin<Error = CSE>,
    D: DelayMs<u8>,
    SPIE: Debug,
    CSE: Debug,
{
    type Frame = CanFrame;
    type Error = Error<SPIE, CSE>;

    /// Never replaces a pending frame: a busy Tx buffer yields
    /// `WouldBlock`.
    fn transmit(&mut self, frame: &CanFrame) -> nb::Result<Option<CanFrame>, Self::Error> {
        match MCP2515::transmit(self, frame) {
            Ok(()) => Ok(None),
            Err(Error::TxBusy) => Err(nb::Error::WouldBlock),
            Err(err) => Err(nb::Error::Other(err)),
        }
    }

    fn receive(&mut self) -> nb::Result<CanFrame, Self::Error> {
        MCP2515::receive(self)?.ok_or(nb::Error::WouldBlock)
    }
}
