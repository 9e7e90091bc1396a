use core::fmt::Debug;

use embedded_hal::can::Error as CanError;

pub type Result<T, SPIE, CSE> = core::result::Result<T, Error<SPIE, CSE>>;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<SPIE: Debug, CSE: Debug> {
    /// MCP2515 did not confirm a mode change within the poll limit.
    NewModeTimeout,
    /// Tx buffer 0 still holds a pending frame.
    TxBusy,
    /// The MCP2515 aborted the transmission, lost arbitration or saw a bus
    /// error.
    TxFailed,
    /// Received a frame with an extended identifier.
    InvalidFrameId,
    /// Received a standard remote frame.
    RemoteFrame,
    /// No bit timing is known for the requested bit rate (bits per second).
    UnsupportedBitrate(u32),
    /// SPI error.
    Spi(SPIE),
    /// Chip-select pin error.
    Cs(CSE),
}

impl<SPIE: Debug, CSE: Debug> CanError for Error<SPIE, CSE> {
    fn kind(&self) -> embedded_hal::can::ErrorKind {
        embedded_hal::can::ErrorKind::Other
    }
}
