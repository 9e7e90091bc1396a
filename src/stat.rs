use modular_bitfield::prelude::*;

/// Response to the `READ STATUS` instruction: the receive flags and the
/// transmit request/flag bits of every buffer in a single byte.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    pub rx0if: bool,
    pub rx1if: bool,
    pub txb0req: bool,
    pub tx0if: bool,
    pub txb1req: bool,
    pub tx1if: bool,
    pub txb2req: bool,
    pub tx2if: bool,
}
