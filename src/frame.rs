use embedded_hal::can::{Frame, Id, StandardId};

/// A classic CAN data frame with a standard (11-bit) identifier.
///
/// Bytes of `data` past `dlc` are always zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanFrame {
    id: StandardId,
    dlc: u8,
    data: [u8; 8],
}

impl CanFrame {
    /// Creates a new data frame. Returns `None` if `data` is longer than 8
    /// bytes.
    pub fn new(id: StandardId, data: &[u8]) -> Option<Self> {
        if data.len() > 8 {
            return None;
        }
        let mut buf = [0u8; 8];
        buf[..data.len()].copy_from_slice(data);
        Some(Self {
            id,
            dlc: data.len() as u8,
            data: buf,
        })
    }

    /// Builds a frame from a received payload, of which the first `dlc`
    /// bytes are kept. `dlc` is clamped to 8.
    pub(crate) fn from_parts(id: StandardId, dlc: u8, data: [u8; 8]) -> Self {
        let dlc = dlc.min(8);
        let mut buf = [0u8; 8];
        buf[..usize::from(dlc)].copy_from_slice(&data[..usize::from(dlc)]);
        Self { id, dlc, data: buf }
    }

    #[inline]
    pub fn std_id(&self) -> StandardId {
        self.id
    }

    /// Number of valid payload bytes, 0 to 8.
    #[inline]
    pub fn len(&self) -> u8 {
        self.dlc
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.dlc == 0
    }

    /// The valid payload bytes.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data[..usize::from(self.dlc)]
    }
}

impl Frame for CanFrame {
    /// Extended identifiers are not supported and yield `None`.
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        match id.into() {
            Id::Standard(id) => CanFrame::new(id, data),
            Id::Extended(_) => None,
        }
    }

    /// Remote frames are not supported.
    fn new_remote(_id: impl Into<Id>, _dlc: usize) -> Option<Self> {
        None
    }

    #[inline]
    fn is_extended(&self) -> bool {
        false
    }

    #[inline]
    fn is_remote_frame(&self) -> bool {
        false
    }

    #[inline]
    fn id(&self) -> Id {
        Id::Standard(self.id)
    }

    #[inline]
    fn dlc(&self) -> usize {
        usize::from(self.dlc)
    }

    #[inline]
    fn data(&self) -> &[u8] {
        CanFrame::data(self)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for CanFrame {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "CanFrame {{ id: {=u16:#x}, data: {=[u8]:x} }}",
            self.id.as_raw(),
            self.data()
        );
    }
}
