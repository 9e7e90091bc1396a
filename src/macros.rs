/// Implements [`Reg`](crate::regs::Reg) for a single byte `#[bitfield]`
/// register, and optionally [`BitModifiable`](crate::regs::BitModifiable).
macro_rules! register {
    ($ty:ident, $addr:ident) => {
        impl $crate::regs::Reg for $ty {
            const ADDRESS: $crate::regs::Register = $crate::regs::Register::$addr;

            #[inline]
            fn from_byte(byte: u8) -> Self {
                Self::from_bytes([byte])
            }

            #[inline]
            fn into_byte(self) -> u8 {
                self.into_bytes()[0]
            }
        }
    };
    ($ty:ident, $addr:ident, bitmod) => {
        $crate::macros::register!($ty, $addr);

        impl $crate::regs::BitModifiable for $ty {}
    };
}

// Log forwarding. Expands to nothing unless the `defmt` feature is enabled.

macro_rules! trace {
    ($($arg:tt)*) => {{
        #[cfg(feature = "defmt")]
        defmt::trace!($($arg)*);
    }};
}

macro_rules! debug {
    ($($arg:tt)*) => {{
        #[cfg(feature = "defmt")]
        defmt::debug!($($arg)*);
    }};
}

macro_rules! warning {
    ($($arg:tt)*) => {{
        #[cfg(feature = "defmt")]
        defmt::warn!($($arg)*);
    }};
}

pub(crate) use {debug, register, trace, warning};
