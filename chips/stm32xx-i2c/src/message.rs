//! The message record the caller builds a transfer out of (spec §6).

bitflags::bitflags! {
    /// Per-message flags. `NO_RESTART` and `READ` are mutually exclusive in
    /// every valid chain this engine accepts (see `engine::write_complete`);
    /// any other combination is reported as `Error::Protocol`.
    pub struct MessageFlags: u8 {
        /// This message is a read; omit for a write.
        const READ = 0b001;
        /// Emit a 10-bit header instead of a 7-bit address byte.
        ///
        /// Unimplemented — see `Engine`'s handling of `SR1::SB`. Parsed so
        /// a caller's intent is visible, but any attempt to use it fails
        /// with `Error::Protocol` rather than writing a placeholder byte.
        const TEN_BIT = 0b010;
        /// Continue directly into this message's data phase without a
        /// START/repeated-START boundary from the previous message.
        const NO_RESTART = 0b100;
    }
}

/// A width hint for `Instance::setaddress`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AddressWidth {
    Bits7,
    Bits10,
}

/// One leg of an I2C transfer chain.
pub struct Message<'a> {
    pub address: u16,
    pub flags: MessageFlags,
    pub buffer: &'a mut [u8],
}

impl<'a> Message<'a> {
    pub fn write(address: u16, buffer: &'a mut [u8]) -> Self {
        Message {
            address,
            flags: MessageFlags::empty(),
            buffer,
        }
    }

    pub fn read(address: u16, buffer: &'a mut [u8]) -> Self {
        Message {
            address,
            flags: MessageFlags::READ,
            buffer,
        }
    }
}
