//! Hardware Interface Layer for master-mode I2C controllers.
//!
//! Mirrors the shape of `hil::bus` (see `kernel::hil::bus`): a small trait a
//! chip's peripheral driver implements, plus a client trait the driver calls
//! back into when an operation completes. Chip crates are free to expose a
//! richer surface (chained transfers, 10-bit addressing, ...) as inherent
//! methods beyond this trait; `I2CMaster` is the portable subset other
//! kernel code can depend on without naming a specific chip.

use crate::returncode::ReturnCode;

/// Reasons a transfer can fail to complete successfully.
///
/// One `Error` is produced per failed `transfer`/`write`/`read` call;
/// partial progress is never reported separately from the error.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// No completion observed before the configured deadline.
    TimedOut,
    /// SR1.BERR: a START or STOP was observed somewhere it should not have
    /// been.
    BusError,
    /// SR1.ARLO: lost arbitration to another master. Safe to retry.
    ArbitrationLost,
    /// SR1.AF: the addressed (or currently addressed) device did not
    /// acknowledge.
    Nack,
    /// SR1.OVR: a received byte was not read out before the next one
    /// arrived.
    Overrun,
    /// SR1.PECERR, or an internal protocol violation this driver detected
    /// in its own state machine (e.g. an unrecognized next-message flag
    /// combination, or a 10-bit address request).
    Protocol,
    /// SR1.TIMEOUT: the peripheral's own SCL-low stretch timeout fired.
    BusTimeout,
    /// The bus was still busy after the transfer window closed.
    Busy,
    /// The completion wait was interrupted by a signal before the deadline.
    Interrupted,
}

impl From<Error> for ReturnCode {
    fn from(err: Error) -> ReturnCode {
        match err {
            Error::TimedOut => ReturnCode::ECANCEL,
            Error::BusError => ReturnCode::FAIL,
            Error::ArbitrationLost => ReturnCode::EBUSY,
            Error::Nack => ReturnCode::ENOACK,
            Error::Overrun => ReturnCode::FAIL,
            Error::Protocol => ReturnCode::EINVAL,
            Error::BusTimeout => ReturnCode::ECANCEL,
            Error::Busy => ReturnCode::EBUSY,
            Error::Interrupted => ReturnCode::FAIL,
        }
    }
}

/// Callback for an interrupt-driven `I2CMaster`.
pub trait I2CHwMasterClient {
    /// The previously submitted buffer is handed back regardless of
    /// outcome; on error the caller's buffer is left in an unspecified
    /// prefix state per the "no partial progress reporting" rule.
    fn command_complete(&self, buffer: &'static mut [u8], status: Result<(), Error>);
}

/// Portable master-mode I2C operations any chip driver in this family
/// implements.
pub trait I2CMaster<'a> {
    fn set_master_client(&self, client: &'a dyn I2CHwMasterClient);
    fn enable(&self);
    fn disable(&self);
    fn write_read(
        &self,
        addr: u8,
        data: &'static mut [u8],
        write_len: usize,
        read_len: usize,
    ) -> Result<(), (Error, &'static mut [u8])>;
    fn write(&self, addr: u8, data: &'static mut [u8], len: usize) -> Result<(), (Error, &'static mut [u8])>;
    fn read(&self, addr: u8, buffer: &'static mut [u8], len: usize) -> Result<(), (Error, &'static mut [u8])>;
}
