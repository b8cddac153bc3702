//! Re-exports of `tock-registers` under the `kernel::common::registers` path
//! that chip drivers in this repo import from.

pub use tock_registers::fields::{Field, FieldValue};
pub use tock_registers::interfaces::{Readable, ReadWriteable, Writeable};
pub use tock_registers::registers::{InMemoryRegister, ReadOnly, ReadWrite, WriteOnly};
pub use tock_registers::{register_bitfields, LocalRegisterCopy, RegisterLongName};
