//! Master-mode transfer engine for the STM32 I2Cv1 peripheral (F1/F2/F4/
//! L1-class parts): register access, clock programming, the protocol
//! state machine, dispatch and synchronization, and lifecycle management.
//!
//! Board crates own the pin mux, NVIC wiring, and bus-recovery GPIO
//! control (see [`platform::Platform`]); [`lifecycle::Instance`] itself
//! implements `kernel::hil::i2c::I2CMaster` over that engine, so no
//! separate HIL wrapper is needed.

#![cfg_attr(not(test), no_std)]

#[cfg(all(feature = "dispatch-polled", feature = "dispatch-interrupt"))]
compile_error!("features \"dispatch-polled\" and \"dispatch-interrupt\" are mutually exclusive");
#[cfg(not(any(feature = "dispatch-polled", feature = "dispatch-interrupt")))]
compile_error!("one of \"dispatch-polled\" or \"dispatch-interrupt\" must be enabled");

#[cfg(all(feature = "dynamic-timeout", feature = "static-timeout"))]
compile_error!("features \"dynamic-timeout\" and \"static-timeout\" are mutually exclusive");
#[cfg(not(any(feature = "dynamic-timeout", feature = "static-timeout")))]
compile_error!("one of \"dynamic-timeout\" or \"static-timeout\" must be enabled");

#[cfg(not(any(feature = "i2c1", feature = "i2c2", feature = "i2c3")))]
compile_error!("at least one of \"i2c1\", \"i2c2\" or \"i2c3\" must be enabled");

#[cfg(all(feature = "fsmc-workaround", not(feature = "i2c1")))]
compile_error!("\"fsmc-workaround\" only applies to I2C1 (the FSMC/I2C1 LBAR conflict is specific to that port)");

pub mod clock;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod message;
pub mod platform;
pub mod registers;
pub mod trace;
pub mod transfer;

pub use dispatcher::Timeout;
pub use error::Error;
pub use lifecycle::{BusState, Instance};
pub use message::{AddressWidth, Message, MessageFlags};
pub use platform::Platform;
#[cfg(feature = "bus-recovery")]
pub use platform::{BitBangRecovery, Recovery};

/// The default static timeout (spec §5): 1 second flat, independent of
/// transfer size. Used when the `static-timeout` feature is selected and
/// a board doesn't supply its own.
#[cfg(feature = "static-timeout")]
pub const DEFAULT_TIMEOUT: Timeout = Timeout::fixed(1, 0);

/// The default dynamic timeout (spec §5): 10 ms base plus 1 ms per byte.
#[cfg(feature = "dynamic-timeout")]
pub const DEFAULT_TIMEOUT: Timeout = Timeout::scaled(10, 1_000);
