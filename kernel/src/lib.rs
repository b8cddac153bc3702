//! Shared support crate for this repo's chip drivers: register-access
//! primitives, interior-mutability cells, the legacy `ReturnCode` type, the
//! `debug!` logging facility, and the HIL traits chip drivers implement.

#![no_std]

pub mod common;
#[macro_use]
pub mod debug;
pub mod hil;
pub mod returncode;

pub use returncode::ReturnCode;

/// A peripheral's bus clock gate, abstracted so chip drivers can enable and
/// query their own clock without naming a specific chip's RCC/CCM/PMC block.
pub trait ClockInterface {
    fn is_enabled(&self) -> bool;
    fn enable(&self);
    fn disable(&self);
}
