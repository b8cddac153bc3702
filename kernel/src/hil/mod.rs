//! Hardware Interface Layer traits. Each submodule defines the portable
//! contract a family of chip drivers implements for one peripheral class.

pub mod i2c;
