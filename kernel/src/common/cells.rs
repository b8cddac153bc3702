//! Re-exports of the `tock-cells` interior-mutability wrappers under the
//! `kernel::common::cells` path that chip drivers in this repo import from.

pub use tock_cells::map_cell::MapCell;
pub use tock_cells::optional_cell::OptionalCell;
pub use tock_cells::take_cell::TakeCell;
