//! Table transforms.
//!
//! Every transform takes a table by reference and returns a new one:
//!
//! - `convert`: pointwise unit conversion of values
//! - `rescale`: resample a dense domain onto a new size

pub mod convert;
pub mod rescale;

pub use convert::*;
pub use rescale::*;
