//! Types shared between the gantry library and its binaries.

pub mod errors;

pub use errors::{GantryError, GantryResult};
