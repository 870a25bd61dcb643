//! Output writing.

pub mod writer;

pub use writer::*;
