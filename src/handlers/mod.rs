//! HTTP handlers for the data routes.

pub mod read;
pub use read::*;
