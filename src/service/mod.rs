//! Read service: the request pipeline behind the data routes.

pub mod assemble;
mod preload;
mod read;

pub use preload::{expand_m2m, preload};
pub use read::{fetch_one, list};
