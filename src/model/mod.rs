//! Registered models: schema plus optional per-model hooks.

mod hooks;
mod registry;
mod user;

pub use hooks::*;
pub use registry::*;
pub use user::*;
