//! Safe SQL builder: identifiers from the schema only, values as positional args.

mod builder;
pub mod params;
mod placeholder;
pub use builder::*;
pub use params::*;
pub use placeholder::*;
