//! Query parameters: parsed into a validated [`QuerySpec`].

mod parser;
mod spec;

pub use parser::*;
pub use spec::*;
