//! Type definitions

pub mod fleet;
pub mod order;
pub mod stop;

pub use fleet::*;
pub use order::*;
pub use stop::*;
