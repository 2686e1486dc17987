pub mod traits;
pub mod types;
mod pending;

pub mod length_prefixed;


pub use traits::*;
pub use types::*;
pub use length_prefixed::*;
