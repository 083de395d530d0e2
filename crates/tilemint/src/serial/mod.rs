mod codec;
mod pattern;

pub use codec::*;
pub use pattern::*;
