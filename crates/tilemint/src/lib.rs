#![doc = include_str!("../README.md")]

mod alphabet;
mod error;
mod frontend;
mod model;
mod orchestrator;
mod predicate;
mod serial;
pub mod store;
mod template;
mod time;
mod token;

pub use crate::alphabet::*;
pub use crate::error::*;
pub use crate::frontend::*;
pub use crate::model::*;
pub use crate::orchestrator::*;
pub use crate::predicate::*;
pub use crate::serial::*;
pub use crate::template::*;
pub use crate::time::*;
pub use crate::token::*;
