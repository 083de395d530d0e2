#![doc = include_str!("../README.md")]

mod config;
mod error;
mod file;
mod like;
mod memory;
mod records;

pub use crate::config::*;
pub use crate::error::*;
pub use crate::file::*;
pub use crate::like::*;
pub use crate::memory::*;
pub use crate::records::*;
pub use tilemint;
