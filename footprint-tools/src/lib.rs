pub mod utils;
pub use footprint::{Error, Result};

pub mod proc;
pub use proc::*;

pub mod cli;
