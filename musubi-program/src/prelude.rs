//! Exports everything you probably want to have in scope to build a program

pub use musubi::prelude::*;

pub use crate::backend::Backend;
pub use crate::program::ModularProgram;
