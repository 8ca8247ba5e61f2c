//! Hook-based shader programs on top of the musubi linker
//!
//! A `ModularProgram` starts from the `main` code of a vertex and a fragment stage. Every
//! function prototype declared there is a hook: attach any shader object to it (or a chain of
//! callbacks) and the program links, uploads and binds everything when drawn.

#[macro_use]
extern crate error_chain;
#[macro_use]
extern crate log;

pub mod backend;
pub mod errors;
pub mod prelude;
pub mod program;
