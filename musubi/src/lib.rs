//! Link reusable GLSL snippets into complete shader stages
//!
//! Shader code is split into small `Function`s whose bodies reference other objects through
//! `$name` placeholders. Functions, `Variable`s and `FunctionChain`s live in a `Shaders` arena;
//! the `Compiler` walks the objects reachable from each stage's roots, hands out non-colliding
//! names and assembles one source string per stage. Names and compiled definitions are cached
//! across calls, so recompiling after a small change only regenerates what it touched.
//!
//! ```
//! # extern crate musubi;
//! # use std::collections::BTreeMap;
//! # use musubi::prelude::*;
//! # fn main() {
//!     let mut shaders = Shaders::default();
//!
//!     let scale = shaders.function("
//!         vec4 $scale(vec4 pos) {
//!             return vec4(pos.xyz * $factor, pos.w);
//!         }
//!     ").unwrap();
//!
//!     // Binds an anonymous `u_factor` uniform to the placeholder
//!     shaders.assign(scale, "factor", 2.0f32).unwrap();
//!
//!     let mut vertex = StageInput::new("void main() { gl_Position = $transform(vec4(0.0)); }");
//!     vertex.push(Root::new("transform", scale));
//!
//!     let mut stages = BTreeMap::new();
//!     stages.insert(Stage::Vertex, vertex);
//!
//!     let compiled = compile_program(&shaders, &stages).unwrap();
//!     assert!(compiled[Stage::Vertex].contains("uniform float u_factor;"));
//! # }
//! ```

#[macro_use]
extern crate error_chain;
#[macro_use]
extern crate log;

mod graph;

pub mod arena;
pub mod chain;
pub mod compiler;
pub mod errors;
pub mod function;
pub mod object;
pub mod parsing;
pub mod prelude;
pub mod types;
pub mod variable;
