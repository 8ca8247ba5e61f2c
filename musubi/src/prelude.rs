//! Exports everything you probably want to have in scope to get started with Musubi

use std::collections::BTreeMap;

pub use crate::arena::Shaders;
pub use crate::chain::FunctionChain;
pub use crate::compiler::{Compiled, Compiler, Naming, Root, Settings, StageInput, Target};
pub use crate::function::Function;
pub use crate::object::{Call, ObjectId, ShaderObject, Text};
pub use crate::parsing::{Arg, Prototype, Signature};
pub use crate::types::{BufferRef, Qualifier, Stage, Value};
pub use crate::variable::Variable;

use crate::errors::Result;

/// Link a set of stages with a fresh compiler
pub fn compile_program(shaders: &Shaders, stages: &BTreeMap<Stage, StageInput>) -> Result<Compiled> {
    Compiler::new().compile(shaders, stages)
}

/// Definitions of `object` and everything it depends on
pub fn compile_object(shaders: &Shaders, object: ObjectId) -> Result<String> {
    let mut stages = BTreeMap::new();
    stages.insert(Stage::Vertex, StageInput::new("").root(Root::new("object", object)));

    let mut compiled = compile_program(shaders, &stages)?;
    Ok(compiled.sources.remove(&Stage::Vertex).unwrap_or_default())
}
