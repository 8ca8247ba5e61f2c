//! Shader objects and the handles used to refer to them

use std::borrow::Cow;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use fnv::FnvHashMap as HashMap;

use crate::arena::Shaders;
use crate::chain::FunctionChain;
use crate::errors::*;
use crate::function::Function;
use crate::parsing::Signature;
use crate::variable::Variable;

static NEXT_ID: AtomicUsize = AtomicUsize::new(1);

/// An opaque handle to a shader object
///
/// Handles come from a process-wide counter: they are never reused, even across arenas.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ObjectId(pub(crate) usize);

impl ObjectId {
    #[inline]
    pub(crate) fn next() -> Self {
        ObjectId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A verbatim GLSL expression bound to a placeholder, such as `gl_Position`
///
/// It has neither a name nor a definition of its own.
#[derive(Clone, Debug)]
pub struct Text {
    id: ObjectId,
    code: String,
}

impl Text {
    pub fn new(code: &str) -> Self {
        Text {
            id: ObjectId::next(),
            code: code.to_string(),
        }
    }

    #[inline]
    pub fn id(&self) -> ObjectId {
        self.id
    }

    #[inline]
    pub fn code(&self) -> &str {
        &self.code
    }
}

/// A call to a function or chain, with objects as arguments
///
/// Bound to a placeholder it is replaced by `callee(arg, ...)`. Like text, it has neither a
/// name nor a definition, but the callee and the arguments are emitted before whatever uses it.
#[derive(Clone, Debug)]
pub struct Call {
    id: ObjectId,
    callee: ObjectId,
    args: Vec<ObjectId>,
}

impl Call {
    pub(crate) fn new(callee: ObjectId, args: &[ObjectId]) -> Self {
        Call {
            id: ObjectId::next(),
            callee,
            args: args.to_vec(),
        }
    }

    #[inline]
    pub fn id(&self) -> ObjectId {
        self.id
    }

    #[inline]
    pub fn callee(&self) -> ObjectId {
        self.callee
    }

    #[inline]
    pub fn args(&self) -> &[ObjectId] {
        &self.args
    }

    /// Callee first, then the arguments
    pub fn objects(&self) -> Vec<ObjectId> {
        Some(self.callee).into_iter().chain(self.args.iter().cloned()).collect()
    }

    /// Make sure the callee still takes as many arguments as the call passes
    pub fn check(&self, shaders: &Shaders) -> Result<()> {
        let sig = match shaders.signature(self.callee) {
            Some(sig) => sig,
            None => bail!(ErrorKind::NotAFunction(self.callee)),
        };

        if sig.args.len() != self.args.len() {
            bail!(ErrorKind::CallArity(sig.name.clone(), sig.args.len(), self.args.len()));
        }

        Ok(())
    }
}

/// A node of the shader dependency graph
#[derive(Clone, Debug)]
pub enum ShaderObject {
    Variable(Variable),
    Function(Function),
    Chain(FunctionChain),
    Text(Text),
    Call(Call),
}

impl ShaderObject {
    #[inline]
    pub fn id(&self) -> ObjectId {
        match *self {
            ShaderObject::Variable(ref var) => var.id(),
            ShaderObject::Function(ref func) => func.id(),
            ShaderObject::Chain(ref chain) => chain.id(),
            ShaderObject::Text(ref text) => text.id(),
            ShaderObject::Call(ref call) => call.id(),
        }
    }

    /// The name given at construction, used as a base when the object is anonymous
    pub fn name(&self) -> Option<&str> {
        match *self {
            ShaderObject::Variable(ref var) => Some(var.name()),
            ShaderObject::Function(ref func) => Some(func.name()),
            ShaderObject::Chain(ref chain) => Some(chain.name()),
            ShaderObject::Text(_) | ShaderObject::Call(_) => None,
        }
    }

    /// Whether the compiler may rename this object
    pub fn is_anonymous(&self) -> bool {
        match *self {
            ShaderObject::Variable(ref var) => var.is_anonymous(),
            ShaderObject::Function(ref func) => func.is_anonymous(),
            ShaderObject::Chain(ref chain) => chain.is_anonymous(),
            ShaderObject::Text(_) | ShaderObject::Call(_) => false,
        }
    }

    /// Objects whose definitions must be emitted before this one
    pub fn dependencies(&self) -> Vec<ObjectId> {
        match *self {
            ShaderObject::Function(ref func) => func.dependencies(),
            ShaderObject::Chain(ref chain) => chain.members().to_vec(),
            ShaderObject::Call(ref call) => call.objects(),
            ShaderObject::Variable(_) | ShaderObject::Text(_) => Vec::new(),
        }
    }

    /// Objects whose name or shape shows through in this object's code
    pub(crate) fn referenced(&self) -> Vec<ObjectId> {
        match *self {
            ShaderObject::Variable(ref var) => var.link().into_iter().collect(),
            ShaderObject::Function(ref func) => func.bound_objects().collect(),
            ShaderObject::Chain(ref chain) => chain.members().to_vec(),
            ShaderObject::Call(ref call) => call.objects(),
            ShaderObject::Text(_) => Vec::new(),
        }
    }

    /// Names used by this object's code that nothing else may be called
    pub fn static_names(&self) -> &[String] {
        match *self {
            ShaderObject::Function(ref func) => func.static_names(),
            _ => &[],
        }
    }

    pub fn signature(&self) -> Option<&Signature> {
        match *self {
            ShaderObject::Function(ref func) => Some(func.signature()),
            ShaderObject::Chain(ref chain) => Some(chain.signature()),
            ShaderObject::Variable(_) | ShaderObject::Text(_) | ShaderObject::Call(_) => None,
        }
    }

    /// Whether the object is emitted, rather than written out where it is used
    #[inline]
    pub fn has_definition(&self) -> bool {
        match *self {
            ShaderObject::Text(_) | ShaderObject::Call(_) => false,
            _ => true,
        }
    }

    /// Generate the definition of this object, `None` for expressions
    pub fn compile(&self, scope: &Scope) -> Result<Option<String>> {
        Ok(Some(match *self {
            ShaderObject::Variable(ref var) => var.compile(scope)?,
            ShaderObject::Function(ref func) => func.compile(scope)?,
            ShaderObject::Chain(ref chain) => chain.compile(scope)?,
            ShaderObject::Text(_) | ShaderObject::Call(_) => return Ok(None),
        }))
    }

    #[inline]
    pub fn as_variable(&self) -> Option<&Variable> {
        match *self {
            ShaderObject::Variable(ref var) => Some(var),
            _ => None,
        }
    }

    #[inline]
    pub fn as_function(&self) -> Option<&Function> {
        match *self {
            ShaderObject::Function(ref func) => Some(func),
            _ => None,
        }
    }

    #[inline]
    pub fn as_chain(&self) -> Option<&FunctionChain> {
        match *self {
            ShaderObject::Chain(ref chain) => Some(chain),
            _ => None,
        }
    }

    #[inline]
    pub fn as_call(&self) -> Option<&Call> {
        match *self {
            ShaderObject::Call(ref call) => Some(call),
            _ => None,
        }
    }
}

impl From<Variable> for ShaderObject {
    fn from(var: Variable) -> Self {
        ShaderObject::Variable(var)
    }
}

impl From<Function> for ShaderObject {
    fn from(func: Function) -> Self {
        ShaderObject::Function(func)
    }
}

impl From<FunctionChain> for ShaderObject {
    fn from(chain: FunctionChain) -> Self {
        ShaderObject::Chain(chain)
    }
}

impl From<Text> for ShaderObject {
    fn from(text: Text) -> Self {
        ShaderObject::Text(text)
    }
}

impl From<Call> for ShaderObject {
    fn from(call: Call) -> Self {
        ShaderObject::Call(call)
    }
}

/// The names assigned by one compilation, as seen by the objects being compiled
#[derive(Copy, Clone)]
pub struct Scope<'a> {
    shaders: &'a Shaders,
    names: &'a HashMap<ObjectId, String>,
}

impl<'a> Scope<'a> {
    pub fn new(shaders: &'a Shaders, names: &'a HashMap<ObjectId, String>) -> Self {
        Scope { shaders, names }
    }

    #[inline]
    pub fn shaders(&self) -> &'a Shaders {
        self.shaders
    }

    /// The name assigned to `id`
    pub fn name(&self, id: ObjectId) -> Result<&'a str> {
        match self.names.get(&id) {
            Some(name) => Ok(name),
            None => bail!(ErrorKind::Unnamed(id)),
        }
    }

    /// What a placeholder bound to `id` is replaced with
    pub fn expression(&self, id: ObjectId) -> Result<Cow<'a, str>> {
        match *self.shaders.get(id)? {
            ShaderObject::Text(ref text) => Ok(Cow::Borrowed(text.code())),
            ShaderObject::Call(ref call) => {
                let args = call
                    .args()
                    .iter()
                    .map(|&arg| self.expression(arg))
                    .collect::<Result<Vec<_>>>()?;

                Ok(Cow::Owned(format!("{}({})", self.name(call.callee())?, args.join(", "))))
            }
            _ => self.name(id).map(Cow::Borrowed),
        }
    }
}
