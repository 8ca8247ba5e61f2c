//! Function chains

use crate::arena::Shaders;
use crate::errors::*;
use crate::object::{ObjectId, Scope};
use crate::parsing::{Arg, Signature};

/// A function calling its members in sequence, each one receiving the result of the previous
///
/// The first member receives every argument of the chain and the chain returns what the last
/// member returns. A member following a `void` one is called without arguments.
#[derive(Clone, Debug)]
pub struct FunctionChain {
    id: ObjectId,
    name: String,
    anonymous: bool,
    members: Vec<ObjectId>,
    signature: Signature,
    stale: bool,
}

/// What flows into the next member of a chain
enum Flow<'a> {
    Start,
    Void(&'a str),
    Value(&'a str, &'a str),
}

impl FunctionChain {
    /// An anonymous chain, with no members yet
    pub fn new(name: &str) -> Self {
        FunctionChain {
            id: ObjectId::next(),
            name: name.to_string(),
            anonymous: true,
            members: Vec::new(),
            signature: Signature {
                name: name.to_string(),
                anonymous: true,
                args: Vec::new(),
                rtype: String::from("void"),
            },
            stale: false,
        }
    }

    /// A chain that always keeps its name
    pub fn named(name: &str) -> Self {
        let mut chain = FunctionChain::new(name);
        chain.anonymous = false;
        chain.signature.anonymous = false;
        chain
    }

    #[inline]
    pub fn id(&self) -> ObjectId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn is_anonymous(&self) -> bool {
        self.anonymous
    }

    #[inline]
    pub fn members(&self) -> &[ObjectId] {
        &self.members
    }

    #[inline]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    #[inline]
    pub(crate) fn members_mut(&mut self) -> &mut Vec<ObjectId> {
        &mut self.members
    }

    /// Arguments of the first member and return type of the last one
    pub(crate) fn derive_signature(&self, shaders: &Shaders) -> Result<(Vec<Arg>, String)> {
        match (self.members.first(), self.members.last()) {
            (Some(&first), Some(&last)) => Ok((
                member_signature(shaders, first)?.args.clone(),
                member_signature(shaders, last)?.rtype.clone(),
            )),
            _ => Ok((Vec::new(), String::from("void"))),
        }
    }

    #[inline]
    pub(crate) fn set_signature(&mut self, (args, rtype): (Vec<Arg>, String)) {
        self.signature.args = args;
        self.signature.rtype = rtype;
        self.stale = false;
    }

    /// Whether the signature could not be derived again after the members last changed
    #[inline]
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    #[inline]
    pub(crate) fn mark_stale(&mut self) {
        self.stale = true;
    }

    /// Make sure the members can be called in sequence
    pub fn check(&self, shaders: &Shaders) -> Result<()> {
        if self.stale {
            self.derive_signature(shaders)?;
        }

        let mut flow = Flow::Start;

        for &member in &self.members {
            let sig = member_signature(shaders, member)?;

            let mismatch = match flow {
                Flow::Void(from) if !sig.args.is_empty() => Some((from, "void")),
                Flow::Value(from, ty) if sig.args.len() != 1 || sig.args[0].ty != ty => Some((from, ty)),
                _ => None,
            };

            if let Some((from, from_type)) = mismatch {
                bail!(ErrorKind::ChainTypeMismatch(
                    self.name.clone(),
                    from.to_string(),
                    from_type.to_string(),
                    sig.name.clone(),
                    arg_types(&sig.args),
                ));
            }

            flow = if sig.rtype == "void" {
                Flow::Void(&sig.name)
            } else {
                Flow::Value(&sig.name, &sig.rtype)
            };
        }

        Ok(())
    }

    pub fn compile(&self, scope: &Scope) -> Result<String> {
        self.check(scope.shaders())?;

        let name = scope.name(self.id)?;
        let args: Vec<_> = self
            .signature
            .args
            .iter()
            .map(|arg| format!("{} {}", arg.ty, arg.name))
            .collect();

        let mut code = format!("{} {}({}) {{\n", self.signature.rtype, name, args.join(", "));

        let mut input = self
            .signature
            .args
            .iter()
            .map(|arg| arg.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        for (index, &member) in self.members.iter().enumerate() {
            let sig = member_signature(scope.shaders(), member)?;
            let callee = scope.name(member)?;

            if sig.rtype == "void" {
                code.push_str(&format!("    {}({});\n", callee, input));
                input = String::new();
            } else {
                let result = format!("result_{}", index + 1);
                code.push_str(&format!("    {} {} = {}({});\n", sig.rtype, result, callee, input));
                input = result;
            }
        }

        if self.signature.rtype != "void" {
            code.push_str(&format!("    return {};\n", input));
        }

        code.push('}');
        Ok(code)
    }
}

fn member_signature(shaders: &Shaders, member: ObjectId) -> Result<&Signature> {
    match shaders.get(member)?.signature() {
        Some(sig) => Ok(sig),
        None => bail!(ErrorKind::NotAFunction(member)),
    }
}

fn arg_types(args: &[Arg]) -> String {
    let types: Vec<_> = args.iter().map(|arg| arg.ty.as_str()).collect();
    format!("({})", types.join(", "))
}
