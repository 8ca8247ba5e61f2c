//! The arena owning every shader object
//!
//! Objects are only ever mutated through `Shaders`, which keeps the referrer graph and the
//! revision counters the compiler relies on in sync with the objects themselves.

use std::mem;
use std::ops::Index;

use fnv::{FnvHashMap as HashMap, FnvHashSet as HashSet};

use crate::chain::FunctionChain;
use crate::errors::*;
use crate::function::Function;
use crate::object::{Call, ObjectId, ShaderObject, Text};
use crate::parsing::Signature;
use crate::types::{BufferRef, Qualifier, Value};
use crate::variable::Variable;

#[derive(Debug)]
struct Entry {
    object: ShaderObject,
    revision: u64,
}

/// A container for the shader objects of one rendering context
#[derive(Debug, Default)]
pub struct Shaders {
    objects: HashMap<ObjectId, Entry>,
    referrers: HashMap<ObjectId, HashMap<ObjectId, usize>>,
    generation: u64,
}

impl Shaders {
    /// Add an object to the arena
    pub fn add<O: Into<ShaderObject>>(&mut self, object: O) -> Result<ObjectId> {
        let mut object = object.into();
        if let ShaderObject::Chain(ref mut chain) = object {
            for &member in chain.members() {
                self.callable(member)?;
            }

            let signature = chain.derive_signature(self)?;
            chain.set_signature(signature);
        }

        Ok(self.insert(object))
    }

    fn insert(&mut self, object: ShaderObject) -> ObjectId {
        let id = object.id();
        for target in object.referenced() {
            self.add_referrer(target, id);
        }

        self.objects.insert(id, Entry { object, revision: 0 });
        self.generation += 1;
        id
    }

    pub fn function(&mut self, code: &str) -> Result<ObjectId> {
        let func = Function::new(code)?;
        Ok(self.insert(func.into()))
    }

    /// A function that requires `deps` to be emitted before it
    pub fn function_with_deps(&mut self, code: &str, deps: &[ObjectId]) -> Result<ObjectId> {
        for &dep in deps {
            self.get(dep)?;
        }

        let func = Function::new(code)?.with_dependencies(deps);
        Ok(self.insert(func.into()))
    }

    /// An anonymous variable typed by the first value it receives
    pub fn variable(&mut self, name: &str) -> ObjectId {
        self.insert(Variable::new(name).into())
    }

    /// A fixed-name variable, as in `uniform vec4 color` or `const float gamma 2.2`
    pub fn declare(&mut self, decl: &str) -> Result<ObjectId> {
        let var = Variable::declare(decl)?;
        Ok(self.insert(var.into()))
    }

    pub fn uniform<T: Into<Value>>(&mut self, name: &str, value: T) -> ObjectId {
        self.insert(Variable::with_value(name, value.into()).into())
    }

    pub fn attribute(&mut self, name: &str, buffer: BufferRef) -> ObjectId {
        self.insert(Variable::with_value(name, Value::Buffer(buffer)).into())
    }

    pub fn varying(&mut self, name: &str, dtype: Option<&str>) -> ObjectId {
        self.insert(Variable::varying(name, dtype).into())
    }

    /// A verbatim expression, such as `gl_FragCoord.xy`
    pub fn text(&mut self, code: &str) -> ObjectId {
        self.insert(Text::new(code).into())
    }

    /// An expression calling `callee` with `args`, as in `transform(a_position)`
    pub fn call(&mut self, callee: ObjectId, args: &[ObjectId]) -> Result<ObjectId> {
        self.get(callee)?;
        for &arg in args {
            self.get(arg)?;
        }

        let call = Call::new(callee, args);
        call.check(self)?;
        Ok(self.insert(call.into()))
    }

    /// An anonymous chain calling `members` in order
    pub fn chain(&mut self, name: &str, members: &[ObjectId]) -> Result<ObjectId> {
        let mut chain = FunctionChain::new(name);
        chain.members_mut().extend_from_slice(members);
        self.add(chain)
    }

    /// A chain that keeps its name
    pub fn named_chain(&mut self, name: &str, members: &[ObjectId]) -> Result<ObjectId> {
        let mut chain = FunctionChain::named(name);
        chain.members_mut().extend_from_slice(members);
        self.add(chain)
    }

    pub fn get(&self, id: ObjectId) -> Result<&ShaderObject> {
        match self.objects.get(&id) {
            Some(entry) => Ok(&entry.object),
            None => bail!(ErrorKind::UnknownObject(id)),
        }
    }

    #[inline]
    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.contains_key(&id)
    }

    pub fn get_function(&self, id: ObjectId) -> Result<&Function> {
        self.get(id)?.as_function().ok_or_else(|| ErrorKind::NotAFunction(id).into())
    }

    pub fn get_variable(&self, id: ObjectId) -> Result<&Variable> {
        self.get(id)?.as_variable().ok_or_else(|| ErrorKind::NotAVariable(id).into())
    }

    pub fn get_chain(&self, id: ObjectId) -> Result<&FunctionChain> {
        self.get(id)?.as_chain().ok_or_else(|| ErrorKind::NotAChain(id).into())
    }

    fn object_mut(&mut self, id: ObjectId) -> Result<&mut ShaderObject> {
        match self.objects.get_mut(&id) {
            Some(entry) => Ok(&mut entry.object),
            None => bail!(ErrorKind::UnknownObject(id)),
        }
    }

    fn function_mut(&mut self, id: ObjectId) -> Result<&mut Function> {
        match *self.object_mut(id)? {
            ShaderObject::Function(ref mut func) => Ok(func),
            _ => bail!(ErrorKind::NotAFunction(id)),
        }
    }

    fn variable_mut(&mut self, id: ObjectId) -> Result<&mut Variable> {
        match *self.object_mut(id)? {
            ShaderObject::Variable(ref mut var) => Ok(var),
            _ => bail!(ErrorKind::NotAVariable(id)),
        }
    }

    fn chain_mut(&mut self, id: ObjectId) -> Result<&mut FunctionChain> {
        match *self.object_mut(id)? {
            ShaderObject::Chain(ref mut chain) => Ok(chain),
            _ => bail!(ErrorKind::NotAChain(id)),
        }
    }

    /// Signature of an object that can be called
    fn callable(&self, id: ObjectId) -> Result<&Signature> {
        match self.get(id)?.signature() {
            Some(sig) => Ok(sig),
            None => bail!(ErrorKind::NotAFunction(id)),
        }
    }

    /// Bumped every time an object could compile to a different definition
    pub fn revision(&self, id: ObjectId) -> Result<u64> {
        match self.objects.get(&id) {
            Some(entry) => Ok(entry.revision),
            None => bail!(ErrorKind::UnknownObject(id)),
        }
    }

    /// Bumped on every change made to the arena, values included
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn dependencies(&self, id: ObjectId) -> Result<Vec<ObjectId>> {
        Ok(self.get(id)?.dependencies())
    }

    /// Objects whose code shows the name or shape of `id`, sorted by id
    pub fn referrers(&self, id: ObjectId) -> Vec<ObjectId> {
        let mut referrers: Vec<_> = self
            .referrers
            .get(&id)
            .map(|referrers| referrers.keys().cloned().collect())
            .unwrap_or_default();

        referrers.sort();
        referrers
    }

    pub fn signature(&self, id: ObjectId) -> Option<&Signature> {
        self.objects.get(&id).and_then(|entry| entry.object.signature())
    }

    /// GLSL type of an object: the type of a variable, following links, or a return type
    pub fn dtype(&self, id: ObjectId) -> Option<&str> {
        let mut id = id;
        for _ in 0..=self.objects.len() {
            match self.objects.get(&id)?.object {
                ShaderObject::Variable(ref var) => match (var.dtype(), var.link()) {
                    (Some(dtype), _) => return Some(dtype),
                    (None, Some(link)) => id = link,
                    (None, None) => return None,
                },
                ShaderObject::Function(ref func) => return Some(func.signature().rtype.as_str()),
                ShaderObject::Chain(ref chain) => return Some(chain.signature().rtype.as_str()),
                ShaderObject::Call(ref call) => id = call.callee(),
                ShaderObject::Text(_) => return None,
            }
        }

        None
    }

    /// Make sure `id` can be compiled on its own, names aside
    pub fn validate(&self, id: ObjectId) -> Result<()> {
        match *self.get(id)? {
            ShaderObject::Variable(ref var) => var.check(self),
            ShaderObject::Function(ref func) => func.check_bound(),
            ShaderObject::Chain(ref chain) => chain.check(self),
            ShaderObject::Call(ref call) => call.check(self),
            ShaderObject::Text(_) => Ok(()),
        }
    }

    /// Bind the template variable `var` of `function` to `object`
    ///
    /// Binding the same object twice is a no-op, binding a different one fails until the
    /// variable is unbound.
    pub fn bind(&mut self, function: ObjectId, var: &str, object: ObjectId) -> Result<()> {
        self.get(object)?;
        if object == function || self.reaches(object, function) {
            bail!(ErrorKind::CyclicDependency(function));
        }

        if self.function_mut(function)?.bind(var, object)? {
            self.add_referrer(object, function);
            self.touch(function);
        }

        Ok(())
    }

    /// Detach the object bound to `var`, if any
    pub fn unbind(&mut self, function: ObjectId, var: &str) -> Result<Option<ObjectId>> {
        let previous = self.function_mut(function)?.unbind(var);
        if let Some(object) = previous {
            self.remove_referrer(object, function);
            self.touch(function);
        }

        Ok(previous)
    }

    /// Give `var` a value
    ///
    /// A variable already bound to `var` receives the value. Otherwise an anonymous `u_<var>`
    /// uniform (or `a_<var>` attribute for buffers) is created and bound in its place.
    pub fn assign<T: Into<Value>>(&mut self, function: ObjectId, var: &str, value: T) -> Result<ObjectId> {
        let value = value.into();

        let bound = {
            let func = self.get_function(function)?;
            if !func.template_vars().iter().any(|name| name == var) {
                bail!(ErrorKind::UnknownTemplateVariable(func.name().to_string(), var.to_string()));
            }
            func.bound(var)
        };

        if let Some(bound) = bound {
            if self.get(bound)?.as_variable().is_some() {
                self.set_value(bound, value)?;
                return Ok(bound);
            }

            self.unbind(function, var)?;
        }

        let prefix = match value.qualifier() {
            Qualifier::Attribute => "a",
            _ => "u",
        };

        let name = format!("{}_{}", prefix, var);
        let object = self.insert(Variable::with_value(&name, value).into());
        self.bind(function, var, object)?;
        Ok(object)
    }

    /// Replace `from` with `to` in the code of `function` before its placeholders are substituted
    ///
    /// Bindings of template variables that disappear from the code are dropped.
    pub fn replace(&mut self, function: ObjectId, from: &str, to: &str) -> Result<()> {
        let dropped = match self.function_mut(function)?.replace(from, to) {
            Some(dropped) => dropped,
            None => return Ok(()),
        };

        for object in dropped {
            self.remove_referrer(object, function);
        }

        self.touch(function);
        Ok(())
    }

    pub fn set_value<T: Into<Value>>(&mut self, variable: ObjectId, value: T) -> Result<()> {
        if self.variable_mut(variable)?.set_value(value.into())? {
            self.touch(variable);
        } else {
            self.generation += 1;
        }

        Ok(())
    }

    /// Make a varying take the type of `other`
    pub fn link(&mut self, varying: ObjectId, other: ObjectId) -> Result<()> {
        self.get(other)?;
        if varying == other || self.links_to(other, varying) {
            bail!(ErrorKind::CyclicDependency(varying));
        }

        let var = self.variable_mut(varying)?;
        let previous = var.link();
        var.set_link(Some(other));

        if let Some(previous) = previous {
            self.remove_referrer(previous, varying);
        }
        self.add_referrer(other, varying);
        self.touch(varying);
        Ok(())
    }

    pub fn append(&mut self, chain: ObjectId, member: ObjectId) -> Result<()> {
        let len = self.get_chain(chain)?.members().len();
        self.insert_member(chain, len, member)
    }

    pub fn prepend(&mut self, chain: ObjectId, member: ObjectId) -> Result<()> {
        self.insert_member(chain, 0, member)
    }

    pub fn insert_member(&mut self, chain: ObjectId, index: usize, member: ObjectId) -> Result<()> {
        self.get_chain(chain)?;
        self.callable(member)?;
        if member == chain || self.reaches(member, chain) {
            bail!(ErrorKind::CyclicDependency(chain));
        }

        let members = self.chain_mut(chain)?.members_mut();
        let index = index.min(members.len());
        members.insert(index, member);

        self.add_referrer(member, chain);
        let refreshed = self.refresh_chain(chain);
        self.touch(chain);
        refreshed?;
        Ok(())
    }

    /// Put `member` in place of the one at `index`, returning the member it replaced
    pub fn set_member(&mut self, chain: ObjectId, index: usize, member: ObjectId) -> Result<ObjectId> {
        self.callable(member)?;
        if member == chain || self.reaches(member, chain) {
            bail!(ErrorKind::CyclicDependency(chain));
        }

        let previous = {
            let members = self.chain_mut(chain)?.members_mut();
            match members.get_mut(index) {
                Some(slot) => mem::replace(slot, member),
                None => bail!(ErrorKind::MemberOutOfRange(chain, index)),
            }
        };

        self.remove_referrer(previous, chain);
        self.add_referrer(member, chain);
        let refreshed = self.refresh_chain(chain);
        self.touch(chain);
        refreshed?;
        Ok(previous)
    }

    /// Remove the first occurrence of `member`, returning whether it was found
    pub fn remove_member(&mut self, chain: ObjectId, member: ObjectId) -> Result<bool> {
        let members = self.chain_mut(chain)?.members_mut();
        match members.iter().position(|&id| id == member) {
            Some(index) => {
                members.remove(index);
            }
            None => return Ok(false),
        }

        self.remove_referrer(member, chain);
        let refreshed = self.refresh_chain(chain);
        self.touch(chain);
        refreshed?;
        Ok(true)
    }

    /// Discard an object
    ///
    /// Objects still referencing it fail to compile until they stop doing so.
    pub fn remove(&mut self, id: ObjectId) -> Result<ShaderObject> {
        let entry = match self.objects.remove(&id) {
            Some(entry) => entry,
            None => bail!(ErrorKind::UnknownObject(id)),
        };

        for target in entry.object.referenced() {
            self.remove_referrer(target, id);
        }

        self.touch(id);
        Ok(entry.object)
    }

    /// Derive the signature of `chain` again, marking it stale if that fails
    fn refresh_chain(&mut self, chain: ObjectId) -> Result<()> {
        let derived = self.get_chain(chain)?.derive_signature(self);
        let target = self.chain_mut(chain)?;

        match derived {
            Ok(signature) => {
                target.set_signature(signature);
                Ok(())
            }
            Err(err) => {
                target.mark_stale();
                Err(err)
            }
        }
    }

    /// Whether `to` is among the dependencies of `from`, transitively
    fn reaches(&self, from: ObjectId, to: ObjectId) -> bool {
        let mut visited = HashSet::default();
        let mut pending = vec![from];

        while let Some(id) = pending.pop() {
            if id == to {
                return true;
            }

            if visited.insert(id) {
                if let Ok(object) = self.get(id) {
                    pending.extend(object.dependencies());
                }
            }
        }

        false
    }

    fn links_to(&self, from: ObjectId, to: ObjectId) -> bool {
        let mut id = from;
        for _ in 0..=self.objects.len() {
            match self.get_variable(id).ok().and_then(Variable::link) {
                Some(link) if link == to => return true,
                Some(link) => id = link,
                None => return false,
            }
        }

        false
    }

    fn add_referrer(&mut self, target: ObjectId, referrer: ObjectId) {
        *self
            .referrers
            .entry(target)
            .or_insert_with(HashMap::default)
            .entry(referrer)
            .or_insert(0) += 1;
    }

    fn remove_referrer(&mut self, target: ObjectId, referrer: ObjectId) {
        if let Some(referrers) = self.referrers.get_mut(&target) {
            let remaining = match referrers.get_mut(&referrer) {
                Some(count) => {
                    *count -= 1;
                    *count
                }
                None => return,
            };

            if remaining == 0 {
                referrers.remove(&referrer);
            }
        }
    }

    /// Record that the definition of `id` may have changed
    ///
    /// Chains containing it re-derive their signature, and are touched in turn along with
    /// calls to it and the varyings linked to those.
    fn touch(&mut self, id: ObjectId) {
        self.generation += 1;

        let mut visited = HashSet::default();
        let mut pending = vec![id];

        while let Some(id) = pending.pop() {
            if !visited.insert(id) {
                continue;
            }

            if let Some(entry) = self.objects.get_mut(&id) {
                entry.revision += 1;
            }

            for referrer in self.referrers(id) {
                match self.objects.get(&referrer).map(|entry| &entry.object) {
                    Some(&ShaderObject::Chain(_)) => {
                        if let Err(err) = self.refresh_chain(referrer) {
                            debug!("{} has a stale signature: {}", referrer, err);
                        }
                        pending.push(referrer);
                    }
                    Some(&ShaderObject::Variable(ref var)) if var.link() == Some(id) => {
                        pending.push(referrer);
                    }
                    Some(&ShaderObject::Call(_)) => pending.push(referrer),
                    _ => {}
                }
            }
        }
    }
}

impl Index<ObjectId> for Shaders {
    type Output = ShaderObject;

    fn index(&self, id: ObjectId) -> &ShaderObject {
        &self.objects[&id].object
    }
}
