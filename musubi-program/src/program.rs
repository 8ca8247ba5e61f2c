use std::collections::BTreeMap;

use fnv::FnvHashMap as HashMap;
use log::Level;

use musubi::parsing::find_prototypes;
use musubi::prelude::*;

use crate::backend::Backend;
use crate::errors::*;

#[derive(Clone, Debug)]
struct Hook {
    stage: Stage,
    prototype: Prototype,
}

/// A vertex and a fragment stage whose prototypes are filled in by shader objects
///
/// The program only holds handles: objects live in a `Shaders` arena passed to every
/// operation that needs them. Linking happens lazily in `draw`, which re-uploads the sources
/// only when they changed and re-binds only the values that changed since the last draw.
#[derive(Debug)]
pub struct ModularProgram {
    stages: BTreeMap<Stage, StageInput>,
    hooks: BTreeMap<String, Hook>,
    attached: BTreeMap<String, ObjectId>,
    detached: Vec<ObjectId>,
    compiler: Compiler,
    dirty: bool,
    generation: Option<u64>,
    compiled: Option<Compiled>,
    bound: HashMap<String, (ObjectId, u64)>,
}

impl ModularProgram {
    pub fn new(vertex: &str, fragment: &str) -> Result<Self> {
        ModularProgram::with_settings(vertex, fragment, Settings::default())
    }

    pub fn with_settings(vertex: &str, fragment: &str, settings: Settings) -> Result<Self> {
        let mut stages = BTreeMap::new();
        let mut hooks = BTreeMap::new();

        for &(stage, code) in &[(Stage::Vertex, vertex), (Stage::Fragment, fragment)] {
            stages.insert(stage, StageInput::new(code));
            for prototype in find_prototypes(code) {
                if hooks.contains_key(&prototype.name) {
                    bail!(ErrorKind::DuplicateHook(prototype.name));
                }

                hooks.insert(prototype.name.clone(), Hook { stage, prototype });
            }
        }

        Ok(ModularProgram {
            stages,
            hooks,
            attached: BTreeMap::new(),
            detached: Vec::new(),
            compiler: Compiler::with_settings(settings),
            dirty: true,
            generation: None,
            compiled: None,
            bound: HashMap::default(),
        })
    }

    /// Names of the hooks declared by both stages
    pub fn hooks(&self) -> impl Iterator<Item = &str> {
        self.hooks.keys().map(String::as_str)
    }

    pub fn hook_stage(&self, hook: &str) -> Option<Stage> {
        self.hooks.get(hook).map(|hook| hook.stage)
    }

    /// The object currently attached to `hook`
    pub fn hook_object(&self, hook: &str) -> Option<ObjectId> {
        self.attached.get(hook).cloned()
    }

    #[inline]
    pub fn compiler(&self) -> &Compiler {
        &self.compiler
    }

    /// Output of the last successful link
    #[inline]
    pub fn compiled(&self) -> Option<&Compiled> {
        self.compiled.as_ref()
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Attach `object` to `hook`, returning what was attached before
    pub fn set_hook(&mut self, hook: &str, object: ObjectId) -> Result<Option<ObjectId>> {
        self.check_hook(hook)?;

        let previous = self.attached.insert(hook.to_string(), object);
        if let Some(previous) = previous {
            if previous != object {
                self.detach(previous);
            }
        }

        self.dirty = true;
        Ok(previous)
    }

    pub fn unset_hook(&mut self, hook: &str) -> Result<Option<ObjectId>> {
        self.check_hook(hook)?;

        let previous = self.attached.remove(hook);
        if let Some(previous) = previous {
            self.detach(previous);
            self.dirty = true;
        }

        Ok(previous)
    }

    /// Attach a new, empty chain to `hook`
    ///
    /// The chain is named after the hook, so members can be added and removed freely.
    pub fn add_chain(&mut self, shaders: &mut Shaders, hook: &str) -> Result<ObjectId> {
        self.check_hook(hook)?;

        let chain = shaders.named_chain(hook, &[])?;
        self.set_hook(hook, chain)?;
        Ok(chain)
    }

    /// Call `function` from `hook`, before the existing callbacks if `pre` is set
    ///
    /// A chain is attached to the hook first if it has nothing attached.
    pub fn add_callback(&mut self, shaders: &mut Shaders, hook: &str, function: ObjectId, pre: bool) -> Result<()> {
        let chain = match self.hook_object(hook) {
            Some(chain) => chain,
            None => self.add_chain(shaders, hook)?,
        };

        if shaders.get_chain(chain).is_err() {
            bail!(ErrorKind::NotAChain(hook.to_string()));
        }

        if pre {
            shaders.prepend(chain, function)?;
        } else {
            shaders.append(chain, function)?;
        }

        self.dirty = true;
        Ok(())
    }

    /// Stop calling `function` from `hook`, returns `false` if it was not called
    pub fn remove_callback(&mut self, shaders: &mut Shaders, hook: &str, function: ObjectId) -> Result<bool> {
        self.check_hook(hook)?;

        let chain = match self.hook_object(hook) {
            Some(chain) => chain,
            None => return Ok(false),
        };

        if shaders.get_chain(chain).is_err() {
            bail!(ErrorKind::NotAChain(hook.to_string()));
        }

        let removed = shaders.remove_member(chain, function)?;
        if removed {
            self.dirty = true;
        }

        Ok(removed)
    }

    /// End the `main` of `stage` with `builtin = expression;`
    pub fn assign(&mut self, stage: Stage, builtin: &str, expression: ObjectId) -> Result<()> {
        if let Some(input) = self.stages.get_mut(&stage) {
            input.assign(builtin, expression)?;
            self.dirty = true;
        }

        Ok(())
    }

    /// Write `expression` to `varying` at the end of the vertex `main`
    pub fn assign_varying(&mut self, shaders: &mut Shaders, varying: ObjectId, expression: ObjectId) -> Result<()> {
        if let Some(input) = self.stages.get_mut(&Stage::Vertex) {
            input.assign_varying(shaders, varying, expression)?;
            self.dirty = true;
        }

        Ok(())
    }

    /// Make sure every attached object matches the prototype of its hook
    pub fn check_hooks(&self, shaders: &Shaders) -> Result<()> {
        for (name, &object) in &self.attached {
            let hook = &self.hooks[name];
            let expected = hook.prototype.shape();

            let found = match shaders.signature(object) {
                Some(sig) => sig.shape(),
                None => String::from("a variable"),
            };

            if found != expected {
                bail!(ErrorKind::HookSignatureMismatch(name.clone(), expected, found));
            }
        }

        Ok(())
    }

    /// Link both stages
    pub fn compile(&mut self, shaders: &Shaders) -> Result<Compiled> {
        for id in self.detached.drain(..) {
            self.compiler.forget(shaders, id);
        }

        self.check_hooks(shaders)?;

        let mut stages = self.stages.clone();
        for (name, &object) in &self.attached {
            let stage = self.hooks[name].stage;
            if let Some(input) = stages.get_mut(&stage) {
                input.push(Root::named(name, object, name));
            }
        }

        Ok(self.compiler.compile(shaders, &stages)?)
    }

    /// Relink if anything changed, then upload the sources and values to `backend`
    ///
    /// A failed link leaves the previously uploaded program in place.
    pub fn draw<B: Backend + ?Sized>(&mut self, shaders: &Shaders, backend: &mut B) -> Result<()> {
        let generation = shaders.generation();

        if self.dirty || self.generation != Some(generation) {
            let compiled = match self.compile(shaders) {
                Ok(compiled) => compiled,
                Err(err) => {
                    warn!("Failed to link program, keeping the previous one: {}", err);
                    return Err(err);
                }
            };

            let unchanged = self.compiled.as_ref().map(|previous| previous.sources == compiled.sources);
            if unchanged != Some(true) {
                annotate(&compiled);
                backend.upload(
                    compiled.source(Stage::Vertex).unwrap_or_default(),
                    compiled.source(Stage::Fragment).unwrap_or_default(),
                )?;
                self.bound.clear();
            }

            self.compiled = Some(compiled);
            self.dirty = false;
            self.generation = Some(generation);
        }

        if let Some(ref compiled) = self.compiled {
            bind_values(shaders, compiled, &self.compiler, &mut self.bound, backend)?;
        }

        Ok(())
    }
}

impl ModularProgram {
    fn check_hook(&self, hook: &str) -> Result<()> {
        if !self.hooks.contains_key(hook) {
            bail!(ErrorKind::UnknownHook(hook.to_string()));
        }

        Ok(())
    }

    fn detach(&mut self, object: ObjectId) {
        if !self.attached.values().any(|&id| id == object) {
            self.detached.push(object);
        }
    }
}

/// Log the linked sources with line numbers
fn annotate(compiled: &Compiled) {
    if !log_enabled!(Level::Debug) {
        return;
    }

    for (stage, source) in &compiled.sources {
        debug!("Linked {} shader:", stage);
        for (number, line) in source.lines().enumerate() {
            debug!("{:>4} | {}", number + 1, line);
        }
    }
}

/// Send every uniform and attribute whose value changed since it was last sent
fn bind_values<B: Backend + ?Sized>(
    shaders: &Shaders,
    compiled: &Compiled,
    compiler: &Compiler,
    bound: &mut HashMap<String, (ObjectId, u64)>,
    backend: &mut B,
) -> Result<()> {
    for &id in &compiled.objects {
        let var = match shaders.get_variable(id) {
            Ok(var) => var,
            Err(_) => continue,
        };

        let value = match var.value() {
            Some(value) => value,
            None => continue,
        };

        let name = match compiler.name(id) {
            Some(name) => name,
            None => continue,
        };

        let state = var.state_id();
        if bound.get(name) == Some(&state) {
            continue;
        }

        match var.qualifier() {
            Some(Qualifier::Uniform) => backend.set_uniform(name, value)?,
            Some(Qualifier::Attribute) => backend.set_attribute(name, value)?,
            _ => continue,
        }

        trace!("Bound {} {}", name, var.id());
        bound.insert(name.to_string(), state);
    }

    Ok(())
}
