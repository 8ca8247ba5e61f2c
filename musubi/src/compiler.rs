//! Link shader objects into stage sources
//!
//! One call to `Compiler::compile` runs these passes:
//!
//! 1. collect the objects reachable from each stage's roots, dependencies first, and check that
//!    every one of them can be compiled
//! 2. claim the fixed names: declared names of non-anonymous objects and required root names
//! 3. give anonymous objects their name from the previous call back, unless it became taken
//! 4. name the remaining anonymous objects
//! 5. emit each stage, reusing cached definitions whose name and revision did not change
//!
//! Only the first four passes report errors, and they leave the compiler untouched when they do.

use std::collections::BTreeMap;
use std::ops::Index;

use fnv::{FnvHashMap as HashMap, FnvHashSet as HashSet};

use crate::arena::Shaders;
use crate::errors::*;
use crate::graph::DependencyGraph;
use crate::object::{ObjectId, Scope};
use crate::parsing::{self, Template};
use crate::types::{self, Qualifier, Stage};

/// Builtin outputs `main` may be given a final assignment to
const BUILTIN_OUTPUTS: &[&str] = &["gl_Position", "gl_PointSize", "gl_FragColor", "gl_FragData"];

/// How anonymous objects are named
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Naming {
    /// The object's own name, suffixed with `_1`, `_2`... when taken
    Pretty,
    /// The object's own name suffixed with its hexadecimal id
    Fast,
}

/// Global code generation settings
#[derive(Clone, Debug)]
pub struct Settings {
    pub naming: Naming,
    /// Emitted as a `#version` pragma at the top of every stage
    pub version: Option<String>,
    /// Keep GLSL keywords and builtin type names out of the namespace
    pub reserve_keywords: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            naming: Naming::Pretty,
            version: None,
            reserve_keywords: true,
        }
    }
}

/// An object attached to a stage at a hook
#[derive(Clone, Debug)]
pub struct Root {
    pub hook: String,
    pub object: ObjectId,
    pub required_name: Option<String>,
}

impl Root {
    pub fn new(hook: &str, object: ObjectId) -> Self {
        Root {
            hook: hook.to_string(),
            object,
            required_name: None,
        }
    }

    /// A root that has to be called `name` in the emitted code
    pub fn named(hook: &str, object: ObjectId, name: &str) -> Self {
        Root {
            required_name: Some(name.to_string()),
            ..Root::new(hook, object)
        }
    }
}

/// Left-hand side of an assignment appended to `main`
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Target {
    /// A builtin output such as `gl_Position`
    Builtin(String),
    /// A varying written by this stage
    Varying(ObjectId),
}

/// The `main` code of a stage and the objects attached to it
///
/// `$hook` placeholders in `main` are replaced by the name of the root attached at that hook.
/// Global variables, functions and prototypes declared in `main` keep their names: no object
/// is given one of them.
#[derive(Clone, Debug)]
pub struct StageInput {
    main: Template,
    static_names: Vec<String>,
    roots: Vec<Root>,
    post: Vec<(Target, ObjectId)>,
}

impl StageInput {
    pub fn new(main: &str) -> Self {
        let main = parsing::dedent(main);

        let declared = parsing::find_program_variables(&main).into_iter().map(|var| var.name);
        let functions = parsing::find_functions(&main)
            .into_iter()
            .filter(|sig| !sig.anonymous && sig.name != "main")
            .flat_map(|sig| Some(sig.name).into_iter().chain(sig.args.into_iter().map(|arg| arg.name)));
        let prototypes = parsing::find_prototypes(&main).into_iter().map(|proto| proto.name);

        let mut static_names: Vec<String> = Vec::new();
        for name in declared.chain(functions).chain(prototypes) {
            if !static_names.contains(&name) {
                static_names.push(name);
            }
        }

        StageInput {
            main: Template::parse(&main),
            static_names,
            roots: Vec::new(),
            post: Vec::new(),
        }
    }

    pub fn root(mut self, root: Root) -> Self {
        self.roots.push(root);
        self
    }

    #[inline]
    pub fn push(&mut self, root: Root) {
        self.roots.push(root);
    }

    #[inline]
    pub fn roots(&self) -> &[Root] {
        &self.roots
    }

    /// Names declared by `main` itself
    #[inline]
    pub fn static_names(&self) -> &[String] {
        &self.static_names
    }

    /// Assignments appended to `main`, in the order their targets were first assigned
    #[inline]
    pub fn post_hooks(&self) -> &[(Target, ObjectId)] {
        &self.post
    }

    /// End `main` with `builtin = expression;`, for a builtin output such as `gl_Position`
    pub fn assign(&mut self, builtin: &str, expression: ObjectId) -> Result<()> {
        if !BUILTIN_OUTPUTS.iter().any(|output| builtin.starts_with(output)) {
            bail!(ErrorKind::InvalidPostHook(builtin.to_string()));
        }

        self.set_post(Target::Builtin(builtin.to_string()), expression);
        Ok(())
    }

    /// End `main` with `varying = expression;`
    ///
    /// The varying is linked to the expression, so it takes its type.
    pub fn assign_varying(&mut self, shaders: &mut Shaders, varying: ObjectId, expression: ObjectId) -> Result<()> {
        let var = shaders.get_variable(varying)?;
        if var.qualifier() != Some(Qualifier::Varying) {
            bail!(ErrorKind::InvalidPostHook(var.name().to_string()));
        }

        shaders.link(varying, expression)?;
        self.set_post(Target::Varying(varying), expression);
        Ok(())
    }

    fn set_post(&mut self, target: Target, expression: ObjectId) {
        match self.post.iter_mut().find(|(current, _)| *current == target) {
            Some(hook) => hook.1 = expression,
            None => self.post.push((target, expression)),
        }
    }

    /// Roots, then the varyings and expressions of the post hooks
    fn objects(&self) -> Vec<ObjectId> {
        let mut objects: Vec<_> = self.roots.iter().map(|root| root.object).collect();
        for (target, expression) in &self.post {
            if let Target::Varying(varying) = *target {
                objects.push(varying);
            }
            objects.push(*expression);
        }
        objects
    }

    fn hook(&self, hook: &str) -> Option<&Root> {
        self.roots.iter().find(|root| root.hook == hook)
    }
}

/// Output of a successful compilation
#[derive(Clone, Debug, Default)]
pub struct Compiled {
    pub sources: BTreeMap<Stage, String>,
    /// Emitted objects, in the order they were first emitted
    pub objects: Vec<ObjectId>,
}

impl Compiled {
    #[inline]
    pub fn source(&self, stage: Stage) -> Option<&str> {
        self.sources.get(&stage).map(String::as_str)
    }
}

impl Index<Stage> for Compiled {
    type Output = str;

    fn index(&self, stage: Stage) -> &str {
        &self.sources[&stage]
    }
}

#[derive(Clone, Debug)]
struct CachedCode {
    name: String,
    revision: u64,
    code: String,
}

/// Objects reachable from the roots of every stage
#[derive(Debug, Default)]
struct Closure {
    stages: BTreeMap<Stage, Vec<ObjectId>>,
    /// Every object once, in order of first appearance across stages
    objects: Vec<ObjectId>,
    required: HashMap<ObjectId, String>,
    /// Names declared by the `main` code of the stages
    reserved: Vec<String>,
}

/// Names taken during one compilation
struct Namespace<'a> {
    names: HashMap<String, ObjectId>,
    reserved: HashSet<&'a str>,
    keywords: bool,
}

impl<'a> Namespace<'a> {
    fn is_free(&self, name: &str) -> bool {
        !self.names.contains_key(name)
            && !self.reserved.contains(name)
            && !(self.keywords && types::is_reserved(name))
    }

    fn claim(&mut self, name: &str, id: ObjectId) -> Result<()> {
        match self.names.get(name) {
            Some(&other) if other != id => {
                bail!(ErrorKind::NameCollision(name.to_string(), other, id))
            }
            _ => {
                self.names.insert(name.to_string(), id);
                Ok(())
            }
        }
    }

    fn suggest(&self, base: &str, id: ObjectId, naming: Naming) -> String {
        if naming == Naming::Fast {
            let name = format!("{}_{:x}", base, id.index());
            if self.is_free(&name) {
                return name;
            }
        }

        if self.is_free(base) {
            return base.to_string();
        }

        let stem = strip_suffix(base);
        let mut index = 1;
        loop {
            let name = format!("{}_{}", stem, index);
            if self.is_free(&name) {
                return name;
            }
            index += 1;
        }
    }
}

/// `light_2` -> `light`
fn strip_suffix(name: &str) -> &str {
    match name.rfind('_') {
        Some(pos) if pos > 0 && pos + 1 < name.len() => {
            if name[pos + 1..].bytes().all(|c| c.is_ascii_digit()) {
                &name[..pos]
            } else {
                name
            }
        }
        _ => name,
    }
}

/// A linker keeping names and definitions cached across compilations
#[derive(Debug, Default)]
pub struct Compiler {
    settings: Settings,
    names: HashMap<ObjectId, String>,
    code: HashMap<ObjectId, CachedCode>,
    recompiled: Vec<ObjectId>,
}

impl Compiler {
    pub fn new() -> Self {
        Compiler::default()
    }

    pub fn with_settings(settings: Settings) -> Self {
        Compiler {
            settings,
            ..Compiler::default()
        }
    }

    #[inline]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Name assigned to `id` by the last compilation it took part in
    pub fn name(&self, id: ObjectId) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }

    /// Cached definition of `id`
    pub fn cached_code(&self, id: ObjectId) -> Option<&str> {
        self.code.get(&id).map(|cached| cached.code.as_str())
    }

    /// Objects whose definition was generated again by the last compilation
    #[inline]
    pub fn recompiled(&self) -> &[ObjectId] {
        &self.recompiled
    }

    /// Drop everything cached about a discarded object
    pub fn forget(&mut self, shaders: &Shaders, id: ObjectId) {
        self.names.remove(&id);
        self.invalidate(shaders, id);
    }

    fn invalidate(&mut self, shaders: &Shaders, id: ObjectId) {
        self.code.remove(&id);

        let mut visited = HashSet::default();
        let mut pending = shaders.referrers(id);
        while let Some(referrer) = pending.pop() {
            if !visited.insert(referrer) {
                continue;
            }

            self.code.remove(&referrer);

            // calls are written out inside the code using them
            let inline = shaders.get(referrer).map(|object| !object.has_definition());
            if inline.unwrap_or(false) {
                pending.extend(shaders.referrers(referrer));
            }
        }
    }

    /// Link the objects attached to each stage into one source per stage
    pub fn compile(&mut self, shaders: &Shaders, stages: &BTreeMap<Stage, StageInput>) -> Result<Compiled> {
        self.recompiled.clear();

        let closure = collect(shaders, stages)?;
        let (names, invalidated) = self.assign_names(shaders, &closure)?;

        self.names = names;
        for id in invalidated {
            self.invalidate(shaders, id);
        }

        let scope = Scope::new(shaders, &self.names);
        let mut compiled = Compiled::default();
        let mut emitted = HashSet::default();

        for (&stage, input) in stages {
            let mut parts = Vec::new();
            if let Some(ref version) = self.settings.version {
                parts.push(format!("#version {}", version));
            }

            for &id in closure.stages.get(&stage).into_iter().flatten() {
                parts.push(definition(&mut self.code, &mut self.recompiled, scope, id)?);
                if emitted.insert(id) {
                    compiled.objects.push(id);
                }
            }

            let mut main = input.main.substitute(|hook| match input.hook(hook) {
                Some(root) => scope.expression(root.object),
                None => bail!(ErrorKind::UnboundTemplateVariable(
                    String::from("main"),
                    hook.to_string()
                )),
            })?;

            if !input.post.is_empty() {
                let mut lines = String::new();
                for (target, expression) in &input.post {
                    let target = match *target {
                        Target::Builtin(ref builtin) => builtin.as_str(),
                        Target::Varying(varying) => scope.name(varying)?,
                    };
                    lines.push_str(&format!("    {} = {};\n", target, scope.expression(*expression)?));
                }

                match main.rfind('}') {
                    Some(end) => main.insert_str(end, &lines),
                    None => main.push_str(&lines),
                }
            }

            if !main.is_empty() {
                parts.push(main);
            }

            let source = parts.join("\n");
            trace!("{} stage:\n{}", stage, source);
            compiled.sources.insert(stage, source);
        }

        trace!(
            "emitted {} objects, {} recompiled",
            compiled.objects.len(),
            self.recompiled.len()
        );

        Ok(compiled)
    }

    /// Work out the names of every object of `closure`, and the objects whose name changed
    fn assign_names(
        &self,
        shaders: &Shaders,
        closure: &Closure,
    ) -> Result<(HashMap<ObjectId, String>, Vec<ObjectId>)> {
        let mut names = self.names.clone();
        let mut invalidated = Vec::new();

        let mut namespace = Namespace {
            names: HashMap::default(),
            reserved: HashSet::default(),
            keywords: self.settings.reserve_keywords,
        };

        namespace
            .reserved
            .extend(closure.reserved.iter().map(String::as_str));

        let mut anonymous = Vec::new();
        for &id in &closure.objects {
            let object = shaders.get(id)?;
            namespace
                .reserved
                .extend(object.static_names().iter().map(String::as_str));

            let fixed = match closure.required.get(&id) {
                Some(required) => required.as_str(),
                None if object.is_anonymous() => {
                    anonymous.push(id);
                    continue;
                }
                None => object.name().unwrap_or_default(),
            };

            if namespace.keywords && types::is_reserved(fixed) {
                bail!(ErrorKind::ReservedName(fixed.to_string()));
            }

            namespace.claim(fixed, id)?;
            if names.get(&id).map(String::as_str) != Some(fixed) {
                names.insert(id, fixed.to_string());
                invalidated.push(id);
            }
        }

        let mut unnamed = Vec::new();
        for id in anonymous {
            match names.get(&id) {
                Some(cached) if namespace.is_free(cached) => namespace.claim(cached, id)?,
                Some(cached) => {
                    debug!("{} lost its name `{}`", id, cached);
                    unnamed.push(id);
                }
                None => unnamed.push(id),
            }
        }

        for id in unnamed {
            let base = shaders.get(id)?.name().unwrap_or_default();
            let name = namespace.suggest(base, id, self.settings.naming);
            namespace.claim(&name, id)?;

            debug!("{} named `{}`", id, name);
            names.insert(id, name);
            invalidated.push(id);
        }

        Ok((names, invalidated))
    }
}

/// Objects reachable from the roots of each stage, dependencies first
fn collect(shaders: &Shaders, stages: &BTreeMap<Stage, StageInput>) -> Result<Closure> {
    let roots = stages.values().flat_map(StageInput::objects);

    let graph = DependencyGraph::build(shaders, roots)?;
    graph.check_acyclic()?;

    let mut closure = Closure::default();
    let mut seen = HashSet::default();

    for (&stage, input) in stages {
        for hook in input.main.placeholders() {
            if input.hook(&hook).is_none() {
                bail!(ErrorKind::UnboundTemplateVariable(String::from("main"), hook));
            }
        }

        closure.reserved.extend(input.static_names.iter().cloned());

        let mut order = Vec::new();
        for id in graph.post_order(&input.objects()) {
            shaders.validate(id)?;
            if !shaders.get(id)?.has_definition() {
                continue;
            }

            if seen.insert(id) {
                closure.objects.push(id);
            }
            order.push(id);
        }

        for root in &input.roots {
            if let Some(ref required) = root.required_name {
                let object = shaders.get(root.object)?;
                let declared = object.name().unwrap_or_default();
                if !object.is_anonymous() && declared != required.as_str() {
                    bail!(ErrorKind::RequiredNameMismatch(declared.to_string(), required.clone()));
                }

                match closure.required.get(&root.object) {
                    Some(previous) if previous != required => bail!(
                        ErrorKind::RequiredNameMismatch(previous.clone(), required.clone())
                    ),
                    _ => {
                        closure.required.insert(root.object, required.clone());
                    }
                }
            }
        }

        closure.stages.insert(stage, order);
    }

    Ok(closure)
}

/// Definition of `id`, from the cache when neither its name nor its revision changed
fn definition(
    cache: &mut HashMap<ObjectId, CachedCode>,
    recompiled: &mut Vec<ObjectId>,
    scope: Scope,
    id: ObjectId,
) -> Result<String> {
    let name = scope.name(id)?;
    let revision = scope.shaders().revision(id)?;

    if let Some(cached) = cache.get(&id) {
        if cached.name == name && cached.revision == revision {
            return Ok(cached.code.clone());
        }
    }

    let code = scope.shaders().get(id)?.compile(&scope)?.unwrap_or_default();
    // the entry inserted below serves every later stage, so each id is generated once
    recompiled.push(id);

    cache.insert(
        id,
        CachedCode {
            name: name.to_string(),
            revision,
            code: code.clone(),
        },
    );

    Ok(code)
}
