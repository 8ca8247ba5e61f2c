//! Parameterized GLSL functions

use std::borrow::Cow;

use fnv::FnvHashMap as HashMap;

use crate::errors::*;
use crate::object::{ObjectId, Scope};
use crate::parsing::{self, Piece, Signature, Template};

/// A GLSL function whose code references other objects through `$name` placeholders
///
/// When the function name itself is written as a placeholder (`vec4 $transform(vec4 pos)`),
/// the function is anonymous and the compiler picks its final name.
#[derive(Clone, Debug)]
pub struct Function {
    id: ObjectId,
    code: String,
    template: Template,
    signature: Signature,
    template_vars: Vec<String>,
    bindings: HashMap<String, ObjectId>,
    deps: Vec<ObjectId>,
    static_names: Vec<String>,
    replacements: Vec<(String, String)>,
}

impl Function {
    pub fn new(code: &str) -> Result<Self> {
        let code = parsing::dedent(code);
        let signature = parsing::parse_function_signature(&code)?;

        let mut func = Function {
            id: ObjectId::next(),
            code,
            template: Template::default(),
            signature,
            template_vars: Vec::new(),
            bindings: HashMap::default(),
            deps: Vec::new(),
            static_names: Vec::new(),
            replacements: Vec::new(),
        };

        let code = func.code.clone();
        func.parse_template(&code);
        Ok(func)
    }

    fn parse_template(&mut self, code: &str) {
        let template = Template::parse(code);
        let signature = &self.signature;

        self.template_vars = template
            .placeholders()
            .into_iter()
            .filter(|var| !(signature.anonymous && *var == signature.name))
            .collect();

        let mut static_names: Vec<String> = Vec::new();
        let declared = parsing::find_program_variables(code).into_iter().map(|var| var.name);
        for name in signature.args.iter().map(|arg| arg.name.clone()).chain(declared) {
            if !static_names.contains(&name) {
                static_names.push(name);
            }
        }

        self.template = template;
        self.static_names = static_names;
    }

    /// Objects to emit before this function although its code does not name them
    pub fn with_dependencies(mut self, deps: &[ObjectId]) -> Self {
        self.deps.extend_from_slice(deps);
        self
    }

    #[inline]
    pub fn id(&self) -> ObjectId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.signature.name
    }

    #[inline]
    pub fn is_anonymous(&self) -> bool {
        self.signature.anonymous
    }

    #[inline]
    pub fn code(&self) -> &str {
        &self.code
    }

    #[inline]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Placeholders other than the function name, in order of first appearance
    #[inline]
    pub fn template_vars(&self) -> &[String] {
        &self.template_vars
    }

    #[inline]
    pub fn static_names(&self) -> &[String] {
        &self.static_names
    }

    #[inline]
    pub fn bound(&self, var: &str) -> Option<ObjectId> {
        self.bindings.get(var).cloned()
    }

    /// Bound objects, following the order of the template variables
    pub fn bound_objects<'a>(&'a self) -> impl Iterator<Item = ObjectId> + 'a {
        self.template_vars
            .iter()
            .filter_map(move |var| self.bindings.get(var).cloned())
    }

    /// Explicit dependencies followed by bound objects
    pub fn dependencies(&self) -> Vec<ObjectId> {
        self.deps.iter().cloned().chain(self.bound_objects()).collect()
    }

    /// Bind a template variable, returning `false` if it was already bound to `object`
    pub(crate) fn bind(&mut self, var: &str, object: ObjectId) -> Result<bool> {
        if !self.template_vars.iter().any(|name| name == var) {
            bail!(ErrorKind::UnknownTemplateVariable(self.name().to_string(), var.to_string()));
        }

        match self.bindings.get(var) {
            Some(&current) if current == object => Ok(false),
            Some(&current) => bail!(ErrorKind::AlreadyBound(
                self.name().to_string(),
                var.to_string(),
                current
            )),
            None => {
                self.bindings.insert(var.to_string(), object);
                Ok(true)
            }
        }
    }

    #[inline]
    pub(crate) fn unbind(&mut self, var: &str) -> Option<ObjectId> {
        self.bindings.remove(var)
    }

    /// Verbatim replacements applied to the code before placeholders are substituted
    #[inline]
    pub fn replacements(&self) -> &[(String, String)] {
        &self.replacements
    }

    /// Replace every `from` in the code with `to`, which may itself contain placeholders
    ///
    /// Returns `None` if the replacement was already set, otherwise the objects that were
    /// bound to template variables no longer found in the code. Those bindings are dropped.
    pub(crate) fn replace(&mut self, from: &str, to: &str) -> Option<Vec<ObjectId>> {
        match self.replacements.iter().position(|(key, _)| key == from) {
            Some(index) if self.replacements[index].1 == to => return None,
            Some(index) => self.replacements[index].1 = to.to_string(),
            None => self.replacements.push((from.to_string(), to.to_string())),
        }

        let mut code = self.code.clone();
        for (from, to) in &self.replacements {
            code = code.replace(from.as_str(), to.as_str());
        }
        self.parse_template(&code);

        let template_vars = &self.template_vars;
        let dropped: Vec<String> = self
            .bindings
            .keys()
            .filter(|var| !template_vars.contains(*var))
            .cloned()
            .collect();

        Some(dropped.iter().filter_map(|var| self.bindings.remove(var)).collect())
    }

    /// Make sure every template variable is bound
    pub fn check_bound(&self) -> Result<()> {
        match self.template_vars.iter().find(|var| !self.bindings.contains_key(*var)) {
            Some(var) => bail!(ErrorKind::UnboundTemplateVariable(
                self.name().to_string(),
                var.clone()
            )),
            None => Ok(()),
        }
    }

    pub fn compile(&self, scope: &Scope) -> Result<String> {
        self.check_bound()?;

        let own_name = if self.is_anonymous() {
            scope.name(self.id)?
        } else {
            self.name()
        };

        self.template.substitute(|var| {
            if self.is_anonymous() && var == self.name() {
                return Ok(Cow::Borrowed(own_name));
            }

            match self.bindings.get(var) {
                Some(&object) => scope.expression(object),
                None => bail!(ErrorKind::UnboundTemplateVariable(
                    self.name().to_string(),
                    var.to_string()
                )),
            }
        })
    }

    /// The function code with its placeholders left in place
    pub fn pieces(&self) -> &[Piece] {
        self.template.pieces()
    }
}
