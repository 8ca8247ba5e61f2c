//! Program variables: uniforms, attributes, varyings and constants

use crate::arena::Shaders;
use crate::errors::*;
use crate::object::{ObjectId, Scope};
use crate::parsing;
use crate::types::{Qualifier, Value};

/// A leaf of the dependency graph bound to a GPU-side value
///
/// Variables created from a declaration keep their declared name and type. Others are anonymous
/// and take their qualifier and type from the first value assigned to them.
#[derive(Clone, Debug)]
pub struct Variable {
    id: ObjectId,
    name: String,
    anonymous: bool,
    qualifier: Option<Qualifier>,
    dtype: Option<String>,
    value: Option<Value>,
    link: Option<ObjectId>,
    locked: bool,
    state: u64,
}

impl Variable {
    /// An anonymous variable with neither a type nor a value yet
    pub fn new(name: &str) -> Self {
        Variable {
            id: ObjectId::next(),
            name: name.to_string(),
            anonymous: true,
            qualifier: None,
            dtype: None,
            value: None,
            link: None,
            locked: false,
            state: 0,
        }
    }

    /// A fixed-name variable from `qualifier dtype name` or `const dtype name value`
    pub fn declare(decl: &str) -> Result<Self> {
        let decl = parsing::parse_declaration(decl)?;
        Ok(Variable {
            anonymous: false,
            qualifier: Some(decl.qualifier),
            dtype: Some(decl.dtype),
            value: decl.value,
            locked: true,
            ..Variable::new(&decl.name)
        })
    }

    /// An anonymous variable typed after `value`
    pub fn with_value(name: &str, value: Value) -> Self {
        Variable {
            qualifier: Some(value.qualifier()),
            dtype: Some(value.dtype().to_string()),
            value: Some(value),
            ..Variable::new(name)
        }
    }

    /// An anonymous varying, typed now or later through a link
    pub fn varying(name: &str, dtype: Option<&str>) -> Self {
        Variable {
            qualifier: Some(Qualifier::Varying),
            dtype: dtype.map(String::from),
            ..Variable::new(name)
        }
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
    pub fn qualifier(&self) -> Option<Qualifier> {
        self.qualifier
    }

    /// The type set on this variable, not following links
    #[inline]
    pub fn dtype(&self) -> Option<&str> {
        self.dtype.as_ref().map(String::as_str)
    }

    #[inline]
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    #[inline]
    pub fn link(&self) -> Option<ObjectId> {
        self.link
    }

    /// Changes every time a value is assigned
    #[inline]
    pub fn state(&self) -> u64 {
        self.state
    }

    #[inline]
    pub fn state_id(&self) -> (ObjectId, u64) {
        (self.id, self.state)
    }

    /// Store a new value, returning whether the definition of the variable changed
    ///
    /// Value changes alone never alter the definition of a uniform or an attribute, only the
    /// data the program has to upload.
    pub fn set_value(&mut self, value: Value) -> Result<bool> {
        let changed = match self.qualifier {
            Some(Qualifier::Varying) => bail!(ErrorKind::VaryingValue(self.name.clone())),
            Some(Qualifier::Const) => {
                self.check_dtype(&value)?;
                self.value.as_ref() != Some(&value)
            }
            qualifier if self.locked => {
                if qualifier != Some(value.qualifier()) {
                    bail!(ErrorKind::TypeMismatch(
                        self.name.clone(),
                        self.declaration(),
                        format!("{} {}", value.qualifier(), value.dtype()),
                    ));
                }
                self.check_dtype(&value)?;
                false
            }
            qualifier => {
                let changed = qualifier != Some(value.qualifier()) || self.dtype() != Some(value.dtype());
                self.qualifier = Some(value.qualifier());
                self.dtype = Some(value.dtype().to_string());
                changed
            }
        };

        self.value = Some(value);
        self.state += 1;
        Ok(changed)
    }

    fn check_dtype(&self, value: &Value) -> Result<()> {
        if self.dtype() != Some(value.dtype()) {
            bail!(ErrorKind::TypeMismatch(
                self.name.clone(),
                self.declaration(),
                value.dtype().to_string(),
            ));
        }
        Ok(())
    }

    fn declaration(&self) -> String {
        match (self.qualifier, self.dtype()) {
            (Some(qualifier), Some(dtype)) => format!("{} {}", qualifier, dtype),
            (None, Some(dtype)) => dtype.to_string(),
            (Some(qualifier), None) => qualifier.to_string(),
            (None, None) => String::from("unassigned"),
        }
    }

    #[inline]
    pub(crate) fn set_link(&mut self, link: Option<ObjectId>) {
        self.link = link;
    }

    /// Make sure this variable can be declared
    pub fn check(&self, shaders: &Shaders) -> Result<()> {
        self.resolve(shaders).map(|_| ())
    }

    fn resolve<'a>(&'a self, shaders: &'a Shaders) -> Result<(Qualifier, &'a str)> {
        let unassigned = || ErrorKind::UnassignedVariable(self.name.clone());

        let qualifier = self.qualifier.ok_or_else(unassigned)?;
        let dtype = shaders.dtype(self.id).ok_or_else(unassigned)?;

        if qualifier == Qualifier::Const && self.value.as_ref().and_then(Value::to_glsl).is_none() {
            bail!(unassigned());
        }

        Ok((qualifier, dtype))
    }

    pub fn compile(&self, scope: &Scope) -> Result<String> {
        let (qualifier, dtype) = self.resolve(scope.shaders())?;
        let name = scope.name(self.id)?;

        match self.value.as_ref().and_then(Value::to_glsl) {
            Some(literal) if qualifier == Qualifier::Const => {
                Ok(format!("const {} {} = {};", dtype, name, literal))
            }
            _ => Ok(format!("{} {} {};", qualifier, dtype, name)),
        }
    }
}
