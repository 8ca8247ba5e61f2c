use std::fmt;

include!(concat!(env!("OUT_DIR"), "/glsl.rs"));

/// A shader compilation unit
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Stage {
    Vertex,
    Fragment,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Stage::Vertex => write!(f, "vertex"),
            Stage::Fragment => write!(f, "fragment"),
        }
    }
}

/// Storage qualifier of a program variable
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Qualifier {
    Uniform,
    Attribute,
    Varying,
    Const,
}

impl Qualifier {
    #[inline]
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Some(match keyword {
            "uniform" => Qualifier::Uniform,
            "attribute" => Qualifier::Attribute,
            "varying" => Qualifier::Varying,
            "const" => Qualifier::Const,
            _ => return None,
        })
    }

    #[inline]
    pub fn keyword(self) -> &'static str {
        match self {
            Qualifier::Uniform => "uniform",
            Qualifier::Attribute => "attribute",
            Qualifier::Varying => "varying",
            Qualifier::Const => "const",
        }
    }
}

impl fmt::Display for Qualifier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Handle to a vertex buffer living on the GPU side
///
/// The linker never looks into the buffer, it only needs the GLSL type
/// each vertex exposes.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct BufferRef {
    pub id: u64,
    pub dtype: String,
}

impl BufferRef {
    pub fn new(id: u64, dtype: &str) -> Self {
        BufferRef {
            id,
            dtype: dtype.to_string(),
        }
    }
}

/// A value bound to a program variable
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i32),
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Mat2([f32; 4]),
    Mat3([f32; 9]),
    Mat4([f32; 16]),
    Buffer(BufferRef),
}

impl Value {
    /// The qualifier a variable holding this value is given when it was
    /// not declared explicitly
    #[inline]
    pub fn qualifier(&self) -> Qualifier {
        match *self {
            Value::Buffer(_) => Qualifier::Attribute,
            _ => Qualifier::Uniform,
        }
    }

    #[inline]
    pub fn dtype(&self) -> &str {
        match *self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Vec2(_) => "vec2",
            Value::Vec3(_) => "vec3",
            Value::Vec4(_) => "vec4",
            Value::Mat2(_) => "mat2",
            Value::Mat3(_) => "mat3",
            Value::Mat4(_) => "mat4",
            Value::Buffer(ref buffer) => &buffer.dtype,
        }
    }

    /// GLSL literal for this value, used by `const` definitions
    ///
    /// Buffers have no literal form.
    pub fn to_glsl(&self) -> Option<String> {
        Some(match *self {
            Value::Bool(val) => val.to_string(),
            Value::Int(val) => val.to_string(),
            Value::Float(val) => float_literal(val),
            Value::Vec2(ref val) => constructor("vec2", val),
            Value::Vec3(ref val) => constructor("vec3", val),
            Value::Vec4(ref val) => constructor("vec4", val),
            Value::Mat2(ref val) => constructor("mat2", val),
            Value::Mat3(ref val) => constructor("mat3", val),
            Value::Mat4(ref val) => constructor("mat4", val),
            Value::Buffer(_) => return None,
        })
    }
}

#[inline]
fn float_literal(val: f32) -> String {
    // Debug keeps the fractional part of integral floats ("1.0", not "1")
    format!("{:?}", val)
}

fn constructor(ty: &str, components: &[f32]) -> String {
    let components: Vec<_> = components.iter().cloned().map(float_literal).collect();
    format!("{}({})", ty, components.join(", "))
}

impl From<bool> for Value {
    fn from(val: bool) -> Self {
        Value::Bool(val)
    }
}

impl From<i32> for Value {
    fn from(val: i32) -> Self {
        Value::Int(val)
    }
}

impl From<f32> for Value {
    fn from(val: f32) -> Self {
        Value::Float(val)
    }
}

impl From<[f32; 2]> for Value {
    fn from(val: [f32; 2]) -> Self {
        Value::Vec2(val)
    }
}

impl From<[f32; 3]> for Value {
    fn from(val: [f32; 3]) -> Self {
        Value::Vec3(val)
    }
}

impl From<[f32; 4]> for Value {
    fn from(val: [f32; 4]) -> Self {
        Value::Vec4(val)
    }
}

impl From<BufferRef> for Value {
    fn from(val: BufferRef) -> Self {
        Value::Buffer(val)
    }
}
