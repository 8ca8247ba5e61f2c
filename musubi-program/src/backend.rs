use musubi::types::Value;

use crate::errors::Result;

/// The GPU program object consuming linked sources
pub trait Backend {
    /// Replace the current program with one built from these sources
    fn upload(&mut self, vertex: &str, fragment: &str) -> Result<()>;

    fn set_uniform(&mut self, name: &str, value: &Value) -> Result<()>;

    fn set_attribute(&mut self, name: &str, value: &Value) -> Result<()>;
}
