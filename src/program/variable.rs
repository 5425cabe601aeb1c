use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Name of an argument or local variable.
///
/// Identifiers are cheap to clone; equality and ordering compare the name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariableIdentifier(Arc<str>);

impl VariableIdentifier {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl From<&str> for VariableIdentifier {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for VariableIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single storage slot of a frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Variable {
    #[default]
    Empty,
    Value(i32),
}

impl Variable {
    pub fn store(&mut self, value: i32) {
        *self = Variable::Value(value);
    }

    /// Returns `None` when nothing was ever stored, which is not the same as zero.
    pub fn load(&self) -> Option<i32> {
        match self {
            Variable::Empty => None,
            Variable::Value(value) => Some(*value),
        }
    }
}
