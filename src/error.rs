//! Error types shared by the machine, the program model and the translator.

use thiserror::Error;

/// Result type used across the crate.
pub type SmlResult<T> = std::result::Result<T, SmlError>;

/// Result type for instruction execution.
pub type ProgramResult<T> = std::result::Result<T, ProgramError>;

/// Failures caused by the submitted program rather than by the engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProgramError {
    #[error("not enough values on the stack")]
    StackUnderflow,
    #[error("variable {0} does not contain a value")]
    UnsetVariable(String),
    #[error("label {label} not found in method {method}")]
    LabelNotFound { label: String, method: String },
    #[error("method {0} not found")]
    MethodNotFound(String),
    #[error("integer overflow evaluating {lhs} {op} {rhs}")]
    Overflow { op: &'static str, lhs: i32, rhs: i32 },
    #[error("division by zero")]
    DivideByZero,
    #[error("program counter {pc} out of bounds in method {method}")]
    ProgramCounterOutOfBounds { method: String, pc: usize },
    #[error("call depth limit of {limit} frames exceeded")]
    CallDepthExceeded { limit: usize },
}

/// Structural problems detected while building a [`crate::Method`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MethodError {
    #[error("duplicate arguments in method {method}: {arguments:?}")]
    DuplicateArguments {
        method: String,
        arguments: Vec<String>,
    },
    #[error("method {0} has no instructions")]
    NoInstructions(String),
    #[error("duplicate label {label} in method {method}")]
    DuplicateLabel { label: String, method: String },
}

/// Problems with a program as a whole, detected before execution starts.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("entry method {0} not found")]
    MissingEntryMethod(String),
    #[error("entry method {method} must not declare arguments (found {count})")]
    EntryTakesArguments { method: String, count: usize },
    #[error("method {0} defined more than once")]
    DuplicateMethod(String),
    #[error("invalid call depth limit: {0}")]
    InvalidCallDepth(String),
    #[error(transparent)]
    Method(#[from] MethodError),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SmlError {
    #[error("there is a problem with your program")]
    Program(#[from] ProgramError),
    /// A variable cell that method construction guarantees is missing. This
    /// is a defect in the engine, never in the program.
    #[error("internal error: variable {variable} has no cell in method {method}")]
    VariableNotFound { variable: String, method: String },
    #[error("failed to load program")]
    Load(#[from] LoadError),
    #[error("machine has halted")]
    Halted,
}

impl SmlError {
    /// Returns the program-level cause, if the program is at fault.
    pub fn program_error(&self) -> Option<&ProgramError> {
        match self {
            SmlError::Program(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_engine_fault(&self) -> bool {
        matches!(self, SmlError::VariableNotFound { .. })
    }
}

impl From<MethodError> for SmlError {
    fn from(err: MethodError) -> Self {
        SmlError::Load(LoadError::Method(err))
    }
}
