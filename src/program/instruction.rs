use std::fmt;

use serde::{Deserialize, Serialize};

use super::method::{Label, MethodIdentifier};
use super::variable::VariableIdentifier;

/// Operation of an instruction together with its operand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "operand", rename_all = "snake_case")]
pub enum Opcode {
    Push(i32),
    Print,
    Load(VariableIdentifier),
    Store(VariableIdentifier),
    Add,
    Sub,
    Mul,
    Div,
    #[serde(rename = "if_cmpeq")]
    IfCmpEq(Label),
    #[serde(rename = "if_cmpgt")]
    IfCmpGt(Label),
    Goto(Label),
    Invoke(MethodIdentifier),
    Return,
}

impl Opcode {
    /// Token used for this opcode in program text.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Opcode::Push(_) => "push",
            Opcode::Print => "print",
            Opcode::Load(_) => "load",
            Opcode::Store(_) => "store",
            Opcode::Add => "add",
            Opcode::Sub => "sub",
            Opcode::Mul => "mul",
            Opcode::Div => "div",
            Opcode::IfCmpEq(_) => "if_cmpeq",
            Opcode::IfCmpGt(_) => "if_cmpgt",
            Opcode::Goto(_) => "goto",
            Opcode::Invoke(_) => "invoke",
            Opcode::Return => "return",
        }
    }

    /// Branch target, for the opcodes that jump.
    pub fn branch_label(&self) -> Option<&Label> {
        match self {
            Opcode::IfCmpEq(label) | Opcode::IfCmpGt(label) | Opcode::Goto(label) => Some(label),
            _ => None,
        }
    }
}

/// One line of a method: an optional label and an opcode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    label: Option<Label>,
    opcode: Opcode,
}

impl Instruction {
    pub fn new(label: Option<Label>, opcode: Opcode) -> Self {
        Self { label, opcode }
    }

    pub fn labelled(label: impl Into<Label>, opcode: Opcode) -> Self {
        Self::new(Some(label.into()), opcode)
    }

    pub fn label(&self) -> Option<&Label> {
        self.label.as_ref()
    }

    pub fn opcode(&self) -> &Opcode {
        &self.opcode
    }

    /// Variables named by this instruction's operand.
    pub fn variables(&self) -> impl Iterator<Item = &VariableIdentifier> {
        match &self.opcode {
            Opcode::Load(variable) | Opcode::Store(variable) => Some(variable),
            _ => None,
        }
        .into_iter()
    }
}

impl From<Opcode> for Instruction {
    fn from(opcode: Opcode) -> Self {
        Self::new(None, opcode)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(label) = &self.label {
            write!(f, "{label}: ")?;
        }
        f.write_str(self.opcode.mnemonic())?;
        match &self.opcode {
            Opcode::Push(value) => write!(f, " {value}"),
            Opcode::Load(variable) | Opcode::Store(variable) => write!(f, " {variable}"),
            Opcode::IfCmpEq(label) | Opcode::IfCmpGt(label) | Opcode::Goto(label) => {
                write!(f, " {label}")
            }
            Opcode::Invoke(method) => write!(f, " @{method}"),
            Opcode::Print
            | Opcode::Add
            | Opcode::Sub
            | Opcode::Mul
            | Opcode::Div
            | Opcode::Return => Ok(()),
        }
    }
}
