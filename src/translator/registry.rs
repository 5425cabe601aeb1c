use std::collections::BTreeMap;

use thiserror::Error;

use crate::program::{Instruction, Label, MethodIdentifier, Opcode, VariableIdentifier};

/// Reasons a single instruction line cannot be built.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OperandError {
    #[error("unknown opcode {0}")]
    UnknownOpcode(String),
    #[error("{opcode} expects {expected} operand(s), found {found}")]
    OperandCount {
        opcode: String,
        expected: usize,
        found: usize,
    },
    #[error("invalid integer literal {0}")]
    InvalidInteger(String),
}

/// Constructs an instruction from its label and operand tokens.
pub type InstructionBuilder = fn(Option<Label>, &[&str]) -> Result<Instruction, OperandError>;

/// Table from opcode token to the function that builds the instruction.
#[derive(Debug, Clone, Default)]
pub struct InstructionRegistry {
    builders: BTreeMap<String, InstructionBuilder>,
}

impl InstructionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry containing every opcode the machine executes.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register("push", |label, operands| {
            let [literal] = expect_operands::<1>("push", operands)?;
            let value = literal
                .parse::<i32>()
                .map_err(|_| OperandError::InvalidInteger(literal.to_string()))?;
            Ok(Instruction::new(label, Opcode::Push(value)))
        });
        registry.register("print", |label, operands| {
            nullary("print", label, operands, Opcode::Print)
        });
        registry.register("load", |label, operands| {
            let [name] = expect_operands::<1>("load", operands)?;
            Ok(Instruction::new(label, Opcode::Load(VariableIdentifier::new(name))))
        });
        registry.register("store", |label, operands| {
            let [name] = expect_operands::<1>("store", operands)?;
            Ok(Instruction::new(label, Opcode::Store(VariableIdentifier::new(name))))
        });
        registry.register("add", |label, operands| nullary("add", label, operands, Opcode::Add));
        registry.register("sub", |label, operands| nullary("sub", label, operands, Opcode::Sub));
        registry.register("mul", |label, operands| nullary("mul", label, operands, Opcode::Mul));
        registry.register("div", |label, operands| nullary("div", label, operands, Opcode::Div));
        registry.register("if_cmpeq", |label, operands| {
            let [target] = expect_operands::<1>("if_cmpeq", operands)?;
            Ok(Instruction::new(label, Opcode::IfCmpEq(Label::new(*target))))
        });
        registry.register("if_cmpgt", |label, operands| {
            let [target] = expect_operands::<1>("if_cmpgt", operands)?;
            Ok(Instruction::new(label, Opcode::IfCmpGt(Label::new(*target))))
        });
        registry.register("goto", |label, operands| {
            let [target] = expect_operands::<1>("goto", operands)?;
            Ok(Instruction::new(label, Opcode::Goto(Label::new(*target))))
        });
        registry.register("invoke", |label, operands| {
            let [callee] = expect_operands::<1>("invoke", operands)?;
            Ok(Instruction::new(label, Opcode::Invoke(MethodIdentifier::new(callee))))
        });
        registry.register("return", |label, operands| {
            nullary("return", label, operands, Opcode::Return)
        });
        registry
    }

    /// Adds `token`, replacing any builder already registered for it.
    pub fn register(&mut self, token: impl Into<String>, builder: InstructionBuilder) {
        self.builders.insert(token.into(), builder);
    }

    pub fn contains(&self, token: &str) -> bool {
        self.builders.contains_key(token)
    }

    pub fn build(
        &self,
        label: Option<Label>,
        token: &str,
        operands: &[&str],
    ) -> Result<Instruction, OperandError> {
        let builder = self
            .builders
            .get(token)
            .ok_or_else(|| OperandError::UnknownOpcode(token.to_string()))?;
        builder(label, operands)
    }

    /// Registered tokens in sorted order.
    pub fn opcodes(&self) -> impl Iterator<Item = &str> {
        self.builders.keys().map(String::as_str)
    }
}

fn expect_operands<'a, const N: usize>(
    opcode: &str,
    operands: &'a [&'a str],
) -> Result<&'a [&'a str; N], OperandError> {
    operands
        .try_into()
        .map_err(|_| OperandError::OperandCount {
            opcode: opcode.to_string(),
            expected: N,
            found: operands.len(),
        })
}

fn nullary(
    opcode: &str,
    label: Option<Label>,
    operands: &[&str],
    op: Opcode,
) -> Result<Instruction, OperandError> {
    let [] = expect_operands::<0>(opcode, operands)?;
    Ok(Instruction::new(label, op))
}
