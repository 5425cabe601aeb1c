use std::fmt;
use std::sync::Arc;

use crate::error::{ProgramError, ProgramResult, SmlError, SmlResult};
use crate::program::{Instruction, Label, Method, Variable, VariableIdentifier};

/// Activation record of one method invocation.
///
/// The invoker of a frame is not stored here: it is the frame directly below
/// this one on the machine's call stack.
#[derive(Debug, Clone)]
pub struct Frame {
    method: Arc<Method>,
    program_counter: usize,
    arguments: Vec<Variable>,
    locals: Vec<Variable>,
    stack: Vec<i32>,
    depth: usize,
}

impl Frame {
    /// Creates a frame positioned at the first instruction with every cell empty.
    pub fn new(method: Arc<Method>) -> Self {
        Self::at_depth(method, 1)
    }

    pub(crate) fn at_depth(method: Arc<Method>, depth: usize) -> Self {
        let arguments = vec![Variable::Empty; method.arguments().len()];
        let locals = vec![Variable::Empty; method.local_variables().len()];
        Self {
            method,
            program_counter: 0,
            arguments,
            locals,
            stack: Vec::new(),
            depth,
        }
    }

    pub fn method(&self) -> &Arc<Method> {
        &self.method
    }

    pub fn program_counter(&self) -> usize {
        self.program_counter
    }

    /// Position of this frame on the call stack, 1 for the outermost frame.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn current_instruction(&self) -> &Instruction {
        &self.method.instructions()[self.program_counter]
    }

    /// Moves to the next instruction.
    pub fn advance(&mut self) -> ProgramResult<()> {
        self.set_program_counter(self.program_counter + 1)
    }

    /// Moves to the instruction carrying `label`.
    pub fn jump_to(&mut self, label: &Label) -> ProgramResult<()> {
        let index = self
            .method
            .label_index(label)
            .ok_or_else(|| ProgramError::LabelNotFound {
                label: label.to_string(),
                method: self.method.name().to_string(),
            })?;
        self.set_program_counter(index)
    }

    fn set_program_counter(&mut self, program_counter: usize) -> ProgramResult<()> {
        if program_counter >= self.method.instructions().len() {
            return Err(ProgramError::ProgramCounterOutOfBounds {
                method: self.method.name().to_string(),
                pc: program_counter,
            });
        }
        self.program_counter = program_counter;
        Ok(())
    }

    /// Resolves `name` against local cells first, then argument cells.
    pub fn variable(&self, name: &VariableIdentifier) -> SmlResult<&Variable> {
        if let Some(slot) = self.method.local_slot(name) {
            return Ok(&self.locals[slot]);
        }
        if let Some(slot) = self.method.argument_slot(name) {
            return Ok(&self.arguments[slot]);
        }
        Err(self.missing_variable(name))
    }

    pub fn variable_mut(&mut self, name: &VariableIdentifier) -> SmlResult<&mut Variable> {
        if let Some(slot) = self.method.local_slot(name) {
            return Ok(&mut self.locals[slot]);
        }
        if let Some(slot) = self.method.argument_slot(name) {
            return Ok(&mut self.arguments[slot]);
        }
        Err(self.missing_variable(name))
    }

    fn missing_variable(&self, name: &VariableIdentifier) -> SmlError {
        SmlError::VariableNotFound {
            variable: name.to_string(),
            method: self.method.name().to_string(),
        }
    }

    /// Argument cells in declaration order.
    pub fn arguments(&self) -> &[Variable] {
        &self.arguments
    }

    pub(crate) fn arguments_mut(&mut self) -> &mut [Variable] {
        &mut self.arguments
    }

    pub fn push(&mut self, value: i32) {
        self.stack.push(value);
    }

    pub fn pop(&mut self) -> ProgramResult<i32> {
        self.stack.pop().ok_or(ProgramError::StackUnderflow)
    }

    /// Pops the two operands of a binary instruction as `(lhs, rhs)`, where
    /// `rhs` is the value that was on top. Leaves the stack untouched when
    /// fewer than two values are present.
    pub fn pop_operands(&mut self) -> ProgramResult<(i32, i32)> {
        if self.stack.len() < 2 {
            return Err(ProgramError::StackUnderflow);
        }
        let rhs = self.pop()?;
        let lhs = self.pop()?;
        Ok((lhs, rhs))
    }

    /// Pops `count` values, top first, without popping anything on underflow.
    pub(crate) fn pop_many(&mut self, count: usize) -> ProgramResult<Vec<i32>> {
        if self.stack.len() < count {
            return Err(ProgramError::StackUnderflow);
        }
        let start = self.stack.len() - count;
        let mut values = self.stack.split_off(start);
        values.reverse();
        Ok(values)
    }

    /// Operand stack, bottom first.
    pub fn stack(&self) -> &[i32] {
        &self.stack
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, l {}", self.method.name(), self.program_counter)?;
        if self.depth > 1 {
            write!(f, " (depth {})", self.depth)?;
        }
        Ok(())
    }
}
