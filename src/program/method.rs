use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use super::instruction::Instruction;
use super::symbol_table::SymbolTable;
use super::variable::VariableIdentifier;
use crate::error::MethodError;

/// Prefix marking a method name in program text.
pub const METHOD_SIGIL: char = '@';

/// Number of instructions shown by the `Display` impl of [`Method`].
const DISPLAY_INSTRUCTION_LIMIT: usize = 2;

/// Branch target inside a single method.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Label(String);

impl Label {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Label {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Name of a method, stored without the leading `@`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MethodIdentifier(String);

impl MethodIdentifier {
    pub fn new(name: impl AsRef<str>) -> Self {
        let name = name.as_ref();
        Self(name.strip_prefix(METHOD_SIGIL).unwrap_or(name).to_string())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MethodIdentifier {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for MethodIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable, validated description of a callable unit.
///
/// Besides the declared data, a method precomputes the slot layout used by
/// frames: every argument and every local variable gets a fixed index into
/// the frame's cell arrays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Method {
    name: MethodIdentifier,
    arguments: Vec<VariableIdentifier>,
    local_variables: Vec<VariableIdentifier>,
    instructions: Vec<Instruction>,
    #[serde(skip)]
    labels: SymbolTable<Label, usize>,
    #[serde(skip)]
    argument_slots: SymbolTable<VariableIdentifier, usize>,
    #[serde(skip)]
    local_slots: SymbolTable<VariableIdentifier, usize>,
}

impl Method {
    /// Builds a method.
    ///
    /// Fails when `arguments` contains a name twice, when `instructions` is
    /// empty, or when two instructions carry the same label.
    pub fn new(
        name: MethodIdentifier,
        arguments: Vec<VariableIdentifier>,
        instructions: Vec<Instruction>,
    ) -> Result<Self, MethodError> {
        let mut seen = BTreeSet::new();
        let mut duplicates = BTreeSet::new();
        for argument in &arguments {
            if !seen.insert(argument) {
                duplicates.insert(argument.name().to_string());
            }
        }
        if !duplicates.is_empty() {
            return Err(MethodError::DuplicateArguments {
                method: name.to_string(),
                arguments: duplicates.into_iter().collect(),
            });
        }

        if instructions.is_empty() {
            return Err(MethodError::NoInstructions(name.to_string()));
        }

        let mut labels = BTreeMap::new();
        for (index, instruction) in instructions.iter().enumerate() {
            if let Some(label) = instruction.label() {
                if labels.insert(label.clone(), index).is_some() {
                    return Err(MethodError::DuplicateLabel {
                        label: label.to_string(),
                        method: name.to_string(),
                    });
                }
            }
        }

        let local_variables: Vec<VariableIdentifier> = instructions
            .iter()
            .flat_map(Instruction::variables)
            .filter(|variable| !seen.contains(variable))
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let argument_slots = arguments
            .iter()
            .cloned()
            .enumerate()
            .map(|(slot, variable)| (variable, slot))
            .collect();
        let local_slots = local_variables
            .iter()
            .cloned()
            .enumerate()
            .map(|(slot, variable)| (variable, slot))
            .collect();

        Ok(Self {
            name,
            arguments,
            local_variables,
            instructions,
            labels: SymbolTable::from(labels),
            argument_slots,
            local_slots,
        })
    }

    pub fn name(&self) -> &MethodIdentifier {
        &self.name
    }

    pub fn arguments(&self) -> &[VariableIdentifier] {
        &self.arguments
    }

    /// Variables referenced by instructions that are not arguments, sorted by name.
    pub fn local_variables(&self) -> &[VariableIdentifier] {
        &self.local_variables
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn labels(&self) -> &SymbolTable<Label, usize> {
        &self.labels
    }

    pub fn label_index(&self, label: &Label) -> Option<usize> {
        self.labels.get(label).copied()
    }

    pub(crate) fn argument_slot(&self, variable: &VariableIdentifier) -> Option<usize> {
        self.argument_slots.get(variable).copied()
    }

    pub(crate) fn local_slot(&self, variable: &VariableIdentifier) -> Option<usize> {
        self.local_slots.get(variable).copied()
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Method {} (", self.name)?;
        for (index, argument) in self.arguments.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{argument}")?;
        }
        f.write_str("): ")?;
        for (index, instruction) in self
            .instructions
            .iter()
            .take(DISPLAY_INSTRUCTION_LIMIT)
            .enumerate()
        {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{instruction}")?;
        }
        if self.instructions.len() > DISPLAY_INSTRUCTION_LIMIT {
            f.write_str(", ...")?;
        }
        Ok(())
    }
}
