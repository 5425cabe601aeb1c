//! Static program model: methods, instructions and the names they use.
//!
//! Everything in this module is built once when a program is loaded and is
//! never mutated afterwards.

pub mod instruction;
pub mod method;
pub mod symbol_table;
pub mod variable;

pub use instruction::{Instruction, Opcode};
pub use method::{Label, METHOD_SIGIL, Method, MethodIdentifier};
pub use symbol_table::SymbolTable;
pub use variable::{Variable, VariableIdentifier};
