#![forbid(unsafe_code)]

//! SML – a small stack machine with labelled jumps and method calls.
//!
//! The crate is split into a handful of building blocks:
//!
//! * [`program`] – the static program model: [`Method`], [`Instruction`],
//!   [`Label`] and the symbol tables built from them when a program is loaded.
//! * [`machine`] – the [`Machine`] that owns the call stack of [`Frame`]s and
//!   runs the fetch-execute loop.
//! * [`translator`] – turns program text into methods through an
//!   [`InstructionRegistry`].
//! * [`config`] and [`logging`] – runtime settings and tracing setup shared
//!   with the `sml` binary.
//!
//! A machine is single threaded. Every failure halts it and is returned as a
//! single [`SmlError`].

pub mod config;
pub mod error;
pub mod io;
pub mod logging;
pub mod machine;
pub mod program;
pub mod translator;

pub use config::MachineConfig;
pub use error::{LoadError, MethodError, ProgramError, ProgramResult, SmlError, SmlResult};
pub use io::{CollectOutput, OutputSink, StdoutSink, WriteSink};
pub use machine::{Frame, Machine, Transition};
pub use program::{
    Instruction, Label, METHOD_SIGIL, Method, MethodIdentifier, Opcode, SymbolTable, Variable,
    VariableIdentifier,
};
pub use translator::{InstructionRegistry, TranslateError, Translator, disassemble};

/// Translates `source` with the standard opcodes and runs it to completion,
/// returning every printed value.
pub fn run_source(source: &str, config: MachineConfig) -> anyhow::Result<Vec<i32>> {
    let registry = InstructionRegistry::standard();
    let methods = Translator::new(&registry).translate(source)?;
    let mut machine = Machine::with_output(methods, config, CollectOutput::new())?;
    machine.execute()?;
    Ok(machine.into_output().into_values())
}
