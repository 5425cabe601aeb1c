//! The execution engine: call stack, fetch-execute loop and opcode dispatch.

mod dispatch;
pub mod frame;

use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, trace};

use crate::config::MachineConfig;
use crate::error::{LoadError, ProgramError, ProgramResult, SmlError, SmlResult};
use crate::io::{OutputSink, StdoutSink};
use crate::program::{Method, MethodIdentifier, SymbolTable};

pub use frame::Frame;

/// What the machine does after an instruction completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// A frame is still active.
    Continue,
    /// The outermost frame returned.
    Halt,
}

/// Runs a loaded program.
///
/// The machine owns the method table and the call stack. The top of the
/// stack is the current frame; the frame below it is its invoker. An empty
/// call stack means the machine has halted.
pub struct Machine<O = StdoutSink> {
    methods: SymbolTable<MethodIdentifier, Arc<Method>>,
    frames: Vec<Frame>,
    config: MachineConfig,
    output: O,
}

impl Machine<StdoutSink> {
    /// Loads `methods` with the default configuration, printing to stdout.
    pub fn new(methods: impl IntoIterator<Item = Method>) -> SmlResult<Self> {
        Self::with_config(methods, MachineConfig::default())
    }

    pub fn with_config(
        methods: impl IntoIterator<Item = Method>,
        config: MachineConfig,
    ) -> SmlResult<Self> {
        Self::with_output(methods, config, StdoutSink)
    }
}

impl<O: OutputSink> Machine<O> {
    /// Builds the method table and the frame for the entry method.
    ///
    /// A missing entry method, an entry method with arguments and duplicate
    /// method names are loading errors.
    pub fn with_output(
        methods: impl IntoIterator<Item = Method>,
        config: MachineConfig,
        output: O,
    ) -> SmlResult<Self> {
        config.validate()?;
        let mut table = std::collections::BTreeMap::new();
        for method in methods {
            let name = method.name().clone();
            if table.insert(name.clone(), Arc::new(method)).is_some() {
                return Err(LoadError::DuplicateMethod(name.to_string()).into());
            }
        }
        let mut machine = Self {
            methods: SymbolTable::from(table),
            frames: Vec::new(),
            config,
            output,
        };

        let entry = MethodIdentifier::new(&machine.config.entry);
        let method = machine
            .method(&entry)
            .ok_or_else(|| LoadError::MissingEntryMethod(entry.to_string()))?;
        if !method.arguments().is_empty() {
            return Err(LoadError::EntryTakesArguments {
                method: entry.to_string(),
                count: method.arguments().len(),
            }
            .into());
        }
        let frame = machine.new_frame_for_method_invocation(&entry)?;
        machine.frames.push(frame);
        debug!(
            methods = machine.methods.len(),
            entry = %entry,
            "program loaded"
        );
        Ok(machine)
    }

    /// Runs until the outermost frame returns or an instruction fails.
    ///
    /// The first failure halts the machine: the call stack is discarded, the
    /// diagnostic is logged and returned.
    pub fn execute(&mut self) -> SmlResult<()> {
        while !self.frames.is_empty() {
            if let Err(err) = self.step() {
                let location = self.frames.last().map(ToString::to_string);
                self.frames.clear();
                match &err {
                    SmlError::Program(cause) => {
                        error!(location = ?location, "there is a problem with your program: {cause}");
                    }
                    other => {
                        error!(location = ?location, "execution aborted: {other}");
                    }
                }
                return Err(err);
            }
        }
        debug!("machine halted");
        Ok(())
    }

    /// Executes the current instruction of the current frame.
    pub fn step(&mut self) -> SmlResult<Transition> {
        let frame = self.frames.last().ok_or(SmlError::Halted)?;
        let method = Arc::clone(frame.method());
        let instruction = &method.instructions()[frame.program_counter()];
        trace!("[{frame}] {instruction}");
        instruction.execute(self)
    }

    /// Builds the frame for a call to `name`.
    ///
    /// The callee's declared arguments are bound in order from values popped
    /// off the current frame: the first value popped binds to the first
    /// argument. The current frame's program counter is left alone.
    pub fn new_frame_for_method_invocation(
        &mut self,
        name: &MethodIdentifier,
    ) -> ProgramResult<Frame> {
        let method = self
            .method(name)
            .cloned()
            .ok_or_else(|| ProgramError::MethodNotFound(name.to_string()))?;
        let depth = self.frames.len() + 1;
        if depth > self.config.max_call_depth {
            return Err(ProgramError::CallDepthExceeded {
                limit: self.config.max_call_depth,
            });
        }
        let argument_count = method.arguments().len();
        let mut frame = Frame::at_depth(method, depth);
        if let Some(caller) = self.frames.last_mut() {
            let values = caller.pop_many(argument_count)?;
            for (cell, value) in frame.arguments_mut().iter_mut().zip(values) {
                cell.store(value);
            }
        }
        Ok(frame)
    }

    /// Pops the current frame and hands `value` to its invoker, whose program
    /// counter moves past the call. Without an invoker the machine halts.
    pub fn return_from_current(&mut self, value: i32) -> ProgramResult<Transition> {
        self.frames.pop();
        match self.frames.last_mut() {
            Some(invoker) => {
                invoker.push(value);
                invoker.advance()?;
                Ok(Transition::Continue)
            }
            None => Ok(Transition::Halt),
        }
    }

    /// Drops the remaining call stack.
    pub(crate) fn halt(&mut self) -> Transition {
        self.frames.clear();
        Transition::Halt
    }

    pub(crate) fn push_frame(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub fn frame(&self) -> Option<&Frame> {
        self.frames.last()
    }

    pub fn frame_mut(&mut self) -> Option<&mut Frame> {
        self.frames.last_mut()
    }

    pub(crate) fn current_frame_mut(&mut self) -> SmlResult<&mut Frame> {
        self.frames.last_mut().ok_or(SmlError::Halted)
    }

    /// The frame that invoked the current one.
    pub fn invoker(&self) -> Option<&Frame> {
        self.frames.len().checked_sub(2).map(|index| &self.frames[index])
    }

    pub fn call_depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_halted(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn method(&self, name: &MethodIdentifier) -> Option<&Arc<Method>> {
        self.methods.get(name)
    }

    pub fn methods(&self) -> impl Iterator<Item = &Arc<Method>> {
        self.methods.iter().map(|(_, method)| method)
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub(crate) fn output_mut(&mut self) -> &mut O {
        &mut self.output
    }

    pub fn into_output(self) -> O {
        self.output
    }
}

impl<O> fmt::Display for Machine<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Machine: Program: {}, Frame: ", self.methods)?;
        match self.frames.last() {
            Some(frame) => write!(f, "{frame}"),
            None => f.write_str("halted"),
        }
    }
}
