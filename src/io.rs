use std::io::{self, Write};

use tracing::warn;

/// Receiver for values emitted by the `print` instruction.
pub trait OutputSink {
    /// Called once per executed `print`, in execution order.
    fn emit(&mut self, value: i32);
}

/// Writes each value on its own line to stdout.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn emit(&mut self, value: i32) {
        WriteSink::new(io::stdout().lock()).emit(value);
    }
}

/// Writes each value on its own line to any writer. Failed writes are
/// logged and the value is dropped.
#[derive(Debug)]
pub struct WriteSink<W> {
    writer: W,
}

impl<W: Write> WriteSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> OutputSink for WriteSink<W> {
    fn emit(&mut self, value: i32) {
        if let Err(err) = writeln!(self.writer, "{value}") {
            warn!(%err, value, "failed to write program output");
        }
    }
}

/// Collects printed values in memory.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CollectOutput(Vec<i32>);

impl CollectOutput {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn values(&self) -> &[i32] {
        &self.0
    }

    pub fn into_values(self) -> Vec<i32> {
        self.0
    }
}

impl OutputSink for CollectOutput {
    fn emit(&mut self, value: i32) {
        self.0.push(value);
    }
}

impl<S: OutputSink + ?Sized> OutputSink for &mut S {
    fn emit(&mut self, value: i32) {
        (**self).emit(value);
    }
}
