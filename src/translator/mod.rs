//! Program text to [`Method`]s.
//!
//! One instruction per line, `[label:] opcode operands...`. A label starting
//! with `@` opens a method instead, followed by its comma-separated
//! arguments:
//!
//! ```text
//! @main:
//!         push 4
//!         invoke @square
//!         print
//!         push 0
//!         return
//! @square: n
//!         load n
//!         load n
//!         mul
//!         return
//! ```
//!
//! Text after `#` is a comment.

pub mod registry;

use std::fmt::Write;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::error::MethodError;
use crate::program::{Instruction, Label, METHOD_SIGIL, Method, MethodIdentifier, VariableIdentifier};

pub use registry::{InstructionBuilder, InstructionRegistry, OperandError};

const ARGUMENT_SEPARATOR: char = ',';
const LABEL_SUFFIX: char = ':';
const COMMENT: char = '#';

#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("line {line}: {source}")]
    Instruction {
        line: usize,
        #[source]
        source: OperandError,
    },
    #[error("line {line}: instructions cannot appear outside a method")]
    OutsideMethod { line: usize },
    #[error("line {line}: label {label} is not attached to an instruction")]
    DanglingLabel { line: usize, label: String },
    #[error("line {line}: malformed method header {header}")]
    MalformedHeader { line: usize, header: String },
    #[error("line {line}: {source}")]
    Method {
        line: usize,
        #[source]
        source: MethodError,
    },
}

impl TranslateError {
    /// 1-based line the error was found on, if it relates to a line.
    pub fn line(&self) -> Option<usize> {
        match self {
            TranslateError::Io { .. } => None,
            TranslateError::Instruction { line, .. }
            | TranslateError::OutsideMethod { line }
            | TranslateError::DanglingLabel { line, .. }
            | TranslateError::MalformedHeader { line, .. }
            | TranslateError::Method { line, .. } => Some(*line),
        }
    }
}

/// Method under construction.
struct PendingMethod {
    name: MethodIdentifier,
    arguments: Vec<VariableIdentifier>,
    instructions: Vec<Instruction>,
    line: usize,
}

impl PendingMethod {
    fn finish(self) -> Result<Method, TranslateError> {
        Method::new(self.name, self.arguments, self.instructions).map_err(|source| {
            TranslateError::Method {
                line: self.line,
                source,
            }
        })
    }
}

/// Translates program text using the opcodes of a registry.
pub struct Translator<'r> {
    registry: &'r InstructionRegistry,
}

impl<'r> Translator<'r> {
    pub fn new(registry: &'r InstructionRegistry) -> Self {
        Self { registry }
    }

    pub fn read_and_translate(&self, path: impl AsRef<Path>) -> Result<Vec<Method>, TranslateError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| TranslateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.translate(&source)
    }

    /// Methods in the order they appear in `source`.
    pub fn translate(&self, source: &str) -> Result<Vec<Method>, TranslateError> {
        let mut methods = Vec::new();
        let mut current: Option<PendingMethod> = None;

        for (idx, raw_line) in source.lines().enumerate() {
            let line_no = idx + 1;
            let line = strip_comment(raw_line).trim();
            if line.is_empty() {
                continue;
            }

            let (label, rest) = split_label(line);
            if let Some(name) = label.filter(|name| name.starts_with(METHOD_SIGIL)) {
                if let Some(finished) = current.take() {
                    methods.push(finished.finish()?);
                }
                current = Some(PendingMethod {
                    name: MethodIdentifier::new(name),
                    arguments: parse_arguments(name, rest, line_no)?,
                    instructions: Vec::new(),
                    line: line_no,
                });
                continue;
            }

            let mut tokens = rest.split_whitespace();
            let Some(token) = tokens.next() else {
                return Err(TranslateError::DanglingLabel {
                    line: line_no,
                    label: label.unwrap_or_default().to_string(),
                });
            };
            let operands: Vec<&str> = tokens.collect();
            let method = current
                .as_mut()
                .ok_or(TranslateError::OutsideMethod { line: line_no })?;
            let instruction = self
                .registry
                .build(label.map(Label::new), token, &operands)
                .map_err(|source| TranslateError::Instruction {
                    line: line_no,
                    source,
                })?;
            method.instructions.push(instruction);
        }

        if let Some(finished) = current {
            methods.push(finished.finish()?);
        }
        debug!(methods = methods.len(), "program translated");
        Ok(methods)
    }
}

/// Numbered listing of every method, one instruction per line.
pub fn disassemble(methods: &[Method]) -> String {
    let mut listing = String::new();
    for method in methods {
        let arguments: Vec<&str> = method.arguments().iter().map(|a| a.name()).collect();
        let _ = writeln!(listing, "method {} ({})", method.name(), arguments.join(", "));
        for (index, instruction) in method.instructions().iter().enumerate() {
            let _ = writeln!(listing, "  {index:04}: {instruction}");
        }
    }
    listing
}

fn strip_comment(line: &str) -> &str {
    match line.find(COMMENT) {
        Some(pos) => &line[..pos],
        None => line,
    }
}

/// Splits a leading `label:` off a trimmed line.
fn split_label(line: &str) -> (Option<&str>, &str) {
    match line.split_once(LABEL_SUFFIX) {
        Some((label, rest)) if !label.is_empty() && !label.contains(char::is_whitespace) => {
            (Some(label), rest.trim_start())
        }
        _ => (None, line),
    }
}

fn parse_arguments(
    header: &str,
    list: &str,
    line: usize,
) -> Result<Vec<VariableIdentifier>, TranslateError> {
    if header.len() == METHOD_SIGIL.len_utf8() {
        return Err(TranslateError::MalformedHeader {
            line,
            header: header.to_string(),
        });
    }
    if list.is_empty() {
        return Ok(Vec::new());
    }
    list.split(ARGUMENT_SEPARATOR)
        .map(str::trim)
        .map(|name| {
            if name.is_empty() || name.contains(char::is_whitespace) {
                Err(TranslateError::MalformedHeader {
                    line,
                    header: format!("{header}: {list}"),
                })
            } else {
                Ok(VariableIdentifier::new(name))
            }
        })
        .collect()
}
