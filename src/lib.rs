// Assembling
mod parser;
pub use parser::{assemble, AsmParser};
mod air;
pub use air::{encode, Air, AirStmt, AsmLine, Operand};
mod lexer;
mod span;
pub use span::Span;
mod symbol;
pub use symbol::{LabelTable, Opcode, Register};

// Running
mod runtime;
pub use runtime::{Emulator, Status, StepOutcome, DEFAULT_CAPACITY, DEFAULT_OFFSET};

mod error;
pub use error::{AsmError, AsmErrorKind, DataError, Fault, LoadError};

mod source;
pub use source::ProgramSource;

pub mod env;

/// Amount of lines to show as context, each side of focus line (line containing span).
pub const DIAGNOSTIC_CONTEXT_LINES: usize = 4;
