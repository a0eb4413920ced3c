use std::{error::Error, fmt};

use miette::{miette, LabeledSpan, Report, Severity};

use crate::span::Span;

/// Error assembling source text. Assembly stops at the first one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AsmError {
    pub kind: AsmErrorKind,
    /// 1-based source line
    pub line: usize,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AsmErrorKind {
    DuplicateLabel {
        name: String,
    },
    UnknownMnemonic {
        name: String,
    },
    OperandCount {
        mnemonic: &'static str,
        expected: usize,
        found: usize,
    },
    RegisterExpected {
        found: String,
    },
    ImmediateExpected {
        found: String,
    },
    UnresolvedLabel {
        name: String,
    },
    /// Looks like an integer but does not fit in 64 bits.
    InvalidLiteral {
        found: String,
    },
}

impl AsmError {
    pub(crate) fn new(kind: AsmErrorKind, line: usize, span: Span) -> Self {
        AsmError { kind, line, span }
    }

    fn code(&self) -> &'static str {
        match self.kind {
            AsmErrorKind::DuplicateLabel { .. } => "parse::duplicate_label",
            AsmErrorKind::UnknownMnemonic { .. } => "parse::unknown_mnemonic",
            AsmErrorKind::OperandCount { .. } => "parse::operand_count",
            AsmErrorKind::RegisterExpected { .. } => "parse::register_expected",
            AsmErrorKind::ImmediateExpected { .. } => "parse::immediate_expected",
            AsmErrorKind::UnresolvedLabel { .. } => "parse::unresolved_label",
            AsmErrorKind::InvalidLiteral { .. } => "parse::bad_lit",
        }
    }

    fn help(&self) -> &'static str {
        match self.kind {
            AsmErrorKind::DuplicateLabel { .. } => "labels are only allowed once per file",
            AsmErrorKind::UnknownMnemonic { .. } => {
                "available instructions are NOP, LW, SW, ADD, ADDI, SUB, SUBI, CMP, JMP, JG, JL, MOV and HALT"
            }
            AsmErrorKind::OperandCount { .. } => "check the number of operands for this instruction",
            AsmErrorKind::RegisterExpected { .. } => "registers are written as R0 to R15",
            AsmErrorKind::ImmediateExpected { .. } => "immediates are decimal integers like 5 or -3",
            AsmErrorKind::UnresolvedLabel { .. } => "declare the label on its own line, like `loop:`",
            AsmErrorKind::InvalidLiteral { .. } => "only the low 4 bits of an immediate are encoded",
        }
    }

    fn label(&self) -> &'static str {
        match self.kind {
            AsmErrorKind::DuplicateLabel { .. } => "duplicate label",
            AsmErrorKind::UnknownMnemonic { .. } => "unknown instruction",
            AsmErrorKind::OperandCount { .. } => "incorrect operands",
            AsmErrorKind::RegisterExpected { .. } => "not a register",
            AsmErrorKind::ImmediateExpected { .. } => "not an immediate",
            AsmErrorKind::UnresolvedLabel { .. } => "unknown label",
            AsmErrorKind::InvalidLiteral { .. } => "incorrect literal",
        }
    }

    /// Attach `src` and build a diagnostic suitable for printing with `miette`.
    pub fn into_report(self, src: &str) -> Report {
        miette!(
            severity = Severity::Error,
            code = self.code(),
            help = self.help(),
            labels = vec![LabeledSpan::at(self.span, self.label())],
            "{}",
            self
        )
        .with_source_code(src.to_string())
    }
}

impl Error for AsmError {}

impl fmt::Display for AsmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            AsmErrorKind::DuplicateLabel { name } => {
                write!(f, "Label `{}` is declared more than once", name)?
            }
            AsmErrorKind::UnknownMnemonic { name } => write!(f, "Unknown instruction `{}`", name)?,
            AsmErrorKind::OperandCount {
                mnemonic,
                expected,
                found,
            } => write!(
                f,
                "Instruction `{}` expects {} operand{}, found {}",
                mnemonic,
                expected,
                if *expected == 1 { "" } else { "s" },
                found
            )?,
            AsmErrorKind::RegisterExpected { found } => {
                write!(f, "Expected a register, found `{}`", found)?
            }
            AsmErrorKind::ImmediateExpected { found } => {
                write!(f, "Expected an immediate value, found `{}`", found)?
            }
            AsmErrorKind::UnresolvedLabel { name } => write!(f, "Label `{}` is never declared", name)?,
            AsmErrorKind::InvalidLiteral { found } => {
                write!(f, "Integer literal `{}` is too large", found)?
            }
        }
        write!(f, " (line {})", self.line)
    }
}

/// Error placing words into emulator memory. Nothing is written when one is returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadError {
    ProgramTooLarge { len: usize, available: usize },
    DataTooLarge { len: usize, available: usize },
    InvalidLayout { capacity: usize, offset: usize },
}

impl Error for LoadError {}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProgramTooLarge { len, available } => write!(
                f,
                "Program of {} words does not fit in the {} words of program memory",
                len, available
            ),
            Self::DataTooLarge { len, available } => write!(
                f,
                "{} data words do not fit in the {} words of data memory",
                len, available
            ),
            Self::InvalidLayout { capacity, offset } => write!(
                f,
                "Program offset {} must be inside a memory of at most 65536 words, got {}",
                offset, capacity
            ),
        }
    }
}

/// Error reading the data line at the top of a program file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataError {
    /// Entry that failed to parse
    pub entry: String,
    pub span: Span,
}

impl DataError {
    pub fn into_report(self, src: &str) -> Report {
        miette!(
            severity = Severity::Error,
            code = "data::bad_lit",
            help = "data is written as `[1, 2, -3]`, with values from -32,768 to 65,535",
            labels = vec![LabeledSpan::at(self.span, "incorrect value")],
            "{}",
            self
        )
        .with_source_code(src.to_string())
    }
}

impl Error for DataError {}

impl fmt::Display for DataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid data value `{}`", self.entry)
    }
}

/// Reason the emulator stopped abnormally.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fault {
    UnknownOpcode { opcode: u8, pc: usize },
    PcOutOfBounds { pc: usize },
    /// `LW`/`SW` addressed a cell past the end of memory.
    MemoryOutOfBounds { address: u16, pc: usize },
}

impl Error for Fault {}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownOpcode { opcode, pc } => {
                write!(f, "Unknown opcode 0x{:X} at address {}", opcode, pc)
            }
            Self::PcOutOfBounds { pc } => {
                write!(f, "Program counter {} is outside of memory", pc)
            }
            Self::MemoryOutOfBounds { address, pc } => write!(
                f,
                "Memory address {} accessed at address {} is outside of memory",
                address, pc
            ),
        }
    }
}
