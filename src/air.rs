use std::fmt;

use crate::span::Span;
use crate::symbol::{Opcode, Register};

/// A single operand, classified once from its source text.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Operand {
    Register(Register),
    Immediate(i64),
    Label(String),
}

impl Operand {
    /// `Err` holds the text when it is shaped like an integer but overflows.
    pub fn parse(text: &str) -> Result<Operand, String> {
        if let Ok(reg) = text.parse::<Register>() {
            return Ok(Operand::Register(reg));
        }
        let unsigned = text.strip_prefix(&['-', '+'][..]).unwrap_or(text);
        if !unsigned.is_empty() && unsigned.bytes().all(|b| b.is_ascii_digit()) {
            return text
                .parse::<i64>()
                .map(Operand::Immediate)
                .map_err(|_| text.to_string());
        }
        Ok(Operand::Label(text.to_string()))
    }
}

/// Assembly intermediate representation: one fully resolved instruction per program address.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AirStmt {
    Nop,
    Load { dest: Register, addr: Register },
    Store { src: Register, addr: Register },
    Add { dest: Register, lhs: Register, rhs: Register },
    AddImm { dest: Register, src: Register, imm: u8 },
    Sub { dest: Register, lhs: Register, rhs: Register },
    SubImm { dest: Register, src: Register, imm: u8 },
    Cmp { dest: Register, lhs: Register, rhs: Register },
    Jump { target: u8 },
    JumpGreater { target: u8, cond: Register },
    JumpLess { target: u8, cond: Register },
    Mov { dest: Register, src: Register },
    Halt,
}

/// Statement together with where it came from in the source.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct AsmLine {
    pub stmt: AirStmt,
    /// 1-based source line
    pub line: usize,
    pub span: Span,
}

/// Assembled program, indexed by program-local address.
#[derive(Clone, Default, Debug)]
pub struct Air {
    ast: Vec<AsmLine>,
}

impl Air {
    pub fn new() -> Self {
        Air::default()
    }

    pub fn add_stmt(&mut self, stmt: AsmLine) {
        self.ast.push(stmt)
    }

    /// Statement at program-local address `addr`
    pub fn get(&self, addr: usize) -> Option<&AsmLine> {
        self.ast.get(addr)
    }

    pub fn len(&self) -> usize {
        self.ast.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ast.is_empty()
    }

    /// Machine words in program order
    pub fn emit(&self) -> Vec<u16> {
        self.ast.iter().map(|line| line.stmt.emit()).collect()
    }
}

/// Pack an opcode and three operand fields into a machine word. Fields are truncated to 4 bits.
pub fn encode(opcode: Opcode, dest: u8, op1: u8, op2: u8) -> u16 {
    (opcode as u16) << 12
        | ((dest & 0xF) as u16) << 8
        | ((op1 & 0xF) as u16) << 4
        | (op2 & 0xF) as u16
}

/// Unpack the three operand fields of a machine word.
pub fn fields(word: u16) -> (u8, u8, u8) {
    (
        ((word >> 8) & 0xF) as u8,
        ((word >> 4) & 0xF) as u8,
        (word & 0xF) as u8,
    )
}

impl AirStmt {
    pub fn opcode(&self) -> Opcode {
        match self {
            AirStmt::Nop => Opcode::Nop,
            AirStmt::Load { .. } => Opcode::Lw,
            AirStmt::Store { .. } => Opcode::Sw,
            AirStmt::Add { .. } => Opcode::Add,
            AirStmt::AddImm { .. } => Opcode::Addi,
            AirStmt::Sub { .. } => Opcode::Sub,
            AirStmt::SubImm { .. } => Opcode::Subi,
            AirStmt::Cmp { .. } => Opcode::Cmp,
            AirStmt::Jump { .. } => Opcode::Jmp,
            AirStmt::JumpGreater { .. } => Opcode::Jg,
            AirStmt::JumpLess { .. } => Opcode::Jl,
            AirStmt::Mov { .. } => Opcode::Mov,
            AirStmt::Halt => Opcode::Halt,
        }
    }

    /// Encode into a machine word
    pub fn emit(&self) -> u16 {
        let (dest, op1, op2) = match *self {
            AirStmt::Nop | AirStmt::Halt => (0, 0, 0),
            AirStmt::Load { dest, addr } => (dest.nibble(), addr.nibble(), 0),
            AirStmt::Store { src, addr } => (src.nibble(), addr.nibble(), 0),
            AirStmt::Add { dest, lhs, rhs }
            | AirStmt::Sub { dest, lhs, rhs }
            | AirStmt::Cmp { dest, lhs, rhs } => (dest.nibble(), lhs.nibble(), rhs.nibble()),
            AirStmt::AddImm { dest, src, imm } | AirStmt::SubImm { dest, src, imm } => {
                (dest.nibble(), src.nibble(), imm)
            }
            AirStmt::Jump { target } => (target, 0, 0),
            AirStmt::JumpGreater { target, cond } | AirStmt::JumpLess { target, cond } => {
                (target, cond.nibble(), 0)
            }
            AirStmt::Mov { dest, src } => (dest.nibble(), src.nibble(), 0),
        };
        encode(self.opcode(), dest, op1, op2)
    }

    /// Decode a machine word. `None` if the opcode is not assigned.
    ///
    /// Any word with opcode 0 decodes as `Nop`, as the emulator executes it that way.
    pub fn decode(word: u16) -> Option<AirStmt> {
        let opcode = Opcode::from_nibble((word >> 12) as u8)?;
        let (dest, op1, op2) = fields(word);
        let (d, a, b) = (Register::new(dest), Register::new(op1), Register::new(op2));
        let stmt = match opcode {
            Opcode::Nop => AirStmt::Nop,
            Opcode::Lw => AirStmt::Load { dest: d, addr: a },
            Opcode::Sw => AirStmt::Store { src: d, addr: a },
            Opcode::Add => AirStmt::Add { dest: d, lhs: a, rhs: b },
            Opcode::Addi => AirStmt::AddImm { dest: d, src: a, imm: op2 },
            Opcode::Sub => AirStmt::Sub { dest: d, lhs: a, rhs: b },
            Opcode::Subi => AirStmt::SubImm { dest: d, src: a, imm: op2 },
            Opcode::Cmp => AirStmt::Cmp { dest: d, lhs: a, rhs: b },
            Opcode::Jmp => AirStmt::Jump { target: dest },
            Opcode::Jg => AirStmt::JumpGreater { target: dest, cond: a },
            Opcode::Jl => AirStmt::JumpLess { target: dest, cond: a },
            Opcode::Mov => AirStmt::Mov { dest: d, src: a },
            Opcode::Halt => AirStmt::Halt,
        };
        Some(stmt)
    }
}

/// Renders in assembler syntax. Jump targets are program-local addresses, written `@n`.
impl fmt::Display for AirStmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = self.opcode();
        match self {
            AirStmt::Nop | AirStmt::Halt => write!(f, "{op}"),
            AirStmt::Load { dest, addr } => write!(f, "{op} {dest}, {addr}"),
            AirStmt::Store { src, addr } => write!(f, "{op} {src}, {addr}"),
            AirStmt::Add { dest, lhs, rhs }
            | AirStmt::Sub { dest, lhs, rhs }
            | AirStmt::Cmp { dest, lhs, rhs } => write!(f, "{op} {dest}, {lhs}, {rhs}"),
            AirStmt::AddImm { dest, src, imm } | AirStmt::SubImm { dest, src, imm } => {
                write!(f, "{op} {dest}, {src}, {imm}")
            }
            AirStmt::Jump { target } => write!(f, "{op} @{target}"),
            AirStmt::JumpGreater { target, cond } | AirStmt::JumpLess { target, cond } => {
                write!(f, "{op} @{target}, {cond}")
            }
            AirStmt::Mov { dest, src } => write!(f, "{op} {dest}, {src}"),
        }
    }
}
