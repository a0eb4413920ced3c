use std::fmt;
use std::str::FromStr;

use fxhash::FxBuildHasher;
use indexmap::IndexMap;

/// Label table of label -> program-local address
pub(crate) type FxMap<K, V> = IndexMap<K, V, FxBuildHasher>;

/// One of the 16 general purpose registers.
///
/// Only the low nibble is significant, as that is all an operand field can hold.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Register(u8);

impl Register {
    pub const COUNT: usize = 16;

    /// Masks `index` down to a valid register.
    pub fn new(index: u8) -> Self {
        Register(index & 0xF)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn nibble(self) -> u8 {
        self.0
    }
}

impl FromStr for Register {
    type Err = ();

    /// Accepts `R` followed by decimal digits. The index wraps modulo 16 instead of failing.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix('R').ok_or(())?;
        let nibble = nibble_of_digits(digits).ok_or(())?;
        Ok(Register(nibble))
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", self.0)
    }
}

/// Reduce a decimal digit string modulo 16 without overflowing, whatever its length.
pub(crate) fn nibble_of_digits(digits: &str) -> Option<u8> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(
        digits
            .bytes()
            .fold(0u8, |acc, b| (acc * 10 + (b - b'0')) & 0xF),
    )
}

/// Operation encoded in the top nibble of a machine word.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Opcode {
    Nop = 0x0,
    Lw = 0x1,
    Sw = 0x2,
    Add = 0x3,
    Addi = 0x4,
    Sub = 0x5,
    Subi = 0x6,
    Cmp = 0x7,
    Jmp = 0x8,
    Jg = 0x9,
    Jl = 0xA,
    Mov = 0xC,
    Halt = 0xF,
}

impl Opcode {
    /// Every mnemonic understood by the assembler, in opcode order.
    pub const TABLE: [(&'static str, Opcode); 13] = [
        ("NOP", Opcode::Nop),
        ("LW", Opcode::Lw),
        ("SW", Opcode::Sw),
        ("ADD", Opcode::Add),
        ("ADDI", Opcode::Addi),
        ("SUB", Opcode::Sub),
        ("SUBI", Opcode::Subi),
        ("CMP", Opcode::Cmp),
        ("JMP", Opcode::Jmp),
        ("JG", Opcode::Jg),
        ("JL", Opcode::Jl),
        ("MOV", Opcode::Mov),
        ("HALT", Opcode::Halt),
    ];

    pub fn from_mnemonic(mnemonic: &str) -> Option<Opcode> {
        Self::TABLE
            .iter()
            .find(|(name, _)| *name == mnemonic)
            .map(|(_, op)| *op)
    }

    pub fn from_nibble(nibble: u8) -> Option<Opcode> {
        Self::TABLE
            .iter()
            .find(|(_, op)| *op as u8 == nibble & 0xF)
            .map(|(_, op)| *op)
    }

    pub fn mnemonic(self) -> &'static str {
        Self::TABLE
            .iter()
            .find(|(_, op)| *op == self)
            .map(|(name, _)| *name)
            .unwrap_or("???")
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Labels declared during the first assembler pass.
#[derive(Clone, Default, Debug)]
pub struct LabelTable {
    table: FxMap<String, usize>,
}

impl LabelTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to `addr`. Returns `Err` with the existing address if already declared.
    pub fn insert(&mut self, name: &str, addr: usize) -> Result<(), usize> {
        if let Some(prev) = self.table.get(name) {
            return Err(*prev);
        }
        self.table.insert(name.to_string(), addr);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<usize> {
        self.table.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Labels in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.table.iter().map(|(name, addr)| (name.as_str(), *addr))
    }
}
