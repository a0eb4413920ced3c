use crate::{
    air::fields,
    error::{Fault, LoadError},
    symbol::Register,
};

/// Words of memory unless configured otherwise.
pub const DEFAULT_CAPACITY: usize = 1024;
/// Address where programs are loaded unless configured otherwise.
pub const DEFAULT_OFFSET: usize = 512;
/// Largest memory addressable by a 16-bit register.
pub const MEMORY_MAX: usize = 0x10000;

/// Where the emulator is in its lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Status {
    /// Program loaded, nothing executed yet.
    #[default]
    Ready,
    Running,
    Halted,
    Faulted(Fault),
}

impl Status {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Halted | Status::Faulted(_))
    }
}

/// Result of a single fetch-decode-execute cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    Continued,
    Halted,
    Faulted(Fault),
}

/// What an instruction does to the program counter.
enum Flow {
    Next,
    Jump(usize),
    Halt,
}

type Op = fn(&mut Emulator, u8, u8, u8) -> Result<Flow, Fault>;

/// Registers, memory and program counter of one machine.
///
/// Memory below `offset` holds user data, programs are loaded at `offset`.
#[derive(Clone, Debug)]
pub struct Emulator {
    reg: [u16; Register::COUNT],
    mem: Vec<u16>,
    pc: usize,
    offset: usize,
    status: Status,
}

impl Default for Emulator {
    fn default() -> Self {
        Emulator {
            reg: [0; Register::COUNT],
            mem: vec![0; DEFAULT_CAPACITY],
            pc: DEFAULT_OFFSET,
            offset: DEFAULT_OFFSET,
            status: Status::Ready,
        }
    }
}

impl Emulator {
    pub fn new() -> Self {
        Emulator::default()
    }

    /// Memory of `capacity` words with programs loaded at `offset`.
    pub fn with_layout(capacity: usize, offset: usize) -> Result<Emulator, LoadError> {
        if offset >= capacity || capacity > MEMORY_MAX {
            return Err(LoadError::InvalidLayout { capacity, offset });
        }
        Ok(Emulator {
            mem: vec![0; capacity],
            pc: offset,
            offset,
            ..Emulator::default()
        })
    }

    /// Copy `program` to the program region and rewind. Registers and other memory are untouched.
    pub fn load_program(&mut self, program: &[u16]) -> Result<(), LoadError> {
        let available = self.mem.len() - self.offset;
        if program.len() > available {
            return Err(LoadError::ProgramTooLarge {
                len: program.len(),
                available,
            });
        }
        self.mem[self.offset..self.offset + program.len()].copy_from_slice(program);
        self.pc = self.offset;
        self.status = Status::Ready;
        Ok(())
    }

    /// Overwrite the data region below the program offset. Cells past `data` are zeroed.
    pub fn load_data(&mut self, data: &[u16]) -> Result<(), LoadError> {
        if data.len() > self.offset {
            return Err(LoadError::DataTooLarge {
                len: data.len(),
                available: self.offset,
            });
        }
        let region = &mut self.mem[..self.offset];
        region.fill(0);
        region[..data.len()].copy_from_slice(data);
        Ok(())
    }

    pub fn registers(&self) -> &[u16; Register::COUNT] {
        &self.reg
    }

    pub fn register(&self, reg: Register) -> u16 {
        self.reg[reg.index()]
    }

    pub fn memory(&self) -> &[u16] {
        &self.mem
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn capacity(&self) -> usize {
        self.mem.len()
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// Word the next step will execute, if the program counter is inside memory.
    pub fn fetch(&self) -> Option<u16> {
        self.mem.get(self.pc).copied()
    }

    const OP_TABLE: [Op; 16] = [
        Self::nop,     // 0x0
        Self::lw,      // 0x1
        Self::sw,      // 0x2
        Self::add,     // 0x3
        Self::addi,    // 0x4
        Self::sub,     // 0x5
        Self::subi,    // 0x6
        Self::cmp,     // 0x7
        Self::jmp,     // 0x8
        Self::jg,      // 0x9
        Self::jl,      // 0xA
        Self::unknown, // 0xB
        Self::mov,     // 0xC
        Self::unknown, // 0xD
        Self::unknown, // 0xE
        Self::halt,    // 0xF
    ];

    /// Execute one instruction.
    ///
    /// Once halted or faulted, nothing changes until the next `load_program` and the same
    /// outcome is reported again.
    pub fn step(&mut self) -> StepOutcome {
        match self.status {
            Status::Halted => return StepOutcome::Halted,
            Status::Faulted(fault) => return StepOutcome::Faulted(fault),
            Status::Ready | Status::Running => {}
        }

        let Some(instr) = self.fetch() else {
            return self.fault(Fault::PcOutOfBounds { pc: self.pc });
        };
        self.status = Status::Running;

        // Label placeholders
        if instr == 0 {
            self.pc += 1;
            return StepOutcome::Continued;
        }

        let opcode = (instr >> 12) as usize;
        let (dest, op1, op2) = fields(instr);
        match Self::OP_TABLE[opcode](self, dest, op1, op2) {
            Ok(Flow::Next) => {
                self.pc += 1;
                StepOutcome::Continued
            }
            Ok(Flow::Jump(addr)) => {
                self.pc = addr;
                StepOutcome::Continued
            }
            Ok(Flow::Halt) => {
                self.status = Status::Halted;
                StepOutcome::Halted
            }
            Err(fault) => self.fault(fault),
        }
    }

    /// Step until halted or faulted. Does not return for a program that never halts.
    pub fn run(&mut self) -> StepOutcome {
        loop {
            let outcome = self.step();
            if self.status.is_terminal() {
                return outcome;
            }
        }
    }

    fn fault(&mut self, fault: Fault) -> StepOutcome {
        self.status = Status::Faulted(fault);
        StepOutcome::Faulted(fault)
    }

    #[inline]
    fn reg(&mut self, reg: u8) -> &mut u16 {
        &mut self.reg[(reg & 0xF) as usize]
    }

    #[inline]
    fn val(&self, reg: u8) -> u16 {
        self.reg[(reg & 0xF) as usize]
    }

    /// Memory cell addressed by a register, or a fault past the end of memory.
    fn mem_at(&mut self, addr_reg: u8) -> Result<&mut u16, Fault> {
        let address = self.val(addr_reg);
        let pc = self.pc;
        self.mem
            .get_mut(address as usize)
            .ok_or(Fault::MemoryOutOfBounds { address, pc })
    }

    fn nop(&mut self, _dest: u8, _op1: u8, _op2: u8) -> Result<Flow, Fault> {
        Ok(Flow::Next)
    }

    fn lw(&mut self, dest: u8, op1: u8, _op2: u8) -> Result<Flow, Fault> {
        let val = *self.mem_at(op1)?;
        *self.reg(dest) = val;
        Ok(Flow::Next)
    }

    fn sw(&mut self, dest: u8, op1: u8, _op2: u8) -> Result<Flow, Fault> {
        let val = self.val(dest);
        *self.mem_at(op1)? = val;
        Ok(Flow::Next)
    }

    fn add(&mut self, dest: u8, op1: u8, op2: u8) -> Result<Flow, Fault> {
        let val = self.val(op1).wrapping_add(self.val(op2));
        *self.reg(dest) = val;
        Ok(Flow::Next)
    }

    fn addi(&mut self, dest: u8, op1: u8, imm: u8) -> Result<Flow, Fault> {
        let val = self.val(op1).wrapping_add(imm as u16);
        *self.reg(dest) = val;
        Ok(Flow::Next)
    }

    fn sub(&mut self, dest: u8, op1: u8, op2: u8) -> Result<Flow, Fault> {
        let val = self.val(op1).wrapping_sub(self.val(op2));
        *self.reg(dest) = val;
        Ok(Flow::Next)
    }

    fn subi(&mut self, dest: u8, op1: u8, imm: u8) -> Result<Flow, Fault> {
        let val = self.val(op1).wrapping_sub(imm as u16);
        *self.reg(dest) = val;
        Ok(Flow::Next)
    }

    fn cmp(&mut self, dest: u8, op1: u8, op2: u8) -> Result<Flow, Fault> {
        let val = (self.val(op1) < self.val(op2)) as u16;
        *self.reg(dest) = val;
        Ok(Flow::Next)
    }

    fn jmp(&mut self, target: u8, _op1: u8, _op2: u8) -> Result<Flow, Fault> {
        Ok(Flow::Jump(self.offset + target as usize))
    }

    fn jg(&mut self, target: u8, cond: u8, _op2: u8) -> Result<Flow, Fault> {
        if self.val(cond) > 0 {
            Ok(Flow::Jump(self.offset + target as usize))
        } else {
            Ok(Flow::Next)
        }
    }

    fn jl(&mut self, target: u8, cond: u8, _op2: u8) -> Result<Flow, Fault> {
        if self.val(cond) == 0 {
            Ok(Flow::Jump(self.offset + target as usize))
        } else {
            Ok(Flow::Next)
        }
    }

    fn mov(&mut self, dest: u8, op1: u8, _op2: u8) -> Result<Flow, Fault> {
        let val = self.val(op1);
        *self.reg(dest) = val;
        Ok(Flow::Next)
    }

    fn halt(&mut self, _dest: u8, _op1: u8, _op2: u8) -> Result<Flow, Fault> {
        Ok(Flow::Halt)
    }

    fn unknown(&mut self, _dest: u8, _op1: u8, _op2: u8) -> Result<Flow, Fault> {
        let opcode = (self.mem[self.pc] >> 12) as u8;
        Err(Fault::UnknownOpcode {
            opcode,
            pc: self.pc,
        })
    }
}
