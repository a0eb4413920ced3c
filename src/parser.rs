use crate::{
    air::{Air, AirStmt, AsmLine, Operand},
    error::{AsmError, AsmErrorKind},
    lexer::{self, Token},
    span::{Idx, Span},
    symbol::{LabelTable, Opcode, Register},
};

/// Assemble `src` into machine words with a fresh [`AsmParser`].
pub fn assemble(src: &str) -> Result<Vec<u16>, AsmError> {
    AsmParser::new().assemble(src)
}

/// Two-pass assembler. The first pass binds labels to addresses, the second encodes statements.
///
/// Every label declaration occupies an address of its own, holding a `NOP`. A label therefore
/// resolves to that placeholder rather than to the instruction after it.
///
/// Jump targets are encoded in 4 bits, so only the first 16 addresses can be reached by label.
#[derive(Debug, Default)]
pub struct AsmParser {
    /// Labels of the last successful assembly
    labels: LabelTable,
}

/// Statement recorded by the first pass.
#[derive(Debug)]
enum Pending<'a> {
    /// Placeholder taking the address of a label
    Placeholder { span: Span },
    Instr {
        mnemonic: Token<'a>,
        operands: Vec<Token<'a>>,
    },
}

impl AsmParser {
    pub fn new() -> Self {
        AsmParser::default()
    }

    /// Labels bound by the last call to `assemble` or `parse` that succeeded.
    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    pub fn assemble(&mut self, src: &str) -> Result<Vec<u16>, AsmError> {
        Ok(self.parse(src)?.emit())
    }

    /// Create AIR from source. Nothing is kept from previous calls, and nothing is kept on error.
    pub fn parse(&mut self, src: &str) -> Result<Air, AsmError> {
        let mut labels = LabelTable::new();
        let pending = collect(src, &mut labels)?;

        let mut air = Air::new();
        for (line, stmt) in pending {
            let asm_line = match stmt {
                Pending::Placeholder { span } => AsmLine {
                    stmt: AirStmt::Nop,
                    line,
                    span,
                },
                Pending::Instr { mnemonic, operands } => {
                    let stmt = Encoder {
                        labels: &labels,
                        line,
                    }
                    .parse_instr(mnemonic, &operands)?;
                    AsmLine {
                        stmt,
                        line,
                        span: statement_span(mnemonic, &operands),
                    }
                }
            };
            air.add_stmt(asm_line);
        }

        self.labels = labels;
        Ok(air)
    }
}

/// First pass: record labels and one pending statement per program address.
fn collect<'a>(src: &'a str, labels: &mut LabelTable) -> Result<Vec<(usize, Pending<'a>)>, AsmError> {
    let mut res = Vec::new();
    let mut base = 0;
    for (idx, raw) in src.split('\n').enumerate() {
        let line = idx + 1;
        let line_base = base;
        base += raw.len() + 1;

        let code = raw.split(';').next().unwrap_or("");
        let trimmed = code.trim();
        if trimmed.is_empty() {
            continue;
        }
        let offs = line_base + (code.len() - code.trim_start().len());
        let span = Span::new(Idx(offs), trimmed.len());

        if let Some(name) = trimmed.strip_suffix(':') {
            let name = name.trim();
            if labels.insert(name, res.len()).is_err() {
                return Err(AsmError::new(
                    AsmErrorKind::DuplicateLabel {
                        name: name.to_string(),
                    },
                    line,
                    span,
                ));
            }
            res.push((line, Pending::Placeholder { span }));
        } else {
            let mut words = lexer::words(code, line_base).into_iter();
            // A non-empty line always has at least one word
            let Some(mnemonic) = words.next() else {
                continue;
            };
            res.push((
                line,
                Pending::Instr {
                    mnemonic,
                    operands: words.collect(),
                },
            ));
        }
    }
    Ok(res)
}

/// Span from the mnemonic to the last operand.
fn statement_span(mnemonic: Token, operands: &[Token]) -> Span {
    let end = operands.last().map_or(mnemonic.span.end(), |tok| tok.span.end());
    Span::new(Idx(mnemonic.span.offs()), end - mnemonic.span.offs())
}

/// Second pass over a single statement.
struct Encoder<'l> {
    labels: &'l LabelTable,
    line: usize,
}

impl Encoder<'_> {
    fn error(&self, kind: AsmErrorKind, span: Span) -> AsmError {
        AsmError::new(kind, self.line, span)
    }

    fn parse_instr(&self, mnemonic: Token, operands: &[Token]) -> Result<AirStmt, AsmError> {
        let Some(opcode) = Opcode::from_mnemonic(mnemonic.text) else {
            return Err(self.error(
                AsmErrorKind::UnknownMnemonic {
                    name: mnemonic.text.to_string(),
                },
                mnemonic.span,
            ));
        };

        let stmt = match opcode {
            Opcode::Addi | Opcode::Subi => {
                self.expect_count(opcode, mnemonic, operands, 3)?;
                let dest = self.expect_reg(operands[0])?;
                let src = self.expect_reg(operands[1])?;
                let imm = self.expect_imm(operands[2])?;
                if opcode == Opcode::Addi {
                    AirStmt::AddImm { dest, src, imm }
                } else {
                    AirStmt::SubImm { dest, src, imm }
                }
            }
            Opcode::Add | Opcode::Sub | Opcode::Cmp => {
                self.expect_count(opcode, mnemonic, operands, 3)?;
                let dest = self.expect_reg(operands[0])?;
                let lhs = self.expect_reg(operands[1])?;
                let rhs = self.expect_reg(operands[2])?;
                match opcode {
                    Opcode::Add => AirStmt::Add { dest, lhs, rhs },
                    Opcode::Sub => AirStmt::Sub { dest, lhs, rhs },
                    _ => AirStmt::Cmp { dest, lhs, rhs },
                }
            }
            Opcode::Mov | Opcode::Lw | Opcode::Sw => {
                self.expect_count(opcode, mnemonic, operands, 2)?;
                let first = self.expect_reg(operands[0])?;
                let second = self.expect_reg(operands[1])?;
                match opcode {
                    Opcode::Mov => AirStmt::Mov {
                        dest: first,
                        src: second,
                    },
                    Opcode::Lw => AirStmt::Load {
                        dest: first,
                        addr: second,
                    },
                    _ => AirStmt::Store {
                        src: first,
                        addr: second,
                    },
                }
            }
            Opcode::Jmp => {
                self.expect_count(opcode, mnemonic, operands, 1)?;
                let target = self.expect_label(operands[0])?;
                AirStmt::Jump { target }
            }
            Opcode::Jg | Opcode::Jl => {
                self.expect_count(opcode, mnemonic, operands, 2)?;
                let target = self.expect_label(operands[0])?;
                let cond = self.expect_reg(operands[1])?;
                if opcode == Opcode::Jg {
                    AirStmt::JumpGreater { target, cond }
                } else {
                    AirStmt::JumpLess { target, cond }
                }
            }
            Opcode::Halt | Opcode::Nop => {
                self.expect_count(opcode, mnemonic, operands, 0)?;
                if opcode == Opcode::Halt {
                    AirStmt::Halt
                } else {
                    AirStmt::Nop
                }
            }
        };
        Ok(stmt)
    }

    fn expect_count(
        &self,
        opcode: Opcode,
        mnemonic: Token,
        operands: &[Token],
        expected: usize,
    ) -> Result<(), AsmError> {
        if operands.len() == expected {
            return Ok(());
        }
        // Point at the surplus operands, or at the whole statement if some are missing
        let span = match operands.get(expected) {
            Some(first_extra) => {
                let end = operands[operands.len() - 1].span.end();
                Span::new(Idx(first_extra.span.offs()), end - first_extra.span.offs())
            }
            None => statement_span(mnemonic, operands),
        };
        Err(self.error(
            AsmErrorKind::OperandCount {
                mnemonic: opcode.mnemonic(),
                expected,
                found: operands.len(),
            },
            span,
        ))
    }

    fn expect_reg(&self, tok: Token) -> Result<Register, AsmError> {
        match Operand::parse(tok.text) {
            Ok(Operand::Register(reg)) => Ok(reg),
            Ok(Operand::Immediate(_) | Operand::Label(_)) | Err(_) => Err(self.error(
                AsmErrorKind::RegisterExpected {
                    found: tok.text.to_string(),
                },
                tok.span,
            )),
        }
    }

    /// Immediates keep only their low nibble, in two's complement for negative values.
    fn expect_imm(&self, tok: Token) -> Result<u8, AsmError> {
        match Operand::parse(tok.text) {
            Ok(Operand::Immediate(val)) => Ok((val & 0xF) as u8),
            Ok(Operand::Register(_) | Operand::Label(_)) => Err(self.error(
                AsmErrorKind::ImmediateExpected {
                    found: tok.text.to_string(),
                },
                tok.span,
            )),
            Err(found) => Err(self.error(AsmErrorKind::InvalidLiteral { found }, tok.span)),
        }
    }

    /// Jump targets are looked up by their raw text, whatever shape it has.
    fn expect_label(&self, tok: Token) -> Result<u8, AsmError> {
        match self.labels.get(tok.text) {
            Some(addr) => Ok((addr & 0xF) as u8),
            None => Err(self.error(
                AsmErrorKind::UnresolvedLabel {
                    name: tok.text.to_string(),
                },
                tok.span,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind(src: &str) -> AsmErrorKind {
        assemble(src).unwrap_err().kind
    }

    #[test]
    fn add_immediate_then_halt() {
        assert_eq!(assemble("ADDI R1, R0, 5\nHALT"), Ok(vec![0x4105, 0xF000]));
    }

    #[test]
    fn labels_take_a_slot() {
        let mut parser = AsmParser::new();
        let words = parser.assemble("L:\nJMP L\nHALT").unwrap();
        assert_eq!(words, vec![0x0000, 0x8000, 0xF000]);
        assert_eq!(parser.labels().get("L"), Some(0));

        let src = "\
            ; count down from 3
            ADDI R1, R0, 3
            loop:
            SUBI R1, R1, 1   ; decrement
            JG loop, R1

            end:
            HALT
        ";
        let words = parser.assemble(src).unwrap();
        assert_eq!(words, vec![0x4103, 0x0000, 0x6111, 0x9110, 0x0000, 0xF000]);
        assert_eq!(parser.labels().get("loop"), Some(1));
        assert_eq!(parser.labels().get("end"), Some(4));
        // Fresh table on every call
        assert_eq!(parser.labels().get("L"), None);
    }

    #[test]
    fn immediates_truncate() {
        assert_eq!(assemble("ADDI R0, R0, 20"), Ok(vec![0x4004]));
        assert_eq!(assemble("SUBI R2, R3, -1"), Ok(vec![0x623F]));
        assert_eq!(assemble("ADDI R0, R0, +16"), Ok(vec![0x4000]));
    }

    #[test]
    fn registers_wrap() {
        assert_eq!(assemble("MOV R17, R2"), Ok(vec![0xC120]));
    }

    #[test]
    fn every_form_encodes() {
        let src = "\
            top:
            LW R1, R2
            SW R3, R4
            ADD R1, R2, R3
            SUB R4, R5, R6
            CMP R7, R8, R9
            MOV R10 R11
            NOP
            JMP top
            JG top, R12
            JL top, R13
            HALT";
        assert_eq!(
            assemble(src),
            Ok(vec![
                0x0000, 0x1120, 0x2340, 0x3123, 0x5456, 0x7789, 0xCAB0, 0x0000, 0x8000, 0x90C0,
                0xA0D0, 0xF000
            ])
        );
    }

    #[test]
    fn blank_and_comment_lines_are_skipped() {
        assert_eq!(assemble("\n  ; only a comment\n\r\nHALT\r\n"), Ok(vec![0xF000]));
        assert_eq!(assemble(""), Ok(vec![]));
    }

    #[test]
    fn duplicate_label() {
        let err = assemble("L:\nNOP\nL:\nHALT").unwrap_err();
        assert_eq!(err.kind, AsmErrorKind::DuplicateLabel { name: "L".into() });
        assert_eq!(err.line, 3);
    }

    #[test]
    fn unresolved_label() {
        let err = assemble("HALT\nJMP nowhere").unwrap_err();
        assert_eq!(
            err.kind,
            AsmErrorKind::UnresolvedLabel {
                name: "nowhere".into()
            }
        );
        assert_eq!(err.line, 2);
        assert_eq!(err.span.as_range(), 9..16);
    }

    #[test]
    fn far_labels_wrap_to_low_nibble() {
        let src = format!("JMP far\n{}far:\nHALT", "NOP\n".repeat(16));
        let mut parser = AsmParser::new();
        let words = parser.assemble(&src).unwrap();
        assert_eq!(parser.labels().get("far"), Some(17));
        // 17 & 0xF
        assert_eq!(words[0], 0x8100);
    }

    #[test]
    fn forward_jumps_resolve() {
        assert_eq!(assemble("JMP end\nend:\nHALT"), Ok(vec![0x8100, 0x0000, 0xF000]));
    }

    #[test]
    fn unknown_mnemonics() {
        assert_eq!(kind("FOO R1"), AsmErrorKind::UnknownMnemonic { name: "FOO".into() });
        // No opcode exists for a compare-immediate
        assert_eq!(
            kind("CMPI R1, R2, 3"),
            AsmErrorKind::UnknownMnemonic { name: "CMPI".into() }
        );
        assert_eq!(kind("halt"), AsmErrorKind::UnknownMnemonic { name: "halt".into() });
        // Text on the same line as a label is not a label declaration
        assert_eq!(kind("L: HALT"), AsmErrorKind::UnknownMnemonic { name: "L:".into() });
    }

    #[test]
    fn operand_counts() {
        assert_eq!(
            kind("ADDI R1, R2"),
            AsmErrorKind::OperandCount {
                mnemonic: "ADDI",
                expected: 3,
                found: 2
            }
        );
        assert_eq!(
            kind("HALT R1"),
            AsmErrorKind::OperandCount {
                mnemonic: "HALT",
                expected: 0,
                found: 1
            }
        );
        // Counted before anything is resolved
        assert_eq!(
            kind("JMP a b"),
            AsmErrorKind::OperandCount {
                mnemonic: "JMP",
                expected: 1,
                found: 2
            }
        );
    }

    #[test]
    fn operand_roles() {
        assert_eq!(
            kind("ADDI R1, 2, 3"),
            AsmErrorKind::RegisterExpected { found: "2".into() }
        );
        assert_eq!(
            kind("MOV R1, counter"),
            AsmErrorKind::RegisterExpected {
                found: "counter".into()
            }
        );
        assert_eq!(
            kind("ADDI R1, R2, R3"),
            AsmErrorKind::ImmediateExpected { found: "R3".into() }
        );
        assert_eq!(
            kind("ADDI R1, R2, 99999999999999999999"),
            AsmErrorKind::InvalidLiteral {
                found: "99999999999999999999".into()
            }
        );
        assert_eq!(
            kind("L:\nJG L, 1"),
            AsmErrorKind::RegisterExpected { found: "1".into() }
        );
    }

    #[test]
    fn failed_assembly_keeps_previous_labels() {
        let mut parser = AsmParser::new();
        parser.assemble("start:\nHALT").unwrap();
        assert!(parser.assemble("again:\nJMP missing").is_err());
        assert_eq!(parser.labels().get("start"), Some(0));
        assert_eq!(parser.labels().get("again"), None);
    }

    #[test]
    fn air_keeps_source_lines() {
        let air = AsmParser::new().parse("x:\n  ADDI R1, R0, 5 ; five\nHALT").unwrap();
        assert_eq!(air.len(), 3);
        let addi = air.get(1).unwrap();
        assert_eq!(addi.line, 2);
        assert_eq!(addi.span.as_range(), 5..19);
        assert_eq!(air.get(0).unwrap().stmt, AirStmt::Nop);
    }
}
