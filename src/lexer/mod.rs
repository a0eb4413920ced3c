use crate::lexer::cursor::Cursor;
use crate::span::{Idx, Span};

pub mod cursor;

/// A 'light' token that only carries its kind and byte length
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct LToken {
    pub kind: LTokenKind,
    pub len: usize,
}

impl LToken {
    pub fn new(kind: LTokenKind, len: usize) -> Self {
        LToken { kind, len }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LTokenKind {
    /// Mnemonic, register, literal or label. Classified later by the parser.
    Word,
    Comment,
    /// Also includes commas
    Whitespace,
    Eof,
}

/// A word from a single source line, located in the whole source.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Token<'a> {
    pub text: &'a str,
    pub span: Span,
}

/// Test if a character separates words.
pub(crate) fn is_whitespace(c: char) -> bool {
    // Commas are interchangeable with spaces between operands
    c.is_whitespace() || c == ','
}

impl Cursor<'_> {
    pub fn advance_token(&mut self) -> LToken {
        let first_char = match self.bump() {
            Some(c) => c,
            None => return LToken::new(LTokenKind::Eof, 0),
        };
        let token_kind = match first_char {
            ';' => {
                self.take_while(|c| c != '\n');
                LTokenKind::Comment
            }
            c if is_whitespace(c) => {
                self.take_while(is_whitespace);
                LTokenKind::Whitespace
            }
            _ => {
                self.take_while(|c| !is_whitespace(c) && c != ';');
                LTokenKind::Word
            }
        };
        let res = LToken::new(token_kind, self.pos_in_token());
        self.reset_pos();
        res
    }
}

/// Split one line into words. `base` is the byte offset of `line` within the source, so that
/// spans point into the full text.
pub fn words(line: &str, base: usize) -> Vec<Token<'_>> {
    let mut cursor = Cursor::new(line);
    let mut offs = 0;
    let mut res = Vec::new();
    loop {
        let tok = cursor.advance_token();
        match tok.kind {
            LTokenKind::Eof | LTokenKind::Comment => break,
            LTokenKind::Whitespace => {}
            LTokenKind::Word => res.push(Token {
                text: &line[offs..offs + tok.len],
                span: Span::new(Idx(base + offs), tok.len),
            }),
        }
        offs += tok.len;
    }
    res
}

#[cfg(test)]
mod test {
    use super::*;

    fn texts(line: &str) -> Vec<&str> {
        words(line, 0).into_iter().map(|tok| tok.text).collect()
    }

    #[test]
    fn commas_and_spaces_separate() {
        assert_eq!(texts("ADDI R1, R0, 5"), ["ADDI", "R1", "R0", "5"]);
        assert_eq!(texts("ADDI R1,R0,5"), ["ADDI", "R1", "R0", "5"]);
        assert_eq!(texts("  MOV\tR2 ,R3  "), ["MOV", "R2", "R3"]);
    }

    #[test]
    fn comment_ends_line() {
        assert_eq!(texts("HALT ; stop here"), ["HALT"]);
        assert_eq!(texts("JMP loop;again"), ["JMP", "loop"]);
        assert!(texts("; nothing").is_empty());
    }

    #[test]
    fn spans_are_offset() {
        let toks = words("SUBI R1, R1, -3", 10);
        assert_eq!(toks[3].text, "-3");
        assert_eq!(toks[3].span, Span::new(Idx(23), 2));
    }
}
