use crate::error::DataError;
use crate::span::{Idx, Span};

/// Contents of a program file: an optional line of data words followed by assembly.
///
/// ```text
/// [3, 1, 4, 1, 5]
/// LW R1, R0
/// HALT
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgramSource {
    /// Words for the data region, if the file starts with a `[...]` line
    pub data: Option<Vec<u16>>,
    /// Assembly text. The data line is blanked out so line numbers and spans match the file.
    pub asm: String,
}

impl ProgramSource {
    pub fn parse(contents: &str) -> Result<ProgramSource, DataError> {
        let first_line = contents.split('\n').next().unwrap_or("");
        if !first_line.trim_start().starts_with('[') {
            return Ok(ProgramSource {
                data: None,
                asm: contents.to_string(),
            });
        }

        let data = parse_data(first_line)?;
        let mut asm = " ".repeat(first_line.len());
        asm.push_str(&contents[first_line.len()..]);
        Ok(ProgramSource {
            data: Some(data),
            asm,
        })
    }
}

/// Parse `[a, b, c]`. Negative values are stored in two's complement.
fn parse_data(line: &str) -> Result<Vec<u16>, DataError> {
    let trimmed = line.trim_end();
    let open = trimmed.find('[').unwrap_or(0);
    let inner_start = open + 1;
    let inner = trimmed[inner_start..]
        .strip_suffix(']')
        .unwrap_or(&trimmed[inner_start..]);

    let mut res = Vec::new();
    let mut offs = inner_start;
    for entry in inner.split(',') {
        let entry_offs = offs + (entry.len() - entry.trim_start().len());
        offs += entry.len() + 1;
        let value = entry.trim();
        if value.is_empty() && inner.trim().is_empty() {
            break;
        }
        match value.parse::<i32>() {
            Ok(val) if (-0x8000..=0xFFFF).contains(&val) => res.push(val as u16),
            _ => {
                return Err(DataError {
                    entry: value.to_string(),
                    span: Span::new(Idx(entry_offs), value.len()),
                })
            }
        }
    }
    Ok(res)
}
