//! Parser for the version table resource.
//!
//! One row per schema version: `label,classIdentifier`. Fields may be
//! double-quoted, in which case they can contain commas and `""` escapes.
//! Blank lines and lines starting with `#` are skipped. Columns past the
//! second are ignored.

use crate::error::TableError;

/// One successfully parsed row of the version table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRow {
    /// 1-based line number in the source text.
    pub line: usize,
    pub label: String,
    pub class_name: String,
}

/// Parses every row of `text`, keeping per-row failures in place.
pub fn parse_rows(text: &str) -> Vec<Result<VersionRow, TableError>> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    text.lines()
        .enumerate()
        .filter(|(_, raw)| {
            let trimmed = raw.trim();
            !trimmed.is_empty() && !trimmed.starts_with('#')
        })
        .map(|(idx, raw)| parse_row(idx + 1, raw))
        .collect()
}

fn parse_row(line: usize, raw: &str) -> Result<VersionRow, TableError> {
    let malformed = |reason: String| TableError::Malformed { line, reason };

    let fields = split_record(raw).map_err(malformed)?;
    if fields.len() < 2 {
        return Err(malformed(format!(
            "expected 2 columns (label, class), found {}",
            fields.len()
        )));
    }
    if fields.len() > 2 {
        log::debug!("Version table line {line}: ignoring {} extra columns", fields.len() - 2);
    }

    let mut fields = fields.into_iter();
    let label = fields.next().unwrap_or_default();
    let class_name = fields.next().unwrap_or_default();
    if label.is_empty() {
        return Err(malformed("empty version label".into()));
    }
    if class_name.is_empty() {
        return Err(malformed(format!("empty class identifier for '{label}'")));
    }

    Ok(VersionRow {
        line,
        label,
        class_name,
    })
}

/// Splits one comma-separated record, honoring double quotes.
///
/// Unquoted fields are trimmed; quoted fields are taken verbatim.
fn split_record(raw: &str) -> Result<Vec<String>, String> {
    let mut fields = Vec::new();
    let mut chars = raw.chars().peekable();

    loop {
        while chars.peek().is_some_and(|c| *c == ' ' || *c == '\t') {
            chars.next();
        }

        let mut field = String::new();
        if chars.peek() == Some(&'"') {
            chars.next();
            loop {
                match chars.next() {
                    Some('"') if chars.peek() == Some(&'"') => {
                        chars.next();
                        field.push('"');
                    }
                    Some('"') => break,
                    Some(c) => field.push(c),
                    None => return Err("unterminated quoted field".into()),
                }
            }
            while chars.peek().is_some_and(|c| *c == ' ' || *c == '\t') {
                chars.next();
            }
            match chars.peek() {
                None | Some(',') => {}
                Some(c) => return Err(format!("unexpected '{c}' after quoted field")),
            }
        } else {
            while let Some(c) = chars.peek().copied() {
                if c == ',' {
                    break;
                }
                if c == '"' {
                    return Err("quote inside unquoted field".into());
                }
                field.push(c);
                chars.next();
            }
            field = field.trim_end().to_owned();
        }
        fields.push(field);

        match chars.next() {
            Some(',') => continue,
            _ => break,
        }
    }

    Ok(fields)
}
