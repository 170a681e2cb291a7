//! Splits one raw source line into a mnemonic and its comma-separated
//! operands (spec.md §4.1). Pure text; no semantic interpretation.
//! Mirrors `asm.py`'s `split_comma`/`parse`.

use crate::diag::{Diagnostic, Kind};

/// Split `s` on top-level commas, honoring double-quoted strings (with
/// backslash escapes) and treating an unquoted `#` as "stop here".
fn split_comma(s: &str) -> Result<Vec<String>, ()> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_string = false;
    let mut escape = false;
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if escape {
            escape = false;
            current.push(c);
            continue;
        }
        if c == '"' {
            in_string = !in_string;
            current.push(c);
            continue;
        }
        if c == '\\' && in_string {
            escape = true;
            current.push(c);
            continue;
        }
        if c == ',' && !in_string {
            fields.push(current.clone());
            current.clear();
            continue;
        }
        if c == '#' && !in_string {
            fields.push(current.clone());
            return Ok(fields);
        }
        current.push(c);
    }
    if in_string {
        return Err(());
    }
    fields.push(current);
    Ok(fields)
}

/// Split one line into `(mnemonic, operands)`. Returns `None` for a
/// blank line or one whose mnemonic begins with `#`.
pub fn split(line: &str, file: &str, pos: u32) -> Result<Option<(String, Vec<String>)>, Diagnostic> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (mnemonic, rest) = match line.find(char::is_whitespace) {
        Some(idx) => (&line[..idx], line[idx..].trim_start()),
        None => (line, ""),
    };
    if let Some(hash) = mnemonic.find('#') {
        let m = &mnemonic[..hash];
        return Ok(if m.is_empty() { None } else { Some((m.to_owned(), Vec::new())) });
    }
    if rest.is_empty() || rest.starts_with('#') {
        return Ok(Some((mnemonic.to_owned(), Vec::new())));
    }
    let operands = split_comma(rest).map_err(|_| {
        Diagnostic::new(
            Kind::ParseError("unterminated string literal".to_owned()),
            file,
            pos,
        )
    })?;
    Ok(Some((
        mnemonic.to_owned(),
        operands.into_iter().map(|s| s.trim().to_owned()).collect(),
    )))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn splits_mnemonic_and_operands() {
        let (m, ops) = split("add r1, r2, r3, 5", "a.s", 1).unwrap().unwrap();
        assert_eq!(m, "add");
        assert_eq!(ops, vec!["r1", "r2", "r3", "5"]);
    }

    #[test]
    fn comment_after_hash_is_discarded() {
        let (m, ops) = split("add r1, r2 # comment, with comma", "a.s", 1)
            .unwrap()
            .unwrap();
        assert_eq!(m, "add");
        assert_eq!(ops, vec!["r1", "r2"]);
    }

    #[test]
    fn comma_inside_string_is_not_a_separator() {
        let (_, ops) = split(".string \"a, b\"", "a.s", 1).unwrap().unwrap();
        assert_eq!(ops, vec!["\"a, b\""]);
    }

    #[test]
    fn bare_label_with_no_operands() {
        let (m, ops) = split("main:", "a.s", 1).unwrap().unwrap();
        assert_eq!(m, "main:");
        assert!(ops.is_empty());
    }

    #[test]
    fn blank_and_comment_only_lines_yield_nothing() {
        assert!(split("", "a.s", 1).unwrap().is_none());
        assert!(split("   ", "a.s", 1).unwrap().is_none());
    }

    #[test]
    fn unterminated_string_is_an_error() {
        assert!(split(".string \"unterminated", "a.s", 1).is_err());
    }
}
