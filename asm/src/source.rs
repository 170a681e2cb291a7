//! Reads input and library files into the flat `(line, file, pos)`
//! stream the macro expander consumes, plus a per-file line cache used
//! by the listing writer and diagnostic echo. Mirrors `asm.py`'s
//! "0. preprocess" section.

use crate::diag::{Diagnostic, Kind};
use std::collections::HashMap;
use std::fs;

/// One physical, non-blank source line before macro expansion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawLine {
    pub text: String,
    pub file: String,
    pub pos: u32,
}

/// Per-file `line number -> trimmed text`, for listing/diagnostic echo.
pub type SourceCache = HashMap<String, HashMap<u32, String>>;

fn load_file(path: &str, cache: &mut SourceCache, out: &mut Vec<RawLine>) -> Result<(), Diagnostic> {
    if !std::path::Path::new(path).is_file() {
        return Err(Diagnostic::new(
            Kind::FileNotFound(format!("file does not exist: {}", path)),
            "",
            0,
        ));
    }
    let contents = fs::read_to_string(path)
        .map_err(|e| Diagnostic::new(Kind::IoError(e.to_string()), "", 0))?;
    let file_cache = cache.entry(path.to_owned()).or_default();
    for (i, raw) in contents.lines().enumerate() {
        let pos = (i + 1) as u32;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            continue;
        }
        file_cache.insert(pos, trimmed.to_owned());
        out.push(RawLine {
            text: trimmed.to_owned(),
            file: path.to_owned(),
            pos,
        });
    }
    Ok(())
}

/// Load every library file (in order) followed by every input file,
/// returning the flat line stream, the set of library filenames (for
/// `SymbolTable` visibility), and the listing source cache. A trailing
/// `.align 4` is appended so trailing data directives can't leave the
/// instruction stream misaligned.
pub fn load(
    inputs: &[String],
    libraries: &[String],
) -> Result<(Vec<RawLine>, Vec<String>, SourceCache), Diagnostic> {
    let mut cache = SourceCache::new();
    let mut lines = Vec::new();
    let mut library_names = Vec::new();

    for path in libraries {
        load_file(path, &mut cache, &mut lines)?;
        library_names.push(path.clone());
    }
    for path in inputs {
        load_file(path, &mut cache, &mut lines)?;
    }

    if let Some(last) = lines.last().cloned() {
        lines.push(RawLine {
            text: ".align 4".to_owned(),
            file: last.file,
            pos: last.pos,
        });
    }

    Ok((lines, library_names, cache))
}

/// `-f <label>` support: append a `.global <label>` and a `<label>:`
/// declaration at a synthetic end-of-program position, matching
/// `asm.py`'s two appended lines verbatim (file `"_end"`, line `0`).
pub fn append_end_marker(lines: &mut Vec<RawLine>, label: &str) {
    lines.push(RawLine {
        text: format!(".global {}", label),
        file: "_end".to_owned(),
        pos: 0,
    });
    lines.push(RawLine {
        text: format!("{}:", label),
        file: "_end".to_owned(),
        pos: 0,
    });
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;

    fn write_temp(name: &str, contents: &str) -> String {
        let path = std::env::temp_dir().join(format!("asm-source-test-{}-{}", std::process::id(), name));
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path.to_str().unwrap().to_owned()
    }

    #[test]
    fn blank_lines_are_elided_and_trailing_align_is_appended() {
        let path = write_temp("a.s", "main:\n\n  halt\n");
        let (lines, _, _) = load(&[path], &[]).unwrap();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].text, "main:");
        assert_eq!(lines[1].text, "halt");
        assert_eq!(lines[2].text, ".align 4");
    }

    #[test]
    fn missing_file_is_fatal() {
        let err = load(&["/nonexistent/path.s".to_owned()], &[]).unwrap_err();
        assert!(matches!(err.kind, Kind::FileNotFound(_)));
    }

    #[test]
    fn libraries_load_before_inputs() {
        let lib = write_temp("lib.s", "print: halt\n");
        let main = write_temp("main.s", "main: halt\n");
        let (lines, library_names, _) = load(&[main.clone()], &[lib.clone()]).unwrap();
        assert_eq!(lines[0].file, lib);
        assert_eq!(library_names, vec![lib]);
    }
}
