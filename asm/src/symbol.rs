//! Label table and expression evaluation (spec.md §3 "Symbol table",
//! §4.5). Grounded on `asm.py`'s `labels`/`add_label`/`add_global`/
//! `label_addr`/`eval_expr`, generalized per spec.md §9's
//! `Label -> Vec<Declaration>` design note (modeled here as
//! `Label -> file -> Declaration` since lookup is always by the pair).

use crate::diag::{Diagnostic, Kind};
use crate::numeric;
use std::collections::HashMap;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Declaration {
    pub address: Option<i64>,
    pub is_global: bool,
    pub is_used: bool,
}

pub struct SymbolTable {
    labels: HashMap<String, HashMap<String, Declaration>>,
    /// Every label name ever declared at a given address, in declaration
    /// order, regardless of file. Mirrors `asm.py`'s `rev_labels`, which
    /// also picks up `.set` aliases since those go through `add_label`
    /// too. Feeds the listing's per-address label annotation.
    rev: HashMap<i64, Vec<String>>,
    library: Vec<String>,
    start_label: String,
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '$' | '!' | '?')
}

/// Find the next maximal run of identifier characters at or after
/// `from`, mirroring `re.compile(r'[\w.$!?]+').search(expr, pos)`.
fn find_identifier(s: &str, from: usize) -> Option<(usize, usize)> {
    let bytes = s.as_bytes();
    let mut i = from;
    while i < bytes.len() && !is_ident_char(bytes[i] as char) {
        i += 1;
    }
    if i >= bytes.len() {
        return None;
    }
    let start = i;
    while i < bytes.len() && is_ident_char(bytes[i] as char) {
        i += 1;
    }
    Some((start, i))
}

impl SymbolTable {
    pub fn new(library: Vec<String>, start_label: impl Into<String>) -> SymbolTable {
        SymbolTable {
            labels: HashMap::new(),
            rev: HashMap::new(),
            library,
            start_label: start_label.into(),
        }
    }

    fn is_library(&self, file: &str) -> bool {
        self.library.iter().any(|l| l == file)
    }

    fn validate_name(&self, label: &str, file: &str, line: u32) -> Result<(), Diagnostic> {
        if isa::register::is_register(label) {
            return Err(Diagnostic::new(
                Kind::InvalidLabelName(format!("'{}' is register name", label)),
                file,
                line,
            ));
        }
        if numeric::parse_int(label).is_some() {
            return Err(Diagnostic::new(
                Kind::InvalidLabelName(format!("'{}' can be parsed as integer", label)),
                file,
                line,
            ));
        }
        if let Some(c) = label.chars().find(|&c| !is_ident_char(c)) {
            return Err(Diagnostic::new(
                Kind::InvalidLabelName(format!(
                    "label name cannot contain '{}' character",
                    c
                )),
                file,
                line,
            ));
        }
        Ok(())
    }

    pub fn add_label(
        &mut self,
        label: &str,
        file: &str,
        addr: i64,
        line: u32,
    ) -> Result<(), Diagnostic> {
        self.validate_name(label, file, line)?;
        let decl = self
            .labels
            .entry(label.to_owned())
            .or_default()
            .entry(file.to_owned())
            .or_default();
        if decl.address.is_some() {
            return Err(Diagnostic::new(
                Kind::DuplicateLabel(format!("duplicate declaration of label '{}'", label)),
                file,
                line,
            ));
        }
        decl.address = Some(addr);
        self.rev.entry(addr).or_default().push(label.to_owned());
        Ok(())
    }

    /// Every label name declared at `address`, in declaration order.
    /// Mirrors `asm.py`'s `show_label`.
    pub fn labels_at(&self, address: i64) -> &[String] {
        self.rev.get(&address).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn add_global(&mut self, label: &str, file: &str) {
        let decl = self
            .labels
            .entry(label.to_owned())
            .or_default()
            .entry(file.to_owned())
            .or_default();
        decl.is_global = true;
    }

    /// Resolve `label` (already known not to be a bare integer) to its
    /// address, applying own-file-first / unique-global visibility.
    /// `cur`, when set, is the address of the referencing instruction,
    /// so the result is a PC-relative byte displacement instead of an
    /// absolute address (the `cur + 4` offset matches the fact that PC
    /// always points at the *next* instruction at branch-evaluation
    /// time).
    fn resolve(
        &mut self,
        label: &str,
        file: &str,
        cur: Option<i64>,
        line: u32,
    ) -> Result<i64, Diagnostic> {
        let Some(by_file) = self.labels.get(label) else {
            return Err(self.not_declared(label, file, line));
        };
        let mut candidates: Vec<String> = if by_file.contains_key(file) {
            vec![file.to_owned()]
        } else {
            by_file
                .iter()
                .filter(|(_, d)| d.is_global)
                .map(|(f, _)| f.clone())
                .collect()
        };
        if candidates.is_empty() {
            return Err(self.not_declared(label, file, line));
        }
        if candidates.len() > 1 && !candidates.iter().all(|f| self.is_library(f)) {
            candidates.retain(|f| !self.is_library(f));
        }
        if candidates.len() > 1 {
            let mut sorted = candidates.clone();
            sorted.sort();
            let msg = format!(
                "label '{}' is declared in multiple files ({})",
                label,
                sorted.join(", ")
            );
            return Err(if label == self.start_label {
                Diagnostic::new(Kind::LabelAmbiguous(msg), "", 0)
            } else {
                Diagnostic::new(Kind::LabelAmbiguous(msg), file, line)
            });
        }
        let chosen = &candidates[0];
        let decl = self.labels.get_mut(label).unwrap().get_mut(chosen).unwrap();
        decl.is_used = true;
        let address = decl.address.unwrap_or(0);
        let offset = cur.map(|c| c + 4).unwrap_or(0);
        Ok(address - offset)
    }

    fn not_declared(&self, label: &str, file: &str, line: u32) -> Diagnostic {
        if label == self.start_label {
            Diagnostic::new(
                Kind::MissingStartLabel(format!(
                    "global label '{}' is required",
                    label
                )),
                "",
                0,
            )
        } else {
            Diagnostic::new(
                Kind::LabelNotDeclared(format!("label '{}' is not declared", label)),
                file,
                line,
            )
        }
    }

    /// `asm.py`'s `label_addr`: pass a bare integer token through
    /// unchanged, otherwise resolve and return the decimal string form
    /// (this is always re-spliced into expression text by the caller).
    pub fn label_addr(
        &mut self,
        token: &str,
        file: &str,
        cur: Option<i64>,
        line: u32,
    ) -> Result<String, Diagnostic> {
        if numeric::parse_int(token).is_some() {
            return Ok(token.to_owned());
        }
        self.resolve(token, file, cur, line).map(|v| v.to_string())
    }

    /// `asm.py`'s `eval_expr`: substitute every identifier token with
    /// its resolved address, then run the pure arithmetic evaluator.
    pub fn eval_expr(&mut self, expr: &str, file: &str, line: u32) -> Result<i64, Diagnostic> {
        let mut buf = expr.to_owned();
        let mut from = 0usize;
        while let Some((start, end)) = find_identifier(&buf, from) {
            let token = buf[start..end].to_owned();
            let addr = self.label_addr(&token, file, None, line)?;
            from = start + addr.len();
            buf.replace_range(start..end, &addr);
        }
        crate::expr::eval(&buf)
            .map_err(|e| Diagnostic::new(Kind::ExprEvalError(e.0), file, line))
    }

    pub fn check_global(&self, label: &str, file: &str, line: u32) -> Result<(), Diagnostic> {
        let declared = self
            .labels
            .get(label)
            .and_then(|m| m.get(file))
            .and_then(|d| d.address)
            .is_some();
        if declared {
            Ok(())
        } else {
            Err(Diagnostic::new(
                Kind::LabelNotDeclared(format!("label '{}' is not declared", label)),
                file,
                line,
            ))
        }
    }

    /// `asm.py`'s `warn_unused_label`.
    pub fn unused_warning(&self, label: &str, file: &str, line: u32) -> Option<Diagnostic> {
        let decl = self.labels.get(label)?.get(file)?;
        let library_global = self.is_library(file) && decl.is_global;
        if !decl.is_used && !library_global {
            Some(Diagnostic::new(
                Kind::UnusedLabel(format!("unused label '{}'", label)),
                file,
                line,
            ))
        } else {
            None
        }
    }

}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn own_file_declaration_wins_over_global_lookup() {
        let mut t = SymbolTable::new(vec![], "main");
        t.add_label("foo", "a.s", 100, 1).unwrap();
        t.add_label("foo", "b.s", 200, 1).unwrap();
        assert_eq!(t.label_addr("foo", "a.s", None, 1).unwrap(), "100");
        assert_eq!(t.label_addr("foo", "b.s", None, 1).unwrap(), "200");
    }

    #[test]
    fn global_cross_file_reference_resolves_and_marks_used() {
        let mut t = SymbolTable::new(vec![], "main");
        t.add_label("foo", "lib.s", 0x2000, 1).unwrap();
        t.add_global("foo", "lib.s");
        assert_eq!(t.label_addr("foo", "main.s", None, 1).unwrap(), "8192");
        assert!(t.unused_warning("foo", "lib.s", 1).is_none());
    }

    #[test]
    fn two_non_global_same_name_declarations_do_not_collide() {
        let mut t = SymbolTable::new(vec![], "main");
        t.add_label("foo", "a.s", 10, 1).unwrap();
        t.add_label("foo", "b.s", 20, 1).unwrap();
        assert!(t.label_addr("foo", "a.s", None, 1).is_ok());
        assert!(t.label_addr("foo", "b.s", None, 1).is_ok());
    }

    #[test]
    fn two_global_declarations_are_ambiguous() {
        let mut t = SymbolTable::new(vec![], "main");
        t.add_label("foo", "a.s", 10, 1).unwrap();
        t.add_global("foo", "a.s");
        t.add_label("foo", "b.s", 20, 1).unwrap();
        t.add_global("foo", "b.s");
        let err = t.label_addr("foo", "c.s", None, 1).unwrap_err();
        assert!(matches!(err.kind, Kind::LabelAmbiguous(_)));
    }

    #[test]
    fn library_declaration_is_shadowed_without_ambiguity() {
        let mut t = SymbolTable::new(vec!["lib.s".to_owned()], "main");
        t.add_label("foo", "lib.s", 10, 1).unwrap();
        t.add_global("foo", "lib.s");
        t.add_label("foo", "user.s", 20, 1).unwrap();
        t.add_global("foo", "user.s");
        assert_eq!(t.label_addr("foo", "c.s", None, 1).unwrap(), "20");
    }

    #[test]
    fn expr_resolves_label_and_applies_arithmetic() {
        let mut t = SymbolTable::new(vec![], "main");
        t.add_label("foo", "a.s", 100, 1).unwrap();
        assert_eq!(t.eval_expr("foo + 4", "a.s", 1).unwrap(), 104);
    }

    #[test]
    fn check_global_rejects_a_label_never_declared_in_that_file() {
        let t = SymbolTable::new(vec![], "main");
        assert!(t.check_global("nope", "a.s", 1).is_err());
    }

    #[test]
    fn check_global_accepts_a_label_declared_in_the_same_file() {
        let mut t = SymbolTable::new(vec![], "main");
        t.add_label("foo", "a.s", 0x2000, 1).unwrap();
        assert!(t.check_global("foo", "a.s", 1).is_ok());
    }

    #[test]
    fn unused_warning_fires_only_once_the_label_is_confirmed_unreferenced() {
        let mut t = SymbolTable::new(vec![], "main");
        t.add_label("foo", "a.s", 0x2000, 1).unwrap();
        assert!(t.unused_warning("foo", "a.s", 1).is_some());
        t.label_addr("foo", "a.s", None, 1).unwrap();
        assert!(t.unused_warning("foo", "a.s", 1).is_none());
    }

    #[test]
    fn labels_at_an_address_are_recorded_in_declaration_order() {
        let mut t = SymbolTable::new(vec![], "main");
        t.add_label("loop", "a.s", 0x2000, 1).unwrap();
        t.add_label("also_loop", "b.s", 0x2000, 1).unwrap();
        assert_eq!(t.labels_at(0x2000), &["loop".to_owned(), "also_loop".to_owned()]);
        assert!(t.labels_at(0x2004).is_empty());
    }

    #[test]
    fn pc_relative_branch_displacement() {
        let mut t = SymbolTable::new(vec![], "main");
        t.add_label("target", "a.s", 0x2000, 1).unwrap();
        // branch instruction itself at 0x2000 - 0x10
        let disp = t
            .label_addr("target", "a.s", Some(0x2000 - 0x10), 1)
            .unwrap();
        assert_eq!(disp, "12");
    }
}
