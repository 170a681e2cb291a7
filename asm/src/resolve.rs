//! Resolution pass (spec.md §4.4): walks the sized line stream a
//! second time, now that every label has an address, and turns each
//! line into one or more fully-resolved `(mnemonic, operands)` tuples
//! ready for [`crate::encode::encode`]. Mirrors `asm.py`'s
//! `resolve_label`.

use crate::diag::{Diagnostic, Kind};
use crate::layout::Sized;
use crate::macros::Instr;
use crate::symbol::SymbolTable;
use isa::constants::WORD_BYTES;

/// A fully-resolved instruction or data line, at its final address.
pub struct Resolved {
    pub address: i64,
    pub mnemonic: String,
    pub operands: Vec<String>,
    pub file: String,
    pub line: u32,
}

/// `(hi, lo)` such that `(hi << 16) + lo == value` and `lo` fits a
/// signed 16-bit field: `hi` is the raw operand for a direct `ldh
/// r29,r0,hi` (the field already holds the high half, unshifted), `lo`
/// the signed displacement of the paired load/store through `r29`.
/// Matches `asm.py`'s `resolve_label` hi/lo split for symbolic
/// `ld`/`ldb`/`st`/`stb` — distinct from [`crate::macros`]'s
/// `biased_hi_lo`, whose `hi` instead feeds a general 32-bit immediate
/// loader and so stays unshifted.
fn hi_lo(value: i64) -> (i64, i64) {
    let biased = value + 0x8000;
    let hi = (biased >> 16) & 0xffff;
    let lo = (biased & 0xffff) - 0x8000;
    (hi, lo)
}

fn emit(out: &mut Vec<Resolved>, addr: &mut i64, instr: Instr, file: &str, line: u32) {
    out.push(Resolved {
        address: *addr,
        mnemonic: instr.0,
        operands: instr.1,
        file: file.to_owned(),
        line,
    });
    *addr += WORD_BYTES as i64;
}

fn check_value_range(value: i64, label: &str, file: &str, line: u32) -> Result<(), Diagnostic> {
    if (-0x8000_0000i64..=0xffff_ffffi64).contains(&value) {
        Ok(())
    } else {
        Err(Diagnostic::new(
            Kind::LabelOutOfRange(format!("expression value too large: {:#x}", value)),
            file,
            line,
        ))
    }
}

/// `mov dest, label` — resolves the label to its absolute address and
/// always emits exactly the number of instructions `layout` reserved:
/// one `ldl` in one-operation mode (the encoder rejects a value that
/// doesn't fit `ldl`'s raw 16-bit field), or an `ldl`/`ldh` pair in
/// two-operation mode. Mirrors `asm.py`'s `resolve_label` inline `mov`
/// handling, which never takes the `mov_imm` one-or-two-instruction
/// shortcut used for literal-immediate `mov` at macro-expansion time.
fn resolve_mov(
    s: &Sized,
    symtab: &mut SymbolTable,
    one_op_mode: bool,
    out: &mut Vec<Resolved>,
) -> Result<(), Diagnostic> {
    let dest = &s.operands[0];
    let label = &s.operands[1];
    let value = symtab.eval_expr(label, &s.file, s.line)?;
    check_value_range(value, label, &s.file, s.line)?;

    let mut addr = s.address;
    if one_op_mode {
        if !(-0x8000..=0xffff).contains(&value) {
            return Err(Diagnostic::new(
                Kind::LabelOutOfRange(format!("'{}' does not fit a single-instruction mov", label)),
                &s.file,
                s.line,
            ));
        }
        emit(out, &mut addr, ("ldl".to_owned(), vec![dest.clone(), value.to_string()]), &s.file, s.line);
    } else {
        emit(out, &mut addr, ("ldl".to_owned(), vec![dest.clone(), (value & 0xffff).to_string()]), &s.file, s.line);
        emit(
            out,
            &mut addr,
            ("ldh".to_owned(), vec![dest.clone(), dest.clone(), ((value >> 16) & 0xffff).to_string()]),
            &s.file,
            s.line,
        );
    }
    Ok(())
}

/// Symbolic two-operand `ld`/`ldb`/`st`/`stb dest-or-src, label` —
/// always emits exactly the reserved instruction count: the direct
/// `r0`-based form in one-operation mode, or an `ldh r29,r0,hi`
/// followed by the `r29`-based load/store in two-operation mode.
/// Mirrors `asm.py`'s `resolve_label`, which (like `mov` above) never
/// takes a one-instruction shortcut in two-operation mode.
fn resolve_mem(
    s: &Sized,
    symtab: &mut SymbolTable,
    one_op_mode: bool,
    out: &mut Vec<Resolved>,
) -> Result<(), Diagnostic> {
    let reg = &s.operands[0];
    let label = &s.operands[1];
    let value = symtab.eval_expr(label, &s.file, s.line)?;
    check_value_range(value, label, &s.file, s.line)?;

    let mut addr = s.address;
    if one_op_mode {
        emit(out, &mut addr, (s.mnemonic.clone(), vec![reg.clone(), "r0".into(), value.to_string()]), &s.file, s.line);
    } else {
        let (hi, lo) = hi_lo(value);
        emit(out, &mut addr, ("ldh".to_owned(), vec!["r29".into(), "r0".into(), hi.to_string()]), &s.file, s.line);
        emit(out, &mut addr, (s.mnemonic.clone(), vec![reg.clone(), "r29".into(), lo.to_string()]), &s.file, s.line);
    }
    Ok(())
}

/// `jl rd, label` / `bne[+-] rx, ra, label` / `beq[+-] rx, ra, label`:
/// substitute the label with its PC-relative byte displacement.
fn resolve_branch(s: &Sized, symtab: &mut SymbolTable, out: &mut Vec<Resolved>) -> Result<(), Diagnostic> {
    let mut operands = s.operands.clone();
    let label = operands.last().unwrap().clone();
    let disp = symtab.label_addr(&label, &s.file, Some(s.address), s.line)?;
    *operands.last_mut().unwrap() = disp;
    let mut addr = s.address;
    emit(out, &mut addr, (s.mnemonic.clone(), operands), &s.file, s.line);
    Ok(())
}

fn is_label_operand(token: &str) -> bool {
    !isa::register::is_register(token) && crate::numeric::parse_int(token).is_none()
}

/// Run the resolution pass, producing the fully-resolved instruction
/// stream in address order.
pub fn resolve(
    sized: &[Sized],
    symtab: &mut SymbolTable,
    one_op_mode: bool,
) -> Result<Vec<Resolved>, Diagnostic> {
    let mut out = Vec::new();

    for s in sized {
        match s.mnemonic.as_str() {
            "mov" => resolve_mov(s, symtab, one_op_mode, &mut out)?,
            "ld" | "ldb" | "st" | "stb" if s.operands.len() == 2 => {
                resolve_mem(s, symtab, one_op_mode, &mut out)?
            }
            "jl" => resolve_branch(s, symtab, &mut out)?,
            _ => {
                let base = s.mnemonic.trim_end_matches(['+', '-']);
                if matches!(base, "bne" | "beq") && s.operands.last().map(|o| is_label_operand(o)).unwrap_or(false) {
                    resolve_branch(s, symtab, &mut out)?;
                } else if s.mnemonic == ".int" {
                    let value = symtab.eval_expr(&s.operands[0], &s.file, s.line)?;
                    check_value_range(value, &s.operands[0], &s.file, s.line)?;
                    let mut addr = s.address;
                    emit(
                        &mut out,
                        &mut addr,
                        (s.mnemonic.clone(), vec![value.to_string(), s.operands[1].clone()]),
                        &s.file,
                        s.line,
                    );
                } else if s.mnemonic == ".byte" {
                    let mut resolved = Vec::with_capacity(s.operands.len());
                    for o in &s.operands {
                        resolved.push(symtab.eval_expr(o, &s.file, s.line)?.to_string());
                    }
                    let mut addr = s.address;
                    emit(&mut out, &mut addr, (s.mnemonic.clone(), resolved), &s.file, s.line);
                } else if s.mnemonic == ".space" {
                    let mut addr = s.address;
                    emit(&mut out, &mut addr, (s.mnemonic.clone(), s.operands.clone()), &s.file, s.line);
                } else {
                    let mut addr = s.address;
                    emit(&mut out, &mut addr, (s.mnemonic.clone(), s.operands.clone()), &s.file, s.line);
                }
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::layout::layout;

    fn mk(mnemonic: &str, operands: &[&str], file: &str, line: u32) -> (Instr, String, u32) {
        (
            (mnemonic.to_owned(), operands.iter().map(|s| s.to_string()).collect()),
            file.to_owned(),
            line,
        )
    }

    #[test]
    fn hi_lo_split_reconstructs_value() {
        let (hi, lo) = hi_lo(0x1234_5678);
        assert_eq!((hi << 16) + lo, 0x1234_5678);
        assert!(lo >= -0x8000 && lo < 0x8000);
        assert!((0..=0xffff).contains(&hi));
    }

    #[test]
    fn mov_label_in_two_op_mode_always_emits_an_ldl_ldh_pair() {
        let mut symtab = SymbolTable::new(vec![], "main");
        let lines = vec![
            mk("target:", &[], "a.s", 1),
            mk("mov", &["r1", "target"], "a.s", 2),
        ];
        let sized = layout(&lines, &mut symtab, false, 0).unwrap();
        let resolved = resolve(&sized, &mut symtab, false).unwrap();
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].mnemonic, "ldl");
        assert_eq!(resolved[1].mnemonic, "ldh");
    }

    #[test]
    fn mov_label_in_one_op_mode_emits_a_single_ldl() {
        let mut symtab = SymbolTable::new(vec![], "main");
        let lines = vec![
            mk("target:", &[], "a.s", 1),
            mk("mov", &["r1", "target"], "a.s", 2),
        ];
        let sized = layout(&lines, &mut symtab, true, 0).unwrap();
        let resolved = resolve(&sized, &mut symtab, true).unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].mnemonic, "ldl");
    }

    #[test]
    fn mov_label_too_large_for_one_op_mode_is_rejected() {
        let mut symtab = SymbolTable::new(vec![], "main");
        let lines = vec![
            mk("target:", &[], "a.s", 1),
            mk("mov", &["r1", "target"], "a.s", 2),
        ];
        let sized = layout(&lines, &mut symtab, true, 0x1_0000).unwrap();
        let err = resolve(&sized, &mut symtab, true).unwrap_err();
        assert!(matches!(err.kind, Kind::LabelOutOfRange(_)));
    }

    #[test]
    fn dot_int_keeps_its_count_operand_through_resolution() {
        let mut symtab = SymbolTable::new(vec![], "main");
        let lines = vec![mk(".int", &["0xdeadbeef", "2"], "a.s", 1)];
        let sized = layout(&lines, &mut symtab, false, 0x2000).unwrap();
        let resolved = resolve(&sized, &mut symtab, false).unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].operands[1], "2");
    }

    #[test]
    fn jl_resolves_to_pc_relative_displacement() {
        let mut symtab = SymbolTable::new(vec![], "main");
        let lines = vec![
            mk("jl", &["r28", "target"], "a.s", 1),
            mk("target:", &[], "a.s", 2),
        ];
        let sized = layout(&lines, &mut symtab, false, 0).unwrap();
        let resolved = resolve(&sized, &mut symtab, false).unwrap();
        // target is at address 4; jl itself is one word, so the
        // displacement is target - (addr + 4) = 4 - 4 = 0.
        assert_eq!(resolved[0].operands[1], "0");
    }
}
