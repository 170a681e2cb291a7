//! Layout pass (spec.md §4.3): walks the macro-expanded line stream
//! once, assigning every label its address and recording how many
//! bytes each instruction/directive will occupy. Mirrors `asm.py`'s
//! `init_label`.
//!
//! Generic pseudo-ops (`mov dest, label` and the symbolic two-operand
//! form of `ld`/`ldb`/`st`/`stb`) can't be sized until the label they
//! reference is resolved, which may not happen until a later line. In
//! two-operation mode (the default) this pass reserves the worst case,
//! two words, and the resolution pass pads the unused half with a
//! `nop`; `-n` (one-operation mode) reserves a single word and trusts
//! every such reference to fit, raising a diagnostic if it doesn't.

use crate::diag::{Diagnostic, Kind};
use crate::macros::Instr;
use crate::numeric::parse_int;
use crate::symbol::SymbolTable;
use isa::constants::{PROGRAM_SIZE_CAP, WORD_BYTES};
use isa::register::is_register;

/// One line ready for resolution, with its assigned address and the
/// byte width the resolve pass must fill.
#[derive(Clone, Debug)]
pub struct Sized {
    pub file: String,
    pub line: u32,
    pub mnemonic: String,
    pub operands: Vec<String>,
    pub address: i64,
    pub size: u32,
}

fn is_generic_pseudo(mnemonic: &str, operands: &[String]) -> bool {
    matches!(mnemonic, "mov" | "ld" | "ldb" | "st" | "stb")
        && operands.len() == 2
        && !is_register(&operands[1])
}

/// Run the layout pass over one already macro-expanded `(mnemonic,
/// operands, file, line)` stream, returning the sized instruction list
/// and populating `symtab` with every label's address.
pub fn layout(
    lines: &[(Instr, String, u32)],
    symtab: &mut SymbolTable,
    one_op_mode: bool,
    entry_point: u32,
) -> Result<Vec<Sized>, Diagnostic> {
    let mut addr: i64 = entry_point as i64;
    let mut out = Vec::new();

    for (instr, file, line) in lines {
        let (mnemonic, operands) = instr;
        if let Some(label) = mnemonic.strip_suffix(':') {
            if !operands.is_empty() {
                return Err(Diagnostic::new(
                    Kind::SyntaxError(format!("label '{}' cannot take operands", label)),
                    file,
                    *line,
                ));
            }
            symtab.add_label(label, file, addr, *line)?;
            continue;
        }

        match mnemonic.as_str() {
            ".global" => {
                if operands.len() != 1 {
                    return Err(Diagnostic::new(
                        Kind::OperandCountError("'.global' expects 1 operand".to_owned()),
                        file,
                        *line,
                    ));
                }
                symtab.add_global(&operands[0], file);
                continue;
            }
            ".set" => {
                if operands.len() != 2 {
                    return Err(Diagnostic::new(
                        Kind::OperandCountError("'.set' expects 2 operands".to_owned()),
                        file,
                        *line,
                    ));
                }
                let value = parse_int(&operands[1]).ok_or_else(|| {
                    Diagnostic::new(
                        Kind::ExprEvalError(format!("expected integer constant: {}", operands[1])),
                        file,
                        *line,
                    )
                })?;
                symtab.add_label(&operands[0], file, value, *line)?;
                continue;
            }
            ".align" => {
                let n = operands
                    .first()
                    .and_then(|o| parse_int(o))
                    .ok_or_else(|| {
                        Diagnostic::new(
                            Kind::SyntaxError("'.align' expects an integer operand".to_owned()),
                            file,
                            *line,
                        )
                    })?;
                if n < 4 || (n & (n - 1)) != 0 {
                    return Err(Diagnostic::new(
                        Kind::SyntaxError(
                            "alignment must be a power of 2 which is not less than 4".to_owned(),
                        ),
                        file,
                        *line,
                    ));
                }
                {
                    let rem = addr % n;
                    if rem != 0 {
                        let pad = n - rem;
                        out.push(Sized {
                            file: file.clone(),
                            line: *line,
                            mnemonic: ".space".to_owned(),
                            operands: vec![pad.to_string(), "0".to_owned()],
                            address: addr,
                            size: pad as u32,
                        });
                        addr += pad;
                    }
                }
                continue;
            }
            _ => {}
        }

        let size: u32 = match mnemonic.as_str() {
            ".byte" => operands.len() as u32,
            ".int" => {
                let count = operands.get(1).and_then(|o| parse_int(o)).ok_or_else(|| {
                    Diagnostic::new(
                        Kind::OperandCountError("'.int' expects a count operand".to_owned()),
                        file,
                        *line,
                    )
                })?;
                WORD_BYTES * count.max(0) as u32
            }
            ".space" => {
                let count = operands.first().and_then(|o| parse_int(o)).ok_or_else(|| {
                    Diagnostic::new(
                        Kind::SyntaxError("'.space' expects an integer operand".to_owned()),
                        file,
                        *line,
                    )
                })?;
                count.max(0) as u32
            }
            _ if is_generic_pseudo(mnemonic, operands) => {
                if one_op_mode {
                    WORD_BYTES
                } else {
                    2 * WORD_BYTES
                }
            }
            _ => WORD_BYTES,
        };

        if addr % (WORD_BYTES as i64) != 0
            && mnemonic != ".byte"
            && mnemonic != ".space"
            && mnemonic != ".int"
        {
            return Err(Diagnostic::new(
                Kind::DisplacementAlignmentError(format!(
                    "instruction at 0x{:x} is not word-aligned",
                    addr
                )),
                file,
                *line,
            ));
        }

        out.push(Sized {
            file: file.clone(),
            line: *line,
            mnemonic: mnemonic.clone(),
            operands: operands.clone(),
            address: addr,
            size,
        });
        addr += size as i64;

        if addr - entry_point as i64 > PROGRAM_SIZE_CAP as i64 {
            return Err(Diagnostic::new(
                Kind::ProgramTooLarge(format!(
                    "program exceeds the {} byte size cap",
                    PROGRAM_SIZE_CAP
                )),
                "",
                0,
            ));
        }
    }

    Ok(out)
}

#[cfg(test)]
mod test {
    use super::*;

    fn mk(mnemonic: &str, operands: &[&str], file: &str, line: u32) -> (Instr, String, u32) {
        (
            (mnemonic.to_owned(), operands.iter().map(|s| s.to_string()).collect()),
            file.to_owned(),
            line,
        )
    }

    #[test]
    fn labels_get_the_address_of_the_following_instruction() {
        let mut symtab = SymbolTable::new(vec![], "main");
        let lines = vec![
            mk("main:", &[], "a.s", 1),
            mk("halt", &[], "a.s", 2),
        ];
        layout(&lines, &mut symtab, false, 0x2000).unwrap();
        assert_eq!(symtab.label_addr("main", "a.s", None, 1).unwrap(), "8192");
    }

    #[test]
    fn generic_pseudo_op_reserves_two_words_by_default() {
        let mut symtab = SymbolTable::new(vec![], "main");
        let lines = vec![
            mk("mov", &["r1", "somewhere"], "a.s", 1),
            mk("halt", &[], "a.s", 2),
        ];
        let sized = layout(&lines, &mut symtab, false, 0x2000).unwrap();
        assert_eq!(sized[0].size, 8);
        assert_eq!(sized[1].address, 0x2000 + 8);
    }

    #[test]
    fn one_op_mode_reserves_a_single_word() {
        let mut symtab = SymbolTable::new(vec![], "main");
        let lines = vec![
            mk("mov", &["r1", "somewhere"], "a.s", 1),
            mk("halt", &[], "a.s", 2),
        ];
        let sized = layout(&lines, &mut symtab, true, 0x2000).unwrap();
        assert_eq!(sized[0].size, 4);
        assert_eq!(sized[1].address, 0x2000 + 4);
    }

    #[test]
    fn dot_int_reserves_four_bytes_per_count() {
        let mut symtab = SymbolTable::new(vec![], "main");
        let lines = vec![mk(".int", &["0xdeadbeef", "2"], "a.s", 1)];
        let sized = layout(&lines, &mut symtab, false, 0x2000).unwrap();
        assert_eq!(sized[0].size, 8);
    }

    #[test]
    fn dot_align_emits_a_space_entry_for_the_padding() {
        let mut symtab = SymbolTable::new(vec![], "main");
        let lines = vec![
            mk("add", &["r1", "r1", "r1", "0"], "a.s", 1),
            mk("add", &["r1", "r1", "r1", "0"], "a.s", 2),
            mk("add", &["r1", "r1", "r1", "0"], "a.s", 3),
            mk(".align", &["16"], "a.s", 4),
            mk("halt", &[], "a.s", 5),
        ];
        let sized = layout(&lines, &mut symtab, false, 0x2000).unwrap();
        assert_eq!(sized.len(), 5);
        assert_eq!(sized[3].mnemonic, ".space");
        assert_eq!(sized[3].size, 4);
        assert_eq!(sized[3].address, 0x2000 + 12);
        assert_eq!(sized[4].address, 0x2000 + 16);
    }

    #[test]
    fn dot_align_is_a_no_op_when_already_aligned() {
        let mut symtab = SymbolTable::new(vec![], "main");
        let lines = vec![mk(".align", &["4"], "a.s", 1), mk("halt", &[], "a.s", 2)];
        let sized = layout(&lines, &mut symtab, false, 0x2000).unwrap();
        assert_eq!(sized.len(), 1);
        assert_eq!(sized[0].address, 0x2000);
    }

    #[test]
    fn dot_align_rejects_a_non_power_of_two() {
        let mut symtab = SymbolTable::new(vec![], "main");
        let lines = vec![mk(".align", &["6"], "a.s", 1)];
        let err = layout(&lines, &mut symtab, false, 0x2000).unwrap_err();
        assert!(matches!(err.kind, Kind::SyntaxError(_)));
    }

    #[test]
    fn dot_align_rejects_below_the_4_byte_minimum() {
        let mut symtab = SymbolTable::new(vec![], "main");
        let lines = vec![mk(".align", &["2"], "a.s", 1)];
        let err = layout(&lines, &mut symtab, false, 0x2000).unwrap_err();
        assert!(matches!(err.kind, Kind::SyntaxError(_)));
    }

    #[test]
    fn dot_space_reserves_requested_byte_count() {
        let mut symtab = SymbolTable::new(vec![], "main");
        let lines = vec![mk(".space", &["16", "0"], "a.s", 1)];
        let sized = layout(&lines, &mut symtab, false, 0x2000).unwrap();
        assert_eq!(sized[0].size, 16);
    }
}
