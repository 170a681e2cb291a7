//! Macro expander (spec.md §4.2): turns one post-lexed `(mnemonic,
//! operands)` line into zero or more machine-level instruction lines.
//! Every function here mirrors the `expand_*` function of the same
//! name in `asm.py`; `expand` is `asm.py`'s `expand_macro` dispatcher.
//!
//! Expansion never touches the symbol table: label operands pass
//! through as opaque strings and are resolved later by
//! [`crate::layout`]/[`crate::resolve`]. The only thing distinguishing
//! a register from an immediate-or-label operand at this stage is
//! [`isa::register::is_register`].

use crate::diag::{Diagnostic, Kind};
use crate::numeric::{check_int_range, to_hex_operand};
use crate::numeric::parse_int;
use isa::register::is_register;

/// One expanded instruction line, still in text form.
pub type Instr = (String, Vec<String>);

fn instr(mnemonic: &str, operands: &[&str]) -> Instr {
    (mnemonic.to_owned(), operands.iter().map(|s| s.to_string()).collect())
}

fn err(msg: impl Into<String>, file: &str, line: u32) -> Diagnostic {
    Diagnostic::new(Kind::SyntaxError(msg.into()), file, line)
}

fn need(operands: &[String], n: usize, mnemonic: &str, file: &str, line: u32) -> Result<(), Diagnostic> {
    need_range(operands, n, n, mnemonic, file, line)
}

fn need_range(
    operands: &[String],
    min: usize,
    max: usize,
    mnemonic: &str,
    file: &str,
    line: u32,
) -> Result<(), Diagnostic> {
    if operands.len() >= min && operands.len() <= max {
        Ok(())
    } else {
        Err(Diagnostic::new(
            Kind::OperandCountError(format!(
                "'{}' expects {} operand(s), got {}",
                mnemonic,
                if min == max { min.to_string() } else { format!("{}-{}", min, max) },
                operands.len()
            )),
            file,
            line,
        ))
    }
}

/// Load an arbitrary 32-bit immediate into `dest`: a single `ldl` when
/// the value fits a signed 16-bit field, a single `ldh` when the low
/// half is all zero, otherwise an `ldl`/`ldh` pair.
pub fn mov_imm(dest: &str, imm: i64, file: &str, line: u32) -> Result<Vec<Instr>, Diagnostic> {
    if check_int_range(imm, 16) {
        return Ok(vec![instr("ldl", &[dest, &imm.to_string()])]);
    }
    if !(-0x8000_0000i64..=0xffff_ffffi64).contains(&imm) {
        return Err(err(
            format!("immediate value too large: {}", to_hex_operand(imm)),
            file,
            line,
        ));
    }
    if imm & 0xffff == 0 {
        return Ok(vec![instr("ldh", &[dest, "r0", &to_hex_operand((imm >> 16) & 0xffff)])]);
    }
    Ok(vec![
        instr("ldl", &[dest, &to_hex_operand(imm & 0xffff)]),
        instr("ldh", &[dest, dest, &to_hex_operand((imm >> 16) & 0xffff)]),
    ])
}

/// Convert an f64 literal to the bit pattern of its nearest f32,
/// mirroring `asm.py`'s `float_to_bit` (which rejects values that
/// overflow a 32-bit float).
fn float_to_bit(f: f64, file: &str, line: u32) -> Result<i64, Diagnostic> {
    let v = f as f32;
    if v.is_infinite() && !f.is_infinite() {
        return Err(err("floating point value is too large", file, line));
    }
    Ok(v.to_bits() as i64)
}

/// Parse a bracketed memory-access operand (`[reg]`, `[reg+disp]`,
/// `[reg-disp]`, `[+-imm]`) into a base register and a constant
/// displacement. Mirrors `asm.py`'s `parse_memaccess`; `operand` must
/// include the surrounding brackets.
fn parse_memaccess(operand: &str) -> Option<(String, i64)> {
    fn is_word_char(c: char) -> bool {
        c.is_ascii_alphanumeric() || c == '_'
    }

    if !(operand.starts_with('[') && operand.ends_with(']')) {
        return None;
    }
    let inner = operand[1..operand.len() - 1].trim();

    if let Some(op_idx) = inner.find(['+', '-']) {
        let base = inner[..op_idx].trim();
        let negative = &inner[op_idx..op_idx + 1] == "-";
        let rest = inner[op_idx + 1..].trim();
        if base.len() > 1
            && base.starts_with('r')
            && base[1..].chars().all(is_word_char)
            && !rest.is_empty()
            && rest.chars().all(is_word_char)
        {
            let disp_str = if negative { format!("-{}", rest) } else { rest.to_owned() };
            if let (Some(disp), true) = (parse_int(&disp_str), is_register(base)) {
                return Some((base.to_owned(), disp));
            }
        }
    }

    if inner.len() > 1 && inner.starts_with('r') && inner[1..].chars().all(is_word_char) && is_register(inner) {
        return Some((inner.to_owned(), 0));
    }

    let (sign, rest) = if let Some(r) = inner.strip_prefix('+') {
        ("", r.trim_start())
    } else if let Some(r) = inner.strip_prefix('-') {
        ("-", r.trim_start())
    } else {
        ("", inner)
    };
    if !rest.is_empty() && rest.chars().all(is_word_char) {
        if let Some(disp) = parse_int(&format!("{}{}", sign, rest)) {
            return Some(("r0".to_owned(), disp));
        }
    }

    None
}

fn biased_hi_lo(disp: i64) -> (i64, i64) {
    let biased = disp + 0x8000;
    (biased & !0xffffi64, (biased & 0xffff) - 0x8000)
}

pub fn expand_nop(operands: &[String], file: &str, line: u32) -> Result<Vec<Instr>, Diagnostic> {
    need(operands, 0, "nop", file, line)?;
    Ok(vec![instr("add", &["r0", "r0", "r0", "0"])])
}

fn expand_mov_load(dest: &str, src: &str, file: &str, line: u32) -> Result<Vec<Instr>, Diagnostic> {
    match parse_memaccess(src) {
        None => {
            let label = src[1..src.len() - 1].trim();
            Ok(vec![instr("ld", &[dest, label])])
        }
        Some((base, disp)) => {
            if check_int_range(disp, 18) {
                return Ok(vec![instr("ld", &[dest, &base, &disp.to_string()])]);
            }
            let hi = disp & !0xffffi64;
            let lo = disp & 0xffff;
            let mut out = mov_imm("r29", hi, file, line)?;
            if base != "r0" {
                out.push(instr("add", &["r29", &base, "r29", "0"]));
            }
            out.push(instr("ld", &[dest, "r29", &lo.to_string()]));
            Ok(out)
        }
    }
}

fn expand_mov_store(dest: &str, src: &str, file: &str, line: u32) -> Result<Vec<Instr>, Diagnostic> {
    match parse_memaccess(dest) {
        None => {
            let label = dest[1..dest.len() - 1].trim();
            Ok(vec![instr("st", &[src, label])])
        }
        Some((base, disp)) => {
            if check_int_range(disp, 18) {
                let (d, mut out) = if is_register(src) {
                    (src.to_owned(), Vec::new())
                } else {
                    (
                        "r29".to_owned(),
                        expand_mov(&["r29".to_owned(), src.to_owned()], file, line)?,
                    )
                };
                out.push(instr("st", &[&d, &base, &disp.to_string()]));
                return Ok(out);
            }
            let hi = disp & !0xffffi64;
            let lo = disp & 0xffff;
            let mut out = mov_imm("r29", hi, file, line)?;
            if base != "r0" {
                out.push(instr("add", &["r29", &base, "r29", "0"]));
            }
            out.push(instr("st", &[src, "r29", &lo.to_string()]));
            Ok(out)
        }
    }
}

/// `mov dest, src` — register move, bracketed memory access, immediate
/// load, float load, or a label expression passed through to the
/// layout/resolve passes.
pub fn expand_mov(operands: &[String], file: &str, line: u32) -> Result<Vec<Instr>, Diagnostic> {
    need(operands, 2, "mov", file, line)?;
    let dest = operands[0].clone();
    let src = operands[1].clone();

    if is_register(&dest) && is_register(&src) {
        return Ok(vec![instr("add", &[&dest, &src, "r0", "0"])]);
    }
    if src.starts_with('[') && src.ends_with(']') {
        return expand_mov_load(&dest, &src, file, line);
    }
    if dest.starts_with('[') && dest.ends_with(']') {
        return expand_mov_store(&dest, &src, file, line);
    }
    if let Some(imm) = parse_int(&src) {
        return mov_imm(&dest, imm, file, line);
    }
    if let Ok(f) = src.parse::<f64>() {
        let bits = float_to_bit(f, file, line)?;
        return mov_imm(&dest, bits, file, line);
    }
    if is_register(&dest) {
        return Ok(vec![("mov".to_owned(), operands.to_vec())]);
    }
    Err(err("invalid syntax", file, line))
}

fn expand_movb_load(dest: &str, src: &str, file: &str, line: u32) -> Result<Vec<Instr>, Diagnostic> {
    match parse_memaccess(src) {
        None => {
            let label = src[1..src.len() - 1].trim();
            Ok(vec![instr("ldb", &[dest, label])])
        }
        Some((base, disp)) => {
            if check_int_range(disp, 16) {
                return Ok(vec![instr("ldb", &[dest, &base, &disp.to_string()])]);
            }
            let (hi, lo) = biased_hi_lo(disp);
            let mut out = mov_imm("r29", hi, file, line)?;
            if base != "r0" {
                out.push(instr("add", &["r29", &base, "r29", "0"]));
            }
            out.push(instr("ldb", &[dest, "r29", &lo.to_string()]));
            Ok(out)
        }
    }
}

fn expand_movb_store(dest: &str, src: &str, file: &str, line: u32) -> Result<Vec<Instr>, Diagnostic> {
    match parse_memaccess(dest) {
        None => {
            let label = dest[1..dest.len() - 1].trim();
            Ok(vec![instr("stb", &[src, label])])
        }
        Some((base, disp)) => {
            if check_int_range(disp, 16) {
                let (d, mut out) = if is_register(src) {
                    (src.to_owned(), Vec::new())
                } else {
                    (
                        "r29".to_owned(),
                        expand_mov(&["r29".to_owned(), src.to_owned()], file, line)?,
                    )
                };
                out.push(instr("stb", &[&d, &base, &disp.to_string()]));
                return Ok(out);
            }
            let (hi, lo) = biased_hi_lo(disp);
            let mut out = mov_imm("r29", hi, file, line)?;
            if base != "r0" {
                out.push(instr("add", &["r29", &base, "r29", "0"]));
            }
            out.push(instr("stb", &[src, "r29", &lo.to_string()]));
            Ok(out)
        }
    }
}

/// `movb dest, src` — byte-sized move, only meaningful between a
/// register and a bracketed memory operand.
pub fn expand_movb(operands: &[String], file: &str, line: u32) -> Result<Vec<Instr>, Diagnostic> {
    need(operands, 2, "movb", file, line)?;
    let dest = operands[0].clone();
    let src = operands[1].clone();
    if src.starts_with('[') && src.ends_with(']') {
        return expand_movb_load(&dest, &src, file, line);
    }
    if dest.starts_with('[') && dest.ends_with(']') {
        return expand_movb_store(&dest, &src, file, line);
    }
    Err(err("movb only supports move between register and memory", file, line))
}

/// Three-register ALU form (`add rd, rs, rt`) vs four-operand form with
/// an immediate last operand, staged through `r29` when it doesn't fit
/// the 8-bit immediate field.
pub fn expand_alu(mnemonic: &str, operands: &[String], file: &str, line: u32) -> Result<Vec<Instr>, Diagnostic> {
    need_range(operands, 3, 4, mnemonic, file, line)?;
    if operands.len() == 4 {
        return Ok(vec![(mnemonic.to_owned(), operands.to_vec())]);
    }
    if is_register(&operands[2]) {
        let mut ops = operands.to_vec();
        ops.push("0".to_owned());
        return Ok(vec![(mnemonic.to_owned(), ops)]);
    }
    let imm = parse_int(&operands[2])
        .ok_or_else(|| err(format!("expected register or immediate value: {}", operands[2]), file, line))?;
    if check_int_range(imm, 8) {
        return Ok(vec![instr(mnemonic, &[&operands[0], &operands[1], "r0", &operands[2]])]);
    }
    let mut out = mov_imm("r29", imm, file, line)?;
    out.push(instr(mnemonic, &[&operands[0], &operands[1], "r29", "0"]));
    Ok(out)
}

pub fn expand_neg(operands: &[String], file: &str, line: u32) -> Result<Vec<Instr>, Diagnostic> {
    need(operands, 2, "neg", file, line)?;
    Ok(vec![instr("sub", &[&operands[0], "r0", &operands[1], "0"])])
}

pub fn expand_not(operands: &[String], file: &str, line: u32) -> Result<Vec<Instr>, Diagnostic> {
    need(operands, 2, "not", file, line)?;
    Ok(vec![instr("xor", &[&operands[0], &operands[1], "r0", "-1"])])
}

/// `and rd, rs, rt-or-imm` — the immediate form reuses `rs` as the
/// all-ones seed when the mask doesn't fit 8 bits, same as `expand_alu`
/// but with `-1` as the fallback immediate instead of `0`.
pub fn expand_and(operands: &[String], file: &str, line: u32) -> Result<Vec<Instr>, Diagnostic> {
    need_range(operands, 3, 4, "and", file, line)?;
    if operands.len() == 4 {
        return Ok(vec![("and".to_owned(), operands.to_vec())]);
    }
    if is_register(&operands[2]) {
        let mut ops = operands.to_vec();
        ops.push("-1".to_owned());
        return Ok(vec![("and".to_owned(), ops)]);
    }
    let imm = parse_int(&operands[2])
        .ok_or_else(|| err(format!("expected register or immediate value: {}", operands[2]), file, line))?;
    if check_int_range(imm, 8) {
        return Ok(vec![instr("and", &[&operands[0], &operands[1], &operands[1], &operands[2]])]);
    }
    let mut out = mov_imm("r29", imm, file, line)?;
    out.push(instr("and", &[&operands[0], &operands[1], "r29", "-1"]));
    Ok(out)
}

pub fn expand_sextb(operands: &[String], file: &str, line: u32) -> Result<Vec<Instr>, Diagnostic> {
    need(operands, 2, "sextb", file, line)?;
    Ok(vec![
        instr("shl", &["r29", &operands[1], "r0", "24"]),
        instr("sar", &[&operands[0], "r29", "r0", "24"]),
    ])
}

pub fn expand_sextw(operands: &[String], file: &str, line: u32) -> Result<Vec<Instr>, Diagnostic> {
    need(operands, 2, "sextw", file, line)?;
    Ok(vec![
        instr("shl", &["r29", &operands[1], "r0", "16"]),
        instr("sar", &[&operands[0], "r29", "r0", "16"]),
    ])
}

pub fn expand_zextb(operands: &[String], file: &str, line: u32) -> Result<Vec<Instr>, Diagnostic> {
    need(operands, 2, "zextb", file, line)?;
    Ok(vec![
        instr("shl", &["r29", &operands[1], "r0", "24"]),
        instr("shr", &[&operands[0], "r29", "r0", "24"]),
    ])
}

/// `zextw` has a direct single-instruction encoding: `ldh` zero-fills
/// the low half when the source supplies only the low 16 bits.
pub fn expand_zextw(operands: &[String], file: &str, line: u32) -> Result<Vec<Instr>, Diagnostic> {
    need(operands, 2, "zextw", file, line)?;
    Ok(vec![instr("ldh", &[&operands[0], &operands[1], "0"])])
}

/// `cmpgt`/`cmpge` have no direct tag; they're `cmplt`/`cmple` with the
/// comparison operands swapped.
pub fn expand_cmpgt(operands: &[String], file: &str, line: u32) -> Result<Vec<Instr>, Diagnostic> {
    need(operands, 3, "cmpgt", file, line)?;
    if is_register(&operands[2]) {
        return Ok(vec![instr("cmplt", &[&operands[0], &operands[2], &operands[1], "0"])]);
    }
    let imm = parse_int(&operands[2])
        .ok_or_else(|| err(format!("expected register or immediate value: {}", operands[2]), file, line))?;
    let mut out = mov_imm("r29", imm, file, line)?;
    out.push(instr("cmplt", &[&operands[0], "r29", &operands[1], "0"]));
    Ok(out)
}

pub fn expand_cmpge(operands: &[String], file: &str, line: u32) -> Result<Vec<Instr>, Diagnostic> {
    need(operands, 3, "cmpge", file, line)?;
    if is_register(&operands[2]) {
        return Ok(vec![instr("cmple", &[&operands[0], &operands[2], &operands[1], "0"])]);
    }
    let imm = parse_int(&operands[2])
        .ok_or_else(|| err(format!("expected register or immediate value: {}", operands[2]), file, line))?;
    let mut out = mov_imm("r29", imm, file, line)?;
    out.push(instr("cmple", &[&operands[0], "r29", &operands[1], "0"]));
    Ok(out)
}

pub fn expand_fcmpgt(operands: &[String], file: &str, line: u32) -> Result<Vec<Instr>, Diagnostic> {
    need(operands, 3, "fcmpgt", file, line)?;
    Ok(vec![instr("fcmplt", &[&operands[0], &operands[2], &operands[1]])])
}

pub fn expand_fcmpge(operands: &[String], file: &str, line: u32) -> Result<Vec<Instr>, Diagnostic> {
    need(operands, 3, "fcmpge", file, line)?;
    Ok(vec![instr("fcmple", &[&operands[0], &operands[2], &operands[1]])])
}

/// Polls a memory-mapped status word until its low bit clears, then
/// reads the data word. Ground-truth MMIO addresses `0x8000`/`0x1000`.
pub fn expand_read(operands: &[String], file: &str, line: u32) -> Result<Vec<Instr>, Diagnostic> {
    need(operands, 1, "read", file, line)?;
    let dest = &operands[0];
    Ok(vec![
        instr("ldh", &["r29", "r0", "0x8000"]),
        instr("ld", &[dest, "r29", "0x1000"]),
        instr("cmplt", &["r29", dest, "r0", "0"]),
        instr("bne", &["r29", "r0", "-16"]),
    ])
}

/// `write rs` (single register's value) or `write rs, "literal"` (each
/// byte staged through `rs` in turn).
pub fn expand_write(operands: &[String], file: &str, line: u32) -> Result<Vec<Instr>, Diagnostic> {
    need_range(operands, 1, 2, "write", file, line)?;
    if operands.len() == 1 {
        return Ok(vec![
            instr("ldh", &["r29", "r0", "0x8000"]),
            instr("st", &[&operands[0], "r29", "0x1000"]),
        ]);
    }
    let text = crate::numeric::unescape_string(&operands[1])
        .ok_or_else(|| err(format!("malformed string literal: {}", operands[1]), file, line))?;
    let mut out = vec![instr("ldh", &["r29", "r0", "0x8000"])];
    for byte in text.bytes() {
        out.extend(mov_imm(&operands[0], byte as i64, file, line)?);
        out.push(instr("st", &[&operands[0], "r29", "0x1000"]));
    }
    Ok(out)
}

pub fn expand_br(operands: &[String], file: &str, line: u32) -> Result<Vec<Instr>, Diagnostic> {
    need(operands, 1, "br", file, line)?;
    Ok(vec![instr("jl", &["r29", &operands[0]])])
}

pub fn expand_bz(operands: &[String], pred: &str, file: &str, line: u32) -> Result<Vec<Instr>, Diagnostic> {
    need(operands, 2, "bz", file, line)?;
    Ok(vec![instr(&format!("beq{}", pred), &[&operands[0], "r0", &operands[1]])])
}

pub fn expand_bnz(operands: &[String], pred: &str, file: &str, line: u32) -> Result<Vec<Instr>, Diagnostic> {
    need(operands, 2, "bnz", file, line)?;
    Ok(vec![instr(&format!("bne{}", pred), &[&operands[0], "r0", &operands[1]])])
}

/// `bne rs, rt-or-imm, label`: when the middle operand is an immediate
/// it's staged through `r29` first, otherwise the operands (register or
/// otherwise) pass through unchanged.
pub fn expand_bne(
    mnemonic: &str,
    operands: &[String],
    pred: &str,
    file: &str,
    line: u32,
) -> Result<Vec<Instr>, Diagnostic> {
    need(operands, 3, mnemonic, file, line)?;
    if let Some(imm) = parse_int(&operands[1]) {
        let mut out = mov_imm("r29", imm, file, line)?;
        out.push(instr(&format!("{}{}", mnemonic, pred), &[&operands[0], "r29", &operands[2]]));
        return Ok(out);
    }
    Ok(vec![instr(
        &format!("{}{}", mnemonic, pred),
        &[&operands[0], &operands[1], &operands[2]],
    )])
}

/// `blt`/`ble`/`bgt`/`bge rs, rt-or-imm, label` synthesize a `cmp` into
/// `r29` followed by a `bne`/`beq` against zero.
pub fn expand_blt(
    mnemonic: &str,
    operands: &[String],
    pred: &str,
    file: &str,
    line: u32,
) -> Result<Vec<Instr>, Diagnostic> {
    need(operands, 3, mnemonic, file, line)?;
    let (branch, cmp) = match mnemonic {
        "bgt" => ("beq", "cmple"),
        "bge" => ("beq", "cmplt"),
        "blt" => ("bne", "cmplt"),
        "ble" => ("bne", "cmple"),
        _ => unreachable!(),
    };
    let mut out = expand_alu(cmp, &["r29".to_owned(), operands[0].clone(), operands[1].clone()], file, line)?;
    out.push(instr(&format!("{}{}", branch, pred), &["r29", "r0", &operands[2]]));
    Ok(out)
}

/// `bfne`/`bfeq`/`bflt`/`bfle`/`bfgt`/`bfge rs, rt, label` — the float
/// comparison analogue of [`expand_blt`].
pub fn expand_bfne(
    mnemonic: &str,
    operands: &[String],
    pred: &str,
    file: &str,
    line: u32,
) -> Result<Vec<Instr>, Diagnostic> {
    need(operands, 3, mnemonic, file, line)?;
    let (branch, cmp) = match mnemonic {
        "bfgt" => ("beq", "fcmple"),
        "bfge" => ("beq", "fcmplt"),
        "bfne" => ("bne", "fcmpne"),
        "bfeq" => ("bne", "fcmpeq"),
        "bflt" => ("bne", "fcmplt"),
        "bfle" => ("bne", "fcmple"),
        _ => unreachable!(),
    };
    Ok(vec![
        instr(cmp, &["r29", &operands[0], &operands[1]]),
        instr(&format!("{}{}", branch, pred), &["r29", "r0", &operands[2]]),
    ])
}

pub fn expand_push(operands: &[String], file: &str, line: u32) -> Result<Vec<Instr>, Diagnostic> {
    need(operands, 1, "push", file, line)?;
    let pre = instr("sub", &["rsp", "rsp", "r0", "4"]);
    if let Some(imm) = parse_int(&operands[0]) {
        let mut out = mov_imm("r29", imm, file, line)?;
        out.push(pre);
        out.push(instr("st", &["r29", "rsp", "0"]));
        return Ok(out);
    }
    Ok(vec![pre, instr("st", &[&operands[0], "rsp", "0"])])
}

pub fn expand_pop(operands: &[String], file: &str, line: u32) -> Result<Vec<Instr>, Diagnostic> {
    need(operands, 1, "pop", file, line)?;
    Ok(vec![
        instr("ld", &[&operands[0], "rsp", "0"]),
        instr("add", &["rsp", "rsp", "r0", "4"]),
    ])
}

/// `call label-or-reg` saves the return address and current frame
/// pointer through `rbp`/`rsp`, then jumps (directly for a label, or
/// indirectly through `r28` for a register target).
pub fn expand_call(operands: &[String], file: &str, line: u32) -> Result<Vec<Instr>, Diagnostic> {
    need(operands, 1, "call", file, line)?;
    let mut out = vec![
        instr("st", &["rbp", "rsp", "-4"]),
        instr("sub", &["rsp", "rsp", "r0", "4"]),
        instr("add", &["rbp", "rsp", "r0", "0"]),
    ];
    if is_register(&operands[0]) {
        out.push(instr("jl", &["r28", "0"]));
        out.push(instr("add", &["r28", "r28", "r0", "8"]));
        out.push(instr("jr", &[&operands[0]]));
    } else {
        out.push(instr("jl", &["r28", &operands[0]]));
    }
    out.push(instr("add", &["rsp", "rbp", "r0", "4"]));
    out.push(instr("ld", &["rbp", "rsp", "-4"]));
    Ok(out)
}

pub fn expand_ret(operands: &[String], file: &str, line: u32) -> Result<Vec<Instr>, Diagnostic> {
    need(operands, 0, "ret", file, line)?;
    Ok(vec![instr("jr", &["r28"])])
}

pub fn expand_enter(operands: &[String], file: &str, line: u32) -> Result<Vec<Instr>, Diagnostic> {
    need_range(operands, 0, 1, "enter", file, line)?;
    let token = operands.first().map(|s| s.as_str()).unwrap_or("0");
    let imm = parse_int(token).ok_or_else(|| err(format!("expected integer literal: {}", token), file, line))?;
    if imm & 3 != 0 {
        return Err(err("immediate value must be a multiple of 4", file, line));
    }
    let mut out = expand_alu(
        "sub",
        &["rsp".to_owned(), "rsp".to_owned(), (imm + 4).to_string()],
        file,
        line,
    )?;
    out.push(instr("st", &["r28", "rsp", "0"]));
    Ok(out)
}

pub fn expand_leave(operands: &[String], file: &str, line: u32) -> Result<Vec<Instr>, Diagnostic> {
    need(operands, 0, "leave", file, line)?;
    Ok(vec![instr("ld", &["r28", "rsp", "0"])])
}

pub fn expand_halt(operands: &[String], file: &str, line: u32) -> Result<Vec<Instr>, Diagnostic> {
    need(operands, 0, "halt", file, line)?;
    Ok(vec![instr("beq+", &["r31", "r31", "-4"])])
}

/// `.int val` or the deprecated two-operand `.int val, count`, which is
/// passed through unchanged (the repeat count is applied at encode
/// time, not by emitting multiple lines here).
pub fn expand_dot_int(operands: &[String], file: &str, line: u32) -> Result<(Vec<Instr>, Option<Diagnostic>), Diagnostic> {
    need_range(operands, 1, 2, ".int", file, line)?;
    if operands.len() == 2 {
        let warning = Diagnostic::new(
            Kind::DeprecatedSyntax("'.int' with 2 operands is deprecated, use '.space' instead".to_owned()),
            file,
            line,
        );
        return Ok((vec![(".int".to_owned(), operands.to_vec())], Some(warning)));
    }
    Ok((vec![instr(".int", &[&operands[0], "1"])], None))
}

/// `.float val` lowers to `.int` carrying the IEEE-754 bit pattern of
/// `val`'s nearest f32 representation.
pub fn expand_dot_float(operands: &[String], file: &str, line: u32) -> Result<Vec<Instr>, Diagnostic> {
    need(operands, 1, ".float", file, line)?;
    let f: f64 = operands[0]
        .parse()
        .map_err(|_| err(format!("expected floating point literal: {}", operands[0]), file, line))?;
    let bits = float_to_bit(f, file, line)?;
    let (out, _) = expand_dot_int(&[bits.to_string()], file, line)?;
    Ok(out)
}

/// `.space count` or `.space count, fill` (default fill `0`).
pub fn expand_dot_space(operands: &[String], file: &str, line: u32) -> Result<Vec<Instr>, Diagnostic> {
    need_range(operands, 1, 2, ".space", file, line)?;
    if operands.len() == 2 {
        return Ok(vec![instr(".space", &[&operands[0], &operands[1]])]);
    }
    Ok(vec![instr(".space", &[&operands[0], "0"])])
}

/// `.string "literal"` lowers to a `.byte` list terminated by a NUL.
pub fn expand_dot_string(operands: &[String], file: &str, line: u32) -> Result<Vec<Instr>, Diagnostic> {
    need(operands, 1, ".string", file, line)?;
    let text = crate::numeric::unescape_string(&operands[0])
        .ok_or_else(|| err(format!("malformed string literal: {}", operands[0]), file, line))?;
    let mut bytes: Vec<String> = text.bytes().map(|b| b.to_string()).collect();
    bytes.push("0".to_owned());
    Ok(vec![(".byte".to_owned(), bytes)])
}

/// Strip a trailing `+`/`-` predictor suffix, mirroring `asm.py`'s
/// `(\w+)([+-]?)$` match in `expand_macro`.
fn split_predicate(mnemonic: &str) -> (&str, &str) {
    if let Some(base) = mnemonic.strip_suffix('+') {
        (base, "+")
    } else if let Some(base) = mnemonic.strip_suffix('-') {
        (base, "-")
    } else {
        (mnemonic, "")
    }
}

/// Dispatch one already-split line through the macro table. `asm.py`'s
/// `expand_macro`: exact mnemonic match first, then the plain ALU
/// mnemonics, then the conditional branch families recognized by
/// stripping a trailing `+`/`-` predictor suffix, then passthrough.
pub fn expand(mnemonic: &str, operands: &[String], file: &str, line: u32) -> Result<(Vec<Instr>, Vec<Diagnostic>), Diagnostic> {
    let mut warnings = Vec::new();
    let out = match mnemonic {
        "nop" => expand_nop(operands, file, line)?,
        "mov" => expand_mov(operands, file, line)?,
        "movb" => expand_movb(operands, file, line)?,
        "and" => expand_and(operands, file, line)?,
        "neg" => expand_neg(operands, file, line)?,
        "not" => expand_not(operands, file, line)?,
        "sextb" => expand_sextb(operands, file, line)?,
        "sextw" => expand_sextw(operands, file, line)?,
        "zextb" => expand_zextb(operands, file, line)?,
        "zextw" => expand_zextw(operands, file, line)?,
        "cmpgt" => expand_cmpgt(operands, file, line)?,
        "cmpge" => expand_cmpge(operands, file, line)?,
        "fcmpgt" => expand_fcmpgt(operands, file, line)?,
        "fcmpge" => expand_fcmpge(operands, file, line)?,
        "read" => expand_read(operands, file, line)?,
        "write" => expand_write(operands, file, line)?,
        "br" => expand_br(operands, file, line)?,
        "push" => expand_push(operands, file, line)?,
        "pop" => expand_pop(operands, file, line)?,
        "call" => expand_call(operands, file, line)?,
        "ret" => expand_ret(operands, file, line)?,
        "enter" => expand_enter(operands, file, line)?,
        "leave" => expand_leave(operands, file, line)?,
        "halt" => expand_halt(operands, file, line)?,
        ".float" => expand_dot_float(operands, file, line)?,
        ".space" => expand_dot_space(operands, file, line)?,
        ".string" => expand_dot_string(operands, file, line)?,
        ".int" => {
            let (out, warning) = expand_dot_int(operands, file, line)?;
            if let Some(w) = warning {
                warnings.push(w);
            }
            out
        }
        "add" | "sub" | "shl" | "shr" | "sar" | "or" | "xor" | "cmpne" | "cmpeq" | "cmplt" | "cmple" => {
            expand_alu(mnemonic, operands, file, line)?
        }
        _ => {
            let (base, pred) = split_predicate(mnemonic);
            match base {
                "bz" => expand_bz(operands, pred, file, line)?,
                "bnz" => expand_bnz(operands, pred, file, line)?,
                "bne" | "beq" => expand_bne(base, operands, pred, file, line)?,
                "blt" | "ble" | "bgt" | "bge" => expand_blt(base, operands, pred, file, line)?,
                "bfne" | "bfeq" | "bflt" | "bfle" | "bfgt" | "bfge" => expand_bfne(base, operands, pred, file, line)?,
                _ => vec![(mnemonic.to_owned(), operands.to_vec())],
            }
        }
    };
    Ok((out, warnings))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn mov_register_to_register_is_a_plain_add() {
        let out = expand_mov(&["r1".into(), "r2".into()], "a.s", 1).unwrap();
        assert_eq!(out, vec![instr("add", &["r1", "r2", "r0", "0"])]);
    }

    #[test]
    fn mov_small_immediate_is_a_single_ldl() {
        let out = mov_imm("r1", 100, "a.s", 1).unwrap();
        assert_eq!(out, vec![instr("ldl", &["r1", "100"])]);
    }

    #[test]
    fn mov_large_immediate_needs_both_halves_ldl_then_ldh() {
        let out = mov_imm("r1", 0x1234_5678, "a.s", 1).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].0, "ldl");
        assert_eq!(out[1].0, "ldh");
    }

    #[test]
    fn mov_out_of_range_immediate_is_rejected() {
        assert!(mov_imm("r1", 0x1_0000_0000, "a.s", 1).is_err());
    }

    #[test]
    fn mov_bracket_load_with_small_displacement_is_a_single_ld() {
        let out = expand_mov(&["r1".into(), "[r2+4]".into()], "a.s", 1).unwrap();
        assert_eq!(out, vec![instr("ld", &["r1", "r2", "4"])]);
    }

    #[test]
    fn mov_bracket_load_without_base_register_falls_back_to_a_label() {
        let out = expand_mov(&["r1".into(), "[buffer]".into()], "a.s", 1).unwrap();
        assert_eq!(out, vec![instr("ld", &["r1", "buffer"])]);
    }

    #[test]
    fn mov_bracket_store_stages_a_non_register_source() {
        let out = expand_mov(&["[r2+4]".into(), "5".into()], "a.s", 1).unwrap();
        assert_eq!(out.last().unwrap().0, "st");
    }

    #[test]
    fn movb_requires_a_memory_operand() {
        assert!(expand_movb(&["r1".into(), "r2".into()], "a.s", 1).is_err());
    }

    #[test]
    fn movb_load_with_small_displacement_is_a_single_ldb() {
        let out = expand_movb(&["r1".into(), "[r2-8]".into()], "a.s", 1).unwrap();
        assert_eq!(out, vec![instr("ldb", &["r1", "r2", "-8"])]);
    }

    #[test]
    fn halt_synthesizes_predicted_infinite_loop() {
        let out = expand_halt(&[], "a.s", 1).unwrap();
        assert_eq!(out, vec![instr("beq+", &["r31", "r31", "-4"])]);
    }

    #[test]
    fn alu_with_small_immediate_fits_the_8_bit_field_directly() {
        let out = expand_alu("add", &["r1".into(), "r2".into(), "5".into()], "a.s", 1).unwrap();
        assert_eq!(out, vec![instr("add", &["r1", "r2", "r0", "5"])]);
    }

    #[test]
    fn alu_with_large_immediate_stages_through_scratch_register() {
        let out = expand_alu("add", &["r1".into(), "r2".into(), "1000".into()], "a.s", 1).unwrap();
        assert_eq!(out.last().unwrap().0, "add");
        assert_eq!(out.last().unwrap().1, vec!["r1", "r2", "r29", "0"]);
    }

    #[test]
    fn alu_with_register_third_operand_appends_a_zero_immediate() {
        let out = expand_alu("add", &["r1".into(), "r2".into(), "r3".into()], "a.s", 1).unwrap();
        assert_eq!(out, vec![instr("add", &["r1", "r2", "r3", "0"])]);
    }

    #[test]
    fn and_with_register_mask_appends_a_minus_one_immediate() {
        let out = expand_and(&["r1".into(), "r2".into(), "r3".into()], "a.s", 1).unwrap();
        assert_eq!(out, vec![instr("and", &["r1", "r2", "r3", "-1"])]);
    }

    #[test]
    fn cmpgt_swaps_operands_into_cmplt() {
        let out = expand_cmpgt(&["r1".into(), "r2".into(), "r3".into()], "a.s", 1).unwrap();
        assert_eq!(out, vec![instr("cmplt", &["r1", "r3", "r2", "0"])]);
    }

    #[test]
    fn deprecated_two_operand_dot_int_passes_through_and_warns() {
        let (out, warning) = expand_dot_int(&["5".into(), "3".into()], "a.s", 1).unwrap();
        assert_eq!(out, vec![(".int".to_owned(), vec!["5".to_owned(), "3".to_owned()])]);
        assert!(warning.is_some());
    }

    #[test]
    fn dot_float_lowers_to_dot_int_with_ieee754_bits() {
        let out = expand_dot_float(&["1.0".into()], "a.s", 1).unwrap();
        assert_eq!(out, vec![(".int".to_owned(), vec!["1065353216".to_owned(), "1".to_owned()])]);
    }

    #[test]
    fn dot_string_lowers_to_byte_list_with_trailing_nul() {
        let out = expand_dot_string(&["\"hi\"".into()], "a.s", 1).unwrap();
        assert_eq!(out[0].1, vec!["104", "105", "0"]);
    }

    #[test]
    fn unconditional_plus_suffix_on_bne_still_stages_immediate() {
        let (out, _) = expand("bne+", &["r1".into(), "0".into(), "lbl".into()], "a.s", 1).unwrap();
        assert_eq!(out.last().unwrap().0, "bne+");
    }

    #[test]
    fn predicated_blt_threads_the_suffix_onto_the_branch() {
        let (out, _) = expand("blt+", &["r1".into(), "r2".into(), "lbl".into()], "a.s", 1).unwrap();
        assert_eq!(out.last().unwrap().0, "bne+");
    }

    #[test]
    fn bgt_does_not_swap_its_operands() {
        let out = expand_blt("bgt", &["r1".into(), "r2".into(), "lbl".into()], "", "a.s", 1).unwrap();
        assert_eq!(out[0].1, vec!["r29", "r1", "r2", "0"]);
        assert_eq!(out[0].0, "cmple");
        assert_eq!(out[1].0, "beq");
    }

    #[test]
    fn bfne_uses_the_direct_fcmpne_tag() {
        let out = expand_bfne("bfne", &["r1".into(), "r2".into(), "lbl".into()], "", "a.s", 1).unwrap();
        assert_eq!(out[0], instr("fcmpne", &["r29", "r1", "r2"]));
        assert_eq!(out[1].0, "bne");
    }

    #[test]
    fn call_with_register_target_uses_the_indirect_jump_sequence() {
        let out = expand_call(&["r5".into()], "a.s", 1).unwrap();
        assert!(out.iter().any(|(m, _)| m == "jr"));
    }

    #[test]
    fn enter_rejects_a_frame_size_not_a_multiple_of_four() {
        assert!(expand_enter(&["3".into()], "a.s", 1).is_err());
    }
}
