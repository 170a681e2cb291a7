//! Final mnemonic-to-bytes dispatch (spec.md §4.6), mirroring
//! `asm.py`'s `code(mnemonic, operands)`. Every operand reaching this
//! module is already fully resolved: registers parse directly, and
//! every immediate/displacement is a plain decimal integer string
//! produced by [`crate::resolve`].

use crate::diag::{Diagnostic, Kind};
use crate::numeric::parse_int;
use isa::encode::{pack_f, pack_i, pack_m, DispMode, EncodeError};
use isa::register::{parse_register, RegisterId, ZERO};
use isa::tags::{
    predictor, Alu3Tag, Alu4Tag, DebugTag, Fpu2Tag, Fpu3Tag, Misc0Op, Misc1Op, Misc2Op, Misc3Op,
    SignModifier, OP_DEBUG, OP_I,
};
use std::str::FromStr;

fn to_diag(e: EncodeError, file: &str, line: u32) -> Diagnostic {
    match e {
        EncodeError::ImmediateTooLarge(v) => Diagnostic::new(
            Kind::ImmediateRangeError(format!("immediate out of range: {}", v)),
            file,
            line,
        ),
        EncodeError::DisplacementTooLarge(v) => Diagnostic::new(
            Kind::DisplacementAlignmentError(format!("displacement out of range: {}", v)),
            file,
            line,
        ),
        EncodeError::DisplacementMisaligned(v) => Diagnostic::new(
            Kind::DisplacementAlignmentError(format!("displacement not word-aligned: {}", v)),
            file,
            line,
        ),
    }
}

fn reg(token: &str, file: &str, line: u32) -> Result<RegisterId, Diagnostic> {
    parse_register(token).map_err(|e| Diagnostic::new(Kind::SyntaxError(e.to_string()), file, line))
}

fn int(token: &str, file: &str, line: u32) -> Result<i64, Diagnostic> {
    parse_int(token).ok_or_else(|| {
        Diagnostic::new(
            Kind::ExprEvalError(format!("expected resolved integer, found '{}'", token)),
            file,
            line,
        )
    })
}

/// Split a mnemonic into its base form and an optional `.`-joined
/// suffix (FPU sign modifier) or trailing `+`/`-` (branch predictor).
fn split_suffix(mnemonic: &str) -> (&str, &str) {
    if let Some(base) = mnemonic.strip_suffix('+') {
        return (base, "+");
    }
    if let Some(base) = mnemonic.strip_suffix('-') {
        return (base, "-");
    }
    match mnemonic.split_once('.') {
        Some((base, suffix)) => (base, suffix),
        None => (mnemonic, ""),
    }
}

/// Encode one fully-resolved instruction or data line to its final
/// byte representation.
pub fn encode(mnemonic: &str, operands: &[String], file: &str, line: u32) -> Result<Vec<u8>, Diagnostic> {
    match mnemonic {
        ".byte" => {
            return operands
                .iter()
                .map(|o| {
                    let v = int(o, file, line)?;
                    if !(-128..=255).contains(&v) {
                        return Err(Diagnostic::new(
                            Kind::ImmediateRangeError(format!("immediate value too large: {}", o)),
                            file,
                            line,
                        ));
                    }
                    Ok(v as i8 as u8)
                })
                .collect();
        }
        ".int" => {
            let v = int(&operands[0], file, line)?;
            let count = int(&operands[1], file, line)?.max(0) as usize;
            let word = (v as i32).to_le_bytes();
            let mut out = Vec::with_capacity(word.len() * count);
            for _ in 0..count {
                out.extend_from_slice(&word);
            }
            return Ok(out);
        }
        ".space" => {
            let count = int(&operands[0], file, line)? as usize;
            let fill_val = int(&operands[1], file, line)?;
            if !(-128..=255).contains(&fill_val) {
                return Err(Diagnostic::new(
                    Kind::ImmediateRangeError(format!("immediate value too large: {}", operands[1])),
                    file,
                    line,
                ));
            }
            return Ok(vec![fill_val as i8 as u8; count]);
        }
        _ => {}
    }

    let (base, suffix) = split_suffix(mnemonic);

    if let Ok(tag) = Alu4Tag::from_str(base) {
        let rd = reg(&operands[0], file, line)?;
        let ra = reg(&operands[1], file, line)?;
        let rb = reg(&operands[2], file, line)?;
        let imm = int(&operands[3], file, line)?;
        return pack_i(OP_I, rd, ra, rb, imm, tag.tag())
            .map(|w| w.to_vec())
            .map_err(|e| to_diag(e, file, line));
    }
    if let Ok(tag) = Alu3Tag::from_str(base) {
        let rd = reg(&operands[0], file, line)?;
        let ra = reg(&operands[1], file, line)?;
        let rb = reg(&operands[2], file, line)?;
        return pack_i(OP_I, rd, ra, rb, 0, tag.tag())
            .map(|w| w.to_vec())
            .map_err(|e| to_diag(e, file, line));
    }
    if let Ok(tag) = Fpu2Tag::from_str(base) {
        let rd = reg(&operands[0], file, line)?;
        let rs = reg(&operands[1], file, line)?;
        let sign = SignModifier::from_str(suffix).unwrap_or(SignModifier::None);
        return Ok(pack_f(rd, rs, ZERO, sign.tag(), tag.tag()).to_vec());
    }
    if let Ok(tag) = Fpu3Tag::from_str(base) {
        let rd = reg(&operands[0], file, line)?;
        let ra = reg(&operands[1], file, line)?;
        let rb = reg(&operands[2], file, line)?;
        let sign = SignModifier::from_str(suffix).unwrap_or(SignModifier::None);
        return Ok(pack_f(rd, ra, rb, sign.tag(), tag.tag()).to_vec());
    }
    if let Ok(tag) = DebugTag::from_str(base) {
        let imm = int(&operands[0], file, line)?;
        return pack_i(OP_DEBUG, ZERO, ZERO, ZERO, imm, tag.tag())
            .map(|w| w.to_vec())
            .map_err(|e| to_diag(e, file, line));
    }
    if Misc0Op::from_str(base).is_ok() {
        let op = Misc0Op::from_str(base).unwrap().tag();
        return pack_m(op, ZERO, ZERO, 0, 0, DispMode::Raw16)
            .map(|w| w.to_vec())
            .map_err(|e| to_diag(e, file, line));
    }
    if Misc1Op::from_str(base).is_ok() {
        let op = Misc1Op::from_str(base).unwrap().tag();
        let rs = reg(&operands[0], file, line)?;
        let pred = predictor(mnemonic);
        return pack_m(op, ZERO, rs, pred, 0, DispMode::Raw16)
            .map(|w| w.to_vec())
            .map_err(|e| to_diag(e, file, line));
    }
    if let Ok(tag) = Misc2Op::from_str(base) {
        let rd = reg(&operands[0], file, line)?;
        let disp = int(&operands[1], file, line)?;
        let (mode, pred) = match tag {
            Misc2Op::Ldl => (DispMode::Raw16, 0),
            Misc2Op::Jl => (DispMode::Signed18Word, predictor(mnemonic)),
        };
        return pack_m(tag.tag(), rd, ZERO, pred, disp, mode)
            .map(|w| w.to_vec())
            .map_err(|e| to_diag(e, file, line));
    }
    if let Ok(tag) = Misc3Op::from_str(base) {
        let rx = reg(&operands[0], file, line)?;
        let ra = reg(&operands[1], file, line)?;
        let disp = int(&operands[2], file, line)?;
        let (mode, pred) = match tag {
            Misc3Op::Ldh => (DispMode::Raw16, 0),
            Misc3Op::St | Misc3Op::Ld => (DispMode::Signed18Word, 0),
            Misc3Op::Stb | Misc3Op::Ldb => (DispMode::Signed16, 0),
            Misc3Op::Bne | Misc3Op::Beq => (DispMode::Signed18Word, predictor(mnemonic)),
        };
        return pack_m(tag.tag(), rx, ra, pred, disp, mode)
            .map(|w| w.to_vec())
            .map_err(|e| to_diag(e, file, line));
    }

    Err(Diagnostic::new(
        Kind::UnknownMnemonic(format!("unknown mnemonic: {}", mnemonic)),
        file,
        line,
    ))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn add_three_registers() {
        let bytes =
            encode("add", &["r1".into(), "r2".into(), "r3".into(), "0".into()], "a.s", 1).unwrap();
        assert_eq!(bytes.len(), 4);
    }

    #[test]
    fn add_with_nonzero_immediate_is_encoded() {
        let bytes =
            encode("add", &["r1".into(), "r2".into(), "r0".into(), "5".into()], "a.s", 1).unwrap();
        assert_eq!(bytes[0], 5u8 << 5);
    }

    #[test]
    fn halt_self_loop_matches_ground_truth() {
        let bytes = encode("beq+", &["r31".into(), "r31".into(), "-4".into()], "a.s", 1).unwrap();
        assert_eq!(bytes, vec![0xff, 0xff, 0xff, 0xff]);
    }

    #[test]
    fn dot_int_is_little_endian() {
        let bytes = encode(".int", &["1".into(), "1".into()], "a.s", 1).unwrap();
        assert_eq!(bytes, vec![1, 0, 0, 0]);
    }

    #[test]
    fn dot_int_repeats_the_word_count_times() {
        let bytes = encode(".int", &[0xDEADBEEFu32.to_string(), "2".into()], "a.s", 1).unwrap();
        assert_eq!(bytes, vec![0xef, 0xbe, 0xad, 0xde, 0xef, 0xbe, 0xad, 0xde]);
    }

    #[test]
    fn dot_space_fills_with_requested_byte() {
        let bytes = encode(".space", &["3".into(), "0xff".into()], "a.s", 1).unwrap();
        assert_eq!(bytes, vec![0xff, 0xff, 0xff]);
    }

    #[test]
    fn unknown_mnemonic_is_an_error() {
        assert!(encode("frobnicate", &[], "a.s", 1).is_err());
    }

    #[test]
    fn jr_sets_unconditional_predictor() {
        let bytes = encode("jr", &["r28".into()], "a.s", 1).unwrap();
        assert_eq!(bytes[2] & 0b11, 3);
    }
}
