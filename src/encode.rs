//! Bit-exact 4-byte instruction packers for the I/F/M instruction
//! families (spec.md §3). Ported byte-for-byte from `asm.py`'s
//! `code_i`/`code_f`/`code_m`, which is the latest (little-endian,
//! `op` in the high nibble of the most significant byte) of the two
//! historical layouts mentioned in spec.md §9.
//!
//! This module knows nothing about mnemonics, macros, or labels — it is
//! the pure "given already-resolved fields, produce 4 bytes" layer that
//! `asm::encode` dispatches into.

use crate::register::RegisterId;
use std::fmt;

/// Displacement encoding discipline for the M family (spec.md §3).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispMode {
    /// Raw 16-bit, signed-or-unsigned (`-0x8000..=0xFFFF`). `ldl`, `ldh`.
    Raw16,
    /// Signed 16-bit byte offset. `ldb`, `stb`.
    Signed16,
    /// Signed 18-bit byte offset, must be a multiple of 4, stored as a
    /// word offset. `ld`, `st`, `jl`, `jr`, `bne`, `beq`.
    Signed18Word,
}

/// A bit-packing failure, with no positional information attached — the
/// caller (`asm::layout`/`asm::resolve`) wraps these into a `Diagnostic`
/// carrying file/line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EncodeError {
    ImmediateTooLarge(i64),
    DisplacementTooLarge(i64),
    DisplacementMisaligned(i64),
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EncodeError::ImmediateTooLarge(v) => write!(f, "immediate value too large: {}", v),
            EncodeError::DisplacementTooLarge(v) => write!(f, "displacement too large: {}", v),
            EncodeError::DisplacementMisaligned(v) => {
                write!(f, "displacement must be a multiple of 4: {}", v)
            }
        }
    }
}

impl std::error::Error for EncodeError {}

/// `true` if `value` fits in a signed two's-complement integer of `bits`
/// width. Mirrors `asm.py`'s `check_int_range`.
pub fn fits_signed(value: i64, bits: u32) -> bool {
    let x = 1i64 << (bits - 1);
    -x <= value && value < x
}

/// Pack an I-family instruction: `op=0` ALU/compare, Rx/Ra/Rb, a signed
/// 8-bit immediate, and a 5-bit tag. Also used directly for the D
/// (debug) family with `op=10`, `Rx=Ra=Rb=r0`, and the debug opcode's
/// 8-bit immediate operand — `asm.py`'s `on_debug` calls `code_i` with
/// those fixed fields rather than a separate packer.
pub fn pack_i(
    op: u8,
    rx: RegisterId,
    ra: RegisterId,
    rb: RegisterId,
    imm: i64,
    tag: u8,
) -> Result<[u8; 4], EncodeError> {
    if !fits_signed(imm, 8) {
        return Err(EncodeError::ImmediateTooLarge(imm));
    }
    let iu = (imm as i8 as u8) as u32;
    let x = rx.number() as u32;
    let a = ra.number() as u32;
    let b = rb.number() as u32;
    let tag = tag as u32 & 0x1f;

    let c0 = ((iu & 7) << 5) | tag;
    let c1 = ((b & 7) << 5) | ((iu >> 3) & 0x1f);
    let c2 = ((x & 1) << 7) | (a << 2) | (b >> 3);
    let c3 = ((op as u32) << 4) | (x >> 1);
    Ok([c0 as u8, c1 as u8, c2 as u8, c3 as u8])
}

/// Pack an F-family (FPU) instruction: `op=1`, Rx/Ra/Rb, a 2-bit sign
/// modifier, and a 5-bit tag.
pub fn pack_f(
    rx: RegisterId,
    ra: RegisterId,
    rb: RegisterId,
    sign: u8,
    tag: u8,
) -> [u8; 4] {
    let x = rx.number() as u32;
    let a = ra.number() as u32;
    let b = rb.number() as u32;
    let tag = tag as u32 & 0x1f;
    let sign = sign as u32 & 0b11;

    let c0 = (sign << 5) | tag;
    let c1 = (b & 7) << 5;
    let c2 = ((x & 1) << 7) | (a << 2) | (b >> 3);
    let c3 = (1u32 << 4) | (x >> 1);
    [c0 as u8, c1 as u8, c2 as u8, c3 as u8]
}

/// Pack an M-family (misc: loads/stores/jumps/branches) instruction with
/// a variable `op` and a displacement encoded per `mode`.
pub fn pack_m(
    op: u8,
    rx: RegisterId,
    ra: RegisterId,
    pred: u8,
    disp: i64,
    mode: DispMode,
) -> Result<[u8; 4], EncodeError> {
    let d = match mode {
        DispMode::Raw16 => {
            if !(-0x8000..=0xffff).contains(&disp) {
                return Err(EncodeError::ImmediateTooLarge(disp));
            }
            disp
        }
        DispMode::Signed16 => {
            if !fits_signed(disp, 16) {
                return Err(EncodeError::DisplacementTooLarge(disp));
            }
            disp
        }
        DispMode::Signed18Word => {
            if disp & 3 != 0 {
                return Err(EncodeError::DisplacementMisaligned(disp));
            }
            if !fits_signed(disp, 18) {
                return Err(EncodeError::DisplacementTooLarge(disp));
            }
            disp / 4
        }
    };

    let du = (d as i32 as u32) & 0xffff;
    let x = rx.number() as u32;
    let a = ra.number() as u32;
    let pred = pred as u32 & 0b11;

    let c0 = du & 0xff;
    let c1 = (du >> 8) & 0xff;
    let c2 = ((x & 1) << 7) | (a << 2) | pred;
    let c3 = ((op as u32) << 4) | (x >> 1);
    Ok([c0 as u8, c1 as u8, c2 as u8, c3 as u8])
}
