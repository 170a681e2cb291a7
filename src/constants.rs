//! Bit-field widths for the gaia word format. Kept as named constants in
//! the style of the teacher's `constants.rs`, even though the packers in
//! [`crate::encode`] build words byte-by-byte rather than through a
//! single 32-bit mask (the gaia layout packs bits across byte boundaries
//! in a way a single `u32` mask per field can't express directly — see
//! `asm.py`'s `code_i`/`code_f`/`code_m`).

/// Every machine word is exactly 4 bytes.
pub const WORD_BYTES: u32 = 4;

/// Tag field width for the I/F families (5 bits).
pub const TAG_WIDTH: u32 = 5;

/// Signed 8-bit immediate width used by I-family ALU/compare instructions.
pub const ALU_IMMEDIATE_BITS: u32 = 8;

/// Raw 16-bit displacement (mode 0): `ldl`, `ldh`.
pub const DISP_RAW_BITS: u32 = 16;

/// Signed 16-bit byte displacement (mode 1): `ldb`, `stb`.
pub const DISP_SIGNED16_BITS: u32 = 16;

/// Signed 18-bit byte displacement stored as a word offset (mode 2):
/// `ld`, `st`, `jl`, `jr`, `bne`, `beq`.
pub const DISP_SIGNED18_BITS: u32 = 18;

/// Entry-point / program-size cap: 4 MiB.
pub const PROGRAM_SIZE_CAP: u32 = 0x0040_0000;
