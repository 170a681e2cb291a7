//! Register set, word format, and instruction-family bit-packing for the
//! gaia instruction set.
//!
//! This crate has no notion of mnemonics, source files, or labels — that
//! surface syntax belongs to the `asm` crate, which sits on top of this
//! one and produces the already-resolved `(op, registers, immediate)`
//! tuples that [`encode`] turns into bytes.

pub mod constants;
pub mod encode;
pub mod register;
pub mod tags;

/// A single machine word, always 4 bytes little-endian on the wire.
pub type Word = u32;
