//! Authoritative tag tables (spec.md §4.6), ported from `asm.py`'s
//! `alu3_table`/`alu4_table`/`fpu2_table`/`fpu3_table`/`misc*_table`/
//! `debug_table`/`sign_table`. Each table is modeled as an enum with a
//! `FromStr`/`tag` pair rather than a `HashMap<&str, u8>`, matching the
//! teacher's preference for enums over string-keyed tag maps
//! (`vcpu/src/enums.rs`'s `OpCode`/`ALUFunct`).

use std::fmt;
use std::str::FromStr;

macro_rules! tag_enum {
    ($name:ident { $($variant:ident => $mnemonic:literal = $tag:literal),+ $(,)? }) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn tag(self) -> u8 {
                match self {
                    $(Self::$variant => $tag),+
                }
            }

            pub fn mnemonic(self) -> &'static str {
                match self {
                    $(Self::$variant => $mnemonic),+
                }
            }
        }

        impl FromStr for $name {
            type Err = ();

            fn from_str(s: &str) -> Result<Self, ()> {
                match s {
                    $($mnemonic => Ok(Self::$variant),)+
                    _ => Err(()),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str(self.mnemonic())
            }
        }
    };
}

tag_enum!(Alu4Tag {
    Add => "add" = 0,
    Sub => "sub" = 1,
    Shl => "shl" = 2,
    Shr => "shr" = 3,
    Sar => "sar" = 4,
    And => "and" = 5,
    Or => "or" = 6,
    Xor => "xor" = 7,
    Cmpne => "cmpne" = 24,
    Cmpeq => "cmpeq" = 25,
    Cmplt => "cmplt" = 26,
    Cmple => "cmple" = 27,
});

tag_enum!(Alu3Tag {
    Fcmpne => "fcmpne" = 28,
    Fcmpeq => "fcmpeq" = 29,
    Fcmplt => "fcmplt" = 30,
    Fcmple => "fcmple" = 31,
});

tag_enum!(Fpu2Tag {
    Finv => "finv" = 4,
    Fsqrt => "fsqrt" = 5,
    Ftoi => "ftoi" = 6,
    Itof => "itof" = 7,
    Floor => "floor" = 8,
});

tag_enum!(Fpu3Tag {
    Fadd => "fadd" = 0,
    Fsub => "fsub" = 1,
    Fmul => "fmul" = 2,
    Fdiv => "fdiv" = 3,
});

tag_enum!(Misc0Op {
    Sysenter => "sysenter" = 4,
    Sysexit => "sysexit" = 5,
});

tag_enum!(Misc1Op {
    Jr => "jr" = 12,
});

tag_enum!(Misc2Op {
    Ldl => "ldl" = 2,
    Jl => "jl" = 11,
});

tag_enum!(Misc3Op {
    Ldh => "ldh" = 3,
    St => "st" = 6,
    Stb => "stb" = 7,
    Ld => "ld" = 8,
    Ldb => "ldb" = 9,
    Bne => "bne" = 13,
    Beq => "beq" = 15,
});

tag_enum!(DebugTag {
    Break => "break" = 1,
    Penv => "penv" = 2,
    Ptrace => "ptrace" = 3,
});

/// 2-bit FPU sign modifier, parsed from a `.`-separated mnemonic suffix
/// (e.g. `fadd.neg`). Mirrors `asm.py`'s `sign_table`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignModifier {
    None,
    Neg,
    Abs,
    AbsNeg,
}

impl SignModifier {
    pub fn tag(self) -> u8 {
        match self {
            SignModifier::None => 0,
            SignModifier::Neg => 1,
            SignModifier::Abs => 2,
            SignModifier::AbsNeg => 3,
        }
    }
}

impl FromStr for SignModifier {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, ()> {
        match s {
            "" => Ok(SignModifier::None),
            "neg" => Ok(SignModifier::Neg),
            "abs" => Ok(SignModifier::Abs),
            "abs.neg" => Ok(SignModifier::AbsNeg),
            _ => Err(()),
        }
    }
}

/// `op` field value for the I family (ALU/compare).
pub const OP_I: u8 = 0;
/// `op` field value for the F family (FPU).
pub const OP_F: u8 = 1;
/// `op` field value for the D family (debug).
pub const OP_DEBUG: u8 = 10;

/// Predictor bit pattern for a branch/jump mnemonic, derived from its
/// (already suffix-stripped) base mnemonic and original `+`/`-` suffix.
/// Mirrors `asm.py`: `pred = 3 if mnemonic in ['jl','jr','bne+','beq+'] else 0`.
pub fn predictor(mnemonic_with_suffix: &str) -> u8 {
    matches!(mnemonic_with_suffix, "jl" | "jr" | "bne+" | "beq+")
        .then(|| 3)
        .unwrap_or(0)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn alu4_tags_match_table() {
        assert_eq!(Alu4Tag::Add.tag(), 0);
        assert_eq!(Alu4Tag::Cmple.tag(), 27);
        assert_eq!("cmpeq".parse::<Alu4Tag>().unwrap().tag(), 25);
    }

    #[test]
    fn predictor_only_set_for_unconditional_family() {
        assert_eq!(predictor("jl"), 3);
        assert_eq!(predictor("jr"), 3);
        assert_eq!(predictor("bne+"), 3);
        assert_eq!(predictor("beq+"), 3);
        assert_eq!(predictor("bne-"), 0);
        assert_eq!(predictor("bne"), 0);
        assert_eq!(predictor("beq"), 0);
    }

    #[test]
    fn sign_suffix_parses() {
        assert_eq!("".parse::<SignModifier>().unwrap().tag(), 0);
        assert_eq!("abs.neg".parse::<SignModifier>().unwrap().tag(), 3);
    }
}
