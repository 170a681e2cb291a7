//! Integer literal parsing shared by the lexer, macro expander, and
//! symbol table. Mirrors `asm.py`'s `parse_int`, which is Python's
//! `int(s, 0)`: decimal, or `0x`/`0o`/`0b` prefixed, optionally signed.

pub fn parse_int(s: &str) -> Option<i64> {
    let s = s.trim();
    let (neg, rest) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    if rest.is_empty() {
        return None;
    }
    let value = if let Some(digits) = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
        i64::from_str_radix(digits, 16).ok()?
    } else if let Some(digits) = rest.strip_prefix("0o").or_else(|| rest.strip_prefix("0O")) {
        i64::from_str_radix(digits, 8).ok()?
    } else if let Some(digits) = rest.strip_prefix("0b").or_else(|| rest.strip_prefix("0B")) {
        i64::from_str_radix(digits, 2).ok()?
    } else {
        rest.parse::<i64>().ok()?
    };
    Some(if neg { -value } else { value })
}

/// `true` if `value` fits in a signed `bits`-wide two's-complement field.
/// Mirrors `asm.py`'s `check_int_range`.
pub fn check_int_range(value: i64, bits: u32) -> bool {
    let x = 1i64 << (bits - 1);
    -x <= value && value < x
}

pub fn to_hex_operand(value: i64) -> String {
    if value < 0 {
        format!("-0x{:x}", -value)
    } else {
        format!("0x{:x}", value)
    }
}

/// Decode a double-quoted string literal with C-style backslash
/// escapes (`\n`, `\t`, `\\`, `\"`, `\0`, `\xNN`). Mirrors `asm.py`'s
/// `eval_string`, which leans on Python's own literal `eval`; this is
/// the handful of escapes gaia sources actually use.
pub fn unescape_string(token: &str) -> Option<String> {
    let inner = token.strip_prefix('"')?.strip_suffix('"')?;
    let mut out = Vec::new();
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c as u32 as u8);
            continue;
        }
        match chars.next()? {
            'n' => out.push(b'\n'),
            't' => out.push(b'\t'),
            'r' => out.push(b'\r'),
            '0' => out.push(0),
            '\\' => out.push(b'\\'),
            '"' => out.push(b'"'),
            'x' => {
                let hi = chars.next()?.to_digit(16)?;
                let lo = chars.next()?.to_digit(16)?;
                out.push((hi * 16 + lo) as u8);
            }
            other => out.push(other as u32 as u8),
        }
    }
    String::from_utf8(out).ok()
}
