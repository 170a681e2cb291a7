//! Output-format writers for an assembled byte image (spec.md §6).
//! Grounded on `vex`/`vexfile`'s `read`/`write` + `*Ext` trait +
//! `read_file`/`write_file` shape, adapted from vex's two-section
//! `Program` model to the flat byte blob this assembler produces.
//! Exact format text is grounded on `asm.py`'s `write()` (the `-k`
//! `x"..."` literal and the `-a` `wait for BR; RS_RX <= ...;` stimulus).

use std::fs::File;
use std::io::prelude::*;
use std::io::BufWriter;
use std::path::Path;
use util::Endian;

/// Which of the three output encodings spec.md §6 describes to write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    /// Raw machine bytes, optionally preceded by a 4-byte little-endian
    /// length prefix.
    Raw { size_prefix: bool },
    /// `-k`: one `<index> => x"<8hex>",` line per 4-byte chunk, terminated
    /// by an `others => (others => '0')` line.
    IndexedArray,
    /// `-a`: one VHDL serial-stimulus block per byte (start bit, 8 data
    /// bits LSB first, stop bit, inter-byte wait).
    SerialStimulus,
}

/// Write `bytes` to `writer` in `format`. `bytes` must already be
/// word-aligned in length for [`Format::IndexedArray`].
pub fn write<W: Write>(writer: &mut W, bytes: &[u8], format: Format) -> std::io::Result<()> {
    match format {
        Format::Raw { size_prefix } => write_raw(writer, bytes, size_prefix),
        Format::IndexedArray => write_indexed_array(writer, bytes),
        Format::SerialStimulus => write_serial_stimulus(writer, bytes),
    }
}

fn write_raw<W: Write>(writer: &mut W, bytes: &[u8], size_prefix: bool) -> std::io::Result<()> {
    use byteorder::WriteBytesExt;
    if size_prefix {
        writer.write_u32::<Endian>(bytes.len() as u32)?;
    }
    writer.write_all(bytes)
}

fn write_indexed_array<W: Write>(writer: &mut W, bytes: &[u8]) -> std::io::Result<()> {
    for (i, word) in bytes.chunks(4).enumerate() {
        let mut padded = [0u8; 4];
        padded[..word.len()].copy_from_slice(word);
        let value = u32::from_le_bytes(padded);
        writeln!(writer, "{} => x\"{:08x}\",", i, value)?;
    }
    writeln!(writer, "others => (others => '0')")
}

fn write_serial_stimulus<W: Write>(writer: &mut W, bytes: &[u8]) -> std::io::Result<()> {
    for byte in bytes {
        writeln!(writer, "wait for BR; RS_RX <= '0';")?;
        for bit in 0..8 {
            let b = if byte & (1 << bit) != 0 { '1' } else { '0' };
            writeln!(writer, "wait for BR; RS_RX <= '{}';", b)?;
        }
        writeln!(writer, "wait for BR; RS_RX <= '1';")?;
        writeln!(writer)?;
        writeln!(writer, "wait for (2 * BR);")?;
        writeln!(writer)?;
    }
    Ok(())
}

/// `*Ext`-style convenience trait, matching `vexfile`'s `WriteVexExt`.
pub trait WriteGoutExt: Write + Sized {
    fn write_gout(&mut self, bytes: &[u8], format: Format) -> std::io::Result<()> {
        write(self, bytes, format)
    }
}

impl<W: Write + Sized> WriteGoutExt for W {}

pub fn write_file<P: AsRef<Path>>(path: P, bytes: &[u8], format: Format) -> std::io::Result<()> {
    BufWriter::new(File::create(path)?).write_gout(bytes, format)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn raw_without_size_prefix_is_exact_bytes() {
        let mut out = Vec::new();
        write(&mut out, &[1, 2, 3, 4], Format::Raw { size_prefix: false }).unwrap();
        assert_eq!(out, vec![1, 2, 3, 4]);
    }

    #[test]
    fn raw_with_size_prefix_prepends_little_endian_length() {
        let mut out = Vec::new();
        write(&mut out, &[1, 2, 3, 4], Format::Raw { size_prefix: true }).unwrap();
        assert_eq!(out, vec![4, 0, 0, 0, 1, 2, 3, 4]);
    }

    #[test]
    fn indexed_array_emits_one_indexed_hex_literal_per_word() {
        let mut out = Vec::new();
        write(&mut out, &[0xff, 0xff, 0xff, 0xff, 0x78, 0x56, 0x34, 0x12], Format::IndexedArray)
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "0 => x\"ffffffff\",\n1 => x\"12345678\",\nothers => (others => '0')\n"
        );
    }

    #[test]
    fn serial_stimulus_sends_start_bit_then_lsb_first_data_then_stop_bit() {
        let mut out = Vec::new();
        write(&mut out, &[0b0000_0001], Format::SerialStimulus).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().filter(|l| !l.is_empty()).collect();
        assert_eq!(lines[0], "wait for BR; RS_RX <= '0';");
        assert_eq!(lines[1], "wait for BR; RS_RX <= '1';");
        for bit_line in &lines[2..9] {
            assert_eq!(*bit_line, "wait for BR; RS_RX <= '0';");
        }
        assert_eq!(lines[9], "wait for BR; RS_RX <= '1';");
        assert_eq!(lines[10], "wait for (2 * BR);");
    }

    #[test]
    fn serial_stimulus_emits_one_block_per_byte() {
        let mut out = Vec::new();
        write(&mut out, &[0x00, 0xff], Format::SerialStimulus).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.matches("wait for (2 * BR);").count(), 2);
    }
}
