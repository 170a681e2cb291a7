//! Two-pass assembler for the gaia instruction set.
//!
//! The pipeline is a straight line: [`source::load`] reads the input
//! and library files into a flat line stream, [`lexer::split`] and
//! [`macros::expand`] turn each source line into zero or more
//! machine-level lines, [`layout::layout`] assigns every label an
//! address, [`resolve::resolve`] substitutes labels with their final
//! values, and [`encode::encode`] turns the result into bytes.
//! [`assemble`] drives all of that and hands the finished image to
//! [`gout`] for output-format framing.

pub mod config;
pub mod diag;
pub mod encode;
pub mod expr;
pub mod layout;
pub mod lexer;
pub mod listing;
pub mod macros;
pub mod numeric;
pub mod resolve;
pub mod source;
pub mod symbol;

use config::Config;
use diag::{Diagnostic, Kind};
use std::collections::HashSet;

/// Everything [`assemble`] hands back besides the byte image.
pub struct Output {
    pub bytes: Vec<u8>,
    pub listing: Option<String>,
    pub warnings: Vec<Diagnostic>,
}

/// Run the full pipeline over `cfg`, returning the assembled image, an
/// optional listing, and any non-fatal diagnostics gathered along the
/// way. The first fatal or error-severity diagnostic short-circuits
/// the whole run.
pub fn assemble(cfg: &Config) -> Result<Output, Diagnostic> {
    let mut warnings = Vec::new();

    let (mut raw_lines, libraries, source_cache) = source::load(&cfg.inputs, &cfg.libraries)?;
    if let Some(label) = &cfg.end_marker {
        source::append_end_marker(&mut raw_lines, label);
    }

    let mut expanded: Vec<(macros::Instr, String, u32)> = Vec::new();
    let mut seen_r29: HashSet<(String, u32)> = HashSet::new();
    for raw in &raw_lines {
        let Some((mnemonic, operands)) = lexer::split(&raw.text, &raw.file, raw.pos)? else {
            continue;
        };
        if mnemonic.ends_with(':') || matches!(mnemonic.as_str(), ".global" | ".set" | ".align") {
            expanded.push(((mnemonic, operands), raw.file.clone(), raw.pos));
            continue;
        }
        let (lines, mut macro_warnings) = macros::expand(&mnemonic, &operands, &raw.file, raw.pos)?;
        warnings.append(&mut macro_warnings);
        if cfg.warn_r29 {
            for (m, ops) in &lines {
                if ops.iter().any(|o| o == "r29") || m == "r29" {
                    if seen_r29.insert((raw.file.clone(), raw.pos)) {
                        warnings.push(Diagnostic::new(Kind::ScratchRegisterUsed, &raw.file, raw.pos));
                    }
                }
            }
        }
        for line in lines {
            expanded.push((line, raw.file.clone(), raw.pos));
        }
    }

    if cfg.prepend_jump {
        expanded.splice(
            0..0,
            [
                (
                    ("mov".to_owned(), vec!["r29".to_owned(), cfg.start_label.clone()]),
                    String::new(),
                    0,
                ),
                (("jr".to_owned(), vec!["r29".to_owned()]), String::new(), 0),
            ],
        );
    }

    let mut symtab = symbol::SymbolTable::new(libraries, cfg.start_label.clone());
    let sized = layout::layout(&expanded, &mut symtab, cfg.one_op_mode, cfg.entry_point)?;
    let resolved = resolve::resolve(&sized, &mut symtab, cfg.one_op_mode)?;

    let mut bytes = Vec::new();
    for r in &resolved {
        let mut encoded = encode::encode(&r.mnemonic, &r.operands, &r.file, r.line)?;
        bytes.append(&mut encoded);
    }

    for ((mnemonic, operands), file, line) in &expanded {
        if mnemonic == ".global" {
            symtab.check_global(&operands[0], file, *line)?;
        } else if let Some(label) = mnemonic.strip_suffix(':') {
            if cfg.warn_unused_label {
                warnings.extend(symtab.unused_warning(label, file, *line));
            }
        }
    }

    let listing = cfg
        .listing
        .map(|verbosity| listing::render(&resolved, &source_cache, &symtab, verbosity));

    Ok(Output { bytes, listing, warnings })
}
