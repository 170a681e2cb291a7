use asm::config::{Config, ListingVerbosity, OutputFormat};
use asm::diag::{Diagnostic, Severity};
use clap::{Arg, ArgAction, Command};
use gout::Format;
use std::path::PathBuf;
use std::process::ExitCode;

fn app() -> Command {
    Command::new("asm")
        .about("Two-pass assembler for the gaia instruction set")
        .arg(
            Arg::new("INPUT")
                .help("Source files to assemble, in order")
                .required(true)
                .num_args(1..),
        )
        .arg(
            Arg::new("library")
                .short('l')
                .long("library")
                .value_name("FILE")
                .action(ArgAction::Append)
                .help("Library source file, assembled before INPUT and never warned as unused"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .help("Output file (default a.out)"),
        )
        .arg(
            Arg::new("entry")
                .short('e')
                .long("entry")
                .value_name("ADDR")
                .help("Entry point address (default 0x2000)"),
        )
        .arg(
            Arg::new("start")
                .short('t')
                .long("start")
                .value_name("LABEL")
                .help("Start label (default main)"),
        )
        .arg(
            Arg::new("no_size_prefix")
                .short('c')
                .action(ArgAction::SetTrue)
                .help("Omit the 4-byte size prefix from raw output"),
        )
        .arg(
            Arg::new("no_prepend_jump")
                .short('r')
                .action(ArgAction::SetTrue)
                .help("Don't prepend a jump to the start label"),
        )
        .arg(
            Arg::new("one_op")
                .short('n')
                .action(ArgAction::SetTrue)
                .help("One-operation mode: mov/symbolic load/store must fit a single instruction"),
        )
        .arg(
            Arg::new("indexed")
                .short('k')
                .action(ArgAction::SetTrue)
                .help("Write an indexed hex-array (HDL testbench) output instead of raw bytes"),
        )
        .arg(
            Arg::new("serial")
                .short('a')
                .action(ArgAction::SetTrue)
                .help("Write a serial-stimulus (one byte per line) output instead of raw bytes"),
        )
        .arg(
            Arg::new("end_marker")
                .short('f')
                .value_name("LABEL")
                .help("Append a synthetic global label at the end of the program"),
        )
        .arg(
            Arg::new("listing")
                .short('s')
                .action(ArgAction::SetTrue)
                .help("Write a plain listing to <output>.s"),
        )
        .arg(
            Arg::new("verbose_listing")
                .short('v')
                .action(ArgAction::SetTrue)
                .help("Write a verbose listing (with encoded bytes) to <output>.s"),
        )
        .arg(
            Arg::new("no_warn_unused")
                .long("Wno-unused-label")
                .action(ArgAction::SetTrue)
                .help("Don't warn about declared-but-unreferenced labels"),
        )
        .arg(
            Arg::new("warn_r29")
                .long("Wr29")
                .action(ArgAction::SetTrue)
                .help("Warn when a macro-expanded line touches the r29 scratch register"),
        )
}

fn parse_config(matches: &clap::ArgMatches) -> Config {
    let mut cfg = Config::default();
    cfg.inputs = matches
        .get_many::<String>("INPUT")
        .unwrap()
        .cloned()
        .collect();
    if let Some(libs) = matches.get_many::<String>("library") {
        cfg.libraries = libs.cloned().collect();
    }
    if let Some(output) = matches.get_one::<String>("output") {
        cfg.output = output.clone();
    }
    if let Some(entry) = matches.get_one::<String>("entry") {
        if let Some(v) = asm::numeric::parse_int(entry) {
            cfg.entry_point = v as u32;
        }
    }
    if let Some(start) = matches.get_one::<String>("start") {
        cfg.start_label = start.clone();
    }
    cfg.prepend_jump = !matches.get_flag("no_prepend_jump");
    cfg.one_op_mode = matches.get_flag("one_op");
    cfg.format = if matches.get_flag("indexed") {
        OutputFormat::IndexedArray
    } else if matches.get_flag("serial") {
        OutputFormat::SerialStimulus
    } else {
        OutputFormat::Raw { size_prefix: !matches.get_flag("no_size_prefix") }
    };
    cfg.end_marker = matches.get_one::<String>("end_marker").cloned();
    cfg.listing = if matches.get_flag("verbose_listing") {
        Some(ListingVerbosity::Verbose)
    } else if matches.get_flag("listing") {
        Some(ListingVerbosity::Plain)
    } else {
        None
    };
    cfg.warn_unused_label = !matches.get_flag("no_warn_unused");
    cfg.warn_r29 = matches.get_flag("warn_r29");
    cfg
}

fn report(d: &Diagnostic) {
    let use_color = std::io::IsTerminal::is_terminal(&std::io::stderr());
    if !use_color {
        eprintln!("{}", d);
        return;
    }
    let color = match d.severity() {
        Severity::Warning => "\x1b[33m",
        Severity::Error => "\x1b[31m",
        Severity::Fatal => "\x1b[1;31m",
    };
    eprintln!("{}{}\x1b[0m", color, d);
}

fn main() -> ExitCode {
    let matches = app().get_matches();
    let cfg = parse_config(&matches);

    match asm::assemble(&cfg) {
        Ok(output) => {
            for w in &output.warnings {
                report(w);
            }
            if let Some(listing) = &output.listing {
                let listing_path = PathBuf::from(format!("{}.s", cfg.output));
                if let Err(e) = std::fs::write(&listing_path, listing) {
                    eprintln!("error: writing {}: {}", listing_path.display(), e);
                    return ExitCode::FAILURE;
                }
            }
            let format = match cfg.format {
                OutputFormat::Raw { size_prefix } => Format::Raw { size_prefix },
                OutputFormat::IndexedArray => Format::IndexedArray,
                OutputFormat::SerialStimulus => Format::SerialStimulus,
            };
            let output_path = PathBuf::from(&cfg.output);
            if let Err(e) = gout::write_file(&output_path, &output.bytes, format) {
                eprintln!("error: writing {}: {}", output_path.display(), e);
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Err(d) => {
            report(&d);
            ExitCode::FAILURE
        }
    }
}
