//! Parsed command-line flags, centralized so the pipeline never touches
//! `clap` directly. Grounded on `vasm/src/main.rs`'s `vasm(...)` driver,
//! which takes plain arguments rather than an `ArgMatches`.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Raw { size_prefix: bool },
    IndexedArray,
    SerialStimulus,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub inputs: Vec<String>,
    pub libraries: Vec<String>,
    pub output: String,
    pub entry_point: u32,
    pub start_label: String,
    pub prepend_jump: bool,
    pub one_op_mode: bool,
    pub format: OutputFormat,
    pub end_marker: Option<String>,
    pub listing: Option<ListingVerbosity>,
    pub warn_unused_label: bool,
    pub warn_r29: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListingVerbosity {
    Plain,
    Verbose,
}

pub const DEFAULT_ENTRY_POINT: u32 = 0x2000;
pub const DEFAULT_START_LABEL: &str = "main";
pub const DEFAULT_OUTPUT: &str = "a.out";

impl Default for Config {
    fn default() -> Config {
        Config {
            inputs: Vec::new(),
            libraries: Vec::new(),
            output: DEFAULT_OUTPUT.to_owned(),
            entry_point: DEFAULT_ENTRY_POINT,
            start_label: DEFAULT_START_LABEL.to_owned(),
            prepend_jump: true,
            one_op_mode: false,
            format: OutputFormat::Raw { size_prefix: true },
            end_marker: None,
            listing: None,
            warn_unused_label: true,
            warn_r29: false,
        }
    }
}
