// Command-line front end for memtrace.
//
// Subcommands map one-to-one onto the library operations. Arguments are
// resolved into a flat `Options` value first, then dispatched to a
// `cmd_*` function returning the process exit code.

use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Args, CommandFactory, Parser, Subcommand, ValueEnum, ValueHint};

use crate::image::{AddressUnit, OutputMode, TranscodeOptions, WordAssembly};
use crate::io::{self as fileio, FilterFileStats, IoError, OutputDigest, hex_digest};
use crate::trace::filter::{DEFAULT_FIELDS, UNKNOWN_WORD, ZERO_WORD};
use crate::trace::{
    DEFAULT_SYNC_MARKER, DiffOptions, FieldExtractor, FieldSpec, ReportFormat, Scrubber,
};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Sparse dump read by `transcode` when no paths are given.
const DEFAULT_HEX_PATH: &str = "programs/prog.hex";
/// Image written by `transcode` when no paths are given; the extension
/// follows the output mode.
const DEFAULT_IMAGE_STEM: &str = "programs/prog";

const BUF_SIZE: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// Memory-image transcoder and trace log differ.
#[derive(Parser, Debug)]
#[command(
    name = "memtrace",
    version,
    about = "Hex dump to COE/MEM transcoder and drift-tolerant trace differ",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Quiet mode (errors only).
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose mode (use multiple times for more detail).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Output stats as JSON to stderr.
    #[arg(long = "json", global = true)]
    json_output: bool,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Convert a sparse hex dump into a dense memory image.
    Transcode(TranscodeArgs),
    /// Compare two trace logs from their sync lines onward.
    Diff(DiffArgs),
    /// Drop consecutive records whose key fields repeat.
    Lighten(LightenArgs),
    /// Replace unknown values in a trace log.
    Scrub(ScrubArgs),
    /// Print defaults and enabled features.
    Config,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    /// `.coe` vector with zero fill and `;` terminator.
    #[value(alias = "coe")]
    Closed,
    /// `.mem` listing with echoed directives and padded words.
    #[value(alias = "mem")]
    Open,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum AssemblyArg {
    /// One 32-bit word per token.
    Direct,
    /// One byte per token, four bytes reversed into a word.
    ByteSwapped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    /// `Lines: <nA>: <A> || <nB>: <B>`.
    Dual,
    /// `InLines <n>: <A> || <B>`.
    Positional,
}

#[derive(Args, Debug)]
struct TranscodeArgs {
    /// Output framing.
    #[arg(long, short = 'm', value_enum, default_value_t = ModeArg::Closed)]
    mode: ModeArg,

    /// Token convention of data lines.
    #[arg(long, value_enum, default_value_t = AssemblyArg::Direct)]
    assembly: AssemblyArg,

    /// Treat directive addresses as byte offsets.
    #[arg(long = "byte-addresses")]
    byte_addresses: bool,

    /// Write hex digits in uppercase.
    #[arg(long)]
    uppercase: bool,

    /// Fail if one directive would insert more than WORDS fill words.
    #[arg(long = "max-fill", value_name = "WORDS")]
    max_fill: Option<u64>,

    /// Sparse hex dump (default: programs/prog.hex).
    #[arg(value_hint = ValueHint::FilePath)]
    input: Option<PathBuf>,

    /// Dense image (default: programs/prog.coe, or .mem in open mode).
    #[arg(value_hint = ValueHint::FilePath)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct DiffArgs {
    /// Prefix of the first compared line in each log.
    #[arg(long, default_value = DEFAULT_SYNC_MARKER)]
    marker: String,

    /// Record line layout.
    #[arg(long, value_enum, default_value_t = FormatArg::Dual)]
    format: FormatArg,

    /// Report file (default: stdout).
    #[arg(long, short = 'o', value_hint = ValueHint::FilePath)]
    output: Option<PathBuf>,

    /// First log.
    #[arg(value_hint = ValueHint::FilePath)]
    file_a: Option<PathBuf>,

    /// Second log.
    #[arg(value_hint = ValueHint::FilePath)]
    file_b: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct LightenArgs {
    /// Key field as START:WIDTH in characters (repeat for each field).
    #[arg(long = "field", value_name = "START:WIDTH", action = ArgAction::Append)]
    fields: Vec<FieldSpec>,

    /// Input log.
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,

    /// Filtered log.
    #[arg(value_hint = ValueHint::FilePath)]
    output: PathBuf,
}

#[derive(Args, Debug)]
struct ScrubArgs {
    /// Text to replace.
    #[arg(long, default_value = UNKNOWN_WORD, value_parser = clap::builder::NonEmptyStringValueParser::new())]
    pattern: String,

    /// Replacement text.
    #[arg(long, default_value = ZERO_WORD)]
    replacement: String,

    /// Input log.
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,

    /// Scrubbed log.
    #[arg(value_hint = ValueHint::FilePath)]
    output: PathBuf,
}

// ---------------------------------------------------------------------------
// Resolved command + options (flattened from Cli)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Transcode,
    Diff,
    Lighten,
    Scrub,
    Config,
}

#[derive(Debug)]
struct Options {
    command: Command,
    quiet: bool,
    verbose: u8,
    json_output: bool,
    input_file: Option<PathBuf>,
    /// Second log of `diff`.
    compare_file: Option<PathBuf>,
    output_file: Option<PathBuf>,
    transcode: TranscodeOptions,
    diff: DiffOptions,
    extractor: FieldExtractor,
    scrubber: Scrubber,
}

impl Options {
    fn new(command: Command, cli: &Cli) -> Self {
        Self {
            command,
            quiet: cli.quiet,
            verbose: cli.verbose.min(2),
            json_output: cli.json_output,
            input_file: None,
            compare_file: None,
            output_file: None,
            transcode: TranscodeOptions::default(),
            diff: DiffOptions::default(),
            extractor: FieldExtractor::default(),
            scrubber: Scrubber::default(),
        }
    }
}

fn default_image_path(mode: OutputMode) -> PathBuf {
    PathBuf::from(DEFAULT_IMAGE_STEM).with_extension(mode.extension())
}

fn resolve_options(cli: Cli) -> Options {
    match &cli.command {
        Cmd::Transcode(args) => {
            let mut opts = Options::new(Command::Transcode, &cli);
            opts.transcode = TranscodeOptions {
                mode: match args.mode {
                    ModeArg::Closed => OutputMode::Closed,
                    ModeArg::Open => OutputMode::Open,
                },
                assembly: match args.assembly {
                    AssemblyArg::Direct => WordAssembly::Direct,
                    AssemblyArg::ByteSwapped => WordAssembly::ByteSwapped,
                },
                address_unit: if args.byte_addresses {
                    AddressUnit::Byte
                } else {
                    AddressUnit::Word
                },
                uppercase: args.uppercase,
                max_fill: args.max_fill,
            };
            // Zero positionals select the default paths; exactly one is a
            // usage error handled at dispatch.
            (opts.input_file, opts.output_file) = match (&args.input, &args.output) {
                (None, None) => (
                    Some(PathBuf::from(DEFAULT_HEX_PATH)),
                    Some(default_image_path(opts.transcode.mode)),
                ),
                (input, output) => (input.clone(), output.clone()),
            };
            opts
        }
        Cmd::Diff(args) => {
            let mut opts = Options::new(Command::Diff, &cli);
            opts.diff = DiffOptions {
                marker: args.marker.clone(),
                format: match args.format {
                    FormatArg::Dual => ReportFormat::Dual,
                    FormatArg::Positional => ReportFormat::Positional,
                },
            };
            opts.input_file = args.file_a.clone();
            opts.compare_file = args.file_b.clone();
            opts.output_file = args.output.clone();
            opts
        }
        Cmd::Lighten(args) => {
            let mut opts = Options::new(Command::Lighten, &cli);
            if !args.fields.is_empty() {
                opts.extractor = FieldExtractor::new(args.fields.clone());
            }
            opts.input_file = Some(args.input.clone());
            opts.output_file = Some(args.output.clone());
            opts
        }
        Cmd::Scrub(args) => {
            let mut opts = Options::new(Command::Scrub, &cli);
            opts.scrubber = Scrubber::new(args.pattern.clone(), args.replacement.clone());
            opts.input_file = Some(args.input.clone());
            opts.output_file = Some(args.output.clone());
            opts
        }
        Cmd::Config => Options::new(Command::Config, &cli),
    }
}

#[cfg(any(test, feature = "fuzzing"))]
pub fn fuzz_try_parse_args(args: &[String]) {
    let argv: Vec<String> = std::iter::once("memtrace".to_string())
        .chain(args.iter().cloned())
        .collect();
    if let Ok(cli) = Cli::try_parse_from(argv) {
        let _ = resolve_options(cli);
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn print_usage(subcommand: &str) {
    let mut cmd = Cli::command();
    cmd.build();
    if let Some(sub) = cmd.find_subcommand_mut(subcommand) {
        eprintln!("{}", sub.render_usage());
    }
}

fn print_digest(opts: &Options, path: &Path, digest: &OutputDigest) {
    if opts.verbose > 0 && !opts.quiet {
        eprintln!("memtrace: wrote {} ({} bytes)", path.display(), digest.size);
        if let Some(sha) = &digest.sha256 {
            eprintln!("memtrace: sha256 {}", hex_digest(sha));
        }
    }
}

fn digest_json(digest: &OutputDigest) -> serde_json::Value {
    serde_json::json!({
        "size": digest.size,
        "sha256": digest.sha256.as_ref().map(|s| hex_digest(s)),
    })
}

// ---------------------------------------------------------------------------
// Config command
// ---------------------------------------------------------------------------

fn cmd_config() -> i32 {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!("memtrace version {version}");

    let file_io = cfg!(feature = "file-io") as u8;
    let gzip = cfg!(feature = "gzip") as u8;
    let fields: Vec<String> = DEFAULT_FIELDS.iter().map(ToString::to_string).collect();

    eprintln!("FILE_IO={file_io}");
    eprintln!("GZIP={gzip}");
    eprintln!("DEFAULT_HEX_PATH={DEFAULT_HEX_PATH}");
    eprintln!(
        "DEFAULT_IMAGE_PATH={}",
        default_image_path(OutputMode::Closed).display()
    );
    eprintln!("DEFAULT_SYNC_MARKER={DEFAULT_SYNC_MARKER}");
    eprintln!("DEFAULT_FIELDS={}", fields.join(","));
    eprintln!("UNKNOWN_WORD={UNKNOWN_WORD}");

    0
}

// ---------------------------------------------------------------------------
// Transcode command
// ---------------------------------------------------------------------------

fn cmd_transcode(opts: &Options) -> i32 {
    let (Some(input), Some(output)) = (&opts.input_file, &opts.output_file) else {
        print_usage("transcode");
        return 0;
    };

    let stats = match fileio::transcode_file(input, output, opts.transcode) {
        Ok(stats) => stats,
        Err(e) => {
            eprintln!("memtrace: transcode: {e}");
            return 1;
        }
    };

    if opts.verbose > 0 && !opts.quiet {
        let image = &stats.image;
        eprintln!(
            "memtrace: transcoder: lines: {}, data words: {}, fill words: {}, \
             directives: {}, overshoots: {}",
            image.lines, image.data_words, image.fill_words, image.directives, image.overshoots
        );
    }
    print_digest(opts, output, &stats.output);

    if opts.json_output {
        let json = serde_json::json!({
            "command": "transcode",
            "lines": stats.image.lines,
            "data_words": stats.image.data_words,
            "fill_words": stats.image.fill_words,
            "directives": stats.image.directives,
            "overshoots": stats.image.overshoots,
            "dropped_bytes": stats.image.dropped_bytes,
            "output": digest_json(&stats.output),
        });
        eprintln!("{json:#}");
    }

    0
}

// ---------------------------------------------------------------------------
// Diff command
// ---------------------------------------------------------------------------

fn cmd_diff(opts: &Options) -> i32 {
    let (Some(file_a), Some(file_b)) = (&opts.input_file, &opts.compare_file) else {
        print_usage("diff");
        return 0;
    };

    // The report file is only created once both logs have been opened.
    let make_output = || -> Result<Box<dyn Write>, IoError> {
        let out: Box<dyn Write> = match &opts.output_file {
            Some(path) => Box::new(fileio::create_output(path)?),
            None => Box::new(BufWriter::with_capacity(BUF_SIZE, io::stdout().lock())),
        };
        Ok(out)
    };

    let stats = match fileio::diff_files(file_a, file_b, make_output, &opts.diff) {
        Ok(stats) => stats,
        Err(e) => {
            eprintln!("memtrace: diff: {e}");
            return 1;
        }
    };

    let summary = &stats.summary;
    if opts.verbose > 0 && !opts.quiet {
        let line = |n: Option<u64>| n.map_or_else(|| "not found".to_string(), |n| n.to_string());
        eprintln!(
            "memtrace: differ: sync lines: {} / {}, compared: {}, differences: {}",
            line(summary.sync_a),
            line(summary.sync_b),
            summary.positions,
            summary.records
        );
    }
    if let Some(path) = &opts.output_file {
        print_digest(opts, path, &stats.output);
    }

    if opts.json_output {
        let json = serde_json::json!({
            "command": "diff",
            "sync_a": summary.sync_a,
            "sync_b": summary.sync_b,
            "positions": summary.positions,
            "records": summary.records,
            "output": digest_json(&stats.output),
        });
        eprintln!("{json:#}");
    }

    0
}

// ---------------------------------------------------------------------------
// Filter commands (lighten, scrub)
// ---------------------------------------------------------------------------

fn cmd_lighten(opts: &Options) -> i32 {
    let (Some(input), Some(output)) = (&opts.input_file, &opts.output_file) else {
        print_usage("lighten");
        return 1;
    };
    let result = fileio::dedup_file(input, output, &opts.extractor);
    report_filter(opts, "lighten", output, result)
}

fn cmd_scrub(opts: &Options) -> i32 {
    let (Some(input), Some(output)) = (&opts.input_file, &opts.output_file) else {
        print_usage("scrub");
        return 1;
    };
    let result = fileio::scrub_file(input, output, &opts.scrubber);
    report_filter(opts, "scrub", output, result)
}

fn report_filter(
    opts: &Options,
    name: &str,
    output: &Path,
    result: Result<FilterFileStats, IoError>,
) -> i32 {
    let stats = match result {
        Ok(stats) => stats,
        Err(e) => {
            eprintln!("memtrace: {name}: {e}");
            return 1;
        }
    };

    let filter = &stats.filter;
    if opts.verbose > 0 && !opts.quiet {
        eprintln!(
            "memtrace: {name}: lines in: {}, lines out: {}, changed: {}",
            filter.lines_in, filter.lines_out, filter.lines_changed
        );
    }
    print_digest(opts, output, &stats.output);

    if opts.json_output {
        let json = serde_json::json!({
            "command": name,
            "lines_in": filter.lines_in,
            "lines_out": filter.lines_out,
            "lines_changed": filter.lines_changed,
            "output": digest_json(&stats.output),
        });
        eprintln!("{json:#}");
    }

    0
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn init_logging(quiet: bool, verbose: u8) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .format_target(false)
        .init();
}

/// Main CLI entry point. Parses arguments via clap, dispatches commands.
pub fn run() -> ! {
    let cli = Cli::parse();
    let opts = resolve_options(cli);
    init_logging(opts.quiet, opts.verbose);

    let exit_code = match opts.command {
        Command::Transcode => cmd_transcode(&opts),
        Command::Diff => cmd_diff(&opts),
        Command::Lighten => cmd_lighten(&opts),
        Command::Scrub => cmd_scrub(&opts),
        Command::Config => cmd_config(),
    };

    process::exit(exit_code);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_opts(args: &[&str]) -> Options {
        let argv: Vec<String> = std::iter::once("memtrace".to_string())
            .chain(args.iter().map(|s| s.to_string()))
            .collect();
        let cli = Cli::try_parse_from(argv).expect("cli parse failed");
        resolve_options(cli)
    }

    #[test]
    fn transcode_defaults_to_program_paths() {
        let opts = parse_opts(&["transcode"]);
        assert_eq!(opts.command, Command::Transcode);
        assert_eq!(opts.input_file, Some(PathBuf::from("programs/prog.hex")));
        assert_eq!(opts.output_file, Some(PathBuf::from("programs/prog.coe")));
        assert_eq!(opts.transcode, TranscodeOptions::default());
    }

    #[test]
    fn transcode_open_default_is_mem() {
        let opts = parse_opts(&["transcode", "--mode", "mem"]);
        assert_eq!(opts.transcode.mode, OutputMode::Open);
        assert_eq!(opts.output_file, Some(PathBuf::from("programs/prog.mem")));
    }

    #[test]
    fn transcode_single_path_leaves_output_unset() {
        let opts = parse_opts(&["transcode", "in.hex"]);
        assert_eq!(opts.input_file, Some(PathBuf::from("in.hex")));
        assert!(opts.output_file.is_none());
    }

    #[test]
    fn transcode_flags_map() {
        let opts = parse_opts(&[
            "transcode",
            "--assembly",
            "byte-swapped",
            "--byte-addresses",
            "--uppercase",
            "in.hex",
            "out.coe",
        ]);
        assert_eq!(
            opts.transcode,
            TranscodeOptions {
                mode: OutputMode::Closed,
                assembly: WordAssembly::ByteSwapped,
                address_unit: AddressUnit::Byte,
                uppercase: true,
                max_fill: None,
            }
        );
        assert_eq!(opts.output_file, Some(PathBuf::from("out.coe")));
    }

    #[test]
    fn max_fill_maps() {
        let opts = parse_opts(&["transcode", "--max-fill", "4096", "in.hex", "out.coe"]);
        assert_eq!(opts.transcode.max_fill, Some(4096));
        assert_eq!(parse_opts(&["transcode"]).transcode.max_fill, None);
    }

    #[test]
    fn diff_options_map() {
        let opts = parse_opts(&[
            "diff",
            "--marker",
            "boot",
            "--format",
            "positional",
            "-o",
            "diff.log",
            "a.log",
            "b.log",
        ]);
        assert_eq!(opts.command, Command::Diff);
        assert_eq!(opts.diff.marker, "boot");
        assert_eq!(opts.diff.format, ReportFormat::Positional);
        assert_eq!(opts.input_file, Some(PathBuf::from("a.log")));
        assert_eq!(opts.compare_file, Some(PathBuf::from("b.log")));
        assert_eq!(opts.output_file, Some(PathBuf::from("diff.log")));
    }

    #[test]
    fn diff_without_paths_parses() {
        let opts = parse_opts(&["diff"]);
        assert_eq!(opts.diff, DiffOptions::default());
        assert!(opts.input_file.is_none() && opts.compare_file.is_none());
    }

    #[test]
    fn lighten_fields() {
        let opts = parse_opts(&["lighten", "in.log", "out.log"]);
        assert_eq!(opts.command, Command::Lighten);
        assert_eq!(opts.extractor, FieldExtractor::default());

        let opts = parse_opts(&["lighten", "--field", "0:4", "--field", "9:2", "in", "out"]);
        assert_eq!(
            opts.extractor.fields(),
            &[FieldSpec::new(0, 4), FieldSpec::new(9, 2)]
        );
    }

    #[test]
    fn scrub_pattern() {
        let opts = parse_opts(&["scrub", "in", "out"]);
        assert_eq!(opts.command, Command::Scrub);
        assert_eq!(opts.scrubber, Scrubber::default());

        let opts = parse_opts(&["scrub", "--pattern", "zz", "--replacement", "00", "in", "out"]);
        assert_eq!(opts.scrubber.pattern(), "zz");
        assert_eq!(opts.scrubber.replacement(), "00");
    }

    #[test]
    fn empty_scrub_pattern_is_rejected() {
        let argv = ["memtrace", "scrub", "--pattern", "", "in", "out"];
        assert!(Cli::try_parse_from(argv).is_err());
    }

    #[test]
    fn verbose_is_capped() {
        let opts = parse_opts(&["-vvvv", "config"]);
        assert_eq!(opts.verbose, 2);
        assert_eq!(opts.command, Command::Config);
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["memtrace", "-q", "-v", "config"]).is_err());
    }

    #[test]
    fn fuzz_parse_never_panics() {
        for args in [
            vec![],
            vec!["transcode".to_string(), "--mode".to_string()],
            vec!["diff".to_string(), "a".to_string(), "b".to_string(), "c".to_string()],
        ] {
            fuzz_try_parse_args(&args);
        }
    }
}
