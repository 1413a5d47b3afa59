//! The `alore` command-line driver (`spec.md` §6).
//!
//! `spec.md` §1 scopes the lexer/parser/compiler and the module loader out
//! of the runtime core as external collaborators; what's left for this
//! binary is the part the runtime actually owns: parse the documented
//! option surface, install a [`RuntimeContext`] and thread registry for the
//! process, wire up diagnostics and logging the way `seq-lsp`'s `main.rs`
//! does, and translate whatever a loader/interpreter would raise into one
//! of the exit codes `spec.md` §6 specifies. Without a loader linked in,
//! running an actual program reports [`CliError::LoaderUnavailable`]
//! rather than silently doing nothing.

use alore_rt::error::{CliError, ExceptionKind, RaisedException};
use alore_rt::RuntimeContext;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, warn};

#[cfg(unix)]
const PATH_SEPARATOR: char = ':';
#[cfg(not(unix))]
const PATH_SEPARATOR: char = ';';

/// `spec.md` §6: `alore [options] program.alo [program-args...]`.
#[derive(Parser)]
#[command(name = "alore")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Alore virtual machine", long_about = None)]
#[command(disable_version_flag = true)]
struct Cli {
    /// Program to run.
    program: Option<PathBuf>,

    /// Arguments passed through to the running program.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    program_args: Vec<String>,

    /// Print version and exit.
    #[arg(short = 'v', long = "version")]
    version: bool,

    /// Type-check `program` and exit without running it.
    #[arg(short = 'c')]
    check_only: bool,

    /// Type-check `program`, then run it.
    #[arg(short = 't')]
    check_then_run: bool,

    /// Dump compiled code before running (debug builds only).
    #[arg(short = 'd')]
    dump_code: bool,

    /// Cap heap size: a byte count, or a count suffixed `k`, `M`, or `G`.
    #[arg(long = "max-heap", value_name = "SIZE")]
    max_heap: Option<String>,
}

/// The `-Dn N` / `-Df N` / `-Dl N` debug counters and the `-m`/`-T`/`-a addr`
/// flags don't fit clap's single-dash-short / double-dash-long convention
/// (each is a multi-letter flag behind one dash), so they're pulled out of
/// `argv` before the rest is handed to [`Cli::parse_from`] — the same
/// pre-scan `seqc`'s `Commands::Completions` avoids needing by using
/// subcommands instead; here the flags are genuinely positional modifiers
/// on a single invocation, not a subcommand.
#[derive(Default)]
struct DebugFlags {
    dump_modules: bool,
    dump_threads: bool,
    trace_address: Option<String>,
    dn: Option<u32>,
    df: Option<u32>,
    dl: Option<u32>,
}

fn take_debug_flags(args: Vec<String>) -> (DebugFlags, Vec<String>) {
    let mut flags = DebugFlags::default();
    let mut rest = Vec::with_capacity(args.len());
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-m" => flags.dump_modules = true,
            "-T" => flags.dump_threads = true,
            "-a" => flags.trace_address = iter.next(),
            "-Dn" => flags.dn = iter.next().and_then(|v| v.parse().ok()),
            "-Df" => flags.df = iter.next().and_then(|v| v.parse().ok()),
            "-Dl" => flags.dl = iter.next().and_then(|v| v.parse().ok()),
            _ => rest.push(arg),
        }
    }
    (flags, rest)
}

/// Parse a `--max-heap` value: digits optionally followed by `k`, `M`, or
/// `G` (base 1024, matching the nursery/old-gen sizing knobs already read
/// from `ALORE_NURSERY_SIZE`-style environment variables).
fn parse_max_heap(raw: &str) -> Result<u64, CliError> {
    let (digits, multiplier) = match raw.chars().last() {
        Some('k') | Some('K') => (&raw[..raw.len() - 1], 1024),
        Some('M') => (&raw[..raw.len() - 1], 1024 * 1024),
        Some('G') => (&raw[..raw.len() - 1], 1024 * 1024 * 1024),
        _ => (raw, 1),
    };
    digits
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .ok_or_else(|| CliError::InvalidMaxHeap(raw.to_string()))
}

/// `ALOREPATH`: a `PATH_SEPARATOR`-separated list prepended to the default
/// search path (`spec.md` §6). The default path is just the current
/// directory; a real deployment's default install tree is the module
/// loader's business, not the runtime's.
fn module_search_path() -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = std::env::var("ALOREPATH")
        .ok()
        .map(|path| {
            path.split(PATH_SEPARATOR)
                .filter(|p| !p.is_empty())
                .map(PathBuf::from)
                .collect()
        })
        .unwrap_or_default();
    dirs.push(PathBuf::from("."));
    dirs
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("alore=info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// `spec.md` §6 exit codes, the `Exit(n)` case aside.
#[derive(Clone, Copy)]
enum ExitStatus {
    Normal,
    CompileOrCheckError,
    CheckerLaunchFailed,
    InternalFailure,
    /// `Exit(n)` propagated verbatim as the process exit code.
    UserCode(u8),
}

impl ExitStatus {
    fn code(self) -> u8 {
        match self {
            ExitStatus::Normal => 0,
            ExitStatus::CompileOrCheckError => 1,
            ExitStatus::CheckerLaunchFailed => 2,
            ExitStatus::InternalFailure => 99,
            ExitStatus::UserCode(n) => n,
        }
    }
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (debug, rest) = take_debug_flags(args);
    let mut argv = vec!["alore".to_string()];
    argv.extend(rest);
    let cli = Cli::parse_from(argv);

    if cli.version {
        println!("alore {}", env!("CARGO_PKG_VERSION"));
        return ExitCode::from(ExitStatus::Normal.code());
    }

    init_logging();

    let max_heap = match cli.max_heap.as_deref().map(parse_max_heap).transpose() {
        Ok(v) => v,
        Err(e) => {
            eprintln!("alore: {e}");
            return ExitCode::from(ExitStatus::InternalFailure.code());
        }
    };
    if let Some(bytes) = max_heap {
        info!(max_heap_bytes = bytes, "heap cap requested");
        // SAFETY net: this build's `Heap` has no configurable cap yet
        // (`DESIGN.md`, open question); the flag is accepted and logged so
        // `--max-heap` round-trips through argument parsing, matching the
        // `ALORE_MAX_HEAP` environment knob `SPEC_FULL.md` documents for
        // the same purpose.
    }

    // `is_standalone` distinguishes a program compiled and linked with the
    // runtime from one this launcher loads dynamically; `alore` only ever
    // does the latter (`spec.md` §6, "Persisted state").
    let ctx = RuntimeContext::new(false).install();
    #[cfg_attr(not(feature = "diagnostics"), allow(unused_variables))]
    let registry: &'static alore_rt::concurrency::ThreadRegistry =
        Box::leak(Box::new(alore_rt::concurrency::ThreadRegistry::new()));
    #[cfg(feature = "diagnostics")]
    alore_rt::diagnostics::install_signal_handler(registry, &ctx.heap);

    if debug.dump_modules || debug.dump_threads {
        #[cfg(feature = "diagnostics")]
        alore_rt::diagnostics::dump_diagnostics();
    }
    if let Some(addr) = &debug.trace_address {
        warn!(%addr, "-a address tracing requested; not implemented in this build");
    }
    if debug.dn.is_some() || debug.df.is_some() || debug.dl.is_some() {
        warn!(
            dn = ?debug.dn,
            df = ?debug.df,
            dl = ?debug.dl,
            "-Dn/-Df/-Dl debug counters requested; not implemented in this build"
        );
    }

    let search_path = module_search_path();
    info!(?search_path, "module search path resolved");

    let Some(program) = cli.program else {
        eprintln!("alore: no program given");
        return ExitCode::from(ExitStatus::InternalFailure.code());
    };

    let status = run(
        &program,
        &cli.program_args,
        cli.check_only,
        cli.check_then_run,
        cli.dump_code,
    );
    ExitCode::from(status.code())
}

/// Drive one program: resolve it against the search path, then hand it to
/// the (absent, in this build) module loader. `spec.md` §6's `-c` stops
/// after type-checking; without a checker linked in, that's
/// [`ExitStatus::CheckerLaunchFailed`] rather than a silent success. `-t`
/// asks to run after checking, which collapses to the same "no loader"
/// report as a plain run once the check step itself can't launch.
fn run(
    program: &PathBuf,
    _program_args: &[String],
    check_only: bool,
    check_then_run: bool,
    _dump_code: bool,
) -> ExitStatus {
    if !program.exists() {
        eprintln!("alore: {} not found", program.display());
        return ExitStatus::CompileOrCheckError;
    }

    if check_only {
        eprintln!(
            "alore: {}",
            CliError::LoaderUnavailable(program.display().to_string())
        );
        return ExitStatus::CheckerLaunchFailed;
    }

    if check_then_run {
        info!(program = %program.display(), "type-check requested before run");
    }

    eprintln!(
        "alore: {}",
        CliError::LoaderUnavailable(program.display().to_string())
    );
    match as_exit_exception(program) {
        Some(exc) => report_uncaught(exc),
        None => ExitStatus::InternalFailure,
    }
}

/// Placeholder for the interpreter actually running `program` and
/// surfacing an uncaught `Exit(n)`/exception to the top level
/// (`spec.md` §7's propagation policy, applied at the outermost frame).
/// Always `None` until a loader is linked in; kept as a named seam so
/// wiring one in later is a one-function change, not a restructure.
fn as_exit_exception(_program: &PathBuf) -> Option<RaisedException> {
    None
}

fn report_uncaught(exc: RaisedException) -> ExitStatus {
    if exc.kind == ExceptionKind::ExitException {
        if let Some(code) = exc.exit_code() {
            return ExitStatus::from_user_code(code);
        }
    }
    eprintln!("alore: uncaught exception: {exc}");
    for frame in &exc.traceback {
        eprintln!("  at {frame}");
    }
    ExitStatus::InternalFailure
}

impl ExitStatus {
    fn from_user_code(n: i32) -> ExitStatus {
        // `Exit(n)` propagates verbatim; only representable via the process
        // exit code's 0..=255 range, same constraint every Unix process has.
        ExitStatus::UserCode(n.rem_euclid(256) as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_byte_count() {
        assert_eq!(parse_max_heap("1024").unwrap(), 1024);
    }

    #[test]
    fn parses_k_suffix() {
        assert_eq!(parse_max_heap("512k").unwrap(), 512 * 1024);
    }

    #[test]
    fn parses_m_and_g_suffixes() {
        assert_eq!(parse_max_heap("64M").unwrap(), 64 * 1024 * 1024);
        assert_eq!(parse_max_heap("2G").unwrap(), 2 * 1024 * 1024 * 1024);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_max_heap("not-a-size").is_err());
        assert!(parse_max_heap("").is_err());
    }

    #[test]
    fn debug_flags_are_pulled_out_of_argv() {
        let args = vec![
            "-Dn".to_string(),
            "3".to_string(),
            "program.alo".to_string(),
            "-m".to_string(),
        ];
        let (flags, rest) = take_debug_flags(args);
        assert_eq!(flags.dn, Some(3));
        assert!(flags.dump_modules);
        assert_eq!(rest, vec!["program.alo".to_string()]);
    }

    #[test]
    fn module_search_path_always_includes_cwd() {
        // SAFETY: tests in this crate never run with other threads reading
        // ALOREPATH concurrently.
        unsafe {
            std::env::remove_var("ALOREPATH");
        }
        assert_eq!(module_search_path(), vec![PathBuf::from(".")]);
    }
}
