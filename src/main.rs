use std::io::{self, prelude::*};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::Context;
use byte_unit::{AdjustedByte, Byte, UnitType};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use script_output::extension::{dat_files, has_extension, log_files};
use script_output::{Destination, OpenMode, Splitter, WriteCount};
use serde_json::json;
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Copy standard input to standard output and to several data files at once,
/// while logging the run to standard error and to log files.
#[derive(Debug, Parser, Clone)]
#[command(name = "script-output", version)]
struct Opt {
    /// The output files. Files ending in `.dat` receive a copy of standard input,
    /// files ending in `.log` receive the messages of the run. Other files are ignored.
    files: Vec<PathBuf>,

    /// How the output files are opened: w (truncate), a (append), x (must not exist),
    /// r+ (must exist), w+ or a+.
    #[arg(long, default_value_t = OpenMode::Write)]
    mode: OpenMode,

    /// Overwrite output files that already exist. Without it they are skipped,
    /// unless the mode keeps their content.
    #[arg(long)]
    force: bool,

    /// Do not echo standard input to standard output.
    #[arg(long, short)]
    quiet: bool,

    /// Write a JSON summary of the run to the log destinations.
    #[arg(long)]
    report: bool,

    /// How often the progress spinner is refreshed, in milliseconds.
    #[arg(long, default_value_t = 100)]
    tick_ms: u64,

    /// Show debug logs. `RUST_LOG` takes precedence when set.
    #[arg(long, short)]
    verbose: bool,
}

const SPINNER_TEMPLATE: &str = "{spinner} {human_pos} lines {per_sec}";

fn main() -> anyhow::Result<()> {
    let opt = Opt::parse();
    init_tracing(opt.verbose);

    for path in &opt.files {
        if !has_extension(path, ".dat") && !has_extension(path, ".log") {
            warn!("Ignoring {}, it is neither a .dat nor a .log file", path.display());
        }
    }
    let data_paths = writable_paths(dat_files(&opt.files), &opt);
    let log_paths = writable_paths(log_files(&opt.files), &opt);

    let counter = WriteCount::new();
    let mut data = Splitter::new();
    if !opt.quiet {
        data.register(Destination::handle(io::stdout()))?;
    }
    data.register(Destination::handle(&counter))?;
    open_all(&mut data, &data_paths, opt.mode)?;

    let mut log = Splitter::new();
    log.register(Destination::handle(io::stderr()))?;
    open_all(&mut log, &log_paths, opt.mode)?;

    log.scope(|log| {
        let log_targets: Vec<PathBuf> = log.opened_paths().map(Path::to_path_buf).collect();
        writeln!(log, "Logging to {} file(s)", log_targets.len())?;
        for path in &log_targets {
            writeln!(log, "  {}", path.display())?;
        }
        writeln!(log, "Copying standard input to {} data file(s)", data_paths.len())?;
        for path in data.opened_paths() {
            writeln!(log, "  {}", path.display())?;
        }

        let tick = Duration::from_millis(opt.tick_ms);
        let bytes = data.scope(|data| copy_with_progress(io::stdin().lock(), data, &counter, tick))?;
        let lines = counter.tell();
        writeln!(
            log,
            "Copied {lines} lines ({:.2}) to {} data file(s)",
            display_bytes(bytes),
            data_paths.len()
        )?;

        if opt.report {
            let report = json!({
                "lines": lines,
                "bytes": bytes,
                "data_files": display_paths(&data_paths),
                "log_files": display_paths(&log_paths),
            });
            writeln!(log, "{}", serde_json::to_string_pretty(&report)?)?;
        }
        Ok::<_, anyhow::Error>(())
    })
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Drops the paths that already exist, unless overwriting them is allowed.
fn writable_paths(candidates: Vec<&PathBuf>, opt: &Opt) -> Vec<PathBuf> {
    candidates
        .into_iter()
        .filter(|path| {
            if opt.force || opt.mode.preserves_content() || !path.exists() {
                true
            } else {
                warn!("Skipping {}, it already exists (use --force to overwrite it)", path.display());
                false
            }
        })
        .cloned()
        .collect()
}

fn open_all(splitter: &mut Splitter<'_>, paths: &[PathBuf], mode: OpenMode) -> anyhow::Result<()> {
    for path in paths {
        splitter
            .register_with_mode(path.as_path(), mode)
            .with_context(|| format!("Could not open {} with mode {mode}", path.display()))?;
    }
    Ok(())
}

/// Copies `input` line by line while a second thread polls `counter` to animate a spinner.
fn copy_with_progress(
    input: impl BufRead,
    output: &mut impl Write,
    counter: &WriteCount,
    tick: Duration,
) -> anyhow::Result<u64> {
    let progress = ProgressBar::new_spinner();
    progress.set_style(ProgressStyle::with_template(SPINNER_TEMPLATE)?);
    let done = AtomicBool::new(false);

    let copied = thread::scope(|scope| {
        scope.spawn(|| poll_progress(counter, &progress, &done, tick));
        let copied = copy_lines(input, output);
        done.store(true, Ordering::Relaxed);
        copied
    });
    progress.finish_and_clear();
    Ok(copied?)
}

fn poll_progress(counter: &WriteCount, progress: &ProgressBar, done: &AtomicBool, tick: Duration) {
    while !done.load(Ordering::Relaxed) {
        progress.set_position(counter.tell().max(0) as u64);
        thread::sleep(tick);
    }
    progress.set_position(counter.tell().max(0) as u64);
}

fn copy_lines(mut input: impl BufRead, output: &mut impl Write) -> io::Result<u64> {
    let mut line = Vec::new();
    let mut copied = 0;
    loop {
        line.clear();
        let read = input.read_until(b'\n', &mut line)?;
        if read == 0 {
            break;
        }
        output.write_all(&line)?;
        copied += read as u64;
    }
    output.flush()?;
    Ok(copied)
}

fn display_bytes(size: u64) -> AdjustedByte {
    Byte::from(size).get_appropriate_unit(UnitType::Binary)
}

fn display_paths(paths: &[PathBuf]) -> Vec<String> {
    paths.iter().map(|path| path.display().to_string()).collect()
}
