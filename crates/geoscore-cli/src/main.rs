use std::collections::HashSet;
use std::ffi::OsString;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use geoscore_backend::PgConfig;
use geoscore_compare::EvalOptions;
use geoscore_error::Result;
use geoscore_harness::{
    load_completed_keys, run_clean_batch, run_eval_batch, run_extract_batch, summarize, JsonlSink,
    RunnerConfig,
};
use geoscore_refs::score_extractions;
use geoscore_types::record::ExtractionReport;

const DEFAULT_WORKERS: usize = 4;
const DEFAULT_TIMEOUT_SECS: u64 = 5;
const DEFAULT_FLUSH_EVERY: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Eval(EvalArgs),
    Extract(ExtractArgs),
    Clean(IoArgs),
    Summary(SummaryArgs),
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct IoArgs {
    input: PathBuf,
    output: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct EvalArgs {
    io: IoArgs,
    host: String,
    port: u16,
    user: String,
    password: String,
    workers: usize,
    timeout_secs: u64,
    flush_every: usize,
    resume: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ExtractArgs {
    io: IoArgs,
    gold: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SummaryArgs {
    input: PathBuf,
    output: Option<PathBuf>,
}

fn main() {
    init_tracing();
    let mut stdout = io::stdout();
    let mut stderr = io::stderr();
    let exit_code = run(std::env::args_os(), &mut stdout, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn run<I, W, E>(args: I, out: &mut W, err: &mut E) -> i32
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    let command = match parse_args(args) {
        Ok(command) => command,
        Err(message) => {
            let _ = writeln!(err, "error: {message}");
            let _ = write_usage(err);
            return 2;
        }
    };

    let outcome = match command {
        Command::Help => {
            return if write_usage(out).is_err() { 1 } else { 0 };
        }
        Command::Eval(args) => run_eval(&args, out),
        Command::Extract(args) => run_extract(&args, out),
        Command::Clean(args) => run_clean(&args, out),
        Command::Summary(args) => run_summary(&args, out),
    };

    match outcome {
        Ok(()) => 0,
        Err(error) => {
            let _ = writeln!(err, "error: {error}");
            1
        }
    }
}

fn parse_args<I>(args: I) -> std::result::Result<Command, String>
where
    I: IntoIterator<Item = OsString>,
{
    let mut iter = args.into_iter();
    let _argv0 = iter.next();

    let Some(subcommand) = iter.next() else {
        return Ok(Command::Help);
    };
    match subcommand.to_string_lossy().as_ref() {
        "-h" | "--help" | "help" => Ok(Command::Help),
        "eval" => parse_eval_args(iter),
        "extract" => parse_extract_args(iter),
        "clean" => parse_io_args(iter).map(Command::Clean),
        "summary" => parse_summary_args(iter),
        other => Err(format!("unknown subcommand `{other}`")),
    }
}

fn next_value<I>(iter: &mut I, flag: &str) -> std::result::Result<String, String>
where
    I: Iterator<Item = OsString>,
{
    iter.next()
        .map(|v| v.to_string_lossy().into_owned())
        .ok_or_else(|| format!("missing argument for `{flag}`"))
}

fn parse_eval_args<I>(mut iter: I) -> std::result::Result<Command, String>
where
    I: Iterator<Item = OsString>,
{
    let mut input: Option<PathBuf> = None;
    let mut output: Option<PathBuf> = None;
    let mut host = String::from("localhost");
    let mut port = 5432u16;
    let mut user = String::from("postgres");
    let mut password = String::new();
    let mut workers = DEFAULT_WORKERS;
    let mut timeout_secs = DEFAULT_TIMEOUT_SECS;
    let mut flush_every = DEFAULT_FLUSH_EVERY;
    let mut resume = true;

    while let Some(argument) = iter.next() {
        let arg = argument.to_string_lossy();
        match arg.as_ref() {
            "--input" => input = Some(PathBuf::from(next_value(&mut iter, "--input")?)),
            "--output" => output = Some(PathBuf::from(next_value(&mut iter, "--output")?)),
            "--host" => host = next_value(&mut iter, "--host")?,
            "--port" => {
                port = parse_number(&next_value(&mut iter, "--port")?, "--port")?;
            }
            "--user" => user = next_value(&mut iter, "--user")?,
            "--password" => password = next_value(&mut iter, "--password")?,
            "--workers" => {
                workers = parse_number(&next_value(&mut iter, "--workers")?, "--workers")?;
            }
            "--timeout-secs" => {
                timeout_secs =
                    parse_number(&next_value(&mut iter, "--timeout-secs")?, "--timeout-secs")?;
            }
            "--flush-every" => {
                flush_every =
                    parse_number(&next_value(&mut iter, "--flush-every")?, "--flush-every")?;
            }
            "--no-resume" => resume = false,
            other => return Err(format!("unknown option `{other}` for `eval`")),
        }
    }

    Ok(Command::Eval(EvalArgs {
        io: IoArgs {
            input: input.ok_or("`eval` requires `--input`")?,
            output: output.ok_or("`eval` requires `--output`")?,
        },
        host,
        port,
        user,
        password,
        workers,
        timeout_secs,
        flush_every,
        resume,
    }))
}

fn parse_extract_args<I>(mut iter: I) -> std::result::Result<Command, String>
where
    I: Iterator<Item = OsString>,
{
    let mut input: Option<PathBuf> = None;
    let mut output: Option<PathBuf> = None;
    let mut gold: Option<PathBuf> = None;

    while let Some(argument) = iter.next() {
        let arg = argument.to_string_lossy();
        match arg.as_ref() {
            "--input" => input = Some(PathBuf::from(next_value(&mut iter, "--input")?)),
            "--output" => output = Some(PathBuf::from(next_value(&mut iter, "--output")?)),
            "--gold" => gold = Some(PathBuf::from(next_value(&mut iter, "--gold")?)),
            other => return Err(format!("unknown option `{other}` for `extract`")),
        }
    }

    Ok(Command::Extract(ExtractArgs {
        io: IoArgs {
            input: input.ok_or("`extract` requires `--input`")?,
            output: output.ok_or("`extract` requires `--output`")?,
        },
        gold,
    }))
}

fn parse_io_args<I>(mut iter: I) -> std::result::Result<IoArgs, String>
where
    I: Iterator<Item = OsString>,
{
    let mut input: Option<PathBuf> = None;
    let mut output: Option<PathBuf> = None;

    while let Some(argument) = iter.next() {
        let arg = argument.to_string_lossy();
        match arg.as_ref() {
            "--input" => input = Some(PathBuf::from(next_value(&mut iter, "--input")?)),
            "--output" => output = Some(PathBuf::from(next_value(&mut iter, "--output")?)),
            other => return Err(format!("unknown option `{other}`")),
        }
    }

    Ok(IoArgs {
        input: input.ok_or("`--input` is required")?,
        output: output.ok_or("`--output` is required")?,
    })
}

fn parse_summary_args<I>(mut iter: I) -> std::result::Result<Command, String>
where
    I: Iterator<Item = OsString>,
{
    let mut input: Option<PathBuf> = None;
    let mut output: Option<PathBuf> = None;

    while let Some(argument) = iter.next() {
        let arg = argument.to_string_lossy();
        match arg.as_ref() {
            "--input" => input = Some(PathBuf::from(next_value(&mut iter, "--input")?)),
            "--output" => output = Some(PathBuf::from(next_value(&mut iter, "--output")?)),
            other => return Err(format!("unknown option `{other}` for `summary`")),
        }
    }

    Ok(Command::Summary(SummaryArgs {
        input: input.ok_or("`summary` requires `--input`")?,
        output,
    }))
}

fn parse_number<T: std::str::FromStr>(raw: &str, flag: &str) -> std::result::Result<T, String> {
    raw.parse()
        .map_err(|_| format!("invalid numeric value `{raw}` for `{flag}`"))
}

fn load_records(path: &Path) -> Result<Vec<serde_json::Value>> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        records.push(serde_json::from_str(&line)?);
    }
    Ok(records)
}

fn run_eval<W: Write>(args: &EvalArgs, out: &mut W) -> Result<()> {
    let records = load_records(&args.io.input)?;
    let completed = if args.resume {
        load_completed_keys(&args.io.output)?
    } else {
        HashSet::new()
    };

    let config = RunnerConfig {
        db: PgConfig {
            host: args.host.clone(),
            port: args.port,
            user: args.user.clone(),
            password: args.password.clone(),
            dbname: String::new(),
        },
        workers: args.workers,
        eval: EvalOptions {
            timeout: Duration::from_secs(args.timeout_secs),
        },
    };

    let sink = JsonlSink::append(&args.io.output, args.flush_every)?;
    let stats = run_eval_batch(&records, &completed, &config, &sink)?;
    let _ = writeln!(
        out,
        "eval done: {} total, {} evaluated, {} skipped, {} with errors",
        stats.total, stats.evaluated, stats.skipped, stats.errors
    );
    Ok(())
}

fn run_extract<W: Write>(args: &ExtractArgs, out: &mut W) -> Result<()> {
    let records = load_records(&args.io.input)?;
    let sink = JsonlSink::append(&args.io.output, 1)?;
    let stats = run_extract_batch(&records, &sink)?;
    let _ = writeln!(
        out,
        "extract done: {} total, {} extracted, {} malformed",
        stats.total, stats.evaluated, stats.errors
    );

    if let Some(gold_path) = &args.gold {
        let pred = load_extraction_reports(&args.io.output)?;
        let gold = load_extraction_reports(gold_path)?;
        let summary = score_extractions(&pred, &gold);
        let _ = writeln!(out, "{}", serde_json::to_string_pretty(&summary)?);
    }
    Ok(())
}

fn load_extraction_reports(path: &Path) -> Result<Vec<ExtractionReport>> {
    let mut reports = Vec::new();
    for record in load_records(path)? {
        // Error placeholder lines carry no `tables` array; skip them.
        match serde_json::from_value::<ExtractionReport>(record) {
            Ok(report) => reports.push(report),
            Err(error) => tracing::debug!(%error, "skipping non-extraction line"),
        }
    }
    Ok(reports)
}

fn run_clean<W: Write>(args: &IoArgs, out: &mut W) -> Result<()> {
    let records = load_records(&args.input)?;
    let sink = JsonlSink::append(&args.output, 1)?;
    let stats = run_clean_batch(&records, &sink)?;
    let _ = writeln!(
        out,
        "clean done: {} total, {} cleaned, {} malformed",
        stats.total, stats.evaluated, stats.errors
    );
    Ok(())
}

fn run_summary<W: Write>(args: &SummaryArgs, out: &mut W) -> Result<()> {
    let records = load_records(&args.input)?;
    let summary = summarize(&records);
    let rendered = serde_json::to_string_pretty(&summary)?;
    match &args.output {
        Some(path) => std::fs::write(path, rendered.as_bytes())?,
        None => {
            let _ = writeln!(out, "{rendered}");
        }
    }
    Ok(())
}

fn write_usage<W>(out: &mut W) -> io::Result<()>
where
    W: Write,
{
    writeln!(
        out,
        "Usage: geoscore <SUBCOMMAND> [OPTIONS]\n\
         \n\
         Subcommands:\n\
         \n\
         eval     --input predictions.jsonl --output evaluated.jsonl\n\
         \u{20}         [--host H] [--port N] [--user U] [--password P]\n\
         \u{20}         [--workers N] [--timeout-secs N] [--flush-every N] [--no-resume]\n\
         extract  --input records.jsonl --output picked.jsonl [--gold gold_picked.jsonl]\n\
         clean    --input raw.jsonl --output cleaned.jsonl\n\
         summary  --input evaluated.jsonl [--output summary.json]\n\
         \n\
         Examples:\n\
         \n\
         geoscore clean --input predictions.jsonl --output predictions_cleaned.jsonl\n\
         geoscore eval --input predictions_cleaned.jsonl --output evaluated.jsonl --password secret\n\
         geoscore summary --input evaluated.jsonl\n",
    )
}
