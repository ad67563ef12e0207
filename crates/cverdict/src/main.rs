//! cverdict - classify C source files as valid or invalid
//!
//! Usage: cverdict [OPTIONS] <inputs>...

use clap::{Parser as ClapParser, ValueEnum};
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use cverdict::common::{DiagnosticReporter, EngineResult, ReportFormat};
use cverdict::config;
use cverdict::driver::{Pipeline, read_source};
use cverdict::{AnalysisConfig, Verdict};
use std::path::{Path, PathBuf};
use std::process;
use std::thread;

/// Report format
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Default)]
enum Format {
    /// One compiler-style line per diagnostic
    #[default]
    Text,
    /// Annotated source excerpts
    Rich,
}

impl From<Format> for ReportFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Text => ReportFormat::Text,
            Format::Rich => ReportFormat::Rich,
        }
    }
}

#[derive(ClapParser, Debug)]
#[command(name = "cverdict")]
#[command(version)]
#[command(about = "Static validity checker for C source files", long_about = None)]
struct Args {
    /// C source files to check
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Treat warnings as failures
    #[arg(short, long)]
    strict: bool,

    /// Skip the uninitialized-read check
    #[arg(long)]
    no_uninit: bool,

    /// Skip the resource-leak check
    #[arg(long)]
    no_leak: bool,

    /// Skip the missing-return check
    #[arg(long)]
    no_missing_return: bool,

    /// Additional allocation function released by `free` (repeatable)
    #[arg(long = "alloc", value_name = "NAME")]
    allocators: Vec<String>,

    /// Additional release function for heap allocations (repeatable)
    #[arg(long = "release", value_name = "NAME")]
    releasers: Vec<String>,

    /// Report format
    #[arg(long, value_enum, default_value = "text")]
    format: Format,

    /// Dump AST (for debugging)
    #[arg(long)]
    dump_ast: bool,

    /// Dump tokens (for debugging)
    #[arg(long)]
    dump_tokens: bool,

    /// Worker threads used when checking several files
    #[arg(short, long, default_value = "1")]
    jobs: usize,

    /// Settings file applied after the user and project files
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

impl Args {
    /// Flags given on the command line win over every settings file
    fn apply(&self, config: &mut AnalysisConfig) {
        config.verbose |= self.verbose;
        config.strict |= self.strict;
        config.dump_tokens = self.dump_tokens;
        config.dump_ast = self.dump_ast;
        config.checks.uninit &= !self.no_uninit;
        config.checks.leak &= !self.no_leak;
        config.checks.missing_return &= !self.no_missing_return;
        config.allocators.extend(self.allocators.iter().cloned());
        config.releasers.extend(self.releasers.iter().cloned());
    }

    fn settings(&self) -> anyhow::Result<AnalysisConfig> {
        let cwd = std::env::current_dir()?;
        let (mut config, loaded) =
            config::load_layered(AnalysisConfig::default(), &cwd, self.config.as_deref())?;
        self.apply(&mut config);
        if config.verbose {
            for path in &loaded {
                eprintln!("Using settings from {}", path.display());
            }
        }
        Ok(config)
    }
}

fn main() {
    let args = Args::parse();

    match run(&args) {
        Ok(status) => process::exit(status),
        Err(e) => {
            eprintln!("error: {:#}", e);
            process::exit(2);
        }
    }
}

/// Source text and verdict for one input
type Checked = EngineResult<(String, Verdict)>;

fn check(pipeline: &Pipeline, path: &Path) -> Checked {
    let source = read_source(path)?;
    let verdict = pipeline.evaluate_source(&path.display().to_string(), &source)?;
    Ok((source, verdict))
}

/// Check every input, keeping results in input order
fn check_all(pipeline: &Pipeline, inputs: &[PathBuf], jobs: usize) -> Vec<Checked> {
    if jobs <= 1 || inputs.len() <= 1 {
        return inputs.iter().map(|path| check(pipeline, path)).collect();
    }

    let per_worker = inputs.len().div_ceil(jobs);
    thread::scope(|scope| {
        let workers: Vec<_> = inputs
            .chunks(per_worker)
            .map(|chunk| {
                scope.spawn(move || {
                    chunk
                        .iter()
                        .map(|path| check(pipeline, path))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        workers
            .into_iter()
            .flat_map(|worker| match worker.join() {
                Ok(results) => results,
                Err(panic) => std::panic::resume_unwind(panic),
            })
            .collect()
    })
}

/// Exit status: 2 on any input error, else 1 if any file is invalid
fn run(args: &Args) -> anyhow::Result<i32> {
    let pipeline = Pipeline::new(args.settings()?);

    if args.verbose {
        eprintln!("Checking {} file(s) with {} job(s)", args.inputs.len(), args.jobs.max(1));
    }

    let results = check_all(&pipeline, &args.inputs, args.jobs);

    let color = match args.format {
        Format::Text => ColorChoice::Never,
        Format::Rich => ColorChoice::Auto,
    };
    let mut stdout = StandardStream::stdout(color);
    let mut reporter = DiagnosticReporter::new();
    let mut input_failed = false;
    let mut any_invalid = false;

    for (path, result) in args.inputs.iter().zip(results) {
        match result {
            Ok((source, verdict)) => {
                let file_id = reporter.add_file(path.display().to_string(), source);
                reporter.emit(&mut stdout, file_id, &verdict, args.format.into())?;
                any_invalid |= !verdict.is_valid();
            }
            Err(e) => {
                eprintln!("error: {}", e);
                input_failed = true;
            }
        }
    }

    Ok(if input_failed {
        2
    } else if any_invalid {
        1
    } else {
        0
    })
}
