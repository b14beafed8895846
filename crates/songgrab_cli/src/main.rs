mod config;
mod route;

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use engine_logging::{engine_info, engine_warn, LogDestination};
use log::LevelFilter;
use songgrab_engine::{ensure_output_dir, AtomicFileWriter, EngineHandle, ExtractionMode, Pipeline};

use crate::config::AppConfig;
use crate::route::{RunStatus, Sink};

/// Extract song metadata from song-sharing pages as JSON.
#[derive(Debug, Parser)]
#[command(name = "songgrab", version, about)]
struct Cli {
    /// Song page URLs, e.g. https://suno.com/song/<id>
    #[arg(required = true, value_name = "URL")]
    urls: Vec<String>,

    /// Only trust structured payloads; pages without one exit with code 3.
    #[arg(long)]
    strict: bool,

    /// RON config file (defaults to ./songgrab.ron when present).
    #[arg(short, long, env = "SONGGRAB_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write one JSON file per song into DIR instead of printing to stdout.
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Log destination: terminal, file or both.
    #[arg(long, value_name = "DEST")]
    log: Option<LogDestination>,

    /// Log level: off, error, warn, info, debug or trace.
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<LevelFilter>,

    /// Whole-request timeout in seconds.
    #[arg(long, value_name = "SECS")]
    timeout: Option<f64>,
}

impl Cli {
    /// Flags win over the config file.
    fn apply(&self, config: &mut AppConfig) -> anyhow::Result<()> {
        config.strict |= self.strict;
        if let Some(dir) = &self.output_dir {
            config.output_dir = Some(dir.clone());
        }
        if let Some(destination) = self.log {
            config.log.destination = destination;
        }
        if let Some(level) = self.log_level {
            config.log.level = level;
        }
        if let Some(secs) = self.timeout {
            anyhow::ensure!(
                secs.is_finite() && secs > 0.0,
                "--timeout must be a positive number of seconds"
            );
            config.fetch.request_timeout = std::time::Duration::from_secs_f64(secs);
        }
        Ok(())
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(status) => ExitCode::from(status.code()),
        Err(err) => {
            eprintln!("songgrab: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<RunStatus> {
    let mut config = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;
    cli.apply(&mut config)?;

    engine_logging::initialize(
        config.log.destination,
        config.log.level,
        config.log.file.as_deref(),
    );

    let sink = match &config.output_dir {
        Some(dir) => {
            ensure_output_dir(dir).with_context(|| format!("preparing output dir {dir:?}"))?;
            Sink::Directory(AtomicFileWriter::new(dir.clone()))
        }
        None => Sink::Stdout,
    };
    let mode = if config.strict {
        ExtractionMode::Strict
    } else {
        ExtractionMode::Lenient
    };

    let plan = route::plan(&cli.urls, &config.site);
    for (url, err) in &plan.rejected {
        engine_warn!("Skipping {}: {}", url, err);
        eprintln!("songgrab: skipping {url}: {err}");
    }

    let results = if plan.jobs.is_empty() {
        route::JobResults::new()
    } else {
        engine_info!("Extracting {} song page(s) in {:?} mode", plan.jobs.len(), mode);
        let pipeline = Pipeline::with_settings(config.fetch.clone(), config.site.clone());
        let engine = EngineHandle::new(pipeline).context("starting extraction runtime")?;
        route::dispatch(&engine, &plan.jobs, mode)
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut tally = route::emit(&plan.jobs, results, &sink, &mut out)?;
    out.flush()?;
    tally.rejected = plan.rejected.len();

    let status = tally.status();
    engine_info!("Finished: {:?} -> {:?}", tally, status);
    Ok(status)
}
