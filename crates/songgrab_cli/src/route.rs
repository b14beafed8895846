//! Turns command-line URLs into engine jobs and engine results into output.

use std::collections::BTreeMap;
use std::io::Write;

use anyhow::Context;
use engine_logging::{engine_info, engine_warn};
use serde_json::json;
use songgrab_engine::{
    AtomicFileWriter, EngineEvent, EngineHandle, ExtractionMode, ExtractionOutcome, FetchError,
    JobId, SiteProfile, SongUrlError,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: JobId,
    pub url: String,
}

#[derive(Debug, Default)]
pub struct Plan {
    pub jobs: Vec<Job>,
    pub rejected: Vec<(String, SongUrlError)>,
}

/// Split `urls` into song-page jobs and rejected inputs.
///
/// Job ids follow input position so results can be re-sorted into input order.
pub fn plan(urls: &[String], site: &SiteProfile) -> Plan {
    let mut plan = Plan::default();
    for (index, url) in urls.iter().enumerate() {
        match site.song_id(url) {
            Ok(_) => plan.jobs.push(Job {
                id: index as JobId,
                url: url.trim().to_string(),
            }),
            Err(err) => plan.rejected.push((url.clone(), err)),
        }
    }
    plan
}

pub type JobResults = BTreeMap<JobId, Result<ExtractionOutcome, FetchError>>;

/// Enqueue every job and block until each one has reported.
pub fn dispatch(engine: &EngineHandle, jobs: &[Job], mode: ExtractionMode) -> JobResults {
    for job in jobs {
        engine.enqueue(job.id, job.url.clone(), mode);
    }

    let mut results = JobResults::new();
    while results.len() < jobs.len() {
        let Some(EngineEvent::Completed { job_id, url, result }) = engine.recv() else {
            engine_warn!("Engine stopped with {} job(s) outstanding", jobs.len() - results.len());
            break;
        };
        engine_info!("Job {} finished: {}", job_id, url);
        results.insert(job_id, result);
    }
    results
}

/// Where extractions go.
pub enum Sink {
    /// One pretty JSON document per URL on the writer passed to [`emit`].
    Stdout,
    /// One file per found song; failures are only reported on stderr.
    Directory(AtomicFileWriter),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub found: usize,
    pub not_found: usize,
    pub failed: usize,
    pub rejected: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Ok,
    FetchFailed,
    InvalidInput,
    NotFound,
}

impl RunStatus {
    pub fn code(self) -> u8 {
        match self {
            RunStatus::Ok => 0,
            RunStatus::FetchFailed => 1,
            RunStatus::InvalidInput => 2,
            RunStatus::NotFound => 3,
        }
    }
}

impl Tally {
    /// Fetch failures outrank invalid input, which outranks strict misses.
    /// Invalid input only counts when nothing else succeeded.
    pub fn status(&self) -> RunStatus {
        if self.failed > 0 {
            RunStatus::FetchFailed
        } else if self.rejected > 0 && self.found == 0 {
            RunStatus::InvalidInput
        } else if self.not_found > 0 {
            RunStatus::NotFound
        } else {
            RunStatus::Ok
        }
    }
}

/// Write results for `jobs` in job order and count the outcomes.
pub fn emit(
    jobs: &[Job],
    mut results: JobResults,
    sink: &Sink,
    out: &mut impl Write,
) -> anyhow::Result<Tally> {
    let mut tally = Tally::default();
    for job in jobs {
        let document = match results.remove(&job.id) {
            Some(Ok(ExtractionOutcome::Found(extraction))) => {
                tally.found += 1;
                match sink {
                    Sink::Stdout => Some(serde_json::to_value(&*extraction)?),
                    Sink::Directory(writer) => {
                        let path = writer
                            .write_extraction(&extraction)
                            .with_context(|| format!("writing extraction for {}", job.url))?;
                        engine_info!("Wrote {:?}", path);
                        None
                    }
                }
            }
            Some(Ok(ExtractionOutcome::NotFound { url })) => {
                tally.not_found += 1;
                report(sink, &url, "no structured song payload found")
            }
            Some(Err(err)) => {
                tally.failed += 1;
                report(sink, &job.url, &err.to_string())
            }
            None => {
                tally.failed += 1;
                report(sink, &job.url, "extraction did not complete")
            }
        };

        if let Some(document) = document {
            serde_json::to_writer_pretty(&mut *out, &document)?;
            writeln!(out)?;
        }
    }
    Ok(tally)
}

fn report(sink: &Sink, url: &str, error: &str) -> Option<serde_json::Value> {
    match sink {
        Sink::Stdout => Some(json!({ "url": url, "error": error })),
        Sink::Directory(_) => {
            eprintln!("songgrab: {url}: {error}");
            None
        }
    }
}
