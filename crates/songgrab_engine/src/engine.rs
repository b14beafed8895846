use std::io;
use std::sync::mpsc;
use std::thread;

use engine_logging::engine_warn;

use crate::pipeline::Pipeline;
use crate::{EngineEvent, ExtractionMode, JobId};

enum EngineCommand {
    Enqueue {
        job_id: JobId,
        url: String,
        mode: ExtractionMode,
    },
}

/// Runs pipeline requests on a background tokio runtime.
///
/// Every enqueued URL becomes one task; completions arrive in finishing order.
/// Dropping the handle stops the runtime and cancels unfinished jobs.
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    event_rx: mpsc::Receiver<EngineEvent>,
}

impl EngineHandle {
    pub fn new(pipeline: Pipeline) -> io::Result<Self> {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let runtime = tokio::runtime::Runtime::new()?;

        thread::spawn(move || {
            while let Ok(command) = cmd_rx.recv() {
                let pipeline = pipeline.clone();
                let event_tx = event_tx.clone();
                runtime.spawn(async move {
                    handle_command(&pipeline, command, event_tx).await;
                });
            }
        });

        Ok(Self { cmd_tx, event_rx })
    }

    pub fn enqueue(&self, job_id: JobId, url: impl Into<String>, mode: ExtractionMode) {
        let _ = self.cmd_tx.send(EngineCommand::Enqueue {
            job_id,
            url: url.into(),
            mode,
        });
    }

    /// Block until the next job completes.
    pub fn recv(&self) -> Option<EngineEvent> {
        self.event_rx.recv().ok()
    }
}

async fn handle_command(pipeline: &Pipeline, command: EngineCommand, event_tx: mpsc::Sender<EngineEvent>) {
    match command {
        EngineCommand::Enqueue { job_id, url, mode } => {
            let result = pipeline.run(&url, mode).await;
            if let Err(err) = &result {
                engine_warn!("job {} failed for {}: {}", job_id, url, err);
            }
            let _ = event_tx.send(EngineEvent::Completed { job_id, url, result });
        }
    }
}
