//! Job runner - analyses PGN files and writes their reports.
//!
//! Every file becomes one [`AnalysisJob`]. Jobs run concurrently; the
//! engine pool behind the [`Analyzer`] bounds how many engines work at once.
//! The runner starts at most one job per pool engine, so a batch of any size
//! waits here instead of overflowing the pool's wait queue.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chess_analysis::{AnalysisJob, Analyzer, EngineLauncher, JobStatus, ProcessLauncher};
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// Outcome of one file.
#[derive(Debug, Serialize)]
pub struct JobReport {
    /// The PGN file the job was read from.
    pub file: PathBuf,
    #[serde(flatten)]
    pub job: AnalysisJob,
}

impl JobReport {
    pub fn succeeded(&self) -> bool {
        self.job.status() == JobStatus::Completed
    }
}

/// Runs analysis jobs for a batch of PGN files.
pub struct JobRunner<L: EngineLauncher = ProcessLauncher> {
    analyzer: Arc<Analyzer<L>>,
    /// Directory for `<stem>.json` reports; stdout when `None`.
    output_dir: Option<PathBuf>,
}

impl<L: EngineLauncher> JobRunner<L> {
    pub fn new(analyzer: Arc<Analyzer<L>>, output_dir: Option<PathBuf>) -> Self {
        Self {
            analyzer,
            output_dir,
        }
    }

    /// Analyses every file and writes one report per file, in input order.
    ///
    /// A failed analysis is a failed report, not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be read or a report cannot be
    /// written.
    pub async fn run_all(
        &self,
        files: &[PathBuf],
        cancel: &CancellationToken,
    ) -> anyhow::Result<Vec<JobReport>> {
        let in_flight = Arc::new(Semaphore::new(self.analyzer.pool().size().max(1)));
        let mut handles = Vec::with_capacity(files.len());
        for file in files {
            let pgn = tokio::fs::read_to_string(file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let slot = Arc::clone(&in_flight)
                .acquire_owned()
                .await
                .context("Job admission closed")?;

            let analyzer = Arc::clone(&self.analyzer);
            let cancel = cancel.clone();
            let file = file.clone();
            handles.push(tokio::spawn(async move {
                let _slot = slot;
                let mut job = AnalysisJob::new(pgn);
                tracing::info!("Queued {} as job {}", file.display(), job.id);
                analyzer.run_job(&mut job, &cancel).await?;
                Ok::<_, anyhow::Error>(JobReport { file, job })
            }));
        }

        let mut reports = Vec::with_capacity(handles.len());
        for handle in handles {
            let report = handle.await.context("Analysis task panicked")??;
            self.write_report(&report)?;
            reports.push(report);
        }
        Ok(reports)
    }

    fn write_report(&self, report: &JobReport) -> anyhow::Result<()> {
        match &self.output_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create {}", dir.display()))?;
                let path = report_path(dir, &report.file);
                let json = serde_json::to_string_pretty(report)?;
                std::fs::write(&path, json)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                tracing::info!("Wrote {}", path.display());
            }
            None => println!("{}", serde_json::to_string_pretty(report)?),
        }
        Ok(())
    }
}

/// `<dir>/<file stem>.json`
fn report_path(dir: &Path, file: &Path) -> PathBuf {
    let stem = file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "game".to_string());
    dir.join(format!("{}.json", stem))
}
