//! Runs one replay task per file pair and tears the output tree down afterwards.

use crate::config::{ReplayConfig, ReplaySettings};
use crate::errors::ReplayError;
use crate::jitter::JitterClock;
use crate::logging::Reporter;
use crate::mirror::TreeMirror;
use crate::task::{ReplayTask, TaskOutcome};
use crate::types::{FilePair, OutputTreeSnapshot};
use serde_json::json;
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::watch;
use tokio::task::{JoinError, JoinSet};

/// Broadcasts a one-way cancel to every task holding a [`CancelToken`].
#[derive(Debug)]
pub struct CancelSignal {
    tx: watch::Sender<bool>,
}

impl CancelSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn token(&self) -> CancelToken {
        CancelToken {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancel has been broadcast; never resolves if the signal is dropped first.
    pub async fn cancelled(&mut self) {
        if self.rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub completed: usize,
    pub cancelled: usize,
    pub skipped: usize,
    pub failed: usize,
    pub interrupted: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub removed: Vec<PathBuf>,
    pub failures: Vec<(PathBuf, String)>,
}

pub struct ReplayEngine {
    settings: ReplaySettings,
    jitter: JitterClock,
    reporter: Reporter,
    cancel: CancelSignal,
}

impl ReplayEngine {
    pub fn new(settings: ReplaySettings, jitter: JitterClock, reporter: Reporter) -> Self {
        Self {
            settings,
            jitter,
            reporter,
            cancel: CancelSignal::new(),
        }
    }

    pub fn from_config(cfg: &ReplayConfig, reporter: Reporter) -> Result<Self, ReplayError> {
        let jitter = match cfg.seed {
            Some(seed) => JitterClock::seeded(seed),
            None => JitterClock::from_entropy(),
        };
        Ok(Self::new(cfg.settings()?, jitter, reporter))
    }

    pub fn cancel_signal(&self) -> &CancelSignal {
        &self.cancel
    }

    /// Mirrors `input_dir` into `output_dir`, replays every pair until done or
    /// interrupted, then removes what the mirror created. Cleanup runs even
    /// when mirroring fails partway or is interrupted.
    pub async fn replay_tree<F>(
        &self,
        input_dir: &Path,
        output_dir: &Path,
        interrupt: F,
    ) -> Result<RunSummary, ReplayError>
    where
        F: Future<Output = ()>,
    {
        let mut mirror = TreeMirror::new(input_dir, output_dir, self.reporter.clone());
        let mut build = tokio::task::spawn_blocking(move || {
            let pairs = mirror.build();
            (mirror, pairs)
        });
        tokio::pin!(interrupt);

        let (mirror, built) = tokio::select! {
            biased;
            _ = &mut interrupt => {
                self.announce_interrupt(0);
                // The walk is blocking; let it finish so its snapshot is complete.
                let (mirror, _) = build.await.map_err(mirror_aborted)?;
                self.cleanup(mirror.snapshot());
                return Ok(RunSummary {
                    interrupted: true,
                    ..RunSummary::default()
                });
            }
            joined = &mut build => joined.map_err(mirror_aborted)?,
        };

        let outcome = match built {
            Ok(pairs) => Ok(self.run_until(pairs, interrupt).await),
            Err(error) => Err(error),
        };
        self.cleanup(mirror.snapshot());
        outcome
    }

    pub async fn run_until<F>(&self, pairs: Vec<FilePair>, interrupt: F) -> RunSummary
    where
        F: Future<Output = ()>,
    {
        let mut tasks = JoinSet::new();
        for pair in pairs {
            let task = ReplayTask::new(
                pair.clone(),
                self.settings,
                self.jitter.clone(),
                self.reporter.clone(),
            );
            let token = self.cancel.token();
            tasks.spawn(async move { (pair, task.run(token).await) });
        }

        let mut summary = RunSummary::default();
        tokio::pin!(interrupt);
        loop {
            tokio::select! {
                joined = tasks.join_next() => match joined {
                    Some(result) => self.record(&mut summary, result),
                    None => break,
                },
                _ = &mut interrupt, if !summary.interrupted => {
                    summary.interrupted = true;
                    self.announce_interrupt(tasks.len());
                    self.cancel.cancel();
                }
            }
        }
        summary
    }

    fn announce_interrupt(&self, running_tasks: usize) {
        self.reporter.info(
            "interrupted",
            "Caught interrupt, exiting...",
            json!({ "running_tasks": running_tasks }),
        );
    }

    fn record(
        &self,
        summary: &mut RunSummary,
        result: Result<(FilePair, Result<TaskOutcome, ReplayError>), JoinError>,
    ) {
        match result {
            Ok((_, Ok(TaskOutcome::Completed { .. }))) => summary.completed += 1,
            Ok((_, Ok(TaskOutcome::Cancelled { .. }))) => summary.cancelled += 1,
            Ok((_, Ok(TaskOutcome::SkippedEmpty))) => summary.skipped += 1,
            Ok((pair, Err(error))) => {
                summary.failed += 1;
                self.reporter.error(
                    "task_failed",
                    &format!("replay of {} failed: {error}", pair.input.display()),
                    json!({
                        "input": pair.input.display().to_string(),
                        "error": error.to_string(),
                    }),
                );
            }
            Err(error) => {
                summary.failed += 1;
                self.reporter.error(
                    "task_failed",
                    &format!("replay task aborted: {error}"),
                    json!({ "error": error.to_string() }),
                );
            }
        }
    }

    /// Removes every top-level entry recorded in `snapshot`. Failures are
    /// reported and returned, never raised.
    pub fn cleanup(&self, snapshot: &OutputTreeSnapshot) -> CleanupReport {
        let mut report = CleanupReport::default();
        for dir in snapshot.directories() {
            self.remove_entry(&mut report, dir, |path: &Path| std::fs::remove_dir_all(path));
        }
        for file in snapshot.files() {
            self.remove_entry(&mut report, file, |path: &Path| std::fs::remove_file(path));
        }
        if !snapshot.is_empty() {
            self.reporter.info(
                "cleanup",
                &format!(
                    "Removed {} replayed entries from {}",
                    report.removed.len(),
                    snapshot.root().display()
                ),
                json!({ "removed": report.removed.len(), "failed": report.failures.len() }),
            );
        }
        report
    }

    fn remove_entry(
        &self,
        report: &mut CleanupReport,
        path: PathBuf,
        remove: fn(&Path) -> std::io::Result<()>,
    ) {
        match remove(&path) {
            Ok(()) => report.removed.push(path),
            // Never written, e.g. an empty input's output file.
            Err(error) if error.kind() == ErrorKind::NotFound => {}
            Err(error) => {
                self.reporter.error(
                    "cleanup_failed",
                    &format!("cleanup failed: {}: {error}", path.display()),
                    json!({ "path": path.display().to_string(), "error": error.to_string() }),
                );
                report.failures.push((path, error.to_string()));
            }
        }
    }
}

fn mirror_aborted(error: JoinError) -> ReplayError {
    ReplayError::Runtime(format!("mirroring aborted: {error}"))
}
