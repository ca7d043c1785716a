use crate::config::ReplaySettings;
use crate::engine::CancelToken;
use crate::errors::{ReplayError, ReplayWarning};
use crate::jitter::JitterClock;
use crate::logging::Reporter;
use crate::types::FilePair;
use serde_json::json;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Only reachable when looping is off.
    Completed { passes: u64, lines: u64 },
    Cancelled { lines: u64 },
    SkippedEmpty,
}

/// Rewrites one output file from its input, line by line, on a jittered cadence.
pub struct ReplayTask {
    pair: FilePair,
    settings: ReplaySettings,
    jitter: JitterClock,
    reporter: Reporter,
}

impl ReplayTask {
    pub fn new(
        pair: FilePair,
        settings: ReplaySettings,
        jitter: JitterClock,
        reporter: Reporter,
    ) -> Self {
        Self {
            pair,
            settings,
            jitter,
            reporter,
        }
    }

    pub async fn run(self, mut cancel: CancelToken) -> Result<TaskOutcome, ReplayError> {
        let input = &self.pair.input;
        let output = &self.pair.output;
        let size = std::fs::metadata(input)
            .map_err(|e| ReplayError::io(input, e))?
            .len();
        if size == 0 {
            self.reporter
                .warn(&ReplayWarning::EmptyInput(input.clone()));
            return Ok(TaskOutcome::SkippedEmpty);
        }

        self.reporter.info(
            "loop_start",
            &format!("Starting write loop for file {}", output.display()),
            json!({ "input": input.display().to_string(), "output": output.display().to_string() }),
        );

        let mut passes = 0u64;
        let mut lines = 0u64;
        loop {
            if cancel.is_cancelled() {
                return Ok(TaskOutcome::Cancelled { lines });
            }

            let mut reader =
                BufReader::new(File::open(input).map_err(|e| ReplayError::io(input, e))?);
            // Truncates, so every pass starts from an empty output file.
            let mut writer = File::create(output).map_err(|e| ReplayError::io(output, e))?;
            let mut line = Vec::new();
            let mut pass_lines = 0u64;
            loop {
                line.clear();
                let read = reader
                    .read_until(b'\n', &mut line)
                    .map_err(|e| ReplayError::io(input, e))?;
                if read == 0 {
                    break;
                }

                self.reporter.info(
                    "line_written",
                    &format!(
                        "Writing log entry {} -> {}",
                        input.display(),
                        output.display()
                    ),
                    json!({ "output": output.display().to_string(), "line": pass_lines + 1 }),
                );
                writer
                    .write_all(&line)
                    .and_then(|()| writer.flush())
                    .map_err(|e| ReplayError::io(output, e))?;
                pass_lines += 1;
                lines += 1;

                let delay = self
                    .jitter
                    .next_delay(self.settings.interval_seconds(), self.settings.jitter_seconds());
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => return Ok(TaskOutcome::Cancelled { lines }),
                }
            }
            passes += 1;

            // Truncated after startup; looping on it would never suspend.
            if pass_lines == 0 {
                self.reporter
                    .warn(&ReplayWarning::EmptyInput(input.clone()));
                return Ok(TaskOutcome::SkippedEmpty);
            }
            if !self.settings.loop_forever() {
                return Ok(TaskOutcome::Completed { passes, lines });
            }
        }
    }
}
