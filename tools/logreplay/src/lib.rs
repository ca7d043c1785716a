pub mod config;
pub mod engine;
pub mod errors;
pub mod jitter;
pub mod logging;
pub mod mirror;
pub mod runtime;
pub mod task;
pub mod types;

use clap::{error::ErrorKind, CommandFactory, Parser};
use config::{load_config, CliOverrides, ReplayConfig};
use engine::{ReplayEngine, RunSummary};
use errors::ReplayError;
use logging::{JsonlLogger, Reporter};
use runtime::{build_async_runtime, interrupt_signal, ProductionTerminal, Terminal};
use serde_json::json;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Parser)]
#[command(name = "logreplay", version)]
#[command(about = "Replay log events for testing log shipping configuration")]
pub struct Cli {
    /// Log input dir [default: /tmp/logreplay-input/]
    #[arg(short = 'i', long = "input", value_name = "INPUT_DIR")]
    pub input: Option<PathBuf>,
    /// Log output dir [default: /var/log/]
    #[arg(short = 'o', long = "output", value_name = "OUTPUT_DIR")]
    pub output: Option<PathBuf>,
    /// Time between log events in seconds, exclusive range (0.1-100.0) [default: 1.0]
    #[arg(short = 't', long = "time-interval", value_name = "INTERVAL")]
    pub interval: Option<f64>,
    /// Maximum randomized variation in seconds, plus and minus [default: 10.0]
    #[arg(
        short = 'r',
        long = "random-variation",
        value_name = "VARIATION",
        allow_negative_numbers = true
    )]
    pub variation: Option<f64>,
    /// Do not loop when the end of a log is reached
    #[arg(short = 'n', long = "no-loop", default_value_t = false)]
    pub no_loop: bool,
    /// TOML file with [replay] and [logging] tables
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Seed for the delay generator, for reproducible schedules
    #[arg(long)]
    pub seed: Option<u64>,
    /// Append structured JSONL events to this file
    #[arg(long = "log-file", value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            config_path: self.config.clone(),
            input_dir: self.input.clone(),
            output_dir: self.output.clone(),
            interval_seconds: self.interval,
            jitter_seconds: self.variation,
            no_loop: self.no_loop,
            seed: self.seed,
            jsonl_log: self.log_file.clone(),
        }
    }
}

pub fn run() -> Result<i32, ReplayError> {
    let args = std::env::args_os().collect::<Vec<_>>();
    let cwd = std::env::current_dir().map_err(|e| ReplayError::Io(e.to_string()))?;
    run_with_terminal(&args, &cwd, Arc::new(ProductionTerminal))
}

pub fn run_with_terminal(
    args: &[OsString],
    cwd: &Path,
    terminal: Arc<dyn Terminal>,
) -> Result<i32, ReplayError> {
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => match error.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                terminal.write_line(error.to_string().trim_end())?;
                return Ok(0);
            }
            _ => return Err(ReplayError::Cli(error.to_string())),
        },
    };

    let cfg = load_config(&cli.overrides(), cwd)?;
    let reporter = Reporter::new(terminal, cfg.jsonl_log.as_ref().map(JsonlLogger::new));
    let engine = ReplayEngine::from_config(&cfg, reporter.clone())?;
    let runtime = build_async_runtime()?;

    announce(&reporter, &cfg);
    let summary = runtime.block_on(engine.replay_tree(
        &cfg.input_dir,
        &cfg.output_dir,
        interrupt_signal(),
    ))?;
    Ok(exit_code(&summary))
}

fn announce(reporter: &Reporter, cfg: &ReplayConfig) {
    reporter.info(
        "startup",
        &format!(
            "Log Replay {VERSION}, replaying logs from {} to {}",
            cfg.input_dir.display(),
            cfg.output_dir.display()
        ),
        json!({
            "version": VERSION,
            "input_dir": cfg.input_dir.display().to_string(),
            "output_dir": cfg.output_dir.display().to_string(),
            "interval_seconds": cfg.interval_seconds,
            "jitter_seconds": cfg.jitter_seconds,
            "loop_forever": cfg.loop_forever,
        }),
    );
}

/// An interrupt is a normal way out; only tasks that died on I/O fail the run.
pub fn exit_code(summary: &RunSummary) -> i32 {
    if summary.failed > 0 && !summary.interrupted {
        1
    } else {
        0
    }
}

pub fn render_help() -> String {
    Cli::command().render_long_help().to_string()
}

#[cfg(test)]
mod tests {
    use super::{exit_code, render_help, run_with_terminal};
    use crate::engine::RunSummary;
    use crate::errors::ReplayError;
    use crate::runtime::FakeTerminal;
    use std::ffi::OsString;
    use std::path::Path;
    use std::sync::Arc;

    fn args(values: &[&str]) -> Vec<OsString> {
        values.iter().map(OsString::from).collect()
    }

    #[test]
    fn help_lists_replay_flags() {
        let help = render_help();
        for flag in ["--input", "--output", "--time-interval", "--random-variation", "--no-loop"] {
            assert!(help.contains(flag), "missing {flag}");
        }
    }

    #[test]
    fn version_exits_zero() {
        let terminal = FakeTerminal::new();
        let code = run_with_terminal(
            &args(&["logreplay", "--version"]),
            Path::new("/"),
            Arc::new(terminal.clone()),
        )
        .expect("version");
        assert_eq!(code, 0);
        assert!(terminal.written_lines()[0].contains(super::VERSION));
    }

    #[test]
    fn bad_interval_fails_before_touching_the_filesystem() {
        let terminal = FakeTerminal::new();
        let err = run_with_terminal(
            &args(&["logreplay", "-t", "0.1", "-i", "/nope", "-o", "/nope"]),
            Path::new("/"),
            Arc::new(terminal.clone()),
        )
        .expect_err("interval");
        assert!(matches!(err, ReplayError::InvalidConfig(_)));
        assert!(terminal.written_lines().is_empty());
    }

    #[test]
    fn single_pass_run_replays_and_cleans_up() {
        let input = tempfile::tempdir().expect("input");
        let output = tempfile::tempdir().expect("output");
        std::fs::create_dir(input.path().join("a")).expect("a");
        std::fs::write(input.path().join("a/app.log"), "one\ntwo\n").expect("app");

        let terminal = FakeTerminal::new();
        let code = run_with_terminal(
            &[
                OsString::from("logreplay"),
                OsString::from("-n"),
                OsString::from("-t"),
                OsString::from("0.15"),
                OsString::from("-r"),
                OsString::from("0"),
                OsString::from("-i"),
                input.path().as_os_str().to_os_string(),
                OsString::from("-o"),
                output.path().as_os_str().to_os_string(),
            ],
            Path::new("/"),
            Arc::new(terminal.clone()),
        )
        .expect("run");

        assert_eq!(code, 0);
        let lines = terminal.written_lines();
        assert!(lines[0].starts_with("Log Replay"));
        assert_eq!(
            lines
                .iter()
                .filter(|line| line.starts_with("Writing log entry"))
                .count(),
            2
        );
        assert!(!output.path().join("a").exists());
    }

    #[test]
    fn failed_tasks_fail_the_exit_code_unless_interrupted() {
        let mut summary = RunSummary {
            completed: 3,
            ..RunSummary::default()
        };
        assert_eq!(exit_code(&summary), 0);
        summary.failed = 1;
        assert_eq!(exit_code(&summary), 1);
        summary.interrupted = true;
        assert_eq!(exit_code(&summary), 0);
    }
}
