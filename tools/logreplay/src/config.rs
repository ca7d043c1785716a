use crate::errors::ReplayError;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_INPUT_DIR: &str = "/tmp/logreplay-input/";
pub const DEFAULT_OUTPUT_DIR: &str = "/var/log/";
pub const DEFAULT_INTERVAL_SECONDS: f64 = 1.0;
pub const DEFAULT_JITTER_SECONDS: f64 = 10.0;
pub const MIN_INTERVAL_SECONDS: f64 = 0.1;
pub const MAX_INTERVAL_SECONDS: f64 = 100.0;

#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_path: Option<PathBuf>,
    pub input_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub interval_seconds: Option<f64>,
    pub jitter_seconds: Option<f64>,
    pub no_loop: bool,
    pub seed: Option<u64>,
    pub jsonl_log: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReplayConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub interval_seconds: f64,
    pub jitter_seconds: f64,
    pub loop_forever: bool,
    pub seed: Option<u64>,
    pub jsonl_log: Option<PathBuf>,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from(DEFAULT_INPUT_DIR),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            interval_seconds: DEFAULT_INTERVAL_SECONDS,
            jitter_seconds: DEFAULT_JITTER_SECONDS,
            loop_forever: true,
            seed: None,
            jsonl_log: None,
        }
    }
}

impl ReplayConfig {
    pub fn settings(&self) -> Result<ReplaySettings, ReplayError> {
        ReplaySettings::new(self.interval_seconds, self.jitter_seconds, self.loop_forever)
    }
}

/// The validated timing knobs every replay task runs with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplaySettings {
    interval_seconds: f64,
    jitter_seconds: f64,
    loop_forever: bool,
}

impl ReplaySettings {
    pub fn new(
        interval_seconds: f64,
        jitter_seconds: f64,
        loop_forever: bool,
    ) -> Result<Self, ReplayError> {
        validate_interval(interval_seconds)?;
        validate_jitter(jitter_seconds)?;
        Ok(Self {
            interval_seconds,
            jitter_seconds,
            loop_forever,
        })
    }

    pub fn interval_seconds(&self) -> f64 {
        self.interval_seconds
    }

    pub fn jitter_seconds(&self) -> f64 {
        self.jitter_seconds
    }

    pub fn loop_forever(&self) -> bool {
        self.loop_forever
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PartialReplayFile {
    replay: Option<PartialReplaySection>,
    logging: Option<PartialLoggingSection>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PartialReplaySection {
    input_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    interval_seconds: Option<f64>,
    jitter_seconds: Option<f64>,
    loop_forever: Option<bool>,
    seed: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PartialLoggingSection {
    jsonl_path: Option<PathBuf>,
}

pub fn load_config(
    overrides: &CliOverrides,
    process_cwd: &Path,
) -> Result<ReplayConfig, ReplayError> {
    let mut cfg = ReplayConfig::default();

    if let Some(path) = &overrides.config_path {
        let path = absolutize_path(process_cwd, path);
        let contents = std::fs::read_to_string(&path).map_err(|e| ReplayError::io(&path, e))?;
        let partial: PartialReplayFile =
            toml::from_str(&contents).map_err(|e| ReplayError::ConfigParse(e.to_string()))?;
        merge_partial_config(&mut cfg, partial);
    }

    apply_cli_overrides(&mut cfg, overrides);

    cfg.input_dir = absolutize_path(process_cwd, &cfg.input_dir);
    cfg.output_dir = absolutize_path(process_cwd, &cfg.output_dir);
    cfg.jsonl_log = cfg
        .jsonl_log
        .as_deref()
        .map(|path| absolutize_path(process_cwd, path));

    validate_config(&cfg)?;
    Ok(cfg)
}

fn merge_partial_config(cfg: &mut ReplayConfig, partial: PartialReplayFile) {
    if let Some(replay) = partial.replay {
        if let Some(value) = replay.input_dir {
            cfg.input_dir = value;
        }
        if let Some(value) = replay.output_dir {
            cfg.output_dir = value;
        }
        if let Some(value) = replay.interval_seconds {
            cfg.interval_seconds = value;
        }
        if let Some(value) = replay.jitter_seconds {
            cfg.jitter_seconds = value;
        }
        if let Some(value) = replay.loop_forever {
            cfg.loop_forever = value;
        }
        if let Some(value) = replay.seed {
            cfg.seed = Some(value);
        }
    }

    if let Some(logging) = partial.logging {
        if let Some(value) = logging.jsonl_path {
            cfg.jsonl_log = Some(value);
        }
    }
}

fn apply_cli_overrides(cfg: &mut ReplayConfig, overrides: &CliOverrides) {
    if let Some(path) = &overrides.input_dir {
        cfg.input_dir = path.clone();
    }
    if let Some(path) = &overrides.output_dir {
        cfg.output_dir = path.clone();
    }
    if let Some(value) = overrides.interval_seconds {
        cfg.interval_seconds = value;
    }
    if let Some(value) = overrides.jitter_seconds {
        cfg.jitter_seconds = value;
    }
    if overrides.no_loop {
        cfg.loop_forever = false;
    }
    if let Some(seed) = overrides.seed {
        cfg.seed = Some(seed);
    }
    if let Some(path) = &overrides.jsonl_log {
        cfg.jsonl_log = Some(path.clone());
    }
}

fn absolutize_path(base: &Path, value: &Path) -> PathBuf {
    if value.is_absolute() {
        value.to_path_buf()
    } else {
        base.join(value)
    }
}

pub fn validate_config(cfg: &ReplayConfig) -> Result<(), ReplayError> {
    validate_interval(cfg.interval_seconds)?;
    validate_jitter(cfg.jitter_seconds)
}

fn validate_interval(interval: f64) -> Result<(), ReplayError> {
    // Open range: both bounds are rejected, and so is NaN.
    if !(interval > MIN_INTERVAL_SECONDS && interval < MAX_INTERVAL_SECONDS) {
        return Err(ReplayError::InvalidConfig(format!(
            "Invalid time interval value: {interval} (must be between {MIN_INTERVAL_SECONDS} and {MAX_INTERVAL_SECONDS}, exclusive)"
        )));
    }
    Ok(())
}

fn validate_jitter(jitter: f64) -> Result<(), ReplayError> {
    if !jitter.is_finite() || jitter < 0.0 {
        return Err(ReplayError::InvalidConfig(format!(
            "Invalid random variation value: {jitter} (must be a finite number >= 0)"
        )));
    }
    Ok(())
}
