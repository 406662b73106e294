//! Configuration system for the `cloudtask-sim` runner.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/cloudtask/config.toml`)
//! 4. Compiled defaults

use std::path::PathBuf;
use std::time::Duration;

use cloudtask::tasks::ExecutorConfig;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct SimConfigFile {
    executor: ExecutorFileConfig,
    scenario: ScenarioFileConfig,
}

/// `[executor]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ExecutorFileConfig {
    name: Option<String>,
    poll_interval_ms: Option<u64>,
    shutdown_grace_secs: Option<u64>,
    long_task_threshold_secs: Option<u64>,
}

/// `[scenario]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ScenarioFileConfig {
    tasks: Option<usize>,
    fail_every: Option<usize>,
    task_duration_ms: Option<u64>,
    status_interval_ms: Option<u64>,
}

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

/// CLI arguments for the simulation runner.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Run simulated VM operations through the cloudtask executor")]
pub struct SimCliArgs {
    /// Path to config file (default: `~/.config/cloudtask/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Number of simulated operations to submit.
    #[arg(short, long)]
    pub tasks: Option<usize>,

    /// Make every n-th operation fail (0 disables failures).
    #[arg(long)]
    pub fail_every: Option<usize>,

    /// Duration of each simulated operation in milliseconds.
    #[arg(long)]
    pub task_duration_ms: Option<u64>,

    /// Delay between executor polling ticks in milliseconds.
    #[arg(long, env = "CLOUDTASK_POLL_INTERVAL_MS")]
    pub poll_interval_ms: Option<u64>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "CLOUDTASK_LOG")]
    pub log_level: String,
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// Parameters of one simulated run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioConfig {
    /// Number of simulated operations.
    pub tasks: usize,
    /// Every n-th operation fails; 0 disables failures.
    pub fail_every: usize,
    /// Duration of each operation.
    pub task_duration: Duration,
    /// Interval of the periodic status log.
    pub status_interval: Duration,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            tasks: 8,
            fail_every: 3,
            task_duration: Duration::from_millis(500),
            status_interval: Duration::from_secs(1),
        }
    }
}

/// Fully resolved runner configuration.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Name of the executor polling loop, used in logs.
    pub executor_name: String,
    /// Executor timings.
    pub executor: ExecutorConfig,
    /// Simulated workload.
    pub scenario: ScenarioConfig,
    /// Log level filter string.
    pub log_level: String,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            executor_name: "cloudtask-sim".to_string(),
            executor: ExecutorConfig::default(),
            scenario: ScenarioConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl SimConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// If `--config` is given and the file does not exist, returns an error.
    /// If no `--config` is given, the default path is tried and missing file
    /// is treated as empty config.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the explicit config file cannot be read
    /// or parsed.
    pub fn load(cli: &SimCliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, &file))
    }

    /// Resolve a `SimConfig` from CLI args and a parsed config file.
    ///
    /// Priority: CLI > file > default.
    #[must_use]
    fn resolve(cli: &SimCliArgs, file: &SimConfigFile) -> Self {
        let defaults = Self::default();

        let executor = ExecutorConfig {
            poll_interval: cli
                .poll_interval_ms
                .or(file.executor.poll_interval_ms)
                .map_or(defaults.executor.poll_interval, Duration::from_millis),
            shutdown_grace: file
                .executor
                .shutdown_grace_secs
                .map_or(defaults.executor.shutdown_grace, Duration::from_secs),
            long_task_threshold: file
                .executor
                .long_task_threshold_secs
                .map_or(defaults.executor.long_task_threshold, Duration::from_secs),
        };

        let scenario = ScenarioConfig {
            tasks: cli
                .tasks
                .or(file.scenario.tasks)
                .unwrap_or(defaults.scenario.tasks),
            fail_every: cli
                .fail_every
                .or(file.scenario.fail_every)
                .unwrap_or(defaults.scenario.fail_every),
            task_duration: cli
                .task_duration_ms
                .or(file.scenario.task_duration_ms)
                .map_or(defaults.scenario.task_duration, Duration::from_millis),
            status_interval: file
                .scenario
                .status_interval_ms
                .map_or(defaults.scenario.status_interval, Duration::from_millis),
        };

        Self {
            executor_name: file
                .executor
                .name
                .clone()
                .unwrap_or(defaults.executor_name),
            executor,
            scenario,
            log_level: cli.log_level.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Load and parse a TOML config file.
fn load_config_file(explicit_path: Option<&std::path::Path>) -> Result<SimConfigFile, ConfigError> {
    let path = if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    } else {
        let Some(config_dir) = dirs::config_dir() else {
            return Ok(SimConfigFile::default());
        };
        config_dir.join("cloudtask").join("config.toml")
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(SimConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
