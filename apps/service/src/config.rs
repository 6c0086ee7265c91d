use std::time::Duration;
use std::{env, fmt, fs, path};

use nodebeat::{SchedulePolicy, TimeoutBudget};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::duration::{self, format_duration};

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read config {0}: {1}")]
    ReadFailed(path::PathBuf, #[source] std::io::Error),
    #[error("failed to write config {0}: {1}")]
    WriteFailed(path::PathBuf, #[source] std::io::Error),
    #[error("failed to parse config: {0}")]
    ParseFailed(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),
    #[error("no config path available: set XDG_CONFIG_HOME or HOME")]
    ConfigPathUnavailable,
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Time between probe cycles
    #[serde(with = "duration::text")]
    pub period: Duration,
    /// Node list JSON file
    pub nodes: path::PathBuf,
    pub public_ip_url: String,
    pub log_level: String,
    pub tracer: Tracer,
    pub scheduler: Scheduler,
    pub output: Output,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tracer {
    pub use_tls: bool,
    #[serde(with = "duration::text")]
    pub connect_timeout: Duration,
    #[serde(with = "duration::text")]
    pub tls_timeout: Duration,
    #[serde(with = "duration::text")]
    pub request_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scheduler {
    pub probes_per_tick: usize,
    pub max_concurrent_probes: usize,
    pub emit_failure_records: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    Stdout,
    File,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Output {
    pub kind: OutputKind,
    /// Append target when `kind = "file"`
    pub path: path::PathBuf,
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/nodebeat/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, Error> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(Error::ConfigPathUnavailable);
    };

    Ok(path.join("nodebeat/config.toml"))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(1),
            nodes: path::PathBuf::from("nodes.json"),
            public_ip_url: nodebeat::resolver::DEFAULT_PUBLIC_IP_URL.to_string(),
            log_level: "info".into(),
            tracer: Tracer::default(),
            scheduler: Scheduler::default(),
            output: Output::default(),
        }
    }
}

impl Default for Tracer {
    fn default() -> Self {
        let budget = TimeoutBudget::default();
        Self {
            use_tls: false,
            connect_timeout: budget.connect,
            tls_timeout: budget.tls_handshake,
            request_timeout: budget.request,
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        let policy = SchedulePolicy::default();
        Self {
            probes_per_tick: policy.probes_per_tick,
            max_concurrent_probes: policy.max_concurrent_probes,
            emit_failure_records: policy.emit_failure_records,
        }
    }
}

impl Default for Output {
    fn default() -> Self {
        Self { kind: OutputKind::Stdout, path: path::PathBuf::from("events.ndjson") }
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputKind::Stdout => write!(f, "stdout"),
            OutputKind::File => write!(f, "file"),
        }
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_0 = write_indented(0);
        let write_1 = write_indented(1);

        writeln!(f, "Current Internal Configuration State:")?;
        write_0(f, "Period", &format_duration(self.period))?;
        write_0(f, "Node List", &self.nodes.display())?;
        write_0(f, "Public IP Service", &self.public_ip_url)?;
        write_0(f, "Log Level", &self.log_level)?;

        write_title_1(f, "Tracer")?;
        write_1(f, "Use TLS", &self.tracer.use_tls)?;
        write_1(f, "Connect Timeout", &format_duration(self.tracer.connect_timeout))?;
        write_1(f, "TLS Timeout", &format_duration(self.tracer.tls_timeout))?;
        write_1(f, "Request Timeout", &format_duration(self.tracer.request_timeout))?;

        write_title_1(f, "Scheduler")?;
        write_1(f, "Probes Per Tick", &self.scheduler.probes_per_tick)?;
        write_1(f, "Max Concurrent Probes", &self.scheduler.max_concurrent_probes)?;
        write_1(f, "Emit Failure Records", &self.scheduler.emit_failure_records)?;

        write_title_1(f, "Output")?;
        write_1(f, "Kind", &self.output.kind)?;
        if self.output.kind == OutputKind::File {
            write_1(f, "Path", &self.output.path.display())?;
        }

        Ok(())
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/nodebeat/config.toml
    ///  or the specified path, with the name config.toml if one does not exist
    ///
    /// ```rust,ignore
    /// let cfg = config::Config::from_config(None::<&path::Path>)?;
    /// println!("{}", cfg);
    /// ```
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, Error> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path)
                .map_err(|err| Error::ReadFailed(config_path.clone(), err))?;
            Ok(toml::from_str(raw_string.as_str())?)
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            Ok(config)
        }
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), Error> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| Error::WriteFailed(path.to_path_buf(), err))?;
        }

        fs::write(path, config_str).map_err(|err| Error::WriteFailed(path.to_path_buf(), err))
    }

    /// Reject values the probe loop cannot run with
    pub fn validate(&self) -> Result<(), Error> {
        if self.period.is_zero() {
            return Err(Error::Invalid("period must be greater than zero".into()));
        }
        for (name, value) in [
            ("tracer.connect_timeout", self.tracer.connect_timeout),
            ("tracer.tls_timeout", self.tracer.tls_timeout),
            ("tracer.request_timeout", self.tracer.request_timeout),
        ] {
            if value.is_zero() {
                return Err(Error::Invalid(format!("{name} must be greater than zero")));
            }
        }
        if self.scheduler.probes_per_tick == 0 || self.scheduler.max_concurrent_probes == 0 {
            return Err(Error::Invalid(
                "scheduler.probes_per_tick and scheduler.max_concurrent_probes must be at least 1"
                    .into(),
            ));
        }
        Ok(())
    }

    pub fn budget(&self) -> TimeoutBudget {
        TimeoutBudget {
            connect: self.tracer.connect_timeout,
            tls_handshake: self.tracer.tls_timeout,
            request: self.tracer.request_timeout,
        }
    }

    pub fn policy(&self) -> SchedulePolicy {
        SchedulePolicy {
            probes_per_tick: self.scheduler.probes_per_tick,
            max_concurrent_probes: self.scheduler.max_concurrent_probes,
            emit_failure_records: self.scheduler.emit_failure_records,
        }
    }
}
