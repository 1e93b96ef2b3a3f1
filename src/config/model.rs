// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::strategy::StrategyKind;
use crate::types::AdmissionPolicy;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [config]
/// tasks_dir = "~/tasks"
/// queue_length = 10
/// admission = "keep_registered"
/// kill_grace_secs = 10
/// default_strategy = "nerfacto"
///
/// [tools]
/// python = "python3.8"
/// colmap_script = "scripts/colmap2nerf.py"
/// ns_train = "ns-train"
/// ns_render = "ns-render"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    #[serde(default)]
    pub tools: ToolsSection,
}

/// A configuration that passed validation. Build it with
/// `ConfigFile::try_from(raw)`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub tools: ToolsSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(config: ConfigSection, tools: ToolsSection) -> Self {
        Self { config, tools }
    }

    /// `tasks_dir` with a leading `~/` expanded against `$HOME`.
    pub fn tasks_dir(&self) -> PathBuf {
        expand_home(&self.config.tasks_dir)
    }

    pub fn kill_grace(&self) -> Duration {
        Duration::from_secs(self.config.kill_grace_secs)
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Root of the per-task directory layout.
    #[serde(default = "default_tasks_dir")]
    pub tasks_dir: String,

    /// Maximum number of admitted tasks waiting to start.
    #[serde(default = "default_queue_length")]
    pub queue_length: usize,

    /// What happens to a task that arrives while the queue is full.
    #[serde(default)]
    pub admission: AdmissionPolicy,

    /// Seconds to wait for a timed-out stage to kill its process before the
    /// stage is aborted outright.
    #[serde(default = "default_kill_grace_secs")]
    pub kill_grace_secs: u64,

    /// Strategy used when the CLI does not name one.
    #[serde(default)]
    pub default_strategy: StrategyKind,
}

fn default_tasks_dir() -> String {
    "~/tasks".to_string()
}

fn default_queue_length() -> usize {
    10
}

fn default_kill_grace_secs() -> u64 {
    10
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            tasks_dir: default_tasks_dir(),
            queue_length: default_queue_length(),
            admission: AdmissionPolicy::default(),
            kill_grace_secs: default_kill_grace_secs(),
            default_strategy: StrategyKind::default(),
        }
    }
}

/// `[tools]` section: names (or paths) of the external programs.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolsSection {
    #[serde(default = "default_python")]
    pub python: String,

    /// Photogrammetry script run by the interpreter during preprocessing.
    #[serde(default = "default_colmap_script")]
    pub colmap_script: String,

    #[serde(default = "default_ns_train")]
    pub ns_train: String,

    #[serde(default = "default_ns_render")]
    pub ns_render: String,
}

fn default_python() -> String {
    "python3.8".to_string()
}

fn default_colmap_script() -> String {
    "scripts/colmap2nerf.py".to_string()
}

fn default_ns_train() -> String {
    "ns-train".to_string()
}

fn default_ns_render() -> String {
    "ns-render".to_string()
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            python: default_python(),
            colmap_script: default_colmap_script(),
            ns_train: default_ns_train(),
            ns_render: default_ns_render(),
        }
    }
}

fn expand_home(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(rest);
        }
    } else if raw == "~" {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home);
        }
    }
    PathBuf::from(raw)
}
