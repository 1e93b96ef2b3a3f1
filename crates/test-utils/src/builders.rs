#![allow(dead_code)]

use std::path::Path;

use nerfpipe::config::{ConfigFile, ConfigSection, RawConfigFile, ToolsSection};
use nerfpipe::engine::EngineOptions;
use nerfpipe::strategy::StrategyKind;
use nerfpipe::types::AdmissionPolicy;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                tools: ToolsSection::default(),
            },
        }
    }

    pub fn tasks_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.config.config.tasks_dir = dir.as_ref().to_string_lossy().into_owned();
        self
    }

    pub fn queue_length(mut self, n: usize) -> Self {
        self.config.config.queue_length = n;
        self
    }

    pub fn admission(mut self, policy: AdmissionPolicy) -> Self {
        self.config.config.admission = policy;
        self
    }

    pub fn kill_grace_secs(mut self, secs: u64) -> Self {
        self.config.config.kill_grace_secs = secs;
        self
    }

    pub fn default_strategy(mut self, kind: StrategyKind) -> Self {
        self.config.config.default_strategy = kind;
        self
    }

    pub fn python(mut self, program: &str) -> Self {
        self.config.tools.python = program.to_string();
        self
    }

    pub fn colmap_script(mut self, script: impl AsRef<Path>) -> Self {
        self.config.tools.colmap_script = script.as_ref().to_string_lossy().into_owned();
        self
    }

    pub fn ns_train(mut self, program: impl AsRef<Path>) -> Self {
        self.config.tools.ns_train = program.as_ref().to_string_lossy().into_owned();
        self
    }

    pub fn ns_render(mut self, program: impl AsRef<Path>) -> Self {
        self.config.tools.ns_render = program.as_ref().to_string_lossy().into_owned();
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }

    pub fn engine_options(self) -> EngineOptions {
        EngineOptions::from_config(&self.build())
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}
