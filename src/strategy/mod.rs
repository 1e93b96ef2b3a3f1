// src/strategy/mod.rs

//! Execution strategies.
//!
//! The set of pipelines is closed: [`StrategyKind`] names a variant and
//! [`StrategyKind::profile`] resolves it to a static [`StrategyProfile`]
//! record holding its stage timeouts and training method. The profile only
//! decides *what* to run (see [`StrategyProfile::build_command`]); how long to
//! wait for it is the scheduler's business.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::ToolsSection;
use crate::errors::StageError;
use crate::fs::{find_first_with_extension, FileSystem};
use crate::task::TaskPaths;
use crate::types::Stage;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    #[default]
    Nerfacto,
    #[serde(alias = "instant_ngp")]
    InstantNgp,
    #[serde(alias = "vanilla_nerf")]
    VanillaNerf,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 3] = [
        StrategyKind::Nerfacto,
        StrategyKind::InstantNgp,
        StrategyKind::VanillaNerf,
    ];

    pub fn profile(self) -> &'static StrategyProfile {
        match self {
            StrategyKind::Nerfacto => &PROFILES[0],
            StrategyKind::InstantNgp => &PROFILES[1],
            StrategyKind::VanillaNerf => &PROFILES[2],
        }
    }

    pub fn timeouts(self) -> StageTimeouts {
        self.profile().timeouts
    }

    pub fn name(self) -> &'static str {
        self.profile().method
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "nerfacto" => Ok(StrategyKind::Nerfacto),
            "instant-ngp" | "instant_ngp" => Ok(StrategyKind::InstantNgp),
            "vanilla-nerf" | "vanilla_nerf" => Ok(StrategyKind::VanillaNerf),
            other => Err(format!(
                "unknown strategy: {other} (expected \"nerfacto\", \"instant-ngp\" or \"vanilla-nerf\")"
            )),
        }
    }
}

/// Per-stage time budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageTimeouts {
    pub preprocess: Duration,
    pub train: Duration,
    pub render: Duration,
}

impl StageTimeouts {
    pub fn for_stage(&self, stage: Stage) -> Duration {
        match stage {
            Stage::Preprocess => self.preprocess,
            Stage::Train => self.train,
            Stage::Render => self.render,
        }
    }
}

const fn minutes(n: u64) -> Duration {
    Duration::from_secs(60 * n)
}

/// Static description of one pipeline variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrategyProfile {
    pub kind: StrategyKind,
    pub timeouts: StageTimeouts,
    /// Method name passed to the trainer, also the variant's display name.
    pub method: &'static str,
}

static PROFILES: [StrategyProfile; 3] = [
    StrategyProfile {
        kind: StrategyKind::Nerfacto,
        timeouts: StageTimeouts {
            preprocess: minutes(20),
            train: minutes(25),
            render: minutes(5),
        },
        method: "nerfacto",
    },
    StrategyProfile {
        kind: StrategyKind::InstantNgp,
        timeouts: StageTimeouts {
            preprocess: minutes(20),
            train: minutes(10),
            render: minutes(5),
        },
        method: "instant-ngp",
    },
    StrategyProfile {
        kind: StrategyKind::VanillaNerf,
        timeouts: StageTimeouts {
            preprocess: minutes(20),
            train: minutes(45),
            render: minutes(5),
        },
        method: "vanilla-nerf",
    },
];

/// A fully resolved external program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageCommand {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl fmt::Display for StageCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

const RENDER_CONFIG_EXTENSION: &str = "yml";

impl StrategyProfile {
    /// Resolve the command for `stage` of a task laid out at `paths`.
    ///
    /// Preprocessing is shared by every variant. Rendering needs the config
    /// file written by training; its absence is reported as an unexpected
    /// failure rather than a tool failure.
    pub fn build_command(
        &self,
        stage: Stage,
        paths: &TaskPaths,
        tools: &ToolsSection,
        fs: &dyn FileSystem,
    ) -> Result<StageCommand, StageError> {
        match stage {
            Stage::Preprocess => preprocess_command(paths, tools, fs),
            Stage::Train => Ok(StageCommand {
                program: tools.ns_train.clone(),
                args: vec![
                    self.method.to_string(),
                    "--data".to_string(),
                    path_arg(&paths.dataset_dir),
                    "--output-dir".to_string(),
                    path_arg(&paths.model_dir),
                ],
                cwd: None,
            }),
            Stage::Render => {
                let config = find_first_with_extension(fs, &paths.model_dir, RENDER_CONFIG_EXTENSION)
                    .map_err(|e| StageError::Unexpected(format!("{e:#}")))?
                    .ok_or_else(|| {
                        StageError::Unexpected(
                            "Cannot find config.yml file for ns-render".to_string(),
                        )
                    })?;
                Ok(StageCommand {
                    program: tools.ns_render.clone(),
                    args: vec![
                        "--load-config".to_string(),
                        path_arg(&config),
                        "--traj".to_string(),
                        "spiral".to_string(),
                        "--output-path".to_string(),
                        path_arg(&paths.output_video_file),
                    ],
                    cwd: None,
                })
            }
        }
    }
}

fn preprocess_command(
    paths: &TaskPaths,
    tools: &ToolsSection,
    fs: &dyn FileSystem,
) -> Result<StageCommand, StageError> {
    if !fs.is_dir(&paths.dataset_dir) {
        return Err(StageError::Unexpected(format!(
            "dataset directory {:?} does not exist",
            paths.dataset_dir
        )));
    }
    Ok(StageCommand {
        program: tools.python.clone(),
        args: vec![
            tools.colmap_script.clone(),
            "--run_colmap".to_string(),
            "--colmap_matcher".to_string(),
            "exhaustive".to_string(),
            "--aabb_scale".to_string(),
            "16".to_string(),
        ],
        cwd: Some(paths.dataset_dir.clone()),
    })
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;
    use crate::task::{TaskId, TaskLayout};

    fn paths() -> TaskPaths {
        TaskLayout::new("/tasks").paths_for(TaskId::generate())
    }

    #[test]
    fn names_round_trip_through_from_str() {
        for kind in StrategyKind::ALL {
            assert_eq!(kind.name().parse::<StrategyKind>(), Ok(kind));
        }
        assert_eq!("instant_ngp".parse::<StrategyKind>(), Ok(StrategyKind::InstantNgp));
        assert!("gaussian".parse::<StrategyKind>().is_err());
    }

    #[test]
    fn variants_differ_only_in_training() {
        let p = paths();
        let fs = MockFileSystem::new();
        fs.add_dir(&p.dataset_dir);
        let tools = ToolsSection::default();

        let pre: Vec<_> = StrategyKind::ALL
            .iter()
            .map(|k| k.profile().build_command(Stage::Preprocess, &p, &tools, &fs).unwrap())
            .collect();
        assert!(pre.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(pre[0].cwd.as_deref(), Some(p.dataset_dir.as_path()));

        let train = StrategyKind::VanillaNerf
            .profile()
            .build_command(Stage::Train, &p, &tools, &fs)
            .unwrap();
        assert_eq!(train.program, "ns-train");
        assert_eq!(train.args[0], "vanilla-nerf");
        assert_eq!(StrategyKind::VanillaNerf.timeouts().train, minutes(45));
    }

    #[test]
    fn render_requires_a_training_config() {
        let p = paths();
        let fs = MockFileSystem::new();
        let tools = ToolsSection::default();

        let err = StrategyKind::Nerfacto
            .profile()
            .build_command(Stage::Render, &p, &tools, &fs)
            .unwrap_err();
        assert!(err.to_string().contains("Cannot find config.yml"));

        let config = p.model_dir.join("nerfacto").join("2024").join("config.yml");
        fs.add_file(&config, "method: nerfacto");
        let cmd = StrategyKind::Nerfacto
            .profile()
            .build_command(Stage::Render, &p, &tools, &fs)
            .unwrap();
        assert_eq!(cmd.args[1], config.to_string_lossy());
        assert!(cmd.to_string().ends_with("render_output.mp4"));
    }
}
