// src/task/paths.rs

use std::path::{Path, PathBuf};

use super::TaskId;

/// Root of the on-disk task layout:
///
/// ```text
/// <tasks_dir>
/// └── <task id>
///     ├── dataset
///     │   ├── images
///     │   └── ...            (camera poses written by preprocessing)
///     ├── model              (training output, contains the render config)
///     ├── output
///     │   └── render_output.mp4
///     └── log.txt
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskLayout {
    tasks_dir: PathBuf,
}

impl TaskLayout {
    pub fn new(tasks_dir: impl Into<PathBuf>) -> Self {
        Self {
            tasks_dir: tasks_dir.into(),
        }
    }

    pub fn tasks_dir(&self) -> &Path {
        &self.tasks_dir
    }

    pub fn paths_for(&self, id: TaskId) -> TaskPaths {
        let task_dir = self.tasks_dir.join(id.to_string());
        let dataset_dir = task_dir.join("dataset");
        TaskPaths {
            images_dir: dataset_dir.join("images"),
            model_dir: task_dir.join("model"),
            log_file: task_dir.join("log.txt"),
            output_video_file: task_dir.join("output").join("render_output.mp4"),
            dataset_dir,
            task_dir,
        }
    }
}

/// Every path a task's stages read or write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskPaths {
    pub task_dir: PathBuf,
    pub dataset_dir: PathBuf,
    pub images_dir: PathBuf,
    pub model_dir: PathBuf,
    pub log_file: PathBuf,
    pub output_video_file: PathBuf,
}
