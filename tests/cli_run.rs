// tests/cli_run.rs
//
// `nerfpipe::run` end to end, with shell scripts standing in for the tools.

#![cfg(unix)]

use std::error::Error;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;

use nerfpipe::cli::CliArgs;
use nerfpipe_test_utils::init_tracing;

type TestResult = Result<(), Box<dyn Error>>;

const NS_TRAIN: &str = r#"#!/bin/sh
method="$1"; shift
while [ $# -gt 0 ]; do
  case "$1" in
    --output-dir) out="$2"; shift ;;
  esac
  shift
done
mkdir -p "$out/$method/run" && echo "method: $method" > "$out/$method/run/config.yml"
"#;

const NS_RENDER: &str = r#"#!/bin/sh
while [ $# -gt 0 ]; do
  case "$1" in
    --output-path) out="$2"; shift ;;
  esac
  shift
done
mkdir -p "$(dirname "$out")" && echo video > "$out"
"#;

struct Setup {
    _tmp: TempDir,
    root: PathBuf,
    config: PathBuf,
    /// Touched by the photogrammetry stand-in whenever a stage starts.
    marker: PathBuf,
}

impl Setup {
    fn new() -> Result<Self, Box<dyn Error>> {
        let tmp = TempDir::new()?;
        let root = tmp.path().to_path_buf();
        let bin = root.join("bin");
        fs::create_dir_all(&bin)?;

        let marker = root.join("preprocess-ran");
        let colmap = write_script(
            &bin,
            "colmap2nerf.sh",
            &format!(
                "#!/bin/sh\ntouch {}\necho '{{}}' > transforms.json\n",
                marker.display()
            ),
        )?;
        let train = write_script(&bin, "ns-train", NS_TRAIN)?;
        let render = write_script(&bin, "ns-render", NS_RENDER)?;

        let config = root.join("nerfpipe.toml");
        fs::write(
            &config,
            format!(
                r#"
[config]
tasks_dir = "{tasks}"
default_strategy = "instant-ngp"

[tools]
python = "sh"
colmap_script = "{colmap}"
ns_train = "{train}"
ns_render = "{render}"
"#,
                tasks = root.join("tasks").display(),
                colmap = colmap.display(),
                train = train.display(),
                render = render.display(),
            ),
        )?;

        Ok(Self {
            _tmp: tmp,
            root,
            config,
            marker,
        })
    }

    fn upload(&self, name: &str) -> std::io::Result<PathBuf> {
        let dir = self.root.join(name);
        fs::create_dir_all(&dir)?;
        fs::write(dir.join("a.jpg"), b"jpeg")?;
        Ok(dir)
    }

    fn args(&self, inputs: Vec<PathBuf>) -> CliArgs {
        CliArgs {
            inputs,
            config: Some(self.config.clone()),
            strategy: None,
            log_level: None,
            dry_run: false,
            json: false,
            poll_ms: 10,
        }
    }

    fn videos(&self) -> usize {
        let tasks = self.root.join("tasks");
        let Ok(entries) = fs::read_dir(&tasks) else {
            return 0;
        };
        entries
            .filter_map(Result::ok)
            .filter(|e| e.path().join("output").join("render_output.mp4").is_file())
            .count()
    }
}

fn write_script(dir: &Path, name: &str, body: &str) -> std::io::Result<PathBuf> {
    let path = dir.join(name);
    fs::write(&path, body)?;
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;
    Ok(path)
}

#[tokio::test]
async fn bad_input_aborts_before_any_stage_runs() -> TestResult {
    init_tracing();
    let s = Setup::new()?;
    let good = s.upload("good")?;
    let missing = s.root.join("not-there");

    let err = nerfpipe::run(s.args(vec![good, missing.clone()]))
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("not-there"), "{err:#}");

    // Give a stray worker ample time to reach the first tool.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(!s.marker.exists(), "a stage ran for a run that was refused");
    assert_eq!(s.videos(), 0);
    Ok(())
}

#[tokio::test]
async fn every_input_is_processed_to_a_video() -> TestResult {
    init_tracing();
    let s = Setup::new()?;
    let first = s.upload("first")?;
    let second = s.upload("second")?;

    nerfpipe::run(s.args(vec![first, second])).await?;

    assert!(s.marker.exists());
    assert_eq!(s.videos(), 2);
    Ok(())
}
