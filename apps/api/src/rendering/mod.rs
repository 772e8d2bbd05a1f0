//! Site Renderer: builds the standalone profile HTML from content documents.
//!
//! The renderer is an external process. Everything about the process model
//! (working directory, arguments, output capture, deadline, kill) stays behind
//! [`SiteRenderer`] so the orchestrator only sees a status and captured output.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::{info, warn};

use crate::models::SplitMode;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to launch renderer: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("renderer exited with status {status:?}: {output}")]
    Failed { status: Option<i32>, output: String },

    #[error("renderer did not finish within {0}s")]
    Timeout(u64),

    #[error("renderer reported success but produced no output")]
    MissingOutput,
}

/// What the renderer should build.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    /// Directory holding `zh.yaml` + `en.yaml`, or `config.yaml` in fallback mode.
    pub content_dir: PathBuf,
    pub mode: SplitMode,
    pub output_path: PathBuf,
}

/// Exit status plus everything the process printed.
#[derive(Debug, Clone)]
pub struct RenderOutcome {
    /// `None` when the process was terminated by a signal.
    pub status: Option<i32>,
    pub output: String,
}

impl RenderOutcome {
    pub fn succeeded(&self) -> bool {
        self.status == Some(0)
    }
}

#[async_trait]
pub trait SiteRenderer: Send + Sync {
    async fn render(&self, request: &RenderRequest) -> Result<RenderOutcome, RenderError>;
}

/// Runs `{program} {script} --dir <content_dir> --output <file>` inside `workdir`
/// (or `--config <content_dir>/config.yaml` in fallback mode).
pub struct NodeSiteRenderer {
    program: String,
    script: String,
    workdir: PathBuf,
    timeout: Duration,
}

impl NodeSiteRenderer {
    pub fn new(
        program: impl Into<String>,
        script: impl Into<String>,
        workdir: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            program: program.into(),
            script: script.into(),
            workdir: workdir.into(),
            timeout,
        }
    }

    fn command(&self, request: &RenderRequest) -> Command {
        let mut command = Command::new(&self.program);
        command.arg(&self.script);
        match request.mode {
            SplitMode::Bilingual => command.arg("--dir").arg(&request.content_dir),
            SplitMode::Fallback => command
                .arg("--config")
                .arg(request.content_dir.join("config.yaml")),
        };
        command
            .arg("--output")
            .arg(&request.output_path)
            .current_dir(&self.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl SiteRenderer for NodeSiteRenderer {
    async fn render(&self, request: &RenderRequest) -> Result<RenderOutcome, RenderError> {
        info!(
            "Running renderer: {} {} ({:?} mode) -> {}",
            self.program,
            self.script,
            request.mode,
            request.output_path.display()
        );

        let child = self.command(request).spawn()?;
        // Dropping the child on timeout kills the process.
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| RenderError::Timeout(self.timeout.as_secs()))??;

        let combined = combine_output(&output.stdout, &output.stderr);
        for line in combined.lines() {
            info!("renderer: {line}");
        }

        let outcome = RenderOutcome {
            status: output.status.code(),
            output: combined,
        };
        if !outcome.succeeded() {
            warn!("Renderer exited with {:?}", outcome.status);
        }
        Ok(outcome)
    }
}

/// Appends stderr after stdout; the two streams are captured separately.
fn combine_output(stdout: &[u8], stderr: &[u8]) -> String {
    let mut combined = String::from_utf8_lossy(stdout).into_owned();
    let stderr = String::from_utf8_lossy(stderr);
    if !stderr.trim().is_empty() {
        if !combined.is_empty() && !combined.ends_with('\n') {
            combined.push('\n');
        }
        combined.push_str(&stderr);
    }
    combined
}

/// Reads the rendered file, treating a missing or empty file as a render failure.
pub async fn read_rendered_output(path: &Path) -> Result<Vec<u8>, RenderError> {
    match tokio::fs::read(path).await {
        Ok(bytes) if !bytes.is_empty() => Ok(bytes),
        Ok(_) => Err(RenderError::MissingOutput),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(RenderError::MissingOutput),
        Err(e) => Err(RenderError::Spawn(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Writes a shell script standing in for the node build script.
    fn script(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("build.sh");
        std::fs::write(&path, body).unwrap();
        path
    }

    fn content_dir(dir: &TempDir) -> PathBuf {
        let content = dir.path().join("config");
        std::fs::create_dir_all(&content).unwrap();
        std::fs::write(content.join("zh.yaml"), "name: Jane").unwrap();
        std::fs::write(content.join("en.yaml"), "name: Jane (EN)").unwrap();
        std::fs::write(content.join("config.yaml"), "name: Solo").unwrap();
        content
    }

    fn renderer(dir: &TempDir, script_path: &Path, timeout: Duration) -> NodeSiteRenderer {
        NodeSiteRenderer::new("sh", script_path.to_string_lossy(), dir.path(), timeout)
    }

    #[tokio::test]
    async fn test_successful_render_writes_output_and_captures_logs() {
        let dir = TempDir::new().unwrap();
        let script_path = script(
            &dir,
            "echo \"building $2\"\ncat \"$2/zh.yaml\" \"$2/en.yaml\" > \"$4\"\n",
        );
        let request = RenderRequest {
            content_dir: content_dir(&dir),
            mode: SplitMode::Bilingual,
            output_path: dir.path().join("out.html"),
        };

        let outcome = renderer(&dir, &script_path, Duration::from_secs(10))
            .render(&request)
            .await
            .unwrap();

        assert!(outcome.succeeded());
        assert!(outcome.output.contains("building"));
        let html = read_rendered_output(&request.output_path).await.unwrap();
        assert_eq!(String::from_utf8(html).unwrap(), "name: Janename: Jane (EN)");
    }

    #[tokio::test]
    async fn test_fallback_mode_passes_single_config_file() {
        let dir = TempDir::new().unwrap();
        let script_path = script(&dir, "[ \"$1\" = \"--config\" ] || exit 3\ncat \"$2\" > \"$4\"\n");
        let request = RenderRequest {
            content_dir: content_dir(&dir),
            mode: SplitMode::Fallback,
            output_path: dir.path().join("out.html"),
        };

        let outcome = renderer(&dir, &script_path, Duration::from_secs(10))
            .render(&request)
            .await
            .unwrap();

        assert!(outcome.succeeded(), "output: {}", outcome.output);
        let html = read_rendered_output(&request.output_path).await.unwrap();
        assert_eq!(html, b"name: Solo");
    }

    #[tokio::test]
    async fn test_non_zero_exit_reports_status_and_stderr() {
        let dir = TempDir::new().unwrap();
        let script_path = script(&dir, "echo 'missing zh.yaml' >&2\nexit 1\n");
        let request = RenderRequest {
            content_dir: content_dir(&dir),
            mode: SplitMode::Bilingual,
            output_path: dir.path().join("out.html"),
        };

        let outcome = renderer(&dir, &script_path, Duration::from_secs(10))
            .render(&request)
            .await
            .unwrap();

        assert_eq!(outcome.status, Some(1));
        assert!(!outcome.succeeded());
        assert!(outcome.output.contains("missing zh.yaml"));
    }

    #[tokio::test]
    async fn test_missing_output_file_is_render_error() {
        let dir = TempDir::new().unwrap();
        let err = read_rendered_output(&dir.path().join("nope.html"))
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::MissingOutput));
    }

    #[tokio::test]
    async fn test_slow_renderer_times_out() {
        let dir = TempDir::new().unwrap();
        let script_path = script(&dir, "sleep 5\n");
        let request = RenderRequest {
            content_dir: content_dir(&dir),
            mode: SplitMode::Bilingual,
            output_path: dir.path().join("out.html"),
        };

        let err = renderer(&dir, &script_path, Duration::from_millis(200))
            .render(&request)
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::Timeout(_)));
    }

    #[test]
    fn test_combine_output_appends_stderr() {
        assert_eq!(combine_output(b"out", b"err\n"), "out\nerr\n");
        assert_eq!(combine_output(b"out\n", b"  "), "out\n");
    }
}
