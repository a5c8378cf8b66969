//! External transform: run the watermark script as a child process.
//!
//! The child gets `--input`, `--output` and `--options` and nothing else:
//! stdin is closed, stdout and stderr are captured whole and returned as
//! text once the process exits. Only exit code 0 counts as success; a
//! non-zero code, death by signal, a spawn failure and a timeout are all
//! failures, distinguished only in the diagnostic text.
//!
//! The child is spawned with `kill_on_drop`, so a request future that is
//! dropped mid-transform (client went away, timeout) takes the process
//! down with it instead of leaving an orphan writing into a deleted path.

use crate::error::WatermarkError;
use crate::operation::WatermarkOptions;
use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, info};

/// How the transformer process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// Exited normally with this code.
    Exited(i32),
    /// Killed by a signal; no exit code.
    Signalled,
    /// Could not be spawned or awaited.
    Unavailable(String),
    /// Exceeded the configured timeout and was killed.
    TimedOut(Duration),
}

/// Outcome of one transformer run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessResult {
    pub termination: Termination,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessResult {
    fn without_output(termination: Termination) -> Self {
        Self {
            termination,
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    /// Exit code 0, regardless of anything written to stderr.
    pub fn succeeded(&self) -> bool {
        self.termination == Termination::Exited(0)
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self.termination {
            Termination::Exited(code) => Some(code),
            _ => None,
        }
    }

    /// Caller-facing explanation: stderr when there is any, else how the process ended.
    pub fn failure_detail(&self) -> String {
        let stderr = self.stderr.trim_end();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        match &self.termination {
            Termination::Exited(code) => format!("exit code {code}"),
            Termination::Signalled => "terminated by signal".to_string(),
            Termination::Unavailable(reason) => format!("failed to run transformer: {reason}"),
            Termination::TimedOut(limit) => format!("timed out after {}s", limit.as_secs()),
        }
    }

    /// Convert a failed run into the error returned to the caller.
    pub fn into_error(self) -> WatermarkError {
        WatermarkError::TransformFailed {
            detail: self.failure_detail(),
            stdout: self.stdout,
        }
    }
}

/// Runs watermark scripts with a fixed interpreter.
#[derive(Debug, Clone)]
pub struct Transformer {
    program: String,
    timeout: Option<Duration>,
}

impl Transformer {
    pub fn new(program: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    /// Run `script` over `input`, asking it to write `output`.
    ///
    /// Never fails: every way the child can go wrong is folded into the
    /// returned [`ProcessResult`].
    pub async fn run(
        &self,
        script: &Path,
        input: &Path,
        output: &Path,
        options: &WatermarkOptions,
    ) -> ProcessResult {
        let options_json = match options.to_json() {
            Ok(json) => json,
            Err(e) => return ProcessResult::without_output(Termination::Unavailable(e.to_string())),
        };

        let mut command = Command::new(&self.program);
        command
            .args(command_args(script, input, output, &options_json))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let start = Instant::now();
        let child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                return ProcessResult::without_output(Termination::Unavailable(format!(
                    "{}: {e}",
                    self.program
                )))
            }
        };
        debug!(
            pid = ?child.id(),
            program = %self.program,
            script = %script.display(),
            "Spawned transformer"
        );

        let waited = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                Ok(waited) => waited,
                Err(_) => return ProcessResult::without_output(Termination::TimedOut(limit)),
            },
            None => child.wait_with_output().await,
        };

        let output = match waited {
            Ok(output) => output,
            Err(e) => return ProcessResult::without_output(Termination::Unavailable(e.to_string())),
        };

        let termination = match output.status.code() {
            Some(code) => Termination::Exited(code),
            None => Termination::Signalled,
        };
        info!(
            ?termination,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Transformer finished"
        );

        ProcessResult {
            termination,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

/// Arguments after the interpreter: `<script> --input <in> --output <out> --options <json>`.
pub fn command_args(script: &Path, input: &Path, output: &Path, options_json: &str) -> Vec<OsString> {
    vec![
        script.as_os_str().to_owned(),
        "--input".into(),
        input.as_os_str().to_owned(),
        "--output".into(),
        output.as_os_str().to_owned(),
        "--options".into(),
        options_json.into(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(termination: Termination, stderr: &str) -> ProcessResult {
        ProcessResult {
            termination,
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }

    #[test]
    fn only_exit_zero_succeeds() {
        assert!(result(Termination::Exited(0), "").succeeded());
        assert!(result(Termination::Exited(0), "DeprecationWarning: fitz").succeeded());
        assert!(!result(Termination::Exited(1), "").succeeded());
        assert!(!result(Termination::Exited(-2), "").succeeded());
        assert!(!result(Termination::Signalled, "").succeeded());
        assert!(!result(Termination::Unavailable("nope".into()), "").succeeded());
        assert!(!result(Termination::TimedOut(Duration::from_secs(5)), "").succeeded());
    }

    #[test]
    fn detail_prefers_stderr() {
        let r = result(Termination::Exited(2), "bad page tree\n");
        assert_eq!(r.failure_detail(), "bad page tree");
        assert_eq!(r.exit_code(), Some(2));
    }

    #[test]
    fn detail_falls_back_to_termination() {
        assert_eq!(result(Termination::Exited(3), "").failure_detail(), "exit code 3");
        assert_eq!(
            result(Termination::Signalled, "  \n").failure_detail(),
            "terminated by signal"
        );
        assert_eq!(
            result(Termination::TimedOut(Duration::from_secs(30)), "").failure_detail(),
            "timed out after 30s"
        );
        assert_eq!(result(Termination::Signalled, "").exit_code(), None);
    }

    #[test]
    fn into_error_carries_stdout() {
        let mut r = result(Termination::Exited(1), "boom");
        r.stdout = "pages: 3".into();
        match r.into_error() {
            WatermarkError::TransformFailed { detail, stdout } => {
                assert_eq!(detail, "boom");
                assert_eq!(stdout, "pages: 3");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn args_follow_tool_contract() {
        let args = command_args(
            Path::new("tools/watermark_lunas.py"),
            Path::new("/tmp/in.pdf"),
            Path::new("/tmp/out.pdf"),
            r#"{"text":"LUNAS"}"#,
        );
        let args: Vec<String> = args
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "tools/watermark_lunas.py",
                "--input",
                "/tmp/in.pdf",
                "--output",
                "/tmp/out.pdf",
                "--options",
                r#"{"text":"LUNAS"}"#,
            ]
        );
    }

    #[tokio::test]
    async fn missing_interpreter_is_a_failure() {
        let transformer = Transformer::new("/definitely/not/a/real/interpreter", None);
        let r = transformer
            .run(
                Path::new("script.py"),
                Path::new("in.pdf"),
                Path::new("out.pdf"),
                &WatermarkOptions::lunas(),
            )
            .await;
        assert!(!r.succeeded());
        assert!(matches!(r.termination, Termination::Unavailable(_)));
        assert!(r.failure_detail().starts_with("failed to run transformer"));
    }

    #[cfg(unix)]
    mod unix {
        use super::super::{ProcessResult, Termination, Transformer};
        use crate::operation::WatermarkOptions;
        use std::path::{Path, PathBuf};
        use std::time::{Duration, Instant};
        use tempfile::TempDir;

        fn script(dir: &TempDir, body: &str) -> PathBuf {
            let path = dir.path().join("tool.sh");
            std::fs::write(&path, body).unwrap();
            path
        }

        async fn run(script: &Path, timeout: Option<Duration>) -> ProcessResult {
            Transformer::new("sh", timeout)
                .run(
                    script,
                    Path::new("in.pdf"),
                    Path::new("out.pdf"),
                    &WatermarkOptions::lunas(),
                )
                .await
        }

        #[tokio::test]
        async fn captures_both_streams() {
            let dir = TempDir::new().unwrap();
            let s = script(&dir, "echo working\necho careful >&2\nexit 0\n");
            let r = run(&s, None).await;
            assert!(r.succeeded());
            assert_eq!(r.stdout, "working\n");
            assert_eq!(r.stderr, "careful\n");
        }

        #[tokio::test]
        async fn nonzero_exit_is_reported() {
            let dir = TempDir::new().unwrap();
            let s = script(&dir, "printf 'bad page tree' >&2\nexit 2\n");
            let r = run(&s, None).await;
            assert_eq!(r.termination, Termination::Exited(2));
            assert_eq!(r.failure_detail(), "bad page tree");
        }

        #[tokio::test]
        async fn signal_is_a_failure() {
            let dir = TempDir::new().unwrap();
            let s = script(&dir, "kill -9 $$\n");
            let r = run(&s, None).await;
            assert_eq!(r.termination, Termination::Signalled);
            assert!(!r.succeeded());
        }

        #[tokio::test]
        async fn receives_contract_arguments() {
            let dir = TempDir::new().unwrap();
            let s = script(&dir, "printf '%s|' \"$@\"\n");
            let r = run(&s, None).await;
            let options = WatermarkOptions::lunas().to_json().unwrap();
            assert_eq!(
                r.stdout,
                format!("--input|in.pdf|--output|out.pdf|--options|{options}|")
            );
        }

        #[tokio::test]
        async fn timeout_kills_the_child() {
            let dir = TempDir::new().unwrap();
            let s = script(&dir, "exec sleep 30\n");
            let started = Instant::now();
            let r = run(&s, Some(Duration::from_millis(200))).await;
            assert!(matches!(r.termination, Termination::TimedOut(_)));
            assert!(started.elapsed() < Duration::from_secs(10));
        }
    }
}
