//! Running external tools.
//!
//! [`ToolInvocation`] is a small builder over `tokio::process::Command` that
//! adds the two things every invocation here needs: a hard timeout and
//! captured output. ffmpeg in particular writes pages of progress chatter to
//! stderr, so failure messages carry only the tail of it, where the actual
//! error lives.

use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::Command;

/// Timeout applied when the caller never sets one: five minutes.
const FALLBACK_TIMEOUT: Duration = Duration::from_secs(300);

/// Lines of stderr kept when reporting a failed invocation.
const STDERR_TAIL_LINES: usize = 8;

/// Everything a finished process left behind.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// How the process exited.
    pub status: ExitStatus,
    /// stdout, decoded lossily as UTF-8.
    pub stdout: String,
    /// stderr, decoded lossily as UTF-8.
    pub stderr: String,
}

/// Builder for one external tool invocation.
///
/// ```no_run
/// # async fn example() -> sl_core::Result<()> {
/// use std::time::Duration;
///
/// let mut probe = sl_av::ToolInvocation::new("ffprobe".into());
/// probe.arg("-version").timeout(Duration::from_secs(5));
/// let report = probe.execute().await?;
/// assert!(report.stdout.contains("ffprobe"));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl ToolInvocation {
    /// Begin an invocation of `program` with no arguments and the default
    /// timeout.
    pub fn new(program: PathBuf) -> Self {
        Self { program, args: Vec::new(), timeout: FALLBACK_TIMEOUT }
    }

    /// Push one argument onto the command line.
    pub fn arg(&mut self, value: impl Into<String>) -> &mut Self {
        self.args.push(value.into());
        self
    }

    /// Push a sequence of arguments onto the command line.
    pub fn args(&mut self, values: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(values.into_iter().map(Into::into));
        self
    }

    /// Replace the default timeout.
    pub fn timeout(&mut self, limit: Duration) -> &mut Self {
        self.timeout = limit;
        self
    }

    /// The program's bare name, for error messages.
    fn tool_name(&self) -> String {
        match self.program.file_name() {
            Some(name) => name.to_string_lossy().to_string(),
            None => self.program.to_string_lossy().to_string(),
        }
    }

    /// Run the command to completion and capture its output.
    ///
    /// Fails with [`sl_core::Error::Tool`] when the process cannot be
    /// spawned, exceeds the timeout, or exits non-zero. The child is killed
    /// on timeout rather than disowned.
    pub async fn execute(&self) -> sl_core::Result<ToolOutput> {
        let tool = self.tool_name();
        let fail = |message: String| sl_core::Error::tool(&tool, message);

        // A timeout drops the wait future; kill_on_drop reaps the child
        // instead of leaving it running.
        let child = Command::new(&self.program)
            .args(&self.args)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| fail(format!("failed to spawn: {e}")))?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(fail(format!("I/O error waiting for process: {e}"))),
            Err(_elapsed) => return Err(fail(format!("timed out after {:?}", self.timeout))),
        };

        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        if !output.status.success() {
            return Err(fail(format!(
                "exited with status {}: {}",
                output.status,
                stderr_tail(&stderr)
            )));
        }

        Ok(ToolOutput {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr,
        })
    }
}

/// The last few non-empty lines of a stderr transcript.
fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.is_empty())
        .collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stderr_tail_keeps_only_the_end() {
        let transcript: String = (1..=20).map(|i| format!("line {i}\n")).collect();
        let tail = stderr_tail(&transcript);
        assert!(tail.starts_with("line 13"));
        assert!(tail.ends_with("line 20"));
        assert_eq!(tail.lines().count(), STDERR_TAIL_LINES);
    }

    #[test]
    fn stderr_tail_drops_blank_padding() {
        assert_eq!(stderr_tail("boom\n\n\n"), "boom");
        assert_eq!(stderr_tail(""), "");
    }

    #[tokio::test]
    async fn captures_stdout_of_a_successful_run() {
        let mut cmd = ToolInvocation::new(PathBuf::from("echo"));
        cmd.arg("hello");
        if let Ok(out) = cmd.execute().await {
            assert!(out.status.success());
            assert_eq!(out.stdout.trim(), "hello");
        }
        // echo missing entirely is a broken environment, not a failure here.
    }

    #[tokio::test]
    async fn missing_program_is_a_tool_error() {
        let absent = ToolInvocation::new(PathBuf::from("no-such-binary-sl-av"));
        let err = absent.execute().await.unwrap_err();
        assert!(matches!(err, sl_core::Error::Tool { .. }));
        assert!(err.to_string().contains("failed to spawn"));
    }

    #[tokio::test]
    async fn timeout_kills_the_child() {
        let mut cmd = ToolInvocation::new(PathBuf::from("sleep"));
        cmd.arg("10").timeout(Duration::from_millis(100));
        let err = cmd.execute().await.unwrap_err().to_string();
        assert!(err.contains("timed out"), "want a timeout, got: {err}");
    }
}
