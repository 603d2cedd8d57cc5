//! Subprocess execution utilities.

use std::ffi::OsStr;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Output, Stdio};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

/// Builder for subprocess execution.
#[derive(Debug, Clone)]
pub struct ProcessBuilder {
    program: PathBuf,
    args: Vec<String>,
    cwd: Option<PathBuf>,
}

/// Captured output of a bounded subprocess run.
///
/// `timed_out` is set when the deadline elapsed and the child was killed;
/// `status` then reflects the killed process and must not be trusted as a
/// compiler verdict.
#[derive(Debug)]
pub struct BoundedOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub timed_out: bool,
}

impl ProcessBuilder {
    /// Create a new process builder for the given program.
    pub fn new(program: impl AsRef<Path>) -> Self {
        ProcessBuilder {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            cwd: None,
        }
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(
            args.into_iter()
                .map(|s| s.as_ref().to_string_lossy().into_owned()),
        );
        self
    }

    /// Set the working directory.
    pub fn cwd(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = Some(cwd.as_ref().to_path_buf());
        self
    }

    /// Get the program path.
    pub fn get_program(&self) -> &Path {
        &self.program
    }

    /// Get the arguments.
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// Build the Command.
    fn build_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);

        if let Some(ref cwd) = self.cwd {
            cmd.current_dir(cwd);
        }

        cmd
    }

    /// Execute the command and wait for completion, without a deadline.
    pub fn exec(&self) -> Result<Output> {
        let mut cmd = self.build_command();
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let child = cmd
            .spawn()
            .with_context(|| format!("failed to spawn `{}`", self.program.display()))?;

        let output = child
            .wait_with_output()
            .with_context(|| format!("failed to wait for `{}`", self.program.display()))?;

        Ok(output)
    }

    /// Execute the command, killing it if it outlives `timeout`.
    ///
    /// With `timeout = None` this behaves like [`exec`](Self::exec). Output
    /// pipes are drained on background threads so a chatty child cannot fill
    /// the pipe buffer and stall before the deadline check.
    pub fn exec_bounded(&self, timeout: Option<Duration>) -> Result<BoundedOutput> {
        let Some(limit) = timeout else {
            let output = self.exec()?;
            return Ok(BoundedOutput {
                status: output.status,
                stdout: output.stdout,
                stderr: output.stderr,
                timed_out: false,
            });
        };

        let mut cmd = self.build_command();
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to spawn `{}`", self.program.display()))?;

        let stdout_reader = drain_pipe(child.stdout.take());
        let stderr_reader = drain_pipe(child.stderr.take());

        let started = Instant::now();
        let mut timed_out = false;
        let status = loop {
            if let Some(status) = child
                .try_wait()
                .with_context(|| format!("failed to poll `{}`", self.program.display()))?
            {
                break status;
            }
            if started.elapsed() >= limit {
                timed_out = true;
                break kill_and_reap(&mut child, &self.program)?;
            }
            std::thread::sleep(Duration::from_millis(25));
        };

        let stdout = stdout_reader.join().unwrap_or_default();
        let stderr = stderr_reader.join().unwrap_or_default();

        Ok(BoundedOutput {
            status,
            stdout,
            stderr,
            timed_out,
        })
    }

    /// Display the command for error messages.
    pub fn display_command(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

fn kill_and_reap(child: &mut Child, program: &Path) -> Result<ExitStatus> {
    // Kill may race with natural exit; either way the child must be reaped.
    let _ = child.kill();
    child
        .wait()
        .with_context(|| format!("failed to reap `{}`", program.display()))
}

fn drain_pipe<R>(pipe: Option<R>) -> std::thread::JoinHandle<Vec<u8>>
where
    R: Read + Send + 'static,
{
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_builder() {
        let output = ProcessBuilder::new("echo").arg("hello").exec().unwrap();

        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.trim() == "hello" || stdout.contains("hello"));
    }

    #[test]
    fn test_display_command() {
        let pb = ProcessBuilder::new("clang").args(["-c", "-o", "out.o", "in.c"]);

        assert_eq!(pb.display_command(), "clang -c -o out.o in.c");
    }

    #[test]
    fn test_exec_bounded_without_timeout() {
        let out = ProcessBuilder::new("echo")
            .arg("bounded")
            .exec_bounded(None)
            .unwrap();

        assert!(out.status.success());
        assert!(!out.timed_out);
        assert!(String::from_utf8_lossy(&out.stdout).contains("bounded"));
    }

    #[cfg(unix)]
    #[test]
    fn test_exec_bounded_kills_on_timeout() {
        let started = Instant::now();
        let out = ProcessBuilder::new("sleep")
            .arg("30")
            .exec_bounded(Some(Duration::from_millis(200)))
            .unwrap();

        assert!(out.timed_out);
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[test]
    fn test_exec_bounded_fast_child_not_timed_out() {
        let out = ProcessBuilder::new("true")
            .exec_bounded(Some(Duration::from_secs(30)))
            .unwrap();

        assert!(out.status.success());
        assert!(!out.timed_out);
    }

    #[test]
    fn test_spawn_failure_is_error() {
        let result = ProcessBuilder::new("/nonexistent/compiler-binary").exec();
        assert!(result.is_err());
    }
}
