use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use tokio::process::Command;

use super::handle::{ProcessHandle, ProcessOutput};
use crate::error::TaskError;

/// Program, arguments and optional working directory of one external invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandSpec {
    /// Executable path (or name looked up on `PATH`).
    pub program: PathBuf,
    /// Arguments, in order.
    pub args: Vec<String>,
    /// Working directory, if any.
    pub cwd: Option<PathBuf>,
}

impl CommandSpec {
    /// Creates a command with no arguments.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    /// Builds a command from an argv-style list (`argv[0]` is the program).
    ///
    /// Returns `None` for an empty list.
    pub fn from_argv<S: AsRef<str>>(argv: &[S]) -> Option<Self> {
        let (program, rest) = argv.split_first()?;
        Some(Self::new(program.as_ref()).args(rest.iter().map(|a| a.as_ref())))
    }

    /// Appends one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends a path argument.
    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy())
    }

    /// Appends several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets the working directory.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Program name for logs.
    pub fn program_name(&self) -> String {
        self.program.display().to_string()
    }

    /// Launches the command as an independent process.
    ///
    /// stdin is closed; stdout and stderr are piped into `tracing`, tagged with `task`.
    /// A missing or unrunnable executable yields [`TaskError::Launch`].
    pub fn spawn(&self, task: &str) -> Result<ProcessHandle, TaskError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }

        tracing::debug!(task, command = %self, "spawning");
        let child = cmd
            .spawn()
            .map_err(|e| TaskError::launch(self.program_name(), &e))?;
        Ok(ProcessHandle::new(Arc::from(task), self.program_name(), child))
    }

    /// Launches the command and waits for it to finish.
    pub async fn run(&self, task: &str) -> Result<ProcessOutput, TaskError> {
        let handle = self.spawn(task)?;
        handle
            .output()
            .await
            .map_err(|e| TaskError::launch(self.program_name(), &e))
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_argv_splits_program() {
        let cmd = CommandSpec::from_argv(&["/usr/bin/sudo", "/usr/bin/umount"]).unwrap();
        assert_eq!(cmd.program, PathBuf::from("/usr/bin/sudo"));
        assert_eq!(cmd.args, vec!["/usr/bin/umount".to_string()]);
        assert!(CommandSpec::from_argv::<&str>(&[]).is_none());
    }

    #[test]
    fn display_joins_arguments() {
        let cmd = CommandSpec::new("rclone")
            .arg("move")
            .arg(".")
            .path_arg(Path::new("/mnt/x"));
        assert_eq!(cmd.to_string(), "rclone move . /mnt/x");
    }

    #[tokio::test]
    async fn run_captures_output() {
        let out = CommandSpec::new("sh")
            .args(["-c", "echo hello; echo oops >&2; exit 3"])
            .run("test")
            .await
            .unwrap();
        assert_eq!(out.status.code(), Some(3));
        assert_eq!(out.stdout, "hello\n");
        assert_eq!(out.stderr, "oops\n");
    }

    #[tokio::test]
    async fn run_honours_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker"), b"x").unwrap();
        let out = CommandSpec::new("ls")
            .current_dir(dir.path())
            .run("test")
            .await
            .unwrap();
        assert!(out.status.success());
        assert_eq!(out.stdout, "marker\n");
    }

    #[tokio::test]
    async fn missing_binary_is_a_launch_error() {
        let err = CommandSpec::new("/nonexistent/mountvisor-test-binary")
            .run("test")
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::Launch { .. }));
    }
}
