//! External tool invocation
//!
//! Every tool runs once, synchronously, with stderr folded into stdout so the
//! captured output reads the way it would on a terminal.

use crate::error::{ExitCode, ProcessError, ProcessResult};
use std::ffi::OsString;
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, error};

/// One command line plus the environment additions it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub program: String,
    pub args: Vec<OsString>,
    pub env: Vec<(String, OsString)>,
    pub working_dir: Option<PathBuf>,
}

impl ToolInvocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            working_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<OsString>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Arguments as lossy strings, handy for matching in fakes and logs.
    pub fn arg_strings(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    pub fn env_value(&self, key: &str) -> Option<&OsString> {
        self.env.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }
}

impl fmt::Display for ToolInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Merged stdout/stderr of a successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub output: String,
}

/// Runs tool invocations. The image pipeline only talks to tools through this.
pub trait CommandRunner {
    fn run(&self, invocation: &ToolInvocation) -> ProcessResult<CommandOutput>;
}

/// Runs commands on the host, inheriting the current environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, invocation: &ToolInvocation) -> ProcessResult<CommandOutput> {
        let spawn_error = |source| ProcessError::Spawn {
            command: invocation.to_string(),
            source,
        };

        let (mut reader, writer) = std::io::pipe().map_err(spawn_error)?;
        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdout(writer.try_clone().map_err(spawn_error)?)
            .stderr(writer);
        for (key, value) in &invocation.env {
            command.env(key, value);
        }
        if let Some(dir) = &invocation.working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(spawn_error)?;
        // The command still holds the write ends; the read below only sees EOF
        // once every copy is closed.
        drop(command);

        let mut raw = Vec::new();
        reader.read_to_end(&mut raw).map_err(spawn_error)?;
        let status = child.wait().map_err(spawn_error)?;
        let output = String::from_utf8_lossy(&raw).into_owned();

        if status.success() {
            Ok(CommandOutput { output })
        } else {
            Err(ProcessError::Exit {
                command: invocation.to_string(),
                status: status.code().map_or(ExitCode::Signal, ExitCode::Code),
                output,
            })
        }
    }
}

/// Run `invocation`, logging its output; on failure log `error_msg` and propagate.
pub fn run_and_log(
    runner: &dyn CommandRunner,
    invocation: &ToolInvocation,
    error_msg: &str,
) -> ProcessResult<CommandOutput> {
    debug!("running command {}", invocation);
    match runner.run(invocation) {
        Ok(out) => {
            if !out.output.is_empty() {
                debug!("output of the command:\n{}", out.output);
            }
            Ok(out)
        }
        Err(e) => {
            error!("{}", error_msg);
            if let ProcessError::Exit { output, .. } = &e {
                debug!("output of the failed command:\n{}", output);
            }
            Err(e)
        }
    }
}

/// Extract one member of a tarball into `working_dir`.
pub fn extract_member(
    runner: &dyn CommandRunner,
    tar_program: &str,
    archive: &Path,
    member: &str,
    working_dir: &Path,
) -> ProcessResult<CommandOutput> {
    let invocation = ToolInvocation::new(tar_program)
        .arg("-xf")
        .arg(archive)
        .arg(member)
        .working_dir(working_dir);
    run_and_log(runner, &invocation, "Failed to extract selected tarball.")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> ToolInvocation {
        ToolInvocation::new("sh").arg("-c").arg(script)
    }

    #[test]
    fn display_joins_program_and_args() {
        let invocation = ToolInvocation::new("skopeo")
            .args(["copy", "docker://quay.io/acme/widget:v2"])
            .arg("docker-archive:/tmp/archive.tar");
        assert_eq!(
            invocation.to_string(),
            "skopeo copy docker://quay.io/acme/widget:v2 docker-archive:/tmp/archive.tar"
        );
    }

    #[test]
    fn stderr_is_merged_into_output() {
        let out = SystemRunner
            .run(&sh("echo out; echo err 1>&2"))
            .unwrap();
        assert!(out.output.contains("out"));
        assert!(out.output.contains("err"));
    }

    #[test]
    fn injected_environment_reaches_the_child() {
        let invocation = sh("printf %s \"$ATOMIC_OSTREE_REPO\"").env("ATOMIC_OSTREE_REPO", "/x/repo");
        let out = SystemRunner.run(&invocation).unwrap();
        assert_eq!(out.output, "/x/repo");
    }

    #[test]
    fn working_dir_is_applied() {
        let dir = tempfile::tempdir().unwrap();
        let out = SystemRunner.run(&sh("pwd").working_dir(dir.path())).unwrap();
        let reported = PathBuf::from(out.output.trim());
        assert_eq!(
            reported.canonicalize().unwrap(),
            dir.path().canonicalize().unwrap()
        );
    }

    #[test]
    fn non_zero_exit_carries_status_and_output() {
        let err = run_and_log(&SystemRunner, &sh("echo boom; exit 3"), "it failed").unwrap_err();
        match err {
            ProcessError::Exit { status, output, .. } => {
                assert_eq!(status, ExitCode::Code(3));
                assert!(output.contains("boom"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn missing_program_is_a_spawn_failure() {
        let err = SystemRunner
            .run(&ToolInvocation::new("imgcheck-definitely-not-installed"))
            .unwrap_err();
        assert!(matches!(err, ProcessError::Spawn { .. }));
    }
}
