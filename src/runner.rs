//! Engine Runner
//!
//! Resolves the DGGRID executable, writes the control file into the working
//! directory and runs the engine there with stdout and stderr merged.
//!
//! The working directory is handed to the child process; the caller's current
//! directory is never changed. Runs are synchronous and have no timeout. Two
//! runners sharing a working directory race on the control file, so callers
//! must serialize runs per directory.

use std::env;
use std::fs;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::RunnerConfig;
use crate::error::{DggridError, Result};
use crate::metafile::MetafileLines;

/// Name of the control file written before each run.
pub const METAFILE_NAME: &str = "metafile";

/// Target used when echoing engine output.
pub const ENGINE_LOG_TARGET: &str = "dggrid_engine";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunOutcome {
    /// `None` when the engine never started or was killed by a signal.
    pub exit_code: Option<i32>,
    pub success: bool,
    /// Captured output, present only when log capture was on.
    pub log: Option<String>,
}

pub struct EngineRunner {
    config: RunnerConfig,
    last_run_successful: bool,
    last_run_logs: String,
}

impl EngineRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            config,
            last_run_successful: false,
            last_run_logs: String::new(),
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn capture_logs(&self) -> bool {
        self.config.capture_logs
    }

    pub fn set_capture_logs(&mut self, capture: bool) {
        self.config.capture_logs = capture;
    }

    pub fn last_run_successful(&self) -> bool {
        self.last_run_successful
    }

    pub fn last_run_logs(&self) -> &str {
        &self.last_run_logs
    }

    /// First existing, executable candidate: the configured path itself (or
    /// each PATH entry for a bare name), then the working directory.
    pub fn resolve_executable(&self) -> Option<PathBuf> {
        let found = self
            .candidates()
            .into_iter()
            .find(|candidate| is_executable_file(candidate))
            .map(|path| fs::canonicalize(&path).unwrap_or(path));

        match &found {
            Some(path) => debug!(executable = %path.display(), "resolved DGGRID executable"),
            None => warn!(
                executable = %self.config.executable.display(),
                "executable not found on PATH or in working directory"
            ),
        }
        found
    }

    pub fn is_runnable(&self) -> bool {
        self.resolve_executable().is_some()
    }

    fn candidates(&self) -> Vec<PathBuf> {
        let exe = &self.config.executable;
        let mut out = vec![];

        if exe.is_absolute() || exe.components().count() > 1 {
            out.push(exe.clone());
        } else if let Some(paths) = env::var_os("PATH") {
            out.extend(env::split_paths(&paths).map(|dir| dir.join(exe)));
        }
        if !exe.is_absolute() {
            out.push(self.config.working_dir.join(exe));
        }
        out
    }

    /// Write `metafile` and run the engine on it.
    ///
    /// Only an unresolvable executable is an `Err`. Faults while writing the
    /// control file or spawning are logged and reported as a failed outcome.
    pub fn execute(&mut self, metafile: &MetafileLines) -> Result<RunOutcome> {
        let executable = self.resolve_executable().ok_or_else(|| {
            DggridError::EngineNotRunnable(format!(
                "{} not found or not executable",
                self.config.executable.display()
            ))
        })?;

        let outcome = match self.spawn_and_drain(&executable, metafile) {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = ?e, executable = %executable.display(), "DGGRID run aborted");
                RunOutcome {
                    exit_code: None,
                    success: false,
                    log: Some(format!("{:?}", e)),
                }
            }
        };

        self.last_run_successful = outcome.success;
        self.last_run_logs = outcome.log.clone().unwrap_or_default();
        info!(exit_code = ?outcome.exit_code, success = outcome.success, "DGGRID run finished");
        Ok(outcome)
    }

    fn spawn_and_drain(&self, executable: &Path, metafile: &MetafileLines) -> io::Result<RunOutcome> {
        let control_file = self.config.working_dir.join(METAFILE_NAME);
        fs::write(&control_file, metafile.render())?;
        debug!(path = %control_file.display(), lines = metafile.len(), "wrote control file");

        let (reader, writer) = io::pipe()?;
        let mut command = Command::new(executable);
        command
            .arg(METAFILE_NAME)
            .current_dir(&self.config.working_dir)
            .stdin(Stdio::null())
            .stdout(writer.try_clone()?)
            .stderr(writer);

        let mut child = command.spawn()?;
        // The command still owns write ends of the pipe; drop them so the
        // reader sees EOF when the child exits.
        drop(command);

        let mut logs = vec![];
        let mut reader = BufReader::new(reader);
        let mut buf = vec![];
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            let line = String::from_utf8_lossy(&buf);
            let line = line.trim();
            if !self.config.silent {
                info!(target: ENGINE_LOG_TARGET, "{}", line);
            }
            if self.config.capture_logs {
                logs.push(line.to_string());
            }
        }

        let status = child.wait()?;
        Ok(RunOutcome {
            exit_code: status.code(),
            success: status.success(),
            log: self.config.capture_logs.then(|| logs.join("\n")),
        })
    }
}

#[cfg(unix)]
fn is_executable_file(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable_file(path: &Path) -> bool {
    path.is_file()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::registry::MetafileKey;
    use std::os::unix::fs::PermissionsExt;

    fn install_stub(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{}", body)).unwrap();
        let mut perms = fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).unwrap();
        path
    }

    fn stats_metafile() -> MetafileLines {
        let mut lines = MetafileLines::new();
        lines.push(MetafileKey::DggridOperation, "OUTPUT_STATS").push(MetafileKey::DggsType, "ISEA3H");
        lines
    }

    #[test]
    fn test_resolves_from_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        install_stub(dir.path(), "fake-dggrid", "exit 0\n");
        let runner = EngineRunner::new(RunnerConfig::new("fake-dggrid", dir.path()));
        let resolved = runner.resolve_executable().unwrap();
        assert_eq!(resolved, fs::canonicalize(dir.path().join("fake-dggrid")).unwrap());
    }

    #[test]
    fn test_non_executable_is_not_runnable() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("plain"), "not a program").unwrap();
        let runner = EngineRunner::new(RunnerConfig::new("plain", dir.path()));
        assert!(!runner.is_runnable());
    }

    #[test]
    fn test_missing_executable_fails_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let mut runner = EngineRunner::new(RunnerConfig::new("no-such-dggrid-binary", dir.path()));
        let err = runner.execute(&stats_metafile()).unwrap_err();
        assert!(matches!(err, DggridError::EngineNotRunnable(_)));
        assert!(!dir.path().join(METAFILE_NAME).exists());
    }

    #[test]
    fn test_engine_reads_control_file_and_merges_stderr() {
        let dir = tempfile::tempdir().unwrap();
        install_stub(dir.path(), "fake-dggrid", "cat \"$1\"\necho oops >&2\nexit 0\n");
        let mut runner = EngineRunner::new(RunnerConfig::new("fake-dggrid", dir.path()));

        let outcome = runner.execute(&stats_metafile()).unwrap();
        assert!(outcome.success);
        assert_eq!(
            outcome.log.as_deref(),
            Some("dggrid_operation OUTPUT_STATS\ndggs_type ISEA3H\noops")
        );
        assert!(runner.last_run_successful());
    }

    #[test]
    fn test_non_zero_exit_is_failure() {
        let dir = tempfile::tempdir().unwrap();
        install_stub(dir.path(), "fake-dggrid", "echo broken\nexit 3\n");
        let mut runner = EngineRunner::new(RunnerConfig::new("fake-dggrid", dir.path()));

        let outcome = runner.execute(&stats_metafile()).unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.exit_code, Some(3));
        assert_eq!(runner.last_run_logs(), "broken");
    }

    #[test]
    fn test_capture_off_keeps_no_log() {
        let dir = tempfile::tempdir().unwrap();
        install_stub(dir.path(), "fake-dggrid", "echo hello\n");
        let mut config = RunnerConfig::new("fake-dggrid", dir.path());
        config.capture_logs = false;
        config.silent = true;
        let mut runner = EngineRunner::new(config);

        let outcome = runner.execute(&stats_metafile()).unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.log, None);
        assert_eq!(runner.last_run_logs(), "");
    }

    #[test]
    fn test_spawn_fault_is_reported_as_failure() {
        let dir = tempfile::tempdir().unwrap();
        // Executable bit set, but the interpreter does not exist.
        let path = dir.path().join("broken-dggrid");
        fs::write(&path, "#!/nonexistent/interpreter\n").unwrap();
        let mut perms = fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).unwrap();

        let mut runner = EngineRunner::new(RunnerConfig::new("broken-dggrid", dir.path()));
        let outcome = runner.execute(&stats_metafile()).unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.exit_code, None);
        assert!(!runner.last_run_successful());
    }
}
