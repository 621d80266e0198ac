//! Runner configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunnerConfig {
    /// Executable name (searched on PATH and in `working_dir`) or path.
    #[serde(default = "default_executable")]
    pub executable: PathBuf,
    /// Directory the metafile is written to and the engine runs in.
    #[serde(default = "default_working_dir")]
    pub working_dir: PathBuf,
    #[serde(default = "default_true")]
    pub capture_logs: bool,
    /// Suppress echoing engine output.
    #[serde(default)]
    pub silent: bool,
}

fn default_executable() -> PathBuf { PathBuf::from("dggrid") }
fn default_working_dir() -> PathBuf { PathBuf::from(".") }
fn default_true() -> bool { true }

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            executable: default_executable(),
            working_dir: default_working_dir(),
            capture_logs: true,
            silent: false,
        }
    }
}

impl RunnerConfig {
    pub fn new(executable: impl Into<PathBuf>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            working_dir: working_dir.into(),
            ..Default::default()
        }
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_take_defaults() {
        let config: RunnerConfig = serde_json::from_str(r#"{"workingDir": "/tmp/grids"}"#).unwrap();
        assert_eq!(config.executable, PathBuf::from("dggrid"));
        assert_eq!(config.working_dir, PathBuf::from("/tmp/grids"));
        assert!(config.capture_logs);
        assert!(!config.silent);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runner.json");
        fs::write(&path, r#"{"executable": "/opt/dggrid/bin/dggrid", "silent": true}"#).unwrap();

        let config = RunnerConfig::load_from_file(&path).unwrap();
        assert_eq!(config.executable, PathBuf::from("/opt/dggrid/bin/dggrid"));
        assert!(config.silent);
    }

    #[test]
    fn test_load_rejects_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runner.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(RunnerConfig::load_from_file(&path).is_err());
    }
}
