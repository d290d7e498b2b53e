use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Could not write version header {}: {}", .0.display(), .1)]
    HeaderWriteError(PathBuf, io::Error),
    #[error("Could not create output directory {}: {}", .0.display(), .1)]
    OutputDirError(PathBuf, io::Error),
    #[error("Could not read merged image {}: {}", .0.display(), .1)]
    ReportError(PathBuf, io::Error),
    #[error("Required build artifact is missing: {}", .0.display())]
    MissingArtifact(PathBuf),
    #[error("Could not launch {}: {}", .0, .1)]
    SpawnError(String, io::Error),
    #[error("Merge tool exited with {}", .0)]
    MergeFailed(ExitCode),
    #[error("Build command exited with {}", .0)]
    BuildFailed(ExitCode),
    #[error("Firmware version already published as {:?}", .0)]
    VersionAlreadyPublished(String),
}

/// Exit code of a child process, `None` if it was terminated by a signal
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ExitCode(pub Option<i32>);

impl ExitCode {
    pub fn success(self) -> bool {
        self.0 == Some(0)
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(code) => write!(f, "exit code {}", code),
            None => write!(f, "no exit code (terminated by signal)"),
        }
    }
}
