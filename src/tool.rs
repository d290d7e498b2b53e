//! Running external programs

use std::ffi::{OsStr, OsString};
use std::process::Command;

use log::trace;

use crate::error::ExitCode;
use crate::Error;

/// A program and the arguments to launch it with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: OsString,
    pub args: Vec<OsString>,
}

impl Invocation {
    pub fn new<S: AsRef<OsStr>>(program: S) -> Invocation {
        Invocation {
            program: program.as_ref().to_os_string(),
            args: Vec::new(),
        }
    }

    /// Appends a single argument
    pub fn arg<S: AsRef<OsStr>>(&mut self, arg: S) -> &mut Invocation {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Appends every argument in `args`
    pub fn args<I, S>(&mut self, args: I) -> &mut Invocation
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for arg in args {
            self.arg(arg);
        }
        self
    }

    /// The arguments as lossy UTF-8 strings
    pub fn args_lossy(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }

    /// The full command line joined by spaces, for logs
    pub fn command_line(&self) -> String {
        let mut parts = vec![self.program.to_string_lossy().into_owned()];
        parts.extend(self.args_lossy());
        parts.join(" ")
    }
}

/// Runs an `Invocation` to completion
pub trait ToolRunner {
    /// Runs `invocation` and waits for it, returning its exit code
    ///
    /// Only a failure to launch is an `Err`; a non-zero exit is for the caller to judge.
    fn run(&mut self, invocation: &Invocation) -> Result<ExitCode, Error>;
}

/// Runs invocations as child processes sharing this process' stdio
#[derive(Debug, Default, Copy, Clone)]
pub struct SystemRunner;

impl ToolRunner for SystemRunner {
    fn run(&mut self, invocation: &Invocation) -> Result<ExitCode, Error> {
        trace!("Spawning {:?}", invocation);

        let program = invocation.program.to_string_lossy().into_owned();
        let status = Command::new(&invocation.program)
            .args(&invocation.args)
            .status()
            .map_err(|err| Error::SpawnError(program.clone(), err))?;

        trace!("{} exited with {}", program, status);

        Ok(ExitCode(status.code()))
    }
}
