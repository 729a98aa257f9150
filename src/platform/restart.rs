use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Command;

use anyhow::{Context, Result};
use tracing::{error, info};

/// How to start an identical copy of this process.
///
/// Captured once at startup so a later relaunch does not depend on the
/// working directory or arguments having been changed in between.
#[derive(Debug, Clone)]
pub struct RelaunchPlan {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub cwd: PathBuf,
}

impl RelaunchPlan {
    pub fn capture() -> Result<Self> {
        let program = std::env::current_exe().context("failed to resolve current executable")?;
        let cwd = std::env::current_dir().context("failed to resolve working directory")?;
        Ok(Self {
            program,
            args: std::env::args_os().skip(1).collect(),
            cwd,
        })
    }

    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).current_dir(&self.cwd);
        cmd
    }

    /// Start the replacement and terminate this process.
    ///
    /// If the replacement cannot be spawned the current image is re-executed
    /// in place instead.
    pub fn relaunch(&self) -> ! {
        match self.command().spawn() {
            Ok(child) => {
                info!(pid = child.id(), program = %self.program.display(), "replacement started; exiting");
                std::process::exit(0);
            }
            Err(err) => {
                error!(error = %err, program = %self.program.display(), "failed to spawn replacement; re-executing in place");
                exec_in_place(self)
            }
        }
    }
}

impl RelaunchPlan {
    /// A callback that relaunches when invoked.
    pub fn into_hook(self) -> impl Fn() + Send + Sync + 'static {
        move || {
            self.relaunch();
        }
    }
}

#[cfg(unix)]
fn exec_in_place(plan: &RelaunchPlan) -> ! {
    use std::os::unix::process::CommandExt;

    let err = plan.command().exec();
    error!(error = %err, "exec failed");
    std::process::exit(1)
}

#[cfg(not(unix))]
fn exec_in_place(_plan: &RelaunchPlan) -> ! {
    error!("in-place re-execution unsupported on this platform");
    std::process::exit(1)
}
