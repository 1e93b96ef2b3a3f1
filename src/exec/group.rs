// src/exec/group.rs

//! Process-group ownership for stage tools.
//!
//! Every stage program is started as the leader of a fresh process group, so
//! whatever it spawns (the photogrammetry script starts `colmap`, trainers
//! start data loaders) shares its group id. Killing the group takes all of
//! them down at once; killing only the leader would orphan the rest.

use std::io;

use tokio::process::Command;
use tracing::debug;

/// Start `cmd` in a new process group led by the child itself.
pub(crate) fn isolate(cmd: &mut Command) {
    #[cfg(unix)]
    cmd.process_group(0);
    #[cfg(not(unix))]
    let _ = cmd;
}

/// Kill switch for the process group of one running tool.
///
/// Armed while the tool runs. Dropping an armed group kills it, which covers a
/// stage future that is aborted mid-run.
#[derive(Debug)]
pub(crate) struct ProcessGroup {
    pgid: Option<u32>,
}

impl ProcessGroup {
    /// Group led by the child with `pid` (see [`isolate`]).
    pub(crate) fn led_by(pid: Option<u32>) -> Self {
        Self { pgid: pid }
    }

    /// SIGKILL every process in the group and disarm.
    pub(crate) fn kill(&mut self) -> io::Result<()> {
        match self.pgid.take() {
            Some(pgid) => kill_group(pgid),
            None => Ok(()),
        }
    }

    /// The leader exited on its own; leave the group alone.
    pub(crate) fn disarm(&mut self) {
        self.pgid = None;
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        if let Some(pgid) = self.pgid {
            debug!(pgid, "stage dropped while running; killing its process group");
            let _ = self.kill();
        }
    }
}

#[cfg(unix)]
fn kill_group(pgid: u32) -> io::Result<()> {
    let Ok(pgid) = libc::pid_t::try_from(pgid) else {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("process group id {pgid} out of range"),
        ));
    };
    // SAFETY: killpg only sends a signal; `pgid` is the id of a group this
    // process created and has not reaped the leader of yet.
    let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
    if rc == 0 {
        return Ok(());
    }
    let err = io::Error::last_os_error();
    // Nothing left in the group.
    if err.raw_os_error() == Some(libc::ESRCH) {
        return Ok(());
    }
    Err(err)
}

#[cfg(not(unix))]
fn kill_group(_pgid: u32) -> io::Result<()> {
    // No process groups; `kill_on_drop` on the child is all there is.
    Ok(())
}
