//! Reclaiming terminated background children.
//!
//! Two strategies share the [`Reaper`] interface: [`PollingReaper`] collects children right before
//! each prompt, [`SigchldReaper`] collects them from a `SIGCHLD` handler as soon as they end. The
//! shell picks one when it is constructed, see [`ReapStrategy`].

use std::io;

use crate::{
    exec::io_util::was_interrupted,
    system::{
        interface::ProcessId,
        wait::{Wait, WaitError, WaitOptions, WaitStatus},
    },
};

mod poll;
mod sigchld;

pub(crate) use poll::PollingReaper;
pub(crate) use sigchld::SigchldReaper;

pub(crate) trait Reaper {
    /// Runs once per loop iteration, right before the prompt is displayed.
    fn before_prompt(&mut self);

    /// Announce the pid of a foreground child.
    ///
    /// The launcher calls this while `SIGCHLD` is still blocked, so no report about `pid` can have
    /// been produced yet.
    fn track_foreground(&self, _pid: ProcessId) {}

    /// The status of the foreground child `pid`, if this reaper collected it before the
    /// foreground supervisor could.
    fn claim_foreground(&self, _pid: ProcessId) -> Option<WaitStatus> {
        None
    }

    /// Stop treating the tracked pid as a foreground child.
    fn release_foreground(&self) {}
}

/// Which [`Reaper`] the shell uses. Fixed at build time through the `sigchld-reaper` feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReapStrategy {
    Polling,
    Sigchld,
}

impl ReapStrategy {
    pub(crate) const fn from_build() -> Self {
        if cfg!(feature = "sigchld-reaper") {
            ReapStrategy::Sigchld
        } else {
            ReapStrategy::Polling
        }
    }

    pub(crate) fn install(self) -> io::Result<Box<dyn Reaper>> {
        Ok(match self {
            ReapStrategy::Polling => Box::new(PollingReaper::new()),
            ReapStrategy::Sigchld => Box::new(SigchldReaper::install()?),
        })
    }
}

impl Default for ReapStrategy {
    fn default() -> Self {
        Self::from_build()
    }
}

/// Collect every child that has already terminated, without blocking.
///
/// `report` is called once per reaped child. Returns how many children were reaped.
pub(crate) fn reap_terminated(mut report: impl FnMut(ProcessId, WaitStatus)) -> io::Result<usize> {
    let mut count = 0;
    loop {
        match ProcessId::ANY.wait(WaitOptions::new().no_hang()) {
            Ok((pid, status)) => {
                report(pid, status);
                count += 1;
            }
            Err(WaitError::NotReady) => return Ok(count),
            Err(err) if err.is_no_child() => return Ok(count),
            Err(WaitError::Io(err)) if was_interrupted(&err) => {}
            Err(WaitError::Io(err)) => return Err(err),
        }
    }
}
