use std::{fmt, io, time::Duration};

use crate::{
    common::Error,
    log::user_warn,
    reap::Reaper,
    system::{
        interface::ProcessId,
        resource::ChildrenUsage,
        time::MonotonicTime,
        wait::{ProcessOutcome, Wait, WaitError, WaitOptions, WaitStatus},
    },
};

use super::io_util::was_interrupted;

/// Clock and CPU accounting captured right before a foreground command is spawned.
pub(crate) struct LaunchSnapshot {
    started: MonotonicTime,
    usage: ChildrenUsage,
}

impl LaunchSnapshot {
    pub(crate) fn take() -> io::Result<Self> {
        Ok(Self {
            started: MonotonicTime::now()?,
            usage: ChildrenUsage::current()?,
        })
    }

    fn times_until_now(&self) -> io::Result<Times> {
        let ended = MonotonicTime::now()?;
        let usage = ChildrenUsage::current()?.saturating_sub(&self.usage);

        Ok(Times {
            wall: ended.saturating_duration_since(self.started),
            user: usage.user,
            system: usage.system,
        })
    }
}

/// Wall clock and CPU time attributed to one foreground command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Times {
    pub(crate) wall: Duration,
    pub(crate) user: Duration,
    pub(crate) system: Duration,
}

impl fmt::Display for Times {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "times: wall={:.6} s, user={:.6} s, sys={:.6} s",
            self.wall.as_secs_f64(),
            self.user.as_secs_f64(),
            self.system.as_secs_f64()
        )
    }
}

#[derive(Debug)]
pub(crate) struct ForegroundReport {
    pub(crate) pid: ProcessId,
    pub(crate) outcome: ProcessOutcome,
    /// Missing if the clock or the resource usage could not be read.
    pub(crate) times: Option<Times>,
}

impl fmt::Display for ForegroundReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "foreground process {} {}", self.pid, self.outcome)?;
        if let Some(times) = &self.times {
            write!(f, "\n{times}")?;
        }
        Ok(())
    }
}

/// Block until the foreground child `pid` terminates and describe how it went.
///
/// `before` is the snapshot taken before `pid` was spawned.
pub(crate) fn supervise(
    pid: ProcessId,
    before: Option<LaunchSnapshot>,
    reaper: &dyn Reaper,
) -> Result<ForegroundReport, Error> {
    let status = wait_for(pid, reaper);
    reaper.release_foreground();
    let status = status?;

    let times = before.and_then(|before| match before.times_until_now() {
        Ok(times) => Some(times),
        Err(err) => {
            user_warn!("cannot measure process times: {err}");
            None
        }
    });

    Ok(ForegroundReport {
        pid,
        outcome: status.outcome(),
        times,
    })
}

fn wait_for(pid: ProcessId, reaper: &dyn Reaper) -> Result<WaitStatus, Error> {
    loop {
        match pid.wait(WaitOptions::new()) {
            Ok((_pid, status)) => return Ok(status),
            Err(WaitError::Io(err)) if was_interrupted(&err) => {}
            // Somebody else reaped the child first; only the reaper can have done so.
            Err(WaitError::Io(err)) if err.raw_os_error() == Some(libc::ECHILD) => {
                return reaper.claim_foreground(pid).ok_or(Error::Wait(err));
            }
            Err(WaitError::Io(err)) => return Err(Error::Wait(err)),
            // Only happens with `WaitOptions::no_hang`.
            Err(WaitError::NotReady) => {}
        }
    }
}
