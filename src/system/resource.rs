use std::{io, mem::MaybeUninit, time::Duration};

use crate::cutils::cerr;

/// CPU time consumed by every child of this process that has been waited for so far.
///
/// The kernel only keeps this cumulative figure, so the share of a single child is the difference
/// between a snapshot taken before it was spawned and one taken after it was reaped. Background
/// children reaped in between are counted too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChildrenUsage {
    pub user: Duration,
    pub system: Duration,
}

impl ChildrenUsage {
    pub fn current() -> io::Result<Self> {
        let mut usage = MaybeUninit::<libc::rusage>::zeroed();
        // SAFETY: `usage` is a valid pointer to a `rusage` struct.
        cerr(unsafe { libc::getrusage(libc::RUSAGE_CHILDREN, usage.as_mut_ptr()) })?;
        // SAFETY: `getrusage` succeeded so it filled `usage`.
        let usage = unsafe { usage.assume_init() };

        Ok(Self {
            user: from_timeval(usage.ru_utime),
            system: from_timeval(usage.ru_stime),
        })
    }

    /// The usage accumulated since `before` was taken.
    pub fn saturating_sub(&self, before: &ChildrenUsage) -> ChildrenUsage {
        ChildrenUsage {
            user: self.user.saturating_sub(before.user),
            system: self.system.saturating_sub(before.system),
        }
    }
}

fn from_timeval(tv: libc::timeval) -> Duration {
    Duration::new(tv.tv_sec.max(0) as u64, 0) + Duration::from_micros(tv.tv_usec.max(0) as u64)
}
