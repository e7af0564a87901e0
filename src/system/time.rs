use std::{mem::MaybeUninit, time::Duration};

/// A timestamp relative to `CLOCK_MONOTONIC`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MonotonicTime {
    secs: i64,
    nsecs: i64,
}

impl MonotonicTime {
    pub(super) fn new(secs: i64, nsecs: i64) -> MonotonicTime {
        MonotonicTime {
            secs: secs + nsecs.div_euclid(1_000_000_000),
            nsecs: nsecs.rem_euclid(1_000_000_000),
        }
    }

    pub fn now() -> std::io::Result<MonotonicTime> {
        let mut spec = MaybeUninit::<libc::timespec>::uninit();
        // SAFETY: valid pointer is passed to clock_gettime
        crate::cutils::cerr(unsafe {
            libc::clock_gettime(libc::CLOCK_MONOTONIC, spec.as_mut_ptr())
        })?;
        // SAFETY: The `libc::clock_gettime` will correctly initialize `spec`,
        // otherwise it will return early with the `?` operator.
        let spec = unsafe { spec.assume_init() };
        Ok(spec.into())
    }

    /// Time elapsed from `earlier` to `self`, zero if `earlier` is not actually earlier.
    pub fn saturating_duration_since(&self, earlier: MonotonicTime) -> Duration {
        if *self <= earlier {
            return Duration::ZERO;
        }

        let mut secs = self.secs - earlier.secs;
        let mut nsecs = self.nsecs - earlier.nsecs;
        if nsecs < 0 {
            secs -= 1;
            nsecs += 1_000_000_000;
        }

        Duration::new(secs as u64, nsecs as u32)
    }
}

impl From<libc::timespec> for MonotonicTime {
    #[allow(clippy::useless_conversion)]
    fn from(value: libc::timespec) -> Self {
        MonotonicTime::new(value.tv_sec.into(), value.tv_nsec.into())
    }
}
