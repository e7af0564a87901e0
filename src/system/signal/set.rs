use crate::{cutils::cerr, log::dev_warn, system::make_zeroed_sigaction};

use super::{handler::SignalHandlerBehavior, SignalNumber};

use std::{io, mem::MaybeUninit};

#[repr(transparent)]
pub(super) struct SignalAction {
    raw: libc::sigaction,
}

impl SignalAction {
    pub(super) fn new(behavior: SignalHandlerBehavior) -> io::Result<Self> {
        // This guarantees that functions won't be interrupted by this signal as long as the
        // handler is alive.
        let mut sa_flags = libc::SA_RESTART;

        // A catching function gets a full `sa_mask` so it is never interrupted by another signal
        // while it runs.
        let (sa_sigaction, sa_mask) = match behavior {
            SignalHandlerBehavior::Default => (libc::SIG_DFL, SignalSet::empty()?),
            SignalHandlerBehavior::Ignore => (libc::SIG_IGN, SignalSet::empty()?),
            SignalHandlerBehavior::Catch(function) => {
                // Only meaningful for SIGCHLD: don't notify us about stopped children.
                sa_flags |= libc::SA_NOCLDSTOP;
                (function as libc::sighandler_t, SignalSet::full()?)
            }
        };

        let mut raw: libc::sigaction = make_zeroed_sigaction();
        raw.sa_sigaction = sa_sigaction;
        raw.sa_mask = sa_mask.raw;
        raw.sa_flags = sa_flags;

        Ok(Self { raw })
    }

    pub(super) fn register(&self, signal: SignalNumber) -> io::Result<Self> {
        let mut original_action = MaybeUninit::<Self>::zeroed();

        cerr(unsafe { libc::sigaction(signal, &self.raw, original_action.as_mut_ptr().cast()) })?;

        Ok(unsafe { original_action.assume_init() })
    }
}

// A signal set that can be used to mask signals.
#[repr(transparent)]
pub(crate) struct SignalSet {
    raw: libc::sigset_t,
}

impl SignalSet {
    /// Create an empty set.
    pub(crate) fn empty() -> io::Result<Self> {
        let mut set = MaybeUninit::<Self>::zeroed();

        cerr(unsafe { libc::sigemptyset(set.as_mut_ptr().cast()) })?;

        Ok(unsafe { set.assume_init() })
    }

    /// Create a set containing all the signals.
    pub(crate) fn full() -> io::Result<Self> {
        let mut set = MaybeUninit::<Self>::zeroed();

        cerr(unsafe { libc::sigfillset(set.as_mut_ptr().cast()) })?;

        Ok(unsafe { set.assume_init() })
    }

    /// Create a set containing only `signal`.
    pub(crate) fn only(signal: SignalNumber) -> io::Result<Self> {
        let mut set = Self::empty()?;

        cerr(unsafe { libc::sigaddset(&mut set.raw, signal) })?;

        Ok(set)
    }

    /// The set of signals currently blocked for the calling thread.
    pub(crate) fn current() -> io::Result<Self> {
        // Blocking nothing is how `sigprocmask` reports the mask without changing it.
        Self::empty()?.block()
    }

    pub(crate) fn contains(&self, signal: SignalNumber) -> bool {
        unsafe { libc::sigismember(&self.raw, signal) == 1 }
    }

    fn sigprocmask(&self, how: libc::c_int) -> io::Result<Self> {
        let mut original_set = MaybeUninit::<Self>::zeroed();

        cerr(unsafe { libc::sigprocmask(how, &self.raw, original_set.as_mut_ptr().cast()) })?;

        Ok(unsafe { original_set.assume_init() })
    }

    /// Block all the signals in this set and return the previous set of blocked signals.
    ///
    /// After calling this function successfully, the set of blocked signals will be the union of
    /// the previous set of blocked signals and this set.
    pub(crate) fn block(&self) -> io::Result<Self> {
        self.sigprocmask(libc::SIG_BLOCK)
    }

    /// Block only the signals that are in this set and return the previous set of blocked signals.
    ///
    /// After calling this function successfully, the set of blocked signals will be the exactly
    /// this set.
    pub(crate) fn set_mask(&self) -> io::Result<Self> {
        self.sigprocmask(libc::SIG_SETMASK)
    }

    /// Like [`SignalSet::block`], but the previous mask is kept in a [`MaskGuard`] that puts it
    /// back when restored or dropped.
    pub(crate) fn block_scoped(&self) -> io::Result<MaskGuard> {
        Ok(MaskGuard {
            original: Some(self.block()?),
        })
    }
}

/// The signal mask that was active before a [`SignalSet::block_scoped`] call.
///
/// A forked child inherits its own copy of the guard, so both sides of a `fork` restore their mask
/// independently.
pub(crate) struct MaskGuard {
    original: Option<SignalSet>,
}

impl MaskGuard {
    /// Restore the saved mask, reporting failure to the caller.
    pub(crate) fn restore(mut self) -> io::Result<()> {
        match self.original.take() {
            Some(set) => set.set_mask().map(drop),
            None => Ok(()),
        }
    }
}

impl Drop for MaskGuard {
    fn drop(&mut self) {
        if let Some(set) = self.original.take() {
            if let Err(err) = set.set_mask() {
                dev_warn!("cannot restore signal mask: {err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SignalSet;
    use crate::system::{run_isolated, signal::consts::*};

    #[test]
    fn block_scoped_restores_on_every_path() {
        let status = run_isolated(|| {
            assert!(!SignalSet::current()?.contains(SIGCHLD));

            let guard = SignalSet::only(SIGCHLD)?.block_scoped()?;
            assert!(SignalSet::current()?.contains(SIGCHLD));
            guard.restore()?;
            assert!(!SignalSet::current()?.contains(SIGCHLD));

            {
                let _guard = SignalSet::only(SIGCHLD)?.block_scoped()?;
                assert!(SignalSet::current()?.contains(SIGCHLD));
            }
            assert!(!SignalSet::current()?.contains(SIGCHLD));

            Ok(())
        });
        assert_eq!(status.exit_status(), Some(0));
    }

    #[test]
    fn nested_guards_unwind_in_order() {
        let status = run_isolated(|| {
            let outer = SignalSet::only(SIGCHLD)?.block_scoped()?;
            let inner = SignalSet::only(SIGUSR1)?.block_scoped()?;
            assert!(SignalSet::current()?.contains(SIGUSR1));

            inner.restore()?;
            let mask = SignalSet::current()?;
            assert!(mask.contains(SIGCHLD));
            assert!(!mask.contains(SIGUSR1));

            outer.restore()?;
            assert!(!SignalSet::current()?.contains(SIGCHLD));
            Ok(())
        });
        assert_eq!(status.exit_status(), Some(0));
    }

    #[test]
    fn only_contains_one_signal() {
        let set = SignalSet::only(SIGCHLD).unwrap();
        assert!(set.contains(SIGCHLD));
        assert!(!set.contains(SIGINT));
        assert!(SignalSet::full().unwrap().contains(SIGINT));
    }
}
