use std::{
    io,
    os::fd::RawFd,
    sync::atomic::{AtomicBool, AtomicI32, Ordering},
};

use crate::{
    cutils::{errno, set_errno},
    log::dev_info,
    system::{
        interface::ProcessId,
        signal::{
            consts::SIGCHLD, SignalHandler, SignalHandlerBehavior, SignalNumber, SignalSafeWriter,
        },
        wait::{ProcessOutcome, WaitOptions, WaitStatus},
    },
};

use super::Reaper;

static INSTALLED: AtomicBool = AtomicBool::new(false);
static REPORT_FD: AtomicI32 = AtomicI32::new(libc::STDOUT_FILENO);

// 0 while no foreground child is outstanding
static FOREGROUND_PID: AtomicI32 = AtomicI32::new(0);
static FOREGROUND_STATUS: AtomicI32 = AtomicI32::new(0);
static FOREGROUND_REAPED: AtomicBool = AtomicBool::new(false);

/// Reaps background children from a `SIGCHLD` handler.
///
/// This is a singleton: only one value of this type can be alive at a time. Dropping it restores
/// the previous `SIGCHLD` action.
pub(crate) struct SigchldReaper {
    _handler: SignalHandler,
}

impl SigchldReaper {
    /// Install the handler, reporting to standard output.
    ///
    /// # Panics
    ///
    /// If another [`SigchldReaper`] is alive.
    #[track_caller]
    pub(crate) fn install() -> io::Result<Self> {
        Self::install_reporting_to(libc::STDOUT_FILENO)
    }

    #[track_caller]
    pub(crate) fn install_reporting_to(fd: RawFd) -> io::Result<Self> {
        if INSTALLED.swap(true, Ordering::SeqCst) {
            panic!("a `SigchldReaper` is already installed");
        }

        REPORT_FD.store(fd, Ordering::SeqCst);
        FOREGROUND_PID.store(0, Ordering::SeqCst);

        match SignalHandler::register(SIGCHLD, SignalHandlerBehavior::Catch(reap_children)) {
            Ok(handler) => {
                dev_info!("reaping background processes from the SIGCHLD handler");
                Ok(Self { _handler: handler })
            }
            Err(err) => {
                INSTALLED.store(false, Ordering::SeqCst);
                Err(err)
            }
        }
    }
}

impl Drop for SigchldReaper {
    fn drop(&mut self) {
        INSTALLED.store(false, Ordering::SeqCst);
    }
}

impl Reaper for SigchldReaper {
    fn before_prompt(&mut self) {
        // the handler already reported everything that ended
    }

    fn track_foreground(&self, pid: ProcessId) {
        FOREGROUND_REAPED.store(false, Ordering::SeqCst);
        FOREGROUND_PID.store(pid.get(), Ordering::SeqCst);
    }

    fn claim_foreground(&self, pid: ProcessId) -> Option<WaitStatus> {
        if FOREGROUND_PID.load(Ordering::SeqCst) == pid.get()
            && FOREGROUND_REAPED.load(Ordering::Acquire)
        {
            Some(WaitStatus::from_raw(FOREGROUND_STATUS.load(Ordering::SeqCst)))
        } else {
            None
        }
    }

    fn release_foreground(&self) {
        FOREGROUND_PID.store(0, Ordering::SeqCst);
        FOREGROUND_REAPED.store(false, Ordering::SeqCst);
    }
}

// Runs in signal context: only raw syscalls, atomics and stack buffers from here on.
extern "C" fn reap_children(_signal: SignalNumber) {
    let saved_errno = errno();
    let flags = WaitOptions::new().no_hang().flags();

    loop {
        let mut status = 0;
        // SAFETY: `waitpid` is async-signal-safe and `status` is a valid pointer.
        let pid = unsafe { libc::waitpid(-1, &mut status, flags) };
        // 0: nothing else has terminated, -1: no children left
        if pid <= 0 {
            break;
        }

        if pid == FOREGROUND_PID.load(Ordering::SeqCst) {
            // the foreground supervisor reports this one
            FOREGROUND_STATUS.store(status, Ordering::SeqCst);
            FOREGROUND_REAPED.store(true, Ordering::Release);
            continue;
        }

        report_background(pid, WaitStatus::from_raw(status));
    }

    set_errno(saved_errno);
}

fn report_background(pid: libc::pid_t, status: WaitStatus) {
    let mut line = SignalSafeWriter::<128>::new();
    line.push_bytes(b"background process ")
        .push_decimal(pid.into());

    match status.outcome() {
        ProcessOutcome::ExitedNormally(code) => {
            line.push_bytes(b" exited with code ").push_decimal(code.into())
        }
        ProcessOutcome::KilledBySignal(signal) => line
            .push_bytes(b" terminated by signal ")
            .push_decimal(signal.into()),
        ProcessOutcome::Other(raw) => line
            .push_bytes(b" finished (status ")
            .push_decimal(raw.into())
            .push_bytes(b")"),
    };
    line.push_bytes(b"\n");

    line.flush_to(REPORT_FD.load(Ordering::SeqCst));
}

#[cfg(test)]
mod tests {
    use std::{
        collections::BTreeSet,
        io::{self, Read},
        os::{fd::AsRawFd, unix::net::UnixStream},
        thread::sleep,
        time::Duration,
    };

    use pretty_assertions::assert_eq;

    use super::SigchldReaper;
    use crate::{
        cutils::{errno, set_errno},
        reap::Reaper,
        system::{
            _exit, fork,
            interface::ProcessId,
            run_isolated,
            signal::{consts::SIGCHLD, SignalSet},
            wait::{Wait, WaitOptions},
            ForkResult,
        },
    };

    fn read_lines(rx: &mut UnixStream, count: usize) -> io::Result<Vec<String>> {
        let mut out = String::new();
        let mut buf = [0; 256];
        while out.matches('\n').count() < count {
            let n = rx.read(&mut buf)?;
            if n == 0 {
                break;
            }
            out.push_str(std::str::from_utf8(&buf[..n]).unwrap());
        }
        Ok(out.lines().map(str::to_owned).collect())
    }

    #[test]
    fn reports_every_background_child_once() {
        let status = run_isolated(|| {
            let (mut rx, tx) = UnixStream::pair()?;
            let _reaper = SigchldReaper::install_reporting_to(tx.as_raw_fd())?;

            let mut expected = BTreeSet::new();
            for delay in [200, 0, 100] {
                let ForkResult::Parent(pid) = fork()? else {
                    sleep(Duration::from_millis(delay));
                    _exit(3);
                };
                expected.insert(format!("background process {pid} exited with code 3"));
            }

            let lines = read_lines(&mut rx, 3)?;
            assert_eq!(lines.len(), 3);
            let reported: BTreeSet<String> = lines.into_iter().collect();
            assert_eq!(reported, expected);

            // everything was reaped by the handler
            assert!(ProcessId::ANY
                .wait(WaitOptions::new().no_hang())
                .unwrap_err()
                .is_no_child());
            Ok(())
        });
        assert_eq!(status.exit_status(), Some(0));
    }

    #[test]
    fn foreground_child_is_stashed_not_reported() {
        let status = run_isolated(|| {
            let (mut rx, tx) = UnixStream::pair()?;
            let reaper = SigchldReaper::install_reporting_to(tx.as_raw_fd())?;

            let guard = SignalSet::only(SIGCHLD)?.block_scoped()?;
            let ForkResult::Parent(pid) = fork()? else {
                _exit(5);
            };
            reaper.track_foreground(pid);
            guard.restore()?;

            // give the handler time to collect the child
            sleep(Duration::from_millis(300));

            let err = pid.wait(WaitOptions::new()).unwrap_err();
            assert!(err.is_no_child());
            let claimed = reaper.claim_foreground(pid).expect("handler stashed the status");
            assert_eq!(claimed.exit_status(), Some(5));

            reaper.release_foreground();
            assert!(reaper.claim_foreground(pid).is_none());

            rx.set_nonblocking(true)?;
            let mut buf = [0; 64];
            let nothing = rx.read(&mut buf).unwrap_err();
            assert_eq!(nothing.kind(), io::ErrorKind::WouldBlock);
            Ok(())
        });
        assert_eq!(status.exit_status(), Some(0));
    }

    #[test]
    fn handler_preserves_errno() {
        let status = run_isolated(|| {
            let (_rx, tx) = UnixStream::pair()?;
            let _reaper = SigchldReaper::install_reporting_to(tx.as_raw_fd())?;

            set_errno(libc::EDOM);
            // the handler runs before `raise` returns; its `waitpid` fails with ECHILD
            unsafe { libc::raise(SIGCHLD) };
            assert_eq!(errno(), libc::EDOM);
            Ok(())
        });
        assert_eq!(status.exit_status(), Some(0));
    }

    #[test]
    fn only_one_reaper_at_a_time() {
        let status = run_isolated(|| {
            let first = SigchldReaper::install()?;
            let second = std::panic::catch_unwind(|| SigchldReaper::install().map(drop));
            assert!(second.is_err());

            drop(first);
            let _third = SigchldReaper::install()?;
            Ok(())
        });
        assert_eq!(status.exit_status(), Some(0));
    }
}
