use std::{
    ffi::{CStr, CString, NulError, OsStr},
    io,
    os::unix::ffi::OsStrExt,
};

use crate::cutils::*;
use interface::ProcessId;

// generalized traits for when we want to hide implementations
pub mod interface;

pub mod resource;

pub mod signal;

pub mod time;

pub mod wait;

pub(crate) fn _exit(status: libc::c_int) -> ! {
    unsafe { libc::_exit(status) }
}

pub(crate) enum ForkResult {
    // Parent process branch with the child process' PID.
    Parent(ProcessId),
    // Child process branch.
    Child,
}

unsafe fn inner_fork() -> io::Result<ForkResult> {
    let pid = cerr(unsafe { libc::fork() })?;
    if pid == 0 {
        Ok(ForkResult::Child)
    } else {
        Ok(ForkResult::Parent(ProcessId::new(pid)))
    }
}

/// Create a new process.
pub(crate) fn fork() -> io::Result<ForkResult> {
    // SAFETY: `fork` is implemented using `clone` in linux so we don't need to worry about signal
    // safety.
    unsafe { inner_fork() }
}

/// An argument vector in the shape `execvp` expects: C strings followed by a null pointer.
///
/// It is built before forking, so the child only has to make the syscall.
pub(crate) struct ExecArgv {
    strings: Vec<CString>,
    pointers: Vec<*const libc::c_char>,
}

impl ExecArgv {
    pub(crate) fn new<S: AsRef<OsStr>>(args: &[S]) -> Result<Self, NulError> {
        let strings = args
            .iter()
            .map(|arg| CString::new(arg.as_ref().as_bytes()))
            .collect::<Result<Vec<_>, _>>()?;

        let pointers = strings
            .iter()
            .map(|arg| arg.as_ptr())
            .chain(std::iter::once(std::ptr::null()))
            .collect();

        Ok(Self { strings, pointers })
    }

    pub(crate) fn program(&self) -> Option<&CStr> {
        self.strings.first().map(|s| s.as_c_str())
    }

    /// Replace the current process image, looking the program up in `PATH`.
    ///
    /// This only returns if `execvp` failed.
    pub(crate) fn execvp(&self) -> io::Error {
        let Some(program) = self.program() else {
            return io::ErrorKind::NotFound.into();
        };

        // SAFETY: `pointers` holds pointers into `strings`, which outlive this call, and ends with
        // a null pointer.
        unsafe { libc::execvp(program.as_ptr(), self.pointers.as_ptr()) };

        io::Error::last_os_error()
    }
}

#[cfg(test)]
/// Send a signal to a process with the specified ID.
pub fn kill(pid: ProcessId, signal: signal::SignalNumber) -> io::Result<()> {
    // SAFETY: This function cannot cause UB even if `pid` is not a valid process ID or if
    // `signal` is not a valid signal code.
    cerr(unsafe { libc::kill(pid.get(), signal) }).map(|_| ())
}

#[cfg(test)]
/// Get the process group ID of the current process.
pub fn getpgrp() -> ProcessId {
    ProcessId::new(unsafe { libc::getpgrp() })
}

#[cfg(test)]
/// Get a process group ID.
pub fn getpgid(pid: ProcessId) -> io::Result<ProcessId> {
    // SAFETY: This function cannot cause UB even if `pid` is not a valid process ID
    cerr(unsafe { libc::getpgid(pid.get()) }).map(ProcessId::new)
}

/// Set a process group ID. `ProcessId::new(0)` refers to the calling process in both positions.
pub fn setpgid(pid: ProcessId, pgid: ProcessId) -> io::Result<()> {
    cerr(unsafe { libc::setpgid(pid.get(), pgid.get()) }).map(|_| ())
}

pub fn make_zeroed_sigaction() -> libc::sigaction {
    // SAFETY: since sigaction is a C struct, all-zeroes is a valid representation
    // We cannot use a "literal struct" initialization method since the exact representation
    // of libc::sigaction is not fixed.
    unsafe { std::mem::zeroed() }
}

/// Cap the number of processes the calling user may own, so that `fork` fails once it is reached.
///
/// Privileged users are exempt from this limit.
#[cfg(test)]
pub(crate) fn limit_processes(max: libc::rlim_t) -> io::Result<()> {
    let limit = libc::rlimit {
        rlim_cur: max,
        rlim_max: max,
    };
    // SAFETY: `limit` is a valid `rlimit` struct.
    cerr(unsafe { libc::setrlimit(libc::RLIMIT_NPROC, &limit) }).map(|_| ())
}

/// Run `f` in a forked child and return how the child ended.
///
/// Tests that reap arbitrary children or change process-wide signal state use this so they do not
/// disturb the other tests running in parallel threads.
#[cfg(test)]
pub(crate) fn run_isolated(f: impl FnOnce() -> io::Result<()>) -> wait::WaitStatus {
    use wait::{Wait, WaitError, WaitOptions};

    match fork().unwrap() {
        ForkResult::Child => {
            let code = match std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)) {
                Ok(Ok(())) => 0,
                Ok(Err(_)) => 2,
                Err(_) => 101,
            };
            _exit(code)
        }
        ForkResult::Parent(pid) => loop {
            match pid.wait(WaitOptions::new()) {
                Ok((_, status)) => break status,
                Err(WaitError::Io(err)) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => panic!("cannot wait for isolated test process: {err:?}"),
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use std::{
        ffi::OsStr,
        io::{Read, Write},
        os::unix::{ffi::OsStrExt, net::UnixStream},
        process::exit,
    };

    use libc::SIGKILL;

    use super::{
        fork, getpgid, getpgrp,
        interface::ProcessId,
        setpgid,
        wait::{Wait, WaitOptions},
        ExecArgv, ForkResult,
    };

    #[test]
    fn pgid_test() {
        let pgrp = getpgrp();
        assert_eq!(getpgid(ProcessId::new(0)).unwrap(), pgrp);
        assert_eq!(
            getpgid(ProcessId::new(std::process::id() as i32)).unwrap(),
            pgrp
        );

        match super::fork().unwrap() {
            ForkResult::Child => {
                // wait for the parent.
                std::thread::sleep(std::time::Duration::from_secs(1));
                super::_exit(0)
            }
            ForkResult::Parent(child_pid) => {
                // The child should be in our process group.
                assert_eq!(
                    getpgid(child_pid).unwrap(),
                    getpgid(ProcessId::new(0)).unwrap()
                );
                // Move the child to its own process group
                setpgid(child_pid, child_pid).unwrap();
                // The process group of the child should have changed.
                assert_eq!(getpgid(child_pid).unwrap(), child_pid);
                child_pid.wait(WaitOptions::new()).unwrap();
            }
        }
    }

    #[test]
    fn kill_test() {
        let mut child = std::process::Command::new("/bin/sleep")
            .arg("1")
            .spawn()
            .unwrap();
        super::kill(ProcessId::new(child.id() as i32), SIGKILL).unwrap();
        assert!(!child.wait().unwrap().success());
    }

    #[test]
    fn exec_argv_is_null_terminated() {
        let argv = ExecArgv::new(&["echo", "hello"]).unwrap();
        assert_eq!(argv.program().unwrap().to_str().unwrap(), "echo");
        assert_eq!(argv.pointers.len(), 3);
        assert!(argv.pointers[2].is_null());

        assert!(ExecArgv::new(&["echo", "nul\0byte"]).is_err());
    }

    #[test]
    fn exec_argv_keeps_arbitrary_bytes() {
        let arg = OsStr::from_bytes(b"caf\xe9 \xff");
        let argv = ExecArgv::new(&[OsStr::new("printf"), arg]).unwrap();
        assert_eq!(argv.strings[1].as_bytes(), b"caf\xe9 \xff");
    }

    #[test]
    fn execvp_searches_path() {
        let (mut rx, mut tx) = UnixStream::pair().unwrap();
        let argv = ExecArgv::new(&["sh", "-c", "exit 7"]).unwrap();

        let ForkResult::Parent(pid) = fork().unwrap() else {
            drop(rx);
            let err = argv.execvp();
            tx.write_all(err.to_string().as_bytes()).ok();
            exit(1);
        };
        drop(tx);

        let (_, status) = pid.wait(WaitOptions::new()).unwrap();
        assert_eq!(status.exit_status(), Some(7));

        let mut err = String::new();
        rx.read_to_string(&mut err).unwrap();
        assert!(err.is_empty());
    }

    #[test]
    fn execvp_reports_missing_program() {
        let argv = ExecArgv::new(&["definitely-not-a-real-program-mini-shell"]).unwrap();
        // execvp only returns on failure, so calling it in the test process is fine here
        let err = argv.execvp();
        assert_eq!(err.raw_os_error(), Some(libc::ENOENT));
    }
}
