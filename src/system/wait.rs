use std::{fmt, io};

use libc::{c_int, WEXITSTATUS, WIFEXITED, WIFSIGNALED, WNOHANG, WTERMSIG};

use crate::cutils::cerr;
use crate::{system::interface::ProcessId, system::signal::SignalNumber};

mod sealed {
    pub(crate) trait Sealed {}

    impl Sealed for crate::system::interface::ProcessId {}
}

pub(crate) trait Wait: sealed::Sealed {
    /// Wait for a process to change state.
    ///
    /// Calling this function will block until a child specified by the given process ID has
    /// terminated, [`ProcessId::ANY`] matches every child. This can be configured further using
    /// [`WaitOptions`].
    fn wait(self, options: WaitOptions) -> Result<(ProcessId, WaitStatus), WaitError>;
}

impl Wait for ProcessId {
    fn wait(self, options: WaitOptions) -> Result<(ProcessId, WaitStatus), WaitError> {
        let mut status: c_int = 0;

        let pid = cerr(unsafe { libc::waitpid(self.get(), &mut status, options.flags) })
            .map_err(WaitError::Io)?;

        if pid == 0 && options.flags & WNOHANG != 0 {
            return Err(WaitError::NotReady);
        }

        Ok((ProcessId::new(pid), WaitStatus { status }))
    }
}

/// Error values returned when [`Wait::wait`] fails.
#[derive(Debug)]
pub enum WaitError {
    // No children were in a waitable state.
    //
    // This is only returned if the [`WaitOptions::no_hang`] option is used.
    NotReady,
    // Regular I/O error.
    Io(io::Error),
}

impl WaitError {
    /// Return `true` if the calling process has no children left to wait for.
    pub fn is_no_child(&self) -> bool {
        matches!(self, WaitError::Io(err) if err.raw_os_error() == Some(libc::ECHILD))
    }
}

/// Options to configure how [`Wait::wait`] waits for children.
pub struct WaitOptions {
    flags: c_int,
}

impl WaitOptions {
    /// Only wait for terminated children.
    pub const fn new() -> Self {
        Self { flags: 0 }
    }

    /// Return immediately if no child has exited.
    pub const fn no_hang(mut self) -> Self {
        self.flags |= WNOHANG;
        self
    }

    pub(crate) const fn flags(&self) -> c_int {
        self.flags
    }
}

/// The status of the waited child.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct WaitStatus {
    status: c_int,
}

impl fmt::Debug for WaitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.outcome() {
            ProcessOutcome::ExitedNormally(code) => write!(f, "ExitStatus({code})"),
            ProcessOutcome::KilledBySignal(signal) => write!(f, "TermSignal({signal})"),
            ProcessOutcome::Other(raw) => write!(f, "Unknown({raw})"),
        }
    }
}

impl WaitStatus {
    pub const fn from_raw(status: c_int) -> Self {
        Self { status }
    }

    /// Return `true` if the child terminated normally, i.e., by calling `exit`.
    pub const fn did_exit(&self) -> bool {
        WIFEXITED(self.status)
    }

    /// Return the exit status of the child if the child terminated normally.
    pub const fn exit_status(&self) -> Option<c_int> {
        if self.did_exit() {
            Some(WEXITSTATUS(self.status))
        } else {
            None
        }
    }

    /// Return `true` if the child process was terminated by a signal.
    pub const fn was_signaled(&self) -> bool {
        WIFSIGNALED(self.status)
    }

    /// Return the signal number which caused the child to terminate if the child was terminated by
    /// a signal.
    pub const fn term_signal(&self) -> Option<SignalNumber> {
        if self.was_signaled() {
            Some(WTERMSIG(self.status))
        } else {
            None
        }
    }

    /// Decode the status. Only does arithmetic on the status word, so it is safe to call from a
    /// signal handler.
    pub const fn outcome(&self) -> ProcessOutcome {
        if self.did_exit() {
            ProcessOutcome::ExitedNormally(WEXITSTATUS(self.status))
        } else if self.was_signaled() {
            ProcessOutcome::KilledBySignal(WTERMSIG(self.status))
        } else {
            ProcessOutcome::Other(self.status)
        }
    }
}

/// How a child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    ExitedNormally(c_int),
    KilledBySignal(SignalNumber),
    Other(c_int),
}

impl fmt::Display for ProcessOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessOutcome::ExitedNormally(code) => write!(f, "exited with code {code}"),
            ProcessOutcome::KilledBySignal(signal) => write!(f, "terminated by signal {signal}"),
            ProcessOutcome::Other(raw) => write!(f, "finished (status {raw})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use libc::SIGKILL;

    use crate::system::{
        interface::ProcessId,
        kill,
        wait::{ProcessOutcome, Wait, WaitError, WaitOptions, WaitStatus},
    };

    #[test]
    fn exit_status() {
        let command = std::process::Command::new("sh")
            .args(["-c", "sleep 0.1; exit 42"])
            .spawn()
            .unwrap();

        let command_pid = ProcessId::new(command.id() as i32);

        let (pid, status) = command_pid.wait(WaitOptions::new()).unwrap();
        assert_eq!(command_pid, pid);
        assert!(status.did_exit());
        assert_eq!(status.exit_status(), Some(42));
        assert_eq!(status.outcome(), ProcessOutcome::ExitedNormally(42));

        assert!(!status.was_signaled());
        assert!(status.term_signal().is_none());

        // Waiting when there are no children should fail.
        let err = command_pid.wait(WaitOptions::new()).unwrap_err();
        assert!(err.is_no_child());
    }

    #[test]
    fn signals() {
        let command = std::process::Command::new("sh")
            .args(["-c", "sleep 1; exit 42"])
            .spawn()
            .unwrap();

        let command_pid = ProcessId::new(command.id() as i32);

        kill(command_pid, SIGKILL).unwrap();

        let (pid, status) = command_pid.wait(WaitOptions::new()).unwrap();
        assert_eq!(command_pid, pid);
        assert!(status.was_signaled());
        assert_eq!(status.term_signal(), Some(SIGKILL));
        assert_eq!(status.outcome(), ProcessOutcome::KilledBySignal(SIGKILL));

        assert!(!status.did_exit());
        assert!(status.exit_status().is_none());
    }

    #[test]
    fn no_hang() {
        let command = std::process::Command::new("sh")
            .args(["-c", "sleep 0.1; exit 42"])
            .spawn()
            .unwrap();

        let command_pid = ProcessId::new(command.id() as i32);

        let mut count = 0;
        let (pid, status) = loop {
            match command_pid.wait(WaitOptions::new().no_hang()) {
                Ok(ok) => break ok,
                Err(WaitError::NotReady) => count += 1,
                Err(WaitError::Io(err)) => panic!("{err}"),
            }
        };

        assert_eq!(command_pid, pid);
        assert_eq!(status.exit_status(), Some(42));
        assert!(count > 0);
    }

    #[test]
    fn outcome_display() {
        assert_eq!(
            ProcessOutcome::ExitedNormally(3).to_string(),
            "exited with code 3"
        );
        assert_eq!(
            ProcessOutcome::KilledBySignal(9).to_string(),
            "terminated by signal 9"
        );
        assert_eq!(
            ProcessOutcome::Other(0x137f).to_string(),
            "finished (status 4991)"
        );
        // a stopped child is neither exited nor signaled
        assert_eq!(
            WaitStatus::from_raw(0x137f).outcome(),
            ProcessOutcome::Other(0x137f)
        );
    }
}
