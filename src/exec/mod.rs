#![deny(unsafe_code)]

mod foreground;
mod interface;
pub(crate) mod io_util;

use std::{ffi::c_int, io, os::unix::ffi::OsStrExt};

use crate::{
    common::Error,
    log::{dev_info, dev_warn, user_error, user_warn},
    reap::Reaper,
    system::{
        _exit, fork,
        interface::ProcessId,
        setpgid,
        signal::{consts::*, MaskGuard, SignalHandler, SignalHandlerBehavior, SignalSet},
        ExecArgv, ForkResult,
    },
};

pub(crate) use foreground::{supervise, ForegroundReport, LaunchSnapshot};
pub(crate) use interface::RunOptions;
#[cfg(test)]
pub(crate) use interface::TestOptions;

/// Exit status of a child whose program could not be found.
pub(crate) const EXIT_NOT_FOUND: c_int = 127;
/// Exit status of a child whose program was found but could not be executed.
pub(crate) const EXIT_CANNOT_EXECUTE: c_int = 126;

/// Start the command described by `options` in a new child process.
///
/// `SIGCHLD` stays blocked from right before the fork until the parent has announced a background
/// child or told `reaper` about a foreground child, so the child's termination cannot be reported
/// before its pid is known.
pub(crate) fn spawn(options: &impl RunOptions, reaper: &dyn Reaper) -> Result<ProcessId, Error> {
    let arguments = options.arguments();
    let argv = ExecArgv::new(arguments).map_err(|_| {
        let arg = arguments
            .iter()
            .find(|arg| arg.as_bytes().contains(&0))
            .cloned()
            .unwrap_or_default();
        Error::ArgumentNul(arg)
    })?;

    let mask = SignalSet::only(SIGCHLD)
        .and_then(|set| set.block_scoped())
        .map_err(Error::Mask)?;

    let pid = match fork() {
        Ok(ForkResult::Child) => exec_child(mask, options.is_background(), &argv),
        Ok(ForkResult::Parent(pid)) => pid,
        Err(err) => {
            restore_parent_mask(mask);
            return Err(Error::Fork(err));
        }
    };

    // still masked: a fast background child cannot be reported before it was announced
    if options.is_background() {
        println_ignore_io_error!("background process {pid} started");
    } else {
        reaper.track_foreground(pid);
    }
    restore_parent_mask(mask);

    dev_info!(
        "started {} with pid {pid}",
        arguments
            .first()
            .map(|program| program.to_string_lossy())
            .unwrap_or_default()
    );

    Ok(pid)
}

fn restore_parent_mask(mask: MaskGuard) {
    if let Err(err) = mask.restore() {
        user_warn!("cannot restore signal mask: {err}");
    }
}

/// The child side of [`spawn`]. Never returns into the shell.
fn exec_child(mask: MaskGuard, background: bool, argv: &ExecArgv) -> ! {
    if let Err(err) = mask.restore() {
        user_error!("cannot restore signal mask in child: {err}");
        _exit(libc::EXIT_FAILURE);
    }

    if background {
        // leave the terminal's foreground group so an interrupt from the terminal does not reach us
        if let Err(err) = setpgid(ProcessId::new(0), ProcessId::new(0)) {
            dev_warn!("cannot create a process group: {err}");
        }
    }

    // the shell ignores SIGINT, the command should not
    match SignalHandler::register(SIGINT, SignalHandlerBehavior::Default) {
        Ok(handler) => handler.forget(),
        Err(err) => dev_warn!("cannot reset the SIGINT action: {err}"),
    }

    let err = argv.execvp();

    let program = argv
        .program()
        .map(|program| program.to_string_lossy())
        .unwrap_or_default();
    user_error!("{program}: {err}");

    _exit(exec_failure_status(&err))
}

fn exec_failure_status(err: &io::Error) -> c_int {
    if err.kind() == io::ErrorKind::NotFound {
        EXIT_NOT_FOUND
    } else {
        EXIT_CANNOT_EXECUTE
    }
}
