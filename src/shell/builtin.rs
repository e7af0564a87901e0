use std::{env, ffi::OsStr, path::Path};

use crate::{common::Error, log::user_error, log::user_warn, reap::reap_terminated};

use super::parser::Command;

/// Commands the shell handles itself, without forking.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Builtin<'a> {
    Exit,
    /// `cd` with its first argument, if any. Further arguments are ignored.
    Cd(Option<&'a OsStr>),
}

impl<'a> Builtin<'a> {
    pub(crate) fn recognize(command: &'a Command) -> Option<Self> {
        match command.program.to_str() {
            Some("exit") => Some(Builtin::Exit),
            Some("cd") => Some(Builtin::Cd(
                command.arguments.get(1).map(|target| target.as_os_str()),
            )),
            _ => None,
        }
    }
}

/// Change the working directory to `target`, or to `home` if no target is given.
///
/// If `target` cannot be entered, the failure is reported and `home` is tried instead.
pub(crate) fn change_dir(target: Option<&OsStr>, home: Option<&Path>) -> Result<(), Error> {
    if let Some(target) = target {
        match enter(Path::new(target)) {
            Ok(()) => return Ok(()),
            Err(err) => user_error!("{err}"),
        }
    }

    enter(home.ok_or(Error::HomeNotSet)?)
}

fn enter(path: &Path) -> Result<(), Error> {
    env::set_current_dir(path).map_err(|source| Error::ChangeDir {
        path: path.to_owned(),
        source,
    })
}

/// Collect the children that already terminated before the shell exits.
///
/// Children that are still running are left behind.
pub(crate) fn reap_before_exit() {
    let reaped = reap_terminated(|pid, status| {
        println_ignore_io_error!("reaped child {pid} ({})", status.outcome())
    });

    if let Err(err) = reaped {
        user_warn!("cannot reap child processes: {err}");
    }
}
