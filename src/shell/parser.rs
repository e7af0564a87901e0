use std::{ffi::OsString, os::unix::ffi::OsStringExt};

use crate::{common::Error, exec::RunOptions, log::dev_warn};

use super::{
    config::ShellConfig,
    input::{is_blank, trim_blanks},
};

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Command {
    pub(crate) program: OsString,
    /// Starts with `program`.
    pub(crate) arguments: Vec<OsString>,
    pub(crate) is_background: bool,
}

impl RunOptions for Command {
    fn arguments(&self) -> &[OsString] {
        &self.arguments
    }

    fn is_background(&self) -> bool {
        self.is_background
    }
}

/// Turn a trimmed line into a [`Command`]. Bytes are passed on unchanged, whatever their encoding.
///
/// Returns `Ok(None)` if nothing is left to run, e.g. for an empty line or a lone `&`.
pub(crate) fn parse(line: &[u8], config: &ShellConfig) -> Result<Option<Command>, Error> {
    let max = config.max_line_len();
    if line.len() > max {
        return Err(Error::LineTooLong { max });
    }

    let mut line = trim_blanks(line);
    let mut is_background = false;
    if let Some(rest) = line.strip_suffix(b"&") {
        is_background = true;
        line = trim_blanks(rest);
    }

    let mut tokens = line.split(is_blank).filter(|token| !token.is_empty());
    let arguments: Vec<OsString> = tokens
        .by_ref()
        .take(config.max_tokens())
        .map(|token| OsString::from_vec(token.to_vec()))
        .collect();

    let dropped = tokens.count();
    if dropped > 0 {
        dev_warn!(
            "dropped {dropped} arguments beyond the limit of {}",
            config.max_tokens()
        );
    }

    Ok(arguments.first().cloned().map(|program| Command {
        program,
        arguments,
        is_background,
    }))
}
