use std::{ffi::OsString, fmt, io, path::PathBuf};

#[derive(Debug)]
pub enum Error {
    /// The input line exceeds the maximum number of bytes.
    LineTooLong { max: usize },
    /// An argument contains an interior nul byte and cannot be passed to `exec`.
    ArgumentNul(OsString),
    HomeNotSet,
    ChangeDir { path: PathBuf, source: io::Error },
    /// Blocking or restoring the signal mask failed.
    Mask(io::Error),
    Fork(io::Error),
    Wait(io::Error),
    Io(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::LineTooLong { max } => write!(f, "input too long (max {max} characters)"),
            Error::ArgumentNul(arg) => write!(f, "argument contains a nul byte: {arg:?}"),
            Error::HomeNotSet => f.write_str("cd: HOME is not set"),
            Error::ChangeDir { path, source } => {
                write!(f, "cd: cannot change to '{}': {source}", path.display())
            }
            Error::Mask(e) => write!(f, "cannot update signal mask: {e}"),
            Error::Fork(e) => write!(f, "cannot fork: {e}"),
            Error::Wait(e) => write!(f, "cannot wait for child: {e}"),
            Error::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::ChangeDir { source, .. } => Some(source),
            Error::Mask(e) | Error::Fork(e) | Error::Wait(e) | Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::Error;
    use std::io;

    #[test]
    fn diagnostics_read_like_a_shell() {
        assert_eq!(
            Error::LineTooLong { max: 1022 }.to_string(),
            "input too long (max 1022 characters)"
        );
        assert_eq!(Error::HomeNotSet.to_string(), "cd: HOME is not set");

        let err = Error::ChangeDir {
            path: "/nonexistent".into(),
            source: io::Error::from_raw_os_error(libc::ENOENT),
        };
        assert!(err
            .to_string()
            .starts_with("cd: cannot change to '/nonexistent': "));

        let err: Error = io::Error::from_raw_os_error(libc::EAGAIN).into();
        assert!(matches!(err, Error::Io(_)));
    }
}
