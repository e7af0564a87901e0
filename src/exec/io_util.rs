use std::io;

/// Return `true` if the IO error is an interruption.
pub(crate) fn was_interrupted(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::Interrupted
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::was_interrupted;

    #[test]
    fn interruptions() {
        assert!(was_interrupted(&io::Error::from_raw_os_error(libc::EINTR)));
        // retrying a non-blocking descriptor would spin
        assert!(!was_interrupted(&io::Error::from_raw_os_error(libc::EAGAIN)));
        assert!(!was_interrupted(&io::Error::from_raw_os_error(libc::ECHILD)));
    }
}
