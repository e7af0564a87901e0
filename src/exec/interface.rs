use std::ffi::OsString;

/// What the launcher needs to know about a command.
pub(crate) trait RunOptions {
    /// The program name followed by its arguments. The program is looked up in `PATH`.
    fn arguments(&self) -> &[OsString];
    /// Run without waiting for the command, in its own process group.
    fn is_background(&self) -> bool;
}

#[cfg(test)]
pub(crate) struct TestOptions {
    pub(crate) arguments: Vec<OsString>,
    pub(crate) background: bool,
}

#[cfg(test)]
impl TestOptions {
    pub(crate) fn foreground(args: &[&str]) -> Self {
        Self {
            arguments: args.iter().map(OsString::from).collect(),
            background: false,
        }
    }

    pub(crate) fn background(args: &[&str]) -> Self {
        Self {
            background: true,
            ..Self::foreground(args)
        }
    }
}

#[cfg(test)]
impl RunOptions for TestOptions {
    fn arguments(&self) -> &[OsString] {
        &self.arguments
    }

    fn is_background(&self) -> bool {
        self.background
    }
}
