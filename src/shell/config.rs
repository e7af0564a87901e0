use std::{env, path::PathBuf};

use crate::reap::ReapStrategy;

pub(crate) const PROMPT: &str = "mini-shell$ ";
/// Size of the line buffer, including room for the newline and a terminator.
pub(crate) const MAX_LINE: usize = 1024;
/// Size of the argument vector, including the terminating null pointer.
pub(crate) const MAX_ARGS: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ShellConfig {
    pub(crate) prompt: &'static str,
    pub(crate) max_line: usize,
    pub(crate) max_args: usize,
    pub(crate) reap_strategy: ReapStrategy,
    /// Target of `cd` without arguments and fallback of a failing `cd`.
    pub(crate) home: Option<PathBuf>,
}

impl ShellConfig {
    pub(crate) fn from_env() -> Self {
        Self {
            home: env::var_os("HOME")
                .filter(|home| !home.is_empty())
                .map(PathBuf::from),
            ..Default::default()
        }
    }

    /// Longest accepted line, in bytes, once the newline has been removed.
    pub(crate) fn max_line_len(&self) -> usize {
        self.max_line.saturating_sub(2)
    }

    /// Most tokens kept from one line.
    pub(crate) fn max_tokens(&self) -> usize {
        self.max_args.saturating_sub(1)
    }
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            prompt: PROMPT,
            max_line: MAX_LINE,
            max_args: MAX_ARGS,
            reap_strategy: ReapStrategy::default(),
            home: None,
        }
    }
}
