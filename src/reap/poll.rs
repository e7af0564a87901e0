use crate::log::user_warn;

use super::{reap_terminated, Reaper};

/// Reaps background children right before each prompt.
///
/// A child that ends while the shell waits for input is only reported once the next prompt is
/// about to be displayed.
pub(crate) struct PollingReaper {
    _private: (),
}

impl PollingReaper {
    pub(crate) fn new() -> Self {
        Self { _private: () }
    }
}

impl Reaper for PollingReaper {
    fn before_prompt(&mut self) {
        let reaped = reap_terminated(|pid, status| {
            println_ignore_io_error!("background process {pid} {}", status.outcome())
        });

        if let Err(err) = reaped {
            user_warn!("cannot reap background processes: {err}");
        }
    }
}
