//! The read-eval loop.

use std::{
    io::{self, BufRead},
    process,
};

use crate::{
    common::Error,
    exec::{spawn, supervise, LaunchSnapshot},
    log::{dev_info, user_error, user_warn, ShellLogger},
    reap::Reaper,
    system::signal::{consts::SIGINT, SignalHandler, SignalHandlerBehavior},
};

use self::{
    builtin::{change_dir, reap_before_exit, Builtin},
    config::ShellConfig,
    input::read_line,
    parser::{parse, Command},
};

mod builtin;
mod config;
mod input;
mod parser;

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Exit,
}

struct Shell {
    config: ShellConfig,
    reaper: Box<dyn Reaper>,
    // keeps the interrupt from aborting the shell while it waits for a foreground command
    _ignore_sigint: SignalHandler,
}

impl Shell {
    fn new(config: ShellConfig) -> Result<Self, Error> {
        let ignore_sigint = SignalHandler::register(SIGINT, SignalHandlerBehavior::Ignore)?;
        let reaper = config.reap_strategy.install()?;
        dev_info!("reaping background processes with {:?}", config.reap_strategy);

        Ok(Self {
            config,
            reaper,
            _ignore_sigint: ignore_sigint,
        })
    }

    /// Prompt for and run commands until `exit` or the end of `input`.
    fn run(&mut self, input: &mut impl BufRead) {
        loop {
            self.reaper.before_prompt();
            print_flush_ignore_io_error!("{}", self.config.prompt);

            let line = match read_line(input, self.config.max_line) {
                Ok(Some(line)) => line,
                Ok(None) => {
                    println_ignore_io_error!();
                    return;
                }
                Err(err) => {
                    user_error!("cannot read input: {err}");
                    continue;
                }
            };

            match self.eval(&line) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Exit) => return,
                Err(err) => user_error!("{err}"),
            }
        }
    }

    fn eval(&mut self, line: &[u8]) -> Result<Flow, Error> {
        let Some(command) = parse(line, &self.config)? else {
            return Ok(Flow::Continue);
        };

        match Builtin::recognize(&command) {
            Some(Builtin::Exit) => {
                reap_before_exit();
                Ok(Flow::Exit)
            }
            Some(Builtin::Cd(target)) => {
                change_dir(target, self.config.home.as_deref())?;
                Ok(Flow::Continue)
            }
            None => {
                self.launch(&command)?;
                Ok(Flow::Continue)
            }
        }
    }

    fn launch(&mut self, command: &Command) -> Result<(), Error> {
        if command.is_background {
            spawn(command, self.reaper.as_ref())?;
            return Ok(());
        }

        let before = match LaunchSnapshot::take() {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                user_warn!("cannot measure process times: {err}");
                None
            }
        };

        let pid = spawn(command, self.reaper.as_ref())?;
        let report = supervise(pid, before, self.reaper.as_ref())?;
        println_ignore_io_error!("{report}");

        Ok(())
    }
}

pub fn main() {
    ShellLogger::new("mini-shell: ").into_global_logger();

    dev_info!("development logs are enabled");

    let mut shell = match Shell::new(ShellConfig::from_env()) {
        Ok(shell) => shell,
        Err(err) => {
            user_error!("{err}");
            process::exit(1);
        }
    };

    shell.run(&mut io::stdin().lock());

    process::exit(0)
}
