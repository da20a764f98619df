//! Signal dispositions for the three execution contexts.
//!
//! The interactive shell must survive Ctrl-C and Ctrl-\ at the prompt, stay
//! alive while a foreground child takes the terminal signals, and hand
//! children the default dispositions before `execve`.

use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};

fn disposition(handler: SigHandler) -> SigAction {
    SigAction::new(handler, SaFlags::empty(), SigSet::empty())
}

/// Top-level dispositions for an interactive shell. SIGINT and SIGQUIT are
/// ignored: the line editor reads Ctrl-C itself in raw mode and reports it
/// as an interrupted read, and a stray SIGQUIT must not kill the shell.
pub fn init_interactive() {
    let ignore = disposition(SigHandler::SigIgn);
    unsafe {
        let _ = sigaction(Signal::SIGINT, &ignore);
        let _ = sigaction(Signal::SIGQUIT, &ignore);
    }
}

/// Restore default dispositions in a forked child before it executes or
/// runs a builtin, so the child dies on Ctrl-C like any foreground program.
pub fn reset_for_child() {
    let default = disposition(SigHandler::SigDfl);
    unsafe {
        let _ = sigaction(Signal::SIGINT, &default);
        let _ = sigaction(Signal::SIGQUIT, &default);
    }
}

/// Holds SIGINT and SIGQUIT at ignore while a foreground child runs and
/// restores whatever dispositions were in place when it drops.
pub struct ForegroundGuard {
    saved_int: Option<SigAction>,
    saved_quit: Option<SigAction>,
}

impl ForegroundGuard {
    pub fn install() -> Self {
        let ignore = disposition(SigHandler::SigIgn);
        unsafe {
            Self {
                saved_int: sigaction(Signal::SIGINT, &ignore).ok(),
                saved_quit: sigaction(Signal::SIGQUIT, &ignore).ok(),
            }
        }
    }
}

impl Drop for ForegroundGuard {
    fn drop(&mut self) {
        unsafe {
            if let Some(saved) = self.saved_int.take() {
                let _ = sigaction(Signal::SIGINT, &saved);
            }
            if let Some(saved) = self.saved_quit.take() {
                let _ = sigaction(Signal::SIGQUIT, &saved);
            }
        }
    }
}
