//! Built-in commands executed by the shell process itself.
//!
//! Builtins write through injected handles instead of touching the process
//! streams directly, so the same code runs in-process behind temporarily
//! redirected descriptors, inside a forked pipeline child, and against
//! in-memory buffers in tests. Argument handling is hand-rolled: a shell
//! builtin must pass arbitrary `-`-prefixed words through verbatim.

use crate::env::{self, ShellState};
use crate::SHELL_NAME;
use std::io::Write;
use std::path::PathBuf;

/// Conventional process exit code: 0 for success, non-zero for failure.
pub type ExitCode = i32;

/// A command implemented inside the shell. `run` receives the arguments
/// after the command name and reports its exit status; diagnostics go to
/// `err`, regular output to `out`.
pub trait BuiltinCommand: Sync {
    /// Canonical name, e.g. "echo" or "cd".
    fn name(&self) -> &'static str;

    fn run(
        &self,
        args: &[String],
        shell: &mut ShellState,
        out: &mut dyn Write,
        err: &mut dyn Write,
    ) -> ExitCode;
}

static BUILTINS: [&(dyn BuiltinCommand); 7] =
    [&Echo, &Cd, &Pwd, &Export, &Unset, &EnvCmd, &Exit];

/// Find the builtin for an argument vector, matching argv[0] exactly.
///
/// `env` with arguments is deliberately not claimed: the executor then
/// falls through to the external `env`, which is the delegation the
/// builtin contract asks for.
pub fn lookup(argv: &[String]) -> Option<&'static dyn BuiltinCommand> {
    let name = argv.first()?;
    if name == "env" && argv.len() > 1 {
        return None;
    }
    BUILTINS.iter().copied().find(|b| b.name() == name)
}

/// `echo`: join the arguments with single spaces. One or more leading `-n`
/// flags (in any combination, `-n -nn ...`) suppress the trailing newline.
/// Everything else, including words starting with `-`, prints verbatim.
pub struct Echo;

fn is_n_flag(arg: &str) -> bool {
    arg.len() >= 2 && arg.starts_with('-') && arg[1..].chars().all(|c| c == 'n')
}

impl BuiltinCommand for Echo {
    fn name(&self) -> &'static str {
        "echo"
    }

    fn run(
        &self,
        args: &[String],
        _shell: &mut ShellState,
        out: &mut dyn Write,
        _err: &mut dyn Write,
    ) -> ExitCode {
        let mut newline = true;
        let mut start = 0;
        while start < args.len() && is_n_flag(&args[start]) {
            newline = false;
            start += 1;
        }
        let joined = args[start..].join(" ");
        let _ = if newline {
            writeln!(out, "{joined}")
        } else {
            write!(out, "{joined}")
        };
        0
    }
}

/// `cd`: change the working directory. No argument means `$HOME`. On
/// success `OLDPWD` and `PWD` are updated alongside the tracked directory.
pub struct Cd;

impl BuiltinCommand for Cd {
    fn name(&self) -> &'static str {
        "cd"
    }

    fn run(
        &self,
        args: &[String],
        shell: &mut ShellState,
        _out: &mut dyn Write,
        err: &mut dyn Write,
    ) -> ExitCode {
        if args.len() > 1 {
            let _ = writeln!(err, "{SHELL_NAME}: cd: too many arguments");
            return 1;
        }

        let target = match args.first() {
            Some(arg) => PathBuf::from(arg),
            None => match shell.env.get("HOME") {
                Some(home) => PathBuf::from(home),
                None => {
                    let _ = writeln!(err, "{SHELL_NAME}: cd: HOME not set");
                    return 1;
                }
            },
        };

        let destination = if target.is_absolute() {
            target.clone()
        } else {
            shell.cwd.join(&target)
        };

        let canonical = match std::fs::canonicalize(&destination) {
            Ok(path) => path,
            Err(e) => {
                let _ = writeln!(err, "{SHELL_NAME}: cd: {}: {e}", target.display());
                return 1;
            }
        };
        if let Err(e) = std::env::set_current_dir(&canonical) {
            let _ = writeln!(err, "{SHELL_NAME}: cd: {}: {e}", target.display());
            return 1;
        }

        let previous = shell
            .env
            .get("PWD")
            .map(str::to_owned)
            .unwrap_or_else(|| shell.cwd.to_string_lossy().into_owned());
        shell.env.set("OLDPWD", &previous);
        shell.env.set("PWD", &canonical.to_string_lossy());
        shell.cwd = canonical;
        0
    }
}

/// `pwd`: print the tracked working directory. Arguments are ignored.
pub struct Pwd;

impl BuiltinCommand for Pwd {
    fn name(&self) -> &'static str {
        "pwd"
    }

    fn run(
        &self,
        _args: &[String],
        shell: &mut ShellState,
        out: &mut dyn Write,
        _err: &mut dyn Write,
    ) -> ExitCode {
        let _ = writeln!(out, "{}", shell.cwd.display());
        0
    }
}

/// `export`: with no arguments, list every binding in insertion order. With
/// arguments, create or update bindings; a bare `NAME` creates a value-less
/// binding when absent. Invalid names are diagnosed individually and the
/// remaining arguments are still applied.
pub struct Export;

impl BuiltinCommand for Export {
    fn name(&self) -> &'static str {
        "export"
    }

    fn run(
        &self,
        args: &[String],
        shell: &mut ShellState,
        out: &mut dyn Write,
        err: &mut dyn Write,
    ) -> ExitCode {
        if args.is_empty() {
            for binding in shell.env.iter() {
                let _ = match &binding.value {
                    Some(value) => writeln!(out, "declare -x {}=\"{}\"", binding.name, value),
                    None => writeln!(out, "declare -x {}", binding.name),
                };
            }
            return 0;
        }

        let mut status = 0;
        for arg in args {
            match arg.split_once('=') {
                Some((name, value)) if env::is_valid_name(name) => {
                    shell.env.set(name, value);
                }
                None if env::is_valid_name(arg) => {
                    shell.env.ensure(arg);
                }
                _ => {
                    let _ = writeln!(
                        err,
                        "{SHELL_NAME}: export: `{arg}': not a valid identifier"
                    );
                    status = 1;
                }
            }
        }
        status
    }
}

/// `unset`: remove bindings. Absent names are ignored silently; invalid
/// names are diagnosed with status 1 while valid ones are still removed.
pub struct Unset;

impl BuiltinCommand for Unset {
    fn name(&self) -> &'static str {
        "unset"
    }

    fn run(
        &self,
        args: &[String],
        shell: &mut ShellState,
        _out: &mut dyn Write,
        err: &mut dyn Write,
    ) -> ExitCode {
        let mut status = 0;
        for arg in args {
            if env::is_valid_name(arg) {
                shell.env.unset(arg);
            } else {
                let _ = writeln!(err, "{SHELL_NAME}: unset: `{arg}': not a valid identifier");
                status = 1;
            }
        }
        status
    }
}

/// `env`: print `NAME=VALUE` lines for valued bindings in insertion order.
/// Invocations with arguments never reach this builtin (see [`lookup`]).
pub struct EnvCmd;

impl BuiltinCommand for EnvCmd {
    fn name(&self) -> &'static str {
        "env"
    }

    fn run(
        &self,
        _args: &[String],
        shell: &mut ShellState,
        out: &mut dyn Write,
        _err: &mut dyn Write,
    ) -> ExitCode {
        for binding in shell.env.iter() {
            if let Some(value) = &binding.value {
                let _ = writeln!(out, "{}={}", binding.name, value);
            }
        }
        0
    }
}

/// `exit`: leave the shell. No argument reuses the last status; one numeric
/// argument is taken modulo 256; a non-numeric argument is a fatal usage
/// error (status 2); extra arguments keep the shell alive with status 1.
pub struct Exit;

fn parse_exit_status(arg: &str) -> Option<i32> {
    arg.parse::<i64>().ok().map(|n| n.rem_euclid(256) as i32)
}

impl BuiltinCommand for Exit {
    fn name(&self) -> &'static str {
        "exit"
    }

    fn run(
        &self,
        args: &[String],
        shell: &mut ShellState,
        _out: &mut dyn Write,
        err: &mut dyn Write,
    ) -> ExitCode {
        if shell.interactive {
            let _ = writeln!(err, "exit");
        }

        match args {
            [] => {
                shell.pending_exit = Some(shell.last_status);
                shell.last_status
            }
            [arg] => match parse_exit_status(arg) {
                Some(code) => {
                    shell.pending_exit = Some(code);
                    code
                }
                None => {
                    let _ = writeln!(err, "{SHELL_NAME}: exit: {arg}: numeric argument required");
                    shell.pending_exit = Some(2);
                    2
                }
            },
            [first, ..] => {
                if parse_exit_status(first).is_none() {
                    let _ =
                        writeln!(err, "{SHELL_NAME}: exit: {first}: numeric argument required");
                    shell.pending_exit = Some(2);
                    2
                } else {
                    let _ = writeln!(err, "{SHELL_NAME}: exit: too many arguments");
                    1
                }
            }
        }
    }
}
