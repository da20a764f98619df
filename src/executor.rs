//! Execution: walks the expanded tree and turns it into processes.
//!
//! AND/OR nodes short-circuit on the left status. A pipeline spine is first
//! flattened into an ordered command list so every pipe descriptor is
//! created, duplicated, and closed from one place. Builtins run in the
//! shell process only when they stand alone; inside a pipeline they run in
//! the forked child so their state changes cannot leak back.

use crate::builtin::{self, BuiltinCommand};
use crate::env::ShellState;
use crate::external;
use crate::parser::{AstNode, Command, RedirKind, Redirect};
use crate::signal;
use crate::SHELL_NAME;
use nix::errno::Errno;
use nix::sys::wait::{waitpid, WaitStatus};
use nix::sys::signal::Signal;
use nix::unistd::{dup2, execve, fork, pipe, ForkResult, Pid};
use std::ffi::CString;
use std::fs::OpenOptions;
use std::io::Write;
use std::os::fd::{AsFd, AsRawFd, OwnedFd};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::OpenOptionsExt;

/// Execute the tree and return the final exit status (0-255).
pub fn execute(node: &mut AstNode, shell: &mut ShellState) -> i32 {
    match node {
        AstNode::AndIf(left, right) => {
            let status = execute(left, shell);
            if status == 0 && shell.pending_exit.is_none() {
                execute(right, shell)
            } else {
                status
            }
        }
        AstNode::OrIf(left, right) => {
            let status = execute(left, shell);
            if status != 0 && shell.pending_exit.is_none() {
                execute(right, shell)
            } else {
                status
            }
        }
        AstNode::Pipe(_, _) => run_pipeline(node, shell),
        AstNode::Command(cmd) => run_command(cmd, shell),
    }
}

/// Collect the commands of a left-leaning pipe spine in execution order.
fn flatten_pipeline<'a>(node: &'a mut AstNode, commands: &mut Vec<&'a mut Command>) {
    match node {
        AstNode::Pipe(left, right) => {
            flatten_pipeline(left, commands);
            flatten_pipeline(right, commands);
        }
        AstNode::Command(cmd) => commands.push(cmd),
        _ => unreachable!("the grammar admits only commands below a pipe"),
    }
}

fn run_pipeline(node: &mut AstNode, shell: &mut ShellState) -> i32 {
    let mut commands: Vec<&mut Command> = Vec::new();
    flatten_pipeline(node, &mut commands);
    let count = commands.len();
    tracing::debug!(count, "launching pipeline");

    let mut pipes: Vec<(OwnedFd, OwnedFd)> = Vec::with_capacity(count - 1);
    for _ in 0..count - 1 {
        match pipe() {
            Ok(pair) => pipes.push(pair),
            Err(errno) => {
                eprintln!("{SHELL_NAME}: pipe: {errno}");
                return 1;
            }
        }
    }

    let _guard = signal::ForegroundGuard::install();
    let mut children: Vec<Pid> = Vec::with_capacity(count);
    for i in 0..count {
        match unsafe { fork() } {
            Ok(ForkResult::Child) => {
                signal::reset_for_child();

                // wire this child's ends, then close every pipe descriptor
                // and every inherited heredoc that is not its own
                let stdin_ok = match i {
                    0 => true,
                    _ => dup2(pipes[i - 1].0.as_raw_fd(), libc::STDIN_FILENO).is_ok(),
                };
                let stdout_ok = if i + 1 < count {
                    dup2(pipes[i].1.as_raw_fd(), libc::STDOUT_FILENO).is_ok()
                } else {
                    true
                };
                pipes.clear();
                let heredoc = commands[i].heredoc.take();
                for command in commands.iter_mut() {
                    command.heredoc = None;
                }
                if !stdin_ok || !stdout_ok {
                    eprintln!("{SHELL_NAME}: dup2: cannot set up pipeline");
                    exit_child(1);
                }

                run_pipeline_child(&*commands[i], heredoc, shell);
            }
            Ok(ForkResult::Parent { child }) => children.push(child),
            Err(errno) => {
                eprintln!("{SHELL_NAME}: fork: {errno}");
                break;
            }
        }
    }

    // the parent needs none of the descriptors once every child is launched
    drop(pipes);
    for command in commands.iter_mut() {
        command.heredoc = None;
    }

    let mut status = 1;
    for pid in children {
        status = wait_for(pid);
    }
    status
}

/// Runs in the forked pipeline member. Builtins execute here, in the child,
/// so `cd /tmp | cat` cannot move the parent shell.
fn run_pipeline_child(cmd: &Command, heredoc: Option<OwnedFd>, shell: &mut ShellState) -> ! {
    if let Err(status) = apply_redirections(&cmd.redirects, heredoc) {
        exit_child(status);
    }
    if cmd.argv.is_empty() {
        exit_child(0);
    }
    if let Some(builtin) = builtin::lookup(&cmd.argv) {
        let status = run_builtin_on_stdio(builtin, &cmd.argv, shell);
        exit_child(status);
    }
    exec_external(&cmd.argv, shell)
}

fn run_command(cmd: &mut Command, shell: &mut ShellState) -> i32 {
    if cmd.argv.is_empty() {
        if cmd.redirects.is_empty() {
            return 0;
        }
        return run_redirections_only(cmd);
    }
    if let Some(builtin) = builtin::lookup(&cmd.argv) {
        tracing::debug!(name = %cmd.argv[0], "running builtin in the shell process");
        return run_builtin_in_parent(builtin, cmd, shell);
    }
    run_external_command(cmd, shell)
}

/// An empty command that still has redirections opens and closes them in a
/// forked child: `> file` creates the file without running anything.
fn run_redirections_only(cmd: &mut Command) -> i32 {
    let _guard = signal::ForegroundGuard::install();
    match unsafe { fork() } {
        Ok(ForkResult::Child) => {
            signal::reset_for_child();
            let heredoc = cmd.heredoc.take();
            match apply_redirections(&cmd.redirects, heredoc) {
                Ok(()) => exit_child(0),
                Err(_) => exit_child(1),
            }
        }
        Ok(ForkResult::Parent { child }) => {
            cmd.heredoc = None;
            wait_for(child)
        }
        Err(errno) => {
            eprintln!("{SHELL_NAME}: fork: {errno}");
            1
        }
    }
}

fn run_external_command(cmd: &mut Command, shell: &mut ShellState) -> i32 {
    let _guard = signal::ForegroundGuard::install();
    match unsafe { fork() } {
        Ok(ForkResult::Child) => {
            signal::reset_for_child();
            let heredoc = cmd.heredoc.take();
            if let Err(status) = apply_redirections(&cmd.redirects, heredoc) {
                exit_child(status);
            }
            exec_external(&cmd.argv, shell)
        }
        Ok(ForkResult::Parent { child }) => {
            tracing::debug!(pid = %child, argv = ?cmd.argv, "spawned");
            cmd.heredoc = None;
            wait_for(child)
        }
        Err(errno) => {
            eprintln!("{SHELL_NAME}: fork: {errno}");
            1
        }
    }
}

/// A standalone builtin runs in the shell process. Its redirections are
/// applied over duplicated descriptors and restored afterwards, whatever
/// the builtin did.
fn run_builtin_in_parent(
    builtin: &dyn BuiltinCommand,
    cmd: &mut Command,
    shell: &mut ShellState,
) -> i32 {
    if cmd.redirects.is_empty() && cmd.heredoc.is_none() {
        return run_builtin_on_stdio(builtin, &cmd.argv, shell);
    }
    let guard = match RedirGuard::apply(&cmd.redirects, cmd.heredoc.take()) {
        Ok(guard) => guard,
        Err(status) => return status,
    };
    let status = run_builtin_on_stdio(builtin, &cmd.argv, shell);
    drop(guard);
    status
}

fn run_builtin_on_stdio(builtin: &dyn BuiltinCommand, argv: &[String], shell: &mut ShellState) -> i32 {
    let stdout = std::io::stdout();
    let stderr = std::io::stderr();
    let mut out = stdout.lock();
    let mut err = stderr.lock();
    let status = builtin.run(&argv[1..], shell, &mut out, &mut err);
    let _ = out.flush();
    let _ = err.flush();
    status
}

/// Saved copies of stdin and stdout, restored on drop. Pending buffered
/// output is flushed on both edges so it lands on the stream that was
/// current when it was written.
struct RedirGuard {
    saved: Vec<(i32, OwnedFd)>,
}

impl RedirGuard {
    fn apply(redirects: &[Redirect], heredoc: Option<OwnedFd>) -> Result<Self, i32> {
        let _ = std::io::stdout().flush();
        let mut guard = RedirGuard { saved: Vec::new() };

        let stdin = std::io::stdin();
        match stdin.as_fd().try_clone_to_owned() {
            Ok(copy) => guard.saved.push((libc::STDIN_FILENO, copy)),
            Err(e) => {
                eprintln!("{SHELL_NAME}: dup: {e}");
                return Err(1);
            }
        }
        let stdout = std::io::stdout();
        match stdout.as_fd().try_clone_to_owned() {
            Ok(copy) => guard.saved.push((libc::STDOUT_FILENO, copy)),
            Err(e) => {
                eprintln!("{SHELL_NAME}: dup: {e}");
                return Err(1);
            }
        }

        // on failure the guard drops here and the originals come back
        apply_redirections(redirects, heredoc)?;
        Ok(guard)
    }
}

impl Drop for RedirGuard {
    fn drop(&mut self) {
        let _ = std::io::stdout().flush();
        for (target, saved) in self.saved.drain(..) {
            let _ = dup2(saved.as_raw_fd(), target);
        }
    }
}

/// Apply every redirection in source order; a later redirection of the same
/// stream overrides an earlier one, so the last input-producing redirection
/// wins over earlier files and heredocs alike.
fn apply_redirections(redirects: &[Redirect], heredoc: Option<OwnedFd>) -> Result<(), i32> {
    for redirect in redirects {
        let path = redirect.path.as_deref().unwrap_or_default();
        match redirect.kind {
            RedirKind::Heredoc => {
                // every heredoc operator replays the surviving body pipe;
                // ordering against `<` still picks the right final stdin
                if let Some(fd) = heredoc.as_ref() {
                    if let Err(errno) = dup2(fd.as_raw_fd(), libc::STDIN_FILENO) {
                        eprintln!("{SHELL_NAME}: dup2: {errno}");
                        return Err(1);
                    }
                }
            }
            RedirKind::In => {
                let file = match OpenOptions::new().read(true).open(path) {
                    Ok(file) => file,
                    Err(e) => {
                        eprintln!("{SHELL_NAME}: {path}: {e}");
                        return Err(1);
                    }
                };
                if let Err(errno) = dup2(file.as_raw_fd(), libc::STDIN_FILENO) {
                    eprintln!("{SHELL_NAME}: dup2: {errno}");
                    return Err(1);
                }
            }
            RedirKind::Out | RedirKind::Append => {
                let mut options = OpenOptions::new();
                options.write(true).create(true).mode(0o644);
                if redirect.kind == RedirKind::Append {
                    options.append(true);
                } else {
                    options.truncate(true);
                }
                let file = match options.open(path) {
                    Ok(file) => file,
                    Err(e) => {
                        eprintln!("{SHELL_NAME}: {path}: {e}");
                        return Err(1);
                    }
                };
                if let Err(errno) = dup2(file.as_raw_fd(), libc::STDOUT_FILENO) {
                    eprintln!("{SHELL_NAME}: dup2: {errno}");
                    return Err(1);
                }
            }
        }
    }
    drop(heredoc);
    Ok(())
}

/// Resolve argv[0], build the C-string vectors, and `execve`. Only ever
/// called in a forked child; never returns.
fn exec_external(argv: &[String], shell: &ShellState) -> ! {
    let program = match external::resolve_program(&argv[0], &shell.env) {
        Ok(path) => path,
        Err(lookup) => {
            eprintln!("{SHELL_NAME}: {}: {lookup}", argv[0]);
            exit_child(lookup.exit_code());
        }
    };

    let program_c = match CString::new(program.as_os_str().as_bytes()) {
        Ok(c) => c,
        Err(_) => {
            eprintln!("{SHELL_NAME}: {}: invalid program path", argv[0]);
            exit_child(126);
        }
    };
    let argv_c: Vec<CString> = argv
        .iter()
        .filter_map(|arg| CString::new(arg.as_str()).ok())
        .collect();
    let env_c = shell.env.to_exec_array();

    match execve(&program_c, &argv_c, &env_c) {
        Ok(infallible) => match infallible {},
        Err(errno) => {
            eprintln!("{SHELL_NAME}: {}: {}", argv[0], errno.desc());
            exit_child(if errno == Errno::ENOENT { 127 } else { 126 });
        }
    }
}

/// Reap one child and map its wait status onto the shell convention:
/// the low byte for a normal exit, 128 plus the signal number otherwise.
fn wait_for(pid: Pid) -> i32 {
    loop {
        match waitpid(pid, None) {
            Ok(WaitStatus::Exited(_, code)) => return code & 0xff,
            Ok(WaitStatus::Signaled(_, sig, _)) => {
                if sig == Signal::SIGINT {
                    // leave the ^C echo on its own line
                    eprintln!();
                }
                return 128 + sig as i32;
            }
            Ok(_) => continue,
            Err(Errno::EINTR) => continue,
            Err(errno) => {
                eprintln!("{SHELL_NAME}: waitpid: {errno}");
                return 1;
            }
        }
    }
}

/// Leave a forked child, flushing whatever the builtin buffered first.
fn exit_child(status: i32) -> ! {
    let _ = std::io::stdout().flush();
    let _ = std::io::stderr().flush();
    std::process::exit(status & 0xff)
}
