//! A small interactive Unix shell.
//!
//! One command line flows through five stages: the [`lexer`] tags it into
//! quote-aware tokens, the [`parser`] builds a binary tree of commands and
//! operators, the [`expander`] resolves variables into final argument
//! vectors, the [`heredoc`] collector captures `<<` bodies into pipe
//! descriptors, and the [`executor`] turns the tree into processes with the
//! right plumbing. [`run_line`] drives the stages in order and records the
//! exit status; the `minish` binary wraps it in a read-eval loop.

pub mod builtin;
pub mod env;
pub mod executor;
pub mod expander;
pub mod external;
pub mod heredoc;
pub mod input;
pub mod lexer;
pub mod parser;
pub mod signal;

pub use env::{Environment, ShellState};
pub use input::{BufferedReader, InteractiveReader, LineReader, ReadOutcome};

/// Name used as the prefix of every diagnostic.
pub const SHELL_NAME: &str = "minish";

/// Run one command line through the pipeline and return the new last exit
/// status.
///
/// Errors never cross stage boundaries: each stage either hands its result
/// to the next or prints one diagnostic and maps itself to an exit status
/// (2 for lex and parse errors, 130 for an interrupted heredoc, 1 for a
/// heredoc I/O failure). Blank input is a no-op that leaves the status
/// untouched. `reader` supplies heredoc body lines.
pub fn run_line(line: &str, shell: &mut ShellState, reader: &mut dyn LineReader) -> i32 {
    if let Some(status) = eval_line(line, shell, reader) {
        shell.last_status = status;
    }
    shell.last_status
}

fn eval_line(line: &str, shell: &mut ShellState, reader: &mut dyn LineReader) -> Option<i32> {
    let tokens = match lexer::tokenize(line) {
        Ok(tokens) => tokens,
        Err(err) => {
            eprintln!("{SHELL_NAME}: {err}");
            return Some(2);
        }
    };
    if tokens.is_empty() {
        return None;
    }
    tracing::debug!(?tokens, "lexed");

    let mut ast = match parser::parse(tokens) {
        Ok(ast) => ast,
        Err(err) => {
            eprintln!("{SHELL_NAME}: {err}");
            return Some(2);
        }
    };

    expander::expand_tree(&mut ast, shell);

    if let Err(err) = heredoc::collect_heredocs(&mut ast, shell, reader) {
        return Some(match err {
            heredoc::HeredocError::Interrupted => 130,
            heredoc::HeredocError::Io(e) => {
                eprintln!("{SHELL_NAME}: {e}");
                1
            }
        });
    }

    Some(executor::execute(&mut ast, shell))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Environment;
    use crate::input::BufferedReader;
    use std::io::Cursor;

    fn test_shell() -> ShellState {
        let mut env = Environment::new();
        env.set("PATH", "/usr/bin:/bin");
        ShellState::with_env(env)
    }

    fn run(line: &str, shell: &mut ShellState) -> i32 {
        let mut reader = BufferedReader::new(Cursor::new(String::new()));
        run_line(line, shell, &mut reader)
    }

    #[test]
    fn test_blank_line_keeps_status() {
        let mut shell = test_shell();
        shell.last_status = 5;
        assert_eq!(run("", &mut shell), 5);
        assert_eq!(run("   \t ", &mut shell), 5);
    }

    #[test]
    fn test_lex_error_sets_two() {
        let mut shell = test_shell();
        assert_eq!(run("echo 'unclosed", &mut shell), 2);
        assert_eq!(shell.last_status, 2);
    }

    #[test]
    fn test_parse_error_sets_two() {
        let mut shell = test_shell();
        assert_eq!(run("| head", &mut shell), 2);
        assert_eq!(run("a |", &mut shell), 2);
    }

    #[test]
    fn test_status_flows_into_next_line() {
        let mut shell = test_shell();
        assert_eq!(run("false", &mut shell), 1);
        assert_eq!(run("true", &mut shell), 0);
        assert_eq!(run("sh -c 'exit 3'", &mut shell), 3);
        assert_eq!(shell.last_status, 3);
    }

    #[test]
    fn test_short_circuit_line() {
        let mut shell = test_shell();
        assert_eq!(run("false && true || sh -c 'exit 4'", &mut shell), 4);
    }
}
