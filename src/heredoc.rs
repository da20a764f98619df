//! Heredoc collection: reads every `<<` body before any process is spawned.
//!
//! Bodies are captured interactively, optionally variable-expanded, and
//! parked in a pipe whose read end is attached to the owning command. By the
//! time the executor runs, no further interactive input is needed, so child
//! output never interleaves with body prompts and an interrupt during
//! capture aborts the whole line without orphaning children.

use crate::env::ShellState;
use crate::expander;
use crate::input::{LineReader, ReadOutcome};
use crate::parser::{AstNode, Command, RedirKind};
use crate::SHELL_NAME;
use std::fs::File;
use std::io::Write;
use std::os::fd::OwnedFd;
use thiserror::Error;

/// Continuation prompt shown while a body is being read.
pub const BODY_PROMPT: &str = "> ";

/// Failures during body capture. `Interrupted` aborts the whole command
/// line with status 130; `Io` with status 1.
#[derive(Debug, Error)]
pub enum HeredocError {
    #[error("here-document capture interrupted")]
    Interrupted,
    #[error(transparent)]
    Io(#[from] anyhow::Error),
}

/// Visit every command left to right and capture its heredoc bodies.
pub fn collect_heredocs(
    node: &mut AstNode,
    shell: &ShellState,
    reader: &mut dyn LineReader,
) -> Result<(), HeredocError> {
    match node {
        AstNode::Command(cmd) => collect_for_command(cmd, shell, reader),
        AstNode::Pipe(left, right)
        | AstNode::AndIf(left, right)
        | AstNode::OrIf(left, right) => {
            collect_heredocs(left, shell, reader)?;
            collect_heredocs(right, shell, reader)
        }
    }
}

/// All heredocs on a command are read in order, but only the last one feeds
/// the command; earlier pipes are dropped (and thereby closed) as soon as
/// the next body replaces them.
fn collect_for_command(
    cmd: &mut Command,
    shell: &ShellState,
    reader: &mut dyn LineReader,
) -> Result<(), HeredocError> {
    for redirect in &cmd.redirects {
        if redirect.kind != RedirKind::Heredoc {
            continue;
        }
        let delimiter = redirect.path.as_deref().unwrap_or_default();
        let body = read_body(delimiter, redirect.expand_body, shell, reader)?;
        cmd.heredoc = Some(body_into_pipe(&body)?);
    }
    Ok(())
}

fn read_body(
    delimiter: &str,
    expand: bool,
    shell: &ShellState,
    reader: &mut dyn LineReader,
) -> Result<String, HeredocError> {
    let mut body = String::new();
    loop {
        match reader.read_line(BODY_PROMPT)? {
            ReadOutcome::Interrupted => return Err(HeredocError::Interrupted),
            ReadOutcome::Eof => {
                eprintln!(
                    "{SHELL_NAME}: warning: here-document delimited by end of file (wanted `{delimiter}')"
                );
                break;
            }
            ReadOutcome::Line(line) => {
                if line == delimiter {
                    break;
                }
                if expand {
                    body.push_str(&expander::expand_dollars(&line, shell));
                } else {
                    body.push_str(&line);
                }
                body.push('\n');
            }
        }
    }
    Ok(body)
}

/// Park the body in a pipe: the consumer reads it followed by end-of-file
/// because the write end is closed here.
fn body_into_pipe(body: &str) -> Result<OwnedFd, HeredocError> {
    let (read_end, write_end) = nix::unistd::pipe().map_err(anyhow::Error::from)?;
    let mut writer = File::from(write_end);
    writer.write_all(body.as_bytes()).map_err(anyhow::Error::from)?;
    Ok(read_end)
}
