//! Variable expansion and quote removal.
//!
//! Walks the tree after parsing and rewrites every command's word list into
//! its final argument vector. Expansion is segment-wise: unquoted and
//! double-quoted segments have `$NAME` and `$?` substituted, single-quoted
//! segments are literal. No field splitting happens, so an unquoted variable
//! holding spaces still yields one argument.

use crate::env::ShellState;
use crate::lexer::{QuoteKind, WordPart};
use crate::parser::{AstNode, Command, RedirKind};

/// Expand every command in the tree in place.
pub fn expand_tree(node: &mut AstNode, shell: &ShellState) {
    match node {
        AstNode::Command(cmd) => expand_command(cmd, shell),
        AstNode::Pipe(left, right)
        | AstNode::AndIf(left, right)
        | AstNode::OrIf(left, right) => {
            expand_tree(left, shell);
            expand_tree(right, shell);
        }
    }
}

fn expand_command(cmd: &mut Command, shell: &ShellState) {
    cmd.argv = cmd
        .words
        .iter()
        .filter_map(|word| expand_word(word, shell))
        .collect();
    tracing::debug!(argv = ?cmd.argv, "expanded command");

    for redirect in &mut cmd.redirects {
        if redirect.kind == RedirKind::Heredoc {
            // the delimiter is never expanded; quoting it only disables
            // expansion of the body
            redirect.expand_body = redirect
                .target
                .iter()
                .all(|part| part.quote == QuoteKind::None);
            redirect.path = Some(
                redirect
                    .target
                    .iter()
                    .map(|part| part.text.as_str())
                    .collect(),
            );
        } else {
            // targets expand like arguments but are never elided: an empty
            // expansion surfaces later as an open() failure
            redirect.path = Some(expand_parts(&redirect.target, shell));
        }
    }
}

/// Expand one word into at most one argument. Returns `None` when the word
/// consists only of unquoted segments and its expansion is empty; a word
/// with any quoted segment always contributes an argument, even `""`.
fn expand_word(parts: &[WordPart], shell: &ShellState) -> Option<String> {
    let expanded = expand_parts(parts, shell);
    let fully_unquoted = parts.iter().all(|part| part.quote == QuoteKind::None);
    if expanded.is_empty() && fully_unquoted {
        None
    } else {
        Some(expanded)
    }
}

fn expand_parts(parts: &[WordPart], shell: &ShellState) -> String {
    parts
        .iter()
        .map(|part| match part.quote {
            QuoteKind::Single => part.text.clone(),
            QuoteKind::None | QuoteKind::Double => expand_dollars(&part.text, shell),
        })
        .collect()
}

/// Substitute `$NAME` and `$?` in `text` under double-quote rules. Also used
/// by the heredoc collector on body lines when the delimiter was unquoted.
///
/// A `$` followed by anything that cannot start a name, including the end of
/// the text, is emitted literally. Names consume `[A-Za-z_][A-Za-z0-9_]*`
/// greedily; unset names expand to the empty string.
pub(crate) fn expand_dollars(text: &str, shell: &ShellState) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' {
            out.push(ch);
            continue;
        }
        match chars.peek() {
            Some('?') => {
                chars.next();
                out.push_str(&shell.last_status.to_string());
            }
            Some(&c) if c.is_ascii_alphabetic() || c == '_' => {
                let mut name = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if let Some(value) = shell.env.get(&name) {
                    out.push_str(value);
                }
            }
            _ => out.push('$'),
        }
    }

    out
}
