//! Syntax analysis: builds a binary tree from the token sequence.
//!
//! The grammar, lowest precedence first:
//!
//! ```text
//! or    := and  ('||' and)*
//! and   := pipe ('&&' pipe)*
//! pipe  := cmd  ('|'  cmd)*
//! cmd   := (WORD | redir)+
//! redir := ('<' | '>' | '>>' | '<<') WORD
//! ```
//!
//! Each rule has its own method on the builder; the binary operators are
//! left-associative, so `a | b | c` becomes `Pipe(Pipe(a, b), c)` and the
//! executor flattens the left-leaning spine back into an ordered list.

use crate::lexer::{Token, WordPart};
use std::os::fd::OwnedFd;
use thiserror::Error;

/// Kind of redirection attached to a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirKind {
    /// `< file`
    In,
    /// `> file`
    Out,
    /// `>> file`
    Append,
    /// `<< delimiter`
    Heredoc,
}

/// One redirection. `target` keeps the raw word from the lexer; the expander
/// fills `path` (the expanded filename, or the quote-stripped heredoc
/// delimiter) and, for heredocs, whether the body should undergo variable
/// expansion.
#[derive(Debug)]
pub struct Redirect {
    pub kind: RedirKind,
    pub target: Vec<WordPart>,
    pub path: Option<String>,
    pub expand_body: bool,
}

impl Redirect {
    fn new(kind: RedirKind, target: Vec<WordPart>) -> Self {
        Self {
            kind,
            target,
            path: None,
            expand_body: false,
        }
    }
}

/// A leaf command: its pre-expansion words, its redirections in source
/// order, the argument vector produced by the expander, and the heredoc
/// read descriptor attached by the collector.
#[derive(Debug, Default)]
pub struct Command {
    pub words: Vec<Vec<WordPart>>,
    pub redirects: Vec<Redirect>,
    pub argv: Vec<String>,
    pub heredoc: Option<OwnedFd>,
}

/// A node of the syntax tree.
#[derive(Debug)]
pub enum AstNode {
    Command(Command),
    Pipe(Box<AstNode>, Box<AstNode>),
    AndIf(Box<AstNode>, Box<AstNode>),
    OrIf(Box<AstNode>, Box<AstNode>),
}

/// Errors from the parsing pass. Every variant surfaces as one diagnostic
/// and exit status 2; no tree is produced.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("syntax error near unexpected token `{0}'")]
    UnexpectedToken(String),
    #[error("syntax error: missing command after `{0}'")]
    MissingOperand(String),
    #[error("syntax error: missing redirection target after `{0}'")]
    MissingRedirTarget(String),
    #[error("syntax error: unexpected end of input")]
    UnexpectedEnd,
}

struct TreeBuilder {
    tokens: Vec<Token>,
    pos: usize,
}

impl TreeBuilder {
    fn from(tokens: Vec<Token>) -> Self {
        TreeBuilder { tokens, pos: 0 }
    }

    fn build(mut self) -> Result<AstNode, ParseError> {
        let ast = self.parse_or()?;

        // every token must belong to the tree
        if let Some(token) = self.peek() {
            return Err(ParseError::UnexpectedToken(token.describe().to_string()));
        }

        Ok(ast)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn consume(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// or := and ('||' and)*
    fn parse_or(&mut self) -> Result<AstNode, ParseError> {
        let mut node = self.parse_and()?;
        while matches!(self.peek(), Some(Token::OrIf)) {
            self.consume();
            let right = self.operand("||", Self::parse_and)?;
            node = AstNode::OrIf(Box::new(node), Box::new(right));
        }
        Ok(node)
    }

    /// and := pipe ('&&' pipe)*
    fn parse_and(&mut self) -> Result<AstNode, ParseError> {
        let mut node = self.parse_pipe()?;
        while matches!(self.peek(), Some(Token::AndIf)) {
            self.consume();
            let right = self.operand("&&", Self::parse_pipe)?;
            node = AstNode::AndIf(Box::new(node), Box::new(right));
        }
        Ok(node)
    }

    /// pipe := cmd ('|' cmd)*
    fn parse_pipe(&mut self) -> Result<AstNode, ParseError> {
        let mut node = self.parse_command()?;
        while matches!(self.peek(), Some(Token::Pipe)) {
            self.consume();
            let right = self.operand("|", Self::parse_command)?;
            node = AstNode::Pipe(Box::new(node), Box::new(right));
        }
        Ok(node)
    }

    /// Parse the right operand of `op`, renaming a bare end-of-input into a
    /// diagnostic that names the operator left dangling.
    fn operand(
        &mut self,
        op: &str,
        parse: fn(&mut Self) -> Result<AstNode, ParseError>,
    ) -> Result<AstNode, ParseError> {
        match parse(self) {
            Err(ParseError::UnexpectedEnd) => Err(ParseError::MissingOperand(op.to_string())),
            other => other,
        }
    }

    /// cmd := (WORD | redir)+
    ///
    /// Words and redirections may interleave in any order; redirection order
    /// is preserved because the executor applies them left to right.
    fn parse_command(&mut self) -> Result<AstNode, ParseError> {
        let mut command = Command::default();

        loop {
            match self.peek() {
                Some(Token::Word(_)) => {
                    if let Some(Token::Word(parts)) = self.consume() {
                        command.words.push(parts);
                    }
                }
                Some(Token::RedirIn)
                | Some(Token::RedirOut)
                | Some(Token::RedirAppend)
                | Some(Token::Heredoc) => {
                    command.redirects.push(self.parse_redirect()?);
                }
                _ => break,
            }
        }

        if command.words.is_empty() && command.redirects.is_empty() {
            return match self.peek() {
                Some(token) => Err(ParseError::UnexpectedToken(token.describe().to_string())),
                None => Err(ParseError::UnexpectedEnd),
            };
        }

        Ok(AstNode::Command(command))
    }

    /// redir := ('<' | '>' | '>>' | '<<') WORD
    fn parse_redirect(&mut self) -> Result<Redirect, ParseError> {
        let (kind, spelling) = match self.consume() {
            Some(Token::RedirIn) => (RedirKind::In, "<"),
            Some(Token::RedirOut) => (RedirKind::Out, ">"),
            Some(Token::RedirAppend) => (RedirKind::Append, ">>"),
            Some(Token::Heredoc) => (RedirKind::Heredoc, "<<"),
            _ => unreachable!("parse_redirect called without a redirection operator"),
        };

        match self.consume() {
            Some(Token::Word(parts)) => Ok(Redirect::new(kind, parts)),
            _ => Err(ParseError::MissingRedirTarget(spelling.to_string())),
        }
    }
}

/// Build the syntax tree for one token sequence.
pub fn parse(tokens: Vec<Token>) -> Result<AstNode, ParseError> {
    TreeBuilder::from(tokens).build()
}
