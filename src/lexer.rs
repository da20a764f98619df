//! Lexical analysis: turns a raw command line into a sequence of tokens.
//!
//! Words are kept as a list of segments, each tagged with the quote context
//! it was scanned in. Later stages depend on that provenance: the expander
//! substitutes variables only in unquoted and double-quoted segments, and
//! the heredoc collector disables body expansion when the delimiter carried
//! any quoted segment.

use thiserror::Error;

/// Quote context a word segment was scanned in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteKind {
    None,
    Single,
    Double,
}

/// A contiguous run of characters within one word, sharing a quote context.
/// `a'b'"c"d` scans to one word of four parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordPart {
    pub text: String,
    pub quote: QuoteKind,
}

impl WordPart {
    pub fn new(text: impl Into<String>, quote: QuoteKind) -> Self {
        Self {
            text: text.into(),
            quote,
        }
    }
}

/// A token produced by the scanner. Redirection operators are followed in
/// the stream by the word naming their target; the parser pairs them up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Word(Vec<WordPart>),
    /// `|`
    Pipe,
    /// `&&`
    AndIf,
    /// `||`
    OrIf,
    /// `<`
    RedirIn,
    /// `>`
    RedirOut,
    /// `>>`
    RedirAppend,
    /// `<<`
    Heredoc,
}

impl Token {
    /// Spelling used in diagnostics.
    pub fn describe(&self) -> &'static str {
        match self {
            Token::Word(_) => "word",
            Token::Pipe => "|",
            Token::AndIf => "&&",
            Token::OrIf => "||",
            Token::RedirIn => "<",
            Token::RedirOut => ">",
            Token::RedirAppend => ">>",
            Token::Heredoc => "<<",
        }
    }
}

/// Errors from the scanning pass.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum LexError {
    #[error("unterminated single quote")]
    UnterminatedSingleQuote,
    #[error("unterminated double quote")]
    UnterminatedDoubleQuote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Start,
    Word,
    SingleQuote,
    DoubleQuote,
}

struct Scanner {
    input: Vec<char>,
    pos: usize,
    state: ScanState,
    parts: Vec<WordPart>,
    buffer: String,
}

impl Scanner {
    fn new(line: &str) -> Self {
        Scanner {
            input: line.chars().collect(),
            pos: 0,
            state: ScanState::Start,
            parts: Vec::new(),
            buffer: String::new(),
        }
    }

    fn scan(mut self) -> Result<Vec<Token>, LexError> {
        let mut out = Vec::new();

        while let Some(ch) = self.read_char() {
            match self.state {
                ScanState::Start => self.handle_start(ch, &mut out),
                ScanState::Word => self.handle_word(ch, &mut out),
                ScanState::SingleQuote => self.handle_single_quote(ch),
                ScanState::DoubleQuote => self.handle_double_quote(ch),
            }
        }

        match self.state {
            ScanState::SingleQuote => return Err(LexError::UnterminatedSingleQuote),
            ScanState::DoubleQuote => return Err(LexError::UnterminatedDoubleQuote),
            _ => {}
        }

        self.flush_word(&mut out);
        Ok(out)
    }

    fn read_char(&mut self) -> Option<char> {
        let ch = self.input.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    /// True when `ch` begins an operator at the current position. A lone `&`
    /// is an ordinary word character; only `&&` is an operator here.
    fn begins_operator(&self, ch: char) -> bool {
        matches!(ch, '|' | '<' | '>') || (ch == '&' && self.peek_char() == Some('&'))
    }

    fn handle_start(&mut self, ch: char, out: &mut Vec<Token>) {
        match ch {
            ' ' | '\t' => {}
            c if self.begins_operator(c) => self.emit_operator(c, out),
            '\'' => self.state = ScanState::SingleQuote,
            '"' => self.state = ScanState::DoubleQuote,
            c => {
                self.buffer.push(c);
                self.state = ScanState::Word;
            }
        }
    }

    fn handle_word(&mut self, ch: char, out: &mut Vec<Token>) {
        match ch {
            ' ' | '\t' => {
                self.flush_word(out);
                self.state = ScanState::Start;
            }
            c if self.begins_operator(c) => {
                self.flush_word(out);
                self.emit_operator(c, out);
                self.state = ScanState::Start;
            }
            '\'' => {
                self.flush_unquoted_run();
                self.state = ScanState::SingleQuote;
            }
            '"' => {
                self.flush_unquoted_run();
                self.state = ScanState::DoubleQuote;
            }
            c => self.buffer.push(c),
        }
    }

    fn handle_single_quote(&mut self, ch: char) {
        if ch == '\'' {
            // the segment is recorded even when empty so that `''` still
            // contributes an argument after expansion
            self.parts.push(WordPart::new(
                std::mem::take(&mut self.buffer),
                QuoteKind::Single,
            ));
            self.state = ScanState::Word;
        } else {
            self.buffer.push(ch);
        }
    }

    fn handle_double_quote(&mut self, ch: char) {
        if ch == '"' {
            self.parts.push(WordPart::new(
                std::mem::take(&mut self.buffer),
                QuoteKind::Double,
            ));
            self.state = ScanState::Word;
        } else {
            // `$` stays in the segment; the expander interprets it
            self.buffer.push(ch);
        }
    }

    /// Multi-character operators are matched before single-character ones.
    fn emit_operator(&mut self, ch: char, out: &mut Vec<Token>) {
        let token = match ch {
            '&' => {
                self.read_char();
                Token::AndIf
            }
            '|' if self.peek_char() == Some('|') => {
                self.read_char();
                Token::OrIf
            }
            '|' => Token::Pipe,
            '<' if self.peek_char() == Some('<') => {
                self.read_char();
                Token::Heredoc
            }
            '<' => Token::RedirIn,
            '>' if self.peek_char() == Some('>') => {
                self.read_char();
                Token::RedirAppend
            }
            '>' => Token::RedirOut,
            _ => unreachable!("emit_operator called on a non-operator character"),
        };
        out.push(token);
    }

    fn flush_unquoted_run(&mut self) {
        if !self.buffer.is_empty() {
            self.parts.push(WordPart::new(
                std::mem::take(&mut self.buffer),
                QuoteKind::None,
            ));
        }
    }

    fn flush_word(&mut self, out: &mut Vec<Token>) {
        self.flush_unquoted_run();
        if !self.parts.is_empty() {
            out.push(Token::Word(std::mem::take(&mut self.parts)));
        }
    }
}

/// Tokenize one input line.
///
/// Whitespace outside quotes separates tokens; operators need no surrounding
/// whitespace (`a|b` is three tokens). An unterminated quote is a lex error
/// and no tokens are forwarded.
pub fn tokenize(line: &str) -> Result<Vec<Token>, LexError> {
    Scanner::new(line).scan()
}
