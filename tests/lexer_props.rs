//! Property tests for the scanner: rendering a token sequence with
//! whitespace between the pieces and scanning it back is the identity.

use minish::lexer::{tokenize, QuoteKind, Token, WordPart};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Piece {
    Word(String),
    Op(&'static str),
}

static OPERATORS: [&str; 7] = ["|", "||", "&&", "<", ">", ">>", "<<"];

fn word() -> impl Strategy<Value = String> {
    // characters that are never operators, quotes, or separators
    proptest::string::string_regex("[A-Za-z0-9_./=-]{1,8}").unwrap()
}

fn piece() -> impl Strategy<Value = Piece> {
    prop_oneof![
        word().prop_map(Piece::Word),
        proptest::sample::select(&OPERATORS[..]).prop_map(Piece::Op),
    ]
}

fn render(pieces: &[Piece]) -> String {
    pieces
        .iter()
        .map(|p| match p {
            Piece::Word(w) => w.as_str(),
            Piece::Op(op) => op,
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn expected_token(piece: &Piece) -> Token {
    match piece {
        Piece::Word(w) => Token::Word(vec![WordPart::new(w.clone(), QuoteKind::None)]),
        Piece::Op("|") => Token::Pipe,
        Piece::Op("||") => Token::OrIf,
        Piece::Op("&&") => Token::AndIf,
        Piece::Op("<") => Token::RedirIn,
        Piece::Op(">") => Token::RedirOut,
        Piece::Op(">>") => Token::RedirAppend,
        Piece::Op("<<") => Token::Heredoc,
        Piece::Op(other) => panic!("unknown operator {other}"),
    }
}

proptest! {
    #[test]
    fn scanning_a_rendered_sequence_is_the_identity(
        pieces in proptest::collection::vec(piece(), 0..12)
    ) {
        let line = render(&pieces);
        let tokens = tokenize(&line).expect("rendered line must scan");
        let expected: Vec<Token> = pieces.iter().map(expected_token).collect();
        prop_assert_eq!(tokens, expected);
    }

    #[test]
    fn single_quoting_preserves_text_verbatim(w in word()) {
        let tokens = tokenize(&format!("'{w}'")).expect("quoted word must scan");
        prop_assert_eq!(
            tokens,
            vec![Token::Word(vec![WordPart::new(w, QuoteKind::Single)])]
        );
    }

    #[test]
    fn double_quoting_dollar_free_text_preserves_it(w in word()) {
        let tokens = tokenize(&format!("\"{w}\"")).expect("quoted word must scan");
        prop_assert_eq!(
            tokens,
            vec![Token::Word(vec![WordPart::new(w, QuoteKind::Double)])]
        );
    }

    #[test]
    fn extra_whitespace_never_changes_the_tokens(
        pieces in proptest::collection::vec(piece(), 0..8),
        pad in 1usize..4
    ) {
        let spaced = pieces
            .iter()
            .map(|p| match p {
                Piece::Word(w) => w.clone(),
                Piece::Op(op) => op.to_string(),
            })
            .collect::<Vec<_>>()
            .join(&" ".repeat(pad));
        let tokens = tokenize(&spaced).expect("padded line must scan");
        let expected: Vec<Token> = pieces.iter().map(expected_token).collect();
        prop_assert_eq!(tokens, expected);
    }
}
