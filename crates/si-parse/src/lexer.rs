//! Stateful tokenizer.
//!
//! Two states: `Root` and `InString`. In `Root` the lexer recognizes basic
//! type keywords, the statement keyword set, `NULL`, identifiers, numbers,
//! single-quoted char literals, line and block comments, and single-character
//! punctuation -- composite operators (`++`, `->`, `==`, `<=`, `&&`, `<<`, ...)
//! are deliberately left as two adjacent `Punct` tokens and reassembled by the
//! parser's two-token lookahead, keeping the lexer itself context-free. `"`
//! switches to `InString`, which emits `Chars` (runs of plain bytes),
//! `Escaped` (`\X`) and `StringEnd` (the closing `"`) before returning to
//! `Root`.
//!
//! Whitespace and comments are produced as tokens but elided from the stream
//! handed to the parser (spec.md §3).

use crate::error::ParseError;
use si_core::source::SourceFile;
use si_core::Position;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    BasicType,
    Keyword,
    Number,
    Char,
    Null,
    StringStart,
    Chars,
    Escaped,
    StringEnd,
    Punct,
    Whitespace,
    Comment,
    MultiLineComment,
    Eof,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
    pub pos: Position,
}

const BASIC_TYPES: &[&str] = &["void", "bool", "i8", "i16", "i32", "i64", "f32", "f64"];
const KEYWORDS: &[&str] = &[
    "return", "if", "else", "while", "for", "break", "continue", "sizeof", "type", "struct",
    "true", "false",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Root,
    InString,
}

/// Produces the full token stream (including whitespace/comments) for one
/// source file. [`Lexer::tokens`] is the entry point the parser uses; it
/// strips whitespace and comments before returning.
pub struct Lexer<'a> {
    file: &'a SourceFile,
    bytes: &'a [u8],
    pos: usize,
    state: State,
}

impl<'a> Lexer<'a> {
    pub fn new(file: &'a SourceFile) -> Self {
        Lexer {
            file,
            bytes: file.text.as_bytes(),
            pos: 0,
            state: State::Root,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn position(&self) -> Position {
        self.file.position_at(self.pos as u32)
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek();
        if b.is_some() {
            self.pos += 1;
        }
        b
    }

    fn make(&self, kind: TokenKind, start: usize, pos: Position) -> Token {
        Token {
            kind,
            value: String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned(),
            pos,
        }
    }

    /// Lexes the whole file, then strips `Whitespace`/`Comment`/`MultiLineComment`.
    pub fn tokens(mut self) -> Result<Vec<Token>, ParseError> {
        let mut out = Vec::new();
        loop {
            let tok = self.next_token()?;
            let is_eof = tok.kind == TokenKind::Eof;
            if !matches!(
                tok.kind,
                TokenKind::Whitespace | TokenKind::Comment | TokenKind::MultiLineComment
            ) {
                out.push(tok);
            }
            if is_eof {
                break;
            }
        }
        Ok(out)
    }

    fn next_token(&mut self) -> Result<Token, ParseError> {
        match self.state {
            State::Root => self.next_root_token(),
            State::InString => self.next_string_token(),
        }
    }

    fn next_root_token(&mut self) -> Result<Token, ParseError> {
        let pos = self.position();
        let start = self.pos;

        let Some(b) = self.peek() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                value: String::new(),
                pos,
            });
        };

        if b.is_ascii_whitespace() {
            while self.peek().is_some_and(|c| c.is_ascii_whitespace()) {
                self.bump();
            }
            return Ok(self.make(TokenKind::Whitespace, start, pos));
        }

        if b == b'/' && self.peek_at(1) == Some(b'/') {
            while self.peek().is_some_and(|c| c != b'\n') {
                self.bump();
            }
            // Consume the trailing newline too -- "to end of line inclusive".
            self.bump();
            return Ok(self.make(TokenKind::Comment, start, pos));
        }

        if b == b'/' && self.peek_at(1) == Some(b'*') {
            self.bump();
            self.bump();
            loop {
                match (self.peek(), self.peek_at(1)) {
                    (Some(b'*'), Some(b'/')) => {
                        self.bump();
                        self.bump();
                        break;
                    }
                    (Some(_), _) => {
                        self.bump();
                    }
                    (None, _) => {
                        return Err(ParseError::UnterminatedComment { pos });
                    }
                }
            }
            return Ok(self.make(TokenKind::MultiLineComment, start, pos));
        }

        if b == b'"' {
            self.bump();
            self.state = State::InString;
            return Ok(self.make(TokenKind::StringStart, start, pos));
        }

        if b == b'\'' {
            self.bump();
            match self.peek() {
                Some(b'\\') => {
                    self.bump();
                    self.bump();
                }
                Some(_) => {
                    self.bump();
                }
                None => return Err(ParseError::UnterminatedChar { pos }),
            }
            if self.peek() != Some(b'\'') {
                return Err(ParseError::UnterminatedChar { pos });
            }
            self.bump();
            return Ok(self.make(TokenKind::Char, start, pos));
        }

        if b.is_ascii_digit() {
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
            }
            if self.peek() == Some(b'.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.bump();
                }
            }
            return Ok(self.make(TokenKind::Number, start, pos));
        }

        if b.is_ascii_alphabetic() || b == b'_' {
            while self
                .peek()
                .is_some_and(|c| c.is_ascii_alphanumeric() || c == b'_')
            {
                self.bump();
            }
            let word = std::str::from_utf8(&self.bytes[start..self.pos]).unwrap();
            let kind = if word == "NULL" {
                TokenKind::Null
            } else if BASIC_TYPES.contains(&word) {
                TokenKind::BasicType
            } else if KEYWORDS.contains(&word) {
                TokenKind::Keyword
            } else {
                TokenKind::Ident
            };
            return Ok(self.make(kind, start, pos));
        }

        // Single-character punctuation; composite operators are two adjacent
        // Punct tokens reassembled by the parser.
        self.bump();
        Ok(self.make(TokenKind::Punct, start, pos))
    }

    fn next_string_token(&mut self) -> Result<Token, ParseError> {
        let pos = self.position();
        let start = self.pos;

        match self.peek() {
            None => Err(ParseError::UnterminatedString { pos }),
            Some(b'"') => {
                self.bump();
                self.state = State::Root;
                Ok(self.make(TokenKind::StringEnd, start, pos))
            }
            Some(b'\\') => {
                self.bump();
                if self.bump().is_none() {
                    return Err(ParseError::UnterminatedString { pos });
                }
                Ok(self.make(TokenKind::Escaped, start, pos))
            }
            Some(_) => {
                while self.peek().is_some_and(|c| c != b'"' && c != b'\\') {
                    self.bump();
                }
                Ok(self.make(TokenKind::Chars, start, pos))
            }
        }
    }
}

/// Helper used widely by tests and the parser: lex `text` as file `name`
/// into the filtered token stream.
pub fn lex(name: &str, text: &str) -> Result<(SourceFile, Vec<Token>), ParseError> {
    let file = SourceFile::new(name, text);
    let tokens = Lexer::new(&file).tokens()?;
    Ok((file, tokens))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let file = SourceFile::new("t.si", src);
        Lexer::new(&file)
            .tokens()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    fn values(src: &str) -> Vec<String> {
        let file = SourceFile::new("t.si", src);
        Lexer::new(&file)
            .tokens()
            .unwrap()
            .into_iter()
            .map(|t| t.value)
            .collect()
    }

    #[test]
    fn simple_function_skeleton() {
        let file = SourceFile::new("main.si", "i64 main() { return 0; }");
        let toks = Lexer::new(&file).tokens().unwrap();
        let kinds: Vec<_> = toks.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::BasicType,
                TokenKind::Ident,
                TokenKind::Punct,
                TokenKind::Punct,
                TokenKind::Punct,
                TokenKind::Keyword,
                TokenKind::Number,
                TokenKind::Punct,
                TokenKind::Punct,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn composite_operators_are_two_punct_tokens() {
        let toks = values("x++ y->f a<=b");
        assert_eq!(
            toks,
            vec!["x", "+", "+", "y", "-", ">", "f", "a", "<", "=", "b", ""]
        );
    }

    #[test]
    fn line_comment_runs_to_end_of_line() {
        let k = kinds("i64 x; // trailing\ny;");
        assert!(k.contains(&TokenKind::BasicType));
        // The comment is elided entirely -- only real tokens remain.
        let vals = values("i64 x; // trailing\ny;");
        assert_eq!(vals, vec!["i64", "x", ";", "y", ";", ""]);
    }

    #[test]
    fn multi_line_comment_is_skipped() {
        let vals = values("i64 /* a\nb */ x;");
        assert_eq!(vals, vec!["i64", "x", ";", ""]);
    }

    #[test]
    fn string_literal_splits_into_start_chars_end() {
        let file = SourceFile::new("t.si", "\"ab\\ncd\"");
        let toks = Lexer::new(&file).tokens().unwrap();
        let kinds: Vec<_> = toks.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::StringStart,
                TokenKind::Chars,
                TokenKind::Escaped,
                TokenKind::Chars,
                TokenKind::StringEnd,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn char_literal_with_escape() {
        let vals = values("'\\n'");
        assert_eq!(vals, vec!["'\\n'", ""]);
    }

    #[test]
    fn null_keyword_is_distinct_token_kind() {
        assert_eq!(kinds("NULL"), vec![TokenKind::Null, TokenKind::Eof]);
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let file = SourceFile::new("t.si", "\"abc");
        assert!(Lexer::new(&file).tokens().is_err());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Any non-empty run of ASCII digits lexes to a single `Number`
        /// token whose value is exactly that run, followed only by `Eof`.
        #[test]
        fn digit_runs_lex_as_a_single_number_token(digits in "[0-9]{1,9}") {
            let file = SourceFile::new("t.si", &digits);
            let toks = Lexer::new(&file).tokens().unwrap();
            prop_assert_eq!(toks.len(), 2);
            prop_assert_eq!(toks[0].kind, TokenKind::Number);
            prop_assert_eq!(&toks[0].value, &digits);
            prop_assert_eq!(toks[1].kind, TokenKind::Eof);
        }

        /// Any identifier-shaped run (letter/underscore then word chars,
        /// avoiding reserved keywords/basic-type names and `NULL`) lexes as
        /// a single `Ident` token carrying that exact text.
        #[test]
        fn identifier_shaped_runs_lex_as_a_single_ident_token(
            name in "[a-zA-Z_][a-zA-Z0-9_]{0,8}"
        ) {
            prop_assume!(!KEYWORDS.contains(&name.as_str()));
            prop_assume!(!BASIC_TYPES.contains(&name.as_str()));
            prop_assume!(name != "NULL" && name != "true" && name != "false");
            let file = SourceFile::new("t.si", &name);
            let toks = Lexer::new(&file).tokens().unwrap();
            prop_assert_eq!(toks.len(), 2);
            prop_assert_eq!(toks[0].kind, TokenKind::Ident);
            prop_assert_eq!(&toks[0].value, &name);
        }
    }
}
