//! Hand-coded DFA lexer over preprocessed source text.
//!
//! The automaton dispatches on the first byte of each token; every
//! multi-character operator and the numeric literal grammar run as their
//! own sub-state machines. A transition that would fail triggers
//! maximal-munch finalization: the longest accepted prefix becomes the
//! token and the cursor backtracks over the rejected extension.
//!
//! Errors are collected but the lexer keeps producing tokens so later
//! phases see a coherent stream; a malformed lexeme becomes a single
//! `Invalid` token carrying the message.

use crate::common::error::Diagnostic;
use crate::common::source::{SourceBuffer, SourceLocation};
use super::token::{Token, TokenKind};

/// States of the numeric-literal automaton. Each accepting state knows how
/// to finalize into an integer or float token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NumState {
    Zero,
    Decimal,
    Octal,
    HexStart,
    Hex,
    BinStart,
    Binary,
    FloatDot,
    Fraction,
    ExpMark,
    ExpSign,
    Exponent,
}

pub struct Lexer {
    buf: SourceBuffer,
    pos: usize,
    errors: Vec<Diagnostic>,
    peeked: Option<Token>,
}

impl Lexer {
    pub fn new(source: &str, filename: &str) -> Self {
        Self {
            buf: SourceBuffer::new(filename, source.to_string()),
            pos: 0,
            errors: Vec::new(),
            peeked: None,
        }
    }

    pub fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Produce the next token, consuming it.
    pub fn next_token(&mut self) -> Token {
        if let Some(tok) = self.peeked.take() {
            return tok;
        }
        self.scan_token()
    }

    /// Look at the next token without consuming it.
    pub fn peek_token(&mut self) -> &Token {
        if self.peeked.is_none() {
            let tok = self.scan_token();
            self.peeked = Some(tok);
        }
        self.peeked.as_ref().unwrap()
    }

    /// Tokenize the remaining input to EOF (used by the `-l` listing).
    pub fn tokenize(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token();
            let done = tok.is_eof();
            tokens.push(tok);
            if done {
                break;
            }
        }
        tokens
    }

    fn bytes(&self) -> &[u8] {
        self.buf.bytes()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes().get(self.pos + offset).copied()
    }

    fn location(&self, offset: usize) -> SourceLocation {
        self.buf.location_at(offset as u32)
    }

    fn error(&mut self, loc: SourceLocation, message: impl Into<String>) {
        self.errors.push(Diagnostic::error(message).with_location(loc));
    }

    fn make_token(&self, kind: TokenKind, start: usize) -> Token {
        let text = String::from_utf8_lossy(&self.bytes()[start..self.pos]).into_owned();
        Token::new(kind, text, self.location(start))
    }

    fn invalid_token(&mut self, start: usize, message: &str) -> Token {
        let loc = self.location(start);
        self.error(loc, message);
        self.make_token(TokenKind::Invalid(message.to_string()), start)
    }

    fn scan_token(&mut self) -> Token {
        self.skip_whitespace_and_comments();

        let start = self.pos;
        let ch = match self.peek_at(0) {
            Some(c) => c,
            None => return Token::new(TokenKind::Eof, String::new(), self.location(start)),
        };

        if ch == b'_' || ch.is_ascii_alphabetic() {
            return self.lex_identifier(start);
        }
        if ch.is_ascii_digit()
            || (ch == b'.' && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()))
        {
            return self.lex_number(start);
        }
        if ch == b'"' {
            return self.lex_string(start);
        }
        if ch == b'\'' {
            return self.lex_char(start);
        }
        self.lex_punctuation(start)
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while self.peek_at(0).is_some_and(|c| c.is_ascii_whitespace()) {
                self.pos += 1;
            }
            match (self.peek_at(0), self.peek_at(1)) {
                (Some(b'/'), Some(b'/')) => {
                    while self.peek_at(0).is_some_and(|c| c != b'\n') {
                        self.pos += 1;
                    }
                }
                (Some(b'/'), Some(b'*')) => {
                    let start = self.pos;
                    self.pos += 2;
                    let mut closed = false;
                    while let Some(c) = self.peek_at(0) {
                        if c == b'*' && self.peek_at(1) == Some(b'/') {
                            self.pos += 2;
                            closed = true;
                            break;
                        }
                        self.pos += 1;
                    }
                    if !closed {
                        let loc = self.location(start);
                        self.error(loc, "unterminated block comment");
                    }
                }
                _ => return,
            }
        }
    }

    fn lex_identifier(&mut self, start: usize) -> Token {
        while self
            .peek_at(0)
            .is_some_and(|c| c == b'_' || c.is_ascii_alphanumeric())
        {
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.bytes()[start..self.pos])
            .unwrap_or("")
            .to_string();
        let kind = TokenKind::from_keyword(&text)
            .unwrap_or_else(|| TokenKind::Identifier(text.clone()));
        Token::new(kind, text, self.location(start))
    }

    /// Numeric literal automaton. Decimal, octal, hex, and binary integers
    /// share the entry; `.` or an exponent marker promotes to float.
    fn lex_number(&mut self, start: usize) -> Token {
        let mut state = if self.peek_at(0) == Some(b'.') {
            self.pos += 1;
            NumState::FloatDot
        } else if self.peek_at(0) == Some(b'0') {
            self.pos += 1;
            NumState::Zero
        } else {
            self.pos += 1;
            NumState::Decimal
        };

        // Whether the literal was already a float when the exponent
        // marker was consumed; decides where a failed exponent backs to.
        let mut float_before_exp = false;

        loop {
            let c = self.peek_at(0);
            let next = match (state, c) {
                (NumState::Zero, Some(b'x' | b'X')) => Some(NumState::HexStart),
                (NumState::Zero, Some(b'b' | b'B')) => Some(NumState::BinStart),
                (NumState::Zero, Some(b'0'..=b'7')) => Some(NumState::Octal),
                // 09 is not octal; promote only if it turns out to be a float.
                (NumState::Zero, Some(b'8' | b'9')) => Some(NumState::Decimal),
                (NumState::Zero | NumState::Decimal, Some(d)) if d.is_ascii_digit() => {
                    Some(NumState::Decimal)
                }
                (NumState::Octal, Some(b'0'..=b'7')) => Some(NumState::Octal),
                // Octal digits followed by 8/9 can only be a decimal float prefix.
                (NumState::Octal, Some(b'8' | b'9')) => Some(NumState::Decimal),
                (NumState::HexStart | NumState::Hex, Some(d)) if d.is_ascii_hexdigit() => {
                    Some(NumState::Hex)
                }
                (NumState::BinStart | NumState::Binary, Some(b'0' | b'1')) => {
                    Some(NumState::Binary)
                }
                (NumState::Zero | NumState::Decimal | NumState::Octal, Some(b'.')) => {
                    Some(NumState::Fraction)
                }
                (NumState::Zero | NumState::Decimal | NumState::Octal, Some(b'e' | b'E')) => {
                    Some(NumState::ExpMark)
                }
                (NumState::FloatDot | NumState::Fraction, Some(d)) if d.is_ascii_digit() => {
                    Some(NumState::Fraction)
                }
                (NumState::FloatDot | NumState::Fraction, Some(b'e' | b'E')) => {
                    Some(NumState::ExpMark)
                }
                (NumState::ExpMark, Some(b'+' | b'-')) => Some(NumState::ExpSign),
                (NumState::ExpMark | NumState::ExpSign | NumState::Exponent, Some(d))
                    if d.is_ascii_digit() =>
                {
                    Some(NumState::Exponent)
                }
                _ => None,
            };
            match next {
                Some(s) => {
                    if s == NumState::ExpMark {
                        float_before_exp =
                            matches!(state, NumState::FloatDot | NumState::Fraction);
                    }
                    state = s;
                    self.pos += 1;
                }
                None => break,
            }
        }

        // Maximal-munch finalization: reject dangling prefixes.
        match state {
            NumState::HexStart => return self.invalid_token(start, "hexadecimal literal has no digits"),
            NumState::BinStart => return self.invalid_token(start, "binary literal has no digits"),
            NumState::ExpMark | NumState::ExpSign => {
                // Back out the consumed 'e'/'E' (and sign): `1e` lexes as
                // the integer 1 followed by an identifier, `1.5e` as the
                // float 1.5 followed by an identifier.
                self.pos -= if state == NumState::ExpSign { 2 } else { 1 };
                state = if float_before_exp {
                    NumState::Fraction
                } else {
                    NumState::Decimal
                };
            }
            _ => {}
        }

        let text_end = self.pos;
        let digits = std::str::from_utf8(&self.bytes()[start..text_end]).unwrap_or("0");

        let is_float = matches!(
            state,
            NumState::FloatDot | NumState::Fraction | NumState::Exponent
        );
        if is_float {
            let value: f64 = digits.parse().unwrap_or(0.0);
            // Float suffixes: f, F, l, L (value kept as f64 either way).
            if matches!(self.peek_at(0), Some(b'f' | b'F' | b'l' | b'L')) {
                self.pos += 1;
            }
            return self.make_token(TokenKind::FloatLiteral(value), start);
        }

        let (digits, radix) = match state {
            NumState::Hex => (&digits[2..], 16),
            NumState::Binary => (&digits[2..], 2),
            NumState::Octal => (&digits[1..], 8),
            _ => (digits, 10),
        };
        let value = u64::from_str_radix(digits, radix).unwrap_or(0) as i64;
        self.consume_int_suffix();
        self.make_token(TokenKind::IntLiteral(value), start)
    }

    /// Integer suffix grammar: `[uU]? [lL]{0,2}` in either order.
    /// Each intermediate state is accepting, so any prefix terminates.
    fn consume_int_suffix(&mut self) {
        match self.peek_at(0) {
            Some(b'u' | b'U') => {
                self.pos += 1;
                if let Some(l @ (b'l' | b'L')) = self.peek_at(0) {
                    self.pos += 1;
                    if self.peek_at(0) == Some(l) {
                        self.pos += 1;
                    }
                }
            }
            Some(l @ (b'l' | b'L')) => {
                self.pos += 1;
                if self.peek_at(0) == Some(l) {
                    self.pos += 1;
                }
                if matches!(self.peek_at(0), Some(b'u' | b'U')) {
                    self.pos += 1;
                }
            }
            _ => {}
        }
    }

    /// Decode one escape sequence after the backslash has been consumed.
    /// Returns the decoded byte, advancing past the sequence.
    fn decode_escape(&mut self) -> Option<u8> {
        let c = self.peek_at(0)?;
        self.pos += 1;
        Some(match c {
            b'n' => b'\n',
            b't' => b'\t',
            b'r' => b'\r',
            b'\\' => b'\\',
            b'\'' => b'\'',
            b'"' => b'"',
            b'a' => 0x07,
            b'b' => 0x08,
            b'f' => 0x0c,
            b'v' => 0x0b,
            b'?' => b'?',
            b'0'..=b'7' => {
                // Up to three octal digits, first already consumed.
                let mut value = (c - b'0') as u32;
                for _ in 0..2 {
                    match self.peek_at(0) {
                        Some(d @ b'0'..=b'7') => {
                            value = value * 8 + (d - b'0') as u32;
                            self.pos += 1;
                        }
                        _ => break,
                    }
                }
                value as u8
            }
            b'x' => {
                // Up to two hex digits.
                let mut value = 0u32;
                let mut any = false;
                for _ in 0..2 {
                    match self.peek_at(0) {
                        Some(d) if d.is_ascii_hexdigit() => {
                            value = value * 16 + (d as char).to_digit(16).unwrap();
                            self.pos += 1;
                            any = true;
                        }
                        _ => break,
                    }
                }
                if !any {
                    return None;
                }
                value as u8
            }
            _ => return None,
        })
    }

    fn lex_char(&mut self, start: usize) -> Token {
        self.pos += 1; // opening quote
        let value = match self.peek_at(0) {
            None | Some(b'\n') => return self.invalid_token(start, "unterminated character literal"),
            Some(b'\'') => {
                self.pos += 1;
                return self.invalid_token(start, "empty character literal");
            }
            Some(b'\\') => {
                self.pos += 1;
                match self.decode_escape() {
                    Some(v) => v,
                    None => return self.invalid_token(start, "invalid escape sequence in character literal"),
                }
            }
            Some(c) => {
                self.pos += 1;
                c
            }
        };
        if self.peek_at(0) != Some(b'\'') {
            return self.invalid_token(start, "unterminated character literal");
        }
        self.pos += 1; // closing quote
        self.make_token(TokenKind::CharLiteral(value as char), start)
    }

    fn lex_string(&mut self, start: usize) -> Token {
        self.pos += 1; // opening quote
        let mut value = String::new();
        loop {
            match self.peek_at(0) {
                None | Some(b'\n') => {
                    return self.invalid_token(start, "unterminated string literal");
                }
                Some(b'"') => {
                    self.pos += 1;
                    break;
                }
                Some(b'\\') => {
                    self.pos += 1;
                    match self.decode_escape() {
                        Some(v) => value.push(v as char),
                        None => {
                            return self.invalid_token(start, "invalid escape sequence in string literal");
                        }
                    }
                }
                Some(c) => {
                    self.pos += 1;
                    value.push(c as char);
                }
            }
        }
        self.make_token(TokenKind::StringLiteral(value), start)
    }

    /// Operator and punctuation fan-outs. Each starting character owns a
    /// sub-state; unmatched extensions fall back to the shorter operator.
    fn lex_punctuation(&mut self, start: usize) -> Token {
        let c = self.bytes()[self.pos];
        self.pos += 1;
        let one = self.peek_at(0);
        let two = self.peek_at(1);
        let kind = match c {
            b'(' => TokenKind::LParen,
            b')' => TokenKind::RParen,
            b'{' => TokenKind::LBrace,
            b'}' => TokenKind::RBrace,
            b'[' => TokenKind::LBracket,
            b']' => TokenKind::RBracket,
            b';' => TokenKind::Semicolon,
            b',' => TokenKind::Comma,
            b'?' => TokenKind::Question,
            b':' => TokenKind::Colon,
            b'~' => TokenKind::Tilde,
            b'.' => {
                if one == Some(b'.') && two == Some(b'.') {
                    self.pos += 2;
                    TokenKind::Ellipsis
                } else {
                    TokenKind::Dot
                }
            }
            b'+' => match one {
                Some(b'+') => { self.pos += 1; TokenKind::PlusPlus }
                Some(b'=') => { self.pos += 1; TokenKind::PlusAssign }
                _ => TokenKind::Plus,
            },
            b'-' => match one {
                Some(b'-') => { self.pos += 1; TokenKind::MinusMinus }
                Some(b'=') => { self.pos += 1; TokenKind::MinusAssign }
                Some(b'>') => { self.pos += 1; TokenKind::Arrow }
                _ => TokenKind::Minus,
            },
            b'*' => match one {
                Some(b'=') => { self.pos += 1; TokenKind::StarAssign }
                _ => TokenKind::Star,
            },
            b'/' => match one {
                Some(b'=') => { self.pos += 1; TokenKind::SlashAssign }
                _ => TokenKind::Slash,
            },
            b'%' => match one {
                Some(b'=') => { self.pos += 1; TokenKind::PercentAssign }
                _ => TokenKind::Percent,
            },
            b'&' => match one {
                Some(b'&') => { self.pos += 1; TokenKind::AmpAmp }
                Some(b'=') => { self.pos += 1; TokenKind::AmpAssign }
                _ => TokenKind::Amp,
            },
            b'|' => match one {
                Some(b'|') => { self.pos += 1; TokenKind::PipePipe }
                Some(b'=') => { self.pos += 1; TokenKind::PipeAssign }
                _ => TokenKind::Pipe,
            },
            b'^' => match one {
                Some(b'=') => { self.pos += 1; TokenKind::CaretAssign }
                _ => TokenKind::Caret,
            },
            b'=' => match one {
                Some(b'=') => { self.pos += 1; TokenKind::EqualEqual }
                _ => TokenKind::Assign,
            },
            b'!' => match one {
                Some(b'=') => { self.pos += 1; TokenKind::BangEqual }
                _ => TokenKind::Bang,
            },
            b'<' => match (one, two) {
                (Some(b'<'), Some(b'=')) => { self.pos += 2; TokenKind::ShiftLeftAssign }
                (Some(b'<'), _) => { self.pos += 1; TokenKind::ShiftLeft }
                (Some(b'='), _) => { self.pos += 1; TokenKind::LessEqual }
                _ => TokenKind::Less,
            },
            b'>' => match (one, two) {
                (Some(b'>'), Some(b'=')) => { self.pos += 2; TokenKind::ShiftRightAssign }
                (Some(b'>'), _) => { self.pos += 1; TokenKind::ShiftRight }
                (Some(b'='), _) => { self.pos += 1; TokenKind::GreaterEqual }
                _ => TokenKind::Greater,
            },
            b'#' => match one {
                Some(b'#') => { self.pos += 1; TokenKind::HashHash }
                _ => TokenKind::Hash,
            },
            other => {
                let msg = format!("unexpected character '{}'", other as char);
                let loc = self.location(start);
                self.error(loc, msg.clone());
                TokenKind::Invalid(msg)
            }
        };
        self.make_token(kind, start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(src, "test.cdd");
        lexer
            .tokenize()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    fn single(src: &str) -> TokenKind {
        let mut ks = kinds(src);
        assert!(matches!(ks.pop(), Some(TokenKind::Eof)));
        assert_eq!(ks.len(), 1, "expected one token for {:?}, got {:?}", src, ks);
        ks.pop().unwrap()
    }

    #[test]
    fn integer_literals_decode() {
        let cases: &[(&str, i64)] = &[
            ("0", 0),
            ("1", 1),
            ("42", 42),
            ("0x7f", 0x7f),
            ("075", 0o75),
            ("0b101", 0b101),
            ("2147483647", 2147483647),
            ("0xdeadbeef", 0xdeadbeef),
            ("123ull", 123),
        ];
        for &(src, expected) in cases {
            assert_eq!(single(src), TokenKind::IntLiteral(expected), "source {:?}", src);
        }
    }

    #[test]
    fn float_literals_decode() {
        let cases: &[(&str, f64)] = &[
            ("0.0", 0.0),
            (".5", 0.5),
            ("5.", 5.0),
            ("1e10", 1e10),
            ("2.5e-3", 2.5e-3),
            ("1.5f", 1.5),
        ];
        for &(src, expected) in cases {
            match single(src) {
                TokenKind::FloatLiteral(v) => {
                    assert!((v - expected).abs() <= f64::EPSILON * expected.abs(), "source {:?}", src);
                }
                other => panic!("expected float for {:?}, got {:?}", src, other),
            }
        }
    }

    #[test]
    fn suffix_orders_accepted() {
        for src in ["1u", "1U", "1l", "1ll", "1ul", "1llu", "1lu", "1ULL"] {
            assert_eq!(single(src), TokenKind::IntLiteral(1), "source {:?}", src);
        }
    }

    #[test]
    fn operators_use_maximal_munch() {
        assert_eq!(
            kinds("a+++b"),
            vec![
                TokenKind::Identifier("a".into()),
                TokenKind::PlusPlus,
                TokenKind::Plus,
                TokenKind::Identifier("b".into()),
                TokenKind::Eof,
            ]
        );
        assert_eq!(single("<<="), TokenKind::ShiftLeftAssign);
        assert_eq!(single(">>="), TokenKind::ShiftRightAssign);
        assert_eq!(single("..."), TokenKind::Ellipsis);
        assert_eq!(
            kinds(".."),
            vec![TokenKind::Dot, TokenKind::Dot, TokenKind::Eof]
        );
    }

    #[test]
    fn dangling_exponent_backtracks() {
        assert_eq!(
            kinds("1e"),
            vec![
                TokenKind::IntLiteral(1),
                TokenKind::Identifier("e".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn char_escapes_decode() {
        assert_eq!(single("'\\n'"), TokenKind::CharLiteral('\n'));
        assert_eq!(single("'\\0'"), TokenKind::CharLiteral('\0'));
        assert_eq!(single("'\\x41'"), TokenKind::CharLiteral('A'));
        assert_eq!(single("'\\101'"), TokenKind::CharLiteral('A'));
        assert_eq!(single("'q'"), TokenKind::CharLiteral('q'));
    }

    #[test]
    fn string_escapes_decode() {
        assert_eq!(
            single("\"a\\tb\\\"c\""),
            TokenKind::StringLiteral("a\tb\"c".into())
        );
    }

    #[test]
    fn keywords_after_identifier_completion() {
        assert_eq!(single("while"), TokenKind::While);
        assert_eq!(single("whiles"), TokenKind::Identifier("whiles".into()));
    }

    #[test]
    fn unterminated_block_comment_is_error() {
        let mut lexer = Lexer::new("int /* never closed", "t.cdd");
        let tokens = lexer.tokenize();
        assert!(lexer.has_errors());
        assert_eq!(tokens.first().map(|t| t.kind.clone()), Some(TokenKind::Int));
    }

    #[test]
    fn invalid_lexeme_keeps_stream_coherent() {
        let ks = kinds("int @ x");
        assert_eq!(ks.len(), 4);
        assert!(matches!(ks[1], TokenKind::Invalid(_)));
        assert_eq!(ks[2], TokenKind::Identifier("x".into()));
    }

    #[test]
    fn peek_does_not_consume() {
        let mut lexer = Lexer::new("a b", "t.cdd");
        assert!(matches!(lexer.peek_token().kind, TokenKind::Identifier(_)));
        let first = lexer.next_token();
        assert_eq!(first.text, "a");
        let second = lexer.next_token();
        assert_eq!(second.text, "b");
    }

    #[test]
    fn locations_are_line_and_column_accurate() {
        let mut lexer = Lexer::new("int x;\n  return", "t.cdd");
        let toks = lexer.tokenize();
        assert_eq!((toks[0].loc.line, toks[0].loc.column), (1, 1));
        assert_eq!((toks[1].loc.line, toks[1].loc.column), (1, 5));
        assert_eq!((toks[3].loc.line, toks[3].loc.column), (2, 3));
    }
}
