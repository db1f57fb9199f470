use crate::diagnostics::{Diagnostic, DiagnosticSource, LexError};
use crate::span::TextSpan;
use crate::token::{Token, TokenKind, Trivia, TriviaKind};

pub fn lex(text: &str) -> (Vec<Token>, Vec<Diagnostic>) {
    let mut lexer = Lexer {
        text,
        pos: 0,
        template_depths: Vec::new(),
        diagnostics: Vec::new(),
    };
    let mut tokens = Vec::new();
    loop {
        let leading_trivia = lexer.scan_trivia();
        let start = lexer.pos;
        let kind = lexer.scan_token();
        let span = TextSpan::new(start, lexer.pos - start);
        let trailing_trivia = match kind {
            TokenKind::NewLine | TokenKind::EndOfFile => Vec::new(),
            _ => lexer.scan_trivia(),
        };
        tokens.push(Token {
            kind,
            text: text[span.start..span.end()].to_string(),
            span,
            leading_trivia,
            trailing_trivia,
        });
        if kind == TokenKind::EndOfFile {
            break;
        }
    }
    (tokens, lexer.diagnostics)
}

struct Lexer<'a> {
    text: &'a str,
    pos: usize,
    // One entry per open interpolation hole: the brace depth inside that hole.
    template_depths: Vec<usize>,
    diagnostics: Vec<Diagnostic>,
}

impl Lexer<'_> {
    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.text[self.pos..].chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn error(&mut self, error: LexError, start: usize) {
        let span = TextSpan::new(start, self.pos - start);
        self.diagnostics.push(error.at(span));
    }

    fn scan_trivia(&mut self) -> Vec<Trivia> {
        let mut trivia = Vec::new();
        loop {
            let start = self.pos;
            let kind = match (self.peek(), self.peek_nth(1)) {
                (Some(' ' | '\t'), _) => {
                    while matches!(self.peek(), Some(' ' | '\t')) {
                        self.bump();
                    }
                    TriviaKind::Whitespace
                }
                (Some('/'), Some('/')) => {
                    while !matches!(self.peek(), None | Some('\n' | '\r')) {
                        self.bump();
                    }
                    TriviaKind::SingleLineComment
                }
                (Some('/'), Some('*')) => {
                    self.pos += 2;
                    match self.text[self.pos..].find("*/") {
                        Some(offset) => self.pos += offset + 2,
                        None => {
                            self.pos = self.text.len();
                            self.error(LexError::UnterminatedMultilineComment, start);
                        }
                    }
                    TriviaKind::MultiLineComment
                }
                _ => return trivia,
            };
            trivia.push(Trivia {
                kind,
                text: self.text[start..self.pos].to_string(),
                span: TextSpan::new(start, self.pos - start),
            });
        }
    }

    fn scan_token(&mut self) -> TokenKind {
        let start = self.pos;
        let Some(ch) = self.bump() else {
            return TokenKind::EndOfFile;
        };
        match ch {
            '\n' => {
                self.template_depths.clear();
                TokenKind::NewLine
            }
            '\r' => {
                self.eat('\n');
                self.template_depths.clear();
                TokenKind::NewLine
            }
            '{' => {
                if let Some(depth) = self.template_depths.last_mut() {
                    *depth += 1;
                }
                TokenKind::LeftBrace
            }
            '}' => match self.template_depths.last_mut() {
                Some(0) => {
                    self.template_depths.pop();
                    self.scan_string_body(start, true)
                }
                Some(depth) => {
                    *depth -= 1;
                    TokenKind::RightBrace
                }
                None => TokenKind::RightBrace,
            },
            '(' => TokenKind::LeftParen,
            ')' => TokenKind::RightParen,
            '[' => TokenKind::LeftSquare,
            ']' => TokenKind::RightSquare,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            '@' => TokenKind::At,
            '.' => TokenKind::Dot,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Asterisk,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Modulo,
            '?' if self.eat('?') => TokenKind::DoubleQuestion,
            '?' => TokenKind::Question,
            ':' if self.eat(':') => TokenKind::DoubleColon,
            ':' => TokenKind::Colon,
            '=' if self.eat('=') => TokenKind::Equals,
            '=' if self.eat('~') => TokenKind::EqualsInsensitive,
            '=' if self.eat('>') => TokenKind::Arrow,
            '=' => TokenKind::Assignment,
            '!' if self.eat('=') => TokenKind::NotEquals,
            '!' if self.eat('~') => TokenKind::NotEqualsInsensitive,
            '!' => TokenKind::Exclamation,
            '<' if self.eat('=') => TokenKind::LessThanOrEqual,
            '<' => TokenKind::LessThan,
            '>' if self.eat('=') => TokenKind::GreaterThanOrEqual,
            '>' => TokenKind::GreaterThan,
            '&' if self.eat('&') => TokenKind::LogicalAnd,
            '|' if self.eat('|') => TokenKind::LogicalOr,
            '|' => TokenKind::Pipe,
            '\'' if self.text[self.pos..].starts_with("''") => {
                self.pos += 2;
                self.scan_multiline_string(start)
            }
            '\'' => self.scan_string_body(start, false),
            ch if ch.is_ascii_digit() => {
                while matches!(self.peek(), Some(ch) if ch.is_ascii_digit()) {
                    self.bump();
                }
                TokenKind::Integer
            }
            ch if is_identifier_start(ch) => {
                while matches!(self.peek(), Some(ch) if is_identifier_continue(ch)) {
                    self.bump();
                }
                match &self.text[start..self.pos] {
                    "true" => TokenKind::TrueKeyword,
                    "false" => TokenKind::FalseKeyword,
                    "null" => TokenKind::NullKeyword,
                    _ => TokenKind::Identifier,
                }
            }
            _ => {
                let text = self.text[start..self.pos].to_string();
                self.error(LexError::UnrecognizedToken(text), start);
                TokenKind::Unrecognized
            }
        }
    }

    /// Scans string text after an opening `'` or a hole-closing `}`.
    fn scan_string_body(&mut self, start: usize, continuation: bool) -> TokenKind {
        let (complete, open_hole) = if continuation {
            (TokenKind::StringRightPiece, TokenKind::StringMiddlePiece)
        } else {
            (TokenKind::StringComplete, TokenKind::StringLeftPiece)
        };
        loop {
            match self.peek() {
                None | Some('\n' | '\r') => {
                    self.error(LexError::UnterminatedString, start);
                    return complete;
                }
                Some('\'') => {
                    self.bump();
                    return complete;
                }
                Some('$') if self.peek_nth(1) == Some('{') => {
                    self.pos += 2;
                    self.template_depths.push(0);
                    return open_hole;
                }
                Some('\\') => self.scan_escape(),
                Some(_) => {
                    self.bump();
                }
            }
        }
    }

    fn scan_escape(&mut self) {
        let start = self.pos;
        self.bump();
        match self.peek() {
            // Left for the caller to report as an unterminated string.
            None | Some('\n' | '\r') => {}
            Some('\\' | '\'' | 'n' | 'r' | 't' | '$') => {
                self.bump();
            }
            Some('u') => {
                self.bump();
                let rest = &self.text[self.pos..];
                match parse_unicode_escape(rest) {
                    Some((_, consumed)) => self.pos += consumed,
                    None => {
                        if rest.starts_with('{') {
                            let len = rest
                                .find(['}', '\'', '\n', '\r'])
                                .map_or(rest.len(), |end| {
                                    if rest[end..].starts_with('}') {
                                        end + 1
                                    } else {
                                        end
                                    }
                                });
                            self.pos += len;
                        }
                        let text = self.text[start..self.pos].to_string();
                        self.error(LexError::UnrecognizedEscapeSequence(text), start);
                    }
                }
            }
            Some(_) => {
                self.bump();
                let text = self.text[start..self.pos].to_string();
                self.error(LexError::UnrecognizedEscapeSequence(text), start);
            }
        }
    }

    fn scan_multiline_string(&mut self, start: usize) -> TokenKind {
        match self.text[self.pos..].find("'''") {
            Some(offset) => {
                self.pos += offset + 3;
                // `''''` closes with the last three quotes.
                while self.peek() == Some('\'') {
                    self.bump();
                }
            }
            None => {
                self.pos = self.text.len();
                self.error(LexError::UnterminatedMultilineString, start);
            }
        }
        TokenKind::MultilineString
    }
}

fn is_identifier_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_'
}

fn is_identifier_continue(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

/// Parses `{hex}` after `\u`, returning the char and the bytes consumed.
fn parse_unicode_escape(rest: &str) -> Option<(char, usize)> {
    let body = rest.strip_prefix('{')?;
    let end = body.find('}')?;
    let digits = &body[..end];
    if digits.is_empty() || digits.len() > 6 || !digits.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return None;
    }
    let value = u32::from_str_radix(digits, 16).ok()?;
    let ch = char::from_u32(value)?;
    Some((ch, end + 2))
}

/// Decodes the escape sequences of one string segment. Fails on an
/// unescaped quote, an unescaped hole opener or an invalid escape.
fn decode_segment(body: &str) -> Option<String> {
    let mut value = String::with_capacity(body.len());
    let mut chars = body.char_indices();
    while let Some((index, ch)) = chars.next() {
        match ch {
            '\'' => return None,
            '$' if body[index + 1..].starts_with('{') => return None,
            '\\' => {
                let (_, escaped) = chars.next()?;
                match escaped {
                    '\\' => value.push('\\'),
                    '\'' => value.push('\''),
                    'n' => value.push('\n'),
                    'r' => value.push('\r'),
                    't' => value.push('\t'),
                    '$' => value.push('$'),
                    'u' => {
                        let offset = index + 2;
                        let (decoded, consumed) = parse_unicode_escape(&body[offset..])?;
                        value.push(decoded);
                        for _ in 0..body[offset..offset + consumed].chars().count() {
                            chars.next();
                        }
                    }
                    _ => return None,
                }
            }
            _ => value.push(ch),
        }
    }
    Some(value)
}

/// Decoded literal text of each piece of a (possibly interpolated) string.
/// Returns `None` when any piece is unterminated or malformed.
pub fn try_get_raw_string_segments(tokens: &[Token]) -> Option<Vec<String>> {
    let mut segments = Vec::with_capacity(tokens.len());
    for token in tokens {
        let text = token.text.as_str();
        let body = match token.kind {
            TokenKind::StringComplete => text.strip_prefix('\'')?.strip_suffix('\'')?,
            TokenKind::StringLeftPiece => text.strip_prefix('\'')?.strip_suffix("${")?,
            TokenKind::StringMiddlePiece => text.strip_prefix('}')?.strip_suffix("${")?,
            TokenKind::StringRightPiece => text.strip_prefix('}')?.strip_suffix('\'')?,
            _ => return None,
        };
        segments.push(decode_segment(body)?);
    }
    Some(segments)
}

pub fn try_get_multiline_string_value(token: &Token) -> Option<String> {
    if token.kind != TokenKind::MultilineString || token.text.len() < 6 {
        return None;
    }
    let body = token.text.strip_prefix("'''")?.strip_suffix("'''")?;
    let body = body
        .strip_prefix("\r\n")
        .or_else(|| body.strip_prefix('\n'))
        .unwrap_or(body);
    Some(body.to_string())
}
