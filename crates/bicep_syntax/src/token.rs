use serde::Serialize;

use crate::span::TextSpan;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TokenKind {
    Unrecognized,
    At,
    LeftBrace,
    RightBrace,
    LeftParen,
    RightParen,
    LeftSquare,
    RightSquare,
    Comma,
    Dot,
    Question,
    Colon,
    Semicolon,
    Assignment,
    Plus,
    Minus,
    Asterisk,
    Slash,
    Modulo,
    Exclamation,
    LessThan,
    GreaterThan,
    LessThanOrEqual,
    GreaterThanOrEqual,
    Equals,
    NotEquals,
    EqualsInsensitive,
    NotEqualsInsensitive,
    LogicalAnd,
    LogicalOr,
    Identifier,
    StringLeftPiece,
    StringMiddlePiece,
    StringRightPiece,
    StringComplete,
    MultilineString,
    Integer,
    TrueKeyword,
    FalseKeyword,
    NullKeyword,
    NewLine,
    EndOfFile,
    DoubleQuestion,
    DoubleColon,
    Arrow,
    Pipe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TriviaKind {
    Whitespace,
    SingleLineComment,
    MultiLineComment,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Trivia {
    pub kind: TriviaKind,
    pub text: String,
    pub span: TextSpan,
}

/// A token plus the whitespace and comments around it. The span covers only
/// `text`; trivia is kept so the source can be rebuilt byte for byte.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub span: TextSpan,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub leading_trivia: Vec<Trivia>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub trailing_trivia: Vec<Trivia>,
}

impl Token {
    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Identifier && self.text == keyword
    }

    /// Span including leading and trailing trivia.
    pub fn full_span(&self) -> TextSpan {
        let start = self
            .leading_trivia
            .first()
            .map_or(self.span.start, |trivia| trivia.span.start);
        let end = self
            .trailing_trivia
            .last()
            .map_or(self.span.end(), |trivia| trivia.span.end());
        TextSpan::new(start, end - start)
    }

    pub fn write_full_text(&self, out: &mut String) {
        for trivia in &self.leading_trivia {
            out.push_str(&trivia.text);
        }
        out.push_str(&self.text);
        for trivia in &self.trailing_trivia {
            out.push_str(&trivia.text);
        }
    }
}
