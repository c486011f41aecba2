use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Delimiter,
    Operator,
    Keyword,
    Identifier,
    Integer,
    Real,
    String,
    Whitespace,
    Newline,
    Comment,
    Error,
}

impl TokenKind {
    /// Kinds that survive into the stream the parser consumes.
    pub fn is_significant(self) -> bool {
        matches!(
            self,
            TokenKind::Delimiter
                | TokenKind::Operator
                | TokenKind::Keyword
                | TokenKind::Identifier
                | TokenKind::Integer
                | TokenKind::Real
                | TokenKind::String
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::Delimiter => "Delimiter",
            TokenKind::Operator => "Operator",
            TokenKind::Keyword => "Keyword",
            TokenKind::Identifier => "Identifier",
            TokenKind::Integer => "Integer",
            TokenKind::Real => "Real",
            TokenKind::String => "String",
            TokenKind::Whitespace => "Whitespace",
            TokenKind::Newline => "Newline",
            TokenKind::Comment => "Comment",
            TokenKind::Error => "Error",
        };
        f.pad(name)
    }
}

/// A lexical unit. `line` and `column` are 1-based and point at the first
/// character of `text` in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
    pub text: String,
}

impl Token {
    pub fn new(kind: TokenKind, line: usize, column: usize, text: impl Into<String>) -> Self {
        Self {
            kind,
            line,
            column,
            text: text.into(),
        }
    }

    pub fn is(&self, kind: TokenKind, text: &str) -> bool {
        self.kind == kind && self.text == text
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<10} line {:>3}, column {:>3}: {:?}",
            self.kind, self.line, self.column, self.text
        )
    }
}

/// Lays tokens back out at their recorded positions. Re-lexing the result of
/// an error-free stream yields the same tokens.
pub fn render_tokens(tokens: &[Token]) -> String {
    let mut out = String::new();
    let mut line = 1;
    let mut column = 1;
    for token in tokens {
        while line < token.line {
            out.push('\n');
            line += 1;
            column = 1;
        }
        // Overlapping positions only come from malformed streams; keep the
        // tokens apart so they cannot merge.
        if column > token.column && column > 1 {
            out.push(' ');
            column += 1;
        }
        while column < token.column {
            out.push(' ');
            column += 1;
        }
        out.push_str(&token.text);
        column += token.text.chars().count();
    }
    out
}
