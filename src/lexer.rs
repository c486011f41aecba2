use crate::error::{Diagnostics, Stage};
use crate::token::{Token, TokenKind};

const KEYWORDS: [&str; 12] = [
    "if", "else", "while", "for", "read", "write", "int", "real", "bool", "string", "true",
    "false",
];

// Scanner conventions:
// `look_ahead` returns the character under the cursor without moving it;
// `advance` moves past it. A state that leaves the cursor in place makes the
// next iteration re-read the same character in the state it returns.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Plus,
    Minus,
    Star,
    Slash,
    Equal,
    Less,
    Greater,
    Word { begin: usize },
    Number { begin: usize },
    Text { begin: usize },
}

#[derive(Debug, Clone)]
pub struct LexOutput {
    /// Tokens handed to the parser.
    pub tokens: Vec<Token>,
    /// Every token, including whitespace, comments and erroneous spans.
    pub display_tokens: Vec<Token>,
    pub diagnostics: Diagnostics,
}

pub fn scan(source: &str) -> LexOutput {
    Lexer::new(source).get_tokens()
}

pub struct Lexer<'src> {
    lines: Vec<&'src str>,
    chars: Vec<char>,
    offset: usize,
    line: usize,
    in_block_comment: bool,
    comment_begin: usize,
    tokens: Vec<Token>,
    display_tokens: Vec<Token>,
    diagnostics: Diagnostics,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            lines: source.lines().collect(),
            chars: Vec::new(),
            offset: 0,
            line: 0,
            in_block_comment: false,
            comment_begin: 0,
            tokens: Vec::new(),
            display_tokens: Vec::new(),
            diagnostics: Diagnostics::new(Stage::Lexical),
        }
    }

    pub fn get_tokens(mut self) -> LexOutput {
        for index in 0..self.lines.len() {
            self.line = index + 1;
            let text = self.lines[index];
            if self.in_block_comment && !text.contains("*/") {
                if !text.is_empty() {
                    self.emit_display(TokenKind::Comment, 1, text);
                }
                let end = text.chars().count() + 1;
                self.emit_display(TokenKind::Newline, end, "\n");
                continue;
            }
            self.scan_line(text, index + 1);
        }
        log::debug!(
            "lexer produced {} tokens with {} errors",
            self.tokens.len(),
            self.diagnostics.count()
        );
        LexOutput {
            tokens: self.tokens,
            display_tokens: self.display_tokens,
            diagnostics: self.diagnostics,
        }
    }

    fn scan_line(&mut self, text: &str, next_line: usize) {
        self.chars = text.chars().chain(std::iter::once('\n')).collect();
        self.offset = 0;
        self.comment_begin = 0;
        let mut state = State::Idle;
        while let Some(ch) = self.look_ahead() {
            if self.in_block_comment {
                self.scan_comment(ch);
                continue;
            }
            state = match state {
                State::Idle => self.scan_idle(ch),
                State::Plus => {
                    self.emit(TokenKind::Operator, self.previous_column(), "+");
                    State::Idle
                }
                State::Minus => self.scan_minus(ch),
                State::Star => {
                    if ch == '/' {
                        let column = self.previous_column();
                        self.report(column, "operator \"*\" used incorrectly".to_string());
                        self.emit_display(TokenKind::Error, column, "*/");
                        self.advance();
                    } else {
                        self.emit(TokenKind::Operator, self.previous_column(), "*");
                    }
                    State::Idle
                }
                State::Slash => self.scan_slash(ch, next_line),
                State::Equal => self.scan_pair('=', "==", "="),
                State::Less => self.scan_pair('>', "<>", "<"),
                // `>` never pairs with a following character.
                State::Greater => {
                    self.emit(TokenKind::Operator, self.previous_column(), ">");
                    State::Idle
                }
                State::Word { begin } => {
                    if is_letter(ch) || ch.is_ascii_digit() {
                        self.advance();
                        state
                    } else {
                        self.finish_word(begin);
                        State::Idle
                    }
                }
                State::Number { begin } => self.scan_number(ch, begin),
                State::Text { begin } => match ch {
                    '"' => {
                        let text = self.lexeme(begin, self.offset);
                        self.emit(TokenKind::String, begin + 1, text);
                        self.emit(TokenKind::Delimiter, self.offset + 1, "\"");
                        self.advance();
                        State::Idle
                    }
                    '\n' => {
                        let text = self.lexeme(begin, self.offset);
                        self.report(
                            begin + 1,
                            format!("string {text} is missing a closing quote"),
                        );
                        self.emit_display(TokenKind::Error, begin + 1, text);
                        State::Idle
                    }
                    _ => {
                        self.advance();
                        state
                    }
                },
            };
        }
    }

    fn scan_idle(&mut self, ch: char) -> State {
        let column = self.offset + 1;
        let begin = self.offset;
        self.advance();
        match ch {
            '(' | ')' | ';' | '{' | '}' | '[' | ']' | ',' => {
                self.emit(TokenKind::Delimiter, column, ch.to_string());
                State::Idle
            }
            '+' => State::Plus,
            '-' => State::Minus,
            '*' => State::Star,
            '/' => State::Slash,
            '=' => State::Equal,
            '<' => State::Less,
            '>' => State::Greater,
            '"' => {
                self.emit(TokenKind::Delimiter, column, "\"");
                State::Text { begin: self.offset }
            }
            ch if is_letter(ch) => State::Word { begin },
            ch if ch.is_ascii_digit() => State::Number { begin },
            ' ' | '\t' | '\r' => {
                self.emit_display(TokenKind::Whitespace, column, ch.to_string());
                State::Idle
            }
            '\n' => {
                self.emit_display(TokenKind::Newline, column, "\n");
                State::Idle
            }
            other => {
                self.report(column, format!("\"{other}\" is an unrecognized symbol"));
                self.emit_display(TokenKind::Error, column, other.to_string());
                State::Idle
            }
        }
    }

    fn scan_minus(&mut self, ch: char) -> State {
        let column = self.previous_column();
        if self.previous_allows_binary_minus() {
            self.emit(TokenKind::Operator, column, "-");
            State::Idle
        } else if ch == '\n' {
            self.report(column, "operator \"-\" is missing its operand".to_string());
            self.emit_display(TokenKind::Error, column, "-");
            State::Idle
        } else {
            // Fold the sign into the numeral that follows; whatever comes
            // next belongs to the literal and is validated with it.
            let begin = self.offset - 1;
            self.advance();
            State::Number { begin }
        }
    }

    fn scan_slash(&mut self, ch: char, next_line: usize) -> State {
        let column = self.previous_column();
        match ch {
            '/' => {
                self.emit_display(TokenKind::Comment, column, "//");
                let end = self.chars.len() - 1;
                let body = self.lexeme(self.offset + 1, end);
                if !body.is_empty() {
                    self.emit_display(TokenKind::Comment, column + 2, body);
                }
                self.offset = end;
            }
            '*' => {
                self.emit_display(TokenKind::Comment, column, "/*");
                self.advance();
                self.in_block_comment = true;
                self.comment_begin = self.offset;
                if !self.block_comment_closes(next_line) {
                    self.report(column, "block comment is not closed".to_string());
                }
            }
            _ => self.emit(TokenKind::Operator, column, "/"),
        }
        State::Idle
    }

    fn scan_pair(&mut self, second: char, paired: &str, single: &str) -> State {
        let column = self.previous_column();
        if self.look_ahead() == Some(second) {
            self.emit(TokenKind::Operator, column, paired);
            self.advance();
        } else {
            self.emit(TokenKind::Operator, column, single);
        }
        State::Idle
    }

    fn scan_number(&mut self, ch: char, begin: usize) -> State {
        if ch.is_ascii_digit() || ch == '.' {
            self.advance();
            return State::Number { begin };
        }
        if is_letter(ch) {
            self.report(begin + 1, "malformed number or identifier".to_string());
            let stop = self.next_separator(self.offset);
            let text = self.lexeme(begin, stop);
            self.emit_display(TokenKind::Error, begin + 1, text);
            self.offset = stop;
            return State::Idle;
        }
        // The terminating character is scanned again from idle, so stray
        // symbols right after a numeral are still reported.
        self.finish_number(begin);
        State::Idle
    }

    fn scan_comment(&mut self, ch: char) {
        match ch {
            '*' if self.chars.get(self.offset + 1) == Some(&'/') => {
                let body = self.lexeme(self.comment_begin, self.offset);
                if !body.is_empty() {
                    self.emit_display(TokenKind::Comment, self.comment_begin + 1, body);
                }
                self.emit_display(TokenKind::Comment, self.offset + 1, "*/");
                self.offset += 2;
                self.in_block_comment = false;
            }
            '\n' => {
                let body = self.lexeme(self.comment_begin, self.offset);
                if !body.is_empty() {
                    self.emit_display(TokenKind::Comment, self.comment_begin + 1, body);
                }
                self.emit_display(TokenKind::Newline, self.offset + 1, "\n");
                self.advance();
            }
            _ => self.advance(),
        }
    }

    fn finish_word(&mut self, begin: usize) {
        let word = self.lexeme(begin, self.offset);
        if KEYWORDS.contains(&word.as_str()) {
            self.emit(TokenKind::Keyword, begin + 1, word);
        } else if is_valid_identifier(&word) {
            self.emit(TokenKind::Identifier, begin + 1, word);
        } else {
            self.report(begin + 1, format!("{word} is an illegal identifier"));
            self.emit_display(TokenKind::Error, begin + 1, word);
        }
    }

    fn finish_number(&mut self, begin: usize) {
        let numeral = self.lexeme(begin, self.offset);
        let (kind, valid, noun) = if numeral.contains('.') {
            (TokenKind::Real, match_real(&numeral), "real")
        } else {
            (TokenKind::Integer, match_integer(&numeral), "integer")
        };
        if valid {
            self.emit(kind, begin + 1, numeral);
        } else {
            self.report(begin + 1, format!("{numeral} is an illegal {noun}"));
            self.emit_display(TokenKind::Error, begin + 1, numeral);
        }
    }

    fn block_comment_closes(&self, next_line: usize) -> bool {
        let end = self.chars.len() - 1;
        self.lexeme(self.offset, end).contains("*/")
            || self.lines[next_line..]
                .iter()
                .any(|line| line.contains("*/"))
    }

    fn previous_allows_binary_minus(&self) -> bool {
        match self.tokens.last() {
            Some(token) => {
                matches!(
                    token.kind,
                    TokenKind::Integer | TokenKind::Real | TokenKind::Identifier
                ) || token.text == ")"
                    || token.text == "]"
            }
            None => false,
        }
    }

    fn emit(&mut self, kind: TokenKind, column: usize, text: impl Into<String>) {
        let token = Token::new(kind, self.line, column, text);
        if kind.is_significant() {
            self.tokens.push(token.clone());
        }
        self.display_tokens.push(token);
    }

    fn emit_display(&mut self, kind: TokenKind, column: usize, text: impl Into<String>) {
        self.display_tokens
            .push(Token::new(kind, self.line, column, text));
    }

    fn report(&mut self, column: usize, message: String) {
        self.diagnostics.error(self.line, Some(column), message);
    }

    fn lexeme(&self, begin: usize, end: usize) -> String {
        self.chars[begin.min(end)..end].iter().collect()
    }

    /// Index of the first resynchronisation point at or after `from`.
    fn next_separator(&self, from: usize) -> usize {
        (from..self.chars.len())
            .find(|&index| is_separator(self.chars[index]))
            .unwrap_or(self.chars.len() - 1)
    }

    /// 1-based column of the character just before the cursor.
    fn previous_column(&self) -> usize {
        self.offset
    }

    fn look_ahead(&self) -> Option<char> {
        self.chars.get(self.offset).copied()
    }

    fn advance(&mut self) {
        self.offset += 1
    }
}

fn is_letter(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_'
}

fn is_separator(ch: char) -> bool {
    matches!(
        ch,
        '\n' | ','
            | ' '
            | '\t'
            | '{'
            | '}'
            | '('
            | ')'
            | ';'
            | '='
            | '+'
            | '-'
            | '*'
            | '/'
            | '['
            | ']'
            | '<'
            | '>'
    )
}

fn all_digits(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit())
}

/// `[A-Za-z][A-Za-z0-9_]*`, not ending in `_`.
pub(crate) fn is_valid_identifier(word: &str) -> bool {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_') && !word.ends_with('_')
}

/// Optionally negative decimal integer without redundant leading zeros.
pub(crate) fn match_integer(text: &str) -> bool {
    let digits = text.strip_prefix('-').unwrap_or(text);
    all_digits(digits) && !(digits.len() > 1 && digits.starts_with('0'))
}

/// Optionally signed decimal with an optional fraction. A whole part made of
/// two or more zeros is rejected when a fraction follows.
pub(crate) fn match_real(text: &str) -> bool {
    let unsigned = text
        .strip_prefix(|ch: char| ch == '-' || ch == '+')
        .unwrap_or(text);
    let (whole, fraction) = match unsigned.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (unsigned, None),
    };
    if !all_digits(whole) || !fraction.map_or(true, all_digits) {
        return false;
    }
    let redundant_zeros = fraction.is_some() && whole.len() >= 2 && whole.bytes().all(|b| b == b'0');
    !redundant_zeros
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::render_tokens;

    fn significant(source: &str) -> Vec<(TokenKind, String)> {
        scan(source)
            .tokens
            .into_iter()
            .map(|token| (token.kind, token.text))
            .collect()
    }

    fn pair(kind: TokenKind, text: &str) -> (TokenKind, String) {
        (kind, text.to_string())
    }

    #[test]
    fn plain_integers_lex_to_one_token() {
        for numeral in ["0", "7", "42", "1000", "2147483647"] {
            let out = scan(numeral);
            assert!(out.diagnostics.is_empty(), "{numeral} reported errors");
            assert_eq!(out.tokens.len(), 1);
            assert_eq!(out.tokens[0].kind, TokenKind::Integer);
            assert_eq!(out.tokens[0].text, numeral);
        }
    }

    #[test]
    fn leading_zeros_are_rejected() {
        assert_eq!(scan("00").diagnostics.count(), 1);
        assert_eq!(scan("007").diagnostics.count(), 1);
        assert_eq!(scan("0").diagnostics.count(), 0);
        assert_eq!(scan("0.5").diagnostics.count(), 0);
        assert_eq!(scan("00.5").diagnostics.count(), 1);
        // Only runs of two or more zeros are guarded for reals.
        assert_eq!(scan("01.5").diagnostics.count(), 0);
        assert_eq!(scan("1.2.3").diagnostics.count(), 1);
        assert!(scan("007").tokens.is_empty());
    }

    #[test]
    fn unterminated_block_comment_reports_opening_line() {
        let out = scan("1 /* unterminated");
        assert_eq!(out.diagnostics.count(), 1);
        assert_eq!(out.diagnostics.entries()[0].line, 1);
        assert_eq!(out.tokens, vec![Token::new(TokenKind::Integer, 1, 1, "1")]);

        let out = scan("int a;\n/* open\nstill open\nwrite a;");
        assert_eq!(out.diagnostics.count(), 1);
        assert_eq!(out.diagnostics.entries()[0].line, 2);
        assert_eq!(out.tokens.len(), 3);
    }

    #[test]
    fn block_comments_span_lines() {
        let out = scan("int a; /* one\ntwo\nthree */ a = 1;");
        assert!(out.diagnostics.is_empty());
        assert_eq!(
            significant("int a; /* one\ntwo\nthree */ a = 1;"),
            vec![
                pair(TokenKind::Keyword, "int"),
                pair(TokenKind::Identifier, "a"),
                pair(TokenKind::Delimiter, ";"),
                pair(TokenKind::Identifier, "a"),
                pair(TokenKind::Operator, "="),
                pair(TokenKind::Integer, "1"),
                pair(TokenKind::Delimiter, ";"),
            ]
        );
        let assign = &out.tokens[3];
        assert_eq!((assign.line, assign.column), (3, 10));
        assert!(out
            .display_tokens
            .iter()
            .any(|token| token.kind == TokenKind::Comment && token.text == "two"));
    }

    #[test]
    fn line_comments_hide_the_rest_of_the_line() {
        let out = scan("write 1; // write 2;\nwrite 3;");
        assert!(out.diagnostics.is_empty());
        assert_eq!(out.tokens.len(), 6);
        assert!(out
            .display_tokens
            .iter()
            .any(|token| token.kind == TokenKind::Comment && token.text == " write 2;"));
    }

    #[test]
    fn minus_is_binary_only_after_an_operand() {
        assert_eq!(
            significant("x-1"),
            vec![
                pair(TokenKind::Identifier, "x"),
                pair(TokenKind::Operator, "-"),
                pair(TokenKind::Integer, "1"),
            ]
        );
        assert_eq!(
            significant("x = -1.5;"),
            vec![
                pair(TokenKind::Identifier, "x"),
                pair(TokenKind::Operator, "="),
                pair(TokenKind::Real, "-1.5"),
                pair(TokenKind::Delimiter, ";"),
            ]
        );
        assert_eq!(
            significant("a[0]-(b)-2"),
            vec![
                pair(TokenKind::Identifier, "a"),
                pair(TokenKind::Delimiter, "["),
                pair(TokenKind::Integer, "0"),
                pair(TokenKind::Delimiter, "]"),
                pair(TokenKind::Operator, "-"),
                pair(TokenKind::Delimiter, "("),
                pair(TokenKind::Identifier, "b"),
                pair(TokenKind::Delimiter, ")"),
                pair(TokenKind::Operator, "-"),
                pair(TokenKind::Integer, "2"),
            ]
        );
        // A sign in front of an identifier is not an operator.
        assert_eq!(scan("x = -y;").diagnostics.count(), 1);
    }

    #[test]
    fn comparison_operators_disambiguate() {
        assert_eq!(
            significant("a == b <> c < d = e"),
            vec![
                pair(TokenKind::Identifier, "a"),
                pair(TokenKind::Operator, "=="),
                pair(TokenKind::Identifier, "b"),
                pair(TokenKind::Operator, "<>"),
                pair(TokenKind::Identifier, "c"),
                pair(TokenKind::Operator, "<"),
                pair(TokenKind::Identifier, "d"),
                pair(TokenKind::Operator, "="),
                pair(TokenKind::Identifier, "e"),
            ]
        );
        assert_eq!(
            significant("a>=b"),
            vec![
                pair(TokenKind::Identifier, "a"),
                pair(TokenKind::Operator, ">"),
                pair(TokenKind::Operator, "="),
                pair(TokenKind::Identifier, "b"),
            ]
        );
    }

    #[test]
    fn strings_are_wrapped_in_quote_delimiters() {
        let out = scan("write \"hi there\";");
        assert!(out.diagnostics.is_empty());
        let positions: Vec<_> = out
            .tokens
            .iter()
            .map(|token| (token.kind, token.column, token.text.as_str()))
            .collect();
        assert_eq!(
            positions,
            vec![
                (TokenKind::Keyword, 1, "write"),
                (TokenKind::Delimiter, 7, "\""),
                (TokenKind::String, 8, "hi there"),
                (TokenKind::Delimiter, 16, "\""),
                (TokenKind::Delimiter, 17, ";"),
            ]
        );
        assert_eq!(scan("write \"abc;").diagnostics.count(), 1);
    }

    #[test]
    fn errors_do_not_stop_scanning() {
        let out = scan("12x = 3;");
        assert_eq!(out.diagnostics.count(), 1);
        assert_eq!(
            significant("12x = 3;"),
            vec![
                pair(TokenKind::Operator, "="),
                pair(TokenKind::Integer, "3"),
                pair(TokenKind::Delimiter, ";"),
            ]
        );

        let out = scan("a @ b # c");
        assert_eq!(out.diagnostics.count(), 2);
        assert_eq!(out.tokens.len(), 3);
        assert_eq!(
            out.diagnostics.text(),
            "ERROR: line 1, column 3: \"@\" is an unrecognized symbol\n\
             ERROR: line 1, column 7: \"#\" is an unrecognized symbol\n"
        );

        assert_eq!(scan("abc_ = 1;").diagnostics.count(), 1);
        assert_eq!(scan("_abc = 1;").diagnostics.count(), 1);
        assert_eq!(scan("a */ b").diagnostics.count(), 1);
    }

    #[test]
    fn symbols_after_a_numeral_are_reported() {
        let out = scan("int x = 3$;");
        assert_eq!(
            out.diagnostics.text(),
            "ERROR: line 1, column 10: \"$\" is an unrecognized symbol\n"
        );
        assert_eq!(
            significant("int x = 3$;"),
            vec![
                pair(TokenKind::Keyword, "int"),
                pair(TokenKind::Identifier, "x"),
                pair(TokenKind::Operator, "="),
                pair(TokenKind::Integer, "3"),
                pair(TokenKind::Delimiter, ";"),
            ]
        );
        assert_eq!(scan("write 1.5#;").diagnostics.count(), 1);
        assert_eq!(scan("write 2@;").diagnostics.count(), 1);
        assert_eq!(scan("write -4?;").diagnostics.count(), 1);
    }

    #[test]
    fn keywords_are_recognised() {
        let out = scan("if else while for read write int real bool string true false iff");
        let kinds: Vec<_> = out.tokens.iter().map(|token| token.kind).collect();
        assert!(kinds[..12].iter().all(|kind| *kind == TokenKind::Keyword));
        assert_eq!(kinds[12], TokenKind::Identifier);
    }

    #[test]
    fn rendered_tokens_lex_back_identically() {
        let source = "int a[3];\nreal r = -1.5;\nif (a[0] <> 2) {\n  write \"x y\";\n}\nwrite \"\";\n";
        let first = scan(source);
        assert!(first.diagnostics.is_empty());
        let second = scan(&render_tokens(&first.tokens));
        assert!(second.diagnostics.is_empty());
        assert_eq!(first.tokens, second.tokens);
    }
}
