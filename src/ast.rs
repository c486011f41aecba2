use crate::error::{Diagnostic, Diagnostics, Stage};
use crate::syntax_error;
use crate::token::{Token, TokenKind};

use std::fmt;

pub const PROGRAM: &str = "PROGRAM";
pub const BLOCK: &str = "Statements";
pub const CONDITION: &str = "Condition";
pub const INITIALIZATION: &str = "Initialization";
pub const CHANGE: &str = "Change";
pub const INITIALIZER: &str = "assign";
pub const ASSIGN: &str = "=";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Integer,
    Real,
    String,
    Boolean,
    Identifier,
    // Statements, operators and wrappers; `content` says which.
    Structural,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Integer => write!(f, "Integer"),
            NodeKind::Real => write!(f, "Real"),
            NodeKind::String => write!(f, "String"),
            NodeKind::Boolean => write!(f, "Boolean"),
            NodeKind::Identifier => write!(f, "Identifier"),
            NodeKind::Structural => Ok(()),
        }
    }
}

/// Statement shapes produced by the parser:
///
/// - declaration: `int|real|bool|string` with children alternating an
///   identifier (whose only child, if any, is the array size) and an optional
///   `assign` wrapper holding the initializer.
/// - assignment: `=` with the target identifier and the value.
/// - `if`: `Condition`, `Statements`, optional else `Statements`.
/// - `while`: `Condition`, `Statements`.
/// - `for`: `Initialization`, `Condition`, `Change`, `Statements`.
/// - `read` / `write`: the target identifier / the expression.
///
/// Binary operators keep the operator symbol as `content` and exactly two
/// children; an identifier's only child is its array index.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxNode {
    pub kind: NodeKind,
    pub content: String,
    pub line: usize,
    pub children: Vec<SyntaxNode>,
}

impl SyntaxNode {
    pub fn new(kind: NodeKind, content: impl Into<String>, line: usize) -> Self {
        Self {
            kind,
            content: content.into(),
            line,
            children: Vec::new(),
        }
    }

    pub fn structural(content: impl Into<String>, line: usize) -> Self {
        Self::new(NodeKind::Structural, content, line)
    }

    pub fn with_child(mut self, child: SyntaxNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn is_structural(&self, content: &str) -> bool {
        self.kind == NodeKind::Structural && self.content == content
    }

    pub fn child(&self, index: usize) -> Option<&SyntaxNode> {
        self.children.get(index)
    }

    fn render(&self, depth: usize, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:indent$}{}", "", self.content, indent = depth * 2)?;
        if self.kind != NodeKind::Structural {
            write!(f, " ({})", self.kind)?;
        }
        writeln!(f, " [line {}]", self.line)?;
        for child in &self.children {
            child.render(depth + 1, f)?;
        }
        Ok(())
    }
}

impl fmt::Display for SyntaxNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.render(0, f)
    }
}

#[derive(Debug, Clone)]
pub struct ParseOutput {
    pub tree: SyntaxNode,
    pub diagnostics: Diagnostics,
}

type ParseResult<T> = Result<T, Diagnostic>;

#[derive(PartialEq, PartialOrd, Clone, Copy)]
enum Precedence {
    Lowest,
    Comparison, // == <> < >
    Sum,        // + -
    Product,    // * /
}

pub struct Parser {
    // Reversed, so the next token is at the end.
    tokens: Vec<Token>,
    last_position: (usize, usize),
    diagnostics: Diagnostics,
}

impl Parser {
    pub fn parse_program(tokens: &[Token]) -> ParseOutput {
        let mut tokens = tokens.to_vec();
        tokens.reverse();
        let mut this = Self {
            tokens,
            last_position: (1, 1),
            diagnostics: Diagnostics::new(Stage::Syntax),
        };
        let mut root = SyntaxNode::structural(PROGRAM, 1);
        root.children = this.parse_statement_list(false);
        log::debug!(
            "parser built {} top-level statements with {} errors",
            root.children.len(),
            this.diagnostics.count()
        );
        ParseOutput {
            tree: root,
            diagnostics: this.diagnostics,
        }
    }

    /// Parses statements until end of input, or until `}` when `in_block`.
    /// A malformed statement is reported and skipped.
    fn parse_statement_list(&mut self, in_block: bool) -> Vec<SyntaxNode> {
        let mut statements = Vec::new();
        while let Some(token) = self.look_ahead() {
            if in_block && token.is(TokenKind::Delimiter, "}") {
                break;
            }
            let remaining = self.tokens.len();
            match self.parse_statement() {
                Ok(statement) => statements.push(statement),
                Err(diag) => {
                    self.diagnostics.push(diag);
                    if self.tokens.len() == remaining {
                        self.consume();
                    }
                    self.synchronize();
                }
            }
        }
        statements
    }

    /// Skips to the next plausible statement boundary.
    fn synchronize(&mut self) {
        while let Some(token) = self.look_ahead() {
            if token.is(TokenKind::Delimiter, "}") || starts_statement(token) {
                return;
            }
            let token = self.consume();
            if token.is_some_and(|token| token.is(TokenKind::Delimiter, ";")) {
                return;
            }
        }
    }

    fn parse_statement(&mut self) -> ParseResult<SyntaxNode> {
        let Some(token) = self.look_ahead().cloned() else {
            return self.unexpected_end("a statement");
        };
        match (token.kind, token.text.as_str()) {
            (TokenKind::Keyword, "int" | "real" | "bool" | "string") => self.parse_declaration(),
            (TokenKind::Keyword, "if") => self.parse_if(),
            (TokenKind::Keyword, "while") => self.parse_while(),
            (TokenKind::Keyword, "for") => self.parse_for(),
            (TokenKind::Keyword, "read") => self.parse_read(),
            (TokenKind::Keyword, "write") => self.parse_write(),
            (TokenKind::Identifier, _) => {
                let assignment = self.parse_assignment()?;
                self.consume_expect(TokenKind::Delimiter, ";")?;
                Ok(assignment)
            }
            (TokenKind::Delimiter, "{") => self.parse_block(),
            _ => syntax_error!(
                token.line,
                token.column,
                "unexpected '{}' at start of statement",
                token.text
            ),
        }
    }

    fn parse_declaration(&mut self) -> ParseResult<SyntaxNode> {
        let keyword = self.consume_kind(TokenKind::Keyword, "a type")?;
        let mut declaration = SyntaxNode::structural(keyword.text, keyword.line);
        loop {
            let name = self.consume_kind(TokenKind::Identifier, "an identifier")?;
            let mut target = SyntaxNode::new(NodeKind::Identifier, name.text, name.line);
            let is_array = self.look_is(TokenKind::Delimiter, "[");
            if is_array {
                target.children.push(self.parse_index()?);
            }
            declaration.children.push(target);
            if self.look_is(TokenKind::Operator, "=") {
                let assign = self.consume_expect(TokenKind::Operator, "=")?;
                if is_array {
                    return syntax_error!(
                        assign.line,
                        assign.column,
                        "an array declaration cannot have an initializer"
                    );
                }
                let value = self.parse_expression(Precedence::Lowest)?;
                declaration
                    .children
                    .push(SyntaxNode::structural(INITIALIZER, assign.line).with_child(value));
            }
            if self.look_is(TokenKind::Delimiter, ",") {
                self.consume();
                continue;
            }
            self.consume_expect(TokenKind::Delimiter, ";")?;
            return Ok(declaration);
        }
    }

    /// `target [index] = expression`, without the trailing `;`.
    fn parse_assignment(&mut self) -> ParseResult<SyntaxNode> {
        let target = self.parse_target()?;
        let assign = self.consume_expect(TokenKind::Operator, "=")?;
        let value = self.parse_expression(Precedence::Lowest)?;
        Ok(SyntaxNode::structural(ASSIGN, assign.line)
            .with_child(target)
            .with_child(value))
    }

    fn parse_if(&mut self) -> ParseResult<SyntaxNode> {
        let keyword = self.consume_expect(TokenKind::Keyword, "if")?;
        let condition = self.parse_condition()?;
        let body = self.parse_body()?;
        let mut node = SyntaxNode::structural("if", keyword.line)
            .with_child(condition)
            .with_child(body);
        if self.look_is(TokenKind::Keyword, "else") {
            self.consume();
            node.children.push(self.parse_body()?);
        }
        Ok(node)
    }

    fn parse_while(&mut self) -> ParseResult<SyntaxNode> {
        let keyword = self.consume_expect(TokenKind::Keyword, "while")?;
        let condition = self.parse_condition()?;
        let body = self.parse_body()?;
        Ok(SyntaxNode::structural("while", keyword.line)
            .with_child(condition)
            .with_child(body))
    }

    fn parse_for(&mut self) -> ParseResult<SyntaxNode> {
        let keyword = self.consume_expect(TokenKind::Keyword, "for")?;
        self.consume_expect(TokenKind::Delimiter, "(")?;
        let init = self.parse_assignment()?;
        self.consume_expect(TokenKind::Delimiter, ";")?;
        let condition = self.parse_expression(Precedence::Lowest)?;
        self.consume_expect(TokenKind::Delimiter, ";")?;
        let change = self.parse_assignment()?;
        self.consume_expect(TokenKind::Delimiter, ")")?;
        let body = self.parse_body()?;
        Ok(SyntaxNode::structural("for", keyword.line)
            .with_child(SyntaxNode::structural(INITIALIZATION, init.line).with_child(init))
            .with_child(SyntaxNode::structural(CONDITION, condition.line).with_child(condition))
            .with_child(SyntaxNode::structural(CHANGE, change.line).with_child(change))
            .with_child(body))
    }

    fn parse_read(&mut self) -> ParseResult<SyntaxNode> {
        let keyword = self.consume_expect(TokenKind::Keyword, "read")?;
        let target = self.parse_target()?;
        self.consume_expect(TokenKind::Delimiter, ";")?;
        Ok(SyntaxNode::structural("read", keyword.line).with_child(target))
    }

    fn parse_write(&mut self) -> ParseResult<SyntaxNode> {
        let keyword = self.consume_expect(TokenKind::Keyword, "write")?;
        let value = self.parse_expression(Precedence::Lowest)?;
        self.consume_expect(TokenKind::Delimiter, ";")?;
        Ok(SyntaxNode::structural("write", keyword.line).with_child(value))
    }

    fn parse_condition(&mut self) -> ParseResult<SyntaxNode> {
        let open = self.consume_expect(TokenKind::Delimiter, "(")?;
        let condition = self.parse_expression(Precedence::Lowest)?;
        self.consume_expect(TokenKind::Delimiter, ")")?;
        Ok(SyntaxNode::structural(CONDITION, open.line).with_child(condition))
    }

    /// A braced block, or a single statement wrapped as one.
    fn parse_body(&mut self) -> ParseResult<SyntaxNode> {
        if self.look_is(TokenKind::Delimiter, "{") {
            return self.parse_block();
        }
        let statement = self.parse_statement()?;
        Ok(SyntaxNode::structural(BLOCK, statement.line).with_child(statement))
    }

    fn parse_block(&mut self) -> ParseResult<SyntaxNode> {
        let open = self.consume_expect(TokenKind::Delimiter, "{")?;
        let mut block = SyntaxNode::structural(BLOCK, open.line);
        block.children = self.parse_statement_list(true);
        self.consume_expect(TokenKind::Delimiter, "}")?;
        Ok(block)
    }

    fn parse_target(&mut self) -> ParseResult<SyntaxNode> {
        let name = self.consume_kind(TokenKind::Identifier, "an identifier")?;
        let mut target = SyntaxNode::new(NodeKind::Identifier, name.text, name.line);
        if self.look_is(TokenKind::Delimiter, "[") {
            target.children.push(self.parse_index()?);
        }
        Ok(target)
    }

    fn parse_index(&mut self) -> ParseResult<SyntaxNode> {
        self.consume_expect(TokenKind::Delimiter, "[")?;
        let index = self.parse_expression(Precedence::Lowest)?;
        self.consume_expect(TokenKind::Delimiter, "]")?;
        Ok(index)
    }

    fn parse_expression(&mut self, precedence: Precedence) -> ParseResult<SyntaxNode> {
        let mut left = self.parse_prefix()?;
        while let Some(token) = self.look_ahead() {
            let next_prec = get_precedence(token);
            if next_prec <= precedence {
                break;
            }
            if next_prec == Precedence::Comparison && is_comparison(&left) {
                return syntax_error!(
                    token.line,
                    token.column,
                    "comparison operators cannot be chained"
                );
            }
            left = self.parse_infix(left, next_prec)?;
        }
        Ok(left)
    }

    fn parse_prefix(&mut self) -> ParseResult<SyntaxNode> {
        let Some(token) = self.consume() else {
            return self.unexpected_end("an expression");
        };
        match (token.kind, token.text.as_str()) {
            (TokenKind::Integer, _) => Ok(SyntaxNode::new(NodeKind::Integer, token.text, token.line)),
            (TokenKind::Real, _) => Ok(SyntaxNode::new(NodeKind::Real, token.text, token.line)),
            (TokenKind::Keyword, "true" | "false") => {
                Ok(SyntaxNode::new(NodeKind::Boolean, token.text, token.line))
            }
            (TokenKind::Identifier, _) => {
                let mut identifier = SyntaxNode::new(NodeKind::Identifier, token.text, token.line);
                if self.look_is(TokenKind::Delimiter, "[") {
                    identifier.children.push(self.parse_index()?);
                }
                Ok(identifier)
            }
            (TokenKind::Delimiter, "\"") => {
                let text = self.consume_kind(TokenKind::String, "string text")?;
                self.consume_expect(TokenKind::Delimiter, "\"")?;
                Ok(SyntaxNode::new(NodeKind::String, text.text, text.line))
            }
            (TokenKind::Delimiter, "(") => {
                let inner = self.parse_expression(Precedence::Lowest)?;
                self.consume_expect(TokenKind::Delimiter, ")")?;
                Ok(inner)
            }
            _ => syntax_error!(
                token.line,
                token.column,
                "expected an expression but found '{}'",
                token.text
            ),
        }
    }

    fn parse_infix(&mut self, left: SyntaxNode, precedence: Precedence) -> ParseResult<SyntaxNode> {
        let operator = self.consume_kind(TokenKind::Operator, "an operator")?;
        let right = self.parse_expression(precedence)?;
        Ok(SyntaxNode::structural(operator.text, operator.line)
            .with_child(left)
            .with_child(right))
    }

    fn consume_expect(&mut self, kind: TokenKind, text: &str) -> ParseResult<Token> {
        match self.look_ahead() {
            Some(token) if token.is(kind, text) => self.consume_or_end(text),
            Some(token) => syntax_error!(
                token.line,
                token.column,
                "expected '{}' but found '{}'",
                text,
                token.text
            ),
            None => self.unexpected_end(&format!("'{text}'")),
        }
    }

    fn consume_kind(&mut self, kind: TokenKind, expected: &str) -> ParseResult<Token> {
        match self.look_ahead() {
            Some(token) if token.kind == kind => self.consume_or_end(expected),
            Some(token) => syntax_error!(
                token.line,
                token.column,
                "expected {} but found '{}'",
                expected,
                token.text
            ),
            None => self.unexpected_end(expected),
        }
    }

    fn consume_or_end(&mut self, expected: &str) -> ParseResult<Token> {
        match self.consume() {
            Some(token) => Ok(token),
            None => self.unexpected_end(expected),
        }
    }

    fn unexpected_end<T>(&self, expected: &str) -> ParseResult<T> {
        let (line, column) = self.last_position;
        syntax_error!(line, column, "expected {} but reached end of input", expected)
    }

    fn look_is(&self, kind: TokenKind, text: &str) -> bool {
        self.look_ahead().is_some_and(|token| token.is(kind, text))
    }

    fn look_ahead(&self) -> Option<&Token> {
        self.tokens.last()
    }

    fn consume(&mut self) -> Option<Token> {
        let token = self.tokens.pop()?;
        self.last_position = (token.line, token.column);
        Some(token)
    }
}

fn get_precedence(token: &Token) -> Precedence {
    if token.kind != TokenKind::Operator {
        return Precedence::Lowest;
    }
    match token.text.as_str() {
        "==" | "<>" | "<" | ">" => Precedence::Comparison,
        "+" | "-" => Precedence::Sum,
        "*" | "/" => Precedence::Product,
        _ => Precedence::Lowest,
    }
}

fn is_comparison(node: &SyntaxNode) -> bool {
    node.kind == NodeKind::Structural && matches!(node.content.as_str(), "==" | "<>" | "<" | ">")
}

fn starts_statement(token: &Token) -> bool {
    token.kind == TokenKind::Keyword
        && matches!(
            token.text.as_str(),
            "int" | "real" | "bool" | "string" | "if" | "while" | "for" | "read" | "write"
        )
}
