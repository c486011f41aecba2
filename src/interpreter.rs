use crate::ast::{ASSIGN, BLOCK, INITIALIZER, NodeKind, SyntaxNode};
use crate::console::Console;
use crate::error::{Diagnostic, Diagnostics, Stage};
use crate::lexer::{match_integer, match_real};
use crate::semantic_error;
use crate::symbol_table::{Symbol, SymbolTable, Value, ValueType, element_name};

use std::cmp::Ordering;

type EvalResult<T> = Result<T, Diagnostic>;

/// Every element is its own symbol, so array sizes are capped.
pub const MAX_ARRAY_LEN: usize = 1 << 20;

/// Checks and executes a syntax tree in one walk. Statement-level errors are
/// recorded and the walk moves on to the next statement.
pub struct Interpreter<C: Console> {
    table: SymbolTable,
    level: usize,
    diagnostics: Diagnostics,
    console: C,
}

impl<C: Console> Interpreter<C> {
    pub fn new(console: C) -> Self {
        Interpreter {
            table: SymbolTable::new(),
            level: 0,
            diagnostics: Diagnostics::new(Stage::Semantic),
            console,
        }
    }

    pub fn evaluate_program(&mut self, program: &SyntaxNode) -> Diagnostics {
        self.table.clear();
        self.level = 0;
        self.diagnostics = Diagnostics::new(Stage::Semantic);
        self.evaluate_block(&program.children);
        log::debug!(
            "interpreter finished with {} errors, {} symbols left",
            self.diagnostics.count(),
            self.table.len()
        );
        std::mem::replace(&mut self.diagnostics, Diagnostics::new(Stage::Semantic))
    }

    /// Symbols still alive after the last run.
    pub fn symbols(&self) -> &SymbolTable {
        &self.table
    }

    fn evaluate_block(&mut self, statements: &[SyntaxNode]) {
        for statement in statements {
            let outcome = self.evaluate_statement(statement);
            self.record(outcome);
        }
    }

    fn evaluate_statement(&mut self, statement: &SyntaxNode) -> EvalResult<()> {
        match statement.content.as_str() {
            "int" | "real" | "bool" | "string" => self.declare(statement),
            ASSIGN => self.assign(statement),
            "if" => self.evaluate_if(statement),
            "while" => self.evaluate_while(statement),
            "for" => self.evaluate_for(statement),
            "read" => self.evaluate_read(statement),
            "write" => self.evaluate_write(statement),
            BLOCK => {
                self.scoped(|this| this.evaluate_block(&statement.children));
                Ok(())
            }
            other => semantic_error!(statement.line, "unknown statement {}", other),
        }
    }

    fn record(&mut self, outcome: EvalResult<()>) {
        if let Err(diag) = outcome {
            log::trace!("statement aborted: {diag}");
            self.diagnostics.push(diag);
        }
    }

    /// Runs `body` one level deeper, then evicts everything declared there.
    fn scoped<T>(&mut self, body: impl FnOnce(&mut Self) -> T) -> T {
        self.level += 1;
        log::trace!("entering scope level {}", self.level);
        let result = body(self);
        self.level -= 1;
        self.table.update(self.level);
        log::trace!("back at scope level {}", self.level);
        result
    }

    /// Drops the locals of one loop iteration while staying inside the loop.
    fn reset_iteration(&mut self) {
        self.level -= 1;
        self.table.update(self.level);
        self.level += 1;
    }

    fn evaluate_if(&mut self, node: &SyntaxNode) -> EvalResult<()> {
        let condition = expect_child(node, 0)?;
        let then_block = expect_child(node, 1)?;
        let else_block = node.child(2);
        let holds = self.test(condition);
        self.scoped(|this| {
            if holds {
                this.evaluate_block(&then_block.children);
            } else if let Some(else_block) = else_block {
                this.scoped(|this| this.evaluate_block(&else_block.children));
            }
        });
        Ok(())
    }

    fn evaluate_while(&mut self, node: &SyntaxNode) -> EvalResult<()> {
        let condition = expect_child(node, 0)?;
        let body = expect_child(node, 1)?;
        self.scoped(|this| {
            while this.test(condition) {
                this.evaluate_block(&body.children);
                this.reset_iteration();
            }
        });
        Ok(())
    }

    /// `change` runs after the body's locals are evicted, so it cannot see
    /// them. A failing `init` or `change` ends the loop.
    fn evaluate_for(&mut self, node: &SyntaxNode) -> EvalResult<()> {
        let [init, condition, change, body] = node.children.as_slice() else {
            return semantic_error!(node.line, "malformed for statement");
        };
        let init = expect_child(init, 0)?;
        let change = expect_child(change, 0)?;
        self.scoped(|this| {
            if let Err(diag) = this.assign(init) {
                this.diagnostics.push(diag);
                return;
            }
            while this.test(condition) {
                this.evaluate_block(&body.children);
                this.reset_iteration();
                if let Err(diag) = this.assign(change) {
                    this.diagnostics.push(diag);
                    break;
                }
            }
        });
        Ok(())
    }

    /// Evaluates a condition wrapper. Anything but a bool is reported and
    /// counts as false.
    fn test(&mut self, wrapper: &SyntaxNode) -> bool {
        let outcome = expect_child(wrapper, 0).and_then(|expr| self.evaluate(expr));
        match outcome {
            Ok(Value::Bool(holds)) => holds,
            Ok(other) => {
                let outcome = semantic_error!(
                    wrapper.line,
                    "cannot use {} as condition",
                    other.value_type().noun()
                );
                self.record(outcome);
                false
            }
            Err(diag) => {
                self.diagnostics.push(diag);
                false
            }
        }
    }

    /// Each declarator stands alone: a rejected one does not stop the rest.
    fn declare(&mut self, node: &SyntaxNode) -> EvalResult<()> {
        let Some(declared_type) = ValueType::from_keyword(&node.content) else {
            return semantic_error!(node.line, "unknown type {}", node.content);
        };
        let mut children = node.children.iter().peekable();
        while let Some(target) = children.next() {
            let initializer = children.next_if(|child| child.is_structural(INITIALIZER));
            let outcome = self.declare_one(declared_type, target, initializer);
            self.record(outcome);
        }
        Ok(())
    }

    fn declare_one(
        &mut self,
        declared_type: ValueType,
        target: &SyntaxNode,
        initializer: Option<&SyntaxNode>,
    ) -> EvalResult<()> {
        let name = &target.content;
        if self.table.find_current_level(name, self.level).is_some() {
            return semantic_error!(
                target.line,
                "variable {} is already declared in this scope",
                name
            );
        }
        if let Some(size) = target.child(0) {
            return self.declare_array(declared_type, target, size);
        }

        // The variable exists even when its initializer is rejected.
        let mut symbol = Symbol::new(name.as_str(), declared_type, target.line, self.level);
        let outcome = match initializer {
            Some(initializer) => expect_child(initializer, 0)
                .and_then(|expr| self.evaluate(expr))
                .and_then(|value| coerce(declared_type, value, initializer.line))
                .map(|value| symbol.value = Some(value)),
            None => Ok(()),
        };
        self.table.add(symbol);
        outcome
    }

    fn declare_array(
        &mut self,
        declared_type: ValueType,
        target: &SyntaxNode,
        size: &SyntaxNode,
    ) -> EvalResult<()> {
        let length = match self.evaluate(size)? {
            Value::Int(length) => length,
            _ => return semantic_error!(size.line, "array size must be an integer"),
        };
        if length < 1 {
            return semantic_error!(size.line, "array size must be greater than zero");
        }
        let length = match usize::try_from(length) {
            Ok(length) if length <= MAX_ARRAY_LEN => length,
            _ => {
                return semantic_error!(
                    size.line,
                    "array size {} exceeds the limit of {}",
                    length,
                    MAX_ARRAY_LEN
                );
            }
        };

        let name = &target.content;
        let mut header = Symbol::new(name.as_str(), declared_type, target.line, self.level);
        header.array_len = Some(length);
        self.table.add(header);
        for index in 0..length {
            self.table.add(Symbol::new(
                element_name(name, index),
                declared_type,
                target.line,
                self.level,
            ));
        }
        Ok(())
    }

    fn assign(&mut self, node: &SyntaxNode) -> EvalResult<()> {
        let target = expect_child(node, 0)?;
        let position = self.locate(target)?;
        let value = self.evaluate(expect_child(node, 1)?)?;
        let Some(symbol) = self.table.get_mut(position) else {
            return semantic_error!(node.line, "variable {} is undeclared", target.content);
        };
        symbol.value = Some(coerce(symbol.declared_type, value, node.line)?);
        Ok(())
    }

    fn evaluate_write(&mut self, node: &SyntaxNode) -> EvalResult<()> {
        let expr = expect_child(node, 0)?;
        let line = match expr.kind {
            NodeKind::Integer | NodeKind::Real | NodeKind::String => expr.content.clone(),
            _ => self.evaluate(expr)?.to_string(),
        };
        self.console.write_line(line);
        Ok(())
    }

    fn evaluate_read(&mut self, node: &SyntaxNode) -> EvalResult<()> {
        let target = expect_child(node, 0)?;
        let position = self.locate(target)?;
        let Some(symbol) = self.table.get(position) else {
            return semantic_error!(node.line, "variable {} is undeclared", target.content);
        };
        let declared_type = symbol.declared_type;
        let display = symbol.display_name();

        log::trace!("waiting for input to {display}");
        let input = self.console.read_line(&display);
        let input = input.trim_end_matches(['\r', '\n']);
        match parse_input(declared_type, input) {
            Some(value) => {
                if let Some(symbol) = self.table.get_mut(position) {
                    symbol.value = Some(value);
                }
            }
            None => self
                .console
                .reject_input(format!("cannot assign \"{input}\" to variable {display}")),
        }
        Ok(())
    }

    /// Resolves an identifier node, including its index, to a table position.
    fn locate(&self, target: &SyntaxNode) -> EvalResult<usize> {
        let name = &target.content;
        let Some((position, symbol)) = self.table.lookup(name, self.level) else {
            return semantic_error!(target.line, "variable {} is undeclared", name);
        };
        match (target.child(0), symbol.array_len) {
            (None, None) => Ok(position),
            (None, Some(_)) => {
                semantic_error!(target.line, "array {} cannot be used without an index", name)
            }
            (Some(_), None) => semantic_error!(target.line, "variable {} is not an array", name),
            (Some(index), Some(length)) => {
                let index = match self.evaluate(index)? {
                    Value::Int(index) => index,
                    _ => return semantic_error!(index.line, "array index must be an integer"),
                };
                if index < 0 {
                    return semantic_error!(target.line, "array index cannot be negative");
                }
                let index = usize::try_from(index).unwrap_or(usize::MAX);
                if index >= length {
                    return semantic_error!(target.line, "array index out of range");
                }
                match self
                    .table
                    .find_current_level(&element_name(name, index), symbol.level)
                {
                    Some(element) => Ok(element),
                    None => semantic_error!(target.line, "variable {}[{}] is undeclared", name, index),
                }
            }
        }
    }

    fn evaluate(&self, node: &SyntaxNode) -> EvalResult<Value> {
        match node.kind {
            NodeKind::Integer => match node.content.parse() {
                Ok(int) => Ok(Value::Int(int)),
                Err(_) => semantic_error!(node.line, "integer {} is out of range", node.content),
            },
            NodeKind::Real => match node.content.parse() {
                Ok(real) => Ok(Value::Real(real)),
                Err(_) => semantic_error!(node.line, "real {} is malformed", node.content),
            },
            NodeKind::Boolean => Ok(Value::Bool(node.content == "true")),
            NodeKind::String => Ok(Value::Text(node.content.clone())),
            NodeKind::Identifier => {
                let position = self.locate(node)?;
                let Some(symbol) = self.table.get(position) else {
                    return semantic_error!(node.line, "variable {} is undeclared", node.content);
                };
                match &symbol.value {
                    Some(value) => Ok(value.clone()),
                    None => semantic_error!(
                        node.line,
                        "variable {} is uninitialized",
                        symbol.display_name()
                    ),
                }
            }
            NodeKind::Structural => self.evaluate_binary(node),
        }
    }

    fn evaluate_binary(&self, node: &SyntaxNode) -> EvalResult<Value> {
        let left = expect_child(node, 0)?;
        let right = expect_child(node, 1)?;
        let lhs = self.evaluate(left)?;
        let rhs = self.evaluate(right)?;
        match node.content.as_str() {
            "+" | "-" | "*" | "/" => arithmetic(&node.content, lhs, rhs, node.line, right.line),
            "==" | "<>" | "<" | ">" => compare(&node.content, lhs, rhs, node.line),
            other => semantic_error!(node.line, "unknown operator {}", other),
        }
    }
}

fn expect_child(node: &SyntaxNode, index: usize) -> EvalResult<&SyntaxNode> {
    match node.child(index) {
        Some(child) => Ok(child),
        None => semantic_error!(node.line, "malformed {} node", node.content),
    }
}

/// The assignment matrix: widening int to real and int to bool are the only
/// implicit conversions.
fn coerce(target: ValueType, value: Value, line: usize) -> EvalResult<Value> {
    match (target, value) {
        (ValueType::Int, Value::Int(int)) => Ok(Value::Int(int)),
        (ValueType::Real, Value::Int(int)) => Ok(Value::Real(int as f64)),
        (ValueType::Real, Value::Real(real)) => Ok(Value::Real(real)),
        (ValueType::Bool, Value::Int(int)) => Ok(Value::Bool(int > 0)),
        (ValueType::Bool, Value::Bool(boolean)) => Ok(Value::Bool(boolean)),
        (ValueType::String, Value::Text(text)) => Ok(Value::Text(text)),
        (target, value) => semantic_error!(
            line,
            "cannot assign {} to {} variable",
            value.value_type().noun(),
            target.keyword()
        ),
    }
}

fn parse_input(declared_type: ValueType, input: &str) -> Option<Value> {
    match declared_type {
        ValueType::Int if match_integer(input) => input.parse().ok().map(Value::Int),
        ValueType::Real if match_real(input) || match_integer(input) => {
            input.parse().ok().map(Value::Real)
        }
        ValueType::Bool => match input {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        ValueType::String => Some(Value::Text(input.to_string())),
        _ => None,
    }
}

fn arithmetic(
    operator: &str,
    lhs: Value,
    rhs: Value,
    line: usize,
    divisor_line: usize,
) -> EvalResult<Value> {
    if let (Value::Int(a), Value::Int(b)) = (&lhs, &rhs) {
        let result = match operator {
            "+" => a.checked_add(*b),
            "-" => a.checked_sub(*b),
            "*" => a.checked_mul(*b),
            _ if *b == 0 => return semantic_error!(divisor_line, "division by zero"),
            _ => a.checked_div(*b),
        };
        return match result {
            Some(int) => Ok(Value::Int(int)),
            None => semantic_error!(line, "integer overflow"),
        };
    }

    let (Some(a), Some(b)) = (lhs.as_number(), rhs.as_number()) else {
        let culprit = if lhs.as_number().is_none() { &lhs } else { &rhs };
        return semantic_error!(
            line,
            "operator {} cannot be applied to {}",
            operator,
            culprit.value_type().noun()
        );
    };
    let result = match operator {
        "+" => a + b,
        "-" => a - b,
        "*" => a * b,
        _ if b == 0.0 => return semantic_error!(divisor_line, "division by zero"),
        _ => (a / b * 1000.0).round() / 1000.0,
    };
    Ok(Value::Real(narrow(result)))
}

/// Real arithmetic results carry single precision, read back at their
/// shortest decimal form.
fn narrow(real: f64) -> f64 {
    let single = real as f32;
    single.to_string().parse().unwrap_or(f64::from(single))
}

fn compare(operator: &str, lhs: Value, rhs: Value, line: usize) -> EvalResult<Value> {
    let ordering = match (&lhs, &rhs) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        _ => match (lhs.as_number(), rhs.as_number()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => {
                return semantic_error!(
                    line,
                    "cannot compare {} with {}",
                    lhs.value_type().noun(),
                    rhs.value_type().noun()
                );
            }
        },
    };
    let holds = match operator {
        "==" => ordering == Some(Ordering::Equal),
        "<>" => ordering != Some(Ordering::Equal),
        "<" => ordering == Some(Ordering::Less),
        _ => ordering == Some(Ordering::Greater),
    };
    Ok(Value::Bool(holds))
}
