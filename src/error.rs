use std::fmt;

#[macro_export]
macro_rules! syntax_error {
    ($line:expr, $col:expr, $($arg:tt)+) => {
        Err($crate::error::Diagnostic::new(
            $crate::error::Stage::Syntax,
            $line,
            Some($col),
            format!($($arg)+),
        ))
    };
}

#[macro_export]
macro_rules! semantic_error {
    ($line:expr, $($arg:tt)+) => {
        Err($crate::error::Diagnostic::new(
            $crate::error::Stage::Semantic,
            $line,
            None,
            format!($($arg)+),
        ))
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Lexical,
    Syntax,
    Semantic,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Lexical => write!(f, "lexical analysis"),
            Stage::Syntax => write!(f, "syntax analysis"),
            Stage::Semantic => write!(f, "semantic analysis"),
        }
    }
}

/// One reported problem. Lexical and syntax diagnostics carry a column,
/// semantic ones only a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub stage: Stage,
    pub line: usize,
    pub column: Option<usize>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(stage: Stage, line: usize, column: Option<usize>, message: String) -> Self {
        Self {
            stage,
            line,
            column,
            message,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.column {
            Some(column) => write!(
                f,
                "ERROR: line {}, column {}: {}",
                self.line, column, self.message
            ),
            None => write!(f, "ERROR: line {}: {}", self.line, self.message),
        }
    }
}

impl std::error::Error for Diagnostic {}

/// Error log of a single stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostics {
    stage: Stage,
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            entries: Vec::new(),
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn error(&mut self, line: usize, column: Option<usize>, message: String) {
        self.entries
            .push(Diagnostic::new(self.stage, line, column, message));
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.entries.push(diagnostic);
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    /// Renders the log the way it is shown to the user, one error per line.
    pub fn text(&self) -> String {
        self.entries
            .iter()
            .map(|diag| format!("{diag}\n"))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_column_only_when_present() {
        let mut lexical = Diagnostics::new(Stage::Lexical);
        lexical.error(3, Some(7), "\"@\" is an unrecognized symbol".to_string());
        assert_eq!(
            lexical.text(),
            "ERROR: line 3, column 7: \"@\" is an unrecognized symbol\n"
        );

        let semantic: Result<(), Diagnostic> = semantic_error!(2, "division by {}", "zero");
        let diag = semantic.unwrap_err();
        assert_eq!(diag.stage, Stage::Semantic);
        assert_eq!(diag.to_string(), "ERROR: line 2: division by zero");
    }
}
