use std::fmt;

/// Declared type of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Int,
    Real,
    Bool,
    String,
}

impl ValueType {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "int" => Some(ValueType::Int),
            "real" => Some(ValueType::Real),
            "bool" => Some(ValueType::Bool),
            "string" => Some(ValueType::String),
            _ => None,
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            ValueType::Int => "int",
            ValueType::Real => "real",
            ValueType::Bool => "bool",
            ValueType::String => "string",
        }
    }

    /// How a value of this type is named in diagnostics.
    pub fn noun(self) -> &'static str {
        match self {
            ValueType::Int => "int",
            ValueType::Real => "float",
            ValueType::Bool => "bool",
            ValueType::String => "string",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Real(f64),
    Bool(bool),
    Text(String),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Int(_) => ValueType::Int,
            Value::Real(_) => ValueType::Real,
            Value::Bool(_) => ValueType::Bool,
            Value::Text(_) => ValueType::String,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Int(int) => Some(*int as f64),
            Value::Real(real) => Some(*real),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(int) => write!(f, "{int}"),
            Value::Real(real) => write!(f, "{}", format_real(*real)),
            Value::Bool(boolean) => write!(f, "{boolean}"),
            Value::Text(text) => write!(f, "{text}"),
        }
    }
}

/// Renders a real the way CMM programs print them: always with a fractional
/// part, switching to `1.0E7` notation outside `[1e-3, 1e7)`.
pub fn format_real(real: f64) -> String {
    if !real.is_finite() {
        return if real.is_nan() {
            "NaN".to_string()
        } else if real > 0.0 {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        };
    }
    let magnitude = real.abs();
    if real == 0.0 || (1e-3..1e7).contains(&magnitude) {
        return format!("{real:?}");
    }
    let scientific = format!("{real:e}");
    match scientific.split_once('e') {
        Some((mantissa, exponent)) if mantissa.contains('.') => format!("{mantissa}E{exponent}"),
        Some((mantissa, exponent)) => format!("{mantissa}.0E{exponent}"),
        None => scientific,
    }
}

/// A declared variable. Array variables own one header symbol carrying
/// `array_len` plus one element symbol per slot, named `base@index`.
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub declared_type: ValueType,
    pub line: usize,
    pub level: usize,
    pub value: Option<Value>,
    pub array_len: Option<usize>,
}

impl Symbol {
    pub fn new(name: impl Into<String>, declared_type: ValueType, line: usize, level: usize) -> Self {
        Self {
            name: name.into(),
            declared_type,
            line,
            level,
            value: None,
            array_len: None,
        }
    }

    /// `a@2` is shown to users as `a[2]`.
    pub fn display_name(&self) -> String {
        match self.name.split_once('@') {
            Some((base, index)) => format!("{base}[{index}]"),
            None => self.name.clone(),
        }
    }
}

pub fn element_name(base: &str, index: usize) -> String {
    format!("{base}@{index}")
}

/// Insertion-ordered symbol store. Lookups scan linearly; the nearest
/// enclosing level wins.
#[derive(Debug, Default)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.symbols.clear();
    }

    pub fn add(&mut self, symbol: Symbol) -> usize {
        self.symbols.push(symbol);
        self.symbols.len() - 1
    }

    /// Position of `name` declared exactly at `level`.
    pub fn find_current_level(&self, name: &str, level: usize) -> Option<usize> {
        self.symbols
            .iter()
            .position(|symbol| symbol.name == name && symbol.level == level)
    }

    /// Position of `name` in the nearest level at or below `level`.
    pub fn find_all_levels(&self, name: &str, level: usize) -> Option<usize> {
        (0..=level)
            .rev()
            .find_map(|level| self.find_current_level(name, level))
    }

    /// The visible symbol named `name`, with its position.
    pub fn lookup(&self, name: &str, level: usize) -> Option<(usize, &Symbol)> {
        let position = self.find_all_levels(name, level)?;
        self.symbols.get(position).map(|symbol| (position, symbol))
    }

    pub fn get(&self, position: usize) -> Option<&Symbol> {
        self.symbols.get(position)
    }

    pub fn get_mut(&mut self, position: usize) -> Option<&mut Symbol> {
        self.symbols.get_mut(position)
    }

    /// Drops every symbol declared deeper than `level`.
    pub fn update(&mut self, level: usize) {
        self.symbols.retain(|symbol| symbol.level <= level);
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter()
    }
}
