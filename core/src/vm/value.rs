use core::fmt;

use ecow::{EcoString, EcoVec};

/// Largest element count an `ALLOC` may request.
pub const MAX_ARRAY_LEN: usize = 1 << 20;

/// A runtime value.
///
/// Values are copied on every stack and slot operation. Strings and arrays
/// are reference counted, so copies are cheap; storing into an array
/// element copies the array first if it is shared.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Value {
    Int(i64),
    Bool(bool),
    Str(EcoString),
    /// Fixed-size array. Its length never changes after creation.
    Array(EcoVec<Value>),
    #[default]
    Unit,
}

impl Value {
    pub fn str(s: impl Into<EcoString>) -> Self {
        Value::Str(s.into())
    }

    /// Name of the value's kind, used in fault messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "Int",
            Value::Bool(_) => "Bool",
            Value::Str(_) => "Str",
            Value::Array(_) => "Array",
            Value::Unit => "Unit",
        }
    }

    /// Truth value of a condition. `Int` counts as true when non-zero.
    pub fn truth(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Int(i) => Some(*i != 0),
            _ => None,
        }
    }

    pub fn same_kind(&self, other: &Value) -> bool {
        core::mem::discriminant(self) == core::mem::discriminant(other)
    }

    /// Literal form as written in assembly listings.
    pub fn literal(&self) -> Literal<'_> {
        Literal(self)
    }
}

/// Program output form: strings are written raw. Array elements are
/// written as literals.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{}", i),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Str(s) => f.write_str(s),
            Value::Array(items) => write_elements(f, items),
            Value::Unit => f.write_str("()"),
        }
    }
}

fn write_elements(f: &mut fmt::Formatter<'_>, items: &[Value]) -> fmt::Result {
    f.write_str("[")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", item.literal())?;
    }
    f.write_str("]")
}

/// Displays a value as a literal: strings are quoted and escaped.
pub struct Literal<'a>(&'a Value);

impl fmt::Display for Literal<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self.0 {
            Value::Str(s) => s,
            Value::Array(items) => return write_elements(f, items),
            other => return write!(f, "{}", other),
        };
        f.write_str("\"")?;
        for c in s.chars() {
            match c {
                '"' => f.write_str("\\\"")?,
                '\\' => f.write_str("\\\\")?,
                '\n' => f.write_str("\\n")?,
                '\t' => f.write_str("\\t")?,
                '\r' => f.write_str("\\r")?,
                '\0' => f.write_str("\\0")?,
                c => write!(f, "{}", c)?,
            }
        }
        f.write_str("\"")
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items.into_iter().collect())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.into())
    }
}
