//! Runtime value types for Skript.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::class::ClassId;
use crate::timespan::Timespan;

/// A runtime value in Skript.
///
/// Scripts are loosely typed: every value knows its [`ClassId`] and the
/// registries decide how it may be converted or compared.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Boolean value.
    Boolean(bool),
    /// Numeric value (all numbers are f64 in Skript).
    Number(f64),
    /// Text/string value.
    Text(String),
    /// A duration.
    Timespan(Timespan),
    /// Any other registered type, e.g. a player or a block.
    Object(Object),
}

/// A handle to a host object tagged with its registered class.
///
/// Cloning is cheap; two objects are equal only if they share the same
/// allocation.
#[derive(Clone)]
pub struct Object {
    class: ClassId,
    data: Arc<dyn Any + Send + Sync>,
}

impl Object {
    pub fn new<T: Any + Send + Sync>(class: ClassId, data: T) -> Self {
        Self {
            class,
            data: Arc::new(data),
        }
    }

    #[must_use]
    pub const fn class(&self) -> ClassId {
        self.class
    }

    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.data.downcast_ref()
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.class == other.class && Arc::ptr_eq(&self.data, &other.data)
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("class", &self.class)
            .finish_non_exhaustive()
    }
}

impl Value {
    /// Wrap a host object.
    pub fn object<T: Any + Send + Sync>(class: ClassId, data: T) -> Self {
        Self::Object(Object::new(class, data))
    }

    /// The runtime class of this value.
    #[must_use]
    pub const fn class(&self) -> ClassId {
        match self {
            Self::Boolean(_) => ClassId::BOOLEAN,
            Self::Number(_) => ClassId::NUMBER,
            Self::Text(_) => ClassId::TEXT,
            Self::Timespan(_) => ClassId::TIMESPAN,
            Self::Object(o) => o.class(),
        }
    }

    /// Borrow the host object behind this value, if it has the given type.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Self::Object(o) => o.downcast_ref(),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_timespan(&self) -> Option<Timespan> {
        match self {
            Self::Timespan(t) => Some(*t),
            _ => None,
        }
    }

    /// Convert to boolean (truthiness).
    #[must_use]
    pub fn as_boolean(&self) -> bool {
        match self {
            Self::Boolean(b) => *b,
            Self::Number(n) => *n != 0.0,
            Self::Text(s) => !s.is_empty(),
            Self::Timespan(t) => t.millis() != 0,
            Self::Object(_) => true,
        }
    }

    /// Convert to number.
    #[must_use]
    pub fn as_number(&self) -> f64 {
        match self {
            Self::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Self::Number(n) => *n,
            Self::Text(s) => s.trim().parse().unwrap_or(0.0),
            Self::Timespan(t) => t.millis() as f64,
            Self::Object(_) => 0.0,
        }
    }

    /// Convert to text without consulting any registered parser.
    ///
    /// Use [`crate::ClassRegistry::to_string`] when a class-specific
    /// representation is wanted.
    #[must_use]
    pub fn as_text(&self) -> String {
        match self {
            Self::Boolean(b) => b.to_string(),
            Self::Number(n) => format_number(*n),
            Self::Text(s) => s.clone(),
            Self::Timespan(t) => t.to_string(),
            Self::Object(o) => format!("object:{}", o.class().as_raw()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Timespan> for Value {
    fn from(t: Timespan) -> Self {
        Self::Timespan(t)
    }
}

/// Format a number for display, avoiding unnecessary decimals.
pub(crate) fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boolean_conversion() {
        assert!(!Value::Boolean(false).as_boolean());
        assert!(Value::Boolean(true).as_boolean());
        assert!(!Value::Number(0.0).as_boolean());
        assert!(Value::Number(1.0).as_boolean());
        assert!(!Value::Text(String::new()).as_boolean());
        assert!(Value::Text("hello".to_string()).as_boolean());
    }

    #[test]
    fn test_number_conversion() {
        assert!((Value::Boolean(true).as_number() - 1.0).abs() < f64::EPSILON);
        assert!((Value::Number(42.0).as_number() - 42.0).abs() < f64::EPSILON);
        assert!((Value::Text("3.15".to_string()).as_number() - 3.15).abs() < f64::EPSILON);
    }

    #[test]
    fn test_text_conversion() {
        assert_eq!(Value::Number(3.0).as_text(), "3");
        assert_eq!(Value::Number(2.5).as_text(), "2.5");
        assert_eq!(Value::Timespan(Timespan::from_ticks(2)).as_text(), "2 ticks");
    }

    #[test]
    fn test_object_identity() {
        let class = ClassId::from_raw(42);
        let a = Value::object(class, String::from("steve"));
        let b = a.clone();
        let c = Value::object(class, String::from("steve"));

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.class(), class);
        assert_eq!(a.downcast_ref::<String>().map(String::as_str), Some("steve"));
        assert!(a.downcast_ref::<u32>().is_none());
    }
}
