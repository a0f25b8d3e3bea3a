//! Runtime values.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use crate::ScriptError;

/// String-keyed map value.
pub type Map<'a> = BTreeMap<String, Value<'a>>;

/// Host object exposed to scripts (e.g. a page).
///
/// Objects are read-only: scripts access them with `obj.field`,
/// `obj["field"]`, `obj.get("field", default)` and `"field" in obj`.
pub trait Object: fmt::Debug {
    /// Type name used in error messages.
    fn type_name(&self) -> &'static str;

    /// Look up a field by name.
    fn field(&self, name: &str) -> Option<Value<'_>>;

    /// Names of all fields, in a stable order.
    fn keys(&self) -> Vec<String>;

    /// Whether the object has a field of this name.
    fn contains(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Text form used by `str()` and substitution.
    fn display(&self) -> String;
}

/// A script value.
#[derive(Clone, Debug, Default)]
pub enum Value<'a> {
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value<'a>>),
    Map(Map<'a>),
    Object(&'a dyn Object),
}

impl<'a> Value<'a> {
    /// Type name used in error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Object(obj) => obj.type_name(),
        }
    }

    /// Truthiness: empty containers, zero, empty string and none are false.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::None => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::Str(s) => !s.is_empty(),
            Self::List(items) => !items.is_empty(),
            Self::Map(map) => !map.is_empty(),
            Self::Object(_) => true,
        }
    }

    /// Borrow as a string slice if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Look up a field or key: map entries and object fields.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<Value<'a>> {
        match self {
            Self::Map(map) => map.get(name).cloned(),
            Self::Object(obj) => obj.field(name),
            _ => None,
        }
    }

    /// Convert to a list of items for iteration.
    ///
    /// Strings iterate over characters, maps and objects over their keys.
    pub fn iter_items(&self) -> Result<Vec<Value<'a>>, ScriptError> {
        match self {
            Self::List(items) => Ok(items.clone()),
            Self::Str(s) => Ok(s.chars().map(|c| Self::Str(c.to_string())).collect()),
            Self::Map(map) => Ok(map.keys().cloned().map(Self::Str).collect()),
            Self::Object(obj) => Ok(obj.keys().into_iter().map(Self::Str).collect()),
            other => Err(ScriptError::type_error(format!(
                "'{}' object is not iterable",
                other.type_name()
            ))),
        }
    }

    /// Membership test used by the `in` operator.
    pub fn contains(&self, needle: &Value<'a>) -> Result<bool, ScriptError> {
        match (self, needle) {
            (Self::Str(haystack), Self::Str(needle)) => Ok(haystack.contains(needle.as_str())),
            (Self::List(items), _) => Ok(items.iter().any(|item| item == needle)),
            (Self::Map(map), Self::Str(key)) => Ok(map.contains_key(key)),
            (Self::Object(obj), Self::Str(key)) => Ok(obj.contains(key)),
            (container, needle) => Err(ScriptError::type_error(format!(
                "'in <{}>' requires a compatible left operand, not '{}'",
                container.type_name(),
                needle.type_name()
            ))),
        }
    }

    /// Ordering for `<`, `>`, `sorted()`, `min()` and `max()`.
    pub fn compare(&self, other: &Value<'a>) -> Result<Ordering, ScriptError> {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => Ok(a.cmp(b)),
            (Self::Int(_) | Self::Float(_), Self::Int(_) | Self::Float(_)) => {
                let (a, b) = (self.as_f64(), other.as_f64());
                a.partial_cmp(&b)
                    .ok_or_else(|| ScriptError::Value("cannot order NaN".to_owned()))
            }
            (Self::Str(a), Self::Str(b)) => Ok(a.cmp(b)),
            (Self::Bool(a), Self::Bool(b)) => Ok(a.cmp(b)),
            (Self::List(a), Self::List(b)) => {
                for (x, y) in a.iter().zip(b) {
                    let ord = x.compare(y)?;
                    if ord != Ordering::Equal {
                        return Ok(ord);
                    }
                }
                Ok(a.len().cmp(&b.len()))
            }
            (a, b) => Err(ScriptError::type_error(format!(
                "'<' not supported between instances of '{}' and '{}'",
                a.type_name(),
                b.type_name()
            ))),
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn as_f64(&self) -> f64 {
        match self {
            Self::Int(i) => *i as f64,
            Self::Float(f) => *f,
            _ => f64::NAN,
        }
    }
}

impl PartialEq for Value<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Int(_) | Self::Float(_), Self::Int(_) | Self::Float(_)) => {
                self.as_f64() == other.as_f64()
            }
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => std::ptr::addr_eq(*a, *b),
            _ => false,
        }
    }
}

/// Canonical text form. Whole floats keep one fractional digit (`2.0`).
impl fmt::Display for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) if x.is_finite() && x.fract() == 0.0 => write!(f, "{x:.1}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Str(s) => f.write_str(s),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Map(map) => {
                f.write_str("{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                f.write_str("}")
            }
            Self::Object(obj) => f.write_str(&obj.display()),
        }
    }
}

impl From<&str> for Value<'_> {
    fn from(s: &str) -> Self {
        Self::Str(s.to_owned())
    }
}

impl From<String> for Value<'_> {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for Value<'_> {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<bool> for Value<'_> {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value<'_> {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl<'a> From<Vec<Value<'a>>> for Value<'a> {
    fn from(items: Vec<Value<'a>>) -> Self {
        Self::List(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Card;

    impl Object for Card {
        fn type_name(&self) -> &'static str {
            "card"
        }

        fn field(&self, name: &str) -> Option<Value<'_>> {
            (name == "suit").then(|| Value::from("hearts"))
        }

        fn keys(&self) -> Vec<String> {
            vec!["suit".to_owned()]
        }

        fn display(&self) -> String {
            "card".to_owned()
        }
    }

    #[test]
    fn test_display_canonical_forms() {
        assert_eq!(Value::None.to_string(), "");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::Int(-3).to_string(), "-3");
        assert_eq!(Value::Float(2.5).to_string(), "2.5");
        assert_eq!(Value::Float(2.0).to_string(), "2.0");
        assert_eq!(Value::Float(-0.0).to_string(), "-0.0");
        assert_eq!(
            Value::List(vec![Value::Int(1), Value::from("a")]).to_string(),
            "[1, a]"
        );
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::None.is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(Value::from("x").is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(!Value::List(Vec::new()).is_truthy());
        assert!(Value::Object(&Card).is_truthy());
    }

    #[test]
    fn test_numeric_equality_across_types() {
        assert_eq!(Value::Int(2), Value::Float(2.0));
        assert_ne!(Value::Int(2), Value::from("2"));
    }

    #[test]
    fn test_object_membership_and_fields() {
        let card = Card;
        let value = Value::Object(&card);
        assert!(value.contains(&Value::from("suit")).unwrap());
        assert!(!value.contains(&Value::from("rank")).unwrap());
        assert_eq!(value.field("suit"), Some(Value::from("hearts")));
    }

    #[test]
    fn test_compare_mixed_types_errors() {
        assert!(Value::Int(1).compare(&Value::from("a")).is_err());
        assert_eq!(
            Value::Int(1).compare(&Value::Float(1.5)).unwrap(),
            Ordering::Less
        );
    }

    #[test]
    fn test_iterate_non_iterable() {
        assert!(Value::Int(3).iter_items().is_err());
        assert_eq!(Value::from("ab").iter_items().unwrap().len(), 2);
    }
}
