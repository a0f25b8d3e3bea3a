//! Macro bindings and per-page namespaces.
//!
//! A [`MacroTable`] holds the site-global bindings: plain values (usually
//! from the `[macros]` table of `quire.toml`) and callables registered by
//! the embedding program. Each page gets its own [`Namespace`] that layers
//! the page, the reserved build values, the site table and the built-in
//! macros.

mod builtins;
mod namespace;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use quire_script::{Map, Value};

use crate::Page;
use crate::error::MacroError;

pub use namespace::{Namespace, RESERVED_CONTENT, RESERVED_ENCODING};

/// Arguments passed to a callable macro.
#[derive(Debug)]
pub struct MacroCall<'a> {
    /// All pages of the build, in render order.
    pub pages: &'a [Page],
    /// Page being rendered.
    pub page: &'a Page,
    /// Keyword arguments.
    pub args: Map<'a>,
}

impl MacroCall<'_> {
    /// String argument, or `default` when absent.
    #[must_use]
    pub fn str_arg(&self, name: &str, default: &str) -> String {
        self.args
            .get(name)
            .map_or_else(|| default.to_owned(), ToString::to_string)
    }
}

/// Signature of a callable macro.
pub type MacroFn =
    dyn for<'a> Fn(&MacroCall<'a>) -> Result<Value<'a>, MacroError> + Send + Sync;

/// A site-global binding.
#[derive(Clone)]
pub enum MacroBinding {
    /// Plain value, stringified on substitution.
    Value(Value<'static>),
    /// Function called with the page collection, the current page and
    /// keyword arguments.
    Callable(Arc<MacroFn>),
}

impl fmt::Debug for MacroBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Callable(_) => f.write_str("Callable(..)"),
        }
    }
}

/// Named site-global macro bindings.
#[derive(Debug, Clone, Default)]
pub struct MacroTable {
    bindings: BTreeMap<String, MacroBinding>,
}

impl MacroTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Plain-value bindings from a TOML table.
    #[must_use]
    pub fn from_toml(table: &toml::Table) -> Self {
        let mut macros = Self::new();
        for (name, value) in table {
            macros.insert_value(name.clone(), toml_to_value(value));
        }
        macros
    }

    /// Bind `name` to a plain value.
    pub fn insert_value(&mut self, name: impl Into<String>, value: impl Into<Value<'static>>) {
        self.bindings
            .insert(name.into(), MacroBinding::Value(value.into()));
    }

    /// Bind `name` to a callable.
    pub fn insert_fn<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: for<'a> Fn(&MacroCall<'a>) -> Result<Value<'a>, MacroError> + Send + Sync + 'static,
    {
        self.bindings
            .insert(name.into(), MacroBinding::Callable(Arc::new(f)));
    }

    /// Binding for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&MacroBinding> {
        self.bindings.get(name)
    }

    /// Number of bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

fn toml_to_value(value: &toml::Value) -> Value<'static> {
    match value {
        toml::Value::String(s) => Value::Str(s.clone()),
        toml::Value::Integer(i) => Value::Int(*i),
        toml::Value::Float(f) => Value::Float(*f),
        toml::Value::Boolean(b) => Value::Bool(*b),
        toml::Value::Datetime(dt) => Value::Str(dt.to_string()),
        toml::Value::Array(items) => Value::List(items.iter().map(toml_to_value).collect()),
        toml::Value::Table(table) => Value::Map(
            table
                .iter()
                .map(|(k, v)| (k.clone(), toml_to_value(v)))
                .collect(),
        ),
    }
}
