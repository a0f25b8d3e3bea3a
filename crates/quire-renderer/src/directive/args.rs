//! Macro reference parsing.
//!
//! Parses the `name key=value key2="quoted" key3='a, b'` syntax inside a
//! variable reference.

use std::collections::BTreeMap;
use std::fmt;

/// Argument value of a macro reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
    /// Plain string.
    Str(String),
    /// Comma-separated value, split and trimmed.
    List(Vec<String>),
}

impl ArgValue {
    fn parse(raw: &str) -> Self {
        if raw.contains(',') {
            Self::List(raw.split(',').map(|part| part.trim().to_owned()).collect())
        } else {
            Self::Str(raw.to_owned())
        }
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::List(items) => f.write_str(&items.join(",")),
        }
    }
}

/// Parsed body of a variable reference.
///
/// # Example
///
/// ```
/// use quire_renderer::directive::{ArgValue, MacroRef};
///
/// let r = MacroRef::parse(r#" menu tag="li" current=here "#);
/// assert_eq!(r.name, "menu");
/// assert_eq!(r.get("tag"), Some(&ArgValue::Str("li".to_owned())));
/// assert_eq!(r.get("current"), Some(&ArgValue::Str("here".to_owned())));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MacroRef {
    /// Macro name (empty if the reference was blank).
    pub name: String,
    /// Keyword arguments.
    pub args: BTreeMap<String, ArgValue>,
}

impl MacroRef {
    /// Parse a reference body. Never fails: unrecognized words are skipped.
    #[must_use]
    pub fn parse(body: &str) -> Self {
        let body = body.trim();
        let name_end = body.find(char::is_whitespace).unwrap_or(body.len());
        let mut reference = Self {
            name: body[..name_end].to_owned(),
            args: BTreeMap::new(),
        };

        let mut remaining = &body[name_end..];
        loop {
            remaining = remaining.trim_start();
            if remaining.is_empty() {
                break;
            }
            if let Some((key, value, rest)) = parse_key_value(remaining) {
                reference.args.insert(key.to_owned(), ArgValue::parse(value));
                remaining = rest;
            } else {
                // Skip an unrecognized word
                let end = remaining.find(char::is_whitespace).unwrap_or(remaining.len());
                remaining = &remaining[end..];
            }
        }

        reference
    }

    /// Get an argument by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ArgValue> {
        self.args.get(key)
    }
}

/// Parse `key="value"`, `key='value'` or `key=value` at the start of `s`.
///
/// Returns `(key, value, rest)`.
fn parse_key_value(s: &str) -> Option<(&str, &str, &str)> {
    let eq_pos = s.find('=')?;
    let key = &s[..eq_pos];
    if key.is_empty() || key.contains(char::is_whitespace) {
        return None;
    }

    let after_eq = &s[eq_pos + 1..];
    for quote in ['"', '\''] {
        if let Some(stripped) = after_eq.strip_prefix(quote) {
            let end_quote = stripped.find(quote)?;
            return Some((key, &stripped[..end_quote], &stripped[end_quote + 1..]));
        }
    }

    let end = after_eq.find(char::is_whitespace).unwrap_or(after_eq.len());
    Some((key, &after_eq[..end], &after_eq[end..]))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_name_only() {
        let r = MacroRef::parse("  title ");
        assert_eq!(r.name, "title");
        assert!(r.args.is_empty());
    }

    #[test]
    fn test_blank_reference() {
        assert_eq!(MacroRef::parse("   "), MacroRef::default());
    }

    #[test]
    fn test_quoted_values() {
        let r = MacroRef::parse(r#"menu tag="span class" current='on'"#);
        assert_eq!(r.get("tag"), Some(&ArgValue::Str("span class".to_owned())));
        assert_eq!(r.get("current"), Some(&ArgValue::Str("on".to_owned())));
    }

    #[test]
    fn test_comma_makes_list() {
        let r = MacroRef::parse(r#"tags only="rust, web,cli""#);
        assert_eq!(
            r.get("only"),
            Some(&ArgValue::List(vec![
                "rust".to_owned(),
                "web".to_owned(),
                "cli".to_owned()
            ]))
        );
        assert_eq!(r.get("only").unwrap().to_string(), "rust,web,cli");
    }

    #[test]
    fn test_unrecognized_words_skipped() {
        let r = MacroRef::parse("menu stray tag=li");
        assert_eq!(r.name, "menu");
        assert_eq!(r.args.len(), 1);
        assert_eq!(r.get("tag"), Some(&ArgValue::Str("li".to_owned())));
    }

    #[test]
    fn test_unterminated_quote_skipped() {
        let r = MacroRef::parse(r#"menu tag="li"#);
        assert!(r.args.is_empty());
    }
}
