//! Front matter splitting and attribute parsing.
//!
//! ```text
//! title: Home
//! description = A long value that
//!   continues on the next line
//! ---
//! Body text
//! ```

use std::sync::LazyLock;

use regex::Regex;

static SEPARATOR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^-{3,}[ \t]*\r?$").unwrap());

/// Split raw page text into `(attributes_block, body)`.
///
/// The first line of three or more dashes ends the attributes block; later
/// separator lines belong to the body. Without a separator the whole text is
/// body.
pub(crate) fn split(raw: &str) -> (&str, &str) {
    let mut offset = 0;
    for line in raw.split_inclusive('\n') {
        let content = line.strip_suffix('\n').unwrap_or(line);
        if SEPARATOR.is_match(content) {
            return (&raw[..offset], &raw[offset + line.len()..]);
        }
        offset += line.len();
    }
    ("", raw)
}

/// Parse an attributes block into ordered `(key, value)` pairs.
///
/// Entries look like `key: value` or `key = value`. Lines starting with a
/// space or tab continue the previous value and are joined with one space.
/// Lines without `:` or `=` are ignored. Duplicates are kept in order; the
/// caller's insert makes the last one win.
pub(crate) fn parse_attributes(block: &str) -> Vec<(String, String)> {
    let mut entries: Vec<(String, String)> = Vec::new();
    let mut current: Option<(String, String)> = None;

    for line in block.lines() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.starts_with([' ', '\t'])
            && let Some((_, value)) = current.as_mut()
        {
            let continuation = line.trim();
            if !continuation.is_empty() {
                if !value.is_empty() {
                    value.push(' ');
                }
                value.push_str(continuation);
            }
            continue;
        }

        entries.extend(current.take());
        match line.find([':', '=']) {
            Some(pos) if !line[..pos].trim().is_empty() => {
                current = Some((
                    line[..pos].trim().to_owned(),
                    line[pos + 1..].trim().to_owned(),
                ));
            }
            _ => {
                if !line.trim().is_empty() {
                    tracing::warn!(line, "Ignoring malformed front matter line");
                }
            }
        }
    }

    entries.extend(current);
    entries
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn test_split_without_separator() {
        let raw = "# Title\n\nJust body.\n";
        assert_eq!(split(raw), ("", raw));
    }

    #[test]
    fn test_split_at_first_separator_only() {
        let (attrs, body) = split("title: A\n---\nbody\n-----\nmore\n");
        assert_eq!(attrs, "title: A\n");
        assert_eq!(body, "body\n-----\nmore\n");
    }

    #[test]
    fn test_separator_variants() {
        assert_eq!(split("a: 1\n----  \nb"), ("a: 1\n", "b"));
        assert_eq!(split("a: 1\r\n---\r\nb"), ("a: 1\r\n", "b"));
        assert_eq!(split("a: 1\n---"), ("a: 1\n", ""));
        assert_eq!(split("a: 1\n-- \nb"), ("", "a: 1\n-- \nb"));
        assert_eq!(split("a: 1\n--- x\nb"), ("", "a: 1\n--- x\nb"));
    }

    #[test]
    fn test_parse_colon_and_equals() {
        assert_eq!(
            parse_attributes("title: Home\nmenu-position = 2\n"),
            pairs(&[("title", "Home"), ("menu-position", "2")])
        );
    }

    #[test]
    fn test_continuation_lines_joined() {
        assert_eq!(
            parse_attributes("description: first part\n    second part\n\tthird\nnext: x"),
            pairs(&[("description", "first part second part third"), ("next", "x")])
        );
    }

    #[test]
    fn test_value_may_contain_separators() {
        assert_eq!(
            parse_attributes("link: http://example.com/a=b"),
            pairs(&[("link", "http://example.com/a=b")])
        );
    }

    #[test]
    fn test_malformed_lines_ignored() {
        assert_eq!(
            parse_attributes("just words\n: no key\ntitle: ok"),
            pairs(&[("title", "ok")])
        );
    }

    #[test]
    fn test_empty_block() {
        assert!(parse_attributes("").is_empty());
    }
}
