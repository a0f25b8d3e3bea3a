//! Relative link rewriting.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use url::Url;

static LINK_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(\s)(href|src)="([^"]*)""#).expect("valid regex"));

static SCHEME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.-]*:").expect("valid regex"));

/// Host used to resolve against root-relative base URLs.
const PLACEHOLDER_ORIGIN: &str = "http://quire.invalid";

/// Error for an unusable base URL.
#[derive(Debug, thiserror::Error)]
#[error("invalid base URL '{url}': {source}")]
pub struct LinkError {
    url: String,
    #[source]
    source: url::ParseError,
}

/// Resolves relative `href="…"` and `src="…"` values against a base URL.
///
/// Values that are empty, absolute (`scheme:`), root-relative (`/`),
/// fragments (`#`) or start with `&` or `%` are left alone.
///
/// # Example
///
/// ```
/// use quire_renderer::LinkRewriter;
///
/// let rewriter = LinkRewriter::new("http://example.com/blog/").unwrap();
/// assert_eq!(
///     rewriter.rewrite(r#"<a href="about.html">"#),
///     r#"<a href="http://example.com/blog/about.html">"#
/// );
/// ```
#[derive(Debug, Clone)]
pub struct LinkRewriter {
    base: Url,
    root_relative: bool,
}

impl LinkRewriter {
    /// Create a rewriter for an absolute URL or a root-relative path.
    pub fn new(base_url: &str) -> Result<Self, LinkError> {
        let error = |source| LinkError {
            url: base_url.to_owned(),
            source,
        };

        match Url::parse(base_url) {
            Ok(base) => Ok(Self {
                base,
                root_relative: false,
            }),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let origin = Url::parse(PLACEHOLDER_ORIGIN).map_err(error)?;
                let base = origin.join(base_url).map_err(error)?;
                Ok(Self {
                    base,
                    root_relative: true,
                })
            }
            Err(e) => Err(error(e)),
        }
    }

    /// Rewrite all relative link attributes in `html`.
    #[must_use]
    pub fn rewrite(&self, html: &str) -> String {
        LINK_ATTR
            .replace_all(html, |caps: &Captures<'_>| {
                let value = &caps[3];
                let resolved = self.resolve(value);
                format!("{}{}=\"{}\"", &caps[1], &caps[2], resolved.as_deref().unwrap_or(value))
            })
            .into_owned()
    }

    fn resolve(&self, value: &str) -> Option<String> {
        if value.is_empty()
            || value.starts_with(['#', '/', '&', '%'])
            || SCHEME.is_match(value)
        {
            return None;
        }

        let joined = match self.base.join(value) {
            Ok(joined) => joined,
            Err(e) => {
                tracing::debug!(link = value, error = %e, "Leaving unresolvable link unchanged");
                return None;
            }
        };

        if !self.root_relative {
            return Some(joined.into());
        }

        let mut out = joined.path().to_owned();
        if let Some(query) = joined.query() {
            out.push('?');
            out.push_str(query);
        }
        if let Some(fragment) = joined.fragment() {
            out.push('#');
            out.push_str(fragment);
        }
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_relative_link_resolved() {
        let rewriter = LinkRewriter::new("http://example.com/blog/").unwrap();
        assert_eq!(
            rewriter.rewrite(r#"<a href="about.html">About</a>"#),
            r#"<a href="http://example.com/blog/about.html">About</a>"#
        );
    }

    #[test]
    fn test_absolute_root_and_fragment_untouched() {
        let rewriter = LinkRewriter::new("http://example.com/blog/").unwrap();
        let html = r##"<a href="/x.html">x</a> <a href="#frag">f</a> <img src="https://cdn.test/i.png"> <a href="mailto:a@b.c">m</a> <a href="">e</a>"##;
        assert_eq!(rewriter.rewrite(html), html);
    }

    #[test]
    fn test_src_and_parent_directories() {
        let rewriter = LinkRewriter::new("http://example.com/blog/").unwrap();
        assert_eq!(
            rewriter.rewrite("<img\nsrc=\"../img/a.png\">"),
            "<img\nsrc=\"http://example.com/img/a.png\">"
        );
    }

    #[test]
    fn test_attribute_needs_leading_whitespace() {
        let rewriter = LinkRewriter::new("http://example.com/").unwrap();
        assert_eq!(rewriter.rewrite(r#"data-href="a.html""#), r#"data-href="a.html""#);
    }

    #[test]
    fn test_root_relative_base() {
        let rewriter = LinkRewriter::new("/site/").unwrap();
        assert_eq!(
            rewriter.rewrite(r#"<a href="docs/a.html?x=1#top">"#),
            r#"<a href="/site/docs/a.html?x=1#top">"#
        );
    }

    #[test]
    fn test_invalid_base() {
        assert!(LinkRewriter::new("http://[broken").is_err());
    }
}
