//! Source pages.

use std::cell::OnceCell;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use quire_script::{Object, Value};
use regex::Regex;

use crate::error::{MacroError, ProjectError, RenderError};
use crate::front_matter;

/// `title[.YYYY-MM-DD[.post]]` applied to the file stem.
static FILE_STEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+?)(?:\.([0-9]+-[0-9]+-[0-9]+)(?:\.(.*))?)?$").unwrap()
});

/// Attribute that orders pages before rendering.
pub const SORT_ATTRIBUTE: &str = "sval";

/// Attribute that places a page in the `menu` built-in.
pub const MENU_ATTRIBUTE: &str = "menu-position";

/// Intrinsic page fields visible next to the attributes.
const INTRINSIC_FIELDS: &[&str] = &["fname", "url", "html"];

/// Ordered string attributes. Inserting an existing key replaces its value
/// in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    entries: Vec<(String, String)>,
}

impl Attributes {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attributes from a TOML table; non-string values use their TOML text.
    #[must_use]
    pub fn from_toml(table: &toml::Table) -> Self {
        table
            .iter()
            .map(|(key, value)| {
                let text = match value {
                    toml::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (key.clone(), text)
            })
            .collect()
    }

    /// Value of `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Whether `key` is set.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Set `key`, replacing any previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Set `key` only if it is not set yet.
    pub fn insert_if_absent(&mut self, key: &str, value: impl Into<String>) {
        if !self.contains_key(key) {
            self.entries.push((key.to_owned(), value.into()));
        }
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no attributes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut attrs = Self::new();
        for (key, value) in iter {
            attrs.insert(key, value);
        }
        attrs
    }
}

/// One source content file (or a virtual page created by a hook).
///
/// Attribute precedence, lowest first: site defaults, front matter,
/// externally supplied attributes. Fields derived from the file name
/// (`title`, `date`, `post`) only fill gaps.
#[derive(Debug)]
pub struct Page {
    source_path: PathBuf,
    fname: String,
    url: String,
    kind: String,
    is_virtual: bool,
    attributes: Attributes,
    body: String,
    rendered_body: OnceCell<String>,
}

impl Page {
    /// Read a page file located below `input_dir`.
    pub fn from_file(
        path: &Path,
        input_dir: &Path,
        defaults: &Attributes,
    ) -> Result<Self, ProjectError> {
        let raw = std::fs::read_to_string(path).map_err(ProjectError::io(path))?;
        let rel_path = path
            .strip_prefix(input_dir)
            .unwrap_or(path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        Ok(Self::build(
            path.to_path_buf(),
            &rel_path,
            &raw,
            defaults,
            Attributes::new(),
            false,
        ))
    }

    /// Create a page from raw text that has no file.
    ///
    /// `rel_path` is relative to the input directory, e.g. `tags/rust.md`;
    /// it decides the page's URL and markup kind.
    #[must_use]
    pub fn new_virtual(
        input_dir: &Path,
        rel_path: &str,
        raw: &str,
        defaults: &Attributes,
        attributes: Attributes,
    ) -> Self {
        let rel_path = rel_path.trim_start_matches('/');
        Self::build(
            input_dir.join(rel_path),
            rel_path,
            raw,
            defaults,
            attributes,
            true,
        )
    }

    fn build(
        source_path: PathBuf,
        rel_path: &str,
        raw: &str,
        defaults: &Attributes,
        external: Attributes,
        is_virtual: bool,
    ) -> Self {
        let (block, body) = front_matter::split(raw);

        let mut attributes = defaults.clone();
        for (key, value) in front_matter::parse_attributes(block) {
            attributes.insert(key, value);
        }
        for (key, value) in external.entries {
            attributes.insert(key, value);
        }

        let (stem, kind) = split_extension(file_name(rel_path));
        if let Some(caps) = FILE_STEM.captures(stem) {
            let title = caps.get(1).map_or(stem, |m| m.as_str()).replace('_', " ");
            attributes.insert_if_absent("title", title);
            if let Some(date) = caps.get(2) {
                attributes.insert_if_absent("date", date.as_str());
            }
            if let Some(post) = caps.get(3) {
                attributes.insert_if_absent("post", post.as_str().replace('_', " "));
            }
        }

        let url = match rel_path.rsplit_once('.') {
            Some((base, _)) if !kind.is_empty() => format!("{base}.html"),
            _ => format!("{rel_path}.html"),
        };

        Self {
            fname: source_path.display().to_string(),
            source_path,
            url,
            kind: kind.to_ascii_lowercase(),
            is_virtual,
            attributes,
            body: body.to_owned(),
            rendered_body: OnceCell::new(),
        }
    }

    /// Absolute path of the source file.
    #[must_use]
    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    /// Site-relative URL of the output file, always with `/` separators.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Markup kind (lower-case source extension).
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Whether the page was created in memory.
    #[must_use]
    pub fn is_virtual(&self) -> bool {
        self.is_virtual
    }

    /// Page attributes including derived defaults.
    #[must_use]
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Mutable attributes, for build hooks.
    pub fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }

    /// Text following the front matter.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// HTML of the body once converted.
    #[must_use]
    pub fn rendered_body(&self) -> Option<&str> {
        self.rendered_body.get().map(String::as_str)
    }

    /// Replace the converted body (post-convert hooks).
    pub fn set_rendered_body(&mut self, html: impl Into<String>) {
        self.rendered_body = OnceCell::from(html.into());
    }

    /// Store the converted body. The first stored value is kept.
    pub(crate) fn store_rendered_body(&self, html: String) {
        if self.rendered_body.set(html).is_err() {
            tracing::debug!(page = %self, "Rendered body already set");
        }
    }

    /// Page title (derived from the file name unless set explicitly).
    #[must_use]
    pub fn title(&self) -> &str {
        self.get("title").unwrap_or_default()
    }

    /// Attribute or intrinsic field (`fname`, `url`, `html`) by name.
    ///
    /// Attributes win over intrinsic fields of the same name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        if let Some(value) = self.attributes.get(name) {
            return Some(value);
        }
        match name {
            "fname" => Some(&self.fname),
            "url" => Some(&self.url),
            "html" => Some(self.rendered_body().unwrap_or_default()),
            _ => None,
        }
    }

    /// Integer `sval` used to order pages (0 when unset).
    pub fn sort_value(&self) -> Result<i64, RenderError> {
        self.integer_attribute(SORT_ATTRIBUTE)
            .map(|value| value.unwrap_or(0))
            .map_err(|(attribute, value)| RenderError::InvalidOrdering {
                page: self.to_string(),
                attribute,
                value,
            })
    }

    /// Integer `menu-position`, if the page is in the menu.
    pub fn menu_position(&self) -> Result<Option<i64>, MacroError> {
        self.integer_attribute(MENU_ATTRIBUTE)
            .map_err(|(attribute, value)| MacroError::InvalidOrdering {
                page: self.to_string(),
                attribute,
                value,
            })
    }

    fn integer_attribute(&self, name: &str) -> Result<Option<i64>, (String, String)> {
        match self.attributes.get(name) {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .map(Some)
                .map_err(|_| (name.to_owned(), raw.to_owned())),
        }
    }
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_virtual {
            write!(f, "{} (virtual)", self.fname)
        } else {
            f.write_str(&self.fname)
        }
    }
}

impl Object for Page {
    fn type_name(&self) -> &'static str {
        "page"
    }

    fn field(&self, name: &str) -> Option<Value<'_>> {
        self.get(name).map(Value::from)
    }

    fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.attributes.iter().map(|(k, _)| k.to_owned()).collect();
        for field in INTRINSIC_FIELDS {
            if !self.attributes.contains_key(field) {
                keys.push((*field).to_owned());
            }
        }
        keys
    }

    fn display(&self) -> String {
        self.to_string()
    }
}

fn file_name(rel_path: &str) -> &str {
    rel_path.rsplit('/').next().unwrap_or(rel_path)
}

/// Split `name.ext` into `(name, ext)`; `ext` is empty without a dot.
fn split_extension(file_name: &str) -> (&str, &str) {
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, ext),
        _ => (file_name, ""),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use pretty_assertions::assert_eq;

    use super::*;

    fn page(rel_path: &str, raw: &str) -> Page {
        Page::new_virtual(Path::new("/site/input"), rel_path, raw, &Attributes::new(), Attributes::new())
    }

    #[test]
    fn test_attributes_and_body() {
        let p = page("index.md", "title: Home\n---\n## Hi {{ title }}");
        assert_eq!(p.title(), "Home");
        assert_eq!(p.body(), "## Hi {{ title }}");
        assert_eq!(p.url(), "index.html");
        assert_eq!(p.kind(), "md");
    }

    #[test]
    fn test_no_front_matter_body_unchanged() {
        let raw = "plain: looking line\nbut no separator\n";
        let p = page("about.md", raw);
        assert_eq!(p.body(), raw);
        assert_eq!(p.get("plain"), None);
        assert_eq!(p.title(), "about");
    }

    #[test]
    fn test_derived_fields_from_file_name() {
        let p = page("blog/blog.2013-04-08.Lorem_Ipsum.md", "body");
        assert_eq!(p.title(), "blog");
        assert_eq!(p.get("date"), Some("2013-04-08"));
        assert_eq!(p.get("post"), Some("Lorem Ipsum"));
        assert_eq!(p.url(), "blog/blog.2013-04-08.Lorem_Ipsum.html");
    }

    #[test]
    fn test_explicit_attributes_beat_derived() {
        let p = page("my_page.2020-01-01.slug.md", "title: Custom\ndate: 1999-12-31\n---\n");
        assert_eq!(p.title(), "Custom");
        assert_eq!(p.get("date"), Some("1999-12-31"));
        assert_eq!(p.get("post"), Some("slug"));
    }

    #[test]
    fn test_title_underscores_become_spaces() {
        assert_eq!(page("about_us.md", "").title(), "about us");
    }

    #[test]
    fn test_attribute_precedence() {
        let defaults: Attributes = [("author", "Site"), ("lang", "en"), ("title", "Default")]
            .into_iter()
            .collect();
        let external: Attributes = [("lang", "de")].into_iter().collect();
        let p = Page::new_virtual(
            Path::new("/in"),
            "x.md",
            "author: Page\nlang: fr\n---\n",
            &defaults,
            external,
        );
        assert_eq!(p.get("author"), Some("Page"));
        assert_eq!(p.get("lang"), Some("de"));
        assert_eq!(p.title(), "Default");
    }

    #[test]
    fn test_duplicate_keys_last_wins() {
        let p = page("x.md", "tag: a\ntag: b\n---\n");
        assert_eq!(p.get("tag"), Some("b"));
        assert_eq!(p.attributes().iter().filter(|(k, _)| *k == "tag").count(), 1);
    }

    #[test]
    fn test_virtual_display() {
        let p = page("tags/rust.md", "");
        assert_eq!(p.to_string(), format!("{} (virtual)", Path::new("/site/input/tags/rust.md").display()));
        assert!(p.is_virtual());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input");
        fs::create_dir_all(input.join("docs")).unwrap();
        let path = input.join("docs").join("guide.markdown");
        fs::write(&path, "sval: 3\n---\nText").unwrap();

        let p = Page::from_file(&path, &input, &Attributes::new()).unwrap();
        assert_eq!(p.url(), "docs/guide.html");
        assert_eq!(p.sort_value().unwrap(), 3);
        assert!(!p.is_virtual());
        assert_eq!(p.to_string(), path.display().to_string());
    }

    #[test]
    fn test_invalid_sort_value() {
        let p = page("x.md", "sval: first\n---\n");
        assert!(matches!(p.sort_value(), Err(RenderError::InvalidOrdering { .. })));
        assert_eq!(page("y.md", "").sort_value().unwrap(), 0);
    }

    #[test]
    fn test_menu_position() {
        assert_eq!(page("a.md", "menu-position: 2\n---\n").menu_position().unwrap(), Some(2));
        assert_eq!(page("b.md", "").menu_position().unwrap(), None);
        assert!(page("c.md", "menu-position: top\n---\n").menu_position().is_err());
    }

    #[test]
    fn test_intrinsic_fields() {
        let p = page("a.md", "");
        assert_eq!(p.get("url"), Some("a.html"));
        assert_eq!(p.get("html"), Some(""));
        p.store_rendered_body("<p>x</p>".to_owned());
        assert_eq!(p.get("html"), Some("<p>x</p>"));
        assert_eq!(Object::keys(&p), vec!["title", "fname", "url", "html"]);
    }

    #[test]
    fn test_attributes_from_toml() {
        let table: toml::Table = toml::from_str("author = \"Me\"\nweight = 3\n").unwrap();
        let attrs = Attributes::from_toml(&table);
        assert_eq!(attrs.get("author"), Some("Me"));
        assert_eq!(attrs.get("weight"), Some("3"));
    }
}
