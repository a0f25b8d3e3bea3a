//! Markup converters keyed by file extension.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use pulldown_cmark::{Options, Parser, html};

/// File extensions handled by the markdown converter.
pub const MARKDOWN_EXTENSIONS: &[&str] = &["md", "mkd", "mdown", "markdown"];

/// Converts one markup kind to HTML.
pub trait Converter: Send + Sync {
    /// Convert source text to HTML.
    fn convert(&self, text: &str) -> String;
}

/// Markdown to HTML using pulldown-cmark.
#[derive(Debug, Clone, Copy)]
pub struct MarkdownConverter {
    options: Options,
}

impl Default for MarkdownConverter {
    fn default() -> Self {
        Self {
            options: Options::empty(),
        }
    }
}

impl MarkdownConverter {
    /// Create a converter with plain `CommonMark` (no extensions).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set pulldown-cmark parser options (tables, footnotes, ...).
    #[must_use]
    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Parser options in use.
    #[must_use]
    pub fn options(&self) -> Options {
        self.options
    }
}

impl Converter for MarkdownConverter {
    fn convert(&self, text: &str) -> String {
        let parser = Parser::new_ext(text, self.options);
        let mut out = String::with_capacity(text.len() * 3 / 2);
        html::push_html(&mut out, parser);
        out
    }
}

/// Registry of converters by lower-case file extension.
///
/// A source file is a page exactly when its extension has a converter.
/// Converting an unknown kind returns the text unchanged.
#[derive(Clone)]
pub struct ConverterRegistry {
    converters: HashMap<String, Arc<dyn Converter>>,
}

impl ConverterRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            converters: HashMap::new(),
        }
    }

    /// Register `converter` for all markdown extensions.
    #[must_use]
    pub fn with_markdown(mut self, converter: MarkdownConverter) -> Self {
        let converter: Arc<dyn Converter> = Arc::new(converter);
        for ext in MARKDOWN_EXTENSIONS {
            self.converters
                .insert((*ext).to_owned(), Arc::clone(&converter));
        }
        self
    }

    /// Register a converter for one extension (without the dot).
    pub fn register(&mut self, extension: &str, converter: Arc<dyn Converter>) {
        self.converters
            .insert(extension.to_ascii_lowercase(), converter);
    }

    /// Whether a file at `path` is a page, i.e. its extension has a converter.
    #[must_use]
    pub fn is_page(&self, path: impl AsRef<Path>) -> bool {
        Self::kind_of(path.as_ref()).is_some_and(|kind| self.converters.contains_key(&kind))
    }

    /// Markup kind (lower-case extension) of a path.
    #[must_use]
    pub fn kind_of(path: &Path) -> Option<String> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
    }

    /// Convert `text` of markup `kind` to HTML.
    ///
    /// Unknown kinds are treated as HTML already and returned unchanged.
    #[must_use]
    pub fn convert(&self, kind: &str, text: &str) -> String {
        match self.converters.get(&kind.to_ascii_lowercase()) {
            Some(converter) => converter.convert(text),
            None => text.to_owned(),
        }
    }
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        Self::new().with_markdown(MarkdownConverter::new())
    }
}

impl fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<&String> = self.converters.keys().collect();
        kinds.sort();
        f.debug_struct("ConverterRegistry")
            .field("kinds", &kinds)
            .finish()
    }
}
