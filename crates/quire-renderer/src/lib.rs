//! Markup conversion and text expansion primitives for quire.
//!
//! This crate knows nothing about pages or sites. It provides the pieces the
//! page pipeline is assembled from:
//!
//! - [`ConverterRegistry`]: markup converters keyed by file extension
//!   (markdown via pulldown-cmark, unknown kinds pass through)
//! - [`directive`]: the single-pass scanner for variable references and
//!   code blocks, plus the final un-escape pass
//! - [`LinkRewriter`]: resolves relative `href`/`src` values against a base URL
//! - [`escape_html`]: HTML escaping for text inserted into markup
//!
//! # Example
//!
//! ```
//! use quire_renderer::ConverterRegistry;
//!
//! let converters = ConverterRegistry::default();
//! assert!(converters.is_page("index.md"));
//! assert_eq!(converters.convert("md", "# Hi"), "<h1>Hi</h1>\n");
//! assert_eq!(converters.convert("txt", "# Hi"), "# Hi");
//! ```

mod convert;
pub mod directive;
mod html;
mod links;

pub use convert::{Converter, ConverterRegistry, MARKDOWN_EXTENSIONS, MarkdownConverter};
pub use html::escape_html;
pub use links::{LinkError, LinkRewriter};
