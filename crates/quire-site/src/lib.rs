//! Pages, macros and the two-phase build pipeline for quire.
//!
//! A build turns a set of [`Page`]s and one shared skeleton into finished
//! HTML pages:
//!
//! 1. Phase 1 expands directives in each page body, then the body is
//!    converted to HTML by the converter registered for its extension.
//! 2. Phase 2 expands the skeleton for each page with `__content__` bound
//!    to the converted body.
//! 3. Relative links are resolved against the base URL, escaped directives
//!    are un-escaped, and the page is written.
//!
//! Variable references resolve through a per-page [`Namespace`]: page
//! attributes, reserved values, site-global [`MacroTable`] bindings and the
//! built-in `menu` and `posts` macros.
//!
//! # Example
//!
//! ```
//! use std::path::Path;
//!
//! use quire_site::{Attributes, MemorySink, Page, Site};
//!
//! let page = Page::new_virtual(
//!     Path::new("input"),
//!     "index.md",
//!     "title: Home\n---\n## Hi {{ title }}",
//!     &Attributes::new(),
//!     Attributes::new(),
//! );
//! let site = Site::builder("<html>{{ __content__ }}</html>")
//!     .page(page)
//!     .build()
//!     .unwrap();
//!
//! let mut sink = MemorySink::new();
//! site.build(&mut sink).unwrap();
//! assert_eq!(sink.get("index.html"), Some("<html><h2>Hi Home</h2>\n</html>"));
//! ```

mod error;
mod front_matter;
mod hooks;
pub mod macros;
mod output;
mod page;
mod project;
mod renderer;
mod site;

pub use error::{BuildError, HookError, MacroError, ProjectError, RenderError};
pub use hooks::{BuildHook, PreConvert};
pub use macros::{MacroBinding, MacroCall, MacroFn, MacroTable, Namespace};
pub use output::{FsSink, MemorySink, OutputSink};
pub use page::{Attributes, MENU_ATTRIBUTE, Page, SORT_ATTRIBUTE};
pub use project::{Project, ProjectReport, markdown_options};
pub use renderer::expand;
pub use site::{BuildReport, Site, SiteBuilder};
