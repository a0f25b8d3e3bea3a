//! Whole-site build.
//!
//! A build runs in fixed order:
//!
//! 1. pre-convert hooks (may add virtual pages)
//! 2. stable sort by integer `sval`
//! 3. phase 1 and markup conversion for every page
//! 4. post-convert hooks
//! 5. phase 2 over the skeleton, link rewriting, un-escaping and writing,
//!    page by page
//!
//! The first error aborts the build; pages after the failing one are not
//! written.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

use quire_renderer::directive::unescape;
use quire_renderer::{ConverterRegistry, LinkError, LinkRewriter};
use quire_script::{Map, Value};

use crate::error::RenderError;
use crate::hooks::{BuildHook, PreConvert};
use crate::macros::{MacroTable, Namespace, RESERVED_CONTENT, RESERVED_ENCODING};
use crate::output::OutputSink;
use crate::page::{Attributes, Page};
use crate::renderer::expand;

/// Summary of a finished build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// URLs written, in render order.
    pub written: Vec<String>,
    /// URLs produced by more than one page. The last page wins.
    pub duplicates: Vec<String>,
}

/// Builder for [`Site`].
pub struct SiteBuilder {
    skeleton: String,
    pages: Vec<Page>,
    input_dir: PathBuf,
    defaults: Attributes,
    macros: MacroTable,
    extras: Map<'static>,
    converters: ConverterRegistry,
    base_url: String,
    output_encoding: String,
    hooks: BTreeMap<String, Box<dyn BuildHook>>,
}

impl SiteBuilder {
    /// Start a site with the given skeleton text.
    #[must_use]
    pub fn new(skeleton: impl Into<String>) -> Self {
        Self {
            skeleton: skeleton.into(),
            pages: Vec::new(),
            input_dir: PathBuf::new(),
            defaults: Attributes::new(),
            macros: MacroTable::new(),
            extras: Map::new(),
            converters: ConverterRegistry::default(),
            base_url: "/".to_owned(),
            output_encoding: "utf-8".to_owned(),
            hooks: BTreeMap::new(),
        }
    }

    /// Add a page.
    #[must_use]
    pub fn page(mut self, page: Page) -> Self {
        self.pages.push(page);
        self
    }

    /// Add pages in discovery order.
    #[must_use]
    pub fn pages(mut self, pages: impl IntoIterator<Item = Page>) -> Self {
        self.pages.extend(pages);
        self
    }

    /// Input directory virtual pages are placed in.
    #[must_use]
    pub fn input_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.input_dir = dir.into();
        self
    }

    /// Default attributes for virtual pages added by hooks.
    #[must_use]
    pub fn defaults(mut self, defaults: Attributes) -> Self {
        self.defaults = defaults;
        self
    }

    /// Site-global macro bindings.
    #[must_use]
    pub fn macros(mut self, macros: MacroTable) -> Self {
        self.macros = macros;
        self
    }

    /// Extra value visible to substitution and scripts.
    #[must_use]
    pub fn extra(mut self, name: impl Into<String>, value: impl Into<Value<'static>>) -> Self {
        self.extras.insert(name.into(), value.into());
        self
    }

    /// Markup converters.
    #[must_use]
    pub fn converters(mut self, converters: ConverterRegistry) -> Self {
        self.converters = converters;
        self
    }

    /// Base URL relative links are resolved against.
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Value of the `__encoding__` macro.
    #[must_use]
    pub fn output_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.output_encoding = encoding.into();
        self
    }

    /// Register a named build hook. A later hook of the same name replaces
    /// the earlier one.
    #[must_use]
    pub fn hook(self, name: impl Into<String>, hook: impl BuildHook + 'static) -> Self {
        self.boxed_hook(name, Box::new(hook))
    }

    /// Register an already boxed build hook.
    #[must_use]
    pub fn boxed_hook(mut self, name: impl Into<String>, hook: Box<dyn BuildHook>) -> Self {
        self.hooks.insert(name.into(), hook);
        self
    }

    /// Finish the site.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError`] if the base URL cannot be parsed.
    pub fn build(self) -> Result<Site, LinkError> {
        Ok(Site {
            links: LinkRewriter::new(&self.base_url)?,
            skeleton: self.skeleton,
            pages: self.pages,
            input_dir: self.input_dir,
            defaults: self.defaults,
            macros: self.macros,
            extras: self.extras,
            converters: self.converters,
            output_encoding: self.output_encoding,
            hooks: self.hooks,
        })
    }
}

/// Pages, skeleton and site-global settings of one build.
pub struct Site {
    skeleton: String,
    pages: Vec<Page>,
    input_dir: PathBuf,
    defaults: Attributes,
    macros: MacroTable,
    extras: Map<'static>,
    converters: ConverterRegistry,
    links: LinkRewriter,
    output_encoding: String,
    hooks: BTreeMap<String, Box<dyn BuildHook>>,
}

impl Site {
    /// Start building a site.
    #[must_use]
    pub fn builder(skeleton: impl Into<String>) -> SiteBuilder {
        SiteBuilder::new(skeleton)
    }

    /// Pages currently in the site.
    #[must_use]
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    /// Render every page and hand it to `sink`.
    ///
    /// # Errors
    ///
    /// Returns the first [`RenderError`]; no page after the failing one is
    /// written.
    pub fn build(mut self, sink: &mut dyn OutputSink) -> Result<BuildReport, RenderError> {
        for (name, hook) in &self.hooks {
            let mut ctx = PreConvert {
                pages: &mut self.pages,
                input_dir: &self.input_dir,
                defaults: &self.defaults,
            };
            hook.pre_convert(&mut ctx).map_err(|source| RenderError::Hook {
                name: name.clone(),
                source,
            })?;
        }

        let mut pages = sort_pages(self.pages)?;

        for page in &pages {
            tracing::info!(page = %page, "Converting");
            let namespace = Namespace::new(&pages, page, &self.macros, &self.extras)
                .with_reserved(RESERVED_ENCODING, self.output_encoding.as_str());
            let body = expand(page.body(), &namespace)?;
            page.store_rendered_body(self.converters.convert(page.kind(), &body));
        }

        for (name, hook) in &self.hooks {
            hook.post_convert(&mut pages).map_err(|source| RenderError::Hook {
                name: name.clone(),
                source,
            })?;
        }

        let mut report = BuildReport::default();
        let mut seen = HashSet::new();
        for page in &pages {
            tracing::info!(url = page.url(), "Rendering");
            let namespace = Namespace::new(&pages, page, &self.macros, &self.extras)
                .with_reserved(RESERVED_CONTENT, page.rendered_body().unwrap_or_default())
                .with_reserved(RESERVED_ENCODING, self.output_encoding.as_str());

            let html = expand(&self.skeleton, &namespace)?;
            let html = unescape(&self.links.rewrite(&html));

            if !seen.insert(page.url()) {
                tracing::warn!(url = page.url(), page = %page, "Several pages share this URL, the last one wins");
                report.duplicates.push(page.url().to_owned());
            }
            sink.write_page(page.url(), &html)
                .map_err(|source| RenderError::Write {
                    url: page.url().to_owned(),
                    source,
                })?;
            report.written.push(page.url().to_owned());
        }

        Ok(report)
    }
}

/// Stable sort by `sval`; a non-integer value is an error.
fn sort_pages(pages: Vec<Page>) -> Result<Vec<Page>, RenderError> {
    let mut keyed = pages
        .into_iter()
        .map(|page| page.sort_value().map(|key| (key, page)))
        .collect::<Result<Vec<_>, _>>()?;
    keyed.sort_by_key(|(key, _)| *key);
    Ok(keyed.into_iter().map(|(_, page)| page).collect())
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::error::HookError;
    use crate::output::MemorySink;

    fn page(rel_path: &str, raw: &str) -> Page {
        Page::new_virtual(Path::new("/in"), rel_path, raw, &Attributes::new(), Attributes::new())
    }

    #[test]
    fn test_end_to_end_title_in_heading() {
        let site = Site::builder("<html>{{ __content__ }}</html>")
            .page(page("index.md", "title: Home\n---\n## Hi {{ title }}"))
            .build()
            .unwrap();
        let mut sink = MemorySink::new();
        let report = site.build(&mut sink).unwrap();

        assert_eq!(report.written, vec!["index.html"]);
        assert_eq!(sink.get("index.html"), Some("<html><h2>Hi Home</h2>\n</html>"));
    }

    #[test]
    fn test_fatal_error_stops_later_pages() {
        let skeleton = "{{ __content__ }}{% if page.title == 'b':\n    print(1 // 0) %}";
        let site = Site::builder(skeleton)
            .page(page("a.html", "first"))
            .page(page("b.html", "second"))
            .page(page("c.html", "third"))
            .build()
            .unwrap();
        let mut sink = MemorySink::new();
        let err = site.build(&mut sink).unwrap_err();

        assert!(matches!(err, RenderError::Script { kind: "statements", .. }));
        assert_eq!(sink.get("a.html"), Some("first"));
        assert_eq!(sink.get("b.html"), None);
        assert_eq!(sink.get("c.html"), None);
    }

    #[test]
    fn test_fatal_error_in_body_prevents_all_output() {
        let site = Site::builder("{{ __content__ }}")
            .page(page("a.md", "ok"))
            .page(page("b.md", "{= 1 // 0 =}"))
            .page(page("c.md", "ok"))
            .build()
            .unwrap();
        let mut sink = MemorySink::new();
        assert!(site.build(&mut sink).is_err());
        assert!(sink.pages().is_empty());
    }

    #[test]
    fn test_pages_sorted_by_sval() {
        let site = Site::builder("")
            .page(page("c.md", "sval: 5\n---\n"))
            .page(page("a.md", ""))
            .page(page("b.md", "sval: -1\n---\n"))
            .page(page("d.md", ""))
            .build()
            .unwrap();
        let report = site.build(&mut MemorySink::new()).unwrap();
        assert_eq!(report.written, vec!["b.html", "a.html", "d.html", "c.html"]);
    }

    #[test]
    fn test_invalid_sval_is_fatal() {
        let site = Site::builder("")
            .page(page("a.md", "sval: high\n---\n"))
            .build()
            .unwrap();
        let err = site.build(&mut MemorySink::new()).unwrap_err();
        assert!(matches!(err, RenderError::InvalidOrdering { .. }));
    }

    #[test]
    fn test_skeleton_sees_other_pages_html() {
        let skeleton = "{= len([p for p in pages if p.html]) =}";
        let site = Site::builder(skeleton)
            .page(page("a.md", "A"))
            .page(page("b.md", "B"))
            .build()
            .unwrap();
        let mut sink = MemorySink::new();
        site.build(&mut sink).unwrap();
        assert_eq!(sink.get("a.html"), Some("2"));
    }

    #[test]
    fn test_links_rewritten_and_unescaped() {
        let site = Site::builder(r##"<a href="about.html">x</a><a href="/abs.html">y</a><a href="#top">z</a>\{{ kept }}"##)
            .page(page("index.md", ""))
            .base_url("http://example.com/blog/")
            .build()
            .unwrap();
        let mut sink = MemorySink::new();
        site.build(&mut sink).unwrap();
        assert_eq!(
            sink.get("index.html"),
            Some(r##"<a href="http://example.com/blog/about.html">x</a><a href="/abs.html">y</a><a href="#top">z</a>{{ kept }}"##)
        );
    }

    #[test]
    fn test_escaped_directive_in_body_survives_both_phases() {
        let site = Site::builder("{{ __content__ }}")
            .page(page("a.html", r"literal \{{ title }}"))
            .build()
            .unwrap();
        let mut sink = MemorySink::new();
        site.build(&mut sink).unwrap();
        assert_eq!(sink.get("a.html"), Some("literal {{ title }}"));
    }

    #[test]
    fn test_encoding_and_extras() {
        let site = Site::builder("{{ __encoding__ }} {{ base_url }}")
            .page(page("a.md", ""))
            .output_encoding("utf-8")
            .extra("base_url", "/docs/")
            .build()
            .unwrap();
        let mut sink = MemorySink::new();
        site.build(&mut sink).unwrap();
        assert_eq!(sink.get("a.html"), Some("utf-8 /docs/"));
    }

    #[test]
    fn test_duplicate_urls_last_wins() {
        let site = Site::builder("{{ __content__ }}")
            .page(page("a.md", "first"))
            .page(page("a.html", "second"))
            .build()
            .unwrap();
        let mut sink = MemorySink::new();
        let report = site.build(&mut sink).unwrap();
        assert_eq!(report.duplicates, vec!["a.html"]);
        assert_eq!(sink.get("a.html"), Some("second"));
    }

    struct TagPages;

    impl BuildHook for TagPages {
        fn pre_convert(&self, ctx: &mut PreConvert<'_>) -> Result<(), HookError> {
            let count = ctx.pages().len();
            ctx.add_virtual(
                "tags.md",
                "title: Tags\nsval: -1\n---\n",
                [("count", count.to_string())].into_iter().collect(),
            );
            Ok(())
        }

        fn post_convert(&self, pages: &mut [Page]) -> Result<(), HookError> {
            for page in pages.iter_mut() {
                let html = format!("[{}]", page.rendered_body().unwrap_or_default());
                page.set_rendered_body(html);
            }
            Ok(())
        }
    }

    struct Failing;

    impl BuildHook for Failing {
        fn post_convert(&self, _pages: &mut [Page]) -> Result<(), HookError> {
            Err(HookError("no".to_owned()))
        }
    }

    #[test]
    fn test_hooks_add_virtual_pages_and_rewrite_html() {
        let site = Site::builder("{{ title }}: {{ __content__ }} ({{ count }})")
            .page(page("a.html", "body"))
            .hook("tags", TagPages)
            .build()
            .unwrap();
        let mut sink = MemorySink::new();
        let report = site.build(&mut sink).unwrap();

        assert_eq!(report.written, vec!["tags.html", "a.html"]);
        assert_eq!(sink.get("tags.html"), Some("Tags: [] (1)"));
        assert_eq!(sink.get("a.html"), Some("a: [body] ()"));
    }

    #[test]
    fn test_hook_failure_is_fatal() {
        let site = Site::builder("")
            .page(page("a.md", ""))
            .hook("broken", Failing)
            .build()
            .unwrap();
        let err = site.build(&mut MemorySink::new()).unwrap_err();
        assert!(matches!(err, RenderError::Hook { ref name, .. } if name == "broken"));
    }

    #[test]
    fn test_menu_in_skeleton_marks_current() {
        let site = Site::builder("{{ menu tag=li }}")
            .page(page("a.md", "title: A\nmenu-position: 2\n---\n"))
            .page(page("b.md", "title: B\nmenu-position: 1\n---\n"))
            .page(page("c.md", "title: C\n---\n"))
            .build()
            .unwrap();
        let mut sink = MemorySink::new();
        site.build(&mut sink).unwrap();
        assert_eq!(
            sink.get("a.html"),
            Some("<li class=\"\"><a href=\"/b.html\">B</a></li>\n<li class=\"current\"><a href=\"/a.html\">A</a></li>")
        );
    }

    #[test]
    fn test_encoding_visible_in_body() {
        let site = Site::builder("{{ __content__ }}")
            .page(page("a.html", "enc={{ __encoding__ }} expr={= __encoding__.upper() =}"))
            .output_encoding("utf-8")
            .build()
            .unwrap();
        let mut sink = MemorySink::new();
        site.build(&mut sink).unwrap();
        assert_eq!(sink.get("a.html"), Some("enc=utf-8 expr=UTF-8"));
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(Site::builder("").base_url("http://[bad").build().is_err());
    }
}
