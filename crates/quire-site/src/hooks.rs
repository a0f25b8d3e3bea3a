//! Build hooks.
//!
//! Hooks run in name order. Pre-convert hooks see the page collection
//! before it is sorted and frozen and may add virtual pages. Post-convert
//! hooks run once every body is converted, before any skeleton is
//! rendered.

use std::path::Path;

use crate::error::HookError;
use crate::page::{Attributes, Page};

/// Mutable view of the page collection before conversion.
pub struct PreConvert<'s> {
    pub(crate) pages: &'s mut Vec<Page>,
    pub(crate) input_dir: &'s Path,
    pub(crate) defaults: &'s Attributes,
}

impl PreConvert<'_> {
    /// Pages collected so far.
    #[must_use]
    pub fn pages(&self) -> &[Page] {
        self.pages.as_slice()
    }

    /// Mutable access to the pages collected so far.
    pub fn pages_mut(&mut self) -> &mut [Page] {
        self.pages.as_mut_slice()
    }

    /// Add a virtual page built from `raw` text.
    ///
    /// Site defaults apply as for file pages; `attributes` override the
    /// page's front matter.
    pub fn add_virtual(&mut self, rel_path: &str, raw: &str, attributes: Attributes) -> &mut Page {
        let page = Page::new_virtual(self.input_dir, rel_path, raw, self.defaults, attributes);
        tracing::debug!(page = %page, "Added virtual page");
        self.pages.push(page);
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }
}

/// Code run at fixed points of a build.
pub trait BuildHook {
    /// Called before pages are sorted and converted.
    fn pre_convert(&self, ctx: &mut PreConvert<'_>) -> Result<(), HookError> {
        let _ = ctx;
        Ok(())
    }

    /// Called after all page bodies are converted.
    fn post_convert(&self, pages: &mut [Page]) -> Result<(), HookError> {
        let _ = pages;
        Ok(())
    }
}
