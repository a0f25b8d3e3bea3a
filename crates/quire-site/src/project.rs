//! Project plumbing around a [`Site`] build.
//!
//! [`Project`] turns a loaded [`Config`] into files on disk: it checks the
//! layout, clears the output directory, discovers pages and pass-through
//! files, copies the latter, and renders the pages into the output
//! directory.

use std::fs;
use std::path::{Path, PathBuf};

use pulldown_cmark::Options;
use quire_config::{Config, MarkdownExtension};
use quire_renderer::{ConverterRegistry, MarkdownConverter};
use quire_script::Value;
use regex::Regex;

use crate::error::{BuildError, MacroError, ProjectError};
use crate::hooks::BuildHook;
use crate::macros::{MacroCall, MacroTable};
use crate::output::FsSink;
use crate::page::{Attributes, Page};
use crate::site::{BuildReport, Site};

/// Outcome of a project build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectReport {
    /// Rendered pages.
    pub pages: BuildReport,
    /// Site-relative paths of copied pass-through files.
    pub assets: Vec<String>,
}

/// Files found below the input directory.
#[derive(Debug, Default)]
struct Discovery {
    /// Site-relative directories, parents first.
    dirs: Vec<String>,
    /// Page sources.
    pages: Vec<PathBuf>,
    /// Pass-through files with their site-relative paths.
    assets: Vec<(PathBuf, String)>,
}

/// A site project on disk.
pub struct Project {
    config: Config,
    macros: MacroTable,
    hooks: Vec<(String, Box<dyn BuildHook>)>,
    converters: ConverterRegistry,
}

impl Project {
    /// Project for a loaded configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let options = markdown_options(&config.build.markdown_extensions);
        Self {
            macros: MacroTable::from_toml(&config.macros),
            converters: ConverterRegistry::new()
                .with_markdown(MarkdownConverter::new().with_options(options)),
            hooks: Vec::new(),
            config,
        }
    }

    /// Configuration the project was created from.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Bind a callable site macro.
    #[must_use]
    pub fn with_macro<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: for<'a> Fn(&MacroCall<'a>) -> Result<Value<'a>, MacroError> + Send + Sync + 'static,
    {
        self.macros.insert_fn(name, f);
        self
    }

    /// Register a named build hook.
    #[must_use]
    pub fn with_hook(mut self, name: impl Into<String>, hook: impl BuildHook + 'static) -> Self {
        self.hooks.push((name.into(), Box::new(hook)));
        self
    }

    /// Replace the markup converters.
    #[must_use]
    pub fn with_converters(mut self, converters: ConverterRegistry) -> Self {
        self.converters = converters;
        self
    }

    /// Build the whole site into the output directory.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectError::MissingPath`] before touching anything if the
    /// skeleton, input or output directory is missing. Render errors abort
    /// the build; the output directory is then left partially written.
    pub fn build(self) -> Result<ProjectReport, BuildError> {
        let layout = &self.config.project_resolved;
        for path in [&layout.skeleton, &layout.input_dir, &layout.output_dir] {
            if !path.exists() {
                return Err(ProjectError::MissingPath(path.clone()).into());
            }
        }

        let ignore = Regex::new(&self.config.build.ignore).map_err(ProjectError::from)?;
        clear_dir(&layout.output_dir)?;

        let mut discovery = Discovery::default();
        discover(&layout.input_dir, "", &ignore, &self.converters, &mut discovery)?;
        tracing::info!(
            pages = discovery.pages.len(),
            assets = discovery.assets.len(),
            "Discovered input files"
        );

        for dir in &discovery.dirs {
            let target = layout.output_dir.join(dir);
            fs::create_dir_all(&target).map_err(ProjectError::io(&target))?;
        }
        let mut assets = Vec::with_capacity(discovery.assets.len());
        for (source, rel_path) in discovery.assets {
            let target = layout.output_dir.join(&rel_path);
            tracing::debug!(file = %rel_path, "Copying");
            fs::copy(&source, &target).map_err(ProjectError::io(&target))?;
            assets.push(rel_path);
        }

        let defaults = Attributes::from_toml(&self.config.page);
        let pages = discovery
            .pages
            .iter()
            .map(|path| Page::from_file(path, &layout.input_dir, &defaults))
            .collect::<Result<Vec<_>, _>>()?;
        let skeleton =
            fs::read_to_string(&layout.skeleton).map_err(ProjectError::io(&layout.skeleton))?;

        let mut builder = Site::builder(skeleton)
            .pages(pages)
            .input_dir(&layout.input_dir)
            .defaults(defaults)
            .macros(self.macros)
            .converters(self.converters)
            .base_url(self.config.build.base_url.as_str())
            .output_encoding(self.config.build.output_encoding.as_str())
            .extra("base_url", self.config.build.base_url.as_str())
            .extra("input", layout.input_dir.display().to_string())
            .extra("output", layout.output_dir.display().to_string());
        for (name, hook) in self.hooks {
            builder = builder.boxed_hook(name, hook);
        }

        let mut sink = FsSink::new(&layout.output_dir);
        let pages = builder.build()?.build(&mut sink)?;
        Ok(ProjectReport { pages, assets })
    }
}

/// pulldown-cmark options for the configured extensions.
#[must_use]
pub fn markdown_options(extensions: &[MarkdownExtension]) -> Options {
    extensions
        .iter()
        .fold(Options::empty(), |options, extension| {
            options
                | match extension {
                    MarkdownExtension::Tables => Options::ENABLE_TABLES,
                    MarkdownExtension::Footnotes => Options::ENABLE_FOOTNOTES,
                    MarkdownExtension::Strikethrough => Options::ENABLE_STRIKETHROUGH,
                    MarkdownExtension::Tasklists => Options::ENABLE_TASKLISTS,
                    MarkdownExtension::SmartPunctuation => Options::ENABLE_SMART_PUNCTUATION,
                    MarkdownExtension::HeadingAttributes => Options::ENABLE_HEADING_ATTRIBUTES,
                }
        })
}

/// Remove everything inside `dir`, keeping `dir` itself.
fn clear_dir(dir: &Path) -> Result<(), ProjectError> {
    for entry in fs::read_dir(dir).map_err(ProjectError::io(dir))? {
        let path = entry.map_err(ProjectError::io(dir))?.path();
        let result = if path.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        result.map_err(ProjectError::io(&path))?;
    }
    Ok(())
}

/// Walk `dir` (site-relative `prefix`), skipping ignored entries.
///
/// Ignored directories are not descended into. Entries are visited in
/// name order.
fn discover(
    dir: &Path,
    prefix: &str,
    ignore: &Regex,
    converters: &ConverterRegistry,
    found: &mut Discovery,
) -> Result<(), ProjectError> {
    let mut entries = fs::read_dir(dir)
        .map_err(ProjectError::io(dir))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(ProjectError::io(dir))?;
    entries.sort_by_key(fs::DirEntry::file_name);

    for entry in entries {
        let name = entry.file_name().to_string_lossy().into_owned();
        let rel_path = if prefix.is_empty() {
            name
        } else {
            format!("{prefix}/{name}")
        };
        if ignore.is_match(&rel_path) {
            tracing::debug!(path = %rel_path, "Ignoring");
            continue;
        }

        let path = entry.path();
        if path.is_dir() {
            found.dirs.push(rel_path.clone());
            discover(&path, &rel_path, ignore, converters, found)?;
        } else if converters.is_page(&path) {
            found.pages.push(path);
        } else {
            found.assets.push((path, rel_path));
        }
    }
    Ok(())
}
