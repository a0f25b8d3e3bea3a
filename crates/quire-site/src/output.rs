//! Destinations for rendered pages.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Receives finished pages.
pub trait OutputSink {
    /// Write `html` for the page at site-relative `url`.
    fn write_page(&mut self, url: &str, html: &str) -> io::Result<()>;
}

/// Writes pages below an output directory, creating parent directories.
#[derive(Debug, Clone)]
pub struct FsSink {
    root: PathBuf,
}

impl FsSink {
    /// Sink rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Output directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File path for a site-relative URL.
    #[must_use]
    pub fn path_for(&self, url: &str) -> PathBuf {
        url.split('/')
            .filter(|segment| !segment.is_empty())
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }
}

impl OutputSink for FsSink {
    fn write_page(&mut self, url: &str, html: &str) -> io::Result<()> {
        let path = self.path_for(url);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, html)?;
        tracing::debug!(path = %path.display(), "Wrote page");
        Ok(())
    }
}

/// Keeps pages in memory, keyed by URL.
#[derive(Debug, Default)]
pub struct MemorySink {
    pages: BTreeMap<String, String>,
}

impl MemorySink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// HTML written for `url`.
    #[must_use]
    pub fn get(&self, url: &str) -> Option<&str> {
        self.pages.get(url).map(String::as_str)
    }

    /// All written pages.
    #[must_use]
    pub fn pages(&self) -> &BTreeMap<String, String> {
        &self.pages
    }
}

impl OutputSink for MemorySink {
    fn write_page(&mut self, url: &str, html: &str) -> io::Result<()> {
        self.pages.insert(url.to_owned(), html.to_owned());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_fs_sink_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FsSink::new(dir.path());
        sink.write_page("blog/2024/post.html", "<p>x</p>").unwrap();

        let written = fs::read_to_string(dir.path().join("blog/2024/post.html")).unwrap();
        assert_eq!(written, "<p>x</p>");
    }

    #[test]
    fn test_fs_sink_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FsSink::new(dir.path());
        sink.write_page("index.html", "one").unwrap();
        sink.write_page("index.html", "two").unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("index.html")).unwrap(), "two");
    }

    #[test]
    fn test_memory_sink() {
        let mut sink = MemorySink::new();
        sink.write_page("a.html", "A").unwrap();
        assert_eq!(sink.get("a.html"), Some("A"));
        assert_eq!(sink.pages().len(), 1);
    }
}
