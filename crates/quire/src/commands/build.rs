//! `quire build` command implementation.

use std::path::PathBuf;

use clap::Args;
use quire_config::{CliSettings, Config, MarkdownExtension};
use quire_site::Project;

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the build command.
#[derive(Args)]
pub(crate) struct BuildArgs {
    /// Project directory holding `input/`, `output/` and `page.html`
    /// (default: directory of the discovered quire.toml, or the current directory).
    project: Option<PathBuf>,

    /// Path to configuration file (default: auto-discover quire.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Base URL for resolving relative links (overrides config).
    #[arg(short, long, env = "QUIRE_BASE_URL")]
    base_url: Option<String>,

    /// Regex of site-relative paths to skip (overrides config).
    #[arg(short, long)]
    ignore: Option<String>,

    /// Enable a markdown extension (repeatable).
    #[arg(long = "md-ext", value_name = "EXTENSION")]
    markdown_extensions: Vec<MarkdownExtension>,

    /// Enable verbose output (log every converted and rendered page).
    #[arg(short, long)]
    pub verbose: bool,
}

impl BuildArgs {
    fn cli_settings(&self) -> CliSettings {
        CliSettings {
            project_dir: self.project.clone(),
            base_url: self.base_url.clone(),
            ignore: self.ignore.clone(),
            markdown_extensions: self.markdown_extensions.clone(),
        }
    }

    /// Execute the build command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails or the build aborts.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let config = Config::load(self.config.as_deref(), Some(&self.cli_settings()))?;
        let layout = config.project_resolved.clone();

        output.info(&format!("Source: {}", layout.input_dir.display()));
        output.info(&format!("Output: {}", layout.output_dir.display()));

        let report = Project::new(config).build()?;

        for url in &report.pages.duplicates {
            output.warning(&format!("Warning: several pages were written to {url}"));
        }
        output.success(&format!(
            "Built {} pages and copied {} files to {}",
            report.pages.written.len(),
            report.assets.len(),
            layout.output_dir.display()
        ));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use pretty_assertions::assert_eq;

    use super::*;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: BuildArgs,
    }

    fn parse(args: &[&str]) -> BuildArgs {
        TestCli::try_parse_from(std::iter::once("quire").chain(args.iter().copied()))
            .unwrap()
            .args
    }

    #[test]
    fn test_cli_settings_from_flags() {
        let args = parse(&[
            "site",
            "--base-url",
            "https://example.com/",
            "--ignore",
            "^drafts/",
            "--md-ext",
            "tables",
            "--md-ext",
            "footnotes",
            "-v",
        ]);
        let settings = args.cli_settings();

        assert!(args.verbose);
        assert_eq!(settings.project_dir, Some(PathBuf::from("site")));
        assert_eq!(settings.base_url.as_deref(), Some("https://example.com/"));
        assert_eq!(settings.ignore.as_deref(), Some("^drafts/"));
        assert_eq!(
            settings.markdown_extensions,
            vec![MarkdownExtension::Tables, MarkdownExtension::Footnotes]
        );
    }

    #[test]
    fn test_unknown_markdown_extension_rejected() {
        assert!(TestCli::try_parse_from(["quire", "--md-ext", "emoji"]).is_err());
    }

    #[test]
    fn test_execute_builds_project() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("input")).unwrap();
        std::fs::create_dir_all(root.join("output")).unwrap();
        std::fs::write(root.join("page.html"), "{{ __content__ }}").unwrap();
        std::fs::write(root.join("input/index.md"), "# {{ title }}").unwrap();

        let root_arg = root.to_str().unwrap();
        parse(&[root_arg]).execute().unwrap();

        assert_eq!(
            std::fs::read_to_string(root.join("output/index.html")).unwrap(),
            "<h1>index</h1>\n"
        );
    }

    #[test]
    fn test_execute_reports_missing_layout() {
        let dir = tempfile::tempdir().unwrap();
        let root_arg = dir.path().to_str().unwrap();
        let err = parse(&[root_arg]).execute().unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
