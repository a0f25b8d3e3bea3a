//! Configuration management for quire.
//!
//! Parses `quire.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! String configuration values support environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//!
//! Expanded fields:
//! - `build.base_url`

mod expand;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override the project directory (input, output and skeleton are resolved against it).
    pub project_dir: Option<PathBuf>,
    /// Override the base URL for relative links.
    pub base_url: Option<String>,
    /// Override the ignore pattern.
    pub ignore: Option<String>,
    /// Additional markdown extensions to enable.
    pub markdown_extensions: Vec<MarkdownExtension>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "quire.toml";

/// Default ignore pattern: hidden files and editor backups.
const DEFAULT_IGNORE: &str = r"^\.|~$";

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Project layout (paths are relative strings from TOML).
    project: ProjectConfigRaw,
    /// Build options.
    pub build: BuildConfig,
    /// Default attributes applied to every page.
    pub page: toml::Table,
    /// Site-global plain-value macro bindings.
    pub macros: toml::Table,

    /// Resolved project configuration (set after loading).
    #[serde(skip)]
    pub project_resolved: ProjectConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Raw project configuration as parsed from TOML (paths as strings).
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ProjectConfigRaw {
    input_dir: Option<String>,
    output_dir: Option<String>,
    skeleton: Option<String>,
}

/// Resolved project layout with absolute paths.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProjectConfig {
    /// Project root directory.
    pub root: PathBuf,
    /// Directory holding page sources and pass-through files.
    pub input_dir: PathBuf,
    /// Directory receiving the generated site.
    pub output_dir: PathBuf,
    /// Shared page skeleton.
    pub skeleton: PathBuf,
}

impl ProjectConfig {
    /// Layout with the default names under `root`.
    #[must_use]
    pub fn with_root(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            input_dir: root.join("input"),
            output_dir: root.join("output"),
            skeleton: root.join("page.html"),
        }
    }
}

/// Build options.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BuildConfig {
    /// Base URL used to resolve relative `href`/`src` values.
    pub base_url: String,
    /// Regex matched against site-relative paths of files and directories to skip.
    pub ignore: String,
    /// Encoding of page sources and the skeleton.
    pub input_encoding: String,
    /// Encoding of written pages (also exposed as the `__encoding__` macro).
    pub output_encoding: String,
    /// Markdown extensions to enable.
    pub markdown_extensions: Vec<MarkdownExtension>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            base_url: "/".to_owned(),
            ignore: DEFAULT_IGNORE.to_owned(),
            input_encoding: "utf-8".to_owned(),
            output_encoding: "utf-8".to_owned(),
            markdown_extensions: Vec::new(),
        }
    }
}

/// Optional markdown syntax extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MarkdownExtension {
    /// GFM tables.
    Tables,
    /// Footnote references and definitions.
    Footnotes,
    /// `~~strikethrough~~`.
    Strikethrough,
    /// `- [ ] task` list items.
    Tasklists,
    /// Curly quotes, dashes and ellipses.
    SmartPunctuation,
    /// `# Heading {#id .class}`.
    HeadingAttributes,
}

impl MarkdownExtension {
    /// Name as written in `quire.toml` and on the command line.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tables => "tables",
            Self::Footnotes => "footnotes",
            Self::Strikethrough => "strikethrough",
            Self::Tasklists => "tasklists",
            Self::SmartPunctuation => "smart-punctuation",
            Self::HeadingAttributes => "heading-attributes",
        }
    }
}

impl fmt::Display for MarkdownExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MarkdownExtension {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tables" => Ok(Self::Tables),
            "footnotes" => Ok(Self::Footnotes),
            "strikethrough" => Ok(Self::Strikethrough),
            "tasklists" => Ok(Self::Tasklists),
            "smart-punctuation" => Ok(Self::SmartPunctuation),
            "heading-attributes" => Ok(Self::HeadingAttributes),
            other => Err(ConfigError::Validation(format!(
                "unknown markdown extension: {other}"
            ))),
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`build.base_url`").
        field: String,
        /// Error message (e.g., "${`SITE_URL`} not set").
        message: String,
    },
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

/// Require an encoding name to denote UTF-8.
fn require_utf8(encoding: &str, field: &str) -> Result<(), ConfigError> {
    let normalized = encoding.to_ascii_lowercase().replace(['-', '_'], "");
    if normalized != "utf8" {
        return Err(ConfigError::Validation(format!(
            "{field}: unsupported encoding {encoding:?} (only utf-8 is supported)"
        )));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file. Otherwise looks for
    /// `quire.toml` in the CLI project directory, or in the current directory
    /// and its parents. Without any config file the defaults apply, rooted at
    /// the project directory (or the current directory).
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails or
    /// the resulting configuration is invalid.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let project_dir = cli_settings.and_then(|s| s.project_dir.as_deref());

        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(dir) = project_dir {
            let candidate = dir.join(CONFIG_FILENAME);
            if candidate.exists() {
                Self::load_from_file(&candidate)?
            } else {
                Self::default_with_base(dir)
            }
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML text, resolving paths against `base`.
    ///
    /// # Errors
    ///
    /// Returns error if parsing, expansion or validation fails.
    pub fn from_toml_str(content: &str, base: &Path) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(content)?;
        config.expand_env_vars()?;
        config.resolve_paths(base);
        config.validate()?;
        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(project_dir) = &settings.project_dir
            && self.config_path.is_none()
        {
            self.project_resolved = ProjectConfig::with_root(project_dir);
        }
        if let Some(base_url) = &settings.base_url {
            self.build.base_url.clone_from(base_url);
        }
        if let Some(ignore) = &settings.ignore {
            self.build.ignore.clone_from(ignore);
        }
        for extension in &settings.markdown_extensions {
            if !self.build.markdown_extensions.contains(extension) {
                self.build.markdown_extensions.push(*extension);
            }
        }
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Create default config with paths relative to current working directory.
    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    /// Create default config with paths relative to given base directory.
    fn default_with_base(base: &Path) -> Self {
        Self {
            project: ProjectConfigRaw::default(),
            build: BuildConfig::default(),
            page: toml::Table::new(),
            macros: toml::Table::new(),
            project_resolved: ProjectConfig::with_root(base),
            config_path: None,
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        // Expand environment variables before path resolution
        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_base_url()?;
        self.validate_ignore()?;
        require_utf8(&self.build.input_encoding, "build.input_encoding")?;
        require_utf8(&self.build.output_encoding, "build.output_encoding")?;
        Ok(())
    }

    /// Base URL must be absolute (`http://`, `https://`) or root-relative.
    fn validate_base_url(&self) -> Result<(), ConfigError> {
        let url = &self.build.base_url;
        require_non_empty(url, "build.base_url")?;
        if !url.starts_with('/') && !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::Validation(
                "build.base_url must start with /, http:// or https://".to_owned(),
            ));
        }
        Ok(())
    }

    fn validate_ignore(&self) -> Result<(), ConfigError> {
        regex::Regex::new(&self.build.ignore).map_err(|e| {
            ConfigError::Validation(format!("build.ignore is not a valid pattern: {e}"))
        })?;
        Ok(())
    }

    /// Expand environment variable references in configuration strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        self.build.base_url = expand::expand_env(&self.build.base_url, "build.base_url")?;
        Ok(())
    }

    /// Resolve relative paths to absolute paths based on config directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        let resolve = |path: Option<&str>, default: &str| config_dir.join(path.unwrap_or(default));

        self.project_resolved = ProjectConfig {
            root: config_dir.to_path_buf(),
            input_dir: resolve(self.project.input_dir.as_deref(), "input"),
            output_dir: resolve(self.project.output_dir.as_deref(), "output"),
            skeleton: resolve(self.project.skeleton.as_deref(), "page.html"),
        };
    }
}
