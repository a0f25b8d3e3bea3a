//! Error types for building a site.

use std::path::PathBuf;

use quire_renderer::LinkError;
use quire_script::ScriptError;

/// Fatal failure inside a macro.
#[derive(Debug, thiserror::Error)]
pub enum MacroError {
    /// An ordering attribute is not an integer.
    #[error("{attribute} of {page} must be an integer, got '{value}'")]
    InvalidOrdering {
        /// Page identity.
        page: String,
        /// Attribute name (`menu-position`, `sval`).
        attribute: String,
        /// Offending value.
        value: String,
    },
    /// A macro was called with an unusable argument.
    #[error("macro {name}: {message}")]
    InvalidArgument {
        /// Macro name.
        name: String,
        /// What was wrong.
        message: String,
    },
    /// Failure reported by a site callable.
    #[error("{0}")]
    Custom(String),
}

/// Failure reported by a build hook.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct HookError(pub String);

/// Fatal error while rendering pages. The build stops at the first one.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// A code block failed.
    #[error("{kind} in {page} failed: {source}\n---- code ----\n{code}\n--------------")]
    Script {
        /// Page identity.
        page: String,
        /// `expression` or `statements`.
        kind: &'static str,
        /// Code text of the block.
        code: String,
        /// Underlying error.
        #[source]
        source: ScriptError,
    },
    /// A macro failed.
    #[error("in {page}: {source}")]
    Macro {
        /// Page identity.
        page: String,
        /// Underlying error.
        #[source]
        source: MacroError,
    },
    /// Page ordering attribute is not an integer.
    #[error("{attribute} of {page} must be an integer, got '{value}'")]
    InvalidOrdering {
        /// Page identity.
        page: String,
        /// Attribute name.
        attribute: String,
        /// Offending value.
        value: String,
    },
    /// A build hook failed.
    #[error("hook {name} failed: {source}")]
    Hook {
        /// Hook name.
        name: String,
        /// Underlying error.
        #[source]
        source: HookError,
    },
    /// Writing a page failed.
    #[error("cannot write {url}: {source}")]
    Write {
        /// Page URL.
        url: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Project layout or file-system failure outside page rendering.
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    /// Skeleton, input or output directory is missing.
    #[error("{} does not exist, looks like the project has not been initialized", .0.display())]
    MissingPath(PathBuf),
    /// Ignore pattern does not compile.
    #[error("invalid ignore pattern: {0}")]
    Ignore(#[from] regex::Error),
    /// I/O error on a project path.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl ProjectError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}

/// Any failure of a whole build.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// Project layout or file-system failure.
    #[error(transparent)]
    Project(#[from] ProjectError),
    /// Page rendering failure.
    #[error(transparent)]
    Render(#[from] RenderError),
    /// Unusable base URL.
    #[error(transparent)]
    Link(#[from] LinkError),
}
