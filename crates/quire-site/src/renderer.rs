//! Directive expansion against a page namespace.
//!
//! Both phases use [`expand`]: phase 1 over a page body, phase 2 over the
//! skeleton with the reserved macros bound.

use quire_renderer::directive::{self, Directive, DirectiveHandler};
use quire_script::{ScriptError, eval_expression, exec_statements};

use crate::error::RenderError;
use crate::macros::Namespace;

/// Substitutes directives using one page's namespace.
struct PageHandler<'n, 'a> {
    namespace: &'n Namespace<'a>,
}

impl PageHandler<'_, '_> {
    fn script_error(&self, kind: &'static str, code: &str, source: ScriptError) -> RenderError {
        RenderError::Script {
            page: self.namespace.page().to_string(),
            kind,
            code: code.to_owned(),
            source,
        }
    }
}

impl DirectiveHandler for PageHandler<'_, '_> {
    type Error = RenderError;

    fn handle(&mut self, directive: Directive<'_>) -> Result<String, RenderError> {
        let kind = directive.kind();
        match directive {
            Directive::Variable(reference) => {
                self.namespace
                    .resolve(&reference)
                    .map_err(|source| RenderError::Macro {
                        page: self.namespace.page().to_string(),
                        source,
                    })
            }
            Directive::Expression(code) => eval_expression(code.trim(), self.namespace)
                .map(|value| value.to_string())
                .map_err(|e| self.script_error(kind, code, e)),
            Directive::Statements(code) => exec_statements(code, self.namespace)
                .map_err(|e| self.script_error(kind, code, e)),
        }
    }
}

/// Expand all directives in `text` for the namespace's page.
///
/// The first failing code block or macro aborts the expansion.
pub fn expand(text: &str, namespace: &Namespace<'_>) -> Result<String, RenderError> {
    directive::expand(text, &mut PageHandler { namespace })
}
