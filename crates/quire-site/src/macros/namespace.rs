//! Per-page macro namespace.

use quire_renderer::directive::{ArgValue, MacroRef};
use quire_script::{Host, Map, ScriptError, Value};

use super::builtins::{self, DEFAULT_CURRENT_CLASS, DEFAULT_MENU_TAG};
use super::{MacroBinding, MacroCall, MacroTable};
use crate::Page;
use crate::error::MacroError;

/// Reserved macro holding the converted page body during phase 2.
pub const RESERVED_CONTENT: &str = "__content__";

/// Reserved macro holding the output encoding.
pub const RESERVED_ENCODING: &str = "__encoding__";

/// Lookup scope for one page.
///
/// Substitution resolves, in order: page attributes and intrinsic fields,
/// reserved values, site bindings, environment extras (`base_url`, `input`,
/// `output`), built-in macros.
/// Scripts additionally see `page` and `pages`; their free names skip the
/// page attributes.
#[derive(Debug)]
pub struct Namespace<'a> {
    pages: &'a [Page],
    page: &'a Page,
    macros: &'a MacroTable,
    extras: &'a Map<'static>,
    reserved: Map<'a>,
}

impl<'a> Namespace<'a> {
    /// Namespace for `page` within `pages`.
    #[must_use]
    pub fn new(
        pages: &'a [Page],
        page: &'a Page,
        macros: &'a MacroTable,
        extras: &'a Map<'static>,
    ) -> Self {
        Self {
            pages,
            page,
            macros,
            extras,
            reserved: Map::new(),
        }
    }

    /// Bind a reserved value (`__content__`, `__encoding__`).
    #[must_use]
    pub fn with_reserved(mut self, name: &str, value: impl Into<Value<'a>>) -> Self {
        self.reserved.insert(name.to_owned(), value.into());
        self
    }

    /// Page being rendered.
    #[must_use]
    pub fn page(&self) -> &'a Page {
        self.page
    }

    /// Resolve a variable reference to its substitution text.
    ///
    /// Unknown names produce a warning and an empty string.
    pub fn resolve(&self, reference: &MacroRef) -> Result<String, MacroError> {
        let name = reference.name.as_str();

        if let Some(value) = self.page.get(name) {
            return Ok(value.to_owned());
        }
        if let Some(value) = self.reserved.get(name) {
            return Ok(value.to_string());
        }
        match self.macros.get(name) {
            Some(MacroBinding::Value(value)) => return Ok(value.to_string()),
            Some(MacroBinding::Callable(f)) => {
                let call = self.call_args(args_to_map(reference));
                return f(&call).map(|value| value.to_string());
            }
            None => {}
        }
        if let Some(value) = self.extras.get(name) {
            return Ok(value.to_string());
        }
        match name {
            builtins::MENU => builtins::menu(
                self.pages,
                self.page,
                &arg_or(reference, "tag", DEFAULT_MENU_TAG),
                &arg_or(reference, "current", DEFAULT_CURRENT_CLASS),
            ),
            builtins::POSTS => Ok(builtins::posts(self.pages)),
            _ => {
                tracing::warn!(page = %self.page, name, "Unresolved macro");
                Ok(String::new())
            }
        }
    }

    fn call_args(&self, args: Map<'a>) -> MacroCall<'a> {
        MacroCall {
            pages: self.pages,
            page: self.page,
            args,
        }
    }

    fn call_macro(&self, name: &str, kwargs: &Map<'a>) -> Result<Value<'a>, MacroError> {
        if let Some(MacroBinding::Callable(f)) = self.macros.get(name) {
            return f(&self.call_args(kwargs.clone()));
        }
        match name {
            builtins::MENU => {
                let tag = kwarg_or(kwargs, "tag", DEFAULT_MENU_TAG);
                let current = kwarg_or(kwargs, "current", DEFAULT_CURRENT_CLASS);
                builtins::menu(self.pages, self.page, &tag, &current).map(Value::Str)
            }
            _ => Ok(Self::page_list(builtins::post_pages(self.pages))),
        }
    }

    fn page_list(pages: impl IntoIterator<Item = &'a Page>) -> Value<'a> {
        Value::List(
            pages
                .into_iter()
                .map(|p| Value::Object(p as &dyn quire_script::Object))
                .collect(),
        )
    }
}

impl<'a> Host<'a> for Namespace<'a> {
    fn lookup(&self, name: &str) -> Option<Value<'a>> {
        match name {
            "page" => return Some(Value::Object(self.page)),
            "pages" => return Some(Self::page_list(self.pages)),
            _ => {}
        }
        if let Some(value) = self.reserved.get(name) {
            return Some(value.clone());
        }
        if let Some(MacroBinding::Value(value)) = self.macros.get(name) {
            return Some(value.clone());
        }
        self.extras.get(name).cloned()
    }

    fn call(
        &self,
        name: &str,
        args: &[Value<'a>],
        kwargs: &Map<'a>,
    ) -> Option<Result<Value<'a>, ScriptError>> {
        let is_macro = match self.macros.get(name) {
            Some(MacroBinding::Callable(_)) => true,
            Some(MacroBinding::Value(_)) => return None,
            None => matches!(name, builtins::MENU | builtins::POSTS),
        };
        if !is_macro {
            return None;
        }
        if !args.is_empty() {
            return Some(Err(ScriptError::Type(format!(
                "macro {name}() takes keyword arguments only"
            ))));
        }
        Some(self.call_macro(name, kwargs).map_err(|e| ScriptError::Host(e.to_string())))
    }
}

fn args_to_map<'a>(reference: &MacroRef) -> Map<'a> {
    reference
        .args
        .iter()
        .map(|(key, value)| {
            let value = match value {
                ArgValue::Str(s) => Value::Str(s.clone()),
                ArgValue::List(items) => {
                    Value::List(items.iter().cloned().map(Value::Str).collect())
                }
            };
            (key.clone(), value)
        })
        .collect()
}

fn arg_or(reference: &MacroRef, key: &str, default: &str) -> String {
    reference
        .get(key)
        .map_or_else(|| default.to_owned(), ToString::to_string)
}

fn kwarg_or(kwargs: &Map<'_>, key: &str, default: &str) -> String {
    kwargs
        .get(key)
        .map_or_else(|| default.to_owned(), ToString::to_string)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use pretty_assertions::assert_eq;
    use quire_script::{eval_expression, exec_statements};

    use super::*;
    use crate::page::Attributes;

    fn page(rel_path: &str, raw: &str) -> Page {
        Page::new_virtual(Path::new("/in"), rel_path, raw, &Attributes::new(), Attributes::new())
    }

    fn resolve(ns: &Namespace<'_>, reference: &str) -> String {
        ns.resolve(&MacroRef::parse(reference)).unwrap()
    }

    #[test]
    fn test_page_attribute_beats_site_binding() {
        let pages = vec![page("a.md", "author: Page Author\n---\n")];
        let mut macros = MacroTable::new();
        macros.insert_value("author", "Site Author");
        macros.insert_value("license", "CC-BY");
        let extras = Map::new();
        let ns = Namespace::new(&pages, &pages[0], &macros, &extras);

        assert_eq!(resolve(&ns, "author"), "Page Author");
        assert_eq!(resolve(&ns, "license"), "CC-BY");
    }

    #[test]
    fn test_attribute_ignores_arguments() {
        let pages = vec![page("a.md", "greeting: hi\n---\n")];
        let (macros, extras) = (MacroTable::new(), Map::new());
        let ns = Namespace::new(&pages, &pages[0], &macros, &extras);
        assert_eq!(resolve(&ns, "greeting loud=yes"), "hi");
    }

    #[test]
    fn test_callable_receives_pages_page_and_args() {
        let pages = vec![page("a.md", "title: First\n---\n"), page("b.md", "")];
        let mut macros = MacroTable::new();
        macros.insert_fn("summary", |call| {
            Ok(Value::Str(format!(
                "{} of {} [{}]",
                call.page.title(),
                call.pages.len(),
                call.str_arg("tags", "none")
            )))
        });
        let extras = Map::new();
        let ns = Namespace::new(&pages, &pages[0], &macros, &extras);

        assert_eq!(resolve(&ns, "summary"), "First of 2 [none]");
        assert_eq!(resolve(&ns, "summary tags=\"a, b\""), "First of 2 [[a, b]]");
    }

    #[test]
    fn test_non_string_results_stringified() {
        let pages = vec![page("a.md", "")];
        let mut macros = MacroTable::new();
        macros.insert_value("year", 2024_i64);
        macros.insert_fn("count", |call| Ok(Value::Int(i64::try_from(call.pages.len()).unwrap_or(0))));
        let extras = Map::new();
        let ns = Namespace::new(&pages, &pages[0], &macros, &extras);

        assert_eq!(resolve(&ns, "year"), "2024");
        assert_eq!(resolve(&ns, "count"), "1");
    }

    #[test]
    fn test_reserved_and_extras() {
        let pages = vec![page("a.md", "")];
        let macros = MacroTable::new();
        let mut extras = Map::new();
        extras.insert("base_url".to_owned(), Value::from("/"));
        let ns = Namespace::new(&pages, &pages[0], &macros, &extras)
            .with_reserved(RESERVED_CONTENT, "<p>body</p>")
            .with_reserved(RESERVED_ENCODING, "utf-8");

        assert_eq!(resolve(&ns, "__content__"), "<p>body</p>");
        assert_eq!(resolve(&ns, "__encoding__"), "utf-8");
        assert_eq!(resolve(&ns, "base_url"), "/");
    }

    #[test]
    fn test_site_binding_shadows_extra() {
        let pages = vec![page("a.md", "")];
        let mut macros = MacroTable::new();
        macros.insert_value("base_url", "https://example.com/");
        let mut extras = Map::new();
        extras.insert("base_url".to_owned(), Value::from("/"));
        extras.insert("input".to_owned(), Value::from("/in"));
        let ns = Namespace::new(&pages, &pages[0], &macros, &extras);

        assert_eq!(resolve(&ns, "base_url"), "https://example.com/");
        assert_eq!(resolve(&ns, "input"), "/in");
        assert_eq!(
            eval_expression("base_url", &ns).unwrap().to_string(),
            "https://example.com/"
        );
    }

    #[test]
    fn test_unresolved_is_empty() {
        let pages = vec![page("a.md", "")];
        let (macros, extras) = (MacroTable::new(), Map::new());
        let ns = Namespace::new(&pages, &pages[0], &macros, &extras);
        assert_eq!(resolve(&ns, "missing"), "");
        assert_eq!(resolve(&ns, ""), "");
    }

    #[test]
    fn test_builtin_menu_via_reference() {
        let pages = vec![
            page("a.md", "title: A\nmenu-position: 2\n---\n"),
            page("b.md", "title: B\nmenu-position: 0\n---\n"),
            page("c.md", "title: C\n---\n"),
        ];
        let (macros, extras) = (MacroTable::new(), Map::new());
        let ns = Namespace::new(&pages, &pages[1], &macros, &extras);

        let html = resolve(&ns, "menu tag=li");
        assert_eq!(
            html,
            "<li class=\"current\"><a href=\"b.html\">B</a></li>\n<li class=\"\"><a href=\"a.html\">A</a></li>"
        );
    }

    #[test]
    fn test_site_binding_shadows_builtin() {
        let pages = vec![page("a.md", "menu-position: 1\n---\n")];
        let mut macros = MacroTable::new();
        macros.insert_value("menu", "custom");
        let extras = Map::new();
        let ns = Namespace::new(&pages, &pages[0], &macros, &extras);
        assert_eq!(resolve(&ns, "menu"), "custom");
    }

    #[test]
    fn test_script_sees_page_and_pages() {
        let pages = vec![page("a.md", "title: Alpha\n---\n"), page("b.md", "title: Beta\n---\n")];
        let mut macros = MacroTable::new();
        macros.insert_value("site_name", "Demo");
        let extras = Map::new();
        let ns = Namespace::new(&pages, &pages[0], &macros, &extras);

        let value = eval_expression("page.title + ' @ ' + site_name", &ns).unwrap();
        assert_eq!(value.to_string(), "Alpha @ Demo");

        let out = exec_statements(
            "for p in pages:\n    if p is not page:\n        print(p['title'])",
            &ns,
        )
        .unwrap();
        assert_eq!(out, "Beta");
    }

    #[test]
    fn test_script_calls_macros() {
        let pages = vec![
            page("a.md", "title: A\nmenu-position: 1\n---\n"),
            page("blog.2022-02-02.hello.md", ""),
        ];
        let mut macros = MacroTable::new();
        macros.insert_fn("shout", |call| Ok(Value::Str(call.str_arg("text", "").to_uppercase())));
        let extras = Map::new();
        let ns = Namespace::new(&pages, &pages[0], &macros, &extras);

        assert_eq!(eval_expression("shout(text='hi')", &ns).unwrap(), Value::from("HI"));
        assert_eq!(
            eval_expression("menu(tag='li')", &ns).unwrap(),
            Value::from("<li class=\"current\"><a href=\"a.html\">A</a></li>")
        );
        assert_eq!(
            eval_expression("[p.post for p in posts()]", &ns).unwrap().to_string(),
            "[hello]"
        );
        assert!(matches!(
            eval_expression("shout('hi')", &ns),
            Err(ScriptError::Type(_))
        ));
    }

    #[test]
    fn test_macro_error_surfaces_in_script() {
        let pages = vec![page("a.md", "menu-position: x\n---\n")];
        let (macros, extras) = (MacroTable::new(), Map::new());
        let ns = Namespace::new(&pages, &pages[0], &macros, &extras);
        assert!(matches!(eval_expression("menu()", &ns), Err(ScriptError::Host(_))));
        assert!(ns.resolve(&MacroRef::parse("menu")).is_err());
    }
}
