//! Single-pass directive scanner and the final un-escape pass.

use super::{Directive, DirectiveHandler, MacroRef};

const ESCAPE: char = '\\';

#[derive(Debug, Clone, Copy)]
enum Kind {
    Variable,
    Expression,
    Statements,
}

/// Opener, closer and kind. Comment forms come first so `<!--{` is not
/// mistaken for plain text followed by `{`.
const DELIMITERS: &[(&str, &str, Kind)] = &[
    ("<!--{", "}-->", Kind::Variable),
    ("<!--=", "=-->", Kind::Expression),
    ("<!--%", "%-->", Kind::Statements),
    ("{{", "}}", Kind::Variable),
    ("{=", "=}", Kind::Expression),
    ("{%", "%}", Kind::Statements),
];

/// Openers whose escaping backslash [`unescape`] removes. Markup converters
/// turn `<` into `&lt;`, so those forms are covered as well.
const ESCAPABLE: &[&str] = &[
    "{{", "{=", "{%", "<!--{", "<!--=", "<!--%", "&lt;!--{", "&lt;!--=", "&lt;!--%",
];

/// Expand all directives in `text`.
///
/// Each opener closes at the first occurrence of its own closer. An opener
/// with no closer, or one preceded by `\`, is kept as literal text.
pub fn expand<H: DirectiveHandler>(text: &str, handler: &mut H) -> Result<String, H::Error> {
    let mut out = String::with_capacity(text.len());
    let mut copied = 0;
    let mut pos = 0;

    while let Some(offset) = text[pos..].find(['{', '<']) {
        let start = pos + offset;
        let Some(&(open, close, kind)) = DELIMITERS
            .iter()
            .find(|(open, _, _)| text[start..].starts_with(open))
        else {
            pos = start + 1;
            continue;
        };

        let body_start = start + open.len();
        if text[..start].ends_with(ESCAPE) {
            pos = body_start;
            continue;
        }
        let Some(body_len) = text[body_start..].find(close) else {
            pos = body_start;
            continue;
        };

        let body = &text[body_start..body_start + body_len];
        let directive = match kind {
            Kind::Variable => Directive::Variable(MacroRef::parse(body)),
            Kind::Expression => Directive::Expression(body),
            Kind::Statements => Directive::Statements(body),
        };

        out.push_str(&text[copied..start]);
        out.push_str(&handler.handle(directive)?);
        pos = body_start + body_len + close.len();
        copied = pos;
    }

    out.push_str(&text[copied..]);
    Ok(out)
}

/// Drop the backslash in front of every escaped directive opener.
#[must_use]
pub fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(idx) = rest.find(ESCAPE) {
        let after = &rest[idx + ESCAPE.len_utf8()..];
        out.push_str(&rest[..idx]);
        if !ESCAPABLE.iter().any(|opener| after.starts_with(opener)) {
            out.push(ESCAPE);
        }
        rest = after;
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use pretty_assertions::assert_eq;

    use super::*;

    /// Records directives and replaces them with a tag naming their kind.
    #[derive(Default)]
    struct Recorder {
        seen: Vec<String>,
    }

    impl DirectiveHandler for Recorder {
        type Error = Infallible;

        fn handle(&mut self, directive: Directive<'_>) -> Result<String, Infallible> {
            let text = match &directive {
                Directive::Variable(r) => format!("var:{}", r.name),
                Directive::Expression(code) => format!("expr:{}", code.trim()),
                Directive::Statements(code) => format!("stmt:{}", code.trim()),
            };
            self.seen.push(text.clone());
            Ok(format!("[{text}]"))
        }
    }

    fn run(text: &str) -> (String, Vec<String>) {
        let mut recorder = Recorder::default();
        let out = expand(text, &mut recorder).unwrap();
        (out, recorder.seen)
    }

    #[test]
    fn test_all_forms() {
        let (out, seen) = run("a {{ x }} b <!--{ y }--> c {= 1 + 2 =} d <!--= z =--> e {% p %} f <!--% q %-->");
        assert_eq!(
            out,
            "a [var:x] b [var:y] c [expr:1 + 2] d [expr:z] e [stmt:p] f [stmt:q]"
        );
        assert_eq!(seen.len(), 6);
    }

    #[test]
    fn test_no_directives() {
        let (out, seen) = run("plain {text} <p>html</p>");
        assert_eq!(out, "plain {text} <p>html</p>");
        assert!(seen.is_empty());
    }

    #[test]
    fn test_first_matching_closer_wins() {
        let (out, _) = run("{{ a }} }}");
        assert_eq!(out, "[var:a] }}");
    }

    #[test]
    fn test_closer_of_other_kind_ignored() {
        let (out, _) = run("{= x %} y =}");
        assert_eq!(out, "[expr:x %} y]");
    }

    #[test]
    fn test_unclosed_opener_is_literal() {
        let (out, seen) = run("start {{ never closed");
        assert_eq!(out, "start {{ never closed");
        assert!(seen.is_empty());
    }

    #[test]
    fn test_escaped_opener_untouched() {
        let (out, seen) = run(r"\{{ title }} and \<!--% code %-->");
        assert_eq!(out, r"\{{ title }} and \<!--% code %-->");
        assert!(seen.is_empty());
        assert_eq!(unescape(&out), "{{ title }} and <!--% code %-->");
    }

    #[test]
    fn test_replacement_not_rescanned() {
        struct Emit;

        impl DirectiveHandler for Emit {
            type Error = Infallible;

            fn handle(&mut self, _directive: Directive<'_>) -> Result<String, Infallible> {
                Ok("{{ inner }}".to_owned())
            }
        }

        let out = expand("{{ outer }}", &mut Emit).unwrap();
        assert_eq!(out, "{{ inner }}");
    }

    #[test]
    fn test_multiline_statement_body() {
        let (_, seen) = run("{%\n    print(1)\n%}");
        assert_eq!(seen, vec!["stmt:print(1)"]);
    }

    #[test]
    fn test_handler_error_aborts() {
        struct Fail;

        impl DirectiveHandler for Fail {
            type Error = String;

            fn handle(&mut self, directive: Directive<'_>) -> Result<String, String> {
                Err(directive.kind().to_owned())
            }
        }

        assert_eq!(expand("ok {= boom =}", &mut Fail), Err("expression".to_owned()));
    }

    #[test]
    fn test_unescape_variants() {
        assert_eq!(unescape(r"\{= x =}"), "{= x =}");
        assert_eq!(unescape(r"\&lt;!--{ x }--&gt;"), "&lt;!--{ x }--&gt;");
        assert_eq!(unescape(r"C:\path \{ \n"), r"C:\path \{ \n");
        assert_eq!(unescape("trailing \\"), "trailing \\");
    }

    #[test]
    fn test_non_ascii_text() {
        let (out, _) = run("héllo {{ wörld }} ✓");
        assert_eq!(out, "héllo [var:wörld] ✓");
    }
}
