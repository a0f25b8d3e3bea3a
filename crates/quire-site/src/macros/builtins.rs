//! Built-in macros: `menu` and `posts`.

use std::fmt::Write as _;

use quire_renderer::escape_html;

use crate::Page;
use crate::error::MacroError;

pub(super) const MENU: &str = "menu";
pub(super) const POSTS: &str = "posts";

pub(super) const DEFAULT_MENU_TAG: &str = "span";
pub(super) const DEFAULT_CURRENT_CLASS: &str = "current";

/// Pages carrying `menu-position`, ascending; ties keep page order.
pub(super) fn menu_pages(pages: &[Page]) -> Result<Vec<&Page>, MacroError> {
    let mut entries = Vec::new();
    for page in pages {
        if let Some(position) = page.menu_position()? {
            entries.push((position, page));
        }
    }
    entries.sort_by_key(|(position, _)| *position);
    Ok(entries.into_iter().map(|(_, page)| page).collect())
}

/// One `<tag class="..."><a href="url">title</a></tag>` line per menu page.
pub(super) fn menu(
    pages: &[Page],
    current: &Page,
    tag: &str,
    current_class: &str,
) -> Result<String, MacroError> {
    if tag.is_empty() || !tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(MacroError::InvalidArgument {
            name: MENU.to_owned(),
            message: format!("tag must be an element name, got '{tag}'"),
        });
    }
    let mut html = String::new();
    for (i, page) in menu_pages(pages)?.into_iter().enumerate() {
        if i > 0 {
            html.push('\n');
        }
        let class = if std::ptr::eq(page, current) {
            current_class
        } else {
            ""
        };
        let _ = write!(
            html,
            r#"<{tag} class="{class}"><a href="{url}">{title}</a></{tag}>"#,
            url = page.url(),
            title = escape_html(page.title()),
        );
    }
    Ok(html)
}

/// Pages with a `post` field, newest `date` first.
pub(super) fn post_pages(pages: &[Page]) -> Vec<&Page> {
    let mut posts: Vec<&Page> = pages.iter().filter(|p| p.get("post").is_some()).collect();
    posts.sort_by(|a, b| b.get("date").cmp(&a.get("date")));
    posts
}

/// HTML list of links to all posts.
pub(super) fn posts(pages: &[Page]) -> String {
    let posts = post_pages(pages);
    if posts.is_empty() {
        return String::new();
    }
    let mut html = String::from("<ul class=\"posts\">\n");
    for page in posts {
        let _ = write!(
            html,
            "<li><a href=\"{}\">{}</a>",
            page.url(),
            escape_html(page.get("post").unwrap_or_default())
        );
        if let Some(date) = page.get("date") {
            let _ = write!(html, " <span class=\"date\">{}</span>", escape_html(date));
        }
        html.push_str("</li>\n");
    }
    html.push_str("</ul>");
    html
}
