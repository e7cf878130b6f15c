//! Small helpers over `scraper`

use crate::error::{Error, Result};
use scraper::{ElementRef, Html, Selector};

/// Compile a CSS selector
pub fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| Error::Other(format!("Invalid selector '{css}': {e}")))
}

/// First element matching `css` under `root`
pub fn select_first<'a>(root: ElementRef<'a>, css: &str) -> Result<Option<ElementRef<'a>>> {
    Ok(root.select(&selector(css)?).next())
}

/// All elements matching `css` under `root`
pub fn select_all<'a>(root: ElementRef<'a>, css: &str) -> Result<Vec<ElementRef<'a>>> {
    Ok(root.select(&selector(css)?).collect())
}

/// First element in the document matching any of `candidates`, tried in order
pub fn find_landmark<'a>(document: &'a Html, candidates: &[&str]) -> Result<Option<ElementRef<'a>>> {
    for css in candidates {
        if let Some(found) = document.select(&selector(css)?).next() {
            return Ok(Some(found));
        }
    }
    Ok(None)
}

/// All text under `element`, whitespace collapsed
pub fn text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

/// Text under `element` minus screen-reader-only spans and scripts
pub fn visible_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    collect_visible(element, &mut out);
    collapse_whitespace(&out)
}

fn collect_visible(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child) = ElementRef::wrap(child) {
            if !is_hidden(child) {
                collect_visible(child, out);
            }
        }
    }
}

fn is_hidden(element: ElementRef<'_>) -> bool {
    let value = element.value();
    matches!(value.name(), "script" | "style")
        || value
            .classes()
            .any(|class| class == "accesshide" || class == "sr-only")
}

/// Direct `td`/`th` children of a table row
pub fn cells(row: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|cell| matches!(cell.value().name(), "td" | "th"))
        .collect()
}

/// Whether an element carries a CSS class
pub fn has_class(element: ElementRef<'_>, class: &str) -> bool {
    element.value().classes().any(|c| c == class)
}

/// Resolve `href` against the page it appeared on
pub fn absolute_url(page_url: &str, href: &str) -> String {
    url::Url::parse(page_url)
        .and_then(|base| base.join(href))
        .map_or_else(|_| href.to_string(), String::from)
}

/// Collapse runs of whitespace into single spaces and trim
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Value of the `id` query parameter in an href
pub fn id_param(href: &str) -> Option<String> {
    query_param(href, "id")
}

/// Value of a query parameter in an absolute or relative href
pub fn query_param(href: &str, name: &str) -> Option<String> {
    let query = href.split_once('?')?.1;
    let query = query.split('#').next().unwrap_or(query);
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}
