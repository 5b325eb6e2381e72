//! Small helpers shared by the page extractors.

use scraper::node::Node;
use scraper::{ElementRef, Selector};

/// Parse a selector known at compile time.
pub(crate) fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("Invalid selector")
}

/// First element matched by the first selector in `attempts` that matches
/// anything inside `scope`.
pub(crate) fn first_match<'a>(
    scope: ElementRef<'a>,
    attempts: &[&Selector],
) -> Option<ElementRef<'a>> {
    attempts
        .iter()
        .find_map(|selector| scope.select(selector).next())
}

/// Text of the first match, trimmed; `None` when absent or blank.
pub(crate) fn first_text(scope: ElementRef<'_>, attempts: &[&Selector]) -> Option<String> {
    first_match(scope, attempts)
        .map(inline_text)
        .filter(|text| !text.is_empty())
}

/// Text of an element with whitespace collapsed to single spaces.
pub(crate) fn inline_text(element: ElementRef<'_>) -> String {
    element.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Integer parsed from an element's text, tolerating surrounding whitespace.
pub(crate) fn parse_count(text: &str) -> Option<i64> {
    text.replace('\u{a0}', " ").trim().parse().ok()
}

const BLOCK_TAGS: &[&str] = &[
    "p", "div", "br", "li", "ul", "ol", "blockquote", "pre", "tr", "table", "h1", "h2", "h3",
    "h4", "h5", "h6",
];

/// Readable text of a post body.
///
/// Subtrees rooted at any tag in `skip` are dropped. Block elements and `<br>`
/// become line breaks; each line has its whitespace collapsed and blank lines
/// are removed.
pub(crate) fn block_text(element: ElementRef<'_>, skip: &[&str]) -> String {
    let mut raw = String::new();
    collect(element, skip, &mut raw);

    raw.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn collect(element: ElementRef<'_>, skip: &[&str], out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                let name = el.name();
                if skip.contains(&name) {
                    continue;
                }
                let block = BLOCK_TAGS.contains(&name);
                if block {
                    out.push('\n');
                }
                if let Some(child_ref) = ElementRef::wrap(child) {
                    collect(child_ref, skip, out);
                }
                if block {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}

/// Remove icon-font glyphs, which live in the Unicode private use area.
pub(crate) fn strip_glyphs(text: &str) -> String {
    text.chars()
        .filter(|c| !('\u{e000}'..='\u{f8ff}').contains(c))
        .collect::<String>()
        .trim()
        .to_string()
}
