//! HTML to plain-text reduction for scraped pages.

use scraper::{Html, Selector};
use std::sync::LazyLock;

static SCRIPT_LIKE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("script, style, noscript").expect("Invalid selector"));

/// Collapse a page to its visible text, one space between text nodes.
pub(crate) fn page_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let hidden: Vec<_> = document.select(&SCRIPT_LIKE).map(|el| el.id()).collect();

    let mut out = String::with_capacity(html.len() / 4);
    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        if node.ancestors().any(|a| hidden.contains(&a.id())) {
            continue;
        }
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(text);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_text_joins_text_nodes() {
        let html = r#"<html><body><div class="rate"><span>Compra:</span><b>7.65</b></div></body></html>"#;
        assert_eq!(page_text(html), "Compra: 7.65");
    }

    #[test]
    fn test_page_text_skips_scripts_and_styles() {
        let html = r#"<html><head><style>.q { color: red }</style>
            <script>var rate = 107.80;</script></head>
            <body><p>Tipo de cambio</p></body></html>"#;
        assert_eq!(page_text(html), "Tipo de cambio");
    }
}
