//! Plain-text extraction from page markup.

use scraper::{ElementRef, Html, Selector};

/// Elements whose content is never part of the readable text.
const SKIPPED_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "svg", "iframe", "nav", "header", "footer",
    "aside", "form",
];

/// Candidate main-content containers, most specific first.
const CONTENT_SELECTORS: &[&str] = &["article", "main", "[role=\"main\"]", "body"];

/// Extracts readable text from an HTML document.
///
/// The first non-empty content container is used (falling back to the whole
/// document), non-content elements are skipped and whitespace is collapsed.
pub fn extract_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let root = main_content(&document);

    let mut parts: Vec<&str> = Vec::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let skipped = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| SKIPPED_TAGS.contains(&el.name()))
        });
        if skipped {
            continue;
        }
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            parts.push(trimmed);
        }
    }

    parts
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn main_content(document: &Html) -> ElementRef<'_> {
    for css in CONTENT_SELECTORS {
        let Ok(selector) = Selector::parse(css) else {
            continue;
        };
        if let Some(element) = document.select(&selector).next() {
            if element.text().any(|t| !t.trim().is_empty()) {
                return element;
            }
        }
    }
    document.root_element()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_text_strips_non_content() {
        let html = r#"
            <html><head><title>Doc</title><style>p { color: red }</style></head>
            <body>
              <nav>Home | About</nav>
              <p>Ownership is Rust's most unique feature.</p>
              <script>var tracking = true;</script>
              <footer>Copyright</footer>
            </body></html>
        "#;
        assert_eq!(extract_text(html), "Ownership is Rust's most unique feature.");
    }

    #[test]
    fn test_extract_text_prefers_article() {
        let html = r#"
            <html><body>
              <div>Sidebar chatter</div>
              <article><h1>Borrowing</h1><p>References borrow   values.</p></article>
            </body></html>
        "#;
        assert_eq!(extract_text(html), "Borrowing References borrow values.");
    }

    #[test]
    fn test_extract_text_skips_empty_article() {
        let html = r#"<html><body><article>  </article><p>Body text</p></body></html>"#;
        assert_eq!(extract_text(html), "Body text");
    }

    #[test]
    fn test_extract_text_empty_document() {
        assert_eq!(extract_text(""), "");
    }

    #[test]
    fn test_extract_text_decodes_entities() {
        let html = "<p>Fish &amp; chips</p>";
        assert_eq!(extract_text(html), "Fish & chips");
    }
}
