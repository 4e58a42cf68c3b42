use std::collections::BTreeSet;
use std::sync::LazyLock;

use scraper::{Html, Selector};

use crate::types::Category;

static IDENTIFIER_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".list-identifier").unwrap());

const CROSS_LIST_MARKER: &str = "cross-list";
const REPLACED_MARKER: &str = "replaced";

/// Identifiers in `document` whose category is in `categories`, deduplicated.
/// Empty `categories` selects nothing.
pub fn extract(document: &str, categories: &BTreeSet<Category>) -> BTreeSet<String> {
    if categories.is_empty() {
        return BTreeSet::new();
    }
    extract_classified(document)
        .into_iter()
        .filter(|(_, category)| categories.contains(category))
        .map(|(id, _)| id)
        .collect()
}

/// Every identifier element in document order, with its category.
/// Elements yielding an empty token are skipped.
pub fn extract_classified(document: &str) -> Vec<(String, Category)> {
    if document.trim().is_empty() {
        return Vec::new();
    }

    let html = Html::parse_document(document);
    html.select(&IDENTIFIER_SEL)
        .filter_map(|el| {
            let text = el.text().collect::<String>();
            let id = identifier_token(&text)?;
            Some((id, classify(&text)))
        })
        .collect()
}

/// First whitespace-delimited segment, with any `scheme:` prefix removed.
pub fn identifier_token(text: &str) -> Option<String> {
    let first = text.split_whitespace().next()?;
    let id = first.rsplit(':').next().unwrap_or(first);
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}

// First match wins: cross-list, then replaced, else new.
pub fn classify(text: &str) -> Category {
    if text.contains(CROSS_LIST_MARKER) {
        Category::CrossListed
    } else if text.contains(REPLACED_MARKER) {
        Category::Replaced
    } else {
        Category::New
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn cats(list: &[Category]) -> BTreeSet<Category> {
        list.iter().copied().collect()
    }

    fn ids(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn fixture() -> String {
        std::fs::read_to_string("tests/fixtures/listing_new.html").unwrap()
    }

    fn span(text: &str) -> String {
        format!(r#"<html><body><dl><dt><span class="list-identifier">{}</span></dt></dl></body></html>"#, text)
    }

    #[test]
    fn strips_scheme_prefix() {
        let doc = span(r#"<a href="/abs/2301.00001">arXiv:2301.00001</a> [<a href="/pdf/2301.00001">pdf</a>]"#);
        assert_eq!(extract(&doc, &cats(&[Category::New])), ids(&["2301.00001"]));
        assert!(extract(&doc, &cats(&[Category::Replaced])).is_empty());
    }

    #[test]
    fn cross_list_beats_replaced() {
        assert_eq!(
            classify("arXiv:2301.00002 (cross-list from cs.LG) (replaced)"),
            Category::CrossListed
        );
        assert_eq!(classify("arXiv:2301.00003 (replaced)"), Category::Replaced);
        assert_eq!(classify("arXiv:2301.00004 [pdf, other]"), Category::New);
    }

    #[test]
    fn token_edge_cases() {
        assert_eq!(identifier_token("  arXiv:1111.22222  [pdf]"), Some("1111.22222".into()));
        assert_eq!(identifier_token("a:b:c rest"), Some("c".into()));
        assert_eq!(identifier_token("2301.5"), Some("2301.5".into()));
        assert_eq!(identifier_token("arXiv: 2301.5"), None);
        assert_eq!(identifier_token("   "), None);
    }

    #[test]
    fn empty_categories_select_nothing() {
        assert!(extract(&fixture(), &BTreeSet::new()).is_empty());
    }

    #[test]
    fn malformed_or_empty_markup_yields_nothing() {
        let all = cats(&[Category::New, Category::CrossListed, Category::Replaced]);
        assert!(extract("", &all).is_empty());
        assert!(extract("<<<div class=>>", &all).is_empty());
        assert!(extract("<html><body><p>No listings today</p></body></html>", &all).is_empty());
    }

    #[test]
    fn empty_token_elements_are_dropped() {
        let doc = span("arXiv:");
        assert!(extract_classified(&doc).is_empty());
    }

    #[test]
    fn fixture_classification() {
        let doc = fixture();
        let classified = extract_classified(&doc);
        assert_eq!(classified.len(), 6);

        assert_eq!(
            extract(&doc, &cats(&[Category::New])),
            ids(&["2401.00001", "2401.00002"])
        );
        assert_eq!(
            extract(&doc, &cats(&[Category::CrossListed])),
            ids(&["2401.00003", "2312.09999"])
        );
        assert_eq!(
            extract(&doc, &cats(&[Category::Replaced])),
            ids(&["2310.04444"])
        );
    }

    #[test]
    fn duplicates_within_document_collapse() {
        let doc = fixture();
        let all = cats(&[Category::New, Category::CrossListed, Category::Replaced]);
        // 2401.00001 appears twice in the fixture
        assert_eq!(extract(&doc, &all).len(), 5);
    }
}
