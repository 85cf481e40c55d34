//! HTML parser for deciding document relevance
//!
//! A probed document is identified by its `<title>`. Titles containing one of
//! the configured exclusion strings (typically a publisher name) mark the
//! document as irrelevant.

use crate::state::ProbeOutcome;
use scraper::{Html, Selector};

/// Title recorded for documents without a usable `<title>` element
pub const MISSING_TITLE: &str = "(no title)";

/// Extracts the trimmed page title from an HTML document
///
/// # Example
///
/// ```
/// use flipharvest::remote::extract_title;
///
/// let html = r#"<html><head><title> Atlas </title></head><body></body></html>"#;
/// assert_eq!(extract_title(html), Some("Atlas".to_string()));
/// ```
pub fn extract_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Classifies a fetched HTML document by its title
///
/// Returns `Irrelevant` if the title contains any of `exclude_titles`,
/// `Relevant` otherwise.
pub fn classify_document(html: &str, exclude_titles: &[String]) -> ProbeOutcome {
    let title = extract_title(html).unwrap_or_else(|| MISSING_TITLE.to_string());

    if exclude_titles
        .iter()
        .any(|excluded| title.contains(excluded.as_str()))
    {
        ProbeOutcome::Irrelevant(title)
    } else {
        ProbeOutcome::Relevant(title)
    }
}
