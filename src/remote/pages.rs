//! Pagination URL scheme

/// Builds page image addresses from a document's source URL
///
/// The template's `{book}` placeholder receives the last path segment of the
/// source URL and `{page}` the page number.
#[derive(Debug, Clone)]
pub struct PageUrlScheme {
    template: String,
}

impl PageUrlScheme {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Extracts the document id from a source URL
    pub fn book_id(source_url: &str) -> &str {
        let trimmed = source_url.trim_end_matches('/');
        trimmed.rsplit('/').next().unwrap_or(trimmed)
    }

    pub fn build_page_url(&self, source_url: &str, page: u32) -> String {
        self.template
            .replace("{book}", Self::book_id(source_url))
            .replace("{page}", &page.to_string())
    }
}
