//! Remote host collaborators
//!
//! This module contains everything that talks to the remote host:
//! - The shared HTTP client and fetch error classification
//! - The discovery prober and its title-based relevance check
//! - The pagination URL scheme and the page fetcher used by retrieval

mod fetcher;
mod pages;
mod parser;
mod prober;

pub use fetcher::{build_http_client, FetchError, HttpPageFetcher, PageFetcher};
pub use pages::PageUrlScheme;
pub use parser::{classify_document, extract_title, MISSING_TITLE};
pub use prober::{HttpProber, Probe, Prober};
