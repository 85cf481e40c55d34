//! Discovery prober
//!
//! Probes one candidate identifier on the remote host and classifies the
//! response into a `ProbeOutcome`.

use crate::config::RemoteConfig;
use crate::remote::fetcher::{check_status, content_type, FetchError};
use crate::remote::parser::classify_document;
use crate::state::ProbeOutcome;
use async_trait::async_trait;
use reqwest::Client;

/// Result of probing one identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probe {
    /// Address that was probed
    pub url: String,
    pub outcome: ProbeOutcome,
}

/// Probes candidate identifiers
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, identifier: u64) -> Probe;
}

/// Prober that fetches the document page over HTTP
///
/// # Classification
///
/// | Response | Outcome |
/// |----------|---------|
/// | HTTP 404 | `NotFound` |
/// | Other non-2xx, timeout, network error | `TransientError` |
/// | 2xx without `text/html` | `FatalContentError` |
/// | 2xx HTML, title matches an exclusion | `Irrelevant` |
/// | 2xx HTML otherwise | `Relevant` |
pub struct HttpProber {
    client: Client,
    display_url: String,
    exclude_titles: Vec<String>,
}

impl HttpProber {
    pub fn new(client: Client, remote: &RemoteConfig, exclude_titles: Vec<String>) -> Self {
        Self {
            client,
            display_url: remote.display_url.clone(),
            exclude_titles,
        }
    }

    /// Builds the document address for an identifier
    pub fn document_url(&self, identifier: u64) -> String {
        self.display_url.replace("{id}", &identifier.to_string())
    }

    async fn fetch_and_classify(&self, url: &str) -> ProbeOutcome {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => return ProbeOutcome::TransientError(FetchError::from(e).to_string()),
        };

        if let Some(err) = check_status(response.status()) {
            if err.is_not_found() {
                return ProbeOutcome::NotFound;
            }
            return ProbeOutcome::TransientError(err.to_string());
        }

        if !content_type(&response).contains("text/html") {
            return ProbeOutcome::FatalContentError("Non-HTML response".to_string());
        }

        match response.text().await {
            Ok(body) => classify_document(&body, &self.exclude_titles),
            Err(e) => ProbeOutcome::TransientError(FetchError::from(e).to_string()),
        }
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, identifier: u64) -> Probe {
        let url = self.document_url(identifier);
        let outcome = self.fetch_and_classify(&url).await;
        tracing::trace!("Probed {} -> {}", url, outcome);
        Probe { url, outcome }
    }
}
