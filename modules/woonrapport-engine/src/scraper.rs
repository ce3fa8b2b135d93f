use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use spider_transformations::transformation::content::{
    transform_content_input, ReturnFormat, TransformConfig, TransformInput,
};
use tracing::{info, warn};

use crate::traits::PageScraper;

// --- HTTP + Readability scraper ---

/// Fetches the listing page with a plain GET and reduces it to readable
/// markdown via Readability extraction. Listing portals that require JS
/// rendering will come back empty; that is the expected path into
/// `waiting_input`, where the user pastes the page instead.
pub struct HttpScraper {
    http: reqwest::Client,
    timeout: Duration,
}

impl HttpScraper {
    pub fn new(timeout: Duration) -> Self {
        info!("Using HttpScraper (GET + Readability extraction)");
        Self {
            http: reqwest::Client::new(),
            timeout,
        }
    }
}

#[async_trait]
impl PageScraper for HttpScraper {
    async fn scrape(&self, url: &str) -> Result<String> {
        let parsed = url::Url::parse(url).context("Invalid URL")?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            anyhow::bail!("Only http/https URLs are allowed, got: {}", parsed.scheme());
        }

        let response = tokio::time::timeout(
            self.timeout,
            self.http
                .get(url)
                .header(reqwest::header::USER_AGENT, "woonrapport/0.1")
                .send(),
        )
        .await
        .context("Scrape request timed out")??;

        if !response.status().is_success() {
            anyhow::bail!("Listing page returned HTTP {}", response.status());
        }

        let html = response.text().await?;
        if html.trim().is_empty() {
            warn!(url, scraper = "http", "Empty HTML response");
            anyhow::bail!("Empty HTML response");
        }

        Ok(extract_readable(url, &html))
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Readability extraction to markdown, shared with the paste path so
/// pasted full-page HTML goes through the same cleanup.
pub fn extract_readable(url: &str, html: &str) -> String {
    let parsed_url = url::Url::parse(url).ok();
    let config = TransformConfig {
        readability: true,
        main_content: true,
        return_format: ReturnFormat::Markdown,
        filter_images: false,
        filter_svg: true,
        clean_html: true,
    };
    let input = TransformInput {
        url: parsed_url.as_ref(),
        content: html.as_bytes(),
        screenshot_bytes: None,
        encoding: None,
        selector_config: None,
        ignore_tags: None,
    };

    let text = transform_content_input(input, &config);

    if text.trim().is_empty() {
        warn!(url, "Empty content after Readability extraction");
    }
    text
}
