//! Scanned image resolution.
//!
//! The archive converts scans on demand. The detail page embeds a one-time
//! `getImage.ashx` link carrying an access key; polling it reports the
//! conversion status until the image link is ready.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use regex::Regex;
use scraper::Html;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::parse::{create_selector, static_regex};
use crate::request::{detail_url, Fetch};

const SERVICE_MARKER: &str = "getImage.ashx";

#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("no image service link on the detail page")]
    NotFound,
    #[error("unexpected conversion status {status}: {message}")]
    UnexpectedStatus { status: String, message: String },
    #[error("image still converting after {attempts} attempts")]
    Timeout { attempts: u32 },
    #[error("conversion is ready but no image link was given")]
    MissingLink,
    #[error("request failed: {0}")]
    Fetch(String),
}

/// Body of a conversion status poll.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionResponse {
    pub conversion_status: Option<String>,
    pub image_file_link: Option<String>,
    pub error_message: Option<String>,
}

pub struct ImageResolver {
    fetcher: Arc<dyn Fetch>,
    base_url: String,
    max_retries: u32,
    retry_delay: Duration,
}

impl ImageResolver {
    pub fn new(
        fetcher: Arc<dyn Fetch>,
        base_url: impl Into<String>,
        max_retries: u32,
        retry_delay: Duration,
    ) -> Self {
        Self {
            fetcher,
            base_url: base_url.into(),
            max_retries,
            retry_delay,
        }
    }

    /// Turns an accession/document class pair into a downloadable image link.
    pub async fn resolve(&self, accession: &str, doc_class: &str) -> Result<String, ResolutionError> {
        info!(accession, doc_class, "resolving image link");
        let url = detail_url(&self.base_url, accession, doc_class);
        let html = self
            .fetcher
            .get_text(&url)
            .await
            .map_err(|e| ResolutionError::Fetch(e.to_string()))?;

        let service_url = find_image_service_url(&html).ok_or(ResolutionError::NotFound)?;
        let link = self.poll(&service_url).await?;
        info!(accession, link = %link, "image link ready");
        Ok(link)
    }

    /// Polls the conversion service until it reports `READY`, at most `max_retries` times.
    /// There is no wait after the last attempt.
    pub async fn poll(&self, service_url: &str) -> Result<String, ResolutionError> {
        for attempt in 1..=self.max_retries {
            let body = self
                .fetcher
                .get_json(service_url)
                .await
                .map_err(|e| ResolutionError::Fetch(e.to_string()))?;
            let status: ConversionResponse =
                serde_json::from_value(body).map_err(|e| ResolutionError::Fetch(e.to_string()))?;

            match status.conversion_status.as_deref() {
                Some("READY") => return status.image_file_link.ok_or(ResolutionError::MissingLink),
                Some("WORKING") => {
                    if attempt < self.max_retries {
                        debug!(attempt, delay = ?self.retry_delay, "image still converting");
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
                other => {
                    let status_text = other.unwrap_or("<missing>").to_string();
                    let message = status
                        .error_message
                        .unwrap_or_else(|| "No error message".to_string());
                    warn!(status = %status_text, error_message = %message, "unexpected conversion status");
                    return Err(ResolutionError::UnexpectedStatus {
                        status: status_text,
                        message,
                    });
                }
            }
        }

        warn!(attempts = self.max_retries, "gave up waiting for image conversion");
        Err(ResolutionError::Timeout {
            attempts: self.max_retries,
        })
    }
}

/// First conversion service link found in the page's scripts.
pub fn find_image_service_url(html: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = static_regex(
        &RE,
        r#"https?://[^"'\s]+/WebServices/getImage\.ashx\?[^"'\s]+"#,
    );

    let doc = Html::parse_document(html);
    let script_selector = create_selector("script").ok()?;
    doc.select(&script_selector)
        .map(|script| script.text().collect::<String>())
        .filter(|body| body.contains(SERVICE_MARKER))
        .find_map(|body| re.find(&body).map(|m| m.as_str().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::testing::ScriptedFetcher;
    use tokio::time::Instant;

    const BASE: &str = "https://records.test";
    const SERVICE: &str = "https://records.test/WebServices/getImage.ashx?key=abc123&accession=A1";

    fn detail_page() -> String {
        format!(
            r#"<html><head>
            <script>var x = 1;</script>
            <script>
              $.getJSON('{SERVICE}', function (data) {{ show(data); }});
            </script></head><body></body></html>"#
        )
    }

    fn resolver(fetcher: ScriptedFetcher, retries: u32) -> (Arc<ScriptedFetcher>, ImageResolver) {
        let fetcher = Arc::new(fetcher);
        let resolver = ImageResolver::new(fetcher.clone(), BASE, retries, Duration::from_secs(3));
        (fetcher, resolver)
    }

    fn working() -> &'static str {
        r#"{"conversionStatus":"WORKING"}"#
    }

    #[test]
    fn finds_service_link_in_scripts() {
        assert_eq!(find_image_service_url(&detail_page()).as_deref(), Some(SERVICE));
        assert_eq!(find_image_service_url("<script>nothing</script>"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn first_ready_response_wins() {
        let detail = detail_url(BASE, "A1", "SER");
        let fetcher = ScriptedFetcher::new()
            .page(&detail, detail_page())
            .page(SERVICE, working())
            .page(
                SERVICE,
                r#"{"conversionStatus":"READY","imageFileLink":"https://records.test/img/A1.pdf"}"#,
            )
            .page(SERVICE, working());
        let (fetcher, resolver) = resolver(fetcher, 10);

        let link = resolver.resolve("A1", "SER").await.unwrap();
        assert_eq!(link, "https://records.test/img/A1.pdf");
        assert_eq!(fetcher.calls_to(SERVICE), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_after_max_retries_without_trailing_sleep() {
        let fetcher = ScriptedFetcher::new().page(SERVICE, working());
        let (fetcher, resolver) = resolver(fetcher, 4);

        let start = Instant::now();
        let err = resolver.poll(SERVICE).await.unwrap_err();

        assert!(matches!(err, ResolutionError::Timeout { attempts: 4 }));
        assert_eq!(fetcher.calls_to(SERVICE), 4);
        assert_eq!(start.elapsed(), Duration::from_secs(9));
    }

    #[tokio::test(start_paused = true)]
    async fn unexpected_status_fails_immediately() {
        let fetcher = ScriptedFetcher::new()
            .page(SERVICE, r#"{"conversionStatus":"ERROR","errorMessage":"bad scan"}"#);
        let (fetcher, resolver) = resolver(fetcher, 10);

        let err = resolver.poll(SERVICE).await.unwrap_err();
        match err {
            ResolutionError::UnexpectedStatus { status, message } => {
                assert_eq!(status, "ERROR");
                assert_eq!(message, "bad scan");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(fetcher.total_calls(), 1);
    }

    #[tokio::test]
    async fn missing_service_link_is_not_found() {
        let detail = detail_url(BASE, "A1", "SER");
        let fetcher = ScriptedFetcher::new().page(&detail, "<html><script>var a;</script></html>");
        let (_, resolver) = resolver(fetcher, 10);

        let err = resolver.resolve("A1", "SER").await.unwrap_err();
        assert!(matches!(err, ResolutionError::NotFound));
    }

    #[tokio::test]
    async fn ready_without_link_is_an_error() {
        let fetcher = ScriptedFetcher::new().page(SERVICE, r#"{"conversionStatus":"READY"}"#);
        let (_, resolver) = resolver(fetcher, 10);
        assert!(matches!(
            resolver.poll(SERVICE).await,
            Err(ResolutionError::MissingLink)
        ));
    }

    #[tokio::test]
    async fn unreachable_detail_page_is_a_fetch_error() {
        let (_, resolver) = resolver(ScriptedFetcher::new(), 10);
        assert!(matches!(
            resolver.resolve("A1", "SER").await,
            Err(ResolutionError::Fetch(_))
        ));
    }
}
