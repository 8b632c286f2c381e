use std::path::Path;

use async_trait::async_trait;
use reqwest::{header, Client};
use serde_json::Value;
use tokio::{fs::File, io::AsyncWriteExt};

use crate::{Result, USER_AGENT};

/// The network calls the crawl makes. Every call fails on a non-2xx response.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Requests a page and returns its body as text.
    async fn get_text(&self, url: &str) -> Result<String>;

    /// Requests a JSON document.
    async fn get_json(&self, url: &str) -> Result<Value> {
        let body = self.get_text(url).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Streams the body at `url` into the file at `path`, returning the number of bytes written.
    async fn download(&self, url: &str, path: &Path) -> Result<u64>;
}

/// `Fetch` over a shared reqwest `Client` with browser-like headers.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::USER_AGENT, header::HeaderValue::from_static(USER_AGENT));
        let client = Client::builder().default_headers(headers).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn get_text(&self, url: &str) -> Result<String> {
        let res = self.client.get(url).send().await?.error_for_status()?;
        let html = res.text().await?;
        Ok(html)
    }

    async fn download(&self, url: &str, path: &Path) -> Result<u64> {
        let mut res = self.client.get(url).send().await?.error_for_status()?;
        let mut file = File::create(path).await?;
        let mut written = 0;
        while let Some(chunk) = res.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        Ok(written)
    }
}

/// Search results for one county, print-friendly so the whole listing is one table.
pub fn listing_url(base_url: &str, state_abbr: &str, county_id: &str) -> String {
    format!(
        "{base_url}/results/default_pf.aspx?searchCriteria=type=patent%7Cst={state_abbr}%7Ccty={county_id}%7Csp=true%7Csw=true%7Csadv=false&resultsTabIndex=0"
    )
}

/// Print-friendly detail page of one patent.
pub fn detail_url(base_url: &str, accession: &str, doc_class: &str) -> String {
    format!("{base_url}/details/patent/default_pf.aspx?accession={accession}&docClass={doc_class}")
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::{HashMap, VecDeque};
    use std::path::Path;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::Fetch;
    use crate::{Error, Result};

    /// Replays queued bodies per URL; the last body of a queue repeats.
    #[derive(Default)]
    pub struct ScriptedFetcher {
        pages: Mutex<HashMap<String, VecDeque<String>>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn page(self, url: impl Into<String>, body: impl Into<String>) -> Self {
            self.pages
                .lock()
                .unwrap()
                .entry(url.into())
                .or_default()
                .push_back(body.into());
            self
        }

        pub fn calls_to(&self, url: &str) -> usize {
            self.calls.lock().unwrap().iter().filter(|u| *u == url).count()
        }

        pub fn total_calls(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn next_body(&self, url: &str) -> Result<String> {
            self.calls.lock().unwrap().push(url.to_string());
            let mut pages = self.pages.lock().unwrap();
            let queue = pages.get_mut(url).ok_or_else(|| {
                Error::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("no scripted page for {url}"),
                ))
            })?;
            let body = if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            };
            Ok(body.unwrap_or_default())
        }
    }

    #[async_trait]
    impl Fetch for ScriptedFetcher {
        async fn get_text(&self, url: &str) -> Result<String> {
            self.next_body(url)
        }

        async fn download(&self, url: &str, path: &Path) -> Result<u64> {
            let body = self.next_body(url)?;
            tokio::fs::write(path, body.as_bytes()).await?;
            Ok(body.len() as u64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_url_embeds_state_and_county() {
        let url = listing_url("https://example.test", "AL", "089");
        assert!(url.starts_with("https://example.test/results/default_pf.aspx?"));
        assert!(url.contains("st=AL%7Ccty=089%7C"));
    }

    #[test]
    fn detail_url_is_print_friendly() {
        assert_eq!(
            detail_url("https://example.test", "AL0010__.001", "SER"),
            "https://example.test/details/patent/default_pf.aspx?accession=AL0010__.001&docClass=SER"
        );
    }
}
